//! List matching library entries, one line per entry with the key
//! stellar parameters.
//!
//! ```bash
//! library-list --library 'grid[4000<Teff<5000]'
//! ```

use anyhow::Context;
use clap::Parser;

use speclib::cli::{self, CommonArgs};
use speclib::library::open_and_search;
use speclib::metadata::keys;

/// List library entries with their key stellar parameters.
#[derive(Parser)]
#[command(name = "library-list", author, version, about, long_about = None)]
struct Args {
    /// Library specification, e.g. 'grid[4000<Teff<5000]'
    #[arg(long, value_name = "SPEC")]
    library: String,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    let args = cli::parse_or_exit::<Args>();
    cli::init_logging(args.common.verbose);
    if let Err(error) = run(args) {
        cli::fail(&error);
    }
}

#[cfg(feature = "colorized_output")]
fn paint_id(id: i64) -> String {
    console::style(id).bold().to_string()
}

#[cfg(not(feature = "colorized_output"))]
fn paint_id(id: i64) -> String {
    id.to_string()
}

fn run(args: Args) -> anyhow::Result<()> {
    let workspace = cli::resolve_workspace(args.common.workspace)?;
    let (library, entries) = open_and_search(&args.library, &workspace, None)
        .with_context(|| format!("opening {}", args.library))?;

    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    let maps = library.get_metadata(&ids)?;

    for (entry, metadata) in entries.iter().zip(&maps) {
        let mut line = format!("{:>6}", paint_id(entry.id));
        if !entry.filename.is_empty() {
            line.push_str(&format!("  {}", entry.filename));
        }
        for key in [keys::STARNAME, keys::TEFF, keys::LOGG, keys::FE_H] {
            if let Some(value) = metadata.get(key) {
                line.push_str(&format!("  {key}={value}"));
            }
        }
        println!("{line}");
    }

    log::info!("{} entries matched {}", entries.len(), args.library);
    Ok(())
}
