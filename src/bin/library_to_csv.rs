//! Dump the full metadata cross-table of matching entries to stdout as
//! CSV.
//!
//! ```bash
//! library-to-csv --library 'grid[Starname=Sun]' --separator ';'
//! ```
//!
//! The header row is `id,filename,<metadata fields in name order>`; cells
//! for fields an entry does not carry are left empty.

use std::io;

use anyhow::Context;
use clap::Parser;

use speclib::cli::{self, CommonArgs};
use speclib::library::open_and_search;

/// Dump library metadata as CSV on stdout.
#[derive(Parser)]
#[command(name = "library-to-csv", author, version, about, long_about = None)]
struct Args {
    /// Library specification, e.g. 'grid[Starname=Sun]'
    #[arg(long, value_name = "SPEC")]
    library: String,

    /// Field separator (a single ASCII character)
    #[arg(long, value_name = "SEP", default_value = ",", value_parser = cli::parse_separator)]
    separator: char,

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

fn run(args: Args) -> anyhow::Result<()> {
    let workspace = cli::resolve_workspace(args.common.workspace)?;
    let (library, entries) = open_and_search(&args.library, &workspace, None)
        .with_context(|| format!("opening {}", args.library))?;

    let fields = library.list_metadata_fields()?;
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    let maps = library.get_metadata(&ids)?;

    let stdout = io::stdout();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(args.separator as u8)
        .from_writer(stdout.lock());

    let mut header = vec!["id".to_string(), "filename".to_string()];
    header.extend(fields.iter().cloned());
    writer.write_record(&header)?;

    for (entry, metadata) in entries.iter().zip(&maps) {
        let mut record = vec![entry.id.to_string(), entry.filename.clone()];
        for field in &fields {
            record.push(
                metadata
                    .get(field)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
