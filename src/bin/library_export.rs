//! Export matching entries as ASCII spectrum files plus JSON metadata
//! sidecars.
//!
//! ```bash
//! library-export --library 'grid[5000<Teff<6000]' --output-stub dumps/hot
//! ```
//!
//! writes `<id>.spec` and `<id>.json` for every matched entry under the
//! stub directory.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use speclib::cli::{self, CommonArgs};
use speclib::library::open_and_search;
use speclib::spectrum::PayloadFormat;

/// Export library entries as ASCII spectra with metadata sidecars.
#[derive(Parser)]
#[command(name = "library-export", author, version, about, long_about = None)]
struct Args {
    /// Library specification, e.g. 'grid[5000<Teff<6000]'
    #[arg(long, value_name = "SPEC")]
    library: String,

    /// Directory to write the exported files into
    #[arg(long, value_name = "DIR")]
    output_stub: PathBuf,

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

    fs::create_dir_all(&args.output_stub)
        .with_context(|| format!("creating {}", args.output_stub.display()))?;

    for entry in &entries {
        let loaded = library.open_ids(&[entry.id])?;
        let spectrum = loaded.get(0)?;

        let payload = args.output_stub.join(format!("{}.spec", entry.id));
        spectrum
            .save_to_file(&payload, PayloadFormat::Ascii, false)
            .with_context(|| format!("exporting entry {}", entry.id))?;

        let sidecar = args.output_stub.join(format!("{}.json", entry.id));
        let json = serde_json::to_string_pretty(spectrum.metadata())?;
        fs::write(&sidecar, json)
            .with_context(|| format!("writing {}", sidecar.display()))?;
    }

    println!(
        "exported {} entries to {}",
        entries.len(),
        args.output_stub.display()
    );
    Ok(())
}
