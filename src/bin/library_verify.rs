//! Verify the integrity of a library and print the check report.
//!
//! ```bash
//! library-verify --library turbo_grid
//! ```
//!
//! Exits 0 when every check passes (warnings included), 2 when any check
//! fails.

use anyhow::Context;
use clap::Parser;

use speclib::cli::{self, CommonArgs};
use speclib::library::open_and_search;

/// Check a library's on-disk integrity.
#[derive(Parser)]
#[command(name = "library-verify", author, version, about, long_about = None)]
struct Args {
    /// Library specification; constraints narrow nothing here, only the
    /// name is used
    #[arg(long, value_name = "SPEC")]
    library: String,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    let args = cli::parse_or_exit::<Args>();
    cli::init_logging(args.common.verbose);
    match run(args) {
        Ok(failed) => {
            if failed {
                std::process::exit(cli::EXIT_FAILURE);
            }
        }
        Err(error) => cli::fail(&error),
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let workspace = cli::resolve_workspace(args.common.workspace)?;
    let (library, _) = open_and_search(&args.library, &workspace, None)
        .with_context(|| format!("opening {}", args.library))?;

    let report = library.verify()?;
    print!("{}", report.format_colored());

    Ok(report.has_failures())
}
