//! Merge sharded spectrum libraries `<base>_*` into a single `<base>`.
//!
//! ```bash
//! library-merge --input-library turbo_grid --workspace /data/grids
//! ```

use anyhow::Context;
use clap::Parser;

use speclib::cli::{self, CommonArgs};
use speclib::library::{merge_shards, MergeOptions};

/// Merge sharded spectrum libraries into one.
#[derive(Parser)]
#[command(name = "library-merge", author, version, about, long_about = None)]
struct Args {
    /// Base library name; every directory named <base>_* is a source shard
    #[arg(long, value_name = "BASE")]
    input_library: String,

    /// Replace an existing destination library
    #[arg(long)]
    overwrite: bool,

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
    let stats = merge_shards(
        &workspace,
        &args.input_library,
        MergeOptions {
            overwrite: args.overwrite,
        },
    )
    .with_context(|| format!("merging shards of {}", args.input_library))?;

    println!(
        "merged {} shards ({} entries) into {}",
        stats.sources, stats.entries, args.input_library
    );
    Ok(())
}
