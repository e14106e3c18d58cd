//! Shared plumbing for the `library-*` binaries.
//!
//! Every binary resolves its workspace the same way (`--workspace` flag,
//! then a `speclib.toml` config file in the working directory, then the
//! working directory itself), initialises `env_logger` from a `-v` count
//! and maps failures onto a fixed exit-code contract:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | usage error (bad flags) |
//! | 2 | I/O or schema error |
//! | 3 | library-spec parse error |
//!
//! Failures print a single `error: ...` line; there are no backtraces in
//! normal operation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::library::LibraryError;

/// Name of the optional per-workspace configuration file.
pub const CONFIG_FILE: &str = "speclib.toml";

/// Exit code for usage errors.
pub const EXIT_USAGE: i32 = 1;
/// Exit code for I/O and schema errors.
pub const EXIT_FAILURE: i32 = 2;
/// Exit code for library-spec parse errors.
pub const EXIT_BAD_SPEC: i32 = 3;

/// Arguments shared by every binary.
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Workspace directory holding the libraries (overrides speclib.toml)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

/// Root structure of a `speclib.toml` file.
///
/// ```toml
/// # speclib.toml
/// [workspace]
/// root = "/data/grids"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Workspace settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

/// The `[workspace]` table.
#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory under which libraries are resolved.
    pub root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        toml::from_str(content).context("failed to parse TOML configuration")
    }
}

/// Resolve the workspace directory: the flag wins, then `speclib.toml`,
/// then the working directory.
pub fn resolve_workspace(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    let config_path = Path::new(CONFIG_FILE);
    if config_path.is_file() {
        if let Some(root) = Config::from_file(config_path)?.workspace.root {
            return Ok(root);
        }
    }
    Ok(PathBuf::from("."))
}

/// Initialise logging from the `-v` count (warn/info/debug).
pub fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// Value parser for separator flags: exactly one ASCII character.
///
/// Used as a clap `value_parser` so a bad separator is a usage error
/// (exit 1), not a runtime failure.
pub fn parse_separator(value: &str) -> Result<char, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(format!("must be a single ASCII character, got {value:?}")),
    }
}

/// Parse command-line arguments, exiting with the contract's codes when
/// parsing does not produce a value (0 for help/version, 1 for misuse).
pub fn parse_or_exit<T: clap::Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

/// The exit code a failed run should report.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(LibraryError::BadLibrarySpec { .. }) = cause.downcast_ref::<LibraryError>() {
            return EXIT_BAD_SPEC;
        }
    }
    EXIT_FAILURE
}

/// Print the single-line diagnostic and exit with the matching code.
pub fn fail(error: &anyhow::Error) -> ! {
    eprintln!("error: {error:#}");
    std::process::exit(exit_code_for(error));
}
