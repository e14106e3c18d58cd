//! On-disk layout of a spectrum library.
//!
//! A library is a directory containing:
//!
//! ```text
//! <name>/
//!   manifest.json     format version, payload codec, provenance
//!   index.db          SQLite index (entries, metadata_fields, metadata_values)
//!   spectra/          one payload file per entry, named from the id
//! ```
//!
//! The manifest declares the payload codec chosen at creation; it never
//! changes afterwards. The index holds no flux data, only the relational
//! tables that drive constraint search.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::library::LibraryError;
use crate::spectrum::PayloadFormat;

/// Manifest file name inside a library directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// SQLite index file name inside a library directory.
pub const DATABASE_FILE: &str = "index.db";

/// Subdirectory holding one payload file per entry.
pub const SPECTRA_DIR: &str = "spectra";

/// Lock file the merge driver creates inside a destination library.
pub const MERGE_LOCK_FILE: &str = "merge.lock";

/// On-disk layout version written to new manifests.
pub const FORMAT_VERSION: u32 = 1;

/// The relational index schema.
///
/// `metadata_values.value` is declared without a type name so the column
/// has no affinity: integers, reals and strings keep their storage class
/// verbatim, which is what makes mixed INTEGER/REAL search comparisons and
/// exact round-trips work.
pub(crate) const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL DEFAULT '',
    inserted_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS metadata_fields (
    field_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL CHECK (kind IN ('numeric', 'text'))
);

CREATE TABLE IF NOT EXISTS metadata_values (
    entry_id INTEGER NOT NULL REFERENCES entries(id),
    field_id INTEGER NOT NULL REFERENCES metadata_fields(field_id),
    value NOT NULL,
    PRIMARY KEY (entry_id, field_id)
);

CREATE INDEX IF NOT EXISTS idx_metadata_values_field ON metadata_values(field_id);
";

/// Apply the connection pragmas every open path uses.
pub(crate) fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
}

/// Payload file name for an entry id: zero-padded decimal plus `.spec`.
pub(crate) fn payload_file_name(id: i64) -> String {
    format!("{id:08}.spec")
}

/// Library-level manifest, one `manifest.json` per library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryManifest {
    /// Layout version; readers refuse versions they do not know.
    pub format_version: u32,
    /// Payload codec, fixed at creation.
    pub payload_format: PayloadFormat,
    /// Creation timestamp (RFC 3339).
    pub created: DateTime<Utc>,
    /// Name and version of the writing tool.
    pub generator: String,
}

impl LibraryManifest {
    /// Manifest for a library created now by this crate.
    pub fn new(payload_format: PayloadFormat) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            payload_format,
            created: Utc::now(),
            generator: format!("speclib {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Read and validate the manifest of the library at `library_root`.
    ///
    /// `library_root` is known to exist by the time this runs; a root
    /// whose manifest is missing, unreadable or unsupported is a broken
    /// library, so every failure here is a
    /// [`LibraryError::SchemaInconsistency`], never "not found".
    pub fn load(library_root: &Path) -> Result<Self, LibraryError> {
        let inconsistent = |detail: String| LibraryError::SchemaInconsistency {
            library: library_root.to_path_buf(),
            detail,
        };
        let path = library_root.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| inconsistent(format!("{MANIFEST_FILE} unreadable: {e}")))?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|e| inconsistent(format!("{MANIFEST_FILE} malformed: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(inconsistent(format!(
                "manifest format_version {} not supported (this build reads {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Write the manifest into `library_root`.
    pub fn store(&self, library_root: &Path) -> Result<(), LibraryError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(library_root.join(MANIFEST_FILE), text)?;
        Ok(())
    }
}
