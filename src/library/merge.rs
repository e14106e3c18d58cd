//! Offline merge of sharded libraries.
//!
//! Parallel synthesis runs cannot share one library, so each worker writes
//! its own shard named `<base>_<shard-id>`. Once all workers are done,
//! [`merge_shards`] folds every shard matching `<base>_*` into a fresh
//! library named exactly `<base>`, copying each entry's spectrum and
//! metadata verbatim. Shards are visited in lexicographic name order and
//! entries within a shard in id order, so the merged id sequence is
//! deterministic.
//!
//! The merge itself is single-writer: a `merge.lock` file inside the
//! destination is held for the duration of the run. On failure the partial
//! destination is left in place for the operator to inspect and remove;
//! source shards are opened read-only and never touched.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use log::info;

use crate::library::schema::MERGE_LOCK_FILE;
use crate::library::{InsertRequest, LibraryError, SpectrumLibrary};

/// Switches for [`merge_shards`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Remove and recreate the destination library when it already exists.
    pub overwrite: bool,
}

/// What a completed merge produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Number of source shards merged.
    pub sources: usize,
    /// Total number of entries copied into the destination.
    pub entries: usize,
}

/// Holds `merge.lock` inside the destination; the file is removed when the
/// guard drops, whether the merge succeeded or not.
struct MergeLock {
    path: PathBuf,
}

impl MergeLock {
    fn acquire(destination_root: &Path) -> Result<Self, LibraryError> {
        let path = destination_root.join(MERGE_LOCK_FILE);
        OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Self { path })
    }
}

impl Drop for MergeLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Merge every shard library matching `<base>_*` under `workspace` into a
/// new library `<base>`.
///
/// The destination inherits the payload format of the first shard. When the
/// destination already exists the merge fails with
/// [`LibraryError::DestinationExists`] unless `options.overwrite` is set, in
/// which case the old destination is removed first; a destination holding a
/// live `merge.lock` is never removed.
///
/// A failure while copying aborts the run with
/// [`LibraryError::MergeFailed`] naming the offending shard and source id.
pub fn merge_shards(
    workspace: &Path,
    base: &str,
    options: MergeOptions,
) -> Result<MergeStats, LibraryError> {
    if base.is_empty() || base.contains('/') || base.contains('\\') {
        return Err(LibraryError::BadLibrarySpec {
            spec: base.to_string(),
            reason: "merge base must be a plain library name".to_string(),
        });
    }

    let prefix = format!("{base}_");
    let mut shard_names = Vec::new();
    for dir_entry in fs::read_dir(workspace)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_dir() {
            continue;
        }
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) {
            shard_names.push(name);
        }
    }
    shard_names.sort();

    if shard_names.is_empty() {
        return Err(LibraryError::NotFound(workspace.join(format!("{base}_*"))));
    }

    // Open every shard before touching the destination, so a broken shard
    // cannot cost the caller an existing merged library.
    let mut sources = Vec::with_capacity(shard_names.len());
    for name in shard_names {
        let library = SpectrumLibrary::open_read_only(workspace.join(&name))?;
        sources.push((name, library));
    }

    let destination_root = workspace.join(base);
    if destination_root.exists() {
        if !options.overwrite {
            return Err(LibraryError::DestinationExists(destination_root));
        }
        if destination_root.join(MERGE_LOCK_FILE).exists() {
            return Err(LibraryError::DestinationExists(destination_root));
        }
        fs::remove_dir_all(&destination_root)?;
    }

    let payload_format = sources[0].1.payload_format();
    let mut destination = SpectrumLibrary::create(&destination_root, payload_format)?;
    let _lock = MergeLock::acquire(destination.root())?;

    let mut stats = MergeStats {
        sources: 0,
        entries: 0,
    };
    for (name, source) in &sources {
        for entry in source.entries()? {
            copy_entry(source, entry.id, &entry.filename, &mut destination).map_err(|e| {
                LibraryError::MergeFailed {
                    library: workspace.join(name),
                    id: entry.id,
                    source: Box::new(e),
                }
            })?;
            stats.entries += 1;
        }
        stats.sources += 1;
    }

    info!(
        "merged {} shards ({} entries) into {}",
        stats.sources,
        stats.entries,
        destination_root.display()
    );
    Ok(stats)
}

fn copy_entry(
    source: &SpectrumLibrary,
    id: i64,
    filename: &str,
    destination: &mut SpectrumLibrary,
) -> Result<(), LibraryError> {
    let loaded = source.open_ids(&[id])?;
    let spectrum = loaded.get(0)?;
    destination.insert_one(InsertRequest::new(spectrum).filename(filename))?;
    Ok(())
}
