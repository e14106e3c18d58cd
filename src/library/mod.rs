//! # Spectrum Library
//!
//! A [`SpectrumLibrary`] is a named, append-only, on-disk collection of
//! spectra: a SQLite index for metadata search plus one payload file per
//! entry (see [`schema`] for the layout). Entries are never updated or
//! deleted; ids are allocated monotonically and never reused.
//!
//! ## Writing
//!
//! One process owns a library for writing at a time. Parallel producers
//! each write their own shard library (`<base>_<shard>`) and the offline
//! [`merge::merge_shards`] driver consolidates them into `<base>`; see
//! that module for the locking discipline.
//!
//! Each insert is atomic: the index rows and the payload file either both
//! become visible or neither does. The payload is written and synced before
//! the index transaction commits, so a crash can leave an orphan payload
//! file (reported by [`SpectrumLibrary::verify`], never deleted) but never
//! an id without its payload.
//!
//! ## Searching
//!
//! [`SpectrumLibrary::search`] takes a [`ConstraintSet`] of per-field
//! equality and open-range constraints, combined conjunctively. Constraints
//! on fields the library has never seen, or whose declared kind does not
//! match the constraint's values, yield an empty result rather than an
//! error: a shard that never recorded `e_bv` simply has nothing reddened.
//!
//! ## Example
//!
//! ```no_run
//! use speclib::library::{InsertRequest, SpectrumLibrary};
//! use speclib::prelude::*;
//!
//! let mut library = SpectrumLibrary::create("demo_library", PayloadFormat::Binary)?;
//! let mut meta = MetadataMap::new();
//! meta.insert("Starname".into(), MetadataValue::from("Sun"));
//! meta.insert("Teff".into(), MetadataValue::from(5771.8));
//! let spectrum = Spectrum::new(
//!     vec![4000.0, 4001.0, 4002.0],
//!     vec![1.0, 0.9, 1.0],
//!     vec![0.01, 0.01, 0.01],
//!     meta,
//! )?;
//! let ids = library.insert(&[InsertRequest::new(&spectrum).filename("sun.spec")])?;
//!
//! let found = library.search(&ConstraintSet::new().equals("Starname", "Sun"))?;
//! assert_eq!(found.len(), 1);
//! let loaded = library.open_ids(&ids)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod constraint;
pub mod merge;
pub mod schema;
mod verify;

pub use constraint::{open_and_search, parse_library_spec, Constraint, ConstraintSet, LibrarySpec};
pub use merge::{merge_shards, MergeOptions, MergeStats};
pub use schema::LibraryManifest;
pub use verify::{CheckStatus, VerifyCheck, VerifyReport};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};

use crate::metadata::{keys, merge_metadata, MetadataMap, MetadataValue, ValueKind};
use crate::spectrum::{PayloadFormat, Spectrum, SpectrumArray, SpectrumError};
use schema::{apply_pragmas, payload_file_name, DATABASE_FILE, SCHEMA_SQL, SPECTRA_DIR};

/// Errors from library storage, search and merge.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// No library at the given path.
    #[error("library not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Create or merge would clobber an existing directory.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// An id that is not present in the library.
    #[error("unknown id {id} in library {}", .library.display())]
    UnknownId {
        /// Library the lookup ran against.
        library: PathBuf,
        /// The offending id.
        id: i64,
    },

    /// A library-specification string that does not match the grammar.
    #[error("bad library spec {spec:?}: {reason}")]
    BadLibrarySpec {
        /// The spec string as given.
        spec: String,
        /// What the parser objected to.
        reason: String,
    },

    /// On-disk state violates a library invariant.
    #[error("schema inconsistency in {}: {detail}", .library.display())]
    SchemaInconsistency {
        /// The affected library.
        library: PathBuf,
        /// Description of the violated invariant.
        detail: String,
    },

    /// Write attempted through a read-only handle.
    #[error("library {} is opened read-only", .0.display())]
    ReadOnly(PathBuf),

    /// The merge driver aborted on a source entry.
    #[error("merge failed on {} id {id}: {source}", .library.display())]
    MergeFailed {
        /// Source library whose entry could not be transferred.
        library: PathBuf,
        /// Id of the offending entry in the source.
        id: i64,
        /// The underlying failure.
        #[source]
        source: Box<LibraryError>,
    },

    /// A payload failed to load or save.
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    /// Wrapped SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Wrapped filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest that cannot be serialised.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// The entry's id, unique and monotonic within its library.
    pub id: i64,
    /// Origin tag recorded at insert, empty when none was given.
    pub filename: String,
}

/// Per-spectrum insert arguments.
///
/// Bundling the optional origin tag and metadata override with the spectrum
/// keeps bulk inserts free of parallel-slice bookkeeping.
#[derive(Debug, Clone)]
pub struct InsertRequest<'a> {
    spectrum: &'a Spectrum,
    filename: Option<&'a str>,
    overrides: Option<&'a MetadataMap>,
}

impl<'a> InsertRequest<'a> {
    /// Insert `spectrum` with its own metadata and no origin tag.
    pub fn new(spectrum: &'a Spectrum) -> Self {
        Self {
            spectrum,
            filename: None,
            overrides: None,
        }
    }

    /// Record `filename` as the entry's origin tag.
    pub fn filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }

    /// Merge `overrides` over the spectrum's metadata (override wins).
    pub fn overrides(mut self, overrides: &'a MetadataMap) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// An open spectrum library.
#[derive(Debug)]
pub struct SpectrumLibrary {
    root: PathBuf,
    conn: Connection,
    manifest: LibraryManifest,
    read_only: bool,
}

impl SpectrumLibrary {
    /// Create a new, empty library at `path`.
    ///
    /// Fails with [`LibraryError::DestinationExists`] when anything already
    /// sits at `path`; creating over an existing library is never implicit.
    pub fn create(
        path: impl AsRef<Path>,
        payload_format: PayloadFormat,
    ) -> Result<Self, LibraryError> {
        let root = path.as_ref().to_path_buf();
        if root.exists() {
            return Err(LibraryError::DestinationExists(root));
        }
        fs::create_dir_all(&root)?;
        fs::create_dir(root.join(SPECTRA_DIR))?;

        let manifest = LibraryManifest::new(payload_format);
        manifest.store(&root)?;

        let conn = Connection::open(root.join(DATABASE_FILE))?;
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!(
            "created library {} with {} payloads",
            root.display(),
            payload_format
        );
        Ok(Self {
            root,
            conn,
            manifest,
            read_only: false,
        })
    }

    /// Open an existing library read-write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Open an existing library for reading only; [`Self::insert`] refuses.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        Self::open_with(path.as_ref(), true)
    }

    /// Open the library at `path`, creating it when nothing is there yet.
    ///
    /// `payload_format` only applies on creation; an existing library keeps
    /// the codec recorded in its manifest. An existing directory is always
    /// opened, so a broken one surfaces as [`LibraryError::SchemaInconsistency`]
    /// instead of a create attempt.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        payload_format: PayloadFormat,
    ) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::open(path)
        } else {
            Self::create(path, payload_format)
        }
    }

    fn open_with(path: &Path, read_only: bool) -> Result<Self, LibraryError> {
        let root = path.to_path_buf();
        if !root.is_dir() {
            return Err(LibraryError::NotFound(root));
        }
        let manifest = LibraryManifest::load(&root)?;

        let database = root.join(DATABASE_FILE);
        if !database.is_file() {
            return Err(LibraryError::SchemaInconsistency {
                library: root,
                detail: format!("index database {DATABASE_FILE} missing"),
            });
        }
        let conn = if read_only {
            Connection::open_with_flags(&database, OpenFlags::SQLITE_OPEN_READ_ONLY)?
        } else {
            Connection::open(&database)?
        };
        apply_pragmas(&conn)?;

        debug!(
            "opened library {}{}",
            root.display(),
            if read_only { " (read-only)" } else { "" }
        );
        Ok(Self {
            root,
            conn,
            manifest,
            read_only,
        })
    }

    /// The library's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The library's name: the final component of its root directory.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// The manifest recorded at creation.
    pub fn manifest(&self) -> &LibraryManifest {
        &self.manifest
    }

    /// The payload codec this library stores spectra in.
    pub fn payload_format(&self) -> PayloadFormat {
        self.manifest.payload_format
    }

    /// Whether this handle was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Path of the payload file for `id`.
    pub fn payload_path(&self, id: i64) -> PathBuf {
        self.root.join(SPECTRA_DIR).join(payload_file_name(id))
    }

    /// Number of entries.
    pub fn entry_count(&self) -> Result<u64, LibraryError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Insert spectra, returning their newly allocated ids in order.
    ///
    /// Each spectrum is committed individually (payload flushed before the
    /// id becomes visible); a failure part-way leaves the earlier spectra
    /// inserted and surfaces the error for the failing one.
    pub fn insert(&mut self, requests: &[InsertRequest<'_>]) -> Result<Vec<i64>, LibraryError> {
        if self.read_only {
            return Err(LibraryError::ReadOnly(self.root.clone()));
        }
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            ids.push(insert_single(
                &mut self.conn,
                &self.root,
                self.manifest.payload_format,
                request,
            )?);
        }
        Ok(ids)
    }

    /// Insert one spectrum, returning its id.
    pub fn insert_one(&mut self, request: InsertRequest<'_>) -> Result<i64, LibraryError> {
        if self.read_only {
            return Err(LibraryError::ReadOnly(self.root.clone()));
        }
        insert_single(
            &mut self.conn,
            &self.root,
            self.manifest.payload_format,
            &request,
        )
    }

    /// Entries matching every constraint, in ascending id order.
    ///
    /// An empty constraint set matches everything. A constraint on a field
    /// this library has never recorded, or whose declared kind disagrees
    /// with the constraint's values, matches nothing.
    pub fn search(&self, constraints: &ConstraintSet) -> Result<Vec<LibraryEntry>, LibraryError> {
        let mut sql = String::from("SELECT e.id, e.filename FROM entries e");
        let mut sql_params: Vec<rusqlite::types::Value> = Vec::new();

        for (i, (field_name, constraint)) in constraints.iter().enumerate() {
            let Some((field_id, kind)) = self.lookup_field(field_name)? else {
                return Ok(Vec::new());
            };
            if !constraint.matches_kind(kind) {
                return Ok(Vec::new());
            }

            let alias = format!("v{i}");
            sql.push_str(&format!(
                " JOIN metadata_values {alias} ON {alias}.entry_id = e.id \
                 AND {alias}.field_id = ?{}",
                sql_params.len() + 1
            ));
            sql_params.push(rusqlite::types::Value::Integer(field_id));

            match constraint {
                Constraint::Equals(value) => {
                    sql.push_str(&format!(" AND {alias}.value = ?{}", sql_params.len() + 1));
                    sql_params.push(value.into());
                }
                Constraint::Between(lo, hi) => {
                    sql.push_str(&format!(
                        " AND {alias}.value > ?{} AND {alias}.value < ?{}",
                        sql_params.len() + 1,
                        sql_params.len() + 2
                    ));
                    sql_params.push(lo.into());
                    sql_params.push(hi.into());
                }
            }
        }
        sql.push_str(" ORDER BY e.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), |row| {
            Ok(LibraryEntry {
                id: row.get(0)?,
                filename: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// All entries in ascending id order.
    pub fn entries(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        self.search(&ConstraintSet::new())
    }

    /// Load the spectra for `ids`, payloads and metadata both.
    ///
    /// The i-th element of the result corresponds to `ids[i]`. Fails with
    /// [`LibraryError::UnknownId`] on the first id the library does not
    /// hold.
    pub fn open_ids(&self, ids: &[i64]) -> Result<SpectrumArray, LibraryError> {
        let mut spectra = Vec::with_capacity(ids.len());
        for &id in ids {
            let metadata = self.metadata_for(id)?;
            let spectrum = Spectrum::load_from_file(
                self.payload_path(id),
                metadata,
                None,
                self.manifest.payload_format,
            )?;
            spectra.push(spectrum);
        }
        Ok(SpectrumArray::new(spectra))
    }

    /// The metadata records for `ids`, without touching any payload.
    pub fn get_metadata(&self, ids: &[i64]) -> Result<Vec<MetadataMap>, LibraryError> {
        ids.iter().map(|&id| self.metadata_for(id)).collect()
    }

    /// Names of every metadata field this library has recorded, sorted.
    pub fn list_metadata_fields(&self) -> Result<Vec<String>, LibraryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM metadata_fields ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn metadata_for(&self, id: i64) -> Result<MetadataMap, LibraryError> {
        let known = self
            .conn
            .query_row("SELECT 1 FROM entries WHERE id = ?1", params![id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !known {
            return Err(LibraryError::UnknownId {
                library: self.root.clone(),
                id,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT f.name, v.value FROM metadata_values v \
             JOIN metadata_fields f ON f.field_id = v.field_id \
             WHERE v.entry_id = ?1",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, MetadataValue>(1)?))
        })?;

        let mut metadata = MetadataMap::new();
        for row in rows {
            let (key, value) = row?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    fn lookup_field(&self, name: &str) -> Result<Option<(i64, ValueKind)>, LibraryError> {
        let row = self
            .conn
            .query_row(
                "SELECT field_id, kind FROM metadata_fields WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((field_id, tag)) => {
                let kind = ValueKind::from_db_str(&tag).ok_or_else(|| {
                    LibraryError::SchemaInconsistency {
                        library: self.root.clone(),
                        detail: format!("field {name:?} has unknown kind tag {tag:?}"),
                    }
                })?;
                Ok(Some((field_id, kind)))
            }
        }
    }
}

/// One insert: index rows and payload commit together or not at all.
///
/// The payload is written and synced before COMMIT so the id is the last
/// thing to become visible. On any failure after the payload file was
/// created it is removed again before the error is surfaced.
fn insert_single(
    conn: &mut Connection,
    root: &Path,
    payload_format: PayloadFormat,
    request: &InsertRequest<'_>,
) -> Result<i64, LibraryError> {
    let mut metadata = match request.overrides {
        Some(overrides) => merge_metadata(request.spectrum.metadata(), overrides),
        None => request.spectrum.metadata().clone(),
    };
    metadata
        .entry(keys::CONTINUUM_NORMALISED.to_string())
        .or_insert(MetadataValue::Integer(0));

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO entries (filename, inserted_at) VALUES (?1, ?2)",
        params![request.filename.unwrap_or(""), Utc::now().timestamp()],
    )?;
    let id = tx.last_insert_rowid();

    for (key, value) in &metadata {
        let field_id = resolve_field(&tx, root, key, value.kind())?;
        tx.execute(
            "INSERT INTO metadata_values (entry_id, field_id, value) VALUES (?1, ?2, ?3)",
            params![id, field_id, value],
        )?;
    }

    let payload = root.join(SPECTRA_DIR).join(payload_file_name(id));
    if let Err(e) = request.spectrum.save_to_file(&payload, payload_format, false) {
        let _ = fs::remove_file(&payload);
        return Err(e.into());
    }
    if let Err(e) = tx.commit() {
        let _ = fs::remove_file(&payload);
        return Err(e.into());
    }

    debug!("inserted id {id} into {}", root.display());
    Ok(id)
}

/// Field id for `name`, creating the field with `kind` on first use.
///
/// A field's kind is fixed by the first value ever written for it; a value
/// of the other kind is a schema inconsistency, not a widening.
fn resolve_field(
    tx: &rusqlite::Transaction<'_>,
    root: &Path,
    name: &str,
    kind: ValueKind,
) -> Result<i64, LibraryError> {
    let existing = tx
        .query_row(
            "SELECT field_id, kind FROM metadata_fields WHERE name = ?1",
            params![name],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    if let Some((field_id, tag)) = existing {
        if tag != kind.as_str() {
            return Err(LibraryError::SchemaInconsistency {
                library: root.to_path_buf(),
                detail: format!("field {name:?} is declared {tag}, got a {kind} value"),
            });
        }
        return Ok(field_id);
    }

    tx.execute(
        "INSERT INTO metadata_fields (name, kind) VALUES (?1, ?2)",
        params![name, kind.as_str()],
    )?;
    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(starname: &str, teff: f64) -> Spectrum {
        let mut meta = MetadataMap::new();
        meta.insert(keys::STARNAME.to_string(), MetadataValue::from(starname));
        meta.insert(keys::TEFF.to_string(), MetadataValue::from(teff));
        meta.insert(
            keys::CONTINUUM_NORMALISED.to_string(),
            MetadataValue::from(1i64),
        );
        Spectrum::new(
            vec![4000.0, 4001.0, 4002.0],
            vec![1.0, 0.9, 1.0],
            vec![0.01, 0.01, 0.01],
            meta,
        )
        .expect("valid spectrum")
    }

    #[test]
    fn create_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib");
        SpectrumLibrary::create(&path, PayloadFormat::Binary).expect("create");
        let err = SpectrumLibrary::create(&path, PayloadFormat::Binary).unwrap_err();
        assert!(matches!(err, LibraryError::DestinationExists(_)));
    }

    #[test]
    fn open_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpectrumLibrary::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(_)));
    }

    #[test]
    fn broken_manifest_is_a_schema_inconsistency_not_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib");
        drop(SpectrumLibrary::create(&path, PayloadFormat::Binary).unwrap());

        // A directory that exists but lost its manifest is a broken
        // library, not an absent one.
        fs::remove_file(path.join(schema::MANIFEST_FILE)).unwrap();
        let err = SpectrumLibrary::open(&path).unwrap_err();
        assert!(matches!(err, LibraryError::SchemaInconsistency { .. }), "{err}");

        fs::write(path.join(schema::MANIFEST_FILE), "{ not json").unwrap();
        let err = SpectrumLibrary::open(&path).unwrap_err();
        assert!(matches!(err, LibraryError::SchemaInconsistency { .. }), "{err}");
    }

    #[test]
    fn open_or_create_opens_rather_than_clobbers_a_broken_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib");
        drop(SpectrumLibrary::create(&path, PayloadFormat::Binary).unwrap());
        fs::remove_file(path.join(schema::MANIFEST_FILE)).unwrap();

        let err = SpectrumLibrary::open_or_create(&path, PayloadFormat::Binary).unwrap_err();
        assert!(matches!(err, LibraryError::SchemaInconsistency { .. }), "{err}");
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s1 = spectrum("a", 5000.0);
        let s2 = spectrum("b", 5500.0);
        let ids = lib
            .insert(&[InsertRequest::new(&s1), InsertRequest::new(&s2)])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(lib.entry_count().unwrap(), 2);
    }

    #[test]
    fn insert_defaults_continuum_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();

        let mut meta = MetadataMap::new();
        meta.insert(keys::STARNAME.to_string(), MetadataValue::from("raw"));
        let s = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            meta,
        )
        .unwrap();

        let id = lib.insert_one(InsertRequest::new(&s)).unwrap();
        let metadata = lib.get_metadata(&[id]).unwrap().remove(0);
        assert_eq!(
            metadata[keys::CONTINUUM_NORMALISED],
            MetadataValue::Integer(0)
        );
    }

    #[test]
    fn overrides_win_on_insert() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();

        let s = spectrum("Sun", 5771.8);
        let mut overrides = MetadataMap::new();
        overrides.insert(keys::TEFF.to_string(), MetadataValue::from(5800.0));
        overrides.insert(keys::E_BV.to_string(), MetadataValue::from(0.05));

        let id = lib
            .insert_one(InsertRequest::new(&s).overrides(&overrides))
            .unwrap();
        let metadata = lib.get_metadata(&[id]).unwrap().remove(0);
        assert_eq!(metadata[keys::TEFF], MetadataValue::Float(5800.0));
        assert_eq!(metadata[keys::E_BV], MetadataValue::Float(0.05));
        assert_eq!(metadata[keys::STARNAME], MetadataValue::from("Sun"));
    }

    #[test]
    fn search_unknown_field_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s = spectrum("a", 5000.0);
        lib.insert_one(InsertRequest::new(&s)).unwrap();

        let hits = lib
            .search(&ConstraintSet::new().equals("no_such_field", 1.0))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_kind_mismatch_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s = spectrum("a", 5000.0);
        lib.insert_one(InsertRequest::new(&s)).unwrap();

        // Teff is numeric; a text constraint cannot match.
        let hits = lib
            .search(&ConstraintSet::new().equals(keys::TEFF, "hot"))
            .unwrap();
        assert!(hits.is_empty());

        // Mixed-kind range bounds match nothing either.
        let hits = lib
            .search(&ConstraintSet::new().between(
                keys::TEFF,
                MetadataValue::from(4000.0),
                MetadataValue::from("z"),
            ))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn integer_equality_matches_real_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s = spectrum("a", 5000.0);
        lib.insert_one(InsertRequest::new(&s)).unwrap();

        // Stored as REAL 5000.0, queried as INTEGER 5000.
        let hits = lib
            .search(&ConstraintSet::new().equals(keys::TEFF, 5000i64))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn text_ranges_compare_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        for name in ["alpha", "beta", "gamma"] {
            let s = spectrum(name, 5000.0);
            lib.insert_one(InsertRequest::new(&s)).unwrap();
        }

        let hits = lib
            .search(&ConstraintSet::new().between(
                keys::STARNAME,
                MetadataValue::from("alpha"),
                MetadataValue::from("gamma"),
            ))
            .unwrap();
        assert_eq!(hits.len(), 1);
        let metadata = lib.get_metadata(&[hits[0].id]).unwrap().remove(0);
        assert_eq!(metadata[keys::STARNAME], MetadataValue::from("beta"));
    }

    #[test]
    fn kind_drift_is_a_schema_inconsistency() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s = spectrum("a", 5000.0);
        lib.insert_one(InsertRequest::new(&s)).unwrap();

        // Second insert tries to write Teff as a string.
        let mut meta = MetadataMap::new();
        meta.insert(keys::TEFF.to_string(), MetadataValue::from("cool"));
        let drifted = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            meta,
        )
        .unwrap();
        let err = lib.insert_one(InsertRequest::new(&drifted)).unwrap_err();
        assert!(matches!(err, LibraryError::SchemaInconsistency { .. }));

        // The failed insert left nothing behind.
        assert_eq!(lib.entry_count().unwrap(), 1);
        assert!(!lib.payload_path(2).exists());
    }

    #[test]
    fn read_only_handle_refuses_insert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib");
        let mut lib = SpectrumLibrary::create(&path, PayloadFormat::Ascii).unwrap();
        let s = spectrum("a", 5000.0);
        lib.insert_one(InsertRequest::new(&s)).unwrap();
        drop(lib);

        let mut ro = SpectrumLibrary::open_read_only(&path).unwrap();
        let err = ro.insert_one(InsertRequest::new(&s)).unwrap_err();
        assert!(matches!(err, LibraryError::ReadOnly(_)));
        assert_eq!(ro.entry_count().unwrap(), 1);
    }

    #[test]
    fn open_ids_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib =
            SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
        let s = spectrum("a", 5000.0);
        let id = lib.insert_one(InsertRequest::new(&s)).unwrap();

        assert!(lib.open_ids(&[id]).is_ok());
        let err = lib.open_ids(&[id, 999]).unwrap_err();
        assert!(matches!(err, LibraryError::UnknownId { id: 999, .. }));
    }

    #[test]
    fn payloads_round_trip_in_both_codecs() {
        for format in [PayloadFormat::Binary, PayloadFormat::Ascii] {
            let dir = tempfile::tempdir().unwrap();
            let mut lib = SpectrumLibrary::create(dir.path().join("lib"), format).unwrap();
            let s = spectrum("Sun", 5771.8);
            let id = lib.insert_one(InsertRequest::new(&s)).unwrap();

            let loaded = lib.open_ids(&[id]).unwrap();
            let got = loaded.get(0).unwrap();
            assert_eq!(got.wavelengths(), s.wavelengths());
            assert_eq!(got.values(), s.values());
            assert_eq!(got.value_errors(), s.value_errors());
        }
    }
}
