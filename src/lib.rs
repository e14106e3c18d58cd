//! # speclib - Stellar Spectrum Libraries
//!
//! `speclib` stores, searches and transforms one-dimensional stellar
//! spectra for survey-scale synthesis and analysis pipelines. A *library*
//! is an on-disk, append-only collection of spectra: a SQLite index holds
//! the searchable metadata while each spectrum's arrays live in their own
//! payload file, ASCII or binary.
//!
//! ## Key Features
//!
//! - **Append-only storage**: entries are inserted, never updated or
//!   deleted; ids are allocated monotonically and inserts are atomic, so
//!   readers can coexist with the single writer.
//!
//! - **Typed metadata search**: metadata values keep their integer, real
//!   or text storage class end to end, and libraries answer conjunctive
//!   equality and open-range queries over any recorded field.
//!
//! - **Sharded parallel writes**: concurrent producers each write their
//!   own `<base>_<shard>` library; the offline merge driver folds them
//!   deterministically into `<base>`.
//!
//! - **Compact spec strings**: `grid[Teff=5000,0.1<e_bv<0.5]` names a
//!   library and a query in one string, shared by the API and every
//!   command-line tool.
//!
//! - **Spectrum transformations**: AB photometry against a process-wide
//!   band registry (SDSS ugriz built in), Fitzpatrick (1999) reddening,
//!   linear resampling and per-pixel/per-Å signal-to-noise conversion.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speclib::library::{InsertRequest, SpectrumLibrary};
//! use speclib::prelude::*;
//!
//! // Create a library with binary payloads
//! let mut library = SpectrumLibrary::create("turbo_grid", PayloadFormat::Binary)?;
//!
//! // Build a spectrum
//! let mut meta = MetadataMap::new();
//! meta.insert("Starname".into(), MetadataValue::from("Sun"));
//! meta.insert("Teff".into(), MetadataValue::from(5771.8));
//! meta.insert("continuum_normalised".into(), MetadataValue::from(1i64));
//! let spectrum = Spectrum::new(
//!     vec![4000.0, 4001.0, 4002.0],
//!     vec![1.0, 0.9, 1.0],
//!     vec![0.01, 0.01, 0.01],
//!     meta,
//! )?;
//!
//! // Insert it and search it back
//! let ids = library.insert(&[InsertRequest::new(&spectrum).filename("sun.spec")])?;
//! let found = library.search(&ConstraintSet::new().equals("Starname", "Sun"))?;
//! assert_eq!(found.len(), 1);
//!
//! // Load the arrays again
//! let loaded = library.open_ids(&ids)?;
//! println!("{} pixels", loaded.get(0)?.wavelengths().len());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! This creates a directory structure:
//! ```text
//! turbo_grid/
//! ├── index.db          # SQLite metadata index
//! ├── manifest.json     # format version and payload mode
//! └── spectra/          # one payload file per entry
//!     └── 00000001.spec
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`spectrum`]: the immutable [`spectrum::Spectrum`] value object, its
//!   file codecs, reddening and resampling
//! - [`metadata`]: typed metadata values and the conventional key names
//! - [`photometry`]: AB magnitudes and the process-wide band registry
//! - [`snr`]: signal-to-noise conversion between per-pixel and per-Å
//! - [`library`]: on-disk storage, search, shard merge and verification
//! - [`cli`]: shared plumbing for the `library-*` binaries

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod library;
pub mod metadata;
pub mod photometry;
pub mod snr;
pub mod spectrum;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::library::{
        merge_shards, open_and_search, parse_library_spec, Constraint, ConstraintSet,
        InsertRequest, LibraryEntry, LibraryError, LibrarySpec, MergeOptions, MergeStats,
        SpectrumLibrary, VerifyReport,
    };
    pub use crate::metadata::{keys, merge_metadata, MetadataMap, MetadataValue, ValueKind};
    pub use crate::photometry::{
        band, band_names, register_band, PhotometricBand, PhotometryError,
    };
    pub use crate::snr::{SnrConverter, SnrError, SnrValue};
    pub use crate::spectrum::{
        ColumnSelection, PayloadFormat, Spectrum, SpectrumArray, SpectrumError, SpectrumReddener,
        SpectrumResampler,
    };
}
