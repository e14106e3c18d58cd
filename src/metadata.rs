//! # Metadata Model
//!
//! Every spectrum carries a free-form metadata record: a mapping from string
//! keys to scalar values. Libraries index these records for constraint
//! search, so the value model is deliberately small: integers, reals and
//! strings, nothing nested.
//!
//! ## Field typing
//!
//! A library assigns each metadata field a declared kind the first time a
//! value is written for it: [`ValueKind::Numeric`] when the value is an
//! integer or a real, [`ValueKind::Text`] for strings. Later inserts of the
//! other kind for the same field are rejected as a schema inconsistency
//! rather than silently widening the field.
//!
//! ## Conventional keys
//!
//! The [`keys`] module declares the key names shared between producers
//! (synthesis and ingestion jobs) and consumers (training and export
//! stages). They are conventions, not a closed schema: any non-empty string
//! is a valid key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A metadata record: key → scalar value, deterministically ordered.
pub type MetadataMap = BTreeMap<String, MetadataValue>;

/// A single scalar metadata value.
///
/// Values are preserved verbatim: an integer stays an integer through
/// storage and retrieval, it is never coerced to a real. JSON serialisation
/// is untagged (numbers and strings), matching the export sidecar format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Integer value (e.g. `continuum_normalised`).
    Integer(i64),
    /// Real value (e.g. `Teff`).
    Float(f64),
    /// String value (e.g. `Starname`).
    Text(String),
}

/// The declared kind of a metadata field.
///
/// Integers and reals share the numeric kind; the distinction only matters
/// for round-trip fidelity, not for search semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer or real.
    Numeric,
    /// String.
    Text,
}

impl ValueKind {
    /// Database tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
        }
    }

    /// Parse a database tag back into a kind.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "numeric" => Some(Self::Numeric),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetadataValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) | Self::Float(_) => ValueKind::Numeric,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Interpret the value as an `f64` when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Borrow the value as a string when it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a literal using the library-spec rule: integer first, then
    /// real, falling back to a string.
    ///
    /// Non-finite reals ("nan", "inf") are kept as strings; stored metadata
    /// never holds a NaN or infinity.
    pub fn parse(literal: &str) -> Self {
        if let Ok(i) = literal.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(v) = literal.parse::<f64>() {
            if v.is_finite() {
                return Self::Float(v);
            }
        }
        Self::Text(literal.to_string())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// SQLite storage classes map 1:1 onto the value model: INTEGER, REAL,
/// TEXT. The `metadata_values.value` column has no affinity, so what is
/// bound here is what comes back.
impl rusqlite::types::ToSql for MetadataValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            Self::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Self::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl rusqlite::types::FromSql for MetadataValue {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        use rusqlite::types::{FromSqlError, ValueRef};
        match value {
            ValueRef::Integer(i) => Ok(Self::Integer(i)),
            ValueRef::Real(v) => Ok(Self::Float(v)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// Owned SQLite value, for dynamically assembled parameter lists.
impl From<&MetadataValue> for rusqlite::types::Value {
    fn from(value: &MetadataValue) -> Self {
        match value {
            MetadataValue::Integer(i) => Self::Integer(*i),
            MetadataValue::Float(v) => Self::Real(*v),
            MetadataValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

/// Merge `overrides` over `base`; the override wins on key conflicts.
pub fn merge_metadata(base: &MetadataMap, overrides: &MetadataMap) -> MetadataMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Conventional metadata key names shared across the pipeline.
pub mod keys {
    /// Object identifier of the underlying star (string).
    pub const STARNAME: &str = "Starname";
    /// Effective temperature in Kelvin (numeric).
    pub const TEFF: &str = "Teff";
    /// Surface gravity, log10(cm s⁻²) (numeric).
    pub const LOGG: &str = "logg";
    /// Iron abundance relative to solar (numeric).
    pub const FE_H: &str = "[Fe/H]";
    /// 0 for absolute flux, 1 for continuum-normalised. Required on every
    /// library entry; defaulted to 0 at insert when absent.
    pub const CONTINUUM_NORMALISED: &str = "continuum_normalised";
    /// Signal-to-noise ratio, per pixel by convention (numeric).
    pub const SNR: &str = "SNR";
    /// `"pix"` or `"A"`: the scale the `SNR` key is expressed in.
    pub const SNR_PER: &str = "SNR_per";
    /// String tag of the SNR definition used by the degradation stage.
    pub const SNR_DEFINITION: &str = "snr_definition";
    /// Reddening colour excess E(B-V) applied to the spectrum (numeric).
    pub const E_BV: &str = "e_bv";
    /// Exposure length. Ingestion sources disagree on the unit (some record
    /// minutes, some seconds); the library preserves whatever it was given
    /// verbatim. Consumers must consult the producing script.
    pub const EXPOSURE: &str = "exposure";
    /// Apparent magnitude the spectrum is presented at (numeric).
    pub const MAGNITUDE: &str = "magnitude";
    /// Photometric band `magnitude` refers to (string, e.g. `"SDSS_r"`).
    pub const PHOTOMETRIC_BAND: &str = "photometric_band";
    /// Origin filename or URL for traceability (string).
    pub const IMPORTED_FROM: &str = "imported_from";
    /// Opaque 16-hex-digit identifier assigned by ingestion when Starname
    /// collides (string).
    pub const UID: &str = "uid";
}
