//! # Spectrum Value Object
//!
//! A [`Spectrum`] is an immutable triple of equally sized arrays, namely
//! wavelengths (Å, strictly increasing), flux values and flux errors, plus
//! a free-form metadata record. Spectra are never mutated in place: every
//! transformation (scaling, reddening, resampling) returns a new `Spectrum`
//! and callers rebind their handle.
//!
//! Payload I/O (the ASCII and binary on-disk codecs) lives in [`mod@self`]
//! via `load_from_file`/`save_to_file`; the derived operations live in their
//! own submodules:
//!
//! - [`SpectrumResampler`]: interpolation onto a new wavelength raster
//! - [`SpectrumReddener`]: interstellar extinction with a cached curve
//!
//! ## Example
//!
//! ```rust
//! use speclib::metadata::{MetadataMap, MetadataValue};
//! use speclib::spectrum::Spectrum;
//!
//! let mut meta = MetadataMap::new();
//! meta.insert("Starname".to_string(), MetadataValue::from("Sun"));
//! meta.insert("continuum_normalised".to_string(), MetadataValue::from(1i64));
//!
//! let spectrum = Spectrum::new(
//!     vec![4000.0, 4001.0, 4002.0],
//!     vec![1.0, 0.9, 1.0],
//!     vec![0.01, 0.01, 0.01],
//!     meta,
//! )?;
//! assert_eq!(spectrum.len(), 3);
//! # Ok::<(), speclib::spectrum::SpectrumError>(())
//! ```

mod io;
mod reddening;
mod resample;

pub use io::{ColumnSelection, PayloadFormat};
pub use reddening::SpectrumReddener;
pub use resample::SpectrumResampler;

use std::path::PathBuf;

use crate::metadata::{keys, merge_metadata, MetadataMap, MetadataValue};
use crate::photometry::{self, PhotometryError};

/// Errors from spectrum construction, I/O and transformation.
#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    /// Array shapes or wavelength/error invariants violated.
    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(String),

    /// A resampling target raster is malformed.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// Sub-item extraction past the end of a container.
    #[error("spectrum index {index} out of range (container holds {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of spectra in the container.
        len: usize,
    },

    /// Refusing to clobber an existing file without the overwrite flag.
    #[error("output file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Wrapped filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An immutable (wavelengths, values, value_errors) triple with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
    value_errors: Vec<f64>,
    metadata: MetadataMap,
}

impl Spectrum {
    /// Construct a spectrum from three equally sized arrays and a metadata
    /// record.
    ///
    /// Fails with [`SpectrumError::InvalidSpectrum`] when the lengths
    /// disagree or are below 2, when the wavelengths are not strictly
    /// increasing positive reals, when any error is negative or non-finite,
    /// or when a metadata key is empty.
    pub fn new(
        wavelengths: Vec<f64>,
        values: Vec<f64>,
        value_errors: Vec<f64>,
        metadata: MetadataMap,
    ) -> Result<Self, SpectrumError> {
        let n = wavelengths.len();
        if values.len() != n || value_errors.len() != n {
            return Err(SpectrumError::InvalidSpectrum(format!(
                "array lengths disagree: {} wavelengths, {} values, {} errors",
                n,
                values.len(),
                value_errors.len()
            )));
        }
        if n < 2 {
            return Err(SpectrumError::InvalidSpectrum(format!(
                "a spectrum needs at least 2 pixels, got {n}"
            )));
        }
        if !wavelengths[0].is_finite() || wavelengths[0] <= 0.0 {
            return Err(SpectrumError::InvalidSpectrum(format!(
                "wavelengths must be positive, first is {}",
                wavelengths[0]
            )));
        }
        for window in wavelengths.windows(2) {
            if !window[1].is_finite() || window[1] <= window[0] {
                return Err(SpectrumError::InvalidSpectrum(format!(
                    "wavelengths must be strictly increasing, found {} after {}",
                    window[1], window[0]
                )));
            }
        }
        for (i, err) in value_errors.iter().enumerate() {
            if !err.is_finite() || *err < 0.0 {
                return Err(SpectrumError::InvalidSpectrum(format!(
                    "value error at pixel {i} is {err}, must be finite and >= 0"
                )));
            }
        }
        for key in metadata.keys() {
            if key.is_empty() {
                return Err(SpectrumError::InvalidSpectrum(
                    "metadata keys must be non-empty".to_string(),
                ));
            }
        }

        Ok(Self {
            wavelengths,
            values,
            value_errors,
            metadata,
        })
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    /// Always false: construction rejects spectra below two pixels.
    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// The wavelength raster in Ångströms.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Flux values, continuum-normalised or absolute per the metadata.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// One-sigma flux errors, same length as the values.
    pub fn value_errors(&self) -> &[f64] {
        &self.value_errors
    }

    /// The metadata record.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Look up a single metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Whether the `continuum_normalised` key is present and non-zero.
    pub fn is_continuum_normalised(&self) -> bool {
        matches!(
            self.metadata.get(keys::CONTINUUM_NORMALISED),
            Some(MetadataValue::Integer(i)) if *i != 0
        ) || matches!(
            self.metadata.get(keys::CONTINUUM_NORMALISED),
            Some(MetadataValue::Float(v)) if *v != 0.0
        )
    }

    /// A copy of this spectrum with `overrides` merged over its metadata
    /// (override wins on conflict).
    pub fn with_metadata(&self, overrides: &MetadataMap) -> Self {
        Self {
            wavelengths: self.wavelengths.clone(),
            values: self.values.clone(),
            value_errors: self.value_errors.clone(),
            metadata: merge_metadata(&self.metadata, overrides),
        }
    }

    /// A copy with values and errors multiplied by `factor`.
    ///
    /// The scaling a caller would otherwise do in place (e.g. pinning a
    /// spectrum to a reference magnitude before exposure-time estimation)
    /// is expressed by rebinding to the returned spectrum.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            wavelengths: self.wavelengths.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
            value_errors: self
                .value_errors
                .iter()
                .map(|e| (e * factor).abs())
                .collect(),
            metadata: self.metadata.clone(),
        }
    }

    /// Apparent AB magnitude of this spectrum in a registered photometric
    /// band (see [`crate::photometry`]).
    pub fn photometry(&self, band_name: &str) -> Result<f64, PhotometryError> {
        photometry::magnitude(self, band_name)
    }

    /// Redden this spectrum by colour excess `e_bv`.
    ///
    /// One-shot convenience over [`SpectrumReddener`]; when reddening the
    /// same spectrum at several colour excesses, construct the reddener once
    /// so the extinction curve is reused.
    pub fn redden(&self, e_bv: f64) -> Self {
        SpectrumReddener::new(self).redden(e_bv)
    }

    /// Resample this spectrum onto a new wavelength raster.
    ///
    /// One-shot convenience over [`SpectrumResampler`].
    pub fn resample_onto(&self, raster: &[f64]) -> Result<Self, SpectrumError> {
        SpectrumResampler::new(self).onto_raster(raster)
    }

    /// Internal constructor for transformations that preserve the input's
    /// already-validated raster.
    pub(crate) fn from_parts_unchecked(
        wavelengths: Vec<f64>,
        values: Vec<f64>,
        value_errors: Vec<f64>,
        metadata: MetadataMap,
    ) -> Self {
        Self {
            wavelengths,
            values,
            value_errors,
            metadata,
        }
    }
}

/// A container of spectra, as returned by bulk library opens.
#[derive(Debug, Clone, Default)]
pub struct SpectrumArray {
    spectra: Vec<Spectrum>,
}

impl SpectrumArray {
    /// Wrap a vector of spectra.
    pub fn new(spectra: Vec<Spectrum>) -> Self {
        Self { spectra }
    }

    /// Number of spectra held.
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Extract the i-th spectrum.
    ///
    /// Fails with [`SpectrumError::IndexOutOfRange`] instead of panicking:
    /// callers routinely index with ids computed elsewhere.
    pub fn get(&self, index: usize) -> Result<&Spectrum, SpectrumError> {
        self.spectra.get(index).ok_or(SpectrumError::IndexOutOfRange {
            index,
            len: self.spectra.len(),
        })
    }

    /// Iterate over the contained spectra.
    pub fn iter(&self) -> std::slice::Iter<'_, Spectrum> {
        self.spectra.iter()
    }

    /// Consume the container, yielding the underlying vector.
    pub fn into_inner(self) -> Vec<Spectrum> {
        self.spectra
    }
}

impl From<Vec<Spectrum>> for SpectrumArray {
    fn from(spectra: Vec<Spectrum>) -> Self {
        Self::new(spectra)
    }
}

impl IntoIterator for SpectrumArray {
    type Item = Spectrum;
    type IntoIter = std::vec::IntoIter<Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.into_iter()
    }
}

impl<'a> IntoIterator for &'a SpectrumArray {
    type Item = &'a Spectrum;
    type IntoIter = std::slice::Iter<'a, Spectrum>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectra.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MetadataMap {
        let mut m = MetadataMap::new();
        m.insert("Starname".to_string(), MetadataValue::from("Sun"));
        m
    }

    #[test]
    fn construct_rejects_length_mismatch() {
        let err = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0],
            vec![0.0, 0.0],
            meta(),
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn construct_rejects_single_pixel() {
        let err = Spectrum::new(vec![4000.0], vec![1.0], vec![0.0], meta()).unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn construct_rejects_non_monotonic_wavelengths() {
        let err = Spectrum::new(
            vec![4000.0, 4000.0, 4002.0],
            vec![1.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0],
            meta(),
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn construct_rejects_negative_errors() {
        let err = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.01, -0.01],
            meta(),
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn construct_rejects_nan_error() {
        let err = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.01, f64::NAN],
            meta(),
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn construct_rejects_empty_metadata_key() {
        let mut m = meta();
        m.insert(String::new(), MetadataValue::from(1i64));
        let err = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            m,
        )
        .unwrap_err();
        assert!(matches!(err, SpectrumError::InvalidSpectrum(_)));
    }

    #[test]
    fn scaled_returns_new_spectrum() {
        let s = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![2.0, 4.0],
            vec![0.2, 0.4],
            meta(),
        )
        .expect("valid spectrum");
        let scaled = s.scaled(0.5);
        assert_eq!(scaled.values(), &[1.0, 2.0]);
        assert_eq!(scaled.value_errors(), &[0.1, 0.2]);
        // Input untouched.
        assert_eq!(s.values(), &[2.0, 4.0]);
    }

    #[test]
    fn with_metadata_merges_override_over_source() {
        let s = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            meta(),
        )
        .expect("valid spectrum");

        let mut over = MetadataMap::new();
        over.insert("Starname".to_string(), MetadataValue::from("Vega"));
        over.insert("Teff".to_string(), MetadataValue::from(9602.0));

        let merged = s.with_metadata(&over);
        assert_eq!(
            merged.metadata_value("Starname"),
            Some(&MetadataValue::from("Vega"))
        );
        assert_eq!(
            merged.metadata_value("Teff"),
            Some(&MetadataValue::from(9602.0))
        );
    }

    #[test]
    fn array_get_out_of_range() {
        let s = Spectrum::new(
            vec![4000.0, 4001.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            meta(),
        )
        .expect("valid spectrum");
        let array = SpectrumArray::new(vec![s]);
        assert!(array.get(0).is_ok());
        assert!(matches!(
            array.get(1),
            Err(SpectrumError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn continuum_normalised_flag() {
        let mut m = meta();
        m.insert(
            keys::CONTINUUM_NORMALISED.to_string(),
            MetadataValue::from(1i64),
        );
        let s = Spectrum::new(vec![1.0, 2.0], vec![1.0, 1.0], vec![0.0, 0.0], m)
            .expect("valid spectrum");
        assert!(s.is_continuum_normalised());

        let s0 = Spectrum::new(vec![1.0, 2.0], vec![1.0, 1.0], vec![0.0, 0.0], meta())
            .expect("valid spectrum");
        assert!(!s0.is_continuum_normalised());
    }
}
