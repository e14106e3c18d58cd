//! Conversion between signal-to-noise per pixel and per Ångström.
//!
//! The two scales differ by `sqrt(pixels_per_A)`, with the pixel density
//! taken from the raster spacing at a reference wavelength. A converter is
//! bound to one `(raster, reference)` pair at construction and hands out
//! immutable [`SnrValue`]s that answer in either scale, so downstream code
//! never needs to know which convention a number arrived in.

use crate::spectrum::Spectrum;

/// Errors from SNR conversion.
#[derive(Debug, thiserror::Error)]
pub enum SnrError {
    /// The raster has no pixel beyond the reference wavelength, or is too
    /// short to define a spacing.
    #[error("no raster pixel above reference wavelength {0} A")]
    NoReferencePixel(f64),
}

/// A signal-to-noise ratio queryable in both scales.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnrValue {
    per_pixel: f64,
    per_a: f64,
}

impl SnrValue {
    /// The SNR per pixel.
    pub fn per_pixel(&self) -> f64 {
        self.per_pixel
    }

    /// The SNR per Ångström.
    pub fn per_a(&self) -> f64 {
        self.per_a
    }
}

/// Converts SNR values between the per-pixel and per-Å scales.
///
/// The conversion factor is `sqrt(pixels_per_A)` where `pixels_per_A` is
/// `1 / Δλ` at the first raster pixel whose wavelength exceeds the
/// reference; when every pixel lies above the reference the leading spacing
/// is used.
#[derive(Debug, Clone, Copy)]
pub struct SnrConverter {
    factor: f64,
}

impl SnrConverter {
    /// Bind a converter to a wavelength raster and reference wavelength.
    ///
    /// The raster must be strictly increasing, as spectrum rasters are.
    /// Fails with [`SnrError::NoReferencePixel`] when the raster is shorter
    /// than two pixels or no pixel lies above the reference.
    pub fn new(raster: &[f64], reference_wavelength: f64) -> Result<Self, SnrError> {
        if raster.len() < 2 {
            return Err(SnrError::NoReferencePixel(reference_wavelength));
        }
        let idx = raster.partition_point(|&w| w <= reference_wavelength);
        if idx == raster.len() {
            return Err(SnrError::NoReferencePixel(reference_wavelength));
        }
        let delta = if idx == 0 {
            raster[1] - raster[0]
        } else {
            raster[idx] - raster[idx - 1]
        };
        Ok(Self {
            factor: (1.0 / delta).sqrt(),
        })
    }

    /// Bind a converter to a spectrum's raster.
    pub fn for_spectrum(spectrum: &Spectrum, reference_wavelength: f64) -> Result<Self, SnrError> {
        Self::new(spectrum.wavelengths(), reference_wavelength)
    }

    /// The multiplier taking per-pixel SNR to per-Å SNR.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Wrap an SNR quoted per pixel.
    pub fn per_pixel(&self, snr: f64) -> SnrValue {
        SnrValue {
            per_pixel: snr,
            per_a: snr * self.factor,
        }
    }

    /// Wrap an SNR quoted per Ångström.
    pub fn per_a(&self, snr: f64) -> SnrValue {
        SnrValue {
            per_pixel: snr / self.factor,
            per_a: snr,
        }
    }
}
