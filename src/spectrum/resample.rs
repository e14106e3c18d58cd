//! Resampling of a spectrum onto a new wavelength raster.
//!
//! Values and errors are carried over by piecewise-linear interpolation
//! between the two bracketing input pixels. Target pixels outside the input
//! wavelength range read as zero value with zero error. Resampling a
//! spectrum onto its own raster reproduces it exactly.

use crate::spectrum::{Spectrum, SpectrumError};

/// Interpolates a source spectrum onto caller-supplied rasters.
#[derive(Debug)]
pub struct SpectrumResampler<'a> {
    source: &'a Spectrum,
}

impl<'a> SpectrumResampler<'a> {
    /// Create a resampler reading from `source`.
    pub fn new(source: &'a Spectrum) -> Self {
        Self { source }
    }

    /// Produce a new spectrum sampled at `raster`.
    ///
    /// The raster must hold at least two strictly increasing, positive,
    /// finite wavelengths; anything else is [`SpectrumError::InvalidRaster`].
    pub fn onto_raster(&self, raster: &[f64]) -> Result<Spectrum, SpectrumError> {
        validate_raster(raster)?;

        let mut values = Vec::with_capacity(raster.len());
        let mut value_errors = Vec::with_capacity(raster.len());
        for &wavelength in raster {
            let (value, error) = self.interpolate(wavelength);
            values.push(value);
            value_errors.push(error);
        }

        Ok(Spectrum::from_parts_unchecked(
            raster.to_vec(),
            values,
            value_errors,
            self.source.metadata().clone(),
        ))
    }

    fn interpolate(&self, x: f64) -> (f64, f64) {
        let wavelengths = self.source.wavelengths();
        let n = wavelengths.len();
        if x < wavelengths[0] || x > wavelengths[n - 1] {
            return (0.0, 0.0);
        }

        // First pixel at or above x; in range, so 0 <= idx <= n - 1.
        let idx = wavelengths.partition_point(|&w| w < x);
        if wavelengths[idx] == x {
            return (self.source.values()[idx], self.source.value_errors()[idx]);
        }

        let (w0, w1) = (wavelengths[idx - 1], wavelengths[idx]);
        let t = (x - w0) / (w1 - w0);
        let v0 = self.source.values()[idx - 1];
        let v1 = self.source.values()[idx];
        let e0 = self.source.value_errors()[idx - 1];
        let e1 = self.source.value_errors()[idx];
        (v0 + t * (v1 - v0), e0 + t * (e1 - e0))
    }
}

fn validate_raster(raster: &[f64]) -> Result<(), SpectrumError> {
    if raster.len() < 2 {
        return Err(SpectrumError::InvalidRaster(format!(
            "a raster needs at least 2 pixels, got {}",
            raster.len()
        )));
    }
    if !raster[0].is_finite() || raster[0] <= 0.0 {
        return Err(SpectrumError::InvalidRaster(format!(
            "raster wavelengths must be positive, first is {}",
            raster[0]
        )));
    }
    for window in raster.windows(2) {
        if !window[1].is_finite() || window[1] <= window[0] {
            return Err(SpectrumError::InvalidRaster(format!(
                "raster must be strictly increasing, found {} after {}",
                window[1], window[0]
            )));
        }
    }
    Ok(())
}
