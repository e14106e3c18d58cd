//! # Photometric Bands
//!
//! A process-wide registry of photometric bands and the AB-magnitude
//! integration used by [`Spectrum::photometry`].
//!
//! The registry starts out holding the five SDSS bands (`SDSS_u`, `SDSS_g`,
//! `SDSS_r`, `SDSS_i`, `SDSS_z`) from declared transmission tables (see
//! [`mod@self`] internals). Callers may [`register_band`] additional bands;
//! bands are never removed, and a name can only be registered once.
//!
//! Magnitudes are AB: spectrum values are interpreted as f_λ in
//! erg s⁻¹ cm⁻² Å⁻¹ and compared against the zero-point flux density of
//! the band (3631 Jy for the SDSS bands),
//!
//! ```text
//! m = -2.5 · log10( ∫ f_λ(λ) T(λ) λ dλ  /  ∫ f_ref(λ) T(λ) λ dλ )
//! f_ref(λ) = zp_Jy · 1e-23 · c_Å / λ²
//! ```
//!
//! with both integrals taken as trapezoidal sums over the spectrum's own
//! raster restricted to the band support, and T interpolated linearly onto
//! that raster. Because the same T and raster appear in numerator and
//! denominator, scaling a spectrum by c shifts the magnitude by exactly
//! -2.5·log10(c).

mod bands;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::spectrum::Spectrum;

/// Speed of light in Ångström per second.
const SPEED_OF_LIGHT_A_PER_S: f64 = 2.99792458e18;

/// One Jansky in erg s⁻¹ cm⁻² Hz⁻¹.
const JY_TO_CGS: f64 = 1.0e-23;

/// Errors from band registration and magnitude evaluation.
#[derive(Debug, thiserror::Error)]
pub enum PhotometryError {
    /// Lookup of a band name nobody registered.
    #[error("unknown photometric band {0:?}")]
    UnknownBand(String),

    /// The spectrum does not cover the band's transmission curve.
    #[error(
        "band {band} (support {band_lo:.0}-{band_hi:.0} A) not covered by \
         spectrum ({spectrum_lo:.0}-{spectrum_hi:.0} A)"
    )]
    BandOutOfRange {
        /// Name of the band being evaluated.
        band: String,
        /// Blue edge of the band support in Å.
        band_lo: f64,
        /// Red edge of the band support in Å.
        band_hi: f64,
        /// First wavelength of the spectrum in Å.
        spectrum_lo: f64,
        /// Last wavelength of the spectrum in Å.
        spectrum_hi: f64,
    },

    /// Registration under a name that is already taken.
    #[error("photometric band {0:?} is already registered")]
    DuplicateBand(String),

    /// A transmission table that does not form a usable band.
    #[error("invalid photometric band: {0}")]
    InvalidBand(String),
}

/// A named transmission curve with an AB zero point.
#[derive(Debug, Clone)]
pub struct PhotometricBand {
    name: String,
    wavelengths: Vec<f64>,
    response: Vec<f64>,
    zero_point_jy: f64,
}

impl PhotometricBand {
    /// Build a band from `(wavelength Å, response)` samples.
    ///
    /// The table needs at least two points with strictly increasing
    /// wavelengths and finite non-negative responses, and a positive zero
    /// point, otherwise [`PhotometryError::InvalidBand`].
    pub fn new(
        name: impl Into<String>,
        curve: &[(f64, f64)],
        zero_point_jy: f64,
    ) -> Result<Self, PhotometryError> {
        let name = name.into();
        if curve.len() < 2 {
            return Err(PhotometryError::InvalidBand(format!(
                "band {name:?} needs at least 2 curve points, got {}",
                curve.len()
            )));
        }
        if !(zero_point_jy.is_finite() && zero_point_jy > 0.0) {
            return Err(PhotometryError::InvalidBand(format!(
                "band {name:?} zero point must be positive, got {zero_point_jy}"
            )));
        }
        let mut prev = f64::NEG_INFINITY;
        for &(wavelength, response) in curve {
            if !wavelength.is_finite() || wavelength <= prev || wavelength <= 0.0 {
                return Err(PhotometryError::InvalidBand(format!(
                    "band {name:?} wavelengths must be positive and strictly increasing"
                )));
            }
            if !response.is_finite() || response < 0.0 {
                return Err(PhotometryError::InvalidBand(format!(
                    "band {name:?} responses must be finite and >= 0"
                )));
            }
            prev = wavelength;
        }
        Ok(Self::from_declared(name, curve, zero_point_jy))
    }

    /// Constructor for the seeded tables, which are declared data and
    /// already well formed.
    pub(crate) fn from_declared(
        name: impl Into<String>,
        curve: &[(f64, f64)],
        zero_point_jy: f64,
    ) -> Self {
        Self {
            name: name.into(),
            wavelengths: curve.iter().map(|p| p.0).collect(),
            response: curve.iter().map(|p| p.1).collect(),
            zero_point_jy,
        }
    }

    /// The band's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First and last wavelength of the transmission table, in Å.
    pub fn support(&self) -> (f64, f64) {
        (
            self.wavelengths[0],
            self.wavelengths[self.wavelengths.len() - 1],
        )
    }

    /// The zero-point flux density in Jansky.
    pub fn zero_point_jy(&self) -> f64 {
        self.zero_point_jy
    }

    /// Transmission linearly interpolated at `wavelength`, zero outside the
    /// table.
    pub fn response_at(&self, wavelength: f64) -> f64 {
        let (lo, hi) = self.support();
        if wavelength < lo || wavelength > hi {
            return 0.0;
        }
        let idx = self.wavelengths.partition_point(|&w| w < wavelength);
        if self.wavelengths[idx] == wavelength {
            return self.response[idx];
        }
        let (w0, w1) = (self.wavelengths[idx - 1], self.wavelengths[idx]);
        let (r0, r1) = (self.response[idx - 1], self.response[idx]);
        r0 + (wavelength - w0) / (w1 - w0) * (r1 - r0)
    }

    /// AB zero-point reference f_λ at `wavelength`, erg s⁻¹ cm⁻² Å⁻¹.
    fn reference_flux(&self, wavelength: f64) -> f64 {
        self.zero_point_jy * JY_TO_CGS * SPEED_OF_LIGHT_A_PER_S / (wavelength * wavelength)
    }

    /// Apparent AB magnitude of `spectrum` in this band.
    ///
    /// The spectrum must span the full band support and sample it with at
    /// least two pixels, at least one of them where the band transmits;
    /// otherwise [`PhotometryError::BandOutOfRange`].
    pub fn magnitude(&self, spectrum: &Spectrum) -> Result<f64, PhotometryError> {
        let (band_lo, band_hi) = self.support();
        let raster = spectrum.wavelengths();
        let spectrum_lo = raster[0];
        let spectrum_hi = raster[raster.len() - 1];

        let out_of_range = || PhotometryError::BandOutOfRange {
            band: self.name.clone(),
            band_lo,
            band_hi,
            spectrum_lo,
            spectrum_hi,
        };
        if spectrum_lo > band_lo || spectrum_hi < band_hi {
            return Err(out_of_range());
        }

        let first = raster.partition_point(|&w| w < band_lo);
        let last = raster.partition_point(|&w| w <= band_hi);
        if last - first < 2 {
            return Err(out_of_range());
        }

        let mut flux_integral = 0.0;
        let mut reference_integral = 0.0;
        let mut previous: Option<(f64, f64, f64)> = None;
        for i in first..last {
            let wavelength = raster[i];
            let transmission = self.response_at(wavelength);
            let flux_term = spectrum.values()[i] * transmission * wavelength;
            let reference_term = self.reference_flux(wavelength) * transmission * wavelength;
            if let Some((w_prev, f_prev, r_prev)) = previous {
                let h = wavelength - w_prev;
                flux_integral += 0.5 * (f_prev + flux_term) * h;
                reference_integral += 0.5 * (r_prev + reference_term) * h;
            }
            previous = Some((wavelength, flux_term, reference_term));
        }

        // Declared tables taper to zero at the support edges, so a raster
        // that samples the support only where the response is zero
        // integrates to nothing and measures no flux at all.
        if !(reference_integral.is_finite() && reference_integral > 0.0) {
            return Err(out_of_range());
        }

        Ok(-2.5 * (flux_integral / reference_integral).log10())
    }
}

static REGISTRY: LazyLock<RwLock<HashMap<String, Arc<PhotometricBand>>>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for band in bands::sdss_bands() {
        map.insert(band.name().to_string(), Arc::new(band));
    }
    RwLock::new(map)
});

/// Look up a registered band by exact name.
pub fn band(name: &str) -> Result<Arc<PhotometricBand>, PhotometryError> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .get(name)
        .cloned()
        .ok_or_else(|| PhotometryError::UnknownBand(name.to_string()))
}

/// Add a band to the process-wide registry.
///
/// Names are unique forever: re-registering an existing name (including the
/// seeded SDSS ones) fails with [`PhotometryError::DuplicateBand`].
pub fn register_band(band: PhotometricBand) -> Result<(), PhotometryError> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if registry.contains_key(band.name()) {
        return Err(PhotometryError::DuplicateBand(band.name().to_string()));
    }
    registry.insert(band.name().to_string(), Arc::new(band));
    Ok(())
}

/// All registered band names, sorted.
pub fn band_names() -> Vec<String> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    names
}

/// Apparent AB magnitude of `spectrum` in the named band.
pub fn magnitude(spectrum: &Spectrum, band_name: &str) -> Result<f64, PhotometryError> {
    band(band_name)?.magnitude(spectrum)
}
