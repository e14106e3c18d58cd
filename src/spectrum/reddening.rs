//! Interstellar reddening with the Fitzpatrick (1999) extinction law.
//!
//! The curve is parameterised for the diffuse-ISM value R_V = 3.1. Redward
//! of 2600 Å it is a natural cubic spline through the published optical/IR
//! anchor points; blueward it follows the FM90 UV parameterisation, whose
//! value at the joint matches the last spline anchor.
//!
//! Evaluating the curve is the expensive part, so [`SpectrumReddener`]
//! computes k(λ) = A(λ)/E(B−V) once for its spectrum's wavelength grid and
//! reuses it across `redden` calls with different colour excesses.

use crate::spectrum::Spectrum;

const R_V: f64 = 3.1;

/// Spline anchors: x = 1/λ in μm⁻¹ against A(λ)/E(B−V) for R_V = 3.1.
/// The last two anchors sit on the UV branch, which keeps the spline and
/// the FM90 formula continuous at the 2600 Å joint.
const ANCHOR_X: [f64; 9] = [0.0, 0.377, 0.820, 1.667, 1.828, 2.141, 2.433, 3.704, 3.846];
const ANCHOR_K: [f64; 9] = [0.0, 0.265, 0.829, 2.688, 3.055, 3.806, 4.315, 6.265, 6.591];

/// x above this (λ below 2600 Å) uses the FM90 UV branch.
const UV_JOIN_X: f64 = 3.846;

// FM90 parameters for R_V = 3.1 (Fitzpatrick 1999, table 4).
const UV_X0: f64 = 4.596;
const UV_GAMMA: f64 = 0.99;
const UV_C3: f64 = 3.23;
const UV_C4: f64 = 0.41;

/// Applies interstellar extinction to one spectrum, caching the curve.
#[derive(Debug)]
pub struct SpectrumReddener<'a> {
    source: &'a Spectrum,
    curve: Vec<f64>,
}

impl<'a> SpectrumReddener<'a> {
    /// Build a reddener for `source`, evaluating the extinction curve on
    /// its wavelength grid.
    pub fn new(source: &'a Spectrum) -> Self {
        Self {
            curve: extinction_curve(source.wavelengths()),
            source,
        }
    }

    /// The cached k(λ) = A(λ)/E(B−V) values, one per source pixel.
    pub fn extinction(&self) -> &[f64] {
        &self.curve
    }

    /// Return a new spectrum reddened by colour excess `e_bv`.
    ///
    /// Each pixel's value and error are multiplied by
    /// `10^(−0.4 · k(λ) · E(B−V))`. An `e_bv` of zero returns an unchanged
    /// copy; negative values de-redden.
    pub fn redden(&self, e_bv: f64) -> Spectrum {
        if e_bv == 0.0 {
            return self.source.clone();
        }
        let factors: Vec<f64> = self
            .curve
            .iter()
            .map(|k| 10f64.powf(-0.4 * k * e_bv))
            .collect();
        let values = self
            .source
            .values()
            .iter()
            .zip(&factors)
            .map(|(v, f)| v * f)
            .collect();
        let value_errors = self
            .source
            .value_errors()
            .iter()
            .zip(&factors)
            .map(|(e, f)| e * f)
            .collect();
        Spectrum::from_parts_unchecked(
            self.source.wavelengths().to_vec(),
            values,
            value_errors,
            self.source.metadata().clone(),
        )
    }
}

/// k(λ) = A(λ)/E(B−V) for each wavelength (Å).
fn extinction_curve(wavelengths: &[f64]) -> Vec<f64> {
    let m = natural_spline_moments(&ANCHOR_X, &ANCHOR_K);
    wavelengths
        .iter()
        .map(|&lambda| {
            let x = 1.0e4 / lambda;
            if x > UV_JOIN_X {
                uv_k(x)
            } else {
                spline_eval(&ANCHOR_X, &ANCHOR_K, &m, x)
            }
        })
        .collect()
}

/// FM90 ultraviolet branch, valid for x > 3.846 μm⁻¹.
fn uv_k(x: f64) -> f64 {
    let c2 = -0.824 + 4.717 / R_V;
    let c1 = 2.030 - 3.007 * c2;
    let x2 = x * x;
    let drude = x2 / ((x2 - UV_X0 * UV_X0).powi(2) + (x * UV_GAMMA).powi(2));
    let mut k = c1 + c2 * x + UV_C3 * drude;
    if x > 5.9 {
        let y = x - 5.9;
        k += UV_C4 * (0.5392 * y * y + 0.05644 * y * y * y);
    }
    k + R_V
}

/// Second derivatives of the natural cubic spline through (xs, ys),
/// solved with the Thomas algorithm. Endpoints stay zero.
fn natural_spline_moments(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut moments = vec![0.0; n];
    if n < 3 {
        return moments;
    }

    let mut scratch_sup = vec![0.0; n];
    let mut scratch_rhs = vec![0.0; n];
    for i in 1..n - 1 {
        let sub = (xs[i] - xs[i - 1]) / 6.0;
        let diag = (xs[i + 1] - xs[i - 1]) / 3.0;
        let sup = (xs[i + 1] - xs[i]) / 6.0;
        let rhs = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
            - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);

        let denom = diag - sub * scratch_sup[i - 1];
        scratch_sup[i] = sup / denom;
        scratch_rhs[i] = (rhs - sub * scratch_rhs[i - 1]) / denom;
    }
    for i in (1..n - 1).rev() {
        moments[i] = scratch_rhs[i] - scratch_sup[i] * moments[i + 1];
    }
    moments
}

fn spline_eval(xs: &[f64], ys: &[f64], moments: &[f64], x: f64) -> f64 {
    let n = xs.len();
    // x is clamped into the knot range by the caller's branch on UV_JOIN_X;
    // wavelengths are positive so x > xs[0] = 0 always holds.
    let idx = xs.partition_point(|&k| k < x).clamp(1, n - 1);
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);
    let (m0, m1) = (moments[idx - 1], moments[idx]);
    let h = x1 - x0;
    let a = x1 - x;
    let b = x - x0;
    m0 * a * a * a / (6.0 * h)
        + m1 * b * b * b / (6.0 * h)
        + (y0 / h - m0 * h / 6.0) * a
        + (y1 / h - m1 * h / 6.0) * b
}
