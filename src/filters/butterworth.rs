//! Butterworth filter design through an analog prototype and the bilinear transform.
//!
//! # Formulas
//! ## Prototype, order `N`, `M = 2N` poles on the left unit semicircle:
//! ```text
//!    p_k = -sin(PI * (2k + 1) / (2M)) + i * cos(PI * (2k + 1) / (2M)),    k = 0 .. M-1
//! ```
//! ## Pre-warping and bilinear transform:
//! ```text
//!    W = 2 * tan(PI * f / fs)
//!    z = (2 + s) / (2 - s)
//! ```
//! ## Frequency transforms, `W0 = sqrt(W1 * W2)`, `BW = W2 - W1`:
//! ```text
//!    low-pass   s = Wc * p
//!    high-pass  s = Wc / p                                       M zeros at 0
//!    band-pass  s = BW p / 2 +- sqrt(BW^2 p^2 - 4 W0^2) / 2       M zeros at 0
//!    band-stop  s = BW / (2p) +- sqrt(BW^2 / p^2 - 4 W0^2) / 2    zeros at +-i W0
//! ```
//! The gain is normalized to unity at DC (low-pass, band-stop), at Nyquist (high-pass) or at
//! the digital image of `W0` (band-pass).

use super::sos::{SosFilter, sos_response, zpk2sos};
use crate::error::{Error, Result};
use crate::math::{atan, cos_pi, pow, sin_pi, sqrt, tan};
use core::f64::consts::PI;
use core::str::FromStr;
use num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    BandStop,
}

impl FromStr for FilterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "lowpass" | "lp" => Ok(FilterType::LowPass),
            "highpass" | "hp" => Ok(FilterType::HighPass),
            "bandpass" | "bp" => Ok(FilterType::BandPass),
            "bandstop" | "bs" | "notch" => Ok(FilterType::BandStop),
            _ => Err(Error::UnknownFilterType(s.to_owned())),
        }
    }
}

/// Low-pass at `fc` Hz.
///
/// # Errors
///
/// See [`design`].
pub fn low_pass(fs: f64, fc: f64, order: usize) -> Result<SosFilter> {
    design(FilterType::LowPass, fs, fc, fc, order)
}

/// High-pass at `fc` Hz.
///
/// # Errors
///
/// See [`design`].
pub fn high_pass(fs: f64, fc: f64, order: usize) -> Result<SosFilter> {
    design(FilterType::HighPass, fs, fc, fc, order)
}

/// Band-pass between `f1` and `f2` Hz.
///
/// # Errors
///
/// See [`design`].
pub fn band_pass(fs: f64, f1: f64, f2: f64, order: usize) -> Result<SosFilter> {
    design(FilterType::BandPass, fs, f1, f2, order)
}

/// Band-stop between `f1` and `f2` Hz.
///
/// # Errors
///
/// See [`design`].
pub fn band_stop(fs: f64, f1: f64, f2: f64, order: usize) -> Result<SosFilter> {
    design(FilterType::BandStop, fs, f1, f2, order)
}

/// Designs a Butterworth filter. For low-pass and high-pass only `f2` is used.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] for a non-positive sample rate, a zero order or a corner
///   frequency outside `(0, fs / 2)`.
/// - [`Error::UnstablePole`] when a transformed pole lands in the right half plane.
/// - [`Error::UnpairedRoots`] when the poles cannot be grouped into sections.
pub fn design(kind: FilterType, fs: f64, f1: f64, f2: f64, order: usize) -> Result<SosFilter> {
    if fs.is_nan() || fs <= 0.0 {
        return Err(Error::invalid_param("fs", format!("sample rate must be positive, got {fs}")));
    }
    if order == 0 {
        return Err(Error::invalid_param("order", "order must be at least 1"));
    }
    for f in [f1, f2] {
        if f.is_nan() || f <= 0.0 || f >= fs / 2.0 {
            return Err(Error::invalid_param(
                "fc",
                format!("corner frequency {f} Hz outside (0, {}) Hz", fs / 2.0),
            ));
        }
    }

    let mut w1 = 2.0 * tan(PI * f1 / fs);
    let mut w2 = 2.0 * tan(PI * f2 / fs);
    if w1 > w2 {
        core::mem::swap(&mut w1, &mut w2);
    }

    let prototype = prototype_poles(order);
    let (zeros, poles): (Vec<Complex64>, Vec<Complex64>) = match kind {
        FilterType::LowPass => (Vec::new(), prototype.iter().map(|&p| w2 * p).collect()),
        FilterType::HighPass => (
            vec![Complex64::new(0.0, 0.0); prototype.len()],
            prototype.iter().map(|&p| w2 / p).collect(),
        ),
        FilterType::BandPass => {
            let (w0, bw) = (sqrt(w1 * w2), w2 - w1);
            let mut poles = Vec::with_capacity(2 * prototype.len());
            for &p in &prototype {
                let half = 0.5 * bw * p;
                let root = 0.5 * (bw * bw * p * p - 4.0 * w0 * w0).sqrt();
                poles.push(half + root);
                poles.push(half - root);
            }
            (vec![Complex64::new(0.0, 0.0); prototype.len()], poles)
        }
        FilterType::BandStop => {
            let (w0, bw) = (sqrt(w1 * w2), w2 - w1);
            let mut poles = Vec::with_capacity(2 * prototype.len());
            let mut zeros = Vec::with_capacity(2 * prototype.len());
            for &p in &prototype {
                let half = 0.5 * bw / p;
                let root = 0.5 * (bw * bw / (p * p) - 4.0 * w0 * w0).sqrt();
                poles.push(half + root);
                poles.push(half - root);
                zeros.push(Complex64::new(0.0, w0));
                zeros.push(Complex64::new(0.0, -w0));
            }
            (zeros, poles)
        }
    };

    if let Some(p) = poles.iter().find(|p: &&Complex64| p.re > 0.0) {
        return Err(Error::UnstablePole { re: p.re, im: p.im });
    }

    let bilinear = |s: Complex64| (2.0 + s) / (2.0 - s);
    let mut digital_zeros: Vec<Complex64> = zeros.into_iter().map(bilinear).collect();
    let digital_poles: Vec<Complex64> = poles.into_iter().map(bilinear).collect();
    // zeros at infinity map to Nyquist
    digital_zeros.resize(digital_poles.len(), Complex64::new(-1.0, 0.0));

    let mut sos = zpk2sos(&digital_zeros, &digital_poles, 1.0)?;

    let reference = match kind {
        FilterType::LowPass | FilterType::BandStop => 0.0,
        FilterType::HighPass => PI,
        FilterType::BandPass => 2.0 * atan(sqrt(w1 * w2) / 2.0),
    };
    let gain = 1.0 / sos_response(&sos, reference).norm();
    let per_section = pow(gain, 1.0 / sos.len() as f64);
    for section in &mut sos {
        for b in &mut section[..3] {
            *b *= per_section;
        }
    }

    log::debug!("designed {kind:?} Butterworth, order {order}, {} sections", sos.len());
    Ok(SosFilter::new(sos))
}

fn prototype_poles(order: usize) -> Vec<Complex64> {
    let m = 2 * order;
    (0..m)
        .map(|k| {
            let arg = (2 * k + 1) as f64 / (2 * m) as f64;
            Complex64::new(-sin_pi(arg), cos_pi(arg))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::lin_to_db;
    use approx::assert_relative_eq;

    fn gain_at(filter: &SosFilter, fs: f64, f: f64) -> f64 {
        filter.frequency_response(2.0 * PI * f / fs).norm()
    }

    /// Digital frequency the analog band center maps to.
    fn geometric_center(fs: f64, f1: f64, f2: f64) -> f64 {
        let (w1, w2) = (2.0 * tan(PI * f1 / fs), 2.0 * tan(PI * f2 / fs));
        2.0 * atan((w1 * w2).sqrt() / 2.0)
    }

    #[test]
    fn prototype_poles_are_distinct_and_stable() {
        let poles = prototype_poles(3);
        assert_eq!(poles.len(), 6);
        for (i, p) in poles.iter().enumerate() {
            assert!(p.re < 0.0);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-15);
            for q in &poles[i + 1..] {
                assert!((p - q).norm() > 1e-6, "duplicate pole {p}");
            }
        }
    }

    #[test]
    fn low_pass_is_unity_at_dc_and_half_power_at_cutoff() {
        let fs = 48_000.0;
        let filter = low_pass(fs, 1000.0, 2).unwrap();
        assert_relative_eq!(gain_at(&filter, fs, 0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(lin_to_db(gain_at(&filter, fs, 1000.0)), -3.0103, epsilon = 1e-3);
        assert!(gain_at(&filter, fs, 10_000.0) < 1e-3);
    }

    #[test]
    fn low_pass_dc_gain_holds_for_every_order() {
        let fs = 48_000.0;
        let mut previous_stop = f64::INFINITY;
        for order in 1..=8 {
            let filter = low_pass(fs, 1000.0, order).unwrap();
            assert_eq!(filter.coefficients().len(), order);
            assert!(lin_to_db(gain_at(&filter, fs, 0.0)).abs() < 0.1, "order {order}");
            assert!(filter.frequency_response(PI).norm() < 1e-6, "order {order} at Nyquist");
            let stop = gain_at(&filter, fs, 3000.0);
            assert!(stop < previous_stop, "order {order}: {stop} >= {previous_stop}");
            previous_stop = stop;
        }
    }

    #[test]
    fn high_pass_is_unity_at_nyquist() {
        let fs = 44_100.0;
        let filter = high_pass(fs, 500.0, 2).unwrap();
        assert_relative_eq!(filter.frequency_response(PI).norm(), 1.0, epsilon = 1e-12);
        assert!(gain_at(&filter, fs, 50.0) < 1e-3);
    }

    #[test]
    fn band_pass_peaks_at_the_center() {
        let fs = 48_000.0;
        let filter = band_pass(fs, 1000.0, 2000.0, 1).unwrap();
        let w0 = geometric_center(fs, 1000.0, 2000.0);
        assert_relative_eq!(filter.frequency_response(w0).norm(), 1.0, epsilon = 1e-12);
        assert!(gain_at(&filter, fs, 100.0) < 0.1);
        assert!(gain_at(&filter, fs, 15_000.0) < 0.1);
    }

    #[test]
    fn band_stop_rejects_the_center() {
        let fs = 48_000.0;
        let filter = band_stop(fs, 1000.0, 2000.0, 1).unwrap();
        assert_relative_eq!(gain_at(&filter, fs, 0.0), 1.0, epsilon = 1e-12);
        let w0 = geometric_center(fs, 1000.0, 2000.0);
        assert!(filter.frequency_response(w0).norm() < 1e-9);
    }

    #[test]
    fn invalid_designs_are_errors() {
        assert!(matches!(low_pass(48_000.0, 30_000.0, 2), Err(Error::InvalidParameter { .. })));
        assert!(matches!(low_pass(48_000.0, 1000.0, 0), Err(Error::InvalidParameter { .. })));
        assert_eq!(
            "comb".parse::<FilterType>(),
            Err(Error::UnknownFilterType("comb".into()))
        );
        assert_eq!("Band-Pass".parse::<FilterType>(), Ok(FilterType::BandPass));
    }
}
