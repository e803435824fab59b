//! Core math functions for the synthesis.
//! If the `libm` feature is enabled, this just exports the required functions.
//! If the `std` feature is enabled, this converts the syntax from the std variety: `f.sqrt()` into
//! the `libm` equiv. `sqrt(f)`.

use core::f64::consts::PI;

#[cfg(feature = "libm")]
pub(crate) use libm::{atan, cos, exp, log10, pow, round, sin, sqrt, tan};

#[cfg(feature = "std")]
pub(crate) fn sqrt(f: f64) -> f64 {
    f.sqrt()
}
#[cfg(feature = "std")]
pub(crate) fn pow(f1: f64, f2: f64) -> f64 {
    f1.powf(f2)
}
#[cfg(feature = "std")]
pub(crate) fn cos(f: f64) -> f64 {
    f.cos()
}
#[cfg(feature = "std")]
pub(crate) fn sin(f: f64) -> f64 {
    f.sin()
}
#[cfg(feature = "std")]
pub(crate) fn tan(f: f64) -> f64 {
    f.tan()
}
#[cfg(feature = "std")]
pub(crate) fn atan(f: f64) -> f64 {
    f.atan()
}
#[cfg(feature = "std")]
pub(crate) fn exp(f: f64) -> f64 {
    f.exp()
}
#[cfg(feature = "std")]
pub(crate) fn log10(f: f64) -> f64 {
    f.log10()
}
#[cfg(feature = "std")]
pub(crate) fn round(f: f64) -> f64 {
    f.round()
}

/// `sin(PI * x)`, exactly zero on integers.
pub(crate) fn sin_pi(x: f64) -> f64 {
    if x == round(x) {
        return 0.0;
    }
    sin(PI * x)
}

/// `cos(PI * x)`, exactly zero on half-integers.
pub(crate) fn cos_pi(x: f64) -> f64 {
    if x - 0.5 == round(x - 0.5) {
        return 0.0;
    }
    cos(PI * x)
}

/// Relative comparison used to decide whether a parameter really changed.
pub(crate) fn fuzzy_equals(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().min(b.abs()).max(1.0)
}

/// Convert a dB value into a linear value.
/// dB values of -99 and below or NaN are converted to 0.
pub(crate) fn db_to_lin(db: f64) -> f64 {
    if db <= -99.0 || db.is_nan() {
        0.0
    } else {
        pow(10.0, db / 20.0)
    }
}

/// Convert a linear amplitude into dB, floored at -120 dB.
pub(crate) fn lin_to_db(lin: f64) -> f64 {
    20.0 * log10(lin.abs().max(1e-6))
}

/// Rounds to three decimals, used where a bound is displayed to the user.
pub(crate) fn round3(x: f64) -> f64 {
    round(x * 1000.0) / 1000.0
}
