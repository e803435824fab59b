//! Trapezoidal state-variable filter realizing an arbitrary biquad.
//!
//! A direct-form biquad reacts badly to coefficients that change every few samples; the
//! state-variable form keeps its internal state meaningful across coefficient updates,
//! which is what the formant ramps need.
//!
//! # Formulas
//! ## Mapping from `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`:
//! ```text
//!    m1 = -1 - a1 - a2,   m2 = -1 + a1 - a2
//!    g   = Re(sqrt(m1) / sqrt(m2))
//!    R   = (a2 - 1) / Re(sqrt(m1) * sqrt(m2))
//!    cHP = (b0 - b1 + b2) / (1 - a1 + a2)
//!    cBP = 2 (b2 - b0) / Re(sqrt(m1) * sqrt(m2))
//!    cLP = (b0 + b1 + b2) / (1 + a1 + a2)
//! ```
//! `m1` and `m2` are negative for every stable resonator, so both square roots are purely
//! imaginary and their product is real.

use super::sos::Sos;
use crate::traits::BasicFilter;
use num_complex::Complex64;

/// High-pass, band-pass and low-pass outputs of one [`SvfPiece`] tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SvfOutputs {
    pub hp: f64,
    pub bp: f64,
    pub lp: f64,
}

/// The two-integrator loop with gain `g` and damping `R`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvfPiece {
    g: f64,
    r: f64,
    z1: f64,
    z2: f64,
}

impl SvfPiece {
    /// Changes the gains without touching the state.
    pub fn set(&mut self, g: f64, r: f64) {
        self.g = g;
        self.r = r;
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn tick(&mut self, x: f64) -> SvfOutputs {
        let (g, r) = (self.g, self.r);
        let hp = (x - (2.0 * r + g) * self.z1 - self.z2) / (1.0 + 2.0 * r * g + g * g);
        let bp = g * hp + self.z1;
        let lp = g * bp + self.z2;
        self.z1 = g * hp + bp;
        self.z2 = g * bp + lp;
        SvfOutputs { hp, bp, lp }
    }
}

/// A biquad expressed as a mix of the three [`SvfPiece`] outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvfBiquad {
    piece: SvfPiece,
    c_hp: f64,
    c_bp: f64,
    c_lp: f64,
    sos: Sos,
}

impl SvfBiquad {
    /// Retunes to the section `[b0, b1, b2, a0, a1, a2]`, keeping the filter state.
    pub fn update(&mut self, sos: Sos) {
        let a0 = sos[3];
        let [b0, b1, b2] = [sos[0] / a0, sos[1] / a0, sos[2] / a0];
        let [a1, a2] = [sos[4] / a0, sos[5] / a0];

        let m1 = -1.0 - a1 - a2;
        let m2 = -1.0 + a1 - a2;
        let sm1 = Complex64::new(m1, 0.0).sqrt();
        let sm2 = Complex64::new(m2, 0.0).sqrt();
        let quotient = (sm1 / sm2).re;
        let product = (sm1 * sm2).re;

        self.piece.set(quotient, (a2 - 1.0) / product);
        self.c_hp = (b0 - b1 + b2) / (1.0 - a1 + a2);
        self.c_bp = 2.0 * (b2 - b0) / product;
        self.c_lp = (b0 + b1 + b2) / (1.0 + a1 + a2);
        self.sos = [b0, b1, b2, 1.0, a1, a2];
    }

    pub fn reset(&mut self) {
        self.piece.reset();
    }

    #[inline]
    pub fn tick(&mut self, x: f64) -> f64 {
        let out = self.piece.tick(x);
        self.c_hp * out.hp + self.c_bp * out.bp + self.c_lp * out.lp
    }

    /// The direct-form section this filter currently realizes.
    #[must_use]
    pub fn sos(&self) -> Sos {
        self.sos
    }
}

impl BasicFilter for SvfBiquad {
    fn sos_coefficients(&self) -> Vec<Sos> {
        vec![self.sos]
    }

    fn step(&mut self, x: f64) -> f64 {
        self.tick(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SosFilter;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn resonator(r: f64, w: f64) -> Sos {
        let a1 = -2.0 * r * w.cos();
        let a2 = r * r;
        [1.0 + a1 + a2, 0.0, 0.0, 1.0, a1, a2]
    }

    fn assert_matches_direct_form(sos: Sos) {
        let mut svf = SvfBiquad::default();
        svf.update(sos);
        let mut direct = SosFilter::new(vec![sos]);
        let mut rng = SmallRng::seed_from_u64(3);
        for n in 0..2000 {
            let x = if n == 0 { 1.0 } else { rng.random_range(-1.0..1.0) };
            assert_abs_diff_eq!(svf.tick(x), direct.step(x), epsilon = 1e-9);
        }
    }

    #[test]
    fn resonator_matches_direct_form() {
        assert_matches_direct_form(resonator(0.98, 0.1));
        assert_matches_direct_form(resonator(0.9, 2.5));
    }

    #[test]
    fn full_biquad_matches_direct_form() {
        // includes b2 != b0, which exercises the band-pass mix
        assert_matches_direct_form([0.3, -0.2, 0.7, 1.0, -1.2, 0.5]);
        assert_matches_direct_form([2.0, 0.4, -0.6, 2.0, 0.3, 0.4]);
    }

    #[test]
    fn update_keeps_the_state() {
        let mut svf = SvfBiquad::default();
        svf.update(resonator(0.95, 0.3));
        svf.tick(1.0);
        svf.update(resonator(0.95, 0.31));
        assert!(svf.tick(0.0) != 0.0);
        svf.reset();
        assert_eq!(svf.tick(0.0), 0.0);
    }

    #[test]
    fn reports_the_normalized_section() {
        let mut svf = SvfBiquad::default();
        svf.update([2.0, 0.4, -0.6, 2.0, 0.3, 0.4]);
        assert_eq!(svf.sos_coefficients(), vec![[1.0, 0.2, -0.3, 1.0, 0.15, 0.2]]);
    }
}
