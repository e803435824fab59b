//! The Liljencrants–Fant model of the glottal flow derivative.
//!
//! # Formulas
//! ## Variables:
//! ```text
//!    Ee = amplitude of the negative peak at Te (always 1 here)
//!    Te = instant of the main excitation, Tp = instant of maximum flow, Ta = return time
//!    wg = PI / Tp
//! ```
//! ## Open phase, `0 <= t <= Te`:
//! ```text
//!    dg(t) = -Ee * e^(alpha * (t - Te)) * sin(wg * t) / sin(wg * Te)
//! ```
//! ## Return phase, `Te < t <= 1`:
//! ```text
//!    dg(t) = -Ee / (epsilon * Ta) * (e^(-epsilon * (t - Te)) - e^(-epsilon * (1 - Te)))
//! ```
//! ## Implicit equations:
//! ```text
//!    1 - e^(-epsilon * (1 - Te)) - epsilon * Ta = 0
//!    1 / (a^2 + wg^2) * ((e^(-a * Te) - cos(wg * Te)) * wg / sin(wg * Te) + a) = A
//!    A = (1 - Te) / (e^(epsilon * (1 - Te)) - 1) - 1 / epsilon
//! ```
//! The second equation makes the flow return to zero at the end of the period.

use super::fold_time;
use super::parameters::GlottalFlowParameters;
use super::rd::{self, LfShape};
use crate::error::{Error, Result};
use crate::math::{cos_pi, exp, sin_pi};
use crate::solve::{bracket_and_bisect, schroder_iterate};
use core::f64::consts::PI;

pub const OQ_BOUNDS: (f64, f64) = (0.35, 0.85);
pub const AM_BOUNDS: (f64, f64) = (0.55, 0.915);
pub const QA_BOUNDS: (f64, f64) = (0.0, 0.9);

/// Candidate points for bracketing alpha. The alpha equation is not monotonic, so the first
/// sign change along this ladder selects the root.
const ALPHA_LADDER: [f64; 21] = [
    -1e20, -1e9, -1e8, -1e7, -1e6, -1e5, -1e4, -1e3, -1e2, -1e1, 0.0, 1e1, 1e2, 1e3, 1e4, 1e5,
    1e6, 1e7, 1e8, 1e9, 1e20,
];

const EPSILON_MAX_ITER: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Lf {
    ee: f64,
    te: f64,
    tp: f64,
    ta: f64,
    alpha: f64,
    epsilon: f64,
}

impl Default for Lf {
    fn default() -> Self {
        let mut lf = Lf {
            ee: 1.0,
            te: 0.45,
            tp: 0.45 * 0.87,
            ta: 0.0,
            alpha: 0.0,
            epsilon: f64::INFINITY,
        };
        if let Err(e) = lf.fit_times(0.45, 0.45 * 0.87, 0.09 * 0.55) {
            log::warn!("LF: default fit rejected: {e}");
        }
        lf
    }
}

impl Lf {
    /// Fits from the active convention of `params`. On error the previous state is kept.
    ///
    /// # Errors
    ///
    /// [`Error::NonConvergent`] when either implicit equation has no usable root.
    pub fn fit_parameters(&mut self, params: &GlottalFlowParameters) -> Result<()> {
        if params.using_rd() {
            self.set_shape(rd::lookup(params.rd.value()));
            return Ok(());
        }
        let oq = params.oq.value();
        let am = params.am.value().max(0.5 + 1e-6);
        let qa = params.qa.value();
        self.fit_times(oq, am * oq, qa * (1.0 - oq))
    }

    /// Solves for `epsilon` and `alpha` with the given time constants.
    ///
    /// # Errors
    ///
    /// [`Error::NonConvergent`]; the model is left untouched.
    pub fn fit_times(&mut self, te: f64, tp: f64, ta: f64) -> Result<()> {
        let epsilon = solve_epsilon(te, ta)?;
        let alpha = solve_alpha(te, tp, ta, epsilon)?;
        self.set_shape(LfShape {
            te,
            tp,
            ta,
            alpha,
            epsilon,
        });
        Ok(())
    }

    fn set_shape(&mut self, shape: LfShape) {
        self.ee = 1.0;
        self.te = shape.te;
        self.tp = shape.tp;
        self.ta = shape.ta;
        self.alpha = shape.alpha;
        self.epsilon = shape.epsilon;
    }

    pub fn update_parameter_bounds(&self, params: &mut GlottalFlowParameters) {
        params.oq.set_min(OQ_BOUNDS.0);
        params.oq.set_max(OQ_BOUNDS.1);
        params.am.set_min(AM_BOUNDS.0);
        params.am.set_max(AM_BOUNDS.1);
        params.qa.set_min(QA_BOUNDS.0);
        params.qa.set_max(QA_BOUNDS.1);
    }

    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.te {
            -self.ee * exp(self.alpha * (t - self.te)) * sin_pi(t / self.tp)
                / sin_pi(self.te / self.tp)
        } else if self.epsilon.is_infinite() || self.epsilon.is_nan() {
            0.0
        } else {
            -self.ee / (self.epsilon * self.ta)
                * (exp(-self.epsilon * (t - self.te)) - exp(-self.epsilon * (1.0 - self.te)))
        }
    }

    /// The glottal flow, zero at `t = 0`.
    #[must_use]
    pub fn evaluate_antiderivative(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.te {
            self.open_phase_flow(t)
        } else {
            self.open_phase_flow(self.te) + self.return_phase_flow(t)
        }
    }

    fn open_phase_flow(&self, t: f64) -> f64 {
        let wg = PI / self.tp;
        let a = self.alpha;
        let eat = exp(a * t);
        -(self.ee * exp(-a * self.te)) / sin_pi(self.te / self.tp) / (a * a + wg * wg)
            * (wg + a * eat * sin_pi(t / self.tp) - wg * eat * cos_pi(t / self.tp))
    }

    /// Integral of the return branch from `Te` to `t`.
    fn return_phase_flow(&self, t: f64) -> f64 {
        if self.epsilon.is_infinite() || self.epsilon.is_nan() {
            return 0.0;
        }
        let eps = self.epsilon;
        let tail = exp(-eps * (1.0 - self.te));
        let dt = t - self.te;
        -self.ee / (eps * self.ta) * ((1.0 - exp(-eps * dt)) / eps - tail * dt)
    }

    #[must_use]
    pub fn te(&self) -> f64 {
        self.te
    }

    #[must_use]
    pub fn tp(&self) -> f64 {
        self.tp
    }

    #[must_use]
    pub fn ta(&self) -> f64 {
        self.ta
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

/// Return-phase decay rate. Infinite when there is no return phase.
pub(crate) fn solve_epsilon(te: f64, ta: f64) -> Result<f64> {
    if ta < f64::EPSILON {
        return Ok(f64::INFINITY);
    }
    let t_closed = 1.0 - te;
    let f = |e: f64| {
        let decay = exp(-e * t_closed);
        (
            1.0 - decay - e * ta,
            t_closed * decay - ta,
            -t_closed * t_closed * decay,
        )
    };
    match schroder_iterate(f, 1.0 / ta, 0.0, 2.0 / ta, EPSILON_MAX_ITER) {
        // e = 0 always solves the equation; it is not the return phase
        Some(epsilon) if epsilon.is_finite() && epsilon * ta > 1e-9 => Ok(epsilon),
        _ => Err(Error::non_convergent("epsilon")),
    }
}

/// Open-phase growth rate balancing the flow over one period.
pub(crate) fn solve_alpha(te: f64, tp: f64, ta: f64, epsilon: f64) -> Result<f64> {
    let area = if epsilon.is_infinite() {
        0.0
    } else {
        (1.0 - te) / (exp(epsilon * (1.0 - te)) - 1.0) - 1.0 / epsilon
    };
    if area.is_nan() || ta.is_nan() {
        return Err(Error::non_convergent("alpha"));
    }

    let wg = PI / tp;
    let sin_wte = sin_pi(te / tp);
    let cos_wte = cos_pi(te / tp);
    let f = |a: f64| 1.0 / (a * a + wg * wg) * ((exp(-a * te) - cos_wte) * wg / sin_wte + a) - area;

    bracket_and_bisect(f, &ALPHA_LADDER)
        .filter(|alpha| alpha.is_finite())
        .ok_or(Error::non_convergent("alpha"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrature::integrate;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn fitted(oq: f64, am: f64, qa: f64) -> Lf {
        let mut lf = Lf::default();
        lf.fit_times(oq, am * oq, qa * (1.0 - oq)).unwrap();
        lf
    }

    #[test]
    fn negative_peak_at_te() {
        let lf = fitted(0.6, 0.7, 0.1);
        assert_relative_eq!(lf.evaluate(lf.te()), -1.0, epsilon = 1e-12);
        // continuous across Te
        assert_relative_eq!(lf.evaluate(lf.te() + 1e-9), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn epsilon_solves_its_equation() {
        let lf = fitted(0.6, 0.7, 0.1);
        let residual = 1.0 - exp(-lf.epsilon() * (1.0 - lf.te())) - lf.epsilon() * lf.ta();
        assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn flow_returns_to_zero() {
        let shapes = [(0.6, 0.7, 0.1), (0.45, 0.87, 0.09), (0.8, 0.6, 0.5), (0.4, 0.9, 0.0)];
        for (oq, am, qa) in shapes {
            let lf = fitted(oq, am, qa);
            assert_abs_diff_eq!(lf.evaluate_antiderivative(1.0), 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn antiderivative_matches_quadrature_on_both_phases() {
        let lf = fitted(0.55, 0.75, 0.3);
        let te = lf.te();
        let open = integrate(|t| lf.evaluate(t), 0.0, te);
        let ret = integrate(|t| lf.evaluate(t), te, 1.0);
        assert_relative_eq!(lf.evaluate_antiderivative(te), open, epsilon = 1e-9);
        assert_relative_eq!(
            lf.evaluate_antiderivative(1.0) - lf.evaluate_antiderivative(te),
            ret,
            epsilon = 1e-9
        );
    }

    #[test]
    fn zero_return_phase_gives_infinite_epsilon() {
        let lf = fitted(0.5, 0.8, 0.0);
        assert!(lf.epsilon().is_infinite());
        assert_eq!(lf.evaluate(0.9), 0.0);
    }

    #[test]
    fn fit_over_the_valid_region_never_leaves_nan() {
        let mut lf = Lf::default();
        for i in 0..=10 {
            for j in 0..=10 {
                for k in 0..=9 {
                    let oq = 0.35 + 0.05 * f64::from(i);
                    let am = 0.55 + 0.0365 * f64::from(j);
                    let qa = 0.1 * f64::from(k);
                    let before = lf.clone();
                    if lf.fit_times(oq, am * oq, qa * (1.0 - oq)).is_err() {
                        assert_eq!(lf, before, "failed fit must keep state");
                    }
                    assert!(lf.alpha().is_finite(), "alpha at {oq} {am} {qa}");
                    assert!(!lf.epsilon().is_nan(), "epsilon at {oq} {am} {qa}");
                }
            }
        }
    }

    #[test]
    fn time_is_folded_outside_the_period() {
        let lf = fitted(0.6, 0.7, 0.1);
        assert_eq!(lf.evaluate(1.25), lf.evaluate(-0.25));
        assert_eq!(lf.evaluate(-1.25), lf.evaluate(-0.25));
    }

    #[test]
    fn shape_mode_reads_the_table() {
        let mut params = GlottalFlowParameters::new();
        params.set_using_rd(true);
        params.rd.set_value(rd::rd_at(990));
        let mut lf = Lf::default();
        lf.fit_parameters(&params).unwrap();
        let entry = rd::table_entry(990).unwrap();
        assert_eq!(lf.alpha(), entry.alpha);
        assert_eq!(lf.te(), entry.te);
    }
}
