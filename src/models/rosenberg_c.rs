//! Rosenberg's trigonometric pulse (type C).
//!
//! # Formulas
//! ```text
//!    Tp = am * Oq,  Tn = Oq - Tp,  A = 2 Tn / PI
//!
//!    dg(t) =  PI A / (2 Tp) * sin(PI t / Tp)                 0 <= t <= Tp
//!    dg(t) = -PI A / (2 Tn) * sin(PI / 2 * (t - Tp) / Tn)    Tp < t <= Tp + Tn
//!    dg(t) =  0                                              otherwise
//! ```
//! `A` makes the negative peak at `Tp + Tn` equal to `-1`.

use super::fold_time;
use super::parameters::{GlottalFlowParameters, Shape};
use crate::math::{cos_pi, sin_pi};
use core::f64::consts::PI;

pub const OQ_BOUNDS: (f64, f64) = (0.35, 0.85);
pub const AM_BOUNDS: (f64, f64) = (0.55, 0.9);

#[derive(Debug, Clone, PartialEq)]
pub struct RosenbergC {
    tp: f64,
    tn: f64,
    a: f64,
}

impl Default for RosenbergC {
    fn default() -> Self {
        let mut model = RosenbergC {
            tp: 0.0,
            tn: 0.0,
            a: 0.0,
        };
        model.fit_shape(Shape {
            oq: super::parameters::DEFAULT_OQ,
            am: super::parameters::DEFAULT_AM,
            qa: 0.0,
        });
        model
    }
}

impl RosenbergC {
    pub fn fit_parameters(&mut self, params: &GlottalFlowParameters) {
        let mut shape = params.shape();
        if params.using_rd() {
            shape = shape.clamped(OQ_BOUNDS, AM_BOUNDS, (0.0, 0.0));
        }
        self.fit_shape(shape);
    }

    fn fit_shape(&mut self, shape: Shape) {
        self.tp = shape.am * shape.oq;
        self.tn = shape.oq - self.tp;
        self.a = 2.0 / PI * self.tn;
    }

    pub fn update_parameter_bounds(&self, params: &mut GlottalFlowParameters) {
        params.oq.set_min(OQ_BOUNDS.0);
        params.oq.set_max(OQ_BOUNDS.1);
        params.am.set_min(AM_BOUNDS.0);
        params.am.set_max(AM_BOUNDS.1);
        params.qa.set_fixed(0.0);
    }

    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.tp {
            PI * self.a / (2.0 * self.tp) * sin_pi(t / self.tp)
        } else if t <= self.tp + self.tn {
            -PI * self.a / (2.0 * self.tn) * sin_pi(0.5 * (t - self.tp) / self.tn)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn evaluate_antiderivative(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.tp {
            self.a / 2.0 * (1.0 - cos_pi(t / self.tp))
        } else if t <= self.tp + self.tn {
            self.a * cos_pi(0.5 * (t - self.tp) / self.tn)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn te(&self) -> f64 {
        self.tp + self.tn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn closes_at_te_with_unit_peak() {
        let mut model = RosenbergC::default();
        model.fit_shape(Shape {
            oq: 0.6,
            am: 0.7,
            qa: 0.0,
        });
        assert_relative_eq!(model.te(), 0.6, epsilon = 1e-15);
        assert_relative_eq!(model.evaluate(0.6), -1.0, epsilon = 1e-12);
        assert_eq!(model.evaluate(0.8), 0.0);
        assert_eq!(model.evaluate_antiderivative(0.6), 0.0);
        assert_relative_eq!(model.evaluate_antiderivative(0.42), model.a, epsilon = 1e-12);
    }

    #[test]
    fn bounds_pin_the_return_phase() {
        let mut params = GlottalFlowParameters::new();
        RosenbergC::default().update_parameter_bounds(&mut params);
        assert!(params.qa.is_fixed());
        assert_eq!(params.qa.value(), 0.0);
        assert_eq!((params.am.min(), params.am.max()), AM_BOUNDS);
    }
}
