//! The R++ model of Veldhuis: a cubic open phase and the LF exponential return phase.
//!
//! # Formulas
//! ```text
//!    D  = 1 - ((1 - Te) / Ta) / (e^((1 - Te) / Ta) - 1)
//!    Tx = Te * (1 - (Te^2 / 2 - Te * Tp) / (2 Te^2 - 3 Te * Tp + 6 Ta (Te - Tp) D))
//!    K  = -1 / (4 Te (Tp - Te) (Tx - Te))
//!
//!    dg(t) = 4 K t (Tp - t) (Tx - t)                              0 <= t <= Te
//!    dg(t) = dg(Te) * (e^(-(t - Te) / Ta) - E) / (1 - E)          Te < t <= 1
//!    E     = e^(-(1 - Te) / Ta)
//! ```
//! `Tx` is chosen so that the flow returns to zero at the end of the period.

use super::fold_time;
use super::parameters::{GlottalFlowParameters, Shape};
use crate::math::{exp, round3};

pub const OQ_BOUNDS: (f64, f64) = (0.35, 0.85);
pub const AM_MIN: f64 = 0.55;
pub const QA_BOUNDS: (f64, f64) = (0.0, 0.9);

/// Below this return time the return phase is dropped.
const TA_CUTOFF: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct RPlusPlus {
    k: f64,
    te: f64,
    tp: f64,
    ta: f64,
    tx: f64,
    dg_te: f64,
}

impl Default for RPlusPlus {
    fn default() -> Self {
        let mut model = RPlusPlus {
            k: 0.0,
            te: 0.0,
            tp: 0.0,
            ta: 0.0,
            tx: 0.0,
            dg_te: 0.0,
        };
        model.fit_shape(Shape {
            oq: super::parameters::DEFAULT_OQ,
            am: super::parameters::DEFAULT_AM,
            qa: super::parameters::DEFAULT_QA,
        });
        model
    }
}

/// `D(Te, Ta)` from the return phase integral.
fn return_factor(te: f64, ta: f64) -> f64 {
    let x = (1.0 - te) / ta;
    1.0 - x / (exp(x) - 1.0)
}

impl RPlusPlus {
    pub fn fit_parameters(&mut self, params: &GlottalFlowParameters) {
        let mut shape = params.shape();
        if params.using_rd() {
            shape = shape.clamped(OQ_BOUNDS, (AM_MIN, Self::am_max(shape.oq, shape.qa)), QA_BOUNDS);
        }
        self.fit_shape(shape);
    }

    fn fit_shape(&mut self, shape: Shape) {
        let te = shape.oq;
        let tp = shape.am.max(0.5 + 1e-6) * shape.oq;
        let ta = shape.qa * (1.0 - shape.oq);

        let tx = if ta > TA_CUTOFF {
            let d = return_factor(te, ta);
            let denominator = 2.0 * te * te - 3.0 * te * tp + 6.0 * ta * (te - tp) * d;
            te * (1.0 - (0.5 * te * te - te * tp) / denominator)
        } else {
            te * (3.0 * te - 4.0 * tp) / (2.0 * (2.0 * te - 3.0 * tp))
        };

        self.k = -1.0 / (4.0 * te * (tp - te) * (tx - te));
        self.te = te;
        self.tp = tp;
        self.ta = ta;
        self.tx = tx;
        self.dg_te = self.open_phase(te);
    }

    /// Largest asymmetry for which the open phase stays unimodal.
    fn am_max(oq: f64, qa: f64) -> f64 {
        let te = oq;
        let ta = qa * (1.0 - te);
        if ta > TA_CUTOFF {
            let d = return_factor(te, ta);
            round3(0.75 * (te + 4.0 * ta * d) / (te + 3.0 * ta * d))
        } else {
            0.75
        }
    }

    pub fn update_parameter_bounds(&self, params: &mut GlottalFlowParameters) {
        params.oq.set_min(OQ_BOUNDS.0);
        params.oq.set_max(OQ_BOUNDS.1);
        params.qa.set_min(QA_BOUNDS.0);
        params.qa.set_max(QA_BOUNDS.1);
        params.am.set_min(AM_MIN);
        params.am.set_max(Self::am_max(params.oq.value(), params.qa.value()));
    }

    fn open_phase(&self, t: f64) -> f64 {
        4.0 * self.k * t * (self.tp - t) * (self.tx - t)
    }

    fn tail(&self) -> f64 {
        exp(-(1.0 - self.te) / self.ta)
    }

    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.te {
            self.open_phase(t)
        } else if self.ta > TA_CUTOFF {
            let tail = self.tail();
            self.dg_te * (exp(-(t - self.te) / self.ta) - tail) / (1.0 - tail)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn evaluate_antiderivative(&self, t: f64) -> f64 {
        let t = fold_time(t);
        let open = |t: f64| {
            let t2 = t * t;
            let cubic = (self.tp + self.tx) * t2 * t / 3.0;
            4.0 * self.k * (self.tp * self.tx * t2 / 2.0 - cubic + t2 * t2 / 4.0)
        };
        if t <= self.te {
            return open(t);
        }
        let at_te = open(self.te);
        if self.ta <= TA_CUTOFF {
            return at_te;
        }
        let tail = self.tail();
        at_te
            + self.dg_te / (1.0 - tail)
                * (self.ta * (1.0 - exp(-(t - self.te) / self.ta)) - tail * (t - self.te))
    }

    #[must_use]
    pub fn te(&self) -> f64 {
        self.te
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn fitted(oq: f64, am: f64, qa: f64) -> RPlusPlus {
        let mut model = RPlusPlus::default();
        model.fit_shape(Shape { oq, am, qa });
        model
    }

    #[test]
    fn peak_is_normalized_at_te() {
        let model = fitted(0.6, 0.7, 0.2);
        assert_relative_eq!(model.evaluate(model.te()), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn flow_returns_to_zero() {
        for qa in [0.0, 0.1, 0.5, 0.9] {
            let model = fitted(0.55, 0.7, qa);
            assert_abs_diff_eq!(model.evaluate_antiderivative(1.0), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn am_bound_depends_on_return_phase() {
        let mut params = GlottalFlowParameters::new();
        params.qa.set_value(0.0);
        RPlusPlus::default().update_parameter_bounds(&mut params);
        assert_eq!(params.am.max(), 0.75);
        assert_eq!(params.am.min(), AM_MIN);

        params.qa.set_value(0.5);
        RPlusPlus::default().update_parameter_bounds(&mut params);
        assert!(params.am.max() > 0.75);
        assert_eq!(params.am.max(), round3(params.am.max()));
    }
}
