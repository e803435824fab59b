//! The KLGLOTT88 polynomial pulse of Klatt and Klatt.
//!
//! ```text
//!    dg(t) = 2 t / Oq - 3 t^2 / Oq^2      0 <= t <= Oq
//!    g(t)  = t^2 / Oq - t^3 / Oq^2
//! ```

use super::fold_time;
use super::parameters::GlottalFlowParameters;

pub const OQ_BOUNDS: (f64, f64) = (0.35, 0.85);
pub const FIXED_AM: f64 = 0.667;

#[derive(Debug, Clone, PartialEq)]
pub struct Klglott88 {
    oq: f64,
}

impl Default for Klglott88 {
    fn default() -> Self {
        Klglott88 {
            oq: super::parameters::DEFAULT_OQ,
        }
    }
}

impl Klglott88 {
    pub fn fit_parameters(&mut self, params: &GlottalFlowParameters) {
        let oq = params.shape().oq;
        self.oq = if params.using_rd() {
            oq.clamp(OQ_BOUNDS.0, OQ_BOUNDS.1)
        } else {
            oq
        };
    }

    pub fn update_parameter_bounds(&self, params: &mut GlottalFlowParameters) {
        params.oq.set_min(OQ_BOUNDS.0);
        params.oq.set_max(OQ_BOUNDS.1);
        params.am.set_fixed(FIXED_AM);
        params.qa.set_fixed(0.0);
    }

    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.oq {
            2.0 * t / self.oq - 3.0 * t * t / (self.oq * self.oq)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn evaluate_antiderivative(&self, t: f64) -> f64 {
        let t = fold_time(t);
        if t <= self.oq {
            let x = t / self.oq;
            self.oq * (x * x - x * x * x)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn te(&self) -> f64 {
        self.oq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_peaks_negative_at_oq() {
        let model = Klglott88 { oq: 0.5 };
        assert_eq!(model.evaluate(0.5), -1.0);
        assert_eq!(model.evaluate(0.9), 0.0);
        assert_eq!(model.evaluate_antiderivative(0.5), 0.0);
        assert_eq!(model.evaluate_antiderivative(0.25), 0.0625);
    }

    #[test]
    fn flow_is_the_integral_of_the_derivative() {
        let model = Klglott88 { oq: 0.45 };
        let steps = 4000;
        let dt = 0.45 / f64::from(steps);
        let mut area = 0.0;
        for i in 0..steps {
            let t = (f64::from(i) + 0.5) * dt;
            area += model.evaluate(t) * dt;
            let expected = model.evaluate_antiderivative(f64::from(i + 1) * dt);
            assert!((area - expected).abs() < 1e-6, "at {t}: {area} vs {expected}");
        }
    }

    #[test]
    fn asymmetry_is_pinned() {
        let mut params = GlottalFlowParameters::new();
        params.am.set_value(0.9);
        Klglott88::default().update_parameter_bounds(&mut params);
        assert!(params.am.is_fixed());
        assert_eq!(params.am.value(), FIXED_AM);
    }
}
