//! The parameter set shared by every glottal flow model.

use super::rd;
use crate::parameter::{ChangeFlag, ScalarParameter, ToggleParameter};
use std::sync::Arc;

pub const DEFAULT_OQ: f64 = 0.45;
pub const DEFAULT_AM: f64 = 0.87;
pub const DEFAULT_QA: f64 = 0.09;
pub const DEFAULT_RD: f64 = 1.0;

/// Open quotient, asymmetry and return-phase quotient resolved for one fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub oq: f64,
    pub am: f64,
    pub qa: f64,
}

impl Shape {
    /// Clamps each field into the given `(min, max)` pairs.
    #[must_use]
    pub fn clamped(self, oq: (f64, f64), am: (f64, f64), qa: (f64, f64)) -> Shape {
        Shape {
            oq: self.oq.clamp(oq.0, oq.1),
            am: self.am.clamp(am.0, am.1),
            qa: self.qa.clamp(qa.0, qa.1),
        }
    }
}

/// `Oq`, `am`, `Qa` and the alternative single shape parameter `Rd`.
///
/// Exactly one convention is active: when `using_rd` is set the models fit from `Rd`,
/// otherwise from the three-parameter decomposition.
#[derive(Debug)]
pub struct GlottalFlowParameters {
    pub oq: ScalarParameter,
    pub am: ScalarParameter,
    pub qa: ScalarParameter,
    pub rd: ScalarParameter,
    using_rd: ToggleParameter,
}

impl GlottalFlowParameters {
    #[must_use]
    pub fn new() -> Self {
        GlottalFlowParameters {
            oq: ScalarParameter::new("Oq", DEFAULT_OQ, 0.0, 1.0),
            am: ScalarParameter::new("am", DEFAULT_AM, 0.0, 1.0),
            qa: ScalarParameter::new("Qa", DEFAULT_QA, 0.0, 1.0),
            rd: ScalarParameter::new("Rd", DEFAULT_RD, rd::RD_MIN, rd::RD_MAX),
            using_rd: ToggleParameter::new("usingRd", false),
        }
    }

    #[must_use]
    pub fn using_rd(&self) -> bool {
        self.using_rd.value()
    }

    /// Switches the fitting convention. Observers of the flag see the switch and refit.
    pub fn set_using_rd(&mut self, using_rd: bool) {
        self.using_rd.set_value(using_rd);
    }

    pub fn using_rd_parameter_mut(&mut self) -> &mut ToggleParameter {
        &mut self.using_rd
    }

    /// Raises `flag` whenever any parameter or the mode changes.
    pub fn subscribe_all(&mut self, flag: &Arc<ChangeFlag>) {
        self.oq.subscribe(flag);
        self.am.subscribe(flag);
        self.qa.subscribe(flag);
        self.rd.subscribe(flag);
        self.using_rd.subscribe(flag);
    }

    /// The shape to fit with, following the active convention.
    #[must_use]
    pub fn shape(&self) -> Shape {
        if self.using_rd() {
            rd::shape_from_rd(self.rd.value())
        } else {
            Shape {
                oq: self.oq.value(),
                am: self.am.value(),
                qa: self.qa.value(),
            }
        }
    }
}

impl Default for GlottalFlowParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_convention_raises_the_flag() {
        let flag = Arc::new(ChangeFlag::new(false));
        let mut params = GlottalFlowParameters::new();
        params.subscribe_all(&flag);

        params.set_using_rd(true);
        assert!(flag.take());
        params.set_using_rd(true);
        assert!(!flag.take());
    }

    #[test]
    fn shape_follows_active_convention() {
        let mut params = GlottalFlowParameters::new();
        params.oq.set_value(0.6);
        assert_eq!(params.shape().oq, 0.6);

        params.set_using_rd(true);
        params.rd.set_value(1.0);
        let shape = params.shape();
        assert!(shape.oq > 0.0 && shape.oq < 1.0);
        assert!(shape.oq != 0.6);
    }
}
