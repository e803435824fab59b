//! Glottal flow derivative models.
//!
//! Every model describes one period of the flow derivative `dg(t)` on `t ∈ [0, 1]`, with
//! the main negative excitation normalized to `-1` at the closing instant `Te`. The
//! antiderivative is the flow itself and starts at zero.

pub mod klglott88;
pub mod lf;
pub mod parameters;
pub mod rd;
pub mod rplusplus;
pub mod rosenberg_c;

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;
pub use klglott88::Klglott88;
pub use lf::Lf;
pub use parameters::{GlottalFlowParameters, Shape};
pub use rplusplus::RPlusPlus;
pub use rosenberg_c::RosenbergC;

/// Maps a time outside of `[0, 1]` into `(-1, 0]`.
///
/// Models are only meant to be evaluated inside one period. Times outside it fold onto the
/// negative side, where every open phase formula still evaluates to something finite.
#[must_use]
pub fn fold_time(t: f64) -> f64 {
    if (0.0..=1.0).contains(&t) {
        t
    } else {
        -(t.abs() % 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelType {
    #[default]
    Lf,
    RPlusPlus,
    RosenbergC,
    Klglott88,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [
        ModelType::Lf,
        ModelType::RPlusPlus,
        ModelType::RosenbergC,
        ModelType::Klglott88,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ModelType::Lf => "LF",
            ModelType::RPlusPlus => "R++",
            ModelType::RosenbergC => "Rosenberg-C",
            ModelType::Klglott88 => "KLGLOTT88",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelType::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_param("model", format!("unknown model '{s}'")))
    }
}

impl From<ModelType> for u8 {
    fn from(kind: ModelType) -> u8 {
        match kind {
            ModelType::Lf => 0,
            ModelType::RPlusPlus => 1,
            ModelType::RosenbergC => 2,
            ModelType::Klglott88 => 3,
        }
    }
}

impl TryFrom<u8> for ModelType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        ModelType::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::invalid_param("model", format!("no model with index {value}")))
    }
}

/// One of the four models, fitted to a parameter set.
#[derive(Debug, Clone, PartialEq)]
pub enum GlottalFlowModel {
    Lf(Lf),
    RPlusPlus(RPlusPlus),
    RosenbergC(RosenbergC),
    Klglott88(Klglott88),
}

impl GlottalFlowModel {
    /// A model of the given kind fitted to its default shape.
    #[must_use]
    pub fn new(kind: ModelType) -> Self {
        match kind {
            ModelType::Lf => GlottalFlowModel::Lf(Lf::default()),
            ModelType::RPlusPlus => GlottalFlowModel::RPlusPlus(RPlusPlus::default()),
            ModelType::RosenbergC => GlottalFlowModel::RosenbergC(RosenbergC::default()),
            ModelType::Klglott88 => GlottalFlowModel::Klglott88(Klglott88::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModelType {
        match self {
            GlottalFlowModel::Lf(_) => ModelType::Lf,
            GlottalFlowModel::RPlusPlus(_) => ModelType::RPlusPlus,
            GlottalFlowModel::RosenbergC(_) => ModelType::RosenbergC,
            GlottalFlowModel::Klglott88(_) => ModelType::Klglott88,
        }
    }

    /// Refits the model. On error the previous fit stays in place.
    ///
    /// # Errors
    ///
    /// Only the LF model can fail, with [`Error::NonConvergent`].
    pub fn fit_parameters(&mut self, params: &GlottalFlowParameters) -> Result<()> {
        match self {
            GlottalFlowModel::Lf(m) => m.fit_parameters(params),
            GlottalFlowModel::RPlusPlus(m) => {
                m.fit_parameters(params);
                Ok(())
            }
            GlottalFlowModel::RosenbergC(m) => {
                m.fit_parameters(params);
                Ok(())
            }
            GlottalFlowModel::Klglott88(m) => {
                m.fit_parameters(params);
                Ok(())
            }
        }
    }

    /// The flow derivative at normalized time `t`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        match self {
            GlottalFlowModel::Lf(m) => m.evaluate(t),
            GlottalFlowModel::RPlusPlus(m) => m.evaluate(t),
            GlottalFlowModel::RosenbergC(m) => m.evaluate(t),
            GlottalFlowModel::Klglott88(m) => m.evaluate(t),
        }
    }

    /// The flow at normalized time `t`.
    #[must_use]
    pub fn evaluate_antiderivative(&self, t: f64) -> f64 {
        match self {
            GlottalFlowModel::Lf(m) => m.evaluate_antiderivative(t),
            GlottalFlowModel::RPlusPlus(m) => m.evaluate_antiderivative(t),
            GlottalFlowModel::RosenbergC(m) => m.evaluate_antiderivative(t),
            GlottalFlowModel::Klglott88(m) => m.evaluate_antiderivative(t),
        }
    }

    /// Narrows the parameter bounds to the region this model is valid in.
    pub fn update_parameter_bounds(&self, params: &mut GlottalFlowParameters) {
        match self {
            GlottalFlowModel::Lf(m) => m.update_parameter_bounds(params),
            GlottalFlowModel::RPlusPlus(m) => m.update_parameter_bounds(params),
            GlottalFlowModel::RosenbergC(m) => m.update_parameter_bounds(params),
            GlottalFlowModel::Klglott88(m) => m.update_parameter_bounds(params),
        }
    }

    /// The closing instant of the current fit.
    #[must_use]
    pub fn te(&self) -> f64 {
        match self {
            GlottalFlowModel::Lf(m) => m.te(),
            GlottalFlowModel::RPlusPlus(m) => m.te(),
            GlottalFlowModel::RosenbergC(m) => m.te(),
            GlottalFlowModel::Klglott88(m) => m.te(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_keeps_the_unit_period() {
        assert_eq!(fold_time(0.0), 0.0);
        assert_eq!(fold_time(1.0), 1.0);
        assert_eq!(fold_time(0.3), 0.3);
        assert_eq!(fold_time(1.5), -0.5);
        assert_eq!(fold_time(-0.25), -0.25);
        assert_eq!(fold_time(-2.0), -0.0);
    }

    #[test]
    fn model_names_round_trip() {
        for kind in ModelType::ALL {
            assert_eq!(kind.name().parse::<ModelType>(), Ok(kind));
            assert_eq!(ModelType::try_from(u8::from(kind)), Ok(kind));
        }
        assert!("Fant".parse::<ModelType>().is_err());
        assert!(ModelType::try_from(4).is_err());
    }

    #[test]
    fn every_model_fits_after_its_bounds_are_applied() {
        for kind in ModelType::ALL {
            let mut params = GlottalFlowParameters::new();
            let mut model = GlottalFlowModel::new(kind);
            model.update_parameter_bounds(&mut params);
            model.fit_parameters(&params).unwrap();
            assert_eq!(model.kind(), kind);
            assert!(model.te() > 0.0 && model.te() < 1.0, "{kind}: Te = {}", model.te());
            for i in 0..=100 {
                let t = f64::from(i) / 100.0;
                assert!(model.evaluate(t).is_finite(), "{kind} at {t}");
            }
        }
    }
}
