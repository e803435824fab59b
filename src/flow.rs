//! The UI-side view of the glottal flow: parameters, a plot of one period, and the model
//! selection shared with the audio thread.

use crate::models::{GlottalFlowModel, GlottalFlowParameters, ModelType};
use crate::parameter::ChangeFlag;
use crate::quadrature::{gauss_kronrod, integrate};
use crate::source::SourceControls;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub const DEFAULT_SAMPLE_COUNT: usize = 256;

const PLOT_TOLERANCE: f64 = 1e-6;
const PLOT_MAX_DEPTH: u32 = 15;

#[derive(Debug)]
struct ModelSlot {
    kind: AtomicU8,
    generation: AtomicU64,
}

/// Owns the model selection used for real-time generation.
///
/// The audio thread never shares a model instance with the UI. It holds a [`ModelHandle`]
/// and rebuilds its own model whenever the published kind changes. Dropping the arena
/// expires every handle.
#[derive(Debug)]
pub struct ModelArena {
    slot: Arc<ModelSlot>,
}

impl ModelArena {
    #[must_use]
    pub fn new(kind: ModelType) -> Self {
        ModelArena {
            slot: Arc::new(ModelSlot {
                kind: AtomicU8::new(kind.into()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModelType {
        decode_kind(self.slot.kind.load(Ordering::Acquire))
    }

    /// Installs a new model kind and bumps the generation.
    pub fn publish(&self, kind: ModelType) {
        self.slot.kind.store(kind.into(), Ordering::Release);
        self.slot.generation.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn handle(&self) -> ModelHandle {
        ModelHandle {
            slot: Arc::downgrade(&self.slot),
            seen: None,
        }
    }
}

fn decode_kind(raw: u8) -> ModelType {
    ModelType::try_from(raw).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// The arena is gone.
    Expired,
    /// A different model was published since the last poll. Always reported on first poll.
    Changed(ModelType),
    Current,
}

/// Weak view on a [`ModelArena`], held by the generator.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    slot: Weak<ModelSlot>,
    seen: Option<u64>,
}

impl ModelHandle {
    pub fn poll(&mut self) -> HandleState {
        let Some(slot) = self.slot.upgrade() else {
            return HandleState::Expired;
        };
        let generation = slot.generation.load(Ordering::Acquire);
        if self.seen == Some(generation) {
            return HandleState::Current;
        }
        self.seen = Some(generation);
        HandleState::Changed(decode_kind(slot.kind.load(Ordering::Acquire)))
    }

    /// The published kind, without marking it seen.
    #[must_use]
    pub fn current_kind(&self) -> Option<ModelType> {
        self.slot
            .upgrade()
            .map(|slot| decode_kind(slot.kind.load(Ordering::Acquire)))
    }
}

/// `(time, value)` of a curve extremum.
pub type Extremum = (f64, f64);

/// Parameters, plot model and model arena, as the user interface sees them.
#[derive(Debug)]
pub struct GlottalFlow {
    params: GlottalFlowParameters,
    model: GlottalFlowModel,
    arena: ModelArena,
    changed: Arc<ChangeFlag>,
    dirty: bool,
    sample_count: usize,
    times: Vec<f64>,
    derivative: Vec<f64>,
    flow: Vec<f64>,
    derivative_min: Extremum,
    derivative_max: Extremum,
    flow_min: Extremum,
    flow_max: Extremum,
}

impl Default for GlottalFlow {
    fn default() -> Self {
        Self::new(ModelType::default())
    }
}

impl GlottalFlow {
    #[must_use]
    pub fn new(kind: ModelType) -> Self {
        let changed = Arc::new(ChangeFlag::new(false));
        let mut params = GlottalFlowParameters::new();
        params.subscribe_all(&changed);

        let mut flow = GlottalFlow {
            params,
            model: GlottalFlowModel::new(kind),
            arena: ModelArena::new(kind),
            changed,
            dirty: true,
            sample_count: DEFAULT_SAMPLE_COUNT,
            times: Vec::new(),
            derivative: Vec::new(),
            flow: Vec::new(),
            derivative_min: (0.0, 0.0),
            derivative_max: (0.0, 0.0),
            flow_min: (0.0, 0.0),
            flow_max: (0.0, 0.0),
        };
        flow.refit();
        flow
    }

    #[must_use]
    pub fn parameters(&self) -> &GlottalFlowParameters {
        &self.params
    }

    /// Changes made through this reference are picked up by [`GlottalFlow::update_if_needed`].
    pub fn parameters_mut(&mut self) -> &mut GlottalFlowParameters {
        &mut self.params
    }

    #[must_use]
    pub fn model_type(&self) -> ModelType {
        self.model.kind()
    }

    #[must_use]
    pub fn model(&self) -> &GlottalFlowModel {
        &self.model
    }

    #[must_use]
    pub fn arena(&self) -> &ModelArena {
        &self.arena
    }

    /// Switches to a new model kind, narrows the parameters to it and publishes it to the
    /// generator.
    pub fn set_model_type(&mut self, kind: ModelType) {
        if kind == self.model.kind() {
            return;
        }
        self.model = GlottalFlowModel::new(kind);
        self.refit();
        self.arena.publish(kind);
        log::debug!("glottal flow model set to {kind}");
    }

    /// Feeds every parameter the generator follows into `controls`, starting with the
    /// current values.
    pub fn connect(&mut self, controls: &SourceControls) {
        let params = &mut self.params;
        params.oq.subscribe(&controls.oq);
        params.am.subscribe(&controls.am);
        params.qa.subscribe(&controls.qa);
        params.rd.subscribe(&controls.rd);
        params.using_rd_parameter_mut().subscribe(&controls.using_rd);

        controls.oq.set(params.oq.value());
        controls.am.set(params.am.value());
        controls.qa.set(params.qa.value());
        controls.rd.set(params.rd.value());
        controls.using_rd.set(params.using_rd());
    }

    fn refit(&mut self) {
        self.model.update_parameter_bounds(&mut self.params);
        // the bounds update itself may have moved values
        self.changed.take();
        if let Err(e) = self.model.fit_parameters(&self.params) {
            log::warn!("{}: fit rejected, keeping previous shape: {e}", self.model.kind());
        }
        self.dirty = true;
    }

    /// Refits after parameter changes and resamples the plot when needed. Returns whether
    /// the plot changed.
    pub fn update_if_needed(&mut self) -> bool {
        if self.changed.take() {
            self.refit();
        }
        if !self.dirty {
            return false;
        }
        self.update_samples();
        true
    }

    pub fn set_sample_count(&mut self, sample_count: usize) {
        if self.sample_count != sample_count {
            self.sample_count = sample_count;
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn update_samples(&mut self) {
        let n = self.sample_count;
        let te = self.model.te();
        let model = &self.model;

        self.times.clear();
        self.times.extend((0..n).map(|i| i as f64 / n as f64));
        // put one sample on Te so the plot shows the real negative peak
        let straddles = |i: usize| self.times[i] < te && te < self.times[i + 1];
        if let Some(i) = (0..n.saturating_sub(1)).find(|&i| straddles(i)) {
            self.times[i] = te;
        }

        self.derivative.clear();
        self.derivative.extend(self.times.iter().map(|&t| model.evaluate(t)));

        self.flow.clear();
        let mut acc = 0.0;
        let mut prev = 0.0;
        for &t in &self.times {
            acc += gauss_kronrod(|t| model.evaluate(t), prev, t, PLOT_TOLERANCE, PLOT_MAX_DEPTH);
            prev = t;
            self.flow.push(acc);
        }

        self.derivative_min = (0.0, f64::MAX);
        self.derivative_max = (0.0, f64::MIN);
        self.flow_min = (0.0, 0.0);
        self.flow_max = (0.0, 0.0);
        for ((&t, &dg), &g) in self.times.iter().zip(&self.derivative).zip(&self.flow) {
            if dg < self.derivative_min.1 {
                self.derivative_min = (t, dg);
            }
            if dg > self.derivative_max.1 {
                self.derivative_max = (t, dg);
            }
            if g < self.flow_min.1 {
                self.flow_min = (t, g);
            }
            if g > self.flow_max.1 {
                self.flow_max = (t, g);
            }
        }
        self.dirty = false;
    }

    /// Closing instant of the current fit, where the return phase starts.
    #[must_use]
    pub fn te(&self) -> f64 {
        self.model.te()
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[must_use]
    pub fn derivative(&self) -> &[f64] {
        &self.derivative
    }

    #[must_use]
    pub fn flow(&self) -> &[f64] {
        &self.flow
    }

    #[must_use]
    pub fn derivative_min(&self) -> Extremum {
        self.derivative_min
    }

    #[must_use]
    pub fn derivative_max(&self) -> Extremum {
        self.derivative_max
    }

    #[must_use]
    pub fn flow_min(&self) -> Extremum {
        self.flow_min
    }

    #[must_use]
    pub fn flow_max(&self) -> Extremum {
        self.flow_max
    }

    #[must_use]
    pub fn derivative_amplitude(&self) -> f64 {
        self.derivative_min.1.abs().max(self.derivative_max.1.abs())
    }

    #[must_use]
    pub fn flow_amplitude(&self) -> f64 {
        self.flow_min.1.abs().max(self.flow_max.1.abs())
    }

    /// Integral of the derivative over one period. Close to zero when the fit closes the
    /// glottis.
    #[must_use]
    pub fn net_flow(&self) -> f64 {
        let te = self.model.te();
        let f = |t: f64| self.model.evaluate(t);
        integrate(f, 0.0, te) + integrate(f, te, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn handle_sees_each_publication_once() {
        let arena = ModelArena::new(ModelType::Lf);
        let mut handle = arena.handle();
        assert_eq!(handle.poll(), HandleState::Changed(ModelType::Lf));
        assert_eq!(handle.poll(), HandleState::Current);

        arena.publish(ModelType::RosenbergC);
        assert_eq!(handle.current_kind(), Some(ModelType::RosenbergC));
        assert_eq!(handle.poll(), HandleState::Changed(ModelType::RosenbergC));
        assert_eq!(handle.poll(), HandleState::Current);

        drop(arena);
        assert_eq!(handle.poll(), HandleState::Expired);
        assert_eq!(handle.current_kind(), None);
    }

    #[test]
    fn plot_includes_the_negative_peak() {
        let mut flow = GlottalFlow::new(ModelType::Lf);
        flow.set_sample_count(97);
        assert!(flow.update_if_needed());
        assert!(!flow.update_if_needed());

        assert_eq!(flow.times().len(), 97);
        assert!(flow.times().contains(&flow.te()));
        assert!(flow.derivative_min().1 <= -1.0 + 1e-12);
        assert!(flow.flow_max().1 > 0.0);
    }

    #[test]
    fn parameter_changes_refit_the_plot() {
        let mut flow = GlottalFlow::new(ModelType::RPlusPlus);
        flow.update_if_needed();
        let before = flow.te();
        flow.parameters_mut().oq.set_value(0.7);
        assert!(flow.update_if_needed());
        assert!(flow.te() != before);
        assert_abs_diff_eq!(flow.te(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn switching_models_applies_their_bounds() {
        let mut flow = GlottalFlow::new(ModelType::Lf);
        let mut handle = flow.arena().handle();
        handle.poll();

        flow.set_model_type(ModelType::Klglott88);
        assert_eq!(flow.model_type(), ModelType::Klglott88);
        assert!(flow.parameters().am.is_fixed());
        assert_eq!(handle.poll(), HandleState::Changed(ModelType::Klglott88));
    }

    #[test]
    fn every_model_closes_the_glottis() {
        for kind in ModelType::ALL {
            let flow = GlottalFlow::new(kind);
            assert_abs_diff_eq!(flow.net_flow(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn connect_pushes_current_values() {
        let mut flow = GlottalFlow::new(ModelType::Lf);
        let controls = SourceControls::default();
        flow.connect(&controls);
        assert_eq!(controls.oq.take_change(), Some(flow.parameters().oq.value()));

        flow.parameters_mut().qa.set_value(0.2);
        assert_eq!(controls.qa.take_change(), Some(0.2));
    }
}
