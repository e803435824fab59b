//! The voice source: a glottal flow model played back period by period.

use crate::automation::AutomationCurve;
use crate::buffered::{BlockContext, SignalGenerator};
use crate::cached::CachedGlottalFlowModel;
use crate::error::{Error, Result};
use crate::filters::{SosFilter, butterworth};
use crate::flow::{HandleState, ModelHandle};
use crate::math::{round, sin};
use crate::models::parameters::{DEFAULT_AM, DEFAULT_OQ, DEFAULT_QA, DEFAULT_RD};
use crate::models::rd::{self, RD_MAX, RD_MIN};
use crate::models::{GlottalFlowModel, GlottalFlowParameters, ModelType};
use crate::parameter::{ChangeFlag, ParamTarget, ScalarParameter, ToggleTarget};
use core::f64::consts::TAU;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use std::sync::Arc;

pub const F0_RANGE: (f64, f64) = (16.0, 1000.0);
pub const DEFAULT_F0: f64 = 120.0;
pub const JITTER_RANGE: (f64, f64) = (0.0, 0.5);
pub const DEFAULT_JITTER: f64 = 0.01;
pub const SHIMMER_RANGE: (f64, f64) = (0.0, 1.0);
pub const DEFAULT_SHIMMER: f64 = 0.04;
pub const FLUTTER_RANGE: (f64, f64) = (0.0, 1.0);
/// A quite realistic deviation from constant pitch.
pub const DEFAULT_FLUTTER: f64 = 0.25;

/// Ramp time for every source parameter change, in seconds.
const PARAM_RAMP: f64 = 0.1;

/// Weights of the 13-point distribution used for jitter and shimmer, out of 64.
const DISTRIBUTION_WEIGHTS: [u32; 13] = [1, 2, 3, 5, 7, 9, 10, 9, 7, 5, 3, 2, 1];
/// Deviations in units of a third of the ceiling.
const DISTRIBUTION_DEVIATIONS: [f64; 13] = [
    -3.0, -1.9, -1.48, -1.12, -0.76, -0.38, 0.0, 0.38, 0.76, 1.12, 1.48, 1.9, 3.0,
];

/// Modifies the fundamental frequency to simulate flutter.
///
/// Three slow sine waves at 12.7, 7.1 and 4.7 Hz are summed. A value of
/// `flutter_level = 0.25` results in synthetic vowels with a quite realistic deviation from
/// constant pitch.
///
/// ### params
/// ```text
///    f0 = Fundamental frequency.
///    flutter_level = Flutter level between 0 and 1.
///    time = Signal position in seconds.
/// ```
/// ### returns
///    Modulated fundamental frequency.
pub(crate) fn perform_frequency_modulation(f0: f64, flutter_level: f64, time: f64) -> f64 {
    if flutter_level <= 0.0 {
        return f0;
    }
    let w = TAU * time;
    let a = sin(12.7 * w) + sin(7.1 * w) + sin(4.7 * w);
    f0 * (1.0 + a * flutter_level / 50.0)
}

/// Audio-side targets of every parameter the source follows.
#[derive(Debug, Clone)]
pub struct SourceControls {
    pub f0: Arc<ParamTarget>,
    pub oq: Arc<ParamTarget>,
    pub am: Arc<ParamTarget>,
    pub qa: Arc<ParamTarget>,
    pub rd: Arc<ParamTarget>,
    pub using_rd: Arc<ToggleTarget>,
    pub jitter: Arc<ParamTarget>,
    pub shimmer: Arc<ParamTarget>,
    pub flutter: Arc<ParamTarget>,
}

impl Default for SourceControls {
    fn default() -> Self {
        let target = |value| Arc::new(ParamTarget::new(value));
        SourceControls {
            f0: target(DEFAULT_F0),
            oq: target(DEFAULT_OQ),
            am: target(DEFAULT_AM),
            qa: target(DEFAULT_QA),
            rd: target(DEFAULT_RD),
            using_rd: Arc::new(ToggleTarget::new(false)),
            jitter: target(DEFAULT_JITTER),
            shimmer: target(DEFAULT_SHIMMER),
            flutter: target(DEFAULT_FLUTTER),
        }
    }
}

/// UI-side pitch and voice quality parameters. The shape parameters live in
/// [`GlottalFlow`](crate::flow::GlottalFlow).
#[derive(Debug)]
pub struct SourceParameters {
    pub f0: ScalarParameter,
    pub jitter: ScalarParameter,
    pub shimmer: ScalarParameter,
    pub flutter: ScalarParameter,
}

impl Default for SourceParameters {
    fn default() -> Self {
        SourceParameters {
            f0: ScalarParameter::new("f0", DEFAULT_F0, F0_RANGE.0, F0_RANGE.1),
            jitter: ScalarParameter::new("jitter", DEFAULT_JITTER, JITTER_RANGE.0, JITTER_RANGE.1),
            shimmer: ScalarParameter::new(
                "shimmer",
                DEFAULT_SHIMMER,
                SHIMMER_RANGE.0,
                SHIMMER_RANGE.1,
            ),
            flutter: ScalarParameter::new(
                "flutter",
                DEFAULT_FLUTTER,
                FLUTTER_RANGE.0,
                FLUTTER_RANGE.1,
            ),
        }
    }
}

impl SourceParameters {
    /// Subscribes `controls` and pushes the current values to them.
    pub fn connect(&mut self, controls: &SourceControls) {
        let pairs = [
            (&mut self.f0, &controls.f0),
            (&mut self.jitter, &controls.jitter),
            (&mut self.shimmer, &controls.shimmer),
            (&mut self.flutter, &controls.flutter),
        ];
        for (param, target) in pairs {
            param.subscribe(target);
            target.set(param.value());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Nothing is cached yet; the next block starts a period from scratch.
    AwaitingPeriodInit,
    Running,
}

/// Smoothed copies of the source controls.
#[derive(Debug, Clone)]
struct Curves {
    f0: AutomationCurve,
    oq: AutomationCurve,
    am: AutomationCurve,
    qa: AutomationCurve,
    rd: AutomationCurve,
    jitter: AutomationCurve,
    shimmer: AutomationCurve,
    flutter: AutomationCurve,
}

/// Voice source generator.
#[derive(Debug)]
pub struct SourceGenerator<R> {
    /// published model kind
    handle: ModelHandle,
    /// local model instance, refitted once per period at most
    model: GlottalFlowModel,
    /// shape parameters as seen by the audio thread, bounded by `model`
    params: GlottalFlowParameters,
    /// raised by any change of `params`
    params_changed: Arc<ChangeFlag>,
    cache: CachedGlottalFlowModel,
    state: GeneratorState,
    controls: SourceControls,
    curves: Curves,
    /// current period length in samples
    period_length: usize,
    /// current sample position within the period
    position: usize,
    /// amplitude factor of the current period
    shimmer_gain: f64,
    /// modulated fundamental frequency of the current period, in Hz
    current_f0: f64,
    fs: f64,
    distribution: WeightedIndex<u32>,
    /// random time offset so that two voices do not flutter in sync, in seconds
    flutter_offset: f64,
    anti_alias: SosFilter,
    rng: R,
}

impl<R: Rng> SourceGenerator<R> {
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the jitter distribution cannot be built.
    pub fn new(handle: ModelHandle, controls: SourceControls, mut rng: R) -> Result<Self> {
        rd::preload();
        let distribution = WeightedIndex::new(DISTRIBUTION_WEIGHTS)
            .map_err(|e| Error::invalid_param("jitter", e.to_string()))?;

        let params_changed = Arc::new(ChangeFlag::new(true));
        let mut params = GlottalFlowParameters::new();
        params.subscribe_all(&params_changed);
        params.set_using_rd(controls.using_rd.get());

        let curves = Curves {
            f0: AutomationCurve::new(controls.f0.get(), F0_RANGE.0, F0_RANGE.1),
            oq: AutomationCurve::new(controls.oq.get(), 0.0, 1.0),
            am: AutomationCurve::new(controls.am.get(), 0.0, 1.0),
            qa: AutomationCurve::new(controls.qa.get(), 0.0, 1.0),
            rd: AutomationCurve::new(controls.rd.get(), RD_MIN, RD_MAX),
            jitter: AutomationCurve::new(controls.jitter.get(), JITTER_RANGE.0, JITTER_RANGE.1),
            shimmer: AutomationCurve::new(controls.shimmer.get(), SHIMMER_RANGE.0, SHIMMER_RANGE.1),
            flutter: AutomationCurve::new(controls.flutter.get(), FLUTTER_RANGE.0, FLUTTER_RANGE.1),
        };
        let kind = handle.current_kind().unwrap_or_default();

        Ok(SourceGenerator {
            handle,
            model: GlottalFlowModel::new(kind),
            params,
            params_changed,
            cache: CachedGlottalFlowModel::with_capacity(round(44_100.0 / F0_RANGE.0) as usize),
            state: GeneratorState::AwaitingPeriodInit,
            controls,
            curves,
            period_length: 1,
            position: 0,
            shimmer_gain: 1.0,
            current_f0: DEFAULT_F0,
            fs: 0.0,
            distribution,
            flutter_offset: f64::from(rng.random_range(0..=1000_u32)),
            anti_alias: SosFilter::default(),
            rng,
        })
    }

    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Starts from a fresh period on the next block.
    pub fn reset(&mut self) {
        self.state = GeneratorState::AwaitingPeriodInit;
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
    pub fn parameters(&self) -> &GlottalFlowParameters {
        &self.params
    }

    #[must_use]
    pub fn period_length(&self) -> usize {
        self.period_length
    }

    #[must_use]
    pub fn current_f0(&self) -> f64 {
        self.current_f0
    }

    #[must_use]
    pub fn shimmer_gain(&self) -> f64 {
        self.shimmer_gain
    }

    #[must_use]
    pub fn anti_alias_filter(&self) -> &SosFilter {
        &self.anti_alias
    }

    /// `1 + ceiling * d / 3` for a deviation `d` drawn from the distribution.
    fn draw_factor(&mut self, ceiling: f64) -> f64 {
        let index = self.distribution.sample(&mut self.rng);
        1.0 + ceiling * DISTRIBUTION_DEVIATIONS[index] / 3.0
    }

    /// Schedules a ramp for every control changed since the last block. Before the first
    /// period the values are taken as they are.
    fn poll_controls(&mut self, now: f64) {
        let jump = self.state == GeneratorState::AwaitingPeriodInit;
        let end = now + PARAM_RAMP;
        let c = &mut self.curves;
        let linear = [
            (&mut c.f0, &self.controls.f0),
            (&mut c.oq, &self.controls.oq),
            (&mut c.am, &self.controls.am),
            (&mut c.qa, &self.controls.qa),
            (&mut c.jitter, &self.controls.jitter),
            (&mut c.shimmer, &self.controls.shimmer),
            (&mut c.flutter, &self.controls.flutter),
        ];
        for (curve, target) in linear {
            if let Some(value) = target.take_change() {
                if jump {
                    curve.set_value(value);
                } else {
                    curve.linear_ramp_to_value_at_time(value, now, end);
                }
            }
        }
        if let Some(rd) = self.controls.rd.take_change() {
            if jump {
                c.rd.set_value(rd);
            } else {
                c.rd.exponential_ramp_to_value_at_time(rd, now, end);
            }
        }
        if let Some(using_rd) = self.controls.using_rd.take_change() {
            self.params.set_using_rd(using_rd);
        }
    }

    /// Samples the shape curves into the internal parameters.
    fn apply_shape_automation(&mut self, t: f64) {
        self.params.oq.set_value(self.curves.oq.value_for_time(t));
        self.params.am.set_value(self.curves.am.value_for_time(t));
        self.params.qa.set_value(self.curves.qa.value_for_time(t));
        self.params.rd.set_value(self.curves.rd.value_for_time(t));
    }

    fn refit(&mut self) {
        self.model.update_parameter_bounds(&mut self.params);
        self.params_changed.take();
        match self.model.fit_parameters(&self.params) {
            Ok(()) => log::debug!("{} refitted", self.model.kind()),
            Err(e) => {
                log::warn!("{}: fit rejected, keeping previous shape: {e}", self.model.kind());
            }
        }
        self.cache.mark_model_changed();
    }

    fn set_period(&mut self, f0: f64) {
        self.current_f0 = f0.clamp(F0_RANGE.0, F0_RANGE.1);
        self.period_length = (round(self.fs / self.current_f0) as usize).max(1);
        self.position = 0;
        self.cache.set_period_length(self.period_length);
    }

    fn init_period(&mut self, t: f64) {
        self.apply_shape_automation(t);
        self.set_period(self.curves.f0.value_for_time(t));
        self.shimmer_gain = 1.0;
        self.refit();
        self.cache.update_cache(&self.model);
        self.state = GeneratorState::Running;
    }

    fn start_new_period(&mut self, t: f64) {
        self.apply_shape_automation(t);

        let f0 = perform_frequency_modulation(
            self.curves.f0.value_for_time(t),
            self.curves.flutter.value_for_time(t),
            t + self.flutter_offset,
        );
        let jitter = self.draw_factor(self.curves.jitter.value_for_time(t));
        self.set_period(f0 * jitter);
        self.shimmer_gain = self.draw_factor(self.curves.shimmer.value_for_time(t));

        if self.params_changed.take() {
            self.refit();
        }
        if self.cache.is_dirty() {
            self.cache.update_cache(&self.model);
        }
    }

    fn rebuild_anti_alias(&mut self, fs: f64) {
        match butterworth::low_pass(fs, fs / 2.0 - 1000.0, 1) {
            Ok(filter) => self.anti_alias = filter,
            Err(e) => log::error!("anti-aliasing filter for {fs} Hz: {e}"),
        }
    }
}

impl<R: Rng + Send> SignalGenerator for SourceGenerator<R> {
    fn fill_internal_buffer(&mut self, ctx: &BlockContext, out: &mut [f64]) {
        match self.handle.poll() {
            HandleState::Expired => {
                out.fill(0.0);
                return;
            }
            HandleState::Changed(kind) => {
                if kind != self.model.kind() {
                    self.model = GlottalFlowModel::new(kind);
                    log::debug!("source switched to {kind}");
                }
                self.params_changed.raise();
            }
            HandleState::Current => {}
        }

        if ctx.sample_rate_changed {
            self.fs = ctx.fs;
            self.rebuild_anti_alias(ctx.fs);
        }

        let now = ctx.time(0);
        self.poll_controls(now);
        if self.state == GeneratorState::AwaitingPeriodInit {
            self.init_period(now);
        }

        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.cache.get(self.position) * self.shimmer_gain;
            self.position += 1;
            if self.position >= self.period_length {
                self.start_new_period(ctx.time(i));
            }
        }

        self.anti_alias.filter_in_place(out);
    }
}
