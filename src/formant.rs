//! The vocal tract: five resonators in series followed by lip radiation.

use crate::automation::AutomationCurve;
use crate::buffered::{BlockContext, SignalGenerator};
use crate::filters::{Sos, SvfBiquad};
use crate::math::{cos_pi, exp, sin_pi};
use crate::parameter::{ParamTarget, ScalarParameter, ToggleParameter, ToggleTarget};
use core::f64::consts::PI;
use std::sync::Arc;

pub const NUM_FORMANTS: usize = 5;

pub const FREQUENCY_RANGE: (f64, f64) = (200.0, 6000.0);
pub const BANDWIDTH_RANGE: (f64, f64) = (10.0, 600.0);
pub const FLUTTER_RANGE: (f64, f64) = (0.0, 0.5);

/// A neutral vowel.
pub const DEFAULT_FREQUENCIES: [f64; NUM_FORMANTS] = [800.0, 1150.0, 2900.0, 3900.0, 4650.0];
pub const DEFAULT_BANDWIDTHS: [f64; NUM_FORMANTS] = [80.0, 90.0, 120.0, 130.0, 140.0];
pub const DEFAULT_FLUTTER: f64 = 0.03;

const FREQUENCY_NAMES: [&str; NUM_FORMANTS] = ["F1", "F2", "F3", "F4", "F5"];
const BANDWIDTH_NAMES: [&str; NUM_FORMANTS] = ["B1", "B2", "B3", "B4", "B5"];

/// Ramp time for formant frequency and bandwidth changes, in seconds.
const FORMANT_RAMP: f64 = 0.15;
const FLUTTER_RAMP: f64 = 0.1;

/// One formant resonator, normalized to unity gain at DC.
///
/// # Formulas
/// ```text
///    r  = e^(-PI * B / fs)
///    a1 = -2 r cos(2 PI F / fs)
///    a2 = r^2
///    H(z) = (1 + a1 + a2) / (1 + a1 z^-1 + a2 z^-2)
/// ```
#[derive(Debug, Clone)]
pub struct OneFormantFilter {
    fs: f64,
    frequency: f64,
    bandwidth: f64,
    svf: SvfBiquad,
    sos: Sos,
}

impl OneFormantFilter {
    #[must_use]
    pub fn new(frequency: f64, bandwidth: f64, fs: f64) -> Self {
        let mut filter = OneFormantFilter {
            fs,
            frequency: 0.0,
            bandwidth,
            svf: SvfBiquad::default(),
            sos: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        };
        filter.set_frequency(frequency);
        filter.update();
        filter
    }

    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.fs
    }

    /// Takes effect at the next [`OneFormantFilter::update`].
    pub fn set_sample_rate(&mut self, fs: f64) {
        self.fs = fs;
        self.frequency = self.frequency.min(fs / 2.0);
    }

    #[must_use]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Sets the center frequency, capped at Nyquist.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency.clamp(0.0, self.fs / 2.0);
    }

    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn set_bandwidth(&mut self, bandwidth: f64) {
        self.bandwidth = bandwidth;
    }

    #[must_use]
    pub fn quality(&self) -> f64 {
        self.frequency / self.bandwidth
    }

    /// Sets the bandwidth from a quality factor at the current frequency.
    pub fn set_quality(&mut self, quality: f64) {
        self.bandwidth = self.frequency / quality;
    }

    /// Recomputes the coefficients and retunes the state-variable filter.
    pub fn update(&mut self) {
        let r = exp(-PI * self.bandwidth / self.fs);
        let theta = 2.0 * self.frequency / self.fs;
        let a1 = -2.0 * r * cos_pi(theta);
        let a2 = r * r;
        let dc = 1.0 + a1 + a2;
        self.sos = [dc, 0.0, 0.0, 1.0, a1, a2];
        self.svf.update(self.sos);
    }

    #[inline]
    pub fn tick(&mut self, x: f64) -> f64 {
        self.svf.tick(x)
    }

    #[must_use]
    pub fn biquad_coefficients(&self) -> Sos {
        self.sos
    }
}

/// First-order lip radiation: a differentiator at -6 dB DC gain.
///
/// ```text
///    y[n] = g / (1 - d) * x[n] - g d / (1 - d) * x[n-1]
/// ```
#[derive(Debug, Clone)]
pub struct LipRadiation {
    d: f64,
    g: f64,
    memory: f64,
}

impl Default for LipRadiation {
    fn default() -> Self {
        LipRadiation {
            d: 0.95,
            g: 0.25,
            memory: 0.0,
        }
    }
}

impl LipRadiation {
    #[inline]
    pub fn tick(&mut self, x: f64) -> f64 {
        let y = self.g / (1.0 - self.d) * x - self.g * self.d / (1.0 - self.d) * self.memory;
        self.memory = x;
        y
    }

    #[must_use]
    pub fn sos(&self) -> Sos {
        let k = self.g / (1.0 - self.d);
        [k, -k * self.d, 0.0, 1.0, 0.0, 0.0]
    }
}

/// Audio-side targets of the formant parameters.
#[derive(Debug, Clone)]
pub struct FormantControls {
    pub frequencies: [Arc<ParamTarget>; NUM_FORMANTS],
    pub bandwidths: [Arc<ParamTarget>; NUM_FORMANTS],
    pub flutter: Arc<ParamTarget>,
    pub flutter_on: Arc<ToggleTarget>,
}

impl Default for FormantControls {
    fn default() -> Self {
        FormantControls {
            frequencies: DEFAULT_FREQUENCIES.map(|f| Arc::new(ParamTarget::new(f))),
            bandwidths: DEFAULT_BANDWIDTHS.map(|b| Arc::new(ParamTarget::new(b))),
            flutter: Arc::new(ParamTarget::new(DEFAULT_FLUTTER)),
            flutter_on: Arc::new(ToggleTarget::new(true)),
        }
    }
}

/// UI-side formant parameters.
#[derive(Debug)]
pub struct FormantParameters {
    pub frequencies: [ScalarParameter; NUM_FORMANTS],
    pub bandwidths: [ScalarParameter; NUM_FORMANTS],
    /// `Ffmax`, depth of the formant flutter.
    pub flutter: ScalarParameter,
    /// `Ffon`.
    pub flutter_on: ToggleParameter,
}

impl Default for FormantParameters {
    fn default() -> Self {
        let (f_min, f_max) = FREQUENCY_RANGE;
        let (b_min, b_max) = BANDWIDTH_RANGE;
        FormantParameters {
            frequencies: core::array::from_fn(|k| {
                ScalarParameter::new(FREQUENCY_NAMES[k], DEFAULT_FREQUENCIES[k], f_min, f_max)
            }),
            bandwidths: core::array::from_fn(|k| {
                ScalarParameter::new(BANDWIDTH_NAMES[k], DEFAULT_BANDWIDTHS[k], b_min, b_max)
            }),
            flutter: ScalarParameter::new(
                "Ffmax",
                DEFAULT_FLUTTER,
                FLUTTER_RANGE.0,
                FLUTTER_RANGE.1,
            ),
            flutter_on: ToggleParameter::new("Ffon", true),
        }
    }
}

impl FormantParameters {
    /// Subscribes `controls` and pushes the current values to them.
    pub fn connect(&mut self, controls: &FormantControls) {
        for (param, target) in self.frequencies.iter_mut().zip(&controls.frequencies) {
            param.subscribe(target);
            target.set(param.value());
        }
        for (param, target) in self.bandwidths.iter_mut().zip(&controls.bandwidths) {
            param.subscribe(target);
            target.set(param.value());
        }
        self.flutter.subscribe(&controls.flutter);
        self.flutter_on.subscribe(&controls.flutter_on);
        controls.flutter.set(self.flutter.value());
        controls.flutter_on.set(self.flutter_on.value());
    }
}

/// Formant flutter offset of formant `k` at host time `t`.
///
/// Each formant gets its own time scale so the five resonators drift independently.
fn formant_flutter(k: usize, t: f64) -> f64 {
    let tk = (1.0 - 0.2 * (k as f64 - (NUM_FORMANTS / 2) as f64)) * (t + 0.5 * k as f64);
    0.1 * (sin_pi(2.0 * 12.7 * tk) + sin_pi(2.0 * 7.1 * tk) + sin_pi(2.0 * 4.7 * tk))
}

/// Filters the upstream signal through the vocal tract.
#[derive(Debug)]
pub struct FormantGenerator {
    controls: FormantControls,
    filters: [OneFormantFilter; NUM_FORMANTS],
    lip: LipRadiation,
    frequency_curves: [AutomationCurve; NUM_FORMANTS],
    bandwidth_curves: [AutomationCurve; NUM_FORMANTS],
    flutter_curve: AutomationCurve,
}

impl FormantGenerator {
    #[must_use]
    pub fn new(controls: FormantControls, fs: f64) -> Self {
        let (f_min, f_max) = FREQUENCY_RANGE;
        let (b_min, b_max) = BANDWIDTH_RANGE;
        let frequency_curves: [AutomationCurve; NUM_FORMANTS] = core::array::from_fn(|k| {
            AutomationCurve::new(controls.frequencies[k].get(), f_min, f_max)
        });
        let bandwidth_curves: [AutomationCurve; NUM_FORMANTS] = core::array::from_fn(|k| {
            AutomationCurve::new(controls.bandwidths[k].get(), b_min, b_max)
        });
        let flutter = if controls.flutter_on.get() {
            controls.flutter.get()
        } else {
            0.0
        };
        FormantGenerator {
            filters: core::array::from_fn(|k| {
                let frequency = frequency_curves[k].target();
                OneFormantFilter::new(frequency, bandwidth_curves[k].target(), fs)
            }),
            lip: LipRadiation::default(),
            frequency_curves,
            bandwidth_curves,
            flutter_curve: AutomationCurve::new(flutter, FLUTTER_RANGE.0, FLUTTER_RANGE.1),
            controls,
        }
    }

    #[must_use]
    pub fn controls(&self) -> &FormantControls {
        &self.controls
    }

    #[must_use]
    pub fn filter(&self, k: usize) -> Option<&OneFormantFilter> {
        self.filters.get(k)
    }

    /// Current coefficients of the whole tract: five resonators and the lip radiation.
    #[must_use]
    pub fn sos_coefficients(&self) -> Vec<Sos> {
        self.filters
            .iter()
            .map(OneFormantFilter::biquad_coefficients)
            .chain(core::iter::once(self.lip.sos()))
            .collect()
    }

    fn poll_controls(&mut self, now: f64) {
        let ramps = (self.frequency_curves.iter_mut().zip(&self.controls.frequencies))
            .chain(self.bandwidth_curves.iter_mut().zip(&self.controls.bandwidths));
        for (curve, target) in ramps {
            if let Some(value) = target.take_change() {
                curve.linear_ramp_to_value_at_time(value, now, now + FORMANT_RAMP);
            }
        }
        let flutter_changed = self.controls.flutter.take_change().is_some();
        let toggle_changed = self.controls.flutter_on.take_change().is_some();
        if flutter_changed || toggle_changed {
            let target = if self.controls.flutter_on.get() {
                self.controls.flutter.get()
            } else {
                0.0
            };
            self.flutter_curve
                .linear_ramp_to_value_at_time(target, now, now + FLUTTER_RAMP);
        }
    }
}

impl SignalGenerator for FormantGenerator {
    fn fill_internal_buffer(&mut self, ctx: &BlockContext, out: &mut [f64]) {
        if ctx.sample_rate_changed {
            for filter in &mut self.filters {
                filter.set_sample_rate(ctx.fs);
            }
            log::debug!("formant filters retuned for {} Hz", ctx.fs);
        }
        self.poll_controls(ctx.time(0));

        for (i, sample) in out.iter_mut().enumerate() {
            let t = ctx.time(i);
            let ffmax = self.flutter_curve.value_for_time(t);
            let mut y = *sample;
            for (k, filter) in self.filters.iter_mut().enumerate() {
                let modulation = 1.0 + ffmax * formant_flutter(k, t);
                filter.set_frequency(self.frequency_curves[k].value_for_time(t) * modulation);
                filter.set_bandwidth(self.bandwidth_curves[k].value_for_time(t) * modulation);
                filter.update();
                y = filter.tick(y);
            }
            *sample = self.lip.tick(y);
        }
    }
}
