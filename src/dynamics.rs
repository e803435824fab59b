//! Look-ahead compressor used for loudness normalization.

use crate::math::{db_to_lin, exp, lin_to_db, round};
use std::collections::VecDeque;

/// Compressor settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizerParms {
    /// Level above which the gain is reduced, in dB.
    pub threshold_db: f64,
    /// Width of the soft knee around the threshold, in dB.
    pub knee_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    /// Gain applied after the reduction, in dB.
    pub makeup_db: f64,
    /// Time over which a reduction is faded in before the peak that causes it.
    pub look_ahead_ms: f64,
}

impl Default for NormalizerParms {
    fn default() -> Self {
        NormalizerParms {
            threshold_db: -6.0,
            knee_db: 6.0,
            ratio: 20.0,
            attack_ms: 1.0,
            release_ms: 100.0,
            makeup_db: 0.0,
            look_ahead_ms: 5.0,
        }
    }
}

/// `exp(-1 / (ms * 0.001 * fs))`, the one-pole coefficient for a time constant.
fn smoothing_coefficient(ms: f64, fs: f64) -> f64 {
    exp(-1.0 / (ms * 0.001 * fs))
}

/// Static curve and attack/release smoothing of the gain reduction.
#[derive(Debug, Clone)]
pub struct GainComputer {
    threshold: f64,
    knee: f64,
    slope: f64,
    alpha_attack: f64,
    alpha_release: f64,
    /// smoothed gain reduction in dB, never positive
    state: f64,
}

impl GainComputer {
    #[must_use]
    pub fn new(parms: &NormalizerParms, fs: f64) -> Self {
        GainComputer {
            threshold: parms.threshold_db,
            knee: parms.knee_db.max(0.0),
            slope: 1.0 / parms.ratio.max(1.0) - 1.0,
            alpha_attack: smoothing_coefficient(parms.attack_ms, fs),
            alpha_release: smoothing_coefficient(parms.release_ms, fs),
            state: 0.0,
        }
    }

    /// Gain reduction in dB for an input level in dB, before smoothing.
    #[must_use]
    pub fn characteristic(&self, level_db: f64) -> f64 {
        let over = level_db - self.threshold;
        let half_knee = 0.5 * self.knee;
        if over <= -half_knee {
            0.0
        } else if over < half_knee {
            let x = over + half_knee;
            self.slope * x * x / (2.0 * self.knee)
        } else {
            self.slope * over
        }
    }

    pub fn tick(&mut self, level_db: f64) -> f64 {
        let target = self.characteristic(level_db);
        let alpha = if target < self.state {
            self.alpha_attack
        } else {
            self.alpha_release
        };
        self.state = alpha * self.state + (1.0 - alpha) * target;
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// Delays the signal and fades every gain reduction in linearly over the delay.
///
/// The deepest reduction seen within the window is held for the window length, then
/// averaged over the window. An isolated reduction therefore ramps in linearly and is
/// fully applied when the sample that caused it leaves the delay line.
#[derive(Debug, Clone)]
pub struct LookAhead {
    delay: usize,
    signal: VecDeque<f64>,
    /// Candidates for the window minimum as `(tick, gain)`, deepest at the front.
    minima: VecDeque<(usize, f64)>,
    /// The last `delay + 1` held minima and their sum.
    held: VecDeque<f64>,
    held_sum: f64,
    since_resum: usize,
    ticks: usize,
}

impl LookAhead {
    #[must_use]
    pub fn new(delay: usize) -> Self {
        LookAhead {
            delay,
            signal: core::iter::repeat_n(0.0, delay).collect(),
            minima: VecDeque::with_capacity(delay + 1),
            held: core::iter::repeat_n(0.0, delay + 1).collect(),
            held_sum: 0.0,
            since_resum: 0,
            ticks: 0,
        }
    }

    #[must_use]
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Takes a sample and its gain reduction in dB, returns the delayed sample together with
    /// the reduction that applies to it.
    pub fn tick(&mut self, x: f64, gain_db: f64) -> (f64, f64) {
        let window = self.delay + 1;
        let now = self.ticks;
        self.ticks = self.ticks.wrapping_add(1);

        let gain_db = gain_db.min(0.0);
        while self.minima.back().is_some_and(|&(_, g)| g >= gain_db) {
            self.minima.pop_back();
        }
        self.minima.push_back((now, gain_db));
        while self.minima.front().is_some_and(|&(t, _)| now.wrapping_sub(t) >= window) {
            self.minima.pop_front();
        }
        let minimum = self.minima.front().map_or(gain_db, |&(_, g)| g);

        self.held.push_back(minimum);
        self.held_sum += minimum - self.held.pop_front().unwrap_or(0.0);
        self.since_resum += 1;
        if self.since_resum >= window {
            // drop the rounding error the running sum collects
            self.held_sum = self.held.iter().sum();
            self.since_resum = 0;
        }

        self.signal.push_back(x);
        let delayed = self.signal.pop_front().unwrap_or(x);
        (delayed, self.held_sum / window as f64)
    }

    pub fn reset(&mut self) {
        self.signal.iter_mut().for_each(|x| *x = 0.0);
        self.held.iter_mut().for_each(|g| *g = 0.0);
        self.minima.clear();
        self.held_sum = 0.0;
        self.since_resum = 0;
        self.ticks = 0;
    }
}

/// Gain computer followed by the look-ahead stage.
#[derive(Debug, Clone)]
pub struct Normalizer {
    parms: NormalizerParms,
    computer: GainComputer,
    look_ahead: LookAhead,
    makeup: f64,
}

impl Normalizer {
    #[must_use]
    pub fn new(parms: NormalizerParms, fs: f64) -> Self {
        let delay = round(parms.look_ahead_ms.max(0.0) * 0.001 * fs) as usize;
        Normalizer {
            computer: GainComputer::new(&parms, fs),
            look_ahead: LookAhead::new(delay),
            makeup: parms.makeup_db,
            parms,
        }
    }

    #[must_use]
    pub fn parms(&self) -> &NormalizerParms {
        &self.parms
    }

    /// Rebuilds both stages for `fs`, dropping their state.
    pub fn set_sample_rate(&mut self, fs: f64) {
        *self = Self::new(self.parms, fs);
    }

    /// Latency in samples.
    #[must_use]
    pub fn delay(&self) -> usize {
        self.look_ahead.delay()
    }

    pub fn reset(&mut self) {
        self.computer.reset();
        self.look_ahead.reset();
    }

    pub fn process(&mut self, buffer: &mut [f64]) {
        for x in buffer {
            let reduction = self.computer.tick(lin_to_db(*x));
            let (delayed, gain_db) = self.look_ahead.tick(*x, reduction);
            *x = delayed * db_to_lin(gain_db + self.makeup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::TAU;

    fn sine(amplitude: f64, f: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| amplitude * (TAU * f * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn static_curve_has_a_soft_knee() {
        let computer = GainComputer::new(&NormalizerParms::default(), 48_000.0);
        assert_eq!(computer.characteristic(-20.0), 0.0);
        assert_eq!(computer.characteristic(-9.0), 0.0);
        assert!(computer.characteristic(-6.0) < 0.0);
        assert_relative_eq!(computer.characteristic(14.0), -19.0, epsilon = 1e-12);
    }

    #[test]
    fn quiet_signal_is_only_delayed() {
        let fs = 48_000.0;
        let mut normalizer = Normalizer::new(NormalizerParms::default(), fs);
        let delay = normalizer.delay();
        assert_eq!(delay, 240);

        let input = sine(0.1, 220.0, fs, 2000);
        let mut output = input.clone();
        normalizer.process(&mut output);
        assert!(output[..delay].iter().all(|&x| x == 0.0));
        for (y, x) in output[delay..].iter().zip(&input) {
            assert_relative_eq!(*y, *x, epsilon = 1e-12);
        }
    }

    #[test]
    fn loud_signal_is_brought_down() {
        let fs = 48_000.0;
        let mut normalizer = Normalizer::new(NormalizerParms::default(), fs);
        let mut signal = sine(4.0, 220.0, fs, 48_000);
        normalizer.process(&mut signal);
        let peak = signal[24_000..].iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert!(peak < 1.5, "peak {peak}");
        assert!(peak > 0.1);
    }

    #[test]
    fn reductions_are_faded_in_ahead_of_time() {
        let mut look_ahead = LookAhead::new(3);
        let mut gains = Vec::new();
        let mut samples = Vec::new();
        let reductions = [0.0, 0.0, 0.0, -8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        for (i, g) in reductions.into_iter().enumerate() {
            let (x, gain) = look_ahead.tick(i as f64, g);
            samples.push(x);
            gains.push(gain);
        }
        assert_eq!(samples, vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        // the reduction is complete when sample 3 comes out
        assert_eq!(gains, vec![0.0, 0.0, 0.0, -2.0, -4.0, -6.0, -8.0, -6.0, -4.0, -2.0, 0.0]);
    }

    #[test]
    fn window_minimum_matches_a_direct_search() {
        let delay = 7;
        let mut look_ahead = LookAhead::new(delay);
        let mut rng_state = 12_345_u64;
        let mut inputs = Vec::new();
        for _ in 0..500 {
            rng_state = rng_state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let g = -((rng_state >> 40) as f64 / (1u64 << 24) as f64) * 30.0;
            inputs.push(g);
            let (_, gain) = look_ahead.tick(0.0, g);

            let n = inputs.len();
            let held = |m: usize| {
                inputs[m.saturating_sub(delay)..=m].iter().fold(0.0_f64, |acc, &v| acc.min(v))
            };
            let expected = (0..=delay)
                .map(|k| if n > k { held(n - 1 - k) } else { 0.0 })
                .sum::<f64>()
                / (delay + 1) as f64;
            assert_relative_eq!(gain, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn reset_forgets_pending_reductions() {
        let mut look_ahead = LookAhead::new(4);
        look_ahead.tick(1.0, -12.0);
        look_ahead.reset();
        for _ in 0..6 {
            assert_eq!(look_ahead.tick(1.0, 0.0).1, 0.0);
        }
    }
}
