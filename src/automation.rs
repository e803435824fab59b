//! Smoothed parameter automation.
//!
//! The generators never jump to a new parameter value. When a new target arrives, the
//! curve ramps from its value at that moment to the target over a fixed time, and the
//! generator samples it with [`AutomationCurve::value_for_time`].

use crate::math::pow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampShape {
    Linear,
    /// Constant ratio per unit of time. Falls back to linear when the endpoints do not share
    /// a sign.
    Exponential,
}

/// One pending ramp between two points in host time (seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationCurve {
    start_time: f64,
    start_value: f64,
    end_time: f64,
    end_value: f64,
    shape: RampShape,
    min: f64,
    max: f64,
}

impl AutomationCurve {
    #[must_use]
    pub fn new(value: f64, min: f64, max: f64) -> Self {
        let value = value.clamp(min, max);
        AutomationCurve {
            start_time: 0.0,
            start_value: value,
            end_time: 0.0,
            end_value: value,
            shape: RampShape::Linear,
            min,
            max,
        }
    }

    /// The value the curve settles on.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.end_value
    }

    #[must_use]
    pub fn value_for_time(&self, t: f64) -> f64 {
        if t >= self.end_time || self.end_time <= self.start_time {
            return self.end_value;
        }
        if t <= self.start_time {
            return self.start_value;
        }
        let x = (t - self.start_time) / (self.end_time - self.start_time);
        match self.shape {
            RampShape::Linear => self.start_value + (self.end_value - self.start_value) * x,
            RampShape::Exponential => {
                self.start_value * pow(self.end_value / self.start_value, x)
            }
        }
    }

    /// Jumps to `value` immediately.
    pub fn set_value(&mut self, value: f64) {
        let value = value.clamp(self.min, self.max);
        self.start_value = value;
        self.end_value = value;
        self.start_time = 0.0;
        self.end_time = 0.0;
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, now: f64, end_time: f64) {
        self.ramp(value, now, end_time, RampShape::Linear);
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, now: f64, end_time: f64) {
        self.ramp(value, now, end_time, RampShape::Exponential);
    }

    /// Starts a ramp from the current value at `now` towards `value`, reached at `end_time`.
    pub fn ramp(&mut self, value: f64, now: f64, end_time: f64, shape: RampShape) {
        let from = self.value_for_time(now);
        let to = value.clamp(self.min, self.max);
        self.start_time = now;
        self.start_value = from;
        self.end_time = end_time.max(now);
        self.end_value = to;
        self.shape = if shape == RampShape::Exponential && from * to > 0.0 {
            RampShape::Exponential
        } else {
            RampShape::Linear
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_ramp_passes_through_midpoint() {
        let mut c = AutomationCurve::new(100.0, 16.0, 1000.0);
        c.linear_ramp_to_value_at_time(200.0, 1.0, 1.1);
        assert_eq!(c.value_for_time(0.5), 100.0);
        assert_relative_eq!(c.value_for_time(1.05), 150.0, epsilon = 1e-9);
        assert_eq!(c.value_for_time(2.0), 200.0);
    }

    #[test]
    fn retarget_starts_from_current_value() {
        let mut c = AutomationCurve::new(0.0, 0.0, 1.0);
        c.linear_ramp_to_value_at_time(1.0, 0.0, 1.0);
        c.linear_ramp_to_value_at_time(0.0, 0.5, 1.5);
        assert_relative_eq!(c.value_for_time(0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.value_for_time(1.0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut c = AutomationCurve::new(0.5, 0.01, 6.0);
        c.exponential_ramp_to_value_at_time(2.0, 0.0, 1.0);
        assert_relative_eq!(c.value_for_time(0.5), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn exponential_ramp_through_zero_is_linear() {
        let mut c = AutomationCurve::new(0.0, -1.0, 1.0);
        c.exponential_ramp_to_value_at_time(1.0, 0.0, 1.0);
        assert_relative_eq!(c.value_for_time(0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn targets_are_clamped() {
        let mut c = AutomationCurve::new(120.0, 16.0, 1000.0);
        c.linear_ramp_to_value_at_time(5000.0, 0.0, 0.1);
        assert_eq!(c.target(), 1000.0);
        c.set_value(1.0);
        assert_eq!(c.value_for_time(3.0), 16.0);
    }
}
