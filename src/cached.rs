//! One period of the flow derivative, sampled ahead of playback.

use crate::models::GlottalFlowModel;

/// Samples of the current model at the current period length.
///
/// The samples are stored time-reversed: index `0` holds `dg(1)` and index `n - 1` holds
/// `dg(0)`. Playback reads the indices upwards while the models are parameterized from the
/// end of the cycle backwards.
#[derive(Debug, Clone)]
pub struct CachedGlottalFlowModel {
    period_length: usize,
    samples: Vec<f64>,
    dirty: bool,
}

impl Default for CachedGlottalFlowModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedGlottalFlowModel {
    #[must_use]
    pub fn new() -> Self {
        CachedGlottalFlowModel {
            period_length: 0,
            samples: Vec::new(),
            dirty: true,
        }
    }

    /// Preallocates room for periods up to `capacity` samples, so that refilling the cache
    /// on the audio path does not allocate.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        CachedGlottalFlowModel {
            samples: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn period_length(&self) -> usize {
        self.period_length
    }

    /// Marks the cache dirty when the length actually changes.
    pub fn set_period_length(&mut self, period_length: usize) {
        if self.period_length != period_length {
            self.period_length = period_length;
            self.dirty = true;
        }
    }

    pub fn mark_model_changed(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Resamples `model` at the current period length and clears the dirty flag.
    pub fn update_cache(&mut self, model: &GlottalFlowModel) {
        let n = self.period_length;
        self.samples.clear();
        if n == 1 {
            self.samples.push(model.evaluate(0.0));
        } else {
            let last = (n - 1) as f64;
            self.samples
                .extend((0..n).map(|i| model.evaluate((n - 1 - i) as f64 / last)));
        }
        self.dirty = false;
    }

    /// The sample at index `i`, or `0` on a miss.
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        if self.dirty || i >= self.samples.len() {
            log::warn!(
                "glottal flow cache miss at {i} (length {}, dirty {})",
                self.period_length,
                self.dirty
            );
            return 0.0;
        }
        self.samples[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GlottalFlowParameters, ModelType};

    fn klglott() -> GlottalFlowModel {
        let mut params = GlottalFlowParameters::new();
        let mut model = GlottalFlowModel::new(ModelType::Klglott88);
        model.update_parameter_bounds(&mut params);
        params.oq.set_value(0.5);
        model.fit_parameters(&params).unwrap();
        model
    }

    #[test]
    fn samples_are_time_reversed() {
        let model = klglott();
        let mut cache = CachedGlottalFlowModel::new();
        cache.set_period_length(5);
        assert!(cache.is_dirty());
        cache.update_cache(&model);
        assert!(!cache.is_dirty());

        assert_eq!(cache.get(4), model.evaluate(0.0));
        assert_eq!(cache.get(2), model.evaluate(0.5));
        assert_eq!(cache.get(0), model.evaluate(1.0));
    }

    #[test]
    fn every_sample_matches_the_model() {
        let model = klglott();
        let mut cache = CachedGlottalFlowModel::with_capacity(480);
        cache.set_period_length(480);
        cache.update_cache(&model);
        for i in 0..480 {
            assert_eq!(cache.get(i), model.evaluate((479 - i) as f64 / 479.0), "index {i}");
        }
    }

    #[test]
    fn misses_read_as_silence() {
        let mut cache = CachedGlottalFlowModel::new();
        cache.set_period_length(4);
        assert_eq!(cache.get(0), 0.0, "dirty cache");
        cache.update_cache(&klglott());
        assert_eq!(cache.get(4), 0.0, "out of range");
    }

    #[test]
    fn same_length_does_not_dirty() {
        let mut cache = CachedGlottalFlowModel::with_capacity(16);
        cache.set_period_length(8);
        cache.update_cache(&klglott());
        cache.set_period_length(8);
        assert!(!cache.is_dirty());
        cache.set_period_length(9);
        assert!(cache.is_dirty());
    }

    #[test]
    fn single_sample_period_uses_the_start() {
        let model = klglott();
        let mut cache = CachedGlottalFlowModel::new();
        cache.set_period_length(1);
        cache.update_cache(&model);
        assert_eq!(cache.get(0), model.evaluate(0.0));
    }
}
