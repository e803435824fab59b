//! Spectra for display: the measured output of a generator and the analytic response of a
//! filter cascade.

use crate::buffered::SampleRing;
use crate::filters::Sos;
use crate::filters::sos::sos_response;
use crate::math::{cos, fuzzy_equals, lin_to_db};
use core::f64::consts::{PI, TAU};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_NFFT: usize = 8192;
pub const DEFAULT_SMOOTHING: f64 = 0.1;
pub const DEFAULT_FILTER_BINS: usize = 1024;

/// Symmetric Hann window of length `n`.
#[must_use]
pub fn hann_window(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    let last = (n - 1) as f64;
    (0..n).map(|i| 0.5 * (1.0 - cos(TAU * i as f64 / last))).collect()
}

/// Smoothed, Hann-windowed magnitude spectrum of a generator's recent output.
pub struct GeneratorSpectrum {
    nfft: usize,
    fs: f64,
    alpha: f64,
    window: Vec<f64>,
    /// `2 / sum(window)`, so that a sine of amplitude `A` reads `A` at its bin
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
    values: Vec<f64>,
    spectrum: Vec<Complex64>,
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
    magnitudes_db: Vec<f64>,
}

impl core::fmt::Debug for GeneratorSpectrum {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GeneratorSpectrum")
            .field("nfft", &self.nfft)
            .field("fs", &self.fs)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}

impl GeneratorSpectrum {
    #[must_use]
    pub fn new(nfft: usize, fs: f64) -> Self {
        let mut spectrum = GeneratorSpectrum {
            nfft: 0,
            fs,
            alpha: DEFAULT_SMOOTHING,
            window: Vec::new(),
            scale: 0.0,
            fft: FftPlanner::new().plan_fft_forward(1),
            values: Vec::new(),
            spectrum: Vec::new(),
            frequencies: Vec::new(),
            magnitudes: Vec::new(),
            magnitudes_db: Vec::new(),
        };
        spectrum.set_transform_size(nfft.max(1));
        spectrum
    }

    #[must_use]
    pub fn transform_size(&self) -> usize {
        self.nfft
    }

    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.nfft / 2 + 1
    }

    /// Replans the transform and clears the smoothed magnitudes.
    pub fn set_transform_size(&mut self, nfft: usize) {
        if self.nfft == nfft {
            return;
        }
        self.nfft = nfft;
        self.fft = FftPlanner::new().plan_fft_forward(nfft);
        self.window = hann_window(nfft);
        self.scale = 2.0 / self.window.iter().sum::<f64>();
        self.values = vec![0.0; nfft];
        self.spectrum = vec![Complex64::new(0.0, 0.0); nfft];
        self.rebuild_bins();
    }

    /// Exponential smoothing factor applied from the second update on.
    pub fn set_smoothing(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn set_sample_rate(&mut self, fs: f64) {
        if !fuzzy_equals(self.fs, fs) {
            self.fs = fs;
            self.rebuild_bins();
        }
    }

    fn rebuild_bins(&mut self) {
        let bins = self.bin_count();
        self.frequencies = (0..bins).map(|i| i as f64 * self.fs / self.nfft as f64).collect();
        self.magnitudes = vec![0.0; bins];
        self.magnitudes_db = vec![f64::NEG_INFINITY; bins];
    }

    /// Sizes `ring` to hold exactly one transform.
    pub fn attach(&self, ring: &SampleRing) {
        ring.set_capacity(self.nfft);
    }

    /// Analyzes the latest contents of `ring`. Returns the ring's write count at the copy.
    pub fn update_from(&mut self, ring: &SampleRing) -> u64 {
        let mut values = core::mem::take(&mut self.values);
        let written = ring.copy_to(&mut values);
        self.update(&values);
        self.values = values;
        written
    }

    /// Analyzes `samples`, zero-padded or truncated to the transform size.
    pub fn update(&mut self, samples: &[f64]) {
        for (i, bin) in self.spectrum.iter_mut().enumerate() {
            let x = samples.get(i).copied().unwrap_or(0.0);
            *bin = Complex64::new(x * self.window[i], 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let bins = self.magnitudes.iter_mut().zip(&mut self.magnitudes_db);
        for ((mag, db), x) in bins.zip(&self.spectrum) {
            let m = x.norm() * self.scale;
            if *mag > 0.0 {
                *mag += self.alpha * (m - *mag);
            } else {
                *mag = m;
            }
            *db = lin_to_db(*mag);
        }
    }

    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    #[must_use]
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    #[must_use]
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }
}

/// Magnitude response of a cascade of sections, on a linear frequency grid from DC up to
/// (but excluding) Nyquist.
#[derive(Debug, Clone)]
pub struct FilterSpectrum {
    fs: f64,
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
    magnitudes_db: Vec<f64>,
}

impl Default for FilterSpectrum {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_BINS, 48_000.0)
    }
}

impl FilterSpectrum {
    #[must_use]
    pub fn new(bins: usize, fs: f64) -> Self {
        let mut spectrum = FilterSpectrum {
            fs,
            frequencies: Vec::new(),
            magnitudes: Vec::new(),
            magnitudes_db: Vec::new(),
        };
        spectrum.set_size(bins);
        spectrum
    }

    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.frequencies.len()
    }

    pub fn set_size(&mut self, bins: usize) {
        self.frequencies = vec![0.0; bins];
        self.magnitudes = vec![0.0; bins];
        self.magnitudes_db = vec![f64::NEG_INFINITY; bins];
        self.rebuild_bins();
    }

    pub fn set_sample_rate(&mut self, fs: f64) {
        if !fuzzy_equals(self.fs, fs) {
            self.fs = fs;
            self.rebuild_bins();
        }
    }

    fn rebuild_bins(&mut self) {
        let bins = self.bin_count() as f64;
        for (i, f) in self.frequencies.iter_mut().enumerate() {
            *f = i as f64 * self.fs * 0.5 / bins;
        }
    }

    pub fn update(&mut self, sos: &[Sos]) {
        let bins = self.bin_count() as f64;
        let points = self.magnitudes.iter_mut().zip(&mut self.magnitudes_db);
        for (i, (mag, db)) in points.enumerate() {
            *mag = sos_response(sos, PI * i as f64 / bins).norm();
            *db = lin_to_db(*mag);
        }
    }

    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    #[must_use]
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    #[must_use]
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }
}
