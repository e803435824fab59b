//! Block processing shared by the source and formant stages.
//!
//! A [`BufferedGenerator`] runs a [`SignalGenerator`] on the audio thread, optionally
//! normalizes the result and appends it to a [`SampleRing`] that the user interface reads
//! for the spectrum display.

use crate::dynamics::{Normalizer, NormalizerParms};
use crate::math::fuzzy_equals;
use crate::parameter::ToggleTarget;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_RING_LENGTH: usize = 1024;

/// Timing of the block being generated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockContext {
    /// Host time of the first sample, in seconds.
    pub start_time: f64,
    pub fs: f64,
    /// Set on the first block and on every block after a sample-rate change.
    pub sample_rate_changed: bool,
}

impl BlockContext {
    /// Host time of the sample `offset` samples into the block.
    #[must_use]
    pub fn time(&self, offset: usize) -> f64 {
        self.start_time + offset as f64 / self.fs
    }
}

/// A stage of the voice.
pub trait SignalGenerator: Send {
    /// Writes one block into `out`. On entry `out` holds the output of the previous stage,
    /// which a filter stage processes in place and a source stage overwrites.
    fn fill_internal_buffer(&mut self, ctx: &BlockContext, out: &mut [f64]);
}

/// Sample rate and elapsed time of the audio stream.
///
/// Only the audio thread advances the clock; anyone may read it or change the rate.
#[derive(Debug)]
pub struct StreamClock {
    fs: AtomicU64,
    time: AtomicU64,
    rate_version: AtomicU64,
}

impl StreamClock {
    #[must_use]
    pub fn new(fs: f64) -> Self {
        StreamClock {
            fs: AtomicU64::new(fs.to_bits()),
            time: AtomicU64::new(0.0_f64.to_bits()),
            rate_version: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.fs.load(Ordering::Acquire))
    }

    /// Stores a new rate; every generator sees the change on its next block.
    pub fn set_sample_rate(&self, fs: f64) {
        if !fuzzy_equals(self.sample_rate(), fs) {
            self.fs.store(fs.to_bits(), Ordering::Release);
            self.rate_version.fetch_add(1, Ordering::Release);
        }
    }

    /// Incremented by every effective [`StreamClock::set_sample_rate`].
    #[must_use]
    pub fn rate_version(&self) -> u64 {
        self.rate_version.load(Ordering::Acquire)
    }

    /// Elapsed time plus `offset` samples, in seconds.
    #[must_use]
    pub fn time(&self, offset: usize) -> f64 {
        f64::from_bits(self.time.load(Ordering::Acquire)) + offset as f64 / self.sample_rate()
    }

    pub fn advance(&self, samples: usize) {
        let t = self.time(samples);
        self.time.store(t.to_bits(), Ordering::Release);
    }
}

impl Default for StreamClock {
    fn default() -> Self {
        Self::new(48_000.0)
    }
}

#[derive(Debug)]
struct RingState {
    samples: VecDeque<f64>,
    capacity: usize,
    written: u64,
}

/// The last `capacity` output samples, shared between the audio and the UI thread.
#[derive(Debug)]
pub struct SampleRing {
    state: RwLock<RingState>,
}

impl SampleRing {
    /// A ring of `capacity` zeros.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        SampleRing {
            state: RwLock::new(RingState {
                samples: core::iter::repeat_n(0.0, capacity).collect(),
                capacity,
                written: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState> {
        self.state.read().unwrap_or_else(|e| {
            log::warn!("sample ring lock poisoned; continuing");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.read().capacity
    }

    /// Resizes the ring. The contents are replaced by zeros.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.write();
        if state.capacity != capacity {
            state.capacity = capacity;
            state.samples.clear();
            state.samples.resize(capacity, 0.0);
        }
    }

    /// Appends `block`, dropping the oldest samples.
    pub fn push(&self, block: &[f64]) {
        let mut state = self.write();
        let capacity = state.capacity;
        let block = &block[block.len().saturating_sub(capacity)..];
        let excess = (state.samples.len() + block.len()).saturating_sub(capacity);
        state.samples.drain(..excess);
        state.samples.extend(block);
        state.written += block.len() as u64;
    }

    /// Copies the most recent `out.len()` samples into `out`, oldest first and zero-padded
    /// at the front when the ring is shorter. Returns the number of samples written so far,
    /// for [`SampleRing::has_enough_samples_since`].
    pub fn copy_to(&self, out: &mut [f64]) -> u64 {
        let state = self.read();
        let n = out.len().min(state.samples.len());
        let (padding, tail) = out.split_at_mut(out.len() - n);
        padding.fill(0.0);
        for (dst, src) in tail.iter_mut().zip(state.samples.range(state.samples.len() - n..)) {
            *dst = *src;
        }
        state.written
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<f64> {
        self.read().samples.iter().copied().collect()
    }

    #[must_use]
    pub fn samples_written(&self) -> u64 {
        self.read().written
    }

    /// Whether at least `length` samples were pushed after the copy that returned `since`.
    #[must_use]
    pub fn has_enough_samples_since(&self, since: u64, length: usize) -> bool {
        self.samples_written().saturating_sub(since) >= length as u64
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_LENGTH)
    }
}

/// Runs a [`SignalGenerator`] block by block and records its output.
#[derive(Debug)]
pub struct BufferedGenerator<G> {
    generator: G,
    clock: Arc<StreamClock>,
    /// Bits of the rate the previous block was rendered at.
    seen_fs: Option<u64>,
    ring: Arc<SampleRing>,
    normalized: Arc<ToggleTarget>,
    normalizer: Normalizer,
}

impl<G: SignalGenerator> BufferedGenerator<G> {
    #[must_use]
    pub fn new(generator: G, clock: Arc<StreamClock>, normalizer: NormalizerParms) -> Self {
        let fs = clock.sample_rate();
        BufferedGenerator {
            generator,
            clock,
            seen_fs: None,
            ring: Arc::new(SampleRing::default()),
            normalized: Arc::new(ToggleTarget::new(false)),
            normalizer: Normalizer::new(normalizer, fs),
        }
    }

    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    /// The recorded output, for readers on other threads.
    #[must_use]
    pub fn ring(&self) -> Arc<SampleRing> {
        Arc::clone(&self.ring)
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<StreamClock> {
        &self.clock
    }

    /// Resizes the recording, discarding its contents.
    pub fn set_buffer_length(&self, length: usize) {
        self.ring.set_capacity(length);
    }

    /// See [`SampleRing::copy_to`].
    pub fn copy_buffer_to(&self, out: &mut [f64]) -> u64 {
        self.ring.copy_to(out)
    }

    /// The switch for loudness normalization, shareable with the user interface.
    #[must_use]
    pub fn normalized_control(&self) -> Arc<ToggleTarget> {
        Arc::clone(&self.normalized)
    }

    pub fn set_normalized(&self, normalized: bool) {
        self.normalized.set(normalized);
    }

    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.normalized.get()
    }

    /// Generates one block into `out` and records it.
    pub fn fill_buffer(&mut self, out: &mut [f64]) {
        // one load, so the flag and the rate of a block always agree
        let fs = self.clock.sample_rate();
        let sample_rate_changed = self.seen_fs != Some(fs.to_bits());
        self.seen_fs = Some(fs.to_bits());

        let ctx = BlockContext {
            start_time: self.clock.time(0),
            fs,
            sample_rate_changed,
        };
        if sample_rate_changed {
            self.normalizer.set_sample_rate(ctx.fs);
        }

        self.generator.fill_internal_buffer(&ctx, out);

        if self.normalized.take_change() == Some(true) {
            self.normalizer.reset();
        }
        if self.normalized.get() {
            self.normalizer.process(out);
        }
        self.ring.push(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes the block time of every sample.
    struct Ramp {
        blocks: Vec<BlockContext>,
    }

    impl SignalGenerator for Ramp {
        fn fill_internal_buffer(&mut self, ctx: &BlockContext, out: &mut [f64]) {
            self.blocks.push(*ctx);
            for (i, x) in out.iter_mut().enumerate() {
                *x = ctx.time(i);
            }
        }
    }

    fn ramp(clock: &Arc<StreamClock>) -> BufferedGenerator<Ramp> {
        let ramp = Ramp { blocks: Vec::new() };
        BufferedGenerator::new(ramp, Arc::clone(clock), NormalizerParms::default())
    }

    #[test]
    fn ring_keeps_the_latest_samples() {
        let ring = SampleRing::new(4);
        ring.push(&[1.0, 2.0, 3.0]);
        assert_eq!(ring.snapshot(), vec![0.0, 1.0, 2.0, 3.0]);
        ring.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(ring.snapshot(), vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(ring.samples_written(), 7);
    }

    #[test]
    fn copy_pads_and_truncates() {
        let ring = SampleRing::new(3);
        ring.push(&[1.0, 2.0, 3.0]);
        let mut long = [9.0; 5];
        assert_eq!(ring.copy_to(&mut long), 3);
        assert_eq!(long, [0.0, 0.0, 1.0, 2.0, 3.0]);
        let mut short = [9.0; 2];
        ring.copy_to(&mut short);
        assert_eq!(short, [2.0, 3.0]);
    }

    #[test]
    fn resizing_discards_contents() {
        let ring = SampleRing::new(3);
        ring.push(&[1.0, 2.0, 3.0]);
        ring.set_capacity(5);
        assert_eq!(ring.snapshot(), vec![0.0; 5]);
        assert!(ring.has_enough_samples_since(0, 3));
        assert!(!ring.has_enough_samples_since(1, 3));
    }

    #[test]
    fn sample_rate_change_is_seen_once() {
        let clock = Arc::new(StreamClock::new(48_000.0));
        let mut generator = ramp(&clock);
        let mut block = [0.0; 16];

        generator.fill_buffer(&mut block);
        generator.fill_buffer(&mut block);
        clock.set_sample_rate(44_100.0);
        clock.set_sample_rate(44_100.0);
        generator.fill_buffer(&mut block);

        let blocks = &generator.generator().blocks;
        let flags: Vec<bool> = blocks.iter().map(|b| b.sample_rate_changed).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(generator.generator().blocks[2].fs, 44_100.0);
    }

    #[test]
    fn every_rate_switch_is_flagged_on_the_block_that_uses_it() {
        let clock = Arc::new(StreamClock::new(48_000.0));
        let mut generator = ramp(&clock);
        let mut block = [0.0; 8];
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2000 {
                    clock.set_sample_rate(if i % 2 == 0 { 44_100.0 } else { 48_000.0 });
                }
            });
            for _ in 0..2000 {
                generator.fill_buffer(&mut block);
            }
        });

        let blocks = &generator.generator().blocks;
        assert!(blocks[0].sample_rate_changed);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].sample_rate_changed, pair[0].fs != pair[1].fs);
        }
    }

    #[test]
    fn block_times_follow_the_clock() {
        let clock = Arc::new(StreamClock::new(1000.0));
        let mut generator = ramp(&clock);
        let mut block = [0.0; 10];
        generator.fill_buffer(&mut block);
        clock.advance(block.len());
        generator.fill_buffer(&mut block);
        assert!((block[0] - 0.01).abs() < 1e-12);
        assert!((block[9] - 0.019).abs() < 1e-12);
        assert_eq!(generator.ring().samples_written(), 20);
    }
}
