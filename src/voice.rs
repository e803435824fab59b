//! The complete voice: source into vocal tract, with the handles the user interface keeps.

use crate::buffered::{BufferedGenerator, DEFAULT_RING_LENGTH, SampleRing, StreamClock};
use crate::dynamics::NormalizerParms;
use crate::error::Result;
use crate::flow::GlottalFlow;
use crate::formant::{FormantControls, FormantGenerator, FormantParameters};
use crate::models::ModelType;
use crate::parameter::ToggleTarget;
use crate::source::{SourceControls, SourceGenerator, SourceParameters};
use rand::Rng;
use std::sync::Arc;

/// Voice settings fixed at construction, in the manner of a main parameter block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParms {
    /// Initial sample rate in Hz.
    pub sample_rate: f64,
    /// Length of both output recordings, in samples.
    pub ring_length: usize,
    pub model: ModelType,
    /// Whether the final output starts out loudness normalized.
    pub normalized: bool,
    pub normalizer: NormalizerParms,
}

impl Default for VoiceParms {
    fn default() -> Self {
        VoiceParms {
            sample_rate: 48_000.0,
            ring_length: DEFAULT_RING_LENGTH,
            model: ModelType::Lf,
            normalized: false,
            normalizer: NormalizerParms::default(),
        }
    }
}

/// Everything the user interface holds on to.
///
/// Dropping the controls drops the model arena, after which the voice renders silence.
#[derive(Debug)]
pub struct VoiceControls {
    /// Shape parameters, plot model and model selection.
    pub flow: GlottalFlow,
    pub source: SourceParameters,
    pub formants: FormantParameters,
    /// Recording of the glottal source.
    pub source_ring: Arc<SampleRing>,
    /// Recording of the final output.
    pub output_ring: Arc<SampleRing>,
    pub clock: Arc<StreamClock>,
    normalized: Arc<ToggleTarget>,
}

impl VoiceControls {
    pub fn set_model_type(&mut self, kind: ModelType) {
        self.flow.set_model_type(kind);
    }

    pub fn set_sample_rate(&self, fs: f64) {
        self.clock.set_sample_rate(fs);
    }

    pub fn set_normalized(&self, normalized: bool) {
        self.normalized.set(normalized);
    }

    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.normalized.get()
    }
}

/// Source and formant stages sharing one clock.
#[derive(Debug)]
pub struct Voice<R> {
    source: BufferedGenerator<SourceGenerator<R>>,
    formants: BufferedGenerator<FormantGenerator>,
    clock: Arc<StreamClock>,
    scratch: Vec<f64>,
}

impl<R: Rng + Send> Voice<R> {
    /// Builds the audio side and the connected user-interface side of a voice.
    ///
    /// # Errors
    ///
    /// See [`SourceGenerator::new`].
    pub fn new(parms: VoiceParms, rng: R) -> Result<(Self, VoiceControls)> {
        let clock = Arc::new(StreamClock::new(parms.sample_rate));

        let source_controls = SourceControls::default();
        let mut flow = GlottalFlow::new(parms.model);
        flow.connect(&source_controls);
        let mut source = SourceParameters::default();
        source.connect(&source_controls);

        let formant_controls = FormantControls::default();
        let mut formants = FormantParameters::default();
        formants.connect(&formant_controls);

        let generator = SourceGenerator::new(flow.arena().handle(), source_controls, rng)?;
        let source_stage = BufferedGenerator::new(generator, Arc::clone(&clock), parms.normalizer);
        let formant_stage = BufferedGenerator::new(
            FormantGenerator::new(formant_controls, parms.sample_rate),
            Arc::clone(&clock),
            parms.normalizer,
        );
        source_stage.set_buffer_length(parms.ring_length);
        formant_stage.set_buffer_length(parms.ring_length);
        formant_stage.set_normalized(parms.normalized);

        let controls = VoiceControls {
            flow,
            source,
            formants,
            source_ring: source_stage.ring(),
            output_ring: formant_stage.ring(),
            clock: Arc::clone(&clock),
            normalized: formant_stage.normalized_control(),
        };
        let voice = Voice {
            source: source_stage,
            formants: formant_stage,
            clock,
            scratch: Vec::new(),
        };
        Ok((voice, controls))
    }

    #[must_use]
    pub fn source(&self) -> &BufferedGenerator<SourceGenerator<R>> {
        &self.source
    }

    #[must_use]
    pub fn formants(&self) -> &BufferedGenerator<FormantGenerator> {
        &self.formants
    }

    pub fn set_sample_rate(&self, fs: f64) {
        self.clock.set_sample_rate(fs);
    }

    /// Renders the next `out.len()` samples.
    pub fn fill_buffer(&mut self, out: &mut [f64]) {
        self.source.fill_buffer(out);
        self.formants.fill_buffer(out);
        self.clock.advance(out.len());
    }

    /// [`Voice::fill_buffer`] for drivers that want `f32`.
    pub fn fill_buffer_f32(&mut self, out: &mut [f32]) {
        let mut scratch = core::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(out.len(), 0.0);
        self.fill_buffer(&mut scratch);
        for (dst, src) in out.iter_mut().zip(&scratch) {
            *dst = *src as f32;
        }
        self.scratch = scratch;
    }
}
