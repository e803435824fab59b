//! Real-time glottal source and formant voice synthesis in Rust.
//!
//! *NOTE*: This is _not_ a text-to-speech engine.
//! A single sustained vowel is synthesized from a parametric glottal flow model (LF, R++,
//! Rosenberg-C or KLGLOTT88) filtered through five formant resonators and a lip radiation
//! filter. Every parameter can be changed while audio is running; the generators ramp to
//! the new values.
//!
//! The pieces:
//! - [`models`]: the glottal flow derivative models and their fitting.
//! - [`SourceGenerator`]: plays the fitted model back period by period, with flutter,
//!   jitter and shimmer.
//! - [`FormantGenerator`]: the vocal tract.
//! - [`BufferedGenerator`]: block processing and recording for the display.
//! - [`Voice`]: both stages wired together, plus the handles a user interface keeps.
//!
//! See `demos/render_vowel.rs` for rendering a vowel to a WAV file.

#![deny(clippy::all, clippy::pedantic, unsafe_code, rustdoc::all)]
// fine for us since loss of precision/sign is not that imporatnt,
// as long as it's the same every time.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

#[cfg(all(feature = "std", feature = "libm"))]
compile_error!("Features \"std\" and \"libm\" are mutually exclusive.");

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Must specify a math feature: either \"std\" or \"libm\".");

mod math;
mod solve;

pub mod automation;
pub mod buffered;
pub mod cached;
pub mod dynamics;
pub mod error;
pub mod filters;
pub mod flow;
pub mod formant;
pub mod models;
pub mod parameter;
pub mod quadrature;
pub mod source;
pub mod spectrum;
mod traits;
pub mod voice;

pub use automation::{AutomationCurve, RampShape};
pub use buffered::{BlockContext, BufferedGenerator, SampleRing, SignalGenerator, StreamClock};
pub use cached::CachedGlottalFlowModel;
pub use dynamics::{Normalizer, NormalizerParms};
pub use error::{Error, Result};
pub use filters::{FilterType, Sos, SosFilter, SvfBiquad, SvfPiece};
pub use flow::{GlottalFlow, ModelArena, ModelHandle};
pub use formant::{FormantControls, FormantGenerator, FormantParameters, OneFormantFilter};
pub use models::{GlottalFlowModel, GlottalFlowParameters, ModelType};
pub use parameter::{ScalarParameter, ToggleParameter};
pub use source::{SourceControls, SourceGenerator, SourceParameters};
pub use spectrum::{FilterSpectrum, GeneratorSpectrum};
pub use traits::BasicFilter;
pub use voice::{Voice, VoiceControls, VoiceParms};

#[cfg(test)]
use math::db_to_lin;
#[cfg(test)]
use source::perform_frequency_modulation;

#[cfg(test)]
mod lib_tests;
