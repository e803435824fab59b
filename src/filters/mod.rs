//! Digital filters: second-order section cascades, Butterworth design and the
//! state-variable biquad used by the formant resonators.

pub mod butterworth;
pub mod sos;
pub mod svf;

pub use butterworth::FilterType;
pub use sos::{Sos, SosFilter, zpk2sos};
pub use svf::{SvfBiquad, SvfOutputs, SvfPiece};
