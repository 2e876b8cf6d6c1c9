//! Speech synthesis capability and a reference implementation.

pub mod synthesizer;

pub use synthesizer::{AudioStream, SineWaveSynthesizer, SpeechSynthesizer};
