//! Speech recognition capability and reference implementations.

pub mod inferencer;

pub use inferencer::{
    DigitCounterInferencer, FrameStream, ScriptedInferencer, SpeechInferencer, TranscriptStream,
};
