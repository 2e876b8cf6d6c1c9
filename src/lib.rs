//! voxnexus - Real-time voice session pipeline
//!
//! Audio frames go in, structured status events and compressed audio packets
//! come out. Recognition, synthesis and encoding are pluggable stages driven
//! by one worker thread per session.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
pub mod session;
pub mod stt;
pub mod tts;

// Stage capabilities (recognize → synthesize → encode)
pub use audio::decoder::PacketDecoder;
pub use audio::encoder::PacketEncoder;
pub use stt::inferencer::SpeechInferencer;
pub use tts::synthesizer::SpeechSynthesizer;

// Session
pub use session::{
    CollectorSink, EventSink, FaultReporter, PacketSink, SessionConfig, SessionEvent,
    StreamSession,
};

// Audio
pub use audio::{AudioFrame, EncoderConfig, OpusDecoder, OpusEncoder, Pcm16Decoder, Pcm16Encoder};

// Error handling
pub use error::{DecodeError, Result, VoxnexusError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
