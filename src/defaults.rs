//! Default configuration constants for voxnexus.
//!
//! Shared between the config file layer, the session and the codec so every
//! entry point agrees on the same numbers.

use std::time::Duration;

/// Default input sample rate in Hz.
///
/// 16kHz is the standard rate for speech recognition input.
pub const SAMPLE_RATE: u32 = 16000;

/// Default sample rate of synthesized speech in Hz.
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// Number of frames the ingestion queue holds before `push_audio` starts dropping.
pub const QUEUE_CAPACITY: usize = 200;

/// How long `stop()` waits for the worker thread before detaching it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-attempt timeout when delivering the stop sentinel into a full queue.
pub const SENTINEL_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Poll interval while joining the worker thread.
pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Frame durations (ms) the encoder accepts.
pub const ALLOWED_FRAME_DURATIONS_MS: [u32; 4] = [10, 20, 40, 60];

/// Default encoder frame duration in milliseconds.
pub const FRAME_DURATION_MS: u32 = 20;

/// Default encoder target bitrate in bits per second.
pub const BITRATE: i32 = 24000;

/// Upper bound for a single compressed packet.
pub const MAX_PACKET_BYTES: usize = 4000;

/// Emotion attached to the change annotation event.
pub const NEUTRAL_EMOTION: &str = "neutral";

/// Seconds of audio the reference inferencer consumes per recognized digit.
pub const SECONDS_PER_DIGIT: f64 = 1.0;

/// Length of one synthesized tone per token, in seconds.
pub const SECONDS_PER_TOKEN: f64 = 0.2;

/// Tone parameters for the reference synthesizer.
pub const TONE_START_HZ: f32 = 440.0;
pub const TONE_STEP_HZ: f32 = 20.0;
pub const TONE_AMPLITUDE: f32 = 0.2;

/// Samples per frame when splitting WAV input (100ms at 16kHz).
pub const WAV_CHUNK_MS: u32 = 100;
