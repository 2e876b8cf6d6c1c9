use crate::audio::encoder::EncoderConfig;
use crate::defaults;
use crate::error::{Result, VoxnexusError};
use crate::session::SessionConfig;
use crate::stt::DigitCounterInferencer;
use crate::tts::SineWaveSynthesizer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub session: SessionSection,
    pub codec: CodecSection,
    pub stt: SttSection,
    pub tts: TtsSection,
}

/// Ingestion queue and shutdown behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub queue_capacity: usize,
    pub stop_timeout_ms: u64,
}

/// Outbound packet encoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodecSection {
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub bitrate: i32,
}

/// Reference digit-counting recognizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttSection {
    pub sample_rate: u32,
    pub seconds_per_digit: f64,
}

/// Reference sine-wave synthesizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsSection {
    pub sample_rate: u32,
    pub seconds_per_token: f64,
    pub start_hz: f32,
    pub step_hz: f32,
    pub amplitude: f32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            stop_timeout_ms: defaults::STOP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for CodecSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::TTS_SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            bitrate: defaults::BITRATE,
        }
    }
}

impl Default for SttSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            seconds_per_digit: defaults::SECONDS_PER_DIGIT,
        }
    }
}

impl Default for TtsSection {
    fn default() -> Self {
        Self {
            sample_rate: defaults::TTS_SAMPLE_RATE,
            seconds_per_token: defaults::SECONDS_PER_TOKEN,
            start_hz: defaults::TONE_START_HZ,
            step_hz: defaults::TONE_STEP_HZ,
            amplitude: defaults::TONE_AMPLITUDE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML and other I/O failures are still errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(VoxnexusError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize to pretty TOML (used by `config show`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxnexusError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXNEXUS_QUEUE_CAPACITY → session.queue_capacity
    /// - VOXNEXUS_SAMPLE_RATE → codec.sample_rate and tts.sample_rate
    /// - VOXNEXUS_FRAME_DURATION_MS → codec.frame_duration_ms
    /// - VOXNEXUS_BITRATE → codec.bitrate
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(capacity) = env_number("VOXNEXUS_QUEUE_CAPACITY") {
            self.session.queue_capacity = capacity;
        }

        if let Some(rate) = env_number("VOXNEXUS_SAMPLE_RATE") {
            self.codec.sample_rate = rate;
            self.tts.sample_rate = rate;
        }

        if let Some(duration) = env_number("VOXNEXUS_FRAME_DURATION_MS") {
            self.codec.frame_duration_ms = duration;
        }

        if let Some(bitrate) = env_number("VOXNEXUS_BITRATE") {
            self.codec.bitrate = bitrate;
        }

        self
    }

    /// Check values that would otherwise fail later, at session or codec construction.
    pub fn validate(&self) -> Result<()> {
        if self.session.queue_capacity == 0 {
            return Err(VoxnexusError::invalid_config(
                "session.queue_capacity",
                "must be at least 1",
            ));
        }
        self.encoder_config().validate()?;
        if self.tts.sample_rate != self.codec.sample_rate {
            return Err(VoxnexusError::invalid_config(
                "tts.sample_rate",
                format!(
                    "synthesizer produces {} Hz but the codec encodes {} Hz",
                    self.tts.sample_rate, self.codec.sample_rate
                ),
            ));
        }
        if self.stt.seconds_per_digit <= 0.0 {
            return Err(VoxnexusError::invalid_config(
                "stt.seconds_per_digit",
                "must be positive",
            ));
        }
        if self.tts.seconds_per_token <= 0.0 {
            return Err(VoxnexusError::invalid_config(
                "tts.seconds_per_token",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            queue_capacity: self.session.queue_capacity,
            stop_timeout: Duration::from_millis(self.session.stop_timeout_ms),
            ..SessionConfig::default()
        }
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::new(self.codec.sample_rate)
            .with_frame_duration_ms(self.codec.frame_duration_ms)
            .with_bitrate(self.codec.bitrate)
    }

    pub fn inferencer(&self) -> DigitCounterInferencer {
        DigitCounterInferencer::new(self.stt.sample_rate, self.stt.seconds_per_digit)
    }

    pub fn synthesizer(&self) -> SineWaveSynthesizer {
        SineWaveSynthesizer::new(self.tts.sample_rate)
            .with_seconds_per_token(self.tts.seconds_per_token)
            .with_tone(self.tts.start_hz, self.tts.step_hz, self.tts.amplitude)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxnexus/config.toml on Linux, or `None` when the
    /// platform has no config directory.
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxnexus").join("config.toml"))
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}
