//! Fixed-duration packet encoders.
//!
//! Samples are clamped, converted to 16-bit PCM and split into windows of
//! `frame_size` samples; the last window is zero-padded. Each window becomes
//! exactly one packet, produced lazily in input order.

use crate::audio::codec::opus_available;
use crate::audio::frame::to_i16;
use crate::defaults;
use crate::error::{Result, VoxnexusError};

/// Lazy, finite sequence of encoded packets.
pub type PacketStream<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Sample rates libopus accepts.
pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Converts normalized samples into fixed-duration packets.
///
/// Owned by exactly one session worker, so implementations need `Send` but
/// not `Sync`.
pub trait PacketEncoder: Send {
    /// Samples per packet.
    fn frame_size(&self) -> usize;

    /// Encodes `samples`, yielding one packet per `frame_size` window.
    fn encode<'a>(&'a mut self, samples: &'a [f32]) -> PacketStream<'a>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "encoder"
    }
}

impl<T: PacketEncoder + ?Sized> PacketEncoder for Box<T> {
    fn frame_size(&self) -> usize {
        (**self).frame_size()
    }

    fn encode<'a>(&'a mut self, samples: &'a [f32]) -> PacketStream<'a> {
        (**self).encode(samples)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Encoder parameters, fixed for the lifetime of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u32,
    /// Target bitrate in bits per second.
    pub bitrate: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::TTS_SAMPLE_RATE,
            channels: 1,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            bitrate: defaults::BITRATE,
        }
    }
}

impl EncoderConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    pub fn with_frame_duration_ms(mut self, frame_duration_ms: u32) -> Self {
        self.frame_duration_ms = frame_duration_ms;
        self
    }

    pub fn with_bitrate(mut self, bitrate: i32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Checks the parameters every encoder shares.
    pub fn validate(&self) -> Result<()> {
        if !defaults::ALLOWED_FRAME_DURATIONS_MS.contains(&self.frame_duration_ms) {
            return Err(VoxnexusError::invalid_config(
                "frame_duration_ms",
                format!(
                    "must be one of 10/20/40/60, got {}",
                    self.frame_duration_ms
                ),
            ));
        }
        if self.channels != 1 {
            return Err(VoxnexusError::invalid_config(
                "channels",
                format!("only mono is supported, got {} channels", self.channels),
            ));
        }
        if self.frame_size() == 0 {
            return Err(VoxnexusError::invalid_config(
                "sample_rate",
                format!("{} Hz yields an empty frame", self.sample_rate),
            ));
        }
        Ok(())
    }

    /// `sample_rate * frame_duration_ms / 1000`.
    pub fn frame_size(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }
}

/// Splits samples into zero-padded 16-bit windows.
pub struct PcmWindows<'a> {
    samples: &'a [f32],
    frame_size: usize,
    position: usize,
}

impl<'a> PcmWindows<'a> {
    pub fn new(samples: &'a [f32], frame_size: usize) -> Self {
        Self {
            samples,
            frame_size,
            position: 0,
        }
    }
}

impl Iterator for PcmWindows<'_> {
    type Item = Vec<i16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame_size == 0 || self.position >= self.samples.len() {
            return None;
        }
        let end = (self.position + self.frame_size).min(self.samples.len());
        let mut window: Vec<i16> = self.samples[self.position..end]
            .iter()
            .map(|&s| to_i16(s))
            .collect();
        window.resize(self.frame_size, 0);
        self.position = end;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len().saturating_sub(self.position);
        let count = if self.frame_size == 0 {
            0
        } else {
            remaining.div_ceil(self.frame_size)
        };
        (count, Some(count))
    }
}

/// Opus encoder backed by libopus.
pub struct OpusEncoder {
    config: EncoderConfig,
    #[cfg(feature = "opus")]
    inner: opus::Encoder,
}

impl OpusEncoder {
    /// Creates an encoder.
    ///
    /// Fails with a configuration error for invalid parameters or when libopus
    /// is not available.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        if !OPUS_SAMPLE_RATES.contains(&config.sample_rate) {
            return Err(VoxnexusError::invalid_config(
                "sample_rate",
                format!(
                    "Opus supports 8000/12000/16000/24000/48000 Hz, got {}",
                    config.sample_rate
                ),
            ));
        }
        opus_available()?;
        Self::open(config)
    }

    #[cfg(feature = "opus")]
    fn open(config: EncoderConfig) -> Result<Self> {
        let mut inner = opus::Encoder::new(
            config.sample_rate,
            opus::Channels::Mono,
            opus::Application::Audio,
        )
        .map_err(|e| VoxnexusError::CodecUnavailable {
            message: format!("failed to create Opus encoder: {e}"),
        })?;
        inner
            .set_bitrate(opus::Bitrate::Bits(config.bitrate))
            .map_err(|e| VoxnexusError::invalid_config("bitrate", e.to_string()))?;
        Ok(Self { config, inner })
    }

    #[cfg(not(feature = "opus"))]
    fn open(config: EncoderConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    #[cfg(feature = "opus")]
    fn encode_window(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        self.inner
            .encode_vec(pcm, defaults::MAX_PACKET_BYTES)
            .map_err(|e| VoxnexusError::Encode {
                message: e.to_string(),
            })
    }

    #[cfg(not(feature = "opus"))]
    fn encode_window(&mut self, _pcm: &[i16]) -> Result<Vec<u8>> {
        Err(VoxnexusError::Encode {
            message: "Opus support is not compiled in".to_string(),
        })
    }
}

impl PacketEncoder for OpusEncoder {
    fn frame_size(&self) -> usize {
        self.config.frame_size()
    }

    fn encode<'a>(&'a mut self, samples: &'a [f32]) -> PacketStream<'a> {
        let frame_size = self.frame_size();
        Box::new(PcmWindows::new(samples, frame_size).map(move |pcm| self.encode_window(&pcm)))
    }

    fn name(&self) -> &'static str {
        "opus"
    }
}

/// Uncompressed encoder: each packet is the window as little-endian i16.
///
/// Shares framing rules with [`OpusEncoder`]; useful where the transport wants
/// raw PCM or libopus is unavailable.
#[derive(Debug, Clone)]
pub struct Pcm16Encoder {
    config: EncoderConfig,
}

impl Pcm16Encoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl PacketEncoder for Pcm16Encoder {
    fn frame_size(&self) -> usize {
        self.config.frame_size()
    }

    fn encode<'a>(&'a mut self, samples: &'a [f32]) -> PacketStream<'a> {
        Box::new(
            PcmWindows::new(samples, self.frame_size())
                .map(|pcm| Ok(pcm.iter().flat_map(|s| s.to_le_bytes()).collect())),
        )
    }

    fn name(&self) -> &'static str {
        "pcm16"
    }
}
