//! Packet decoders, the inverse of [`crate::audio::encoder`].
//!
//! Multi-channel packets are downmixed to mono by averaging each interleaved
//! group. Decode failures are returned per call as [`DecodeError`].

use crate::audio::codec::opus_available;
use crate::audio::frame::{AudioFrame, I16_SCALE_IN};
use crate::error::{DecodeError, Result, VoxnexusError};

/// Decoder parameters, fixed for the lifetime of a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one packet.
    pub frame_size: usize,
}

impl DecoderConfig {
    pub fn new(sample_rate: u32, channels: u16, frame_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            frame_size,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(VoxnexusError::invalid_config(
                "channels",
                "at least one channel is required",
            ));
        }
        if self.frame_size == 0 {
            return Err(VoxnexusError::invalid_config(
                "frame_size",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Averages interleaved channels into one normalized mono sample per index.
pub fn downmix(interleaved: &[i16], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.iter().map(|&s| s as f32 / I16_SCALE_IN).collect();
    }
    interleaved
        .chunks_exact(channels)
        .map(|group| {
            let sum: f32 = group.iter().map(|&s| s as f32 / I16_SCALE_IN).sum();
            sum / channels as f32
        })
        .collect()
}

/// Turns one packet back into a mono frame.
pub trait PacketDecoder: Send {
    fn decode_packet(&mut self, packet: &[u8]) -> std::result::Result<AudioFrame, DecodeError>;
}

/// Opus decoder backed by libopus.
pub struct OpusDecoder {
    config: DecoderConfig,
    #[cfg(feature = "opus")]
    inner: opus::Decoder,
}

impl OpusDecoder {
    /// Creates a decoder for mono or stereo packets.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        if config.channels > 2 {
            return Err(VoxnexusError::invalid_config(
                "channels",
                format!("Opus decodes mono or stereo, got {} channels", config.channels),
            ));
        }
        opus_available()?;
        Self::open(config)
    }

    #[cfg(feature = "opus")]
    fn open(config: DecoderConfig) -> Result<Self> {
        let channels = if config.channels == 2 {
            opus::Channels::Stereo
        } else {
            opus::Channels::Mono
        };
        let inner = opus::Decoder::new(config.sample_rate, channels).map_err(|e| {
            VoxnexusError::invalid_config("sample_rate", format!("Opus decoder rejected it: {e}"))
        })?;
        Ok(Self { config, inner })
    }

    #[cfg(not(feature = "opus"))]
    fn open(config: DecoderConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes one packet into a mono frame.
    pub fn decode(&mut self, packet: &[u8]) -> std::result::Result<AudioFrame, DecodeError> {
        // An empty input would make libopus run packet-loss concealment.
        if packet.is_empty() {
            return Err(DecodeError::Malformed {
                message: "empty packet".to_string(),
            });
        }
        let pcm = self.decode_pcm(packet)?;
        Ok(AudioFrame::new(
            downmix(&pcm, self.config.channels),
            self.config.sample_rate,
        ))
    }

    #[cfg(feature = "opus")]
    fn decode_pcm(&mut self, packet: &[u8]) -> std::result::Result<Vec<i16>, DecodeError> {
        let channels = self.config.channels as usize;
        let mut pcm = vec![0i16; self.config.frame_size * channels];
        let decoded = self
            .inner
            .decode(packet, &mut pcm, false)
            .map_err(|e| DecodeError::Malformed {
                message: e.to_string(),
            })?;
        pcm.truncate(decoded * channels);
        Ok(pcm)
    }

    #[cfg(not(feature = "opus"))]
    fn decode_pcm(&mut self, _packet: &[u8]) -> std::result::Result<Vec<i16>, DecodeError> {
        Err(DecodeError::Malformed {
            message: "Opus support is not compiled in".to_string(),
        })
    }
}

impl PacketDecoder for OpusDecoder {
    fn decode_packet(&mut self, packet: &[u8]) -> std::result::Result<AudioFrame, DecodeError> {
        self.decode(packet)
    }
}

/// Decoder for packets produced by [`crate::audio::encoder::Pcm16Encoder`]
/// (or any interleaved little-endian i16 stream of the configured shape).
#[derive(Debug, Clone)]
pub struct Pcm16Decoder {
    config: DecoderConfig,
}

impl Pcm16Decoder {
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode(&mut self, packet: &[u8]) -> std::result::Result<AudioFrame, DecodeError> {
        let expected = self.config.frame_size * self.config.channels as usize * 2;
        if packet.len() != expected {
            return Err(DecodeError::UnexpectedLength {
                expected,
                actual: packet.len(),
            });
        }
        let pcm: Vec<i16> = packet
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(AudioFrame::new(
            downmix(&pcm, self.config.channels),
            self.config.sample_rate,
        ))
    }
}

impl PacketDecoder for Pcm16Decoder {
    fn decode_packet(&mut self, packet: &[u8]) -> std::result::Result<AudioFrame, DecodeError> {
        self.decode(packet)
    }
}
