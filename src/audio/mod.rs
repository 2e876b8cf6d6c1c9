//! Audio buffers, codec framing and WAV I/O.

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod wav;

pub use codec::{opus_available, opus_version};
pub use decoder::{DecoderConfig, OpusDecoder, PacketDecoder, Pcm16Decoder, downmix};
pub use encoder::{EncoderConfig, OpusEncoder, PacketEncoder, PacketStream, Pcm16Encoder};
pub use frame::AudioFrame;
pub use wav::{WavClip, write_wav};
