//! Command implementations behind the `voxnexus` binary.
//!
//! Wires the reference stand-ins, a codec and the session together:
//! frames → session → JSON lines + packets.

use crate::audio::codec::opus_available;
use crate::audio::decoder::{DecoderConfig, OpusDecoder, PacketDecoder, Pcm16Decoder};
use crate::audio::encoder::{EncoderConfig, OpusEncoder, PacketEncoder, Pcm16Encoder};
use crate::audio::frame::AudioFrame;
use crate::audio::wav::{WavClip, write_wav};
use crate::cli::CodecChoice;
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, VoxnexusError};
use crate::session::{
    EventSink, FaultReporter, JsonLinesSink, PacketSink, PipelineFault, SessionEvent,
    StreamSession,
};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long the session must stay quiet, with an empty queue, before a
/// simulation is considered finished.
const SETTLE: Duration = Duration::from_millis(200);

/// Picks a concrete codec. `Auto` prefers Opus and falls back to PCM.
pub fn resolve_codec(choice: CodecChoice) -> Result<CodecChoice> {
    match choice {
        CodecChoice::Auto => match opus_available() {
            Ok(()) => Ok(CodecChoice::Opus),
            Err(e) => {
                warn!("{e}; falling back to pcm16");
                Ok(CodecChoice::Pcm16)
            }
        },
        CodecChoice::Opus => {
            opus_available()?;
            Ok(CodecChoice::Opus)
        }
        CodecChoice::Pcm16 => Ok(CodecChoice::Pcm16),
    }
}

pub fn build_encoder(choice: CodecChoice, config: EncoderConfig) -> Result<Box<dyn PacketEncoder>> {
    Ok(match resolve_codec(choice)? {
        CodecChoice::Opus => Box::new(OpusEncoder::new(config)?),
        _ => Box::new(Pcm16Encoder::new(config)?),
    })
}

/// Decoder matching what `build_encoder` produces for the same inputs.
pub fn build_decoder(choice: CodecChoice, config: EncoderConfig) -> Result<Box<dyn PacketDecoder>> {
    let decoder_config = DecoderConfig::new(config.sample_rate, 1, config.frame_size());
    Ok(match resolve_codec(choice)? {
        CodecChoice::Opus => Box::new(OpusDecoder::new(decoder_config)?),
        _ => Box::new(Pcm16Decoder::new(decoder_config)?),
    })
}

/// Input frames for `simulate`: a WAV file, or `seconds` of silence, in 100ms chunks.
pub fn simulation_frames(config: &Config, wav: Option<&Path>, seconds: u32) -> Result<Vec<AudioFrame>> {
    let rate = config.stt.sample_rate;
    if let Some(path) = wav {
        let clip = WavClip::open(path, rate)?;
        info!(
            path = %path.display(),
            samples = clip.samples().len(),
            "loaded WAV input"
        );
        return Ok(clip.frames(defaults::WAV_CHUNK_MS).collect());
    }
    let chunk = (rate as u64 * defaults::WAV_CHUNK_MS as u64 / 1000) as usize;
    let count = seconds as u64 * 1000 / defaults::WAV_CHUNK_MS as u64;
    Ok((0..count).map(|_| AudioFrame::silence(chunk, rate)).collect())
}

/// What a simulation published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub frames_pushed: usize,
    pub events: usize,
    pub packets: usize,
    pub packet_bytes: usize,
    pub dropped_frames: u64,
}

/// Publish counters shared between the session sinks and the driver.
struct Activity {
    events: AtomicUsize,
    packets: AtomicUsize,
    bytes: AtomicUsize,
    last: Mutex<Instant>,
    fault: Mutex<Option<String>>,
}

impl Activity {
    fn new() -> Self {
        Self {
            events: AtomicUsize::new(0),
            packets: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            last: Mutex::new(Instant::now()),
            fault: Mutex::new(None),
        }
    }

    fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

impl FaultReporter for Activity {
    fn report(&self, fault: &PipelineFault) {
        warn!(stage = %fault.stage, "simulation worker failed: {}", fault.error);
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(fault.to_string());
    }
}

/// Runs the reference session over `frames`, writing events to `out` as JSON lines.
///
/// Frames are pushed as fast as the queue accepts them. Returns once the queue
/// is drained and the session has been quiet for a moment.
pub fn run_simulate<W>(
    config: &Config,
    frames: Vec<AudioFrame>,
    codec: CodecChoice,
    out: W,
) -> Result<SimulationReport>
where
    W: Write + Send + 'static,
{
    config.validate()?;
    let encoder = build_encoder(codec, config.encoder_config())?;
    info!(codec = encoder.name(), "starting simulation");

    let activity = Arc::new(Activity::new());
    let lines = JsonLinesSink::new(out);
    let event_activity = activity.clone();
    let event_sink: Arc<dyn EventSink> = Arc::new(move |event: &SessionEvent| {
        lines.publish_event(event);
        event_activity.events.fetch_add(1, Ordering::Relaxed);
        event_activity.touch();
    });
    let packet_activity = activity.clone();
    let packet_sink: Arc<dyn PacketSink> = Arc::new(move |packet: &[u8]| {
        packet_activity.packets.fetch_add(1, Ordering::Relaxed);
        packet_activity
            .bytes
            .fetch_add(packet.len(), Ordering::Relaxed);
        packet_activity.touch();
    });

    let session = StreamSession::new(
        event_sink,
        packet_sink,
        config.inferencer(),
        config.synthesizer(),
        encoder,
    )
    .with_config(config.session_config())
    .with_fault_reporter(activity.clone());

    session.start()?;
    let capacity = session.config().queue_capacity;
    let frames_pushed = frames.len();
    for frame in frames {
        while session.is_running() && session.queued_frames() >= capacity {
            thread::sleep(Duration::from_millis(1));
        }
        session.push_audio(frame);
    }

    while session.is_running() && (session.queued_frames() > 0 || activity.idle_for() < SETTLE) {
        thread::sleep(Duration::from_millis(10));
    }
    session.stop();

    if let Some(fault) = activity
        .fault
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        return Err(VoxnexusError::Other(fault));
    }

    let report = SimulationReport {
        frames_pushed,
        events: activity.events.load(Ordering::Relaxed),
        packets: activity.packets.load(Ordering::Relaxed),
        packet_bytes: activity.bytes.load(Ordering::Relaxed),
        dropped_frames: session.dropped_frames(),
    };
    debug!(?report, "simulation finished");
    Ok(report)
}

/// Result of encoding a clip and decoding it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundtripReport {
    pub codec: &'static str,
    pub sample_rate: u32,
    pub samples: usize,
    pub packets: usize,
    pub packet_bytes: usize,
}

/// Encodes `input` with the configured codec, decodes every packet and writes
/// the result to `output` at the codec sample rate.
pub fn run_roundtrip(
    config: &Config,
    input: &Path,
    output: &Path,
    codec: CodecChoice,
) -> Result<RoundtripReport> {
    let encoder_config = config.encoder_config();
    encoder_config.validate()?;
    let rate = encoder_config.sample_rate;
    let clip = WavClip::open(input, rate)?;

    let mut encoder = build_encoder(codec, encoder_config)?;
    let mut decoder = build_decoder(codec, encoder_config)?;
    let codec_name = encoder.name();

    let mut decoded: Vec<f32> = Vec::with_capacity(clip.samples().len());
    let mut packets = 0usize;
    let mut packet_bytes = 0usize;
    for packet in encoder.encode(clip.samples()) {
        let packet = packet?;
        packets += 1;
        packet_bytes += packet.len();
        let frame = decoder.decode_packet(&packet)?;
        decoded.extend_from_slice(frame.samples());
    }
    // Drop the zero padding of the final packet.
    decoded.truncate(clip.samples().len());

    write_wav(output, &decoded, rate)?;
    info!(
        codec = codec_name,
        packets,
        packet_bytes,
        output = %output.display(),
        "roundtrip written"
    );

    Ok(RoundtripReport {
        codec: codec_name,
        sample_rate: rate,
        samples: decoded.len(),
        packets,
        packet_bytes,
    })
}
