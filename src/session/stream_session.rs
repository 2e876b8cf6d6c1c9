//! Streaming voice session: bounded ingestion, one worker, start/stop lifecycle.
//!
//! ```text
//! push_audio ──try_send──▶ [bounded queue] ──recv──▶ worker
//!                                                      │
//!        SpeechInferencer ◀── frames ──────────────────┘
//!              │ transcript
//!              ▼
//!   stt ▶ tts start ▶ SpeechSynthesizer ▶ PacketEncoder ▶ packets ▶ tts stop ▶ llm?
//! ```
//!
//! `push_audio` never blocks: a full queue drops the newest frame. `stop()`
//! is cooperative. It clears the running flag, forces a stop sentinel into the
//! queue (discarding buffered frames if needed), then waits a bounded time for
//! the worker. A worker that is still busy after the timeout is detached, not
//! killed; it exits once its current step returns.

use crate::audio::AudioFrame;
use crate::audio::encoder::PacketEncoder;
use crate::defaults;
use crate::error::Result;
use crate::session::events::SessionEvent;
use crate::session::fault::{FaultReporter, LogReporter, PipelineFault, Stage};
use crate::session::sink::{EventSink, PacketSink};
use crate::stt::inferencer::{FrameStream, SpeechInferencer};
use crate::tts::synthesizer::SpeechSynthesizer;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Ingestion queue capacity in frames. Fixed for the session's lifetime.
    pub queue_capacity: usize,
    /// Upper bound on how long `stop()` waits for the worker.
    pub stop_timeout: Duration,
    /// Per-attempt wait when delivering the stop sentinel into a full queue.
    pub sentinel_retry_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            stop_timeout: defaults::STOP_TIMEOUT,
            sentinel_retry_interval: defaults::SENTINEL_RETRY_INTERVAL,
        }
    }
}

enum Ingest {
    Frame(AudioFrame),
    Stop,
}

/// The collaborators driven by the worker, used by one worker at a time.
struct Stages {
    inferencer: Box<dyn SpeechInferencer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    encoder: Box<dyn PacketEncoder>,
}

/// State of one `start()`..`stop()` cycle.
struct Run {
    running: Arc<AtomicBool>,
    tx: Sender<Ingest>,
    rx: Receiver<Ingest>,
    handle: JoinHandle<()>,
}

/// A live voice session.
///
/// All methods take `&self`; share the session through an `Arc` to push audio
/// from several producers while another thread controls the lifecycle.
pub struct StreamSession {
    config: SessionConfig,
    event_sink: Arc<dyn EventSink>,
    packet_sink: Arc<dyn PacketSink>,
    stages: Arc<Mutex<Stages>>,
    fault_reporter: Arc<dyn FaultReporter>,
    run: Mutex<Option<Run>>,
    dropped_frames: AtomicU64,
}

impl StreamSession {
    /// Creates a stopped session with default configuration.
    pub fn new(
        event_sink: Arc<dyn EventSink>,
        packet_sink: Arc<dyn PacketSink>,
        inferencer: impl SpeechInferencer + 'static,
        synthesizer: impl SpeechSynthesizer + 'static,
        encoder: impl PacketEncoder + 'static,
    ) -> Self {
        Self {
            config: SessionConfig::default(),
            event_sink,
            packet_sink,
            stages: Arc::new(Mutex::new(Stages {
                inferencer: Box::new(inferencer),
                synthesizer: Box::new(synthesizer),
                encoder: Box::new(encoder),
            })),
            fault_reporter: Arc::new(LogReporter),
            run: Mutex::new(None),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Replaces the configuration. A zero capacity is raised to one.
    pub fn with_config(mut self, mut config: SessionConfig) -> Self {
        config.queue_capacity = config.queue_capacity.max(1);
        self.config = config;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Sets a custom fault reporter.
    pub fn with_fault_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.fault_reporter = reporter;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the worker. Does nothing if a worker is already alive.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.lock_run();
        if let Some(run) = slot.as_ref()
            && run.running.load(Ordering::SeqCst)
            && !run.handle.is_finished()
        {
            debug!("session already running");
            return Ok(());
        }
        // A worker that faulted has already left its loop.
        if let Some(ended) = slot.take() {
            join_with_timeout(ended.handle, self.config.stop_timeout);
        }

        let (tx, rx) = bounded(self.config.queue_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            rx: rx.clone(),
            running: running.clone(),
            stages: self.stages.clone(),
            event_sink: self.event_sink.clone(),
            packet_sink: self.packet_sink.clone(),
            fault_reporter: self.fault_reporter.clone(),
        };

        let handle = thread::Builder::new()
            .name("voxnexus-session".to_string())
            .spawn(move || worker.run())
            .inspect_err(|_| running.store(false, Ordering::SeqCst))?;

        info!(capacity = self.config.queue_capacity, "session started");
        *slot = Some(Run {
            running,
            tx,
            rx,
            handle,
        });
        Ok(())
    }

    /// Stops the worker, waiting at most `stop_timeout` for it to exit.
    ///
    /// Frames still queued are discarded. If the worker is busy past the
    /// timeout it is detached and keeps its stages until its current step
    /// completes; a following `start()` waits for it before processing.
    pub fn stop(&self) {
        let Some(run) = self.lock_run().take() else {
            return;
        };
        run.running.store(false, Ordering::SeqCst);

        deliver_stop(
            &run.tx,
            &run.rx,
            self.config.sentinel_retry_interval,
            self.config.queue_capacity + 2,
        );
        if join_with_timeout(run.handle, self.config.stop_timeout) {
            info!("session stopped");
        }
    }

    /// Queues a frame for the worker. Never blocks.
    ///
    /// The frame is dropped silently when the session is not running or the
    /// queue is full.
    pub fn push_audio(&self, frame: AudioFrame) {
        let slot = self.lock_run();
        let Some(run) = slot.as_ref() else {
            return;
        };
        if !run.running.load(Ordering::SeqCst) {
            return;
        }
        if run.tx.try_send(Ingest::Frame(frame)).is_err() {
            self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// True while the current worker has neither been stopped nor faulted.
    pub fn is_running(&self) -> bool {
        self.lock_run()
            .as_ref()
            .is_some_and(|run| run.running.load(Ordering::SeqCst))
    }

    /// Frames waiting in the queue of the current run.
    pub fn queued_frames(&self) -> usize {
        self.lock_run().as_ref().map_or(0, |run| run.tx.len())
    }

    /// Frames dropped so far because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

/// Puts the stop sentinel into the queue, making room if it is full.
fn deliver_stop(tx: &Sender<Ingest>, rx: &Receiver<Ingest>, interval: Duration, attempts: usize) {
    let mut sentinel = Ingest::Stop;
    for _ in 0..attempts {
        match tx.send_timeout(sentinel, interval) {
            Ok(()) => return,
            Err(SendTimeoutError::Timeout(returned)) => {
                sentinel = returned;
                if rx.try_recv().is_ok() {
                    debug!("discarded a queued frame to deliver stop");
                }
            }
            Err(SendTimeoutError::Disconnected(_)) => return,
        }
    }
    warn!("could not deliver stop sentinel; relying on running flag");
}

/// Joins the worker within `timeout`. Returns false if it was detached.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "session worker still busy after stop timeout, detaching"
            );
            // Dropping the JoinHandle detaches the thread.
            return false;
        }
        thread::sleep(defaults::JOIN_POLL_INTERVAL);
    }
    reap(handle);
    true
}

/// Joins a finished worker, logging a panic if there was one.
fn reap(handle: JoinHandle<()>) {
    if let Err(panic_info) = handle.join() {
        let msg = panic_info
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        error!("session worker panicked: {msg}");
    }
}

/// Last whitespace-delimited word, or `""`.
pub fn last_token(transcript: &str) -> &str {
    transcript.split_whitespace().next_back().unwrap_or("")
}

/// Clears the running flag however the worker exits, panics included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Blocking view of the queue handed to the inferencer.
struct FrameFeed<'a> {
    rx: &'a Receiver<Ingest>,
    running: &'a AtomicBool,
}

impl Iterator for FrameFeed<'_> {
    type Item = AudioFrame;

    fn next(&mut self) -> Option<AudioFrame> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        match self.rx.recv() {
            Ok(Ingest::Frame(frame)) => Some(frame),
            Ok(Ingest::Stop) | Err(_) => None,
        }
    }
}

struct Worker {
    rx: Receiver<Ingest>,
    running: Arc<AtomicBool>,
    stages: Arc<Mutex<Stages>>,
    event_sink: Arc<dyn EventSink>,
    packet_sink: Arc<dyn PacketSink>,
    fault_reporter: Arc<dyn FaultReporter>,
}

impl Worker {
    fn run(self) {
        let _guard = RunningGuard(&self.running);
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(
            inferencer = stages.inferencer.name(),
            synthesizer = stages.synthesizer.name(),
            encoder = stages.encoder.name(),
            "session worker running"
        );

        match self.drive(&mut stages) {
            Ok(cycles) => debug!(cycles, "session worker finished"),
            Err(fault) => {
                self.fault_reporter.report(&fault);
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn drive(&self, stages: &mut Stages) -> std::result::Result<u64, PipelineFault> {
        let Stages {
            inferencer,
            synthesizer,
            encoder,
        } = stages;

        let feed: FrameStream<'_> = Box::new(FrameFeed {
            rx: &self.rx,
            running: &self.running,
        });

        let mut last_transcript: Option<String> = None;
        let mut cycles = 0u64;
        for transcript in inferencer.transcripts(feed) {
            // Anything the inferencer yields after stop, including an error, is dropped.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let transcript = transcript.map_err(|e| PipelineFault::new(Stage::Inference, e))?;

            self.speak(&transcript, &mut **synthesizer, &mut **encoder)?;
            cycles += 1;

            if last_transcript.as_deref() != Some(transcript.as_str()) {
                self.event_sink
                    .publish_event(&SessionEvent::neutral_annotation());
                last_transcript = Some(transcript);
            }
        }
        Ok(cycles)
    }

    /// Publishes stt, then the synthesized packets of the last token bracketed
    /// by tts start/stop.
    fn speak(
        &self,
        transcript: &str,
        synthesizer: &mut dyn SpeechSynthesizer,
        encoder: &mut dyn PacketEncoder,
    ) -> std::result::Result<(), PipelineFault> {
        self.event_sink.publish_event(&SessionEvent::stt(transcript));

        let token = last_token(transcript);
        self.event_sink
            .publish_event(&SessionEvent::tts_start(token));

        let mut packets = 0usize;
        for chunk in synthesizer.synthesize(token) {
            let chunk = chunk.map_err(|e| PipelineFault::new(Stage::Synthesis, e))?;
            for packet in encoder.encode(chunk.samples()) {
                let packet = packet.map_err(|e| PipelineFault::new(Stage::Encoding, e))?;
                self.packet_sink.publish_packet(&packet);
                packets += 1;
            }
        }

        self.event_sink.publish_event(&SessionEvent::tts_stop());
        debug!(token, packets, "spoke token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::{EncoderConfig, PacketStream, Pcm16Encoder};
    use crate::error::VoxnexusError;
    use crate::session::sink::{CollectorSink, Published};
    use crate::stt::inferencer::{DigitCounterInferencer, ScriptedInferencer, TranscriptStream};
    use crate::tts::synthesizer::{AudioStream, SineWaveSynthesizer};

    const WAIT: Duration = Duration::from_secs(5);

    fn collector_session(
        sink: &Arc<CollectorSink>,
        inferencer: impl SpeechInferencer + 'static,
    ) -> StreamSession {
        StreamSession::new(
            sink.clone(),
            sink.clone(),
            inferencer,
            SineWaveSynthesizer::new(16000),
            Pcm16Encoder::new(EncoderConfig::new(16000)).unwrap(),
        )
    }

    fn stops(records: &[Published]) -> usize {
        records
            .iter()
            .filter(|r| matches!(r, Published::Event(SessionEvent::Tts { text: None, .. })))
            .count()
    }

    /// Waits on `gate` before pulling any frame, so the queue backs up.
    struct GatedInferencer {
        gate: crossbeam_channel::Receiver<()>,
        hold: Duration,
    }

    impl SpeechInferencer for GatedInferencer {
        fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a> {
            self.gate.recv_timeout(self.hold).ok();
            Box::new(frames.map(|_| Ok("x".to_string())))
        }
    }

    /// Sleeps inside every synthesis call.
    struct SlowSynthesizer(Duration);

    impl SpeechSynthesizer for SlowSynthesizer {
        fn synthesize<'a>(&'a mut self, _text: &'a str) -> AudioStream<'a> {
            thread::sleep(self.0);
            Box::new(std::iter::empty())
        }
    }

    /// Takes `delay` over every frame, then fails it.
    struct LateFailingInferencer(Duration);

    impl SpeechInferencer for LateFailingInferencer {
        fn transcripts<'a>(&'a mut self, frames: FrameStream<'a>) -> TranscriptStream<'a> {
            let delay = self.0;
            Box::new(frames.map(move |_| {
                thread::sleep(delay);
                Err(VoxnexusError::Inference {
                    message: "model went away".to_string(),
                })
            }))
        }
    }

    struct FailingSynthesizer;

    impl SpeechSynthesizer for FailingSynthesizer {
        fn synthesize<'a>(&'a mut self, _text: &'a str) -> AudioStream<'a> {
            Box::new(std::iter::once(Err(VoxnexusError::Synthesis {
                message: "no voice".to_string(),
            })))
        }
    }

    struct FailingEncoder;

    impl PacketEncoder for FailingEncoder {
        fn frame_size(&self) -> usize {
            320
        }

        fn encode<'a>(&'a mut self, _samples: &'a [f32]) -> PacketStream<'a> {
            Box::new(std::iter::once(Err(VoxnexusError::Encode {
                message: "encoder exploded".to_string(),
            })))
        }
    }

    #[derive(Default)]
    struct RecordingReporter(Mutex<Vec<Stage>>);

    impl FaultReporter for RecordingReporter {
        fn report(&self, fault: &PipelineFault) {
            self.0.lock().unwrap().push(fault.stage);
        }
    }

    #[test]
    fn test_last_token() {
        assert_eq!(last_token("1 2 3"), "3");
        assert_eq!(last_token("hello"), "hello");
        assert_eq!(last_token("  trailing  "), "trailing");
        assert_eq!(last_token(""), "");
        assert_eq!(last_token("   "), "");
    }

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.queue_capacity, 200);
        assert_eq!(config.stop_timeout, Duration::from_secs(2));
        assert_eq!(config.sentinel_retry_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, DigitCounterInferencer::default())
            .with_queue_capacity(0);
        assert_eq!(session.config().queue_capacity, 1);
    }

    #[test]
    fn test_push_before_start_is_ignored() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, DigitCounterInferencer::default());

        session.push_audio(AudioFrame::silence(1600, 16000));

        assert!(!session.is_running());
        assert_eq!(session.queued_frames(), 0);
        assert_eq!(session.dropped_frames(), 0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, DigitCounterInferencer::default());

        session.start().unwrap();
        let first = session.lock_run().as_ref().map(|r| r.handle.thread().id());
        session.start().unwrap();
        let second = session.lock_run().as_ref().map(|r| r.handle.thread().id());

        assert_eq!(first, second);
        assert!(session.is_running());
        session.stop();
        assert!(!session.is_running());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, DigitCounterInferencer::default());
        session.stop();
        session.stop();
        assert!(!session.is_running());
    }

    #[test]
    fn test_cycle_order() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, ScriptedInferencer::new(["hello world"]));
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(10, 16000));

        assert!(sink.wait_until(WAIT, |r| stops(r) == 1 && r.len() >= 14));
        session.stop();

        // 0.2s tone at 16kHz = 3200 samples = 10 packets of 320
        let records = sink.records();
        assert_eq!(records.len(), 1 + 1 + 10 + 1 + 1);
        assert_eq!(records[0], Published::Event(SessionEvent::stt("hello world")));
        assert_eq!(records[1], Published::Event(SessionEvent::tts_start("world")));
        assert!(records[2..12].iter().all(|r| matches!(r, Published::Packet(p) if p.len() == 640)));
        assert_eq!(records[12], Published::Event(SessionEvent::tts_stop()));
        assert_eq!(records[13], Published::Event(SessionEvent::neutral_annotation()));
    }

    #[test]
    fn test_annotation_only_on_change() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, ScriptedInferencer::new(["1", "1 2", "1 2"]));
        session.start().unwrap();
        for _ in 0..3 {
            session.push_audio(AudioFrame::silence(10, 16000));
        }

        assert!(sink.wait_until(WAIT, |r| stops(r) == 3));
        session.stop();

        assert_eq!(sink.count_kind("stt"), 3);
        assert_eq!(sink.count_kind("llm"), 2);
        // The repeated transcript's cycle ends with tts stop, not an annotation.
        let last = sink.records().pop().unwrap();
        assert_eq!(last, Published::Event(SessionEvent::tts_stop()));
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let sink = Arc::new(CollectorSink::new());
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
        let session = collector_session(
            &sink,
            GatedInferencer {
                gate: gate_rx,
                hold: WAIT,
            },
        )
        .with_queue_capacity(4);
        session.start().unwrap();

        let started = Instant::now();
        for i in 0..10 {
            session.push_audio(AudioFrame::new(vec![i as f32; 1], 16000));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(session.queued_frames(), 4);
        assert_eq!(session.dropped_frames(), 6);

        gate_tx.send(()).unwrap();
        assert!(sink.wait_until(WAIT, |r| stops(r) == 4));
        session.stop();
    }

    #[test]
    fn test_stop_with_full_queue_terminates_worker() {
        let sink = Arc::new(CollectorSink::new());
        let (_gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
        let session = collector_session(
            &sink,
            GatedInferencer {
                gate: gate_rx,
                hold: Duration::from_millis(300),
            },
        )
        .with_queue_capacity(3);
        session.start().unwrap();
        for _ in 0..5 {
            session.push_audio(AudioFrame::silence(1, 16000));
        }
        assert_eq!(session.queued_frames(), 3);

        let started = Instant::now();
        session.stop();
        let elapsed = started.elapsed();

        assert!(elapsed < session.config().stop_timeout + Duration::from_millis(500));
        assert!(!session.is_running());
        // Worker observed the stop before publishing anything.
        assert_eq!(sink.count_kind("stt"), 0);
    }

    #[test]
    fn test_stop_timeout_detaches_busy_worker() {
        let sink = Arc::new(CollectorSink::new());
        let session = StreamSession::new(
            sink.clone(),
            sink.clone(),
            ScriptedInferencer::new(["a", "b"]),
            SlowSynthesizer(Duration::from_millis(600)),
            Pcm16Encoder::new(EncoderConfig::new(16000)).unwrap(),
        )
        .with_config(SessionConfig {
            stop_timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        });
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1, 16000));
        assert!(sink.wait_until(WAIT, |r| !r.is_empty()));

        let started = Instant::now();
        session.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!session.is_running());

        // The detached worker finishes its step, then exits without publishing more.
        assert!(sink.wait_until(WAIT, |r| stops(r) == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sink.count_kind("stt"), 1);
    }

    #[test]
    fn test_restart_after_detached_stop_waits_for_old_worker() {
        let sink = Arc::new(CollectorSink::new());
        let session = StreamSession::new(
            sink.clone(),
            sink.clone(),
            ScriptedInferencer::new(["a", "b"]),
            SlowSynthesizer(Duration::from_millis(400)),
            Pcm16Encoder::new(EncoderConfig::new(16000)).unwrap(),
        )
        .with_config(SessionConfig {
            stop_timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        });
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1, 16000));
        assert!(sink.wait_until(WAIT, |r| !r.is_empty()));
        session.stop();
        assert!(!session.is_running());

        // The old worker is still inside synthesis when the new run begins.
        session.start().unwrap();
        assert!(session.is_running());
        session.push_audio(AudioFrame::silence(1, 16000));
        assert!(sink.wait_until(WAIT, |r| {
            r.iter()
                .filter(|r| matches!(r, Published::Event(SessionEvent::Stt { .. })))
                .count()
                == 2
        }));
        session.stop();

        // The new run starts only after the old worker's cycle is complete.
        let events = sink.events();
        assert_eq!(
            &events[..5],
            &[
                SessionEvent::stt("a"),
                SessionEvent::tts_start("a"),
                SessionEvent::tts_stop(),
                SessionEvent::neutral_annotation(),
                SessionEvent::stt("a"),
            ]
        );
    }

    #[test]
    fn test_inference_error_after_stop_is_not_a_fault() {
        let sink = Arc::new(CollectorSink::new());
        let reporter = Arc::new(RecordingReporter::default());
        let session = collector_session(&sink, LateFailingInferencer(Duration::from_millis(150)))
            .with_fault_reporter(reporter.clone());
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1, 16000));
        thread::sleep(Duration::from_millis(30));

        // The worker is mid-inference; its error lands after running is cleared.
        session.stop();
        assert!(!session.is_running());
        assert!(reporter.0.lock().unwrap().is_empty());
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_restart_resumes_processing() {
        let sink = Arc::new(CollectorSink::new());
        let session = collector_session(&sink, DigitCounterInferencer::new(16000, 0.1));

        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1600, 16000));
        assert!(sink.wait_until(WAIT, |r| stops(r) == 1));
        session.stop();

        session.push_audio(AudioFrame::silence(1600, 16000));
        assert_eq!(session.queued_frames(), 0);

        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1600, 16000));
        assert!(sink.wait_until(WAIT, |r| stops(r) == 2));
        session.stop();

        let stt: Vec<SessionEvent> = sink
            .events()
            .into_iter()
            .filter(|e| e.kind() == "stt")
            .collect();
        assert_eq!(stt, vec![SessionEvent::stt("1"), SessionEvent::stt("1 2")]);
    }

    #[test]
    fn test_inference_fault_stops_worker() {
        let sink = Arc::new(CollectorSink::new());
        let reporter = Arc::new(RecordingReporter::default());
        let session = collector_session(
            &sink,
            ScriptedInferencer::new(["a", "b", "c"]).with_failure_after(1),
        )
        .with_fault_reporter(reporter.clone());
        session.start().unwrap();
        for _ in 0..3 {
            session.push_audio(AudioFrame::silence(1, 16000));
        }

        let deadline = Instant::now() + WAIT;
        while session.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!session.is_running());
        assert_eq!(*reporter.0.lock().unwrap(), vec![Stage::Inference]);
        assert_eq!(sink.count_kind("stt"), 1);

        // Pushes after a fault are ignored, and a new start() runs again.
        let queued = session.queued_frames();
        session.push_audio(AudioFrame::silence(1, 16000));
        assert_eq!(session.queued_frames(), queued);
        assert_eq!(session.dropped_frames(), 0);
        session.start().unwrap();
        assert!(session.is_running());
        session.stop();
    }

    #[test]
    fn test_synthesis_fault_publishes_nothing_after() {
        let sink = Arc::new(CollectorSink::new());
        let reporter = Arc::new(RecordingReporter::default());
        let session = StreamSession::new(
            sink.clone(),
            sink.clone(),
            ScriptedInferencer::new(["a", "b"]),
            FailingSynthesizer,
            Pcm16Encoder::new(EncoderConfig::new(16000)).unwrap(),
        )
        .with_fault_reporter(reporter.clone());
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1, 16000));
        session.push_audio(AudioFrame::silence(1, 16000));

        let deadline = Instant::now() + WAIT;
        while session.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*reporter.0.lock().unwrap(), vec![Stage::Synthesis]);
        assert_eq!(
            sink.events(),
            vec![SessionEvent::stt("a"), SessionEvent::tts_start("a")]
        );
        session.stop();
    }

    #[test]
    fn test_encoding_fault_reported() {
        let sink = Arc::new(CollectorSink::new());
        let reporter = Arc::new(RecordingReporter::default());
        let session = StreamSession::new(
            sink.clone(),
            sink.clone(),
            ScriptedInferencer::new(["a"]),
            SineWaveSynthesizer::new(16000),
            FailingEncoder,
        )
        .with_fault_reporter(reporter.clone());
        session.start().unwrap();
        session.push_audio(AudioFrame::silence(1, 16000));

        let deadline = Instant::now() + WAIT;
        while session.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*reporter.0.lock().unwrap(), vec![Stage::Encoding]);
        assert!(sink.packets().is_empty());
        session.stop();
    }

    #[test]
    fn test_concurrent_producers() {
        let sink = Arc::new(CollectorSink::new());
        let session = Arc::new(collector_session(
            &sink,
            DigitCounterInferencer::new(16000, 0.1),
        ));
        session.start().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        session.push_audio(AudioFrame::silence(400, 16000));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        // 40 frames of 400 samples = 16000 samples = 10 digits
        assert!(sink.wait_until(WAIT, |r| stops(r) == 10));
        session.stop();
        assert_eq!(session.dropped_frames(), 0);
        assert_eq!(sink.count_kind("llm"), 10);
    }
}
