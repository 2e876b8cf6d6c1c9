//! Voice session: ingestion queue, worker lifecycle, and what it publishes.

pub mod events;
pub mod fault;
pub mod sink;
pub mod stream_session;

pub use events::{SessionEvent, TtsState};
pub use fault::{FaultReporter, LogReporter, PipelineFault, Stage};
pub use sink::{CollectorSink, EventSink, JsonLinesSink, PacketSink, Published};
pub use stream_session::{SessionConfig, StreamSession, last_token};
