//! Outward sinks a session publishes to.
//!
//! Both sinks are called synchronously from the session worker, in publish
//! order. They should return quickly; a slow sink stalls the pipeline.

use crate::session::events::SessionEvent;
use std::io::Write;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Receives structured status events.
pub trait EventSink: Send + Sync {
    fn publish_event(&self, event: &SessionEvent);
}

/// Receives compressed audio packets, one call per packet.
pub trait PacketSink: Send + Sync {
    fn publish_packet(&self, packet: &[u8]);
}

impl<F> EventSink for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn publish_event(&self, event: &SessionEvent) {
        self(event)
    }
}

impl<F> PacketSink for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn publish_packet(&self, packet: &[u8]) {
        self(packet)
    }
}

/// Everything a session published, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Event(SessionEvent),
    Packet(Vec<u8>),
}

/// Sink that records events and packets in one ordered log.
///
/// Implements both sink traits so a single `Arc<CollectorSink>` can be passed
/// for each.
#[derive(Debug, Default)]
pub struct CollectorSink {
    records: Mutex<Vec<Published>>,
    changed: Condvar,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Published>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, record: Published) {
        self.lock().push(record);
        self.changed.notify_all();
    }

    /// Snapshot of the full log.
    pub fn records(&self) -> Vec<Published> {
        self.lock().clone()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                Published::Event(e) => Some(e.clone()),
                Published::Packet(_) => None,
            })
            .collect()
    }

    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                Published::Packet(p) => Some(p.clone()),
                Published::Event(_) => None,
            })
            .collect()
    }

    /// Number of recorded events with the given `type` tag.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| matches!(r, Published::Event(e) if e.kind() == kind))
            .count()
    }

    /// Blocks until `ready` holds for the log or `timeout` elapses.
    pub fn wait_until<F>(&self, timeout: Duration, mut ready: F) -> bool
    where
        F: FnMut(&[Published]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if ready(guard.as_slice()) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.changed.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl EventSink for CollectorSink {
    fn publish_event(&self, event: &SessionEvent) {
        self.push(Published::Event(event.clone()));
    }
}

impl PacketSink for CollectorSink {
    fn publish_packet(&self, packet: &[u8]) {
        self.push(Published::Packet(packet.to_vec()));
    }
}

/// Writes each event as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn publish_event(&self, event: &SessionEvent) {
        let line = match event.to_json() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize session event");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            warn!(error = %e, "failed to write session event");
        }
    }
}
