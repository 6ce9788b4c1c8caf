//! Emission sink.
//!
//! Readings leave the emitter through a single registered [`ReadingSink`].
//! The [`SinkAdapter`] holds it behind a mutex so periodic tasks and
//! notification broadcasts never call it concurrently.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, trace};

/// A reading handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    /// The datapoint label of the point.
    pub asset_name: String,
    /// The rendered pivot payload.
    pub payload: Value,
}

impl Reading {
    /// Creates a reading.
    #[must_use]
    pub fn new(asset_name: impl Into<String>, payload: Value) -> Self {
        Self {
            asset_name: asset_name.into(),
            payload,
        }
    }
}

/// Receiver of emitted readings.
pub trait ReadingSink: Send + Sync {
    /// Takes ownership of one reading.
    fn ingest(&self, reading: Reading);
}

impl<F> ReadingSink for F
where
    F: Fn(Reading) + Send + Sync,
{
    fn ingest(&self, reading: Reading) {
        self(reading);
    }
}

/// Guarded handle on the registered sink.
#[derive(Default)]
pub struct SinkAdapter {
    sink: Mutex<Option<Arc<dyn ReadingSink>>>,
}

impl std::fmt::Debug for SinkAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkAdapter")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl SinkAdapter {
    /// Creates an adapter without a sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the sink, replacing any previous one.
    pub fn register(&self, sink: Arc<dyn ReadingSink>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// Removes the sink; later readings are dropped.
    pub fn clear(&self) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// True when a sink is installed.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Hands a reading to the sink.
    ///
    /// The sink runs on the caller's thread with the lock held. Returns
    /// false when no sink is registered and the reading was dropped.
    pub fn emit(&self, asset_name: &str, payload: Value) -> bool {
        let guard = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sink) => {
                trace!(asset = asset_name, "Reading emitted");
                sink.ingest(Reading::new(asset_name, payload));
                true
            }
            None => {
                error!(asset = asset_name, "No ingest callback registered, reading dropped");
                false
            }
        }
    }
}

/// A sink forwarding every reading into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Reading>,
}

impl ChannelSink {
    /// Creates the sink and the stream its readings arrive on.
    #[must_use]
    pub fn new() -> (Self, ReadingStream) {
        let (tx, rx) = unbounded();
        (Self { tx }, ReadingStream { rx })
    }
}

impl ReadingSink for ChannelSink {
    fn ingest(&self, reading: Reading) {
        if self.tx.send(reading).is_err() {
            trace!("Reading stream closed, reading dropped");
        }
    }
}

/// Receiving end of a [`ChannelSink`].
#[derive(Debug)]
pub struct ReadingStream {
    rx: Receiver<Reading>,
}

impl ReadingStream {
    /// Receives the next reading, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout or once every sender is gone.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Reading> {
        match self.rx.recv_timeout(timeout) {
            Ok(reading) => Some(reading),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receives a reading if one is queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<Reading> {
        match self.rx.try_recv() {
            Ok(reading) => Some(reading),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Takes every queued reading.
    #[must_use]
    pub fn drain(&self) -> Vec<Reading> {
        self.rx.try_iter().collect()
    }

    /// Number of queued readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when no reading is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
