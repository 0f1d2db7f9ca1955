//! Cross-thread frame bridge
//!
//! Producer threads are plain `std::thread`s that must never wait on the
//! network. `submit` only tries to enqueue the frame for the hub task and
//! returns at once; a full queue or a stopped hub drops the frame, since the
//! next one supersedes it anyway.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use alphacast_core::Frame;

/// What happened to a submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Queued for broadcast
    Queued,
    /// Nobody is watching; frame discarded without queueing
    NoViewers,
    /// Queue full; frame discarded
    Dropped,
    /// Hub is not running; frame discarded
    Closed,
}

/// Handle producers use to hand frames to the hub
#[derive(Debug, Clone)]
pub struct FrameBridge {
    tx: mpsc::Sender<Frame>,
    viewers: Arc<AtomicUsize>,
}

impl FrameBridge {
    pub(crate) fn new(tx: mpsc::Sender<Frame>, viewers: Arc<AtomicUsize>) -> Self {
        Self { tx, viewers }
    }

    /// Schedule `frame` for broadcast without blocking
    pub fn submit(&self, frame: Frame) -> SubmitStatus {
        if self.tx.is_closed() {
            return SubmitStatus::Closed;
        }
        if self.viewers.load(Ordering::Acquire) == 0 {
            return SubmitStatus::NoViewers;
        }

        match self.tx.try_send(frame) {
            Ok(()) => SubmitStatus::Queued,
            Err(TrySendError::Full(_)) => {
                trace!("Frame queue full, dropping frame");
                SubmitStatus::Dropped
            }
            Err(TrySendError::Closed(_)) => SubmitStatus::Closed,
        }
    }

    /// Viewer count as last published by the hub
    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::Acquire)
    }
}
