//! Broadcast hub task
//!
//! The hub is the single consumer that owns the registry and performs every
//! send. Connection handlers talk to it through a [`HubHandle`]; producer
//! threads through a [`FrameBridge`]. Server setup constructs it explicitly
//! and runs it as one task.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use alphacast_core::{Frame, PayloadEncoder, RateReport};

use crate::bridge::FrameBridge;
use crate::dispatcher::Dispatcher;
use crate::registry::ChannelId;
use crate::sink::FrameSink;

/// Capacity of the register/unregister queue
const CONTROL_CAPACITY: usize = 256;

/// Default frame queue depth between producers and the hub
pub const DEFAULT_FRAME_QUEUE: usize = 2;

/// Default per-channel send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Hub errors
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("broadcast hub is not running")]
    Stopped,
}

/// Hub tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Frames buffered between producers and the hub before dropping
    pub frame_queue: usize,
    /// Per-channel send limit; `None` waits indefinitely
    pub send_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            frame_queue: DEFAULT_FRAME_QUEUE,
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
        }
    }
}

/// Registry changes requested by connection handlers
enum Control {
    Register {
        id: ChannelId,
        sink: Box<dyn FrameSink>,
    },
    Unregister {
        id: ChannelId,
    },
}

/// Cloneable handle for connection handlers and HTTP routes
#[derive(Clone)]
pub struct HubHandle {
    control_tx: mpsc::Sender<Control>,
    viewers: Arc<AtomicUsize>,
    reports: watch::Receiver<Option<RateReport>>,
}

impl HubHandle {
    /// Add a viewer channel
    pub async fn register(
        &self,
        id: ChannelId,
        sink: Box<dyn FrameSink>,
    ) -> Result<(), HubError> {
        self.control_tx
            .send(Control::Register { id, sink })
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Remove a viewer channel; removing an unknown id is harmless
    pub async fn unregister(&self, id: ChannelId) -> Result<(), HubError> {
        self.control_tx
            .send(Control::Unregister { id })
            .await
            .map_err(|_| HubError::Stopped)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::Acquire)
    }

    /// Most recent throughput report, if one has been produced
    pub fn latest_report(&self) -> Option<RateReport> {
        self.reports.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.control_tx.is_closed()
    }
}

/// The broadcast service
pub struct Hub {
    dispatcher: Dispatcher,
    control_rx: mpsc::Receiver<Control>,
    frame_rx: mpsc::Receiver<Frame>,
    viewers: Arc<AtomicUsize>,
}

impl Hub {
    /// Create the hub along with its handle and producer bridge
    pub fn new(
        config: HubConfig,
        encoder: Arc<dyn PayloadEncoder>,
    ) -> (Hub, HubHandle, FrameBridge) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel(config.frame_queue.max(1));
        let viewers = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(encoder, config.send_timeout);
        let handle = HubHandle {
            control_tx,
            viewers: Arc::clone(&viewers),
            reports: dispatcher.subscribe_reports(),
        };
        let bridge = FrameBridge::new(frame_tx, Arc::clone(&viewers));

        let hub = Hub {
            dispatcher,
            control_rx,
            frame_rx,
            viewers,
        };
        (hub, handle, bridge)
    }

    /// Process registry changes and frames until cancelled
    ///
    /// Also stops once every [`HubHandle`] has been dropped. Control messages
    /// are served before frames so a new viewer gets the next frame.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Broadcast hub started");
        let mut frames_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Broadcast hub cancelled");
                    break;
                }

                control = self.control_rx.recv() => match control {
                    Some(control) => self.apply(control),
                    None => {
                        debug!("All hub handles dropped");
                        break;
                    }
                },

                frame = self.frame_rx.recv(), if frames_open => match frame {
                    Some(frame) => {
                        self.dispatcher.broadcast(frame).await;
                        self.publish_viewers();
                    }
                    None => {
                        debug!("All frame bridges dropped");
                        frames_open = false;
                    }
                },
            }
        }

        let remaining = self.dispatcher.registry().snapshot();
        if !remaining.is_empty() {
            debug!(channels = ?remaining, "Dropping viewers on shutdown");
        }
        self.viewers.store(0, Ordering::Release);
        info!("Broadcast hub stopped");
    }

    fn apply(&mut self, control: Control) {
        let registry = self.dispatcher.registry_mut();
        match control {
            Control::Register { id, sink } => {
                if registry.register(id, sink) {
                    info!(
                        channel = %id,
                        "Transparent video client connected, total: {}",
                        registry.len()
                    );
                }
            }
            Control::Unregister { id } => {
                if registry.unregister(id) {
                    info!(
                        channel = %id,
                        "Transparent video client disconnected, total: {}",
                        registry.len()
                    );
                }
            }
        }
        self.publish_viewers();
    }

    fn publish_viewers(&self) {
        self.viewers
            .store(self.dispatcher.registry().len(), Ordering::Release);
    }
}
