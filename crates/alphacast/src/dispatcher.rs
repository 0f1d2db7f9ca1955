//! Broadcast dispatcher
//!
//! Encodes each frame once and writes the shared payload to every registered
//! channel. Sends run concurrently, so a pass takes as long as the slowest
//! channel rather than the sum of all of them. Channels whose send fails or
//! times out are removed after the pass; the others are unaffected.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use alphacast_core::{Frame, Payload, PayloadEncoder, RateMonitor, RateReport};

use crate::registry::{ChannelId, Registry};
use crate::sink::SendError;

/// Result of one broadcast call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// No channels registered; the frame was not encoded
    Skipped,
    /// Encoding failed; nothing was sent
    EncodeFailed,
    /// Payload sent; `dropped` channels failed and were removed
    Delivered {
        bytes: usize,
        delivered: usize,
        dropped: Vec<ChannelId>,
    },
}

/// Fans encoded frames out to the registry
pub struct Dispatcher {
    registry: Registry,
    encoder: Arc<dyn PayloadEncoder>,
    monitor: RateMonitor,
    send_timeout: Option<Duration>,
    report_tx: watch::Sender<Option<RateReport>>,
}

impl Dispatcher {
    pub fn new(encoder: Arc<dyn PayloadEncoder>, send_timeout: Option<Duration>) -> Self {
        let (report_tx, _) = watch::channel(None);
        Self {
            registry: Registry::new(),
            encoder,
            monitor: RateMonitor::new(),
            send_timeout,
            report_tx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Receiver for the most recent throughput report
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<RateReport>> {
        self.report_tx.subscribe()
    }

    /// Encode `frame` once and send it to every registered channel
    pub async fn broadcast(&mut self, frame: Frame) -> BroadcastOutcome {
        if self.registry.is_empty() {
            return BroadcastOutcome::Skipped;
        }

        let payload = match Self::encode(Arc::clone(&self.encoder), frame).await {
            Some(payload) => payload,
            None => return BroadcastOutcome::EncodeFailed,
        };
        let bytes = payload.len();

        let send_timeout = self.send_timeout;
        let sends = self.registry.channels_mut().map(|(id, sink)| {
            let payload = payload.clone();
            async move {
                let result = match send_timeout {
                    Some(limit) => tokio::time::timeout(limit, sink.send(payload))
                        .await
                        .unwrap_or(Err(SendError::TimedOut)),
                    None => sink.send(payload).await,
                };
                (id, result)
            }
        });
        let results = join_all(sends).await;

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(channel = %id, error = %e, "Failed to send frame");
                    dropped.push(id);
                }
            }
        }

        for id in &dropped {
            self.registry.unregister(*id);
        }
        if !dropped.is_empty() {
            info!(
                dropped = dropped.len(),
                total = self.registry.len(),
                "Removed dead viewer channels"
            );
        }

        if let Some(report) = self.monitor.record(bytes, self.registry.len()) {
            info!(
                "Transparent stream: {:.1} FPS, {:.1}KB/frame, {} clients",
                report.fps,
                report.avg_bytes_per_frame / 1024.0,
                report.channels
            );
            self.report_tx.send_replace(Some(report));
        }

        BroadcastOutcome::Delivered {
            bytes,
            delivered,
            dropped,
        }
    }

    /// Run the encoder on the blocking pool
    ///
    /// Must not borrow `self` across the await: sinks are not `Sync`.
    async fn encode(encoder: Arc<dyn PayloadEncoder>, frame: Frame) -> Option<Payload> {
        match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
            Ok(Ok(payload)) => Some(payload),
            Ok(Err(e)) => {
                debug!(error = %e, "Skipping frame that failed to encode");
                None
            }
            Err(e) => {
                warn!(error = ?e, "Encoder task panicked");
                None
            }
        }
    }
}
