//! Frame producer thread
//!
//! Runs a [`MatteSource`] on a dedicated OS thread at a fixed frame rate and
//! pushes every frame through the bridge. The thread never touches network
//! state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use alphacast_core::MatteSource;

use crate::bridge::{FrameBridge, SubmitStatus};

/// Counters reported when the producer exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    pub produced: u64,
    pub queued: u64,
    pub dropped: u64,
}

/// Start the producer thread
///
/// The thread exits when `stop` is set or the source runs dry.
pub fn spawn_producer<S>(
    mut source: S,
    bridge: FrameBridge,
    fps: u32,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<ProducerStats>>
where
    S: MatteSource + 'static,
{
    let period = Duration::from_secs(1) / fps.max(1);

    thread::Builder::new()
        .name("alphacast-producer".to_string())
        .spawn(move || {
            info!(fps, viewers = bridge.viewer_count(), "Frame producer started");
            source.reset();

            let mut stats = ProducerStats::default();
            let mut next_tick = Instant::now();

            while !stop.load(Ordering::Acquire) {
                let Some(frame) = source.next_frame() else {
                    debug!("Frame source exhausted");
                    break;
                };
                stats.produced += 1;

                match bridge.submit(frame) {
                    SubmitStatus::Queued => stats.queued += 1,
                    SubmitStatus::Dropped => stats.dropped += 1,
                    SubmitStatus::NoViewers | SubmitStatus::Closed => {}
                }

                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else {
                    // Running behind: don't try to catch up with a burst
                    next_tick = now;
                }
            }

            info!(
                produced = stats.produced,
                queued = stats.queued,
                dropped = stats.dropped,
                "Frame producer stopped"
            );
            stats
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use alphacast_core::TestPattern;
    use tokio::sync::mpsc;

    #[test]
    fn test_producer_stops_when_source_exhausted() {
        let (tx, _rx) = mpsc::channel(4);
        let bridge = FrameBridge::new(tx, Arc::new(AtomicUsize::new(0)));
        let stop = Arc::new(AtomicBool::new(false));

        let handle =
            spawn_producer(TestPattern::new(8, 8).with_limit(5), bridge, 240, stop).unwrap();
        let stats = handle.join().unwrap();

        assert_eq!(stats.produced, 5);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_producer_queues_and_drops_with_viewers() {
        let (tx, mut rx) = mpsc::channel(2);
        let bridge = FrameBridge::new(tx, Arc::new(AtomicUsize::new(1)));
        let stop = Arc::new(AtomicBool::new(false));

        let handle =
            spawn_producer(TestPattern::new(8, 8).with_limit(6), bridge, 240, stop).unwrap();
        let stats = handle.join().unwrap();

        // Nobody drains the queue: two fit, the rest are dropped
        assert_eq!(stats.produced, 6);
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.dropped, 4);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_producer_honours_stop_flag() {
        let (tx, _rx) = mpsc::channel(2);
        let bridge = FrameBridge::new(tx, Arc::new(AtomicUsize::new(0)));
        let stop = Arc::new(AtomicBool::new(false));

        let handle =
            spawn_producer(TestPattern::new(8, 8), bridge, 100, Arc::clone(&stop)).unwrap();
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::Release);

        let stats = handle.join().unwrap();
        assert!(stats.produced > 0);
    }
}
