//! Live viewer channels
//!
//! The registry is owned by the hub task and mutated only there, so it needs
//! no locking. Insertion and removal are both idempotent.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sink::FrameSink;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one viewer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Set of connected viewer channels
#[derive(Default)]
pub struct Registry {
    channels: HashMap<ChannelId, Box<dyn FrameSink>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel; returns false if the id was already registered
    ///
    /// A duplicate registration keeps the existing sink.
    pub fn register(&mut self, id: ChannelId, sink: Box<dyn FrameSink>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.channels.insert(id, sink);
        true
    }

    /// Remove a channel; absent ids are ignored
    pub fn unregister(&mut self, id: ChannelId) -> bool {
        self.channels.remove(&id).is_some()
    }

    /// Ids of the current members, in no particular order
    pub fn snapshot(&self) -> Vec<ChannelId> {
        self.channels.keys().copied().collect()
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Mutable access to every sink for one broadcast pass
    pub(crate) fn channels_mut(
        &mut self,
    ) -> impl Iterator<Item = (ChannelId, &mut Box<dyn FrameSink>)> {
        self.channels.iter_mut().map(|(id, sink)| (*id, sink))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use alphacast_core::Payload;

    use crate::sink::SendError;

    /// Sink that records every payload it is given
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub received: Arc<Mutex<Vec<Payload>>>,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&mut self, payload: Payload) -> Result<(), SendError> {
            self.received.lock().unwrap().push(payload);
            Ok(())
        }
    }

    /// Sink whose every send fails like a reset connection
    pub(crate) struct FailingSink;

    #[async_trait]
    impl FrameSink for FailingSink {
        async fn send(&mut self, _payload: Payload) -> Result<(), SendError> {
            Err(SendError::Transport("connection reset by peer".to_string()))
        }
    }

    /// Sink that never completes a send
    pub(crate) struct StallingSink;

    #[async_trait]
    impl FrameSink for StallingSink {
        async fn send(&mut self, _payload: Payload) -> Result<(), SendError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[test]
    fn test_channel_ids_are_unique() {
        let a = ChannelId::next();
        let b = ChannelId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("ch-"));
    }

    #[test]
    fn test_register_adds_channel() {
        let mut registry = Registry::new();
        let id = ChannelId::next();
        assert!(registry.register(id, Box::new(RecordingSink::default())));
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_register_is_idempotent() {
        let mut registry = Registry::new();
        let id = ChannelId::next();
        registry.register(id, Box::new(RecordingSink::default()));
        assert!(!registry.register(id, Box::new(RecordingSink::default())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let mut registry = Registry::new();
        registry.register(ChannelId::next(), Box::new(RecordingSink::default()));
        assert!(!registry.unregister(ChannelId::next()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_unregister() {
        let mut registry = Registry::new();
        let id = ChannelId::next();
        registry.register(id, Box::new(RecordingSink::default()));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_lists_members() {
        let mut registry = Registry::new();
        let ids: Vec<ChannelId> = (0..3).map(|_| ChannelId::next()).collect();
        for id in &ids {
            registry.register(*id, Box::new(RecordingSink::default()));
        }

        let mut snapshot = registry.snapshot();
        snapshot.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(snapshot, expected);
    }
}
