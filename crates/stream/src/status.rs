//! Observable connection state
//!
//! Shared between the connection task and readers. Holds the `connected`
//! flag, the last transport error and the bounded trail of raw frames
//! (newest first).

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokenfeed_core::RawFrame;

#[derive(Debug)]
pub struct FeedStatus {
    connected: AtomicBool,
    socket_open: AtomicBool,
    last_error: RwLock<Option<String>>,
    trail: RwLock<VecDeque<RawFrame>>,
    trail_capacity: usize,

    frames_received: AtomicU64,
    reconnects: AtomicU64,
}

impl FeedStatus {
    pub fn new(trail_capacity: usize) -> Self {
        Self {
            connected: AtomicBool::new(false),
            socket_open: AtomicBool::new(false),
            last_error: RwLock::new(None),
            trail: RwLock::new(VecDeque::with_capacity(trail_capacity)),
            trail_capacity,
            frames_received: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Most recent raw frames, newest first
    pub fn raw_trail(&self) -> Vec<RawFrame> {
        self.trail.read().iter().cloned().collect()
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
        *self.last_error.write() = None;
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub(crate) fn record_error(&self, error: impl ToString) {
        self.connected.store(false, Ordering::Release);
        *self.last_error.write() = Some(error.to_string());
    }

    pub(crate) fn push_frame(&self, frame: RawFrame) {
        let mut trail = self.trail.write();
        trail.push_front(frame);
        trail.truncate(self.trail_capacity);
        drop(trail);

        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Claim the single socket slot. `None` while another socket is open.
    pub(crate) fn claim_socket(self: &Arc<Self>) -> Option<SocketClaim> {
        self.socket_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SocketClaim {
                status: Arc::clone(self),
            })
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            connected: self.is_connected(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            trail_len: self.trail.read().len(),
        }
    }
}

/// Releases the socket slot when the connection session ends
#[derive(Debug)]
pub(crate) struct SocketClaim {
    status: Arc<FeedStatus>,
}

impl Drop for SocketClaim {
    fn drop(&mut self) {
        self.status.connected.store(false, Ordering::Release);
        self.status.socket_open.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    pub connected: bool,
    pub frames_received: u64,
    pub reconnects: u64,
    pub trail_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trail_is_bounded_newest_first() {
        let status = FeedStatus::new(20);
        for i in 0..25 {
            status.push_frame(RawFrame::new(json!({ "seq": i })));
        }

        let trail = status.raw_trail();
        assert_eq!(trail.len(), 20);
        assert_eq!(trail[0].payload["seq"], 24);
        assert_eq!(trail[19].payload["seq"], 5);
        assert_eq!(status.stats().frames_received, 25);
    }

    #[test]
    fn test_connect_clears_error() {
        let status = FeedStatus::new(4);
        status.record_error("WebSocket connection error: reset");
        assert!(!status.is_connected());
        assert_eq!(status.last_error().as_deref(), Some("WebSocket connection error: reset"));

        status.mark_connected();
        assert!(status.is_connected());
        assert_eq!(status.last_error(), None);
    }

    #[test]
    fn test_single_socket_claim() {
        let status = Arc::new(FeedStatus::new(4));

        let claim = status.claim_socket();
        assert!(claim.is_some());
        assert!(status.claim_socket().is_none());

        drop(claim);
        assert!(status.claim_socket().is_some());
    }
}
