//! Rendering-core endpoint
//!
//! [`RenderPort`] bundles everything the consumer needs: the receiving end of
//! the queue, the consumer-owned fields of the shared block, and read access
//! to committed parameters and wave samples.

use super::message::Message;
use super::queue::MessageReceiver;
use crate::apu::SampleBuffer;
use crate::shared::{SharedSnapshot, SharedState};
use std::sync::Arc;
use std::time::Duration;

/// Consumer handle, moved to the rendering thread
#[derive(Debug)]
pub struct RenderPort {
    shared: Arc<SharedState>,
    receiver: MessageReceiver,
}

impl RenderPort {
    pub(crate) fn new(shared: Arc<SharedState>, receiver: MessageReceiver) -> Self {
        RenderPort { shared, receiver }
    }

    /// Live shared block
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Take the next queued message if one is waiting
    pub fn try_recv(&self) -> Option<Message> {
        self.receiver.try_recv()
    }

    /// Wait up to `timeout` for the next queued message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every queued message
    pub fn drain(&self) -> Vec<Message> {
        self.receiver.drain()
    }

    /// Cycle a waiting producer wants the renderer to reach, if any
    pub fn pending_sync(&self) -> Option<i32> {
        self.shared.sync_target()
    }

    /// Report the renderer position and claim a handshake that is now due
    ///
    /// Returns the handshake message when the producer's target is at or
    /// before `position` and the producer had not withdrawn it.
    pub fn poll_sync(&self, position: i32) -> Option<Message> {
        self.shared.set_renderer_cycles(position);
        let ticket = self.shared.sync_ticket()?;
        if ticket.cycles() > position {
            return None;
        }
        // Read before claiming; the producer rewrites the slot once released.
        // The claim fails if the slot was reposted since, even at the same cycle.
        let raw = self.shared.message();
        if self.shared.claim_sync(ticket) {
            Message::decode(raw)
        } else {
            None
        }
    }

    /// Mark the end of a rendered frame
    pub fn flip_frame(&self) {
        self.shared.flip_renderer_frame();
        self.shared.set_renderer_cycles(0);
    }

    /// Announce (or end) a priority transfer; waiting producers give up
    pub fn set_transfer_in_progress(&self, busy: bool) {
        self.shared.set_transfer_in_progress(busy);
    }

    /// Wave PCM samples, once the producer published them
    pub fn samples(&self) -> Option<Arc<SampleBuffer>> {
        self.shared.samples().cloned()
    }

    /// Copy of every committed parameter
    pub fn snapshot(&self) -> SharedSnapshot {
        self.shared.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::queue;

    fn port() -> (queue::MessageQueue, RenderPort) {
        let shared = Arc::new(SharedState::new());
        let (tx, rx) = queue::channel(Arc::clone(&shared), 8, 8);
        (tx, RenderPort::new(shared, rx))
    }

    #[test]
    fn test_port_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<RenderPort>();
    }

    #[test]
    fn test_poll_sync_waits_for_position() {
        let (_tx, port) = port();
        port.shared().set_message(Message::update_all().encode());
        port.shared().post_sync_target(1000);

        assert_eq!(port.poll_sync(500), None);
        assert_eq!(port.pending_sync(), Some(1000));
        assert_eq!(port.shared().renderer_cycles(), 500);

        assert_eq!(port.poll_sync(1000), Some(Message::update_all()));
        assert_eq!(port.pending_sync(), None);
        assert_eq!(port.poll_sync(2000), None);
    }

    #[test]
    fn test_stale_read_cannot_claim_repost_at_same_cycle() {
        let (_tx, port) = port();
        let shared = port.shared();
        shared.set_message(Message::start(0).encode());
        shared.post_sync_target(800);

        // Renderer reads the first post and its message
        let seen = shared.sync_ticket().unwrap();
        let stale = Message::decode(shared.message());

        // Producer times out, then posts another message at the same cycle
        assert!(shared.claim_sync(seen));
        shared.set_message(Message::start(1).encode());
        shared.post_sync_target(800);

        assert_eq!(stale, Some(Message::start(0)));
        assert!(!shared.claim_sync(seen));
        assert_eq!(port.pending_sync(), Some(800));
        assert_eq!(port.poll_sync(800), Some(Message::start(1)));
        assert_eq!(port.pending_sync(), None);
    }

    #[test]
    fn test_flip_frame_resets_position() {
        let (_tx, port) = port();
        port.poll_sync(4000);
        port.flip_frame();
        assert_eq!(port.shared().renderer_cycles(), 0);
        assert!(!port.shared().in_phase());
    }

    #[test]
    fn test_receive_through_port() {
        let (tx, port) = port();
        tx.send(Message::start(1).encode());
        assert_eq!(port.try_recv(), Some(Message::start(1)));
        assert_eq!(port.try_recv(), None);
        assert!(port.samples().is_none());
    }
}
