//! Bounded message queue with admission control
//!
//! The producer never blocks: when too many messages are waiting, or the
//! queue is full, new messages are dropped and counted. A glitch in the audio
//! is preferred over a stalled emulation core.
//!
//! Flow-control counters live in the live [`SharedState`] so they keep
//! counting while the producer is detached onto its scratch block.

use super::message::Message;
use crate::shared::SharedState;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Delivery counters for monitoring queue and handshake health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Messages pushed into the queue
    pub queued: u64,
    /// Dropped because too many messages were unacknowledged
    pub dropped_backpressure: u64,
    /// Dropped because the queue was at capacity
    pub dropped_full: u64,
    /// Dropped because the consumer is gone
    pub dropped_disconnected: u64,
    /// Messages delivered through a completed handshake
    pub handshakes: u64,
    /// Handshakes abandoned because of a priority transfer
    pub handshake_aborts: u64,
    /// Handshakes abandoned after the wait limit
    pub handshake_timeouts: u64,
    /// Accurate deliveries that fell back to the queue without waiting
    pub bypasses: u64,
}

/// Result of a queue push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message is in the queue
    Queued,
    /// Too many unacknowledged messages
    Backpressure,
    /// Queue at capacity
    Full,
    /// Consumer dropped its end
    Disconnected,
}

/// Producer end of the message queue
#[derive(Debug)]
pub struct MessageQueue {
    tx: Sender<u32>,
    shared: Arc<SharedState>,
    max_in_flight: u32,
    stats: Arc<Mutex<SyncStats>>,
}

impl MessageQueue {
    /// Push a message unless admission control rejects it
    pub fn send(&self, raw: u32) -> SendOutcome {
        let in_flight = self.shared.messages_in_flight();
        if in_flight >= self.max_in_flight {
            self.stats.lock().dropped_backpressure += 1;
            warn!(
                "Sound queue saturated ({} unacknowledged), dropping {}",
                in_flight,
                describe(raw)
            );
            return SendOutcome::Backpressure;
        }
        self.push(raw)
    }

    /// Push a message without the in-flight check (mute/unmute)
    pub fn send_unchecked(&self, raw: u32) -> SendOutcome {
        self.push(raw)
    }

    fn push(&self, raw: u32) -> SendOutcome {
        // Count before pushing so the consumer never sees received > sent
        self.shared.record_sent();
        match self.tx.try_send(raw) {
            Ok(()) => {
                self.stats.lock().queued += 1;
                SendOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.shared.retract_sent();
                self.stats.lock().dropped_full += 1;
                warn!("Sound queue full, dropping {}", describe(raw));
                SendOutcome::Full
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.retract_sent();
                self.stats.lock().dropped_disconnected += 1;
                debug!("Sound consumer gone, dropping {}", describe(raw));
                SendOutcome::Disconnected
            }
        }
    }

    /// Messages sent but not yet received
    pub fn in_flight(&self) -> u32 {
        self.shared.messages_in_flight()
    }

    /// Shared statistics handle
    pub fn stats(&self) -> &Arc<Mutex<SyncStats>> {
        &self.stats
    }
}

/// Consumer end of the message queue
#[derive(Debug)]
pub struct MessageReceiver {
    rx: Receiver<u32>,
    shared: Arc<SharedState>,
}

impl MessageReceiver {
    /// Take the next message if one is waiting
    pub fn try_recv(&self) -> Option<Message> {
        while let Ok(raw) = self.rx.try_recv() {
            if let Some(message) = self.accept(raw) {
                return Some(message);
            }
        }
        None
    }

    /// Wait up to `timeout` for the next message
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        loop {
            match self.rx.recv_timeout(timeout) {
                Ok(raw) => {
                    if let Some(message) = self.accept(raw) {
                        return Some(message);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    /// Take every waiting message
    pub fn drain(&self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Number of words waiting in the queue
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn accept(&self, raw: u32) -> Option<Message> {
        self.shared.record_received();
        let message = Message::decode(raw);
        if message.is_none() {
            warn!("Discarding malformed sound message 0x{raw:08X}");
        }
        message
    }
}

/// Create a bounded queue whose counters live in `shared`
pub fn channel(
    shared: Arc<SharedState>,
    capacity: usize,
    max_in_flight: u32,
) -> (MessageQueue, MessageReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let queue = MessageQueue {
        tx,
        shared: Arc::clone(&shared),
        max_in_flight,
        stats: Arc::new(Mutex::new(SyncStats::default())),
    };
    (queue, MessageReceiver { rx, shared })
}

fn describe(raw: u32) -> String {
    match Message::decode(raw) {
        Some(message) => message.to_string(),
        None => format!("0x{raw:08X}"),
    }
}
