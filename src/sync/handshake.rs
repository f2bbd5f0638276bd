//! Cycle-accurate delivery handshake
//!
//! The producer posts the emulated cycle a message belongs to and waits until
//! the renderer reaches that cycle and claims the message slot. The wait is
//! the only blocking point between the cores and is bounded twice: by the
//! consumer's transfer-in-progress flag and by a timeout. Either bound ends
//! in immediate delivery through the queue instead.

use crate::shared::{SharedState, SyncTicket};
use log::trace;
use std::time::{Duration, Instant};

/// Spins between two clock reads
const SPINS_PER_CLOCK_CHECK: u32 = 64;

/// Why a message skipped the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    /// Accurate sync is off
    Disabled,
    /// The consumer is busy with a priority transfer
    TransferInProgress,
    /// The cores are in different frames
    OutOfPhase,
    /// The renderer is already at or past the target cycle
    RendererAhead,
}

/// How a posted handshake ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The renderer claimed the message at the target cycle
    Acknowledged,
    /// A priority transfer started while waiting
    Aborted,
    /// The renderer did not reach the target in time
    TimedOut,
}

/// Emulated cycle used as the handshake target
///
/// Double-speed mode runs twice the cycles per frame, so the position is
/// halved to stay on the renderer's time base.
#[inline]
pub fn target_cycles(cycles_since_vblank: i32, double_speed: bool) -> i32 {
    if double_speed {
        cycles_since_vblank / 2
    } else {
        cycles_since_vblank
    }
}

/// Decide whether a handshake for `cycles` can be posted
pub fn check(shared: &SharedState, enabled: bool, cycles: i32) -> Result<(), Bypass> {
    if !enabled {
        return Err(Bypass::Disabled);
    }
    if shared.transfer_in_progress() {
        return Err(Bypass::TransferInProgress);
    }
    if !shared.in_phase() {
        return Err(Bypass::OutOfPhase);
    }
    if shared.renderer_cycles() >= cycles {
        return Err(Bypass::RendererAhead);
    }
    Ok(())
}

/// Post `cycles` and wait for the renderer to claim it
///
/// The message must already be in the shared message slot.
pub fn await_claim(shared: &SharedState, cycles: i32, timeout: Duration) -> Handshake {
    let ticket = shared.post_sync_target(cycles);
    let started = Instant::now();
    let mut spins = 0u32;

    loop {
        // Only the producer posts, so any change is a claim by the renderer
        if shared.sync_ticket() != Some(ticket) {
            trace!("Handshake at cycle {cycles} acknowledged");
            return Handshake::Acknowledged;
        }

        if shared.transfer_in_progress() {
            return withdraw(shared, ticket, Handshake::Aborted);
        }

        spins = spins.wrapping_add(1);
        if spins % SPINS_PER_CLOCK_CHECK == 0 && started.elapsed() >= timeout {
            return withdraw(shared, ticket, Handshake::TimedOut);
        }

        std::hint::spin_loop();
    }
}

/// Take a posted target back; the renderer may have claimed it meanwhile
fn withdraw(shared: &SharedState, ticket: SyncTicket, reason: Handshake) -> Handshake {
    if shared.claim_sync(ticket) {
        trace!("Handshake at cycle {} withdrawn: {reason:?}", ticket.cycles());
        reason
    } else {
        Handshake::Acknowledged
    }
}
