//! Cross-core parameter block
//!
//! [`SharedState`] is the only memory both cores touch besides the message
//! queue. There is no lock: every field has exactly one writer, noted on the
//! field, and is an atomic so the other side always observes whole values.
//!
//! - **Producer** is the emulation core ([`crate::SoundEngine`]).
//! - **Consumer** is the rendering core ([`crate::RenderPort`]).
//! - **Front-end** is the user-facing side (menus, channel toggles).

use crate::apu::{ChannelMask, SampleBuffer, CHANNEL_COUNT};
use crate::constants::{PAN_SILENT, SYNC_IDLE};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Validate a channel index for the per-channel fields
#[inline]
fn slot(index: usize) -> usize {
    assert!(index < CHANNEL_COUNT, "channel index {index} out of range");
    index
}

/// One handshake post: target cycle tagged with its post sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyncTicket(u64);

impl SyncTicket {
    /// Target cycle of the post
    #[inline]
    pub(crate) fn cycles(self) -> i32 {
        self.0 as u32 as i32
    }
}

/// Fixed-layout block shared between the emulation and rendering cores
#[repr(C)]
#[derive(Debug)]
pub struct SharedState {
    /// Channel on-bits (producer)
    chan_on: AtomicU8,
    /// Committed 4-bit volume per channel (producer)
    chan_volume: [AtomicU8; CHANNEL_COUNT],
    /// Committed output frequency in Hz per channel (producer)
    chan_frequency: [AtomicI32; CHANNEL_COUNT],
    /// Committed pan per channel (producer)
    chan_pan: [AtomicU8; CHANNEL_COUNT],
    /// Committed duty code per square channel (producer)
    chan_duty: [AtomicU8; CHANNEL_COUNT],
    /// NR50 master volume byte (producer)
    vol_control: AtomicU8,
    /// NR51 output routing byte (producer)
    chan_output: AtomicU8,
    /// 7-bit noise mode (producer)
    noise_narrow: AtomicBool,
    /// Outstanding message word; rewritten only after the previous one was
    /// delivered (producer)
    message: AtomicU32,
    /// Messages pushed into the queue (producer)
    messages_sent: AtomicU32,
    /// Cycle-accurate delivery requested (producer)
    hyper_sync: AtomicBool,
    /// Emulator frame parity (producer)
    frame_flip_emulator: AtomicBool,
    /// Pending handshake: post sequence in the high word, target cycle in
    /// the low word ([`SYNC_IDLE`] when none). Producer posts; whichever side
    /// wins the compare-and-swap back to idle owns the delivery.
    sync_slot: AtomicU64,
    /// Per-channel output enable (front-end)
    chan_enabled: [AtomicBool; CHANNEL_COUNT],
    /// Messages taken out of the queue (consumer)
    messages_received: AtomicU32,
    /// Renderer position in emulated cycles within the frame (consumer)
    renderer_cycles: AtomicI32,
    /// Renderer frame parity (consumer)
    frame_flip_renderer: AtomicBool,
    /// Consumer is busy with a priority transfer (consumer)
    transfer_in_progress: AtomicBool,
    /// Wave PCM published by the producer; first publish wins
    samples: OnceLock<Arc<SampleBuffer>>,
}

impl SharedState {
    /// Create a block with every channel off and enabled
    pub fn new() -> Self {
        SharedState {
            chan_on: AtomicU8::new(0),
            chan_volume: std::array::from_fn(|_| AtomicU8::new(0)),
            chan_frequency: std::array::from_fn(|_| AtomicI32::new(0)),
            chan_pan: std::array::from_fn(|_| AtomicU8::new(PAN_SILENT)),
            chan_duty: std::array::from_fn(|_| AtomicU8::new(0)),
            vol_control: AtomicU8::new(0),
            chan_output: AtomicU8::new(0),
            noise_narrow: AtomicBool::new(false),
            message: AtomicU32::new(0),
            messages_sent: AtomicU32::new(0),
            hyper_sync: AtomicBool::new(false),
            frame_flip_emulator: AtomicBool::new(false),
            sync_slot: AtomicU64::new(u64::from(SYNC_IDLE as u32)),
            chan_enabled: std::array::from_fn(|_| AtomicBool::new(true)),
            messages_received: AtomicU32::new(0),
            renderer_cycles: AtomicI32::new(0),
            frame_flip_renderer: AtomicBool::new(false),
            transfer_in_progress: AtomicBool::new(false),
            samples: OnceLock::new(),
        }
    }

    // Channel on-bits

    /// Channels currently on
    #[inline]
    pub fn channels_on(&self) -> ChannelMask {
        ChannelMask::from_bits_truncate(self.chan_on.load(Ordering::Acquire))
    }

    /// Whether channel `index` is on
    #[inline]
    pub fn is_on(&self, index: usize) -> bool {
        self.channels_on().contains(ChannelMask::channel(slot(index)))
    }

    /// Replace the whole on-mask
    #[inline]
    pub fn set_channels_on(&self, mask: ChannelMask) {
        self.chan_on.store(mask.bits(), Ordering::Release);
    }

    /// Turn channels on
    #[inline]
    pub fn enable_channels(&self, mask: ChannelMask) {
        self.chan_on.fetch_or(mask.bits(), Ordering::AcqRel);
    }

    /// Turn channels off, returning the previous mask
    #[inline]
    pub fn disable_channels(&self, mask: ChannelMask) -> ChannelMask {
        ChannelMask::from_bits_truncate(self.chan_on.fetch_and(!mask.bits(), Ordering::AcqRel))
    }

    /// Turn every channel off, returning the previous mask
    #[inline]
    pub fn take_channels_on(&self) -> ChannelMask {
        ChannelMask::from_bits_truncate(self.chan_on.swap(0, Ordering::AcqRel))
    }

    // Per-channel parameters. Every accessor taking a channel index panics
    // unless `index < CHANNEL_COUNT`.

    /// Committed volume of a channel
    pub fn volume(&self, index: usize) -> u8 {
        self.chan_volume[slot(index)].load(Ordering::Relaxed)
    }

    /// Commit a channel volume
    pub fn set_volume(&self, index: usize, volume: u8) {
        self.chan_volume[slot(index)].store(volume, Ordering::Relaxed);
    }

    /// Committed frequency (Hz) of a channel
    pub fn frequency(&self, index: usize) -> i32 {
        self.chan_frequency[slot(index)].load(Ordering::Relaxed)
    }

    /// Commit a channel frequency (Hz)
    pub fn set_frequency(&self, index: usize, hz: i32) {
        self.chan_frequency[slot(index)].store(hz, Ordering::Relaxed);
    }

    /// Committed pan of a channel
    pub fn pan(&self, index: usize) -> u8 {
        self.chan_pan[slot(index)].load(Ordering::Relaxed)
    }

    /// Commit a channel pan
    pub fn set_pan(&self, index: usize, pan: u8) {
        self.chan_pan[slot(index)].store(pan, Ordering::Relaxed);
    }

    /// Committed duty code of a channel
    pub fn duty(&self, index: usize) -> u8 {
        self.chan_duty[slot(index)].load(Ordering::Relaxed)
    }

    /// Commit a duty code (0-3)
    pub fn set_duty(&self, index: usize, duty: u8) {
        self.chan_duty[slot(index)].store(duty & 0x03, Ordering::Relaxed);
    }

    /// Whether the front-end lets this channel be heard
    pub fn channel_enabled(&self, index: usize) -> bool {
        self.chan_enabled[slot(index)].load(Ordering::Relaxed)
    }

    /// Front-end channel toggle
    pub fn set_channel_enabled(&self, index: usize, enabled: bool) {
        self.chan_enabled[slot(index)].store(enabled, Ordering::Relaxed);
    }

    // Global mix

    /// NR50 master volume byte
    pub fn vol_control(&self) -> u8 {
        self.vol_control.load(Ordering::Relaxed)
    }

    /// Store NR50
    pub fn set_vol_control(&self, value: u8) {
        self.vol_control.store(value, Ordering::Relaxed);
    }

    /// NR51 routing byte
    pub fn chan_output(&self) -> u8 {
        self.chan_output.load(Ordering::Relaxed)
    }

    /// Store NR51
    pub fn set_chan_output(&self, value: u8) {
        self.chan_output.store(value, Ordering::Relaxed);
    }

    /// 7-bit noise mode flag
    pub fn noise_narrow(&self) -> bool {
        self.noise_narrow.load(Ordering::Relaxed)
    }

    /// Store the noise mode flag
    pub fn set_noise_narrow(&self, narrow: bool) {
        self.noise_narrow.store(narrow, Ordering::Relaxed);
    }

    // Message slot and flow control

    /// Outstanding message word
    #[inline]
    pub fn message(&self) -> u32 {
        self.message.load(Ordering::Acquire)
    }

    /// Overwrite the message slot
    #[inline]
    pub fn set_message(&self, raw: u32) {
        self.message.store(raw, Ordering::Release);
    }

    /// Messages pushed so far
    pub fn messages_sent(&self) -> u32 {
        self.messages_sent.load(Ordering::Acquire)
    }

    /// Messages received so far
    pub fn messages_received(&self) -> u32 {
        self.messages_received.load(Ordering::Acquire)
    }

    /// Sent but not yet received
    #[inline]
    pub fn messages_in_flight(&self) -> u32 {
        self.messages_sent().wrapping_sub(self.messages_received())
    }

    pub(crate) fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn retract_sent(&self) {
        self.messages_sent.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::AcqRel);
    }

    // Synchronization

    /// Whether cycle-accurate delivery is requested
    pub fn hyper_sync(&self) -> bool {
        self.hyper_sync.load(Ordering::Acquire)
    }

    /// Publish the cycle-accurate delivery flag
    pub fn set_hyper_sync(&self, enabled: bool) {
        self.hyper_sync.store(enabled, Ordering::Release);
    }

    /// Pending handshake target, `None` when idle
    #[inline]
    pub fn sync_target(&self) -> Option<i32> {
        self.sync_ticket().map(SyncTicket::cycles)
    }

    /// Pending handshake post, `None` when idle
    #[inline]
    pub(crate) fn sync_ticket(&self) -> Option<SyncTicket> {
        let ticket = SyncTicket(self.sync_slot.load(Ordering::Acquire));
        (ticket.cycles() != SYNC_IDLE).then_some(ticket)
    }

    /// Post a handshake target under a fresh sequence number
    #[inline]
    pub(crate) fn post_sync_target(&self, cycles: i32) -> SyncTicket {
        let sequence = (self.sync_slot.load(Ordering::Acquire) >> 32).wrapping_add(1);
        let ticket = SyncTicket((sequence << 32) | u64::from(cycles as u32));
        self.sync_slot.store(ticket.0, Ordering::Release);
        ticket
    }

    /// Return a posted target to idle; false if the other side got there
    /// first or the producer has posted again since `ticket` was read
    #[inline]
    pub(crate) fn claim_sync(&self, ticket: SyncTicket) -> bool {
        let idle = (ticket.0 & !0xFFFF_FFFF) | u64::from(SYNC_IDLE as u32);
        self.sync_slot
            .compare_exchange(ticket.0, idle, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Renderer position within the frame
    #[inline]
    pub fn renderer_cycles(&self) -> i32 {
        self.renderer_cycles.load(Ordering::Acquire)
    }

    pub(crate) fn set_renderer_cycles(&self, cycles: i32) {
        self.renderer_cycles.store(cycles, Ordering::Release);
    }

    /// Whether both cores are in the same frame
    #[inline]
    pub fn in_phase(&self) -> bool {
        self.frame_flip_emulator.load(Ordering::Acquire)
            == self.frame_flip_renderer.load(Ordering::Acquire)
    }

    pub(crate) fn flip_emulator_frame(&self) {
        self.frame_flip_emulator.fetch_xor(true, Ordering::AcqRel);
    }

    pub(crate) fn flip_renderer_frame(&self) {
        self.frame_flip_renderer.fetch_xor(true, Ordering::AcqRel);
    }

    /// Whether the consumer is busy with a priority transfer
    #[inline]
    pub fn transfer_in_progress(&self) -> bool {
        self.transfer_in_progress.load(Ordering::Acquire)
    }

    pub(crate) fn set_transfer_in_progress(&self, busy: bool) {
        self.transfer_in_progress.store(busy, Ordering::Release);
    }

    // Sample buffer

    /// Publish the wave sample buffer (no-op once one is published)
    pub fn publish_samples(&self, samples: &Arc<SampleBuffer>) {
        let _ = self.samples.set(Arc::clone(samples));
    }

    /// Published wave sample buffer
    pub fn samples(&self) -> Option<&Arc<SampleBuffer>> {
        self.samples.get()
    }

    /// Copy every committed parameter
    pub fn snapshot(&self) -> SharedSnapshot {
        let on = self.channels_on();
        SharedSnapshot {
            channels: std::array::from_fn(|i| ChannelView {
                on: on.contains(ChannelMask::channel(i)),
                volume: self.volume(i),
                frequency_hz: self.frequency(i),
                pan: self.pan(i),
                duty: self.duty(i),
                enabled: self.channel_enabled(i),
            }),
            vol_control: self.vol_control(),
            chan_output: self.chan_output(),
            noise_narrow: self.noise_narrow(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Committed parameters of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelView {
    /// On-bit
    pub on: bool,
    /// 4-bit volume
    pub volume: u8,
    /// Output frequency (Hz)
    pub frequency_hz: i32,
    /// Pan (0 left, 64 center, 127 right, 128 silent)
    pub pan: u8,
    /// Duty code
    pub duty: u8,
    /// Front-end enable
    pub enabled: bool,
}

/// Copy of the shared block at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedSnapshot {
    /// Channels 1-4
    pub channels: [ChannelView; CHANNEL_COUNT],
    /// NR50
    pub vol_control: u8,
    /// NR51
    pub chan_output: u8,
    /// 7-bit noise mode
    pub noise_narrow: bool,
}

/// Switchable write destination of the producer
///
/// While detached, every write lands in a private scratch block so the
/// producer keeps running without touching the live block or waking the
/// consumer.
#[derive(Debug)]
pub struct SharedLink {
    live: Arc<SharedState>,
    scratch: SharedState,
    attached: bool,
}

impl SharedLink {
    /// Link attached to `live`
    pub fn new(live: Arc<SharedState>) -> Self {
        SharedLink {
            live,
            scratch: SharedState::new(),
            attached: true,
        }
    }

    /// Route writes to the live block
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Route writes to the scratch block
    ///
    /// The scratch block inherits the live on-mask so channel timing carries
    /// on while detached.
    pub fn detach(&mut self) {
        if self.attached {
            self.scratch.set_channels_on(self.live.channels_on());
        }
        self.attached = false;
    }

    /// Whether writes go to the live block
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Current write destination
    #[inline]
    pub fn target(&self) -> &SharedState {
        if self.attached {
            &self.live
        } else {
            &self.scratch
        }
    }

    /// The live block, regardless of attachment
    #[inline]
    pub fn live(&self) -> &Arc<SharedState> {
        &self.live
    }
}
