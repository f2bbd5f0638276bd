//! Sound engine lifecycle
//!
//! [`SoundEngine`] is the producer half of the two-core split. It owns the
//! channel state, writes committed parameters into the shared block and
//! pushes messages to the [`RenderPort`] created alongside it.
//!
//! Register decoding lives in [`crate::apu::dispatch`], cycle-driven units in
//! [`crate::apu::timing`]; this module holds construction, mute/enable state
//! and message delivery.

use crate::apu::registers::NR52;
use crate::apu::{
    tone_frequency, wave_frequency, Channel, ChannelMask, EventScheduler, NoiseClock,
    SampleBuffer, Sweep, WaveTable, CHANNEL_COUNT,
};
use crate::config::EngineConfig;
use crate::constants::{PAN_CENTER, PAN_LEFT, PAN_RIGHT, PAN_SILENT};
use crate::host::SoundHost;
use crate::shared::{SharedLink, SharedState};
use crate::sync::handshake::{self, Handshake};
use crate::sync::{self, Message, MessageQueue, RenderPort, SyncStats};
use crate::Result;
use log::{debug, trace};
use std::sync::Arc;

/// Emulation-side sound engine
///
/// # Example
///
/// ```
/// use gbsound::{EngineConfig, RegisterFile, SoundEngine};
///
/// let (mut engine, port) = SoundEngine::new(EngineConfig::default()).unwrap();
/// let mut io = RegisterFile::new();
/// io.write(0x26, 0x80);
/// engine.init(&mut io);
///
/// engine.mute();
/// io.write(0x19, 0x80);
/// engine.write_register(&mut io, 0x19, 0x80);
/// assert!(!port.snapshot().channels[1].on);
/// ```
#[derive(Debug)]
pub struct SoundEngine {
    pub(crate) config: EngineConfig,
    pub(crate) channels: [Channel; CHANNEL_COUNT],
    pub(crate) sweep: Sweep,
    pub(crate) noise: NoiseClock,
    pub(crate) wave: WaveTable,
    pub(crate) samples: Arc<SampleBuffer>,
    pub(crate) link: SharedLink,
    pub(crate) queue: MessageQueue,
    pub(crate) scheduler: EventScheduler,
    /// Writes go to the scratch block, nothing is sent
    pub(crate) muted: bool,
    /// Whole subsystem off: timing stops, nothing is sent
    pub(crate) disabled: bool,
    pub(crate) accurate_sync: bool,
    /// NR52 bit 7 as last applied
    pub(crate) master_enabled: bool,
    /// On-mask saved by the last NR52 disable
    pub(crate) resume_mask: ChannelMask,
}

impl SoundEngine {
    /// Create an engine and the rendering core's port
    pub fn new(config: EngineConfig) -> Result<(Self, RenderPort)> {
        config.validate()?;

        let shared = Arc::new(SharedState::new());
        let (queue, receiver) = sync::channel(
            Arc::clone(&shared),
            config.queue_capacity,
            config.max_in_flight,
        );

        let samples = Arc::new(SampleBuffer::new());
        shared.publish_samples(&samples);
        shared.set_hyper_sync(config.accurate_sync);

        let engine = SoundEngine {
            config,
            channels: [Channel::default(); CHANNEL_COUNT],
            sweep: Sweep::default(),
            noise: NoiseClock::default(),
            wave: WaveTable::new(),
            samples,
            link: SharedLink::new(Arc::clone(&shared)),
            queue,
            scheduler: EventScheduler::new(),
            muted: false,
            disabled: false,
            accurate_sync: config.accurate_sync,
            master_enabled: true,
            resume_mask: ChannelMask::empty(),
        };

        Ok((engine, RenderPort::new(shared, receiver)))
    }

    /// Reset channel state and load every register from the host
    pub fn init<H: SoundHost + ?Sized>(&mut self, host: &mut H) {
        self.channels = [Channel::default(); CHANNEL_COUNT];
        self.sweep = Sweep::default();
        self.noise = NoiseClock::default();
        self.scheduler.reset();
        self.resume_mask = ChannelMask::empty();
        self.refresh(host);
    }

    /// Re-attach, re-enable and reapply every current register value
    ///
    /// Channels whose status bit is set in the host's NR52 are re-triggered.
    pub fn refresh<H: SoundHost + ?Sized>(&mut self, host: &mut H) {
        self.disabled = false;
        self.muted = false;
        self.link.attach();

        let live = self.link.live();
        live.publish_samples(&self.samples);
        live.set_channels_on(ChannelMask::empty());

        self.master_enabled = true;
        let status = host.read_io(NR52);
        let mask = ChannelMask::from_bits_truncate(status);
        debug!("Refreshing sound state, host status {mask:?}");
        self.resync(host, status, mask);
        self.emit(&*host, Message::update_all());
    }

    /// Keep running but stop touching the live block and sending messages
    pub fn mute(&mut self) {
        if !self.muted {
            debug!("Sound engine muted");
        }
        self.muted = true;
        self.link.detach();
    }

    /// Undo [`mute`](Self::mute) and push the current register state
    pub fn unmute<H: SoundHost + ?Sized>(&mut self, host: &mut H) {
        debug!("Sound engine unmuted");
        self.refresh(host);
    }

    /// Turn the whole subsystem on or off
    ///
    /// Enabling performs a full [`refresh`](Self::refresh).
    pub fn set_enabled<H: SoundHost + ?Sized>(&mut self, host: &mut H, enabled: bool) {
        if enabled {
            self.refresh(host);
        } else {
            debug!("Sound engine disabled");
            self.disabled = true;
            self.link.detach();
        }
    }

    /// Whether the subsystem is enabled
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Whether the engine is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Switch between best-effort and cycle-accurate delivery
    pub fn set_accurate_sync(&mut self, enabled: bool) {
        self.accurate_sync = enabled;
        self.link.live().set_hyper_sync(enabled);
    }

    /// Whether cycle-accurate delivery is on
    pub fn accurate_sync(&self) -> bool {
        self.accurate_sync
    }

    /// Frame boundary on the emulation side
    pub fn notify_vblank(&mut self) {
        self.link.live().flip_emulator_frame();
        trace!("VBlank, {} sound messages in flight", self.queue.in_flight());
    }

    /// Cycles until a timing unit needs [`advance`](Self::advance) again
    ///
    /// [`NO_PENDING_EVENT`](crate::constants::NO_PENDING_EVENT) when no unit
    /// is counting down.
    pub fn required_next_event_cycles(&self) -> i32 {
        self.scheduler.next()
    }

    /// Ask the rendering core to silence its output
    ///
    /// Sent past admission control so a saturated queue cannot swallow it.
    pub fn mute_output(&self) {
        self.queue.send_unchecked(Message::mute().encode());
    }

    /// Ask the rendering core to resume its output
    pub fn unmute_output(&self) {
        self.queue.send_unchecked(Message::unmute().encode());
    }

    /// Front-end toggle for a single channel
    ///
    /// The flag always lands in the live block; the update message is only
    /// sent while the engine is attached.
    pub fn set_channel_enabled(&mut self, index: usize, enabled: bool) {
        if index >= CHANNEL_COUNT {
            return;
        }
        self.link.live().set_channel_enabled(index, enabled);
        if self.muted || self.disabled {
            return;
        }
        if enabled {
            self.commit_volume(index);
        }
        // Not tied to an emulated cycle, so never a handshake
        self.queue.send(Message::update(index).encode());
    }

    /// Copy of the delivery counters
    pub fn stats(&self) -> SyncStats {
        *self.queue.stats().lock()
    }

    /// Live shared block
    pub fn shared(&self) -> &Arc<SharedState> {
        self.link.live()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Channel state (index 0-3)
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Channel 1 sweep unit
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// Channel 4 noise clock
    pub fn noise(&self) -> &NoiseClock {
        &self.noise
    }

    /// Write the channel's volume to the current block
    ///
    /// Skipped while the channel is off or disabled by the front-end.
    /// Returns whether the committed value changed.
    pub(crate) fn commit_volume(&self, index: usize) -> bool {
        let target = self.link.target();
        if !target.is_on(index) || !target.channel_enabled(index) {
            return false;
        }
        let volume = self.channels[index].volume;
        if target.volume(index) == volume {
            return false;
        }
        target.set_volume(index, volume);
        true
    }

    /// Write the channel's output frequency (Hz) to the current block
    pub(crate) fn commit_frequency(&self, index: usize) {
        let raw = self.channels[index].frequency;
        let hz = match index {
            0 | 1 => tone_frequency(raw),
            2 => wave_frequency(raw),
            _ => self.noise.frequency(raw),
        };
        self.link.target().set_frequency(index, hz);
    }

    /// Derive the channel's pan from the routing byte
    pub(crate) fn commit_pan(&self, index: usize) {
        let target = self.link.target();
        let routing = target.chan_output();
        let right = routing & (1 << index) != 0;
        let left = routing & (1 << (index + 4)) != 0;
        let pan = match (left, right) {
            (true, true) => PAN_CENTER,
            (false, true) => PAN_RIGHT,
            (true, false) => PAN_LEFT,
            (false, false) => PAN_SILENT,
        };
        target.set_pan(index, pan);
    }

    /// Deliver a message using the current delivery mode
    ///
    /// Does nothing while muted or disabled.
    pub(crate) fn emit<H: SoundHost + ?Sized>(&self, host: &H, message: Message) {
        if self.muted || self.disabled {
            return;
        }
        if self.accurate_sync {
            self.synchronize(host, message);
        } else {
            self.queue.send(message.encode());
        }
    }

    /// Cycle-accurate delivery, falling back to the queue
    fn synchronize<H: SoundHost + ?Sized>(&self, host: &H, message: Message) {
        let raw = message.encode();
        let live = self.link.live();
        let cycles =
            handshake::target_cycles(host.cycles_since_vblank(), host.is_double_speed());

        if let Err(reason) = handshake::check(live, self.accurate_sync, cycles) {
            trace!("Delivering {message} immediately: {reason:?}");
            self.queue.stats().lock().bypasses += 1;
            self.queue.send(raw);
            return;
        }

        live.set_message(raw);
        match handshake::await_claim(live, cycles, self.config.sync_timeout()) {
            Handshake::Acknowledged => {
                self.queue.stats().lock().handshakes += 1;
            }
            Handshake::Aborted => {
                self.queue.stats().lock().handshake_aborts += 1;
                self.queue.send(raw);
            }
            Handshake::TimedOut => {
                debug!("Renderer missed cycle {cycles} for {message}, delivering late");
                self.queue.stats().lock().handshake_timeouts += 1;
                self.queue.send(raw);
            }
        }
    }
}
