//! Cycle-driven channel units
//!
//! [`SoundEngine::advance`] runs the sweep, envelope and length units over a
//! slice of elapsed CPU cycles, always in that order so a channel stopped by
//! a sweep overflow is no longer counted down by its length unit.
//!
//! Each unit still counting down reports when it next needs to run through
//! the [`EventScheduler`]; the host may skip `advance` until then.

use super::channel::ChannelMask;
use super::CHANNEL_COUNT;
use crate::constants::{MAX_FREQUENCY, MAX_VOLUME, NO_PENDING_EVENT};
use crate::engine::SoundEngine;
use crate::host::SoundHost;
use crate::sync::Message;
use log::debug;

/// Channels with a volume envelope (the wave channel has none)
const ENVELOPE_CHANNELS: [usize; 3] = [0, 1, 3];

/// Soonest cycle count at which a unit wants to run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventScheduler {
    next: i32,
}

impl EventScheduler {
    /// Create a scheduler with nothing pending
    pub fn new() -> Self {
        EventScheduler {
            next: NO_PENDING_EVENT,
        }
    }

    /// Forget every request
    pub fn reset(&mut self) {
        self.next = NO_PENDING_EVENT;
    }

    /// Ask to run again after `cycles`; the earliest request wins
    #[inline]
    pub fn request(&mut self, cycles: i32) {
        self.next = self.next.min(cycles.max(1));
    }

    /// Earliest requested cycle count, [`NO_PENDING_EVENT`] if none
    pub fn next(&self) -> i32 {
        self.next
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundEngine {
    /// Run the sweep, envelope and length units over `elapsed` CPU cycles
    ///
    /// Sends one global update when any unit changed a committed parameter.
    /// Does nothing while the engine is disabled.
    pub fn advance<H: SoundHost + ?Sized>(&mut self, host: &mut H, elapsed: i32) {
        self.scheduler.reset();
        if self.disabled {
            return;
        }

        let mut changed = self.advance_sweep(host, elapsed);
        changed |= self.advance_envelopes(elapsed);
        changed |= self.advance_lengths(host, elapsed);

        if changed {
            self.emit(&*host, Message::update_all());
        }
    }

    fn advance_sweep<H: SoundHost + ?Sized>(&mut self, host: &mut H, elapsed: i32) -> bool {
        if self.sweep.time == 0 || !self.link.target().is_on(0) {
            return false;
        }

        let period = self.sweep.period_cycles(self.config.clock_speed);
        let mut changed = false;
        self.sweep.counter = self.sweep.counter.saturating_sub(elapsed);

        while self.sweep.counter <= 0 {
            self.sweep.reload(period);
            changed = true;

            let frequency = self.sweep.apply(self.channels[0].frequency);
            if frequency > MAX_FREQUENCY {
                debug!("Channel 1 sweep overflow (0x{frequency:03X}), stopping");
                self.link.target().disable_channels(ChannelMask::CH1);
                host.clear_sound_channel(ChannelMask::CH1);
                return changed;
            }
            self.channels[0].frequency = frequency;
            self.commit_frequency(0);
        }

        self.scheduler.request(self.sweep.counter);
        changed
    }

    fn advance_envelopes(&mut self, elapsed: i32) -> bool {
        let clock_speed = self.config.clock_speed;
        let mut changed = false;

        for index in ENVELOPE_CHANNELS {
            if !self.link.target().is_on(index) {
                continue;
            }
            let channel = &mut self.channels[index];
            if channel.envelope.period == 0 {
                continue;
            }

            let period = channel.envelope.period_cycles(clock_speed);
            channel.envelope.counter = channel.envelope.counter.saturating_sub(elapsed);
            while channel.envelope.counter <= 0 {
                channel.envelope.counter += period;
                channel.volume = channel.envelope.step(channel.volume);
            }

            // Nothing left to do at either end of the range
            if channel.volume != 0 && channel.volume != MAX_VOLUME {
                self.scheduler.request(channel.envelope.counter);
            }
            changed |= self.commit_volume(index);
        }

        changed
    }

    fn advance_lengths<H: SoundHost + ?Sized>(&mut self, host: &mut H, elapsed: i32) -> bool {
        let mut changed = false;

        for index in 0..CHANNEL_COUNT {
            let mask = ChannelMask::channel(index);
            let target = self.link.target();
            let channel = &mut self.channels[index];
            if !channel.length_enabled || !target.is_on(index) {
                continue;
            }

            channel.length_counter = channel.length_counter.saturating_sub(elapsed);
            if channel.length_counter <= 0 {
                debug!("Channel {} length expired", index + 1);
                target.disable_channels(mask);
                host.clear_sound_channel(mask);
                changed = true;
            } else {
                self.scheduler.request(channel.length_counter);
            }
        }

        changed
    }
}
