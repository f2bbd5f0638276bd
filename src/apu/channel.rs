//! Channel data model
//!
//! Per-channel countdown state lives here as plain data. The register
//! dispatcher and the timing engine are the only code that mutates it.

use crate::constants::{
    ENVELOPE_CLOCK_HZ, LENGTH_CLOCK_DIVISOR, MAX_VOLUME, SWEEP_CLOCK_HZ,
};
use bitflags::bitflags;

/// Number of sound channels
pub const CHANNEL_COUNT: usize = 4;

bitflags! {
    /// Set of channels, laid out like the status bits of NR52
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelMask: u8 {
        /// Channel 1 (swept square)
        const CH1 = 0x01;
        /// Channel 2 (square)
        const CH2 = 0x02;
        /// Channel 3 (wave)
        const CH3 = 0x04;
        /// Channel 4 (noise)
        const CH4 = 0x08;
    }
}

impl ChannelMask {
    /// Mask for a single channel index (0-3)
    #[inline]
    pub fn channel(index: usize) -> Self {
        Self::from_bits_truncate(1u8 << (index & 0x03))
    }
}

/// Direction of an envelope or sweep step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Volume increases / frequency increases
    Up,
    /// Volume decreases / frequency decreases
    #[default]
    Down,
}

/// Volume envelope unit
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    /// Step direction (NRx2 bit 3)
    pub direction: Direction,
    /// Step period in 1/64 s units, 0 = stopped (NRx2 bits 0-2)
    pub period: u8,
    /// Cycles until the next step
    pub counter: i32,
}

impl Envelope {
    /// Cycles between two envelope steps
    #[inline]
    pub fn period_cycles(&self, clock_speed: u32) -> i32 {
        (i64::from(self.period) * i64::from(clock_speed) / ENVELOPE_CLOCK_HZ) as i32
    }

    /// Apply one step to `volume`, clamped to 0..=15
    #[inline]
    pub fn step(&self, volume: u8) -> u8 {
        match self.direction {
            Direction::Up => (volume + 1).min(MAX_VOLUME),
            Direction::Down => volume.saturating_sub(1),
        }
    }
}

/// Frequency sweep unit (channel 1 only)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sweep {
    /// Sweep time in 1/128 s units, 0 = off (NR10 bits 4-6)
    pub time: u8,
    /// Sweep direction (NR10 bit 3, set = down)
    pub direction: Direction,
    /// Shift amount (NR10 bits 0-2)
    pub shift: u8,
    /// Cycles until the next sweep step
    pub counter: i32,
}

impl Sweep {
    /// Cycles between two sweep steps
    #[inline]
    pub fn period_cycles(&self, clock_speed: u32) -> i32 {
        if self.time == 0 {
            return 0;
        }
        (clock_speed / (SWEEP_CLOCK_HZ / u32::from(self.time))) as i32
    }

    /// Reload the counter after it ran out
    ///
    /// The overshoot counts double; beyond a full period the counter is
    /// reloaded plainly so long catch-ups still terminate.
    #[inline]
    pub fn reload(&mut self, period: i32) {
        if self.counter > -period {
            self.counter += period + self.counter;
        } else {
            self.counter += period;
        }
    }

    /// Frequency after one sweep step (may exceed the 11-bit range)
    #[inline]
    pub fn apply(&self, frequency: u16) -> u16 {
        let delta = frequency >> self.shift;
        match self.direction {
            Direction::Up => frequency + delta,
            Direction::Down => frequency - delta,
        }
    }
}

/// Noise clock configuration (NR43)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseClock {
    /// Divisor code (bits 0-2); code 0 divides by 0.5
    pub divisor_code: u8,
    /// 7-bit LFSR mode (bit 3)
    pub narrow: bool,
}

impl NoiseClock {
    /// Noise output frequency in Hz for the given shift clock
    ///
    /// Computed in half-units so divisor code 0 (ratio 0.5) stays integral.
    pub fn frequency(&self, shift: u16) -> i32 {
        let half_units = if self.divisor_code == 0 {
            1
        } else {
            i64::from(self.divisor_code) * 2
        };
        let base = 2 * 524_288 / half_units;
        (base >> (u32::from(shift & 0x0F) + 1)) as i32
    }
}

/// State of a single sound channel
#[derive(Debug, Clone, Copy, Default)]
pub struct Channel {
    /// Frequency register value (11-bit; shift clock nibble on channel 4)
    pub frequency: u16,
    /// Current 4-bit volume
    pub volume: u8,
    /// Raw length register value
    pub length: u8,
    /// Cycles until the length counter expires
    pub length_counter: i32,
    /// Whether the length counter stops the channel (NRx4 bit 6)
    pub length_enabled: bool,
    /// Volume envelope (unused on the wave channel)
    pub envelope: Envelope,
}

impl Channel {
    /// Recompute the length counter from the length register
    ///
    /// `max_length` is 64 for the square and noise channels, 256 for wave.
    #[inline]
    pub fn reload_length(&mut self, max_length: u16, clock_speed: u32) {
        let remaining = i64::from(max_length) - i64::from(self.length);
        self.length_counter = (remaining * i64::from(clock_speed) / LENGTH_CLOCK_DIVISOR) as i32;
    }

    /// Decode an envelope register (NR12, NR22, NR42) into volume and envelope
    pub fn set_envelope_register(&mut self, value: u8) {
        self.volume = value >> 4;
        self.envelope.direction = if value & 0x08 != 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        self.envelope.period = value & 0x07;
    }
}

/// Square channel output frequency (Hz) for an 11-bit frequency value
#[inline]
pub fn tone_frequency(frequency: u16) -> i32 {
    131_072 / (2048 - i32::from(frequency & 0x7FF)) * 8
}

/// Wave channel output frequency (Hz) for an 11-bit frequency value
#[inline]
pub fn wave_frequency(frequency: u16) -> i32 {
    65_536 / (2048 - i32::from(frequency & 0x7FF)) * 32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DMG_CLOCK_HZ;

    #[test]
    fn test_channel_mask_layout() {
        assert_eq!(ChannelMask::channel(0), ChannelMask::CH1);
        assert_eq!(ChannelMask::channel(3), ChannelMask::CH4);
        assert_eq!(ChannelMask::all().bits(), 0x0F);
    }

    #[test]
    fn test_envelope_clamps() {
        let mut env = Envelope {
            direction: Direction::Up,
            ..Envelope::default()
        };
        assert_eq!(env.step(15), 15);
        assert_eq!(env.step(14), 15);

        env.direction = Direction::Down;
        assert_eq!(env.step(0), 0);
        assert_eq!(env.step(1), 0);
    }

    #[test]
    fn test_envelope_period_cycles() {
        let env = Envelope {
            period: 3,
            ..Envelope::default()
        };
        assert_eq!(env.period_cycles(DMG_CLOCK_HZ), 3 * 65_536);
    }

    #[test]
    fn test_sweep_period_cycles() {
        let mut sweep = Sweep::default();
        assert_eq!(sweep.period_cycles(DMG_CLOCK_HZ), 0);
        sweep.time = 2;
        assert_eq!(sweep.period_cycles(DMG_CLOCK_HZ), 4_194_304 / 64);
        sweep.time = 3;
        assert_eq!(sweep.period_cycles(DMG_CLOCK_HZ), 4_194_304 / 42);
    }

    #[test]
    fn test_sweep_apply() {
        let mut sweep = Sweep {
            time: 2,
            direction: Direction::Down,
            shift: 1,
            counter: 0,
        };
        assert_eq!(sweep.apply(0x400), 0x200);

        sweep.direction = Direction::Up;
        assert_eq!(sweep.apply(0x400), 0x600);
        sweep.shift = 0;
        assert_eq!(sweep.apply(0x400), 0x800);
    }

    #[test]
    fn test_sweep_reload_always_makes_progress() {
        let period = 1000;
        for start in [0, -1, -500, -999, -1000, -5000, -1_000_000] {
            let mut sweep = Sweep {
                counter: start,
                ..Sweep::default()
            };
            sweep.reload(period);
            assert!(sweep.counter > start, "reload from {start} went to {}", sweep.counter);
        }
    }

    #[test]
    fn test_sweep_reload_counts_overshoot_twice() {
        let mut sweep = Sweep {
            counter: -100,
            ..Sweep::default()
        };
        sweep.reload(1000);
        assert_eq!(sweep.counter, 800);
    }

    #[test]
    fn test_reload_length() {
        let mut channel = Channel::default();
        channel.reload_length(64, DMG_CLOCK_HZ);
        assert_eq!(channel.length_counter, 64 * (4_194_304 / 256));

        channel.length = 255;
        channel.reload_length(256, DMG_CLOCK_HZ);
        assert_eq!(channel.length_counter, 4_194_304 / 256);
    }

    #[test]
    fn test_reload_length_double_speed_clock_does_not_overflow() {
        let mut channel = Channel::default();
        channel.reload_length(256, DMG_CLOCK_HZ * 2);
        assert_eq!(channel.length_counter, 256 * (8_388_608 / 256));
    }

    #[test]
    fn test_set_envelope_register() {
        let mut channel = Channel::default();
        channel.set_envelope_register(0xA9);
        assert_eq!(channel.volume, 0x0A);
        assert_eq!(channel.envelope.direction, Direction::Up);
        assert_eq!(channel.envelope.period, 1);

        channel.set_envelope_register(0x53);
        assert_eq!(channel.volume, 0x05);
        assert_eq!(channel.envelope.direction, Direction::Down);
        assert_eq!(channel.envelope.period, 3);
    }

    #[test]
    fn test_frequency_conversions() {
        assert_eq!(tone_frequency(0), 64 * 8);
        assert_eq!(tone_frequency(0x7FF), 131_072 * 8);
        assert_eq!(wave_frequency(0), 32 * 32);
    }

    #[test]
    fn test_noise_frequency() {
        let mut noise = NoiseClock::default();
        // Ratio 0.5 doubles the base clock
        assert_eq!(noise.frequency(0), 1_048_576 >> 1);
        noise.divisor_code = 1;
        assert_eq!(noise.frequency(0), 524_288 >> 1);
        noise.divisor_code = 4;
        assert_eq!(noise.frequency(3), (524_288 / 4) >> 4);
    }
}
