//! Sound Hardware Constants
//!
//! Clock rates, register ranges and lookup tables shared across the engine.

/// Master clock of the handheld in single-speed mode (Hz)
pub const DMG_CLOCK_HZ: u32 = 4_194_304;

/// First sound register offset (NR10)
pub const REGISTER_FIRST: u8 = 0x10;

/// Last sound register offset (end of wave RAM)
pub const REGISTER_LAST: u8 = 0x3F;

/// First wave RAM offset
pub const WAVE_RAM_START: u8 = 0x30;

/// Number of wave RAM bytes
pub const WAVE_RAM_LEN: usize = 16;

/// Number of PCM samples held in the sample buffer (two per wave RAM byte)
pub const SAMPLE_BUFFER_LEN: usize = WAVE_RAM_LEN * 2;

/// Highest frequency value representable in the 11-bit frequency registers
pub const MAX_FREQUENCY: u16 = 0x7FF;

/// Highest 4-bit channel volume
pub const MAX_VOLUME: u8 = 0x0F;

/// Length counters are clocked at 256 Hz
pub const LENGTH_CLOCK_DIVISOR: i64 = 256;

/// Sweep unit base rate (Hz), divided by the sweep time
pub const SWEEP_CLOCK_HZ: u32 = 128;

/// Envelope unit base rate (Hz), divided by the envelope period
pub const ENVELOPE_CLOCK_HZ: i64 = 64;

/// Length register range of the square and noise channels
pub const SHORT_LENGTH_MAX: u16 = 64;

/// Length register range of the wave channel
pub const WAVE_LENGTH_MAX: u16 = 256;

/// Sent-but-unreceived messages allowed before new sends are dropped
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 60;

/// Value of the shared sync target while no handshake is pending
pub const SYNC_IDLE: i32 = -1;

/// `required_next_event_cycles` value when no unit asked to run again
pub const NO_PENDING_EVENT: i32 = i32::MAX;

/// Pan value for a channel routed to both outputs
pub const PAN_CENTER: u8 = 64;
/// Pan value for a channel routed to the right output only
pub const PAN_RIGHT: u8 = 127;
/// Pan value for a channel routed to the left output only
pub const PAN_LEFT: u8 = 0;
/// Pan marker for a channel routed to no output
pub const PAN_SILENT: u8 = 128;

/// Analog output level of each 4-bit wave sample (normalized to -1.0..=1.0)
///
/// The DAC is linear but not perfectly symmetric around zero, which is why
/// the middle entries are not mirror images of each other.
pub const ANALOG_LEVELS: [f32; 16] = [
    -1.0, -0.8667, -0.7334, -0.6, -0.4668, -0.3335, -0.2, -0.067, 0.0664, 0.2, 0.333, 0.4668, 0.6,
    0.7334, 0.8667, 1.0,
];

/// Scale applied to [`ANALOG_LEVELS`] to obtain signed 8-bit PCM
pub const PCM_SCALE: f32 = 112.0;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_analog_levels_bounds() {
        assert_relative_eq!(ANALOG_LEVELS[0], -1.0);
        assert_relative_eq!(ANALOG_LEVELS[15], 1.0);
    }

    #[test]
    fn test_analog_levels_monotonic_increasing() {
        for i in 1..ANALOG_LEVELS.len() {
            assert!(
                ANALOG_LEVELS[i] > ANALOG_LEVELS[i - 1],
                "Analog table not monotonic at {}: {} <= {}",
                i,
                ANALOG_LEVELS[i],
                ANALOG_LEVELS[i - 1]
            );
        }
    }

    #[test]
    fn test_analog_levels_step_is_roughly_linear() {
        let step = 2.0 / 15.0;
        for pair in ANALOG_LEVELS.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], step, epsilon = 0.005);
        }
    }

    #[test]
    fn test_register_range_covers_wave_ram() {
        assert_eq!(
            (REGISTER_LAST - WAVE_RAM_START + 1) as usize,
            WAVE_RAM_LEN,
            "wave RAM must end at the last sound register"
        );
    }
}
