//! Sound Register Definitions
//!
//! Offsets are relative to `0xFF00`. Gaps in the range (`0x15`, `0x1F`,
//! `0x27..=0x2F`) are unmapped and decode to `None`.

use std::fmt;

/// Restart bit of the four trigger registers
pub const TRIGGER_BIT: u8 = 0x80;

/// Length-enable bit of the four trigger registers
pub const LENGTH_ENABLE_BIT: u8 = 0x40;

/// Master enable bit of NR52
pub const MASTER_ENABLE_BIT: u8 = 0x80;

/// Wave DAC enable bit of NR30
pub const WAVE_DAC_BIT: u8 = 0x80;

/// Trigger register offset of each channel
pub const TRIGGER_REGISTERS: [u8; 4] = [0x14, 0x19, 0x1E, 0x23];

/// Envelope register offset of each channel (the wave channel has none)
pub const ENVELOPE_REGISTERS: [Option<u8>; 4] = [Some(0x12), Some(0x17), None, Some(0x21)];

/// Wave DAC enable register offset
pub const NR30: u8 = 0x1A;

/// Master enable register offset
pub const NR52: u8 = 0x26;

/// Sound register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Channel 1 sweep - NR10
    Ch1Sweep,
    /// Channel 1 length and duty - NR11
    Ch1LengthDuty,
    /// Channel 1 volume envelope - NR12
    Ch1Envelope,
    /// Channel 1 frequency (low byte) - NR13
    Ch1FreqLo,
    /// Channel 1 frequency (high bits) and control - NR14
    Ch1FreqHi,
    /// Channel 2 length and duty - NR21
    Ch2LengthDuty,
    /// Channel 2 volume envelope - NR22
    Ch2Envelope,
    /// Channel 2 frequency (low byte) - NR23
    Ch2FreqLo,
    /// Channel 2 frequency (high bits) and control - NR24
    Ch2FreqHi,
    /// Channel 3 DAC enable - NR30
    Ch3Enable,
    /// Channel 3 length - NR31
    Ch3Length,
    /// Channel 3 output level - NR32
    Ch3Level,
    /// Channel 3 frequency (low byte) - NR33
    Ch3FreqLo,
    /// Channel 3 frequency (high bits) and control - NR34
    Ch3FreqHi,
    /// Channel 4 length - NR41
    Ch4Length,
    /// Channel 4 volume envelope - NR42
    Ch4Envelope,
    /// Channel 4 polynomial counter - NR43
    Ch4Polynomial,
    /// Channel 4 control - NR44
    Ch4Control,
    /// Master volume and VIN panning - NR50
    MasterVolume,
    /// Output routing - NR51
    Routing,
    /// Master enable and channel status - NR52
    MasterEnable,
    /// Wave pattern RAM byte (index 0-15)
    WaveRam(u8),
}

impl Register {
    /// Decode a register offset, `None` for unmapped addresses
    pub fn from_addr(addr: u8) -> Option<Self> {
        match addr {
            0x10 => Some(Register::Ch1Sweep),
            0x11 => Some(Register::Ch1LengthDuty),
            0x12 => Some(Register::Ch1Envelope),
            0x13 => Some(Register::Ch1FreqLo),
            0x14 => Some(Register::Ch1FreqHi),
            0x16 => Some(Register::Ch2LengthDuty),
            0x17 => Some(Register::Ch2Envelope),
            0x18 => Some(Register::Ch2FreqLo),
            0x19 => Some(Register::Ch2FreqHi),
            0x1A => Some(Register::Ch3Enable),
            0x1B => Some(Register::Ch3Length),
            0x1C => Some(Register::Ch3Level),
            0x1D => Some(Register::Ch3FreqLo),
            0x1E => Some(Register::Ch3FreqHi),
            0x20 => Some(Register::Ch4Length),
            0x21 => Some(Register::Ch4Envelope),
            0x22 => Some(Register::Ch4Polynomial),
            0x23 => Some(Register::Ch4Control),
            0x24 => Some(Register::MasterVolume),
            0x25 => Some(Register::Routing),
            0x26 => Some(Register::MasterEnable),
            0x30..=0x3F => Some(Register::WaveRam(addr - 0x30)),
            _ => None,
        }
    }

    /// Get the register offset
    pub fn addr(&self) -> u8 {
        match self {
            Register::Ch1Sweep => 0x10,
            Register::Ch1LengthDuty => 0x11,
            Register::Ch1Envelope => 0x12,
            Register::Ch1FreqLo => 0x13,
            Register::Ch1FreqHi => 0x14,
            Register::Ch2LengthDuty => 0x16,
            Register::Ch2Envelope => 0x17,
            Register::Ch2FreqLo => 0x18,
            Register::Ch2FreqHi => 0x19,
            Register::Ch3Enable => 0x1A,
            Register::Ch3Length => 0x1B,
            Register::Ch3Level => 0x1C,
            Register::Ch3FreqLo => 0x1D,
            Register::Ch3FreqHi => 0x1E,
            Register::Ch4Length => 0x20,
            Register::Ch4Envelope => 0x21,
            Register::Ch4Polynomial => 0x22,
            Register::Ch4Control => 0x23,
            Register::MasterVolume => 0x24,
            Register::Routing => 0x25,
            Register::MasterEnable => 0x26,
            Register::WaveRam(index) => 0x30 + (index & 0x0F),
        }
    }

    /// Channel index (0-3) a register belongs to, `None` for global registers
    pub fn channel(&self) -> Option<usize> {
        match self {
            Register::Ch1Sweep
            | Register::Ch1LengthDuty
            | Register::Ch1Envelope
            | Register::Ch1FreqLo
            | Register::Ch1FreqHi => Some(0),
            Register::Ch2LengthDuty
            | Register::Ch2Envelope
            | Register::Ch2FreqLo
            | Register::Ch2FreqHi => Some(1),
            Register::Ch3Enable
            | Register::Ch3Length
            | Register::Ch3Level
            | Register::Ch3FreqLo
            | Register::Ch3FreqHi
            | Register::WaveRam(_) => Some(2),
            Register::Ch4Length
            | Register::Ch4Envelope
            | Register::Ch4Polynomial
            | Register::Ch4Control => Some(3),
            Register::MasterVolume | Register::Routing | Register::MasterEnable => None,
        }
    }

    /// Whether bit 7 of this register restarts its channel
    pub fn is_trigger(&self) -> bool {
        TRIGGER_REGISTERS.contains(&self.addr())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Ch1Sweep => write!(f, "NR10 (Channel 1 Sweep)"),
            Register::Ch1LengthDuty => write!(f, "NR11 (Channel 1 Length/Duty)"),
            Register::Ch1Envelope => write!(f, "NR12 (Channel 1 Envelope)"),
            Register::Ch1FreqLo => write!(f, "NR13 (Channel 1 Frequency Low)"),
            Register::Ch1FreqHi => write!(f, "NR14 (Channel 1 Frequency High)"),
            Register::Ch2LengthDuty => write!(f, "NR21 (Channel 2 Length/Duty)"),
            Register::Ch2Envelope => write!(f, "NR22 (Channel 2 Envelope)"),
            Register::Ch2FreqLo => write!(f, "NR23 (Channel 2 Frequency Low)"),
            Register::Ch2FreqHi => write!(f, "NR24 (Channel 2 Frequency High)"),
            Register::Ch3Enable => write!(f, "NR30 (Channel 3 DAC Enable)"),
            Register::Ch3Length => write!(f, "NR31 (Channel 3 Length)"),
            Register::Ch3Level => write!(f, "NR32 (Channel 3 Output Level)"),
            Register::Ch3FreqLo => write!(f, "NR33 (Channel 3 Frequency Low)"),
            Register::Ch3FreqHi => write!(f, "NR34 (Channel 3 Frequency High)"),
            Register::Ch4Length => write!(f, "NR41 (Channel 4 Length)"),
            Register::Ch4Envelope => write!(f, "NR42 (Channel 4 Envelope)"),
            Register::Ch4Polynomial => write!(f, "NR43 (Channel 4 Polynomial Counter)"),
            Register::Ch4Control => write!(f, "NR44 (Channel 4 Control)"),
            Register::MasterVolume => write!(f, "NR50 (Master Volume)"),
            Register::Routing => write!(f, "NR51 (Output Routing)"),
            Register::MasterEnable => write!(f, "NR52 (Master Enable)"),
            Register::WaveRam(index) => write!(f, "Wave RAM byte {}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conversion() {
        assert_eq!(Register::from_addr(0x10), Some(Register::Ch1Sweep));
        assert_eq!(Register::from_addr(0x23), Some(Register::Ch4Control));
        assert_eq!(Register::from_addr(0x3F), Some(Register::WaveRam(15)));
    }

    #[test]
    fn test_unmapped_addresses() {
        for addr in [0x00, 0x0F, 0x15, 0x1F, 0x27, 0x2F, 0x40, 0xFF] {
            assert_eq!(Register::from_addr(addr), None, "0x{addr:02X} should be unmapped");
        }
    }

    #[test]
    fn test_addr_matches_decode_for_whole_range() {
        for addr in 0x10..=0x3F {
            if let Some(reg) = Register::from_addr(addr) {
                assert_eq!(reg.addr(), addr, "{reg}");
            }
        }
    }

    #[test]
    fn test_trigger_registers() {
        let triggers: Vec<u8> = (0x10..=0x3F)
            .filter_map(Register::from_addr)
            .filter(Register::is_trigger)
            .map(|reg| reg.addr())
            .collect();
        assert_eq!(triggers, TRIGGER_REGISTERS);
    }

    #[test]
    fn test_channel_ownership() {
        assert_eq!(Register::Ch1Sweep.channel(), Some(0));
        assert_eq!(Register::Ch2FreqHi.channel(), Some(1));
        assert_eq!(Register::WaveRam(3).channel(), Some(2));
        assert_eq!(Register::Ch4Polynomial.channel(), Some(3));
        assert_eq!(Register::Routing.channel(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Register::Ch1Sweep.to_string(), "NR10 (Channel 1 Sweep)");
        assert_eq!(Register::WaveRam(2).to_string(), "Wave RAM byte 2");
    }
}
