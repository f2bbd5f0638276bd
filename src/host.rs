//! CPU-side collaborator interface
//!
//! The sound engine does not own register storage or the cycle counter; the
//! CPU/memory emulator does. This module defines what the engine needs from
//! it and provides [`RegisterFile`], a plain implementation used by tests and
//! simple embedders.

use crate::apu::ChannelMask;
use crate::constants::REGISTER_LAST;

/// Register used to report channel status back to the CPU (NR52)
const NR52: usize = 0x26;

/// Services the CPU emulator provides to the sound engine
///
/// # Example
///
/// ```
/// use gbsound::{ChannelMask, RegisterFile, SoundHost};
///
/// let mut io = RegisterFile::new();
/// io.write(0x26, 0x83);
/// io.clear_sound_channel(ChannelMask::CH1);
/// assert_eq!(io.read_io(0x26), 0x82);
/// ```
pub trait SoundHost {
    /// Read the current value of an I/O register (offset from `0xFF00`)
    ///
    /// The engine reads back registers it was not handed directly, e.g. the
    /// envelope register on a trigger or every register during a resync.
    fn read_io(&self, addr: u8) -> u8;

    /// A channel stopped on its own (length expiry or sweep overflow)
    ///
    /// Implementations usually clear the channel's status bit in NR52.
    fn clear_sound_channel(&mut self, channel: ChannelMask);

    /// CPU cycles elapsed since the start of the current frame
    fn cycles_since_vblank(&self) -> i32;

    /// Whether the CPU runs in double-speed mode
    fn is_double_speed(&self) -> bool {
        false
    }
}

impl<H: SoundHost + ?Sized> SoundHost for &mut H {
    fn read_io(&self, addr: u8) -> u8 {
        (**self).read_io(addr)
    }

    fn clear_sound_channel(&mut self, channel: ChannelMask) {
        (**self).clear_sound_channel(channel)
    }

    fn cycles_since_vblank(&self) -> i32 {
        (**self).cycles_since_vblank()
    }

    fn is_double_speed(&self) -> bool {
        (**self).is_double_speed()
    }
}

/// Raw I/O register file (offsets `0x00..=0x3F`) plus frame timing
#[derive(Debug, Clone)]
pub struct RegisterFile {
    /// Register values by offset
    registers: [u8; REGISTER_LAST as usize + 1],
    /// Cycles elapsed since the last VBlank
    pub cycles_since_vblank: i32,
    /// Double-speed mode flag
    pub double_speed: bool,
}

impl RegisterFile {
    /// Create a register file with all values set to 0
    pub fn new() -> Self {
        RegisterFile {
            registers: [0; REGISTER_LAST as usize + 1],
            cycles_since_vblank: 0,
            double_speed: false,
        }
    }

    /// Read a register value (offsets above `0x3F` read as `0xFF`)
    pub fn read(&self, addr: u8) -> u8 {
        self.registers.get(addr as usize).copied().unwrap_or(0xFF)
    }

    /// Write a register value (offsets above `0x3F` are ignored)
    pub fn write(&mut self, addr: u8, value: u8) {
        if let Some(slot) = self.registers.get_mut(addr as usize) {
            *slot = value;
        }
    }

    /// Get all registers as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.registers
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundHost for RegisterFile {
    fn read_io(&self, addr: u8) -> u8 {
        self.read(addr)
    }

    fn clear_sound_channel(&mut self, channel: ChannelMask) {
        self.registers[NR52] &= !channel.bits();
    }

    fn cycles_since_vblank(&self) -> i32 {
        self.cycles_since_vblank
    }

    fn is_double_speed(&self) -> bool {
        self.double_speed
    }
}
