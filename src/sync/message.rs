//! Message encoding
//!
//! Messages travel between cores as single `u32` words: the command lives in
//! bits 20-23, the target channel in bits 0-19 (`4` addresses every channel).

use crate::apu::CHANNEL_COUNT;
use std::fmt;

const COMMAND_SHIFT: u32 = 20;
const COMMAND_MASK: u32 = 0x0F;
const TARGET_MASK: u32 = (1 << COMMAND_SHIFT) - 1;
const TARGET_ALL: u32 = CHANNEL_COUNT as u32;

/// What the rendering core should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Restart a channel from its committed parameters
    Start = 0,
    /// Re-read committed parameters of a channel (or all)
    Update = 1,
    /// Re-read the committed volume of a channel
    Volume = 2,
    /// Re-read NR50/NR51
    MasterVolume = 3,
    /// Silence the output
    Mute = 4,
    /// Resume the output
    Unmute = 5,
}

impl Command {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Command::Start),
            1 => Some(Command::Update),
            2 => Some(Command::Volume),
            3 => Some(Command::MasterVolume),
            4 => Some(Command::Mute),
            5 => Some(Command::Unmute),
            _ => None,
        }
    }
}

/// Channel a message applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Single channel (0-3)
    Channel(u8),
    /// Every channel
    All,
}

/// One state-change notification for the rendering core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message {
    /// Command kind
    pub command: Command,
    /// Addressed channel
    pub target: Target,
}

impl Message {
    fn channel(command: Command, index: usize) -> Self {
        debug_assert!(index < CHANNEL_COUNT, "channel index {index} out of range");
        Message {
            command,
            target: Target::Channel(index as u8),
        }
    }

    fn global(command: Command) -> Self {
        Message {
            command,
            target: Target::All,
        }
    }

    /// Channel (re)started
    pub fn start(index: usize) -> Self {
        Self::channel(Command::Start, index)
    }

    /// Channel parameters changed
    pub fn update(index: usize) -> Self {
        Self::channel(Command::Update, index)
    }

    /// Parameters of several channels changed
    pub fn update_all() -> Self {
        Self::global(Command::Update)
    }

    /// Channel volume changed
    pub fn volume(index: usize) -> Self {
        Self::channel(Command::Volume, index)
    }

    /// NR50/NR51 changed
    pub fn master_volume() -> Self {
        Self::global(Command::MasterVolume)
    }

    /// Silence the output
    pub fn mute() -> Self {
        Self::global(Command::Mute)
    }

    /// Resume the output
    pub fn unmute() -> Self {
        Self::global(Command::Unmute)
    }

    /// Wire encoding
    pub fn encode(&self) -> u32 {
        let target = match self.target {
            Target::Channel(index) => u32::from(index),
            Target::All => TARGET_ALL,
        };
        ((self.command as u32) << COMMAND_SHIFT) | target
    }

    /// Decode a wire word, `None` for unknown commands or targets
    pub fn decode(raw: u32) -> Option<Self> {
        let command = Command::from_bits((raw >> COMMAND_SHIFT) & COMMAND_MASK)?;
        if raw >> COMMAND_SHIFT > COMMAND_MASK {
            return None;
        }
        let target = match raw & TARGET_MASK {
            index if index < TARGET_ALL => Target::Channel(index as u8),
            TARGET_ALL => Target::All,
            _ => return None,
        };
        Some(Message { command, target })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Target::Channel(index) => write!(f, "{:?}(ch{})", self.command, index + 1),
            Target::All => write!(f, "{:?}(all)", self.command),
        }
    }
}
