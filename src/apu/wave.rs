//! Wave RAM to PCM conversion
//!
//! Wave RAM holds 32 4-bit samples. Each write converts the two nibbles of
//! the written byte into signed 8-bit PCM in the [`SampleBuffer`], which the
//! rendering core reads directly.

use crate::constants::{ANALOG_LEVELS, PCM_SCALE, SAMPLE_BUFFER_LEN};
use std::sync::atomic::{AtomicI8, Ordering};

/// 16-entry nibble to PCM lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveTable {
    levels: [i8; 16],
}

impl WaveTable {
    /// Build the table from the analog DAC levels
    pub fn new() -> Self {
        WaveTable {
            levels: ANALOG_LEVELS.map(|level| (level * PCM_SCALE) as i8),
        }
    }

    /// PCM value for a 4-bit sample (upper bits are ignored)
    #[inline]
    pub fn level(&self, nibble: u8) -> i8 {
        self.levels[(nibble & 0x0F) as usize]
    }
}

impl Default for WaveTable {
    fn default() -> Self {
        Self::new()
    }
}

/// PCM samples shared with the rendering core
///
/// Written only by the emulation core; each cell is an independent atomic so
/// the reader never needs a lock.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: [AtomicI8; SAMPLE_BUFFER_LEN],
}

impl SampleBuffer {
    /// Create a silent buffer
    pub fn new() -> Self {
        SampleBuffer {
            samples: std::array::from_fn(|_| AtomicI8::new(0)),
        }
    }

    /// Read one sample (index wraps at 32)
    #[inline]
    pub fn get(&self, index: usize) -> i8 {
        self.samples[index % SAMPLE_BUFFER_LEN].load(Ordering::Relaxed)
    }

    /// Overwrite one sample (index wraps at 32)
    #[inline]
    pub fn set(&self, index: usize, value: i8) {
        self.samples[index % SAMPLE_BUFFER_LEN].store(value, Ordering::Relaxed);
    }

    /// Copy of the whole buffer
    pub fn snapshot(&self) -> [i8; SAMPLE_BUFFER_LEN] {
        std::array::from_fn(|i| self.get(i))
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert wave RAM byte `index` (0-15) into samples `2*index` and `2*index+1`
#[inline]
pub fn convert_sample(table: &WaveTable, buffer: &SampleBuffer, index: usize, byte: u8) {
    buffer.set(index * 2, table.level(byte >> 4));
    buffer.set(index * 2 + 1, table.level(byte & 0x0F));
}
