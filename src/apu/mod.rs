//! Sound Generator Domain
//!
//! Register-driven channel state of the four-channel sound generator:
//! register decoding, per-channel sweep/envelope/length units, and wave RAM
//! conversion.
//!
//! Implementation:
//! - `registers` - address decoding and bit layout
//! - `channel` - channel data model
//! - `dispatch` - register write side effects
//! - `timing` - cycle-driven sweep, envelope and length units
//! - `wave` - wave RAM to PCM conversion

// Internal modules
pub mod channel;
pub mod dispatch;
pub mod registers;
pub mod timing;
pub mod wave;

// Re-export public API
pub use channel::{
    tone_frequency, wave_frequency, Channel, ChannelMask, Direction, Envelope, NoiseClock, Sweep,
    CHANNEL_COUNT,
};
pub use registers::Register;
pub use timing::EventScheduler;
pub use wave::{convert_sample, SampleBuffer, WaveTable};
