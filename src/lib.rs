//! Game Boy sound register engine for a two-core host
//!
//! Emulates the register side of the four-channel Game Boy sound generator
//! (swept square, square, wave, noise) and hands every parameter change to a
//! second, independent rendering core that owns actual synthesis.
//!
//! # Features
//! - Bit-exact decoding of the `0xFF10..=0xFF3F` register range
//! - Sweep, envelope and length units advanced by elapsed CPU cycles
//! - Next-event scheduling so idle channels cost nothing
//! - Wave RAM to signed PCM conversion on every write
//! - Lock-free shared parameter block with single-writer fields
//! - Bounded message queue with backpressure (drop, never block)
//! - Optional cycle-accurate handshake with a bounded wait
//!
//! # Quick start
//! ```
//! use gbsound::{EngineConfig, RegisterFile, SoundEngine};
//!
//! let (mut engine, port) = SoundEngine::new(EngineConfig::default()).unwrap();
//! let mut io = RegisterFile::new();
//! io.write(0x26, 0x80); // Master enable
//! engine.init(&mut io);
//! let _ = port.drain();
//!
//! io.write(0x12, 0xF0); // Channel 1 volume 15, no envelope
//! engine.write_register(&mut io, 0x12, 0xF0);
//! io.write(0x14, 0x80); // Trigger channel 1
//! engine.write_register(&mut io, 0x14, 0x80);
//!
//! engine.advance(&mut io, 1024);
//! let snapshot = port.snapshot();
//! assert!(snapshot.channels[0].on);
//! assert_eq!(snapshot.channels[0].volume, 15);
//! ```

#![warn(missing_docs)]

pub mod apu; // Channel state, register decoding, timing, wave PCM
pub mod config;
pub mod constants;
pub mod engine; // Lifecycle and glue
pub mod host; // CPU-side collaborator interface
pub mod shared; // Cross-core parameter block
pub mod sync; // Messages, queue, handshake, consumer port

/// Error types for sound engine construction
///
/// Runtime anomalies (queue overflow, desynchronization) never surface as
/// errors; they degrade to dropped or immediately delivered messages.
#[derive(thiserror::Error, Debug)]
pub enum GbSoundError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Configuration text could not be parsed
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, GbSoundError>;

// Public API exports
pub use apu::{ChannelMask, Register};
pub use config::EngineConfig;
pub use engine::SoundEngine;
pub use host::{RegisterFile, SoundHost};
pub use shared::{SharedSnapshot, SharedState};
pub use sync::{Command, Message, RenderPort, SyncStats, Target};
