//! Cross-Core Messaging
//!
//! Everything that moves between the emulation core and the rendering core
//! besides the shared parameter block.
//!
//! Implementation:
//! - `message` - command words and their `u32` encoding
//! - `queue` - bounded queue with admission control
//! - `handshake` - optional cycle-accurate delivery
//! - `port` - the rendering core's endpoint

pub mod handshake;
pub mod message;
pub mod port;
pub mod queue;

pub use handshake::{Bypass, Handshake};
pub use message::{Command, Message, Target};
pub use port::RenderPort;
pub use queue::{channel, MessageQueue, MessageReceiver, SendOutcome, SyncStats};
