//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the sound pool core and the
//! platform audio engine. The core never decodes or mixes audio itself; it
//! asks the platform to decode a source into a buffer and to start, pause,
//! resume and stop streams of that buffer.
//!
//! ## Traits
//!
//! - [`SoundPoolBackend`](playback::SoundPoolBackend) - Decode/output service
//!   (Android `SoundPool`, a desktop mixer, a test fake)
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific failures to `BridgeError`
//! with an actionable message.
//!
//! ## Thread Safety
//!
//! Decode completions arrive on an arbitrary execution context, so on native
//! targets every bridge trait requires `Send + Sync` (see
//! [`PlatformSendSync`](platform::PlatformSendSync)).

pub mod error;
pub mod logging;
pub mod platform;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    BufferId, DecodeNotifier, DecodeOutcome, SoundPoolBackend, SourceIdentity, StreamId,
};
