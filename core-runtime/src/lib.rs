//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sound pool core:
//! - Logging and tracing infrastructure
//! - Pool configuration
//! - Per-player and global event channels
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback crate depends on.
//! It establishes the logging conventions and the multicast event channels
//! through which players report seek completion, completion, duration,
//! position, preparation and log entries.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, EventChannel, EventStream, PlayerEvent, PlayerId};
