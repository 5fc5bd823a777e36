//! # Shared-Buffer Playback
//!
//! Plays many logical players from one decoded buffer per source.
//!
//! ## Overview
//!
//! - [`SharedBufferCache`] decodes each distinct source once and keeps the
//!   buffer alive while any player references it
//! - [`LoadCompletionDispatcher`] applies the platform's asynchronous decode
//!   notifications and starts players that asked to play early
//! - [`PlaybackHandle`] is one logical player
//! - [`SoundPool`] wires these to a host [`SoundPoolBackend`](bridge_traits::SoundPoolBackend)
//!   and the per-player event channels of [`core_runtime::EventBus`]
//!
//! ## Non-errors
//!
//! Some situations look like failures but are tolerated silently:
//! - releasing a player twice, or one that was never attached
//! - disposing the pool (and so closing its channels) twice
//! - a decode finishing after every player released it; the buffer is
//!   unloaded and nothing is emitted
//! - [`PlaybackHandle::duration`] and [`PlaybackHandle::current_position`]
//!   report `None` because the platform does not expose them
//!
//! A decode the platform never reports leaves its players `Loading`; callers
//! needing a timeout apply their own.
//!
//! ## Example
//!
//! ```ignore
//! use core_playback::SoundPool;
//! use core_runtime::config::PoolConfig;
//!
//! let pool = SoundPool::new(backend, PoolConfig::default())?;
//! let mut prepared = pool.events().prepared().subscribe_player("click".into());
//!
//! let player = pool.create_player_with_id("click");
//! player.set_source("sfx/click.wav")?;
//! player.start()?;
//! prepared.recv().await?; // playback has begun
//! ```

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod pool;

pub use cache::{CacheStats, SharedBufferCache};
pub use dispatcher::{DispatchOutcome, LoadCompletionDispatcher};
pub use error::{PlaybackError, Result};
pub use handle::{PlaybackHandle, PlayerState};
pub use pool::SoundPool;
