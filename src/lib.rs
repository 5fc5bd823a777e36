//! Workspace umbrella crate.
//!
//! Re-exports the individual workspace crates so a host plugin layer can
//! depend on `soundpool-workspace` alone.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{PlaybackError, PlaybackHandle, PlayerState, SoundPool};
pub use core_runtime::config::PoolConfig;
