//! # Shared Buffer Cache Module
//!
//! Decodes each distinct source once and shares the decoded buffer between
//! every player attached to that source.
//!
//! ## Overview
//!
//! - One [`CacheEntry`](manager::CacheEntry) per [`SourceIdentity`], holding
//!   the platform [`BufferId`] and the players referencing it in attach order
//! - The first attach issues the decode; later attaches reuse the buffer
//! - The last release unloads the buffer
//! - Pending decodes are tracked by buffer id so a completion can be matched
//!   to its entry, or recognized as orphaned
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     SharedBufferCache (one lock)       │
//! │  - acquire(player, source)             │
//! │  - release(player)                     │
//! │  entries: source -> CacheEntry         │
//! │  pending: buffer -> source             │
//! └────────┬──────────────────┬────────────┘
//!          │                  │
//!          │                  └──> LoadCompletionDispatcher (same lock)
//!          └──> SoundPoolBackend (request_decode / unload)
//! ```
//!
//! The entry's player list holds weak references: players are owned by
//! whoever created them, never by the cache.
//!
//! [`SourceIdentity`]: bridge_traits::SourceIdentity
//! [`BufferId`]: bridge_traits::BufferId

pub mod manager;
pub mod stats;

// Re-export commonly used types
pub use manager::SharedBufferCache;
pub use stats::CacheStats;
