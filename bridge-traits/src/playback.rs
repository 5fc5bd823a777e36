//! Sample-pool bridge trait and supporting identity types.
//!
//! The host platform owns the actual decode and output engine. The core only
//! sees it through [`SoundPoolBackend`]: a decode request returns a
//! [`BufferId`] immediately and the decoded buffer is announced later, from
//! whatever execution context the platform uses, through a [`DecodeNotifier`].

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Identity of a playable resource (typically a resolved URL or path).
///
/// Equality is by content; two handles pointing at the same identity share
/// one decoded buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceIdentity(String);

impl SourceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identifier of a decoded buffer, assigned by the platform when a
/// decode is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Opaque identifier of an in-progress playback instance of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Result of an asynchronous decode, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The buffer is decoded and ready to play.
    Loaded(BufferId),
    /// The platform gave up on the buffer.
    Failed { buffer: BufferId, reason: String },
}

impl DecodeOutcome {
    pub fn buffer(&self) -> BufferId {
        match self {
            DecodeOutcome::Loaded(buffer) => *buffer,
            DecodeOutcome::Failed { buffer, .. } => *buffer,
        }
    }
}

/// Callback handle a backend uses to announce decode completion.
///
/// Notifications are queued as messages and processed by the completion
/// dispatcher, so calling [`loaded`](Self::loaded) from inside
/// [`SoundPoolBackend::request_decode`] or from a platform thread is safe.
#[derive(Debug, Clone)]
pub struct DecodeNotifier {
    sender: mpsc::UnboundedSender<DecodeOutcome>,
}

impl DecodeNotifier {
    pub fn new(sender: mpsc::UnboundedSender<DecodeOutcome>) -> Self {
        Self { sender }
    }

    /// Create a notifier together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DecodeOutcome>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Report a successful decode. Returns `false` once the receiver is gone.
    pub fn loaded(&self, buffer: BufferId) -> bool {
        self.sender.send(DecodeOutcome::Loaded(buffer)).is_ok()
    }

    /// Report a failed decode. Returns `false` once the receiver is gone.
    pub fn failed(&self, buffer: BufferId, reason: impl Into<String>) -> bool {
        self.sender
            .send(DecodeOutcome::Failed {
                buffer,
                reason: reason.into(),
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Platform decode/output service backing the shared-buffer cache.
///
/// All methods are non-blocking: they are invoked while the cache's lock is
/// held, and a decode request must return before the decode finishes.
///
/// Implementations must report every successful decode exactly once through
/// the notifier passed to [`request_decode`](Self::request_decode). Reporting
/// failures is optional; a buffer that is never reported simply never
/// prepares its players.
pub trait SoundPoolBackend: PlatformSendSync {
    /// Start decoding `source` and return the id the completion will carry.
    fn request_decode(&self, source: &SourceIdentity, notifier: DecodeNotifier)
        -> Result<BufferId>;

    /// Start a new playback instance of a decoded buffer.
    fn play(&self, buffer: BufferId, volume: f32, rate: f32, looping: bool) -> Result<StreamId>;

    /// Resume a paused stream.
    fn resume(&self, stream: StreamId) -> Result<()>;

    /// Pause a stream without discarding it.
    fn pause(&self, stream: StreamId) -> Result<()>;

    /// Stop a stream; the id is invalid afterwards.
    fn stop(&self, stream: StreamId) -> Result<()>;

    /// Set the volume of a live stream, normalized to `0.0..=1.0`.
    fn set_volume(&self, stream: StreamId, volume: f32) -> Result<()>;

    /// Set the playback rate of a live stream.
    fn set_rate(&self, stream: StreamId, rate: f32) -> Result<()>;

    /// Toggle looping of a live stream.
    fn set_loop(&self, stream: StreamId, looping: bool) -> Result<()>;

    /// Release a decoded buffer.
    fn unload(&self, buffer: BufferId) -> Result<()>;
}
