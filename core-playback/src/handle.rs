//! # Playback Handle
//!
//! One logical player. A handle holds the caller's playback intent (volume,
//! rate, looping, playing) and, once its source is decoded, the shared buffer
//! and the stream playing it.
//!
//! ## State machine
//!
//! ```text
//! Idle ──set_source──> Loading ──decoded──> Ready ──start──> Playing <──> Paused
//!  ^                      │                   │                 │           │
//!  └──────────────────────┴──── release ──────┴─────────────────┴───────────┘
//! ```
//!
//! `start()` while `Loading` only records intent; the completion dispatcher
//! starts the stream once the buffer is ready.

use crate::cache::SharedBufferCache;
use crate::error::{PlaybackError, Result};
use bridge_traits::{BufferId, LogEntry, LogLevel, SoundPoolBackend, SourceIdentity, StreamId};
use core_runtime::config::PoolConfig;
use core_runtime::{EventBus, PlayerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "core_playback::handle";

/// Observable lifecycle state of a [`PlaybackHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// No source attached.
    Idle,
    /// Source attached, decode pending.
    Loading,
    /// Buffer decoded, no stream.
    Ready,
    /// Stream running.
    Playing,
    /// Stream paused, resumable.
    Paused,
}

#[derive(Debug)]
pub(crate) struct HandleState {
    source: Option<SourceIdentity>,
    buffer: Option<BufferId>,
    stream: Option<StreamId>,
    prepared: bool,
    desired_playing: bool,
    volume: f32,
    rate: f32,
    looping: bool,
}

impl HandleState {
    fn state(&self) -> PlayerState {
        match (&self.source, self.buffer, self.stream) {
            (None, _, _) => PlayerState::Idle,
            (Some(_), None, _) => PlayerState::Loading,
            (Some(_), Some(_), None) => PlayerState::Ready,
            (Some(_), Some(_), Some(_)) if self.desired_playing => PlayerState::Playing,
            (Some(_), Some(_), Some(_)) => PlayerState::Paused,
        }
    }
}

/// Shared inner state of a handle.
///
/// The cache entry references this weakly; the [`PlaybackHandle`] owns it.
pub(crate) struct HandleCore {
    id: PlayerId,
    state: Mutex<HandleState>,
    backend: Arc<dyn SoundPoolBackend>,
    events: Arc<EventBus>,
    config: Arc<PoolConfig>,
}

impl HandleCore {
    pub(crate) fn new(
        id: PlayerId,
        backend: Arc<dyn SoundPoolBackend>,
        events: Arc<EventBus>,
        config: Arc<PoolConfig>,
    ) -> Self {
        let state = HandleState {
            source: None,
            buffer: None,
            stream: None,
            prepared: false,
            desired_playing: false,
            volume: config.default_volume,
            rate: config.default_rate,
            looping: false,
        };

        Self {
            id,
            state: Mutex::new(state),
            backend,
            events,
            config,
        }
    }

    pub(crate) fn id(&self) -> &PlayerId {
        &self.id
    }

    pub(crate) fn source(&self) -> Option<SourceIdentity> {
        self.state.lock().source.clone()
    }

    /// Record the new source. The handle is `Loading` until [`on_prepared`](Self::on_prepared).
    pub(crate) fn attach(&self, source: SourceIdentity) {
        let mut state = self.state.lock();
        state.source = Some(source);
        state.buffer = None;
        state.stream = None;
        state.prepared = false;
        drop(state);

        self.publish_log(LogLevel::Debug, "source attached");
    }

    /// Mark the handle prepared on `buffer` and start it if play was requested.
    ///
    /// The `prepared` event is emitted once the start attempt has settled.
    /// Returns `true` if a stream was started.
    pub(crate) fn on_prepared(&self, buffer: BufferId) -> Result<bool> {
        let mut state = self.state.lock();
        state.prepared = true;
        state.buffer = Some(buffer);

        let started = if state.desired_playing && state.stream.is_none() {
            match self
                .backend
                .play(buffer, state.volume, state.rate, state.looping)
            {
                Ok(stream) => {
                    state.stream = Some(stream);
                    Ok(Some(stream))
                }
                Err(err) => {
                    state.desired_playing = false;
                    Err(err)
                }
            }
        } else {
            Ok(None)
        };
        drop(state);

        self.events.emit_prepared(&self.id, true).ok();

        match started {
            Ok(Some(stream)) => {
                info!(player_id = %self.id, %stream, "Deferred start");
                self.publish_log(LogLevel::Info, "playback started after decode");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                self.publish_log(LogLevel::Error, format!("deferred start failed: {err}"));
                Err(err.into())
            }
        }
    }

    /// Stop any stream and drop every buffer/stream reference.
    ///
    /// Returns the source the handle was attached to, or `None` if it was
    /// already idle.
    pub(crate) fn detach(&self) -> Option<SourceIdentity> {
        let mut state = self.state.lock();
        let source = state.source.take()?;

        if let Some(stream) = state.stream.take() {
            if let Err(err) = self.backend.stop(stream) {
                warn!(player_id = %self.id, %stream, error = %err, "Failed to stop stream on release");
            }
        }
        state.buffer = None;
        state.prepared = false;
        state.desired_playing = false;
        drop(state);

        self.publish_log(LogLevel::Debug, "released");
        Some(source)
    }

    /// Mirror a lifecycle message onto this player's `log` channel.
    pub(crate) fn publish_log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.config.emit_player_logs {
            return;
        }

        let entry = LogEntry::new(level, LOG_TARGET, message).with_field("player_id", self.id.as_str());
        self.events.emit_log(&self.id, entry).ok();
    }
}

impl fmt::Debug for HandleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCore")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// A logical player backed by the shared-buffer cache.
///
/// Created by [`SoundPool::create_player`](crate::SoundPool::create_player).
/// Dropping the handle releases its buffer reference.
///
/// # Example
///
/// ```ignore
/// let player = pool.create_player();
/// player.set_source("sfx/click.wav")?;
/// player.start()?; // deferred until the decode completes
/// ```
pub struct PlaybackHandle {
    core: Arc<HandleCore>,
    cache: Arc<SharedBufferCache>,
}

impl PlaybackHandle {
    pub(crate) fn new(core: Arc<HandleCore>, cache: Arc<SharedBufferCache>) -> Self {
        Self { core, cache }
    }

    pub fn id(&self) -> &PlayerId {
        self.core.id()
    }

    /// Attach this player to `source`.
    ///
    /// Shares an existing buffer when another player already uses the same
    /// source; otherwise a decode is requested. A previous source is released
    /// first, which also clears any pending play intent.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Backend`] if the decode request is rejected.
    pub fn set_source(&self, source: impl Into<SourceIdentity>) -> Result<()> {
        self.cache.acquire(&self.core, source.into())
    }

    /// Start or resume playback.
    ///
    /// Before the buffer is decoded this only records intent.
    pub fn start(&self) -> Result<()> {
        let mut state = self.core.state.lock();
        state.desired_playing = true;

        if let Some(stream) = state.stream {
            self.core.backend.resume(stream)?;
            debug!(player_id = %self.core.id, %stream, "Resumed");
            return Ok(());
        }

        let Some(buffer) = state.buffer else {
            debug!(player_id = %self.core.id, "Start deferred until decode completes");
            return Ok(());
        };

        let stream = match self
            .core
            .backend
            .play(buffer, state.volume, state.rate, state.looping)
        {
            Ok(stream) => stream,
            Err(err) => {
                state.desired_playing = false;
                return Err(err.into());
            }
        };
        state.stream = Some(stream);
        drop(state);

        info!(player_id = %self.core.id, %buffer, %stream, "Playback started");
        self.core.publish_log(LogLevel::Info, "playback started");
        Ok(())
    }

    /// Stop playback and forget any pending play intent.
    ///
    /// If the platform refuses to stop, the player keeps its stream and intent.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.core.state.lock();

        let Some(stream) = state.stream else {
            state.desired_playing = false;
            return Ok(());
        };

        self.core.backend.stop(stream)?;
        state.stream = None;
        state.desired_playing = false;
        drop(state);

        debug!(player_id = %self.core.id, %stream, "Stopped");
        self.core.publish_log(LogLevel::Info, "playback stopped");
        Ok(())
    }

    /// Pause playback, keeping the stream for [`start`](Self::start).
    pub fn pause(&self) -> Result<()> {
        let mut state = self.core.state.lock();

        if let Some(stream) = state.stream {
            self.core.backend.pause(stream)?;
            debug!(player_id = %self.core.id, %stream, "Paused");
        }
        state.desired_playing = false;
        Ok(())
    }

    /// Seek to `position`.
    ///
    /// Only zero is supported: the stream is stopped and, if the player was
    /// meant to be playing, started again from the beginning. `seekComplete`
    /// is emitted afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::UnsupportedOperation`] for any nonzero
    /// position, leaving playback untouched. A platform stop failure is
    /// returned as [`PlaybackError::Backend`] with the current stream kept.
    pub fn seek_to(&self, position: Duration) -> Result<()> {
        if !position.is_zero() {
            return Err(PlaybackError::UnsupportedOperation(format!(
                "seek to {}ms is not supported by shared-buffer playback",
                position.as_millis()
            )));
        }

        let mut state = self.core.state.lock();
        let resume = state.desired_playing;

        if let Some(stream) = state.stream {
            self.core.backend.stop(stream)?;
            state.stream = None;
        }

        if resume {
            if let Some(buffer) = state.buffer {
                match self
                    .core
                    .backend
                    .play(buffer, state.volume, state.rate, state.looping)
                {
                    Ok(stream) => state.stream = Some(stream),
                    Err(err) => {
                        state.desired_playing = false;
                        return Err(err.into());
                    }
                }
            }
        }
        drop(state);

        debug!(player_id = %self.core.id, resume, "Seeked to start");
        self.core.events.emit_seek_complete(&self.core.id).ok();
        Ok(())
    }

    /// Set the volume, normalized to `0.0..=1.0`.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }

        let mut state = self.core.state.lock();
        if let Some(stream) = state.stream {
            self.core.backend.set_volume(stream, volume)?;
        }
        state.volume = volume;
        Ok(())
    }

    /// Set the playback rate within the pool's configured range.
    pub fn set_rate(&self, rate: f32) -> Result<()> {
        let config = &self.core.config;
        if !config.accepts_rate(rate) {
            return Err(PlaybackError::InvalidRate {
                rate,
                min: config.min_rate,
                max: config.max_rate,
            });
        }

        let mut state = self.core.state.lock();
        if let Some(stream) = state.stream {
            self.core.backend.set_rate(stream, rate)?;
        }
        state.rate = rate;
        Ok(())
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        let mut state = self.core.state.lock();
        if let Some(stream) = state.stream {
            self.core.backend.set_loop(stream, looping)?;
        }
        state.looping = looping;
        Ok(())
    }

    /// Detach from the shared buffer and return to [`PlayerState::Idle`].
    ///
    /// Safe to call any number of times.
    pub fn release(&self) {
        self.cache.release(&self.core);
    }

    /// Always `None`: shared-buffer playback does not expose a duration.
    pub fn duration(&self) -> Option<Duration> {
        None
    }

    /// Always `None`: shared-buffer playback does not expose a position.
    pub fn current_position(&self) -> Option<Duration> {
        None
    }

    pub fn state(&self) -> PlayerState {
        self.core.state.lock().state()
    }

    pub fn is_prepared(&self) -> bool {
        self.core.state.lock().prepared
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    /// Whether playback was requested and not since stopped or paused.
    pub fn wants_playback(&self) -> bool {
        self.core.state.lock().desired_playing
    }

    pub fn source(&self) -> Option<SourceIdentity> {
        self.core.source()
    }

    pub fn volume(&self) -> f32 {
        self.core.state.lock().volume
    }

    pub fn rate(&self) -> f32 {
        self.core.state.lock().rate
    }

    pub fn is_looping(&self) -> bool {
        self.core.state.lock().looping
    }

    pub fn buffer_id(&self) -> Option<BufferId> {
        self.core.state.lock().buffer
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.core.state.lock().stream
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.cache.release(&self.core);
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("id", self.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(source: bool, buffer: bool, stream: bool, desired: bool) -> HandleState {
        HandleState {
            source: source.then(|| SourceIdentity::new("a.wav")),
            buffer: buffer.then_some(BufferId(1)),
            stream: stream.then_some(StreamId(1)),
            prepared: buffer,
            desired_playing: desired,
            volume: 1.0,
            rate: 1.0,
            looping: false,
        }
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(state(false, false, false, true).state(), PlayerState::Idle);
        assert_eq!(state(true, false, false, true).state(), PlayerState::Loading);
        assert_eq!(state(true, true, false, false).state(), PlayerState::Ready);
        assert_eq!(state(true, true, true, true).state(), PlayerState::Playing);
        assert_eq!(state(true, true, true, false).state(), PlayerState::Paused);
    }
}
