//! Sound pool façade.
//!
//! Wires a host-provided [`SoundPoolBackend`] into the shared-buffer cache,
//! the completion dispatcher and the event bus, and hands out players.

use crate::cache::{CacheStats, SharedBufferCache};
use crate::dispatcher::LoadCompletionDispatcher;
use crate::error::Result;
use crate::handle::{HandleCore, PlaybackHandle};
use bridge_traits::{DecodeNotifier, LogEntry, LogLevel, SoundPoolBackend, SourceIdentity};
use core_runtime::config::PoolConfig;
use core_runtime::{Error, EventBus, PlayerId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const LOG_TARGET: &str = "core_playback::pool";

/// Primary façade exposed to the host plugin layer.
pub struct SoundPool {
    config: Arc<PoolConfig>,
    backend: Arc<dyn SoundPoolBackend>,
    events: Arc<EventBus>,
    cache: Arc<SharedBufferCache>,
    dispatcher: Arc<LoadCompletionDispatcher>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl SoundPool {
    /// Create a pool on top of `backend`.
    ///
    /// Must be called from within a tokio runtime: the completion dispatcher
    /// runs as a task on it.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Runtime`](crate::PlaybackError::Runtime) if the
    /// configuration is invalid or no runtime is available.
    pub fn new(backend: Arc<dyn SoundPoolBackend>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|err| Error::Internal(format!("sound pool requires a tokio runtime: {err}")))?;

        let config = Arc::new(config);
        let events = Arc::new(EventBus::new());
        let (notifier, receiver) = DecodeNotifier::channel();
        let cache = Arc::new(SharedBufferCache::new(Arc::clone(&backend), notifier));
        let dispatcher = Arc::new(LoadCompletionDispatcher::new(
            Arc::clone(&cache),
            Arc::clone(&events),
        ));
        let dispatch_task = runtime.spawn(Arc::clone(&dispatcher).run(receiver));

        info!(max_streams = config.max_streams, "Sound pool created");

        Ok(Self {
            config,
            backend,
            events,
            cache,
            dispatcher,
            dispatch_task: Mutex::new(Some(dispatch_task)),
        })
    }

    /// Create a player with a generated id.
    pub fn create_player(&self) -> PlaybackHandle {
        self.create_player_with_id(PlayerId::new())
    }

    /// Create a player under a caller-chosen id.
    pub fn create_player_with_id(&self, id: impl Into<PlayerId>) -> PlaybackHandle {
        let id = id.into();
        debug!(player_id = %id, "Player created");

        let core = HandleCore::new(
            id,
            Arc::clone(&self.backend),
            Arc::clone(&self.events),
            Arc::clone(&self.config),
        );
        PlaybackHandle::new(Arc::new(core), Arc::clone(&self.cache))
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SharedBufferCache> {
        &self.cache
    }

    /// Dispatcher applying decode notifications; hosts that deliver completions
    /// synchronously may call it directly.
    pub fn dispatcher(&self) -> &Arc<LoadCompletionDispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Emit `message` on the global log channel.
    ///
    /// Returns the number of subscribers reached.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<usize> {
        let entry = LogEntry::new(level, LOG_TARGET, message);
        Ok(self.events.emit_global_log(entry)?)
    }

    pub fn cached_sources(&self) -> Vec<SourceIdentity> {
        self.cache.sources()
    }

    pub fn reference_count(&self, source: impl Into<SourceIdentity>) -> usize {
        self.cache.reference_count(&source.into())
    }

    pub fn is_cached(&self, source: impl Into<SourceIdentity>) -> bool {
        self.cache.contains(&source.into())
    }

    /// Close every event channel and stop the dispatcher.
    ///
    /// Pending decodes that no player holds are unloaded here, since their
    /// completions will never be dispatched; players still loading unload
    /// their buffer when released. Returns `false` if the pool was already
    /// disposed. Players stay usable for release, but no further events are
    /// delivered.
    pub fn dispose(&self) -> bool {
        let task = self.dispatch_task.lock().take();
        let Some(task) = task else {
            return false;
        };

        task.abort();
        let reclaimed = self.cache.close();
        let closed = self.events.dispose();
        info!(closed, reclaimed, "Sound pool disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.dispatch_task.lock().is_none()
    }
}

impl Drop for SoundPool {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch_task.get_mut().take() {
            task.abort();
            self.cache.close();
        }
    }
}

impl fmt::Debug for SoundPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundPool")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
