//! # Load Completion Dispatcher
//!
//! Applies the platform's asynchronous decode notifications to the cache.
//!
//! Notifications arrive as [`DecodeOutcome`] messages on the queue behind
//! [`DecodeNotifier`](bridge_traits::DecodeNotifier), from whatever thread the
//! platform decodes on. [`LoadCompletionDispatcher::run`] drains that queue and
//! handles each message under the cache lock, so the player list it walks
//! cannot change underneath it.

use crate::cache::SharedBufferCache;
use bridge_traits::{BufferId, DecodeOutcome, LogEntry, LogLevel};
use core_runtime::EventBus;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "core_playback::dispatcher";

/// What a single notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The entry was marked prepared; `started` of its `players` began playback.
    Prepared { players: usize, started: usize },
    /// Every player let go before the decode finished; the buffer was unloaded.
    Orphaned,
    /// The decode failed; `players` were detached and the buffer unloaded.
    Failed { players: usize },
    /// The buffer id was never requested through this cache.
    Unknown,
}

/// Routes decode notifications into the shared-buffer cache.
#[derive(Debug)]
pub struct LoadCompletionDispatcher {
    cache: Arc<SharedBufferCache>,
    events: Arc<EventBus>,
}

impl LoadCompletionDispatcher {
    pub fn new(cache: Arc<SharedBufferCache>, events: Arc<EventBus>) -> Self {
        Self { cache, events }
    }

    pub fn dispatch(&self, outcome: DecodeOutcome) -> DispatchOutcome {
        match outcome {
            DecodeOutcome::Loaded(buffer) => self.on_decode_complete(buffer),
            DecodeOutcome::Failed { buffer, reason } => self.on_decode_failed(buffer, &reason),
        }
    }

    /// Mark every player sharing `buffer` prepared and start those waiting to play.
    #[instrument(skip(self))]
    pub fn on_decode_complete(&self, buffer: BufferId) -> DispatchOutcome {
        let mut state = self.cache.lock();

        let Some(source) = state.pending.remove(&buffer) else {
            warn!("Completion for unknown buffer ignored");
            return DispatchOutcome::Unknown;
        };

        let live = state
            .entries
            .get(&source)
            .is_some_and(|entry| entry.buffer == buffer);

        if !live {
            // Entry released before completion, possibly replaced by a newer decode.
            state.orphaned_completions += 1;
            state.unload(self.cache.backend(), buffer);
            debug!(%source, "Orphaned completion; buffer unloaded");
            return DispatchOutcome::Orphaned;
        }

        let handles = match state.entries.get_mut(&source) {
            Some(entry) => {
                entry.prepared = true;
                entry.live_handles()
            }
            None => Vec::new(),
        };

        let mut started = 0;
        for handle in &handles {
            match handle.on_prepared(buffer) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(player_id = %handle.id(), error = %err, "Deferred start failed");
                }
            }
        }

        info!(%source, players = handles.len(), started, "Buffer prepared");
        DispatchOutcome::Prepared {
            players: handles.len(),
            started,
        }
    }

    /// Drop the entry behind a failed decode and return its players to idle.
    #[instrument(skip(self))]
    pub fn on_decode_failed(&self, buffer: BufferId, reason: &str) -> DispatchOutcome {
        let mut state = self.cache.lock();

        let Some(source) = state.pending.remove(&buffer) else {
            warn!("Failure for unknown buffer ignored");
            return DispatchOutcome::Unknown;
        };

        state.failed_decodes += 1;
        let mut handles = Vec::new();
        if state
            .entries
            .get(&source)
            .is_some_and(|entry| entry.buffer == buffer)
        {
            if let Some(mut entry) = state.entries.remove(&source) {
                handles = entry.live_handles();
            }
        }
        state.unload(self.cache.backend(), buffer);

        let message = format!("decode of {source} failed: {reason}");
        for handle in &handles {
            handle.detach();
            handle.publish_log(LogLevel::Error, message.clone());
        }

        let entry = LogEntry::new(LogLevel::Error, LOG_TARGET, message.clone())
            .with_field("source", source.as_str())
            .with_field("buffer", buffer.to_string());
        self.events.emit_global_log(entry).ok();

        error!(%source, players = handles.len(), reason, "Decode failed");
        DispatchOutcome::Failed {
            players: handles.len(),
        }
    }

    /// Process notifications until every sender is gone.
    pub async fn run(self: Arc<Self>, mut receiver: UnboundedReceiver<DecodeOutcome>) {
        debug!("Load completion dispatcher started");
        while let Some(outcome) = receiver.recv().await {
            self.dispatch(outcome);
        }
        debug!("Load completion dispatcher stopped");
    }
}
