//! # Shared Buffer Cache
//!
//! Reference-counted map from source identity to decoded platform buffer.
//!
//! Every cache mutation, including completion dispatch, runs under the single
//! lock owned by [`SharedBufferCache`]. Lock order is always cache first, then
//! the player's own state.

use crate::cache::stats::CacheStats;
use crate::error::Result;
use crate::handle::HandleCore;
use bridge_traits::{BufferId, DecodeNotifier, SoundPoolBackend, SourceIdentity};
use core_runtime::logging::strip_path;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, trace, warn};

/// One decoded (or decoding) buffer and the players sharing it.
pub(crate) struct CacheEntry {
    pub(crate) buffer: BufferId,
    pub(crate) prepared: bool,
    /// Attach order. Non-owning.
    pub(crate) handles: Vec<Weak<HandleCore>>,
}

impl CacheEntry {
    fn new(buffer: BufferId, first: &Arc<HandleCore>) -> Self {
        Self {
            buffer,
            prepared: false,
            handles: vec![Arc::downgrade(first)],
        }
    }

    fn contains(&self, handle: &HandleCore) -> bool {
        self.handles
            .iter()
            .any(|weak| std::ptr::eq(weak.as_ptr(), handle))
    }

    fn remove(&mut self, handle: &HandleCore) -> bool {
        let before = self.handles.len();
        self.handles
            .retain(|weak| weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), handle));
        self.handles.len() != before
    }

    /// Upgrades every live reference, dropping dead ones.
    pub(crate) fn live_handles(&mut self) -> Vec<Arc<HandleCore>> {
        self.handles.retain(|weak| weak.strong_count() > 0);
        self.handles.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Everything guarded by the cache lock.
#[derive(Default)]
pub(crate) struct CacheState {
    pub(crate) entries: HashMap<SourceIdentity, CacheEntry>,
    /// Decode token -> source it was requested for.
    pub(crate) pending: HashMap<BufferId, SourceIdentity>,
    decodes_requested: u64,
    buffers_unloaded: u64,
    pub(crate) orphaned_completions: u64,
    pub(crate) failed_decodes: u64,
    /// No completions will be dispatched any more.
    closed: bool,
}

impl CacheState {
    /// Hands a buffer back to the platform. Failures are logged, not raised:
    /// the entry is gone either way.
    pub(crate) fn unload(&mut self, backend: &dyn SoundPoolBackend, buffer: BufferId) {
        if let Err(err) = backend.unload(buffer) {
            warn!(%buffer, error = %err, "Platform unload failed");
        }
        self.buffers_unloaded += 1;
        debug!(%buffer, "Buffer unloaded");
    }
}

/// Concurrency-safe cache of decoded buffers keyed by source identity.
pub struct SharedBufferCache {
    backend: Arc<dyn SoundPoolBackend>,
    notifier: DecodeNotifier,
    state: Mutex<CacheState>,
}

impl SharedBufferCache {
    /// Create a cache issuing decodes on `backend`; completions are reported
    /// through `notifier`.
    pub fn new(backend: Arc<dyn SoundPoolBackend>, notifier: DecodeNotifier) -> Self {
        Self {
            backend,
            notifier,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub(crate) fn backend(&self) -> &dyn SoundPoolBackend {
        &*self.backend
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock()
    }

    /// Attach `handle` to `source`, reusing a live buffer or requesting a decode.
    ///
    /// A handle attached elsewhere is released from its old entry first, in
    /// the same critical section. Attaching to the source it already holds is
    /// a no-op. Joining a prepared entry starts a player that wants playback;
    /// if the platform refuses, the error goes to the player's log channel and
    /// the attach still succeeds.
    #[instrument(skip(self, handle, source), fields(player_id = %handle.id(), source = %strip_path(source.as_str())))]
    pub(crate) fn acquire(&self, handle: &Arc<HandleCore>, source: SourceIdentity) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(current) = handle.source() {
            let attached = state
                .entries
                .get(&current)
                .is_some_and(|entry| entry.contains(handle));
            if current == source && attached {
                trace!("Player already attached to source");
                return Ok(());
            }
            self.release_locked(&mut state, handle);
        }

        if let Some(entry) = state.entries.get_mut(&source) {
            entry.handles.push(Arc::downgrade(handle));
            let buffer = entry.buffer;
            let prepared = entry.prepared;
            debug!(%buffer, prepared, references = entry.handles.len(), "Reusing shared buffer");

            handle.attach(source);
            if prepared {
                // The join succeeded; a refused start leaves the player Ready.
                if let Err(err) = handle.on_prepared(buffer) {
                    warn!(player_id = %handle.id(), error = %err, "Deferred start failed");
                }
            }
            return Ok(());
        }

        let buffer = self
            .backend
            .request_decode(&source, self.notifier.clone())?;
        state.decodes_requested += 1;
        state.pending.insert(buffer, source.clone());
        state
            .entries
            .insert(source.clone(), CacheEntry::new(buffer, handle));
        info!(%buffer, "Decode requested");

        handle.attach(source);
        Ok(())
    }

    /// Detach `handle` from its entry, unloading the buffer if it was the last
    /// reference. Releasing a detached handle does nothing.
    #[instrument(skip(self, handle), fields(player_id = %handle.id()))]
    pub(crate) fn release(&self, handle: &HandleCore) {
        let mut state = self.state.lock();
        self.release_locked(&mut state, handle);
    }

    fn release_locked(&self, state: &mut CacheState, handle: &HandleCore) {
        let Some(source) = handle.detach() else {
            trace!("Release of detached player ignored");
            return;
        };

        let remaining = match state.entries.get_mut(&source) {
            Some(entry) => {
                entry.remove(handle);
                entry.handles.len()
            }
            None => return,
        };

        if remaining > 0 {
            debug!(references = remaining, "Reference released");
            return;
        }

        if let Some(entry) = state.entries.remove(&source) {
            if entry.prepared {
                state.unload(self.backend(), entry.buffer);
            } else if state.closed {
                state.pending.remove(&entry.buffer);
                state.orphaned_completions += 1;
                state.unload(self.backend(), entry.buffer);
            } else {
                // Still in `pending`; the completion finds no entry and unloads.
                debug!(buffer = %entry.buffer, "Last reference released before decode finished");
            }
        }
    }

    /// Stop relying on completion dispatch for cleanup.
    ///
    /// Unloads every pending buffer no player holds any more and makes later
    /// releases of unprepared entries unload immediately. Decodes that still
    /// have players stay pending. Returns the number of buffers reclaimed.
    pub(crate) fn close(&self) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }
        state.closed = true;

        let orphaned: Vec<BufferId> = state
            .pending
            .iter()
            .filter(|(buffer, source)| {
                !state
                    .entries
                    .get(*source)
                    .is_some_and(|entry| entry.buffer == **buffer)
            })
            .map(|(buffer, _)| *buffer)
            .collect();

        for buffer in &orphaned {
            state.pending.remove(buffer);
            state.orphaned_completions += 1;
            state.unload(self.backend(), *buffer);
        }
        if !orphaned.is_empty() {
            info!(reclaimed = orphaned.len(), "Pending decodes reclaimed on close");
        }
        orphaned.len()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            prepared_entries: state.entries.values().filter(|e| e.prepared).count(),
            references: state
                .entries
                .values()
                .map(|e| e.handles.iter().filter(|w| w.strong_count() > 0).count())
                .sum(),
            pending_decodes: state.pending.len(),
            decodes_requested: state.decodes_requested,
            buffers_unloaded: state.buffers_unloaded,
            orphaned_completions: state.orphaned_completions,
            failed_decodes: state.failed_decodes,
        }
    }

    /// Sources with a live entry, sorted.
    pub fn sources(&self) -> Vec<SourceIdentity> {
        let mut sources: Vec<_> = self.state.lock().entries.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Number of players attached to `source`.
    pub fn reference_count(&self, source: &SourceIdentity) -> usize {
        self.state
            .lock()
            .entries
            .get(source)
            .map(|entry| entry.handles.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn contains(&self, source: &SourceIdentity) -> bool {
        self.state.lock().entries.contains_key(source)
    }

    /// Returns `true` once the buffer for `source` finished decoding.
    pub fn is_prepared(&self, source: &SourceIdentity) -> bool {
        self.state
            .lock()
            .entries
            .get(source)
            .is_some_and(|entry| entry.prepared)
    }

    /// Buffer currently backing `source`, prepared or not.
    pub fn buffer_for(&self, source: &SourceIdentity) -> Option<BufferId> {
        self.state.lock().entries.get(source).map(|entry| entry.buffer)
    }
}

impl fmt::Debug for SharedBufferCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBufferCache")
            .field("stats", &self.stats())
            .finish()
    }
}
