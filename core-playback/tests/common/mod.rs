//! Recording fake of the platform decode/output service.
//!
//! Decodes never finish on their own: tests call [`RecordingBackend::complete`]
//! or [`RecordingBackend::fail`] to deliver the notification through the
//! notifier the cache handed over.

#![allow(dead_code)]

use bridge_traits::error::Result;
use bridge_traits::{BridgeError, BufferId, DecodeNotifier, SoundPoolBackend, SourceIdentity, StreamId};
use core_playback::SoundPool;
use core_runtime::config::PoolConfig;
use core_runtime::{EventStream, PlayerEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RequestDecode(String, BufferId),
    Play {
        buffer: BufferId,
        stream: StreamId,
        volume: f32,
        rate: f32,
        looping: bool,
    },
    Resume(StreamId),
    Pause(StreamId),
    Stop(StreamId),
    SetVolume(StreamId, f32),
    SetRate(StreamId, f32),
    SetLoop(StreamId, bool),
    Unload(BufferId),
}

#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    notifiers: Mutex<HashMap<BufferId, DecodeNotifier>>,
    next_buffer: AtomicU32,
    next_stream: AtomicU32,
    reject_decodes: AtomicBool,
    fail_play: AtomicBool,
    fail_stop: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn decode_requests(&self) -> Vec<BufferId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RequestDecode(_, buffer) => Some(buffer),
                _ => None,
            })
            .collect()
    }

    pub fn plays(&self) -> Vec<(BufferId, StreamId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Play { buffer, stream, .. } => Some((buffer, stream)),
                _ => None,
            })
            .collect()
    }

    pub fn unloads(&self) -> Vec<BufferId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Unload(buffer) => Some(buffer),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Report `buffer` decoded through the cache's notifier.
    pub fn complete(&self, buffer: BufferId) -> bool {
        self.notifiers
            .lock()
            .get(&buffer)
            .is_some_and(|notifier| notifier.loaded(buffer))
    }

    /// Report `buffer` as failed through the cache's notifier.
    pub fn fail(&self, buffer: BufferId, reason: &str) -> bool {
        self.notifiers
            .lock()
            .get(&buffer)
            .is_some_and(|notifier| notifier.failed(buffer, reason))
    }

    pub fn reject_decodes(&self, reject: bool) {
        self.reject_decodes.store(reject, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl SoundPoolBackend for RecordingBackend {
    fn request_decode(&self, source: &SourceIdentity, notifier: DecodeNotifier) -> Result<BufferId> {
        if self.reject_decodes.load(Ordering::SeqCst) {
            return Err(BridgeError::DecodeRejected {
                source_id: source.to_string(),
                reason: "unsupported format".to_string(),
            });
        }

        let buffer = BufferId(self.next_buffer.fetch_add(1, Ordering::SeqCst) + 1);
        self.notifiers.lock().insert(buffer, notifier);
        self.record(Call::RequestDecode(source.to_string(), buffer));
        Ok(buffer)
    }

    fn play(&self, buffer: BufferId, volume: f32, rate: f32, looping: bool) -> Result<StreamId> {
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("no free stream".to_string()));
        }

        let stream = StreamId(self.next_stream.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(Call::Play {
            buffer,
            stream,
            volume,
            rate,
            looping,
        });
        Ok(stream)
    }

    fn resume(&self, stream: StreamId) -> Result<()> {
        self.record(Call::Resume(stream));
        Ok(())
    }

    fn pause(&self, stream: StreamId) -> Result<()> {
        self.record(Call::Pause(stream));
        Ok(())
    }

    fn stop(&self, stream: StreamId) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("stream busy".to_string()));
        }

        self.record(Call::Stop(stream));
        Ok(())
    }

    fn set_volume(&self, stream: StreamId, volume: f32) -> Result<()> {
        self.record(Call::SetVolume(stream, volume));
        Ok(())
    }

    fn set_rate(&self, stream: StreamId, rate: f32) -> Result<()> {
        self.record(Call::SetRate(stream, rate));
        Ok(())
    }

    fn set_loop(&self, stream: StreamId, looping: bool) -> Result<()> {
        self.record(Call::SetLoop(stream, looping));
        Ok(())
    }

    fn unload(&self, buffer: BufferId) -> Result<()> {
        self.record(Call::Unload(buffer));
        Ok(())
    }
}

pub fn pool(backend: &Arc<RecordingBackend>) -> SoundPool {
    SoundPool::new(backend.clone(), PoolConfig::default()).unwrap()
}

/// Wait for the next event on `stream`, failing the test after one second.
pub async fn next_event<T: Clone + Send + 'static>(stream: &mut EventStream<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

pub async fn next_prepared(stream: &mut EventStream<PlayerEvent<bool>>) -> PlayerEvent<bool> {
    next_event(stream).await
}
