//! # Event Bus System
//!
//! Multicast notification channels for players, built on per-subscriber
//! `tokio::sync::mpsc` queues.
//!
//! ## Overview
//!
//! The bus holds one channel per event kind:
//!
//! | Channel         | Payload              |
//! |-----------------|----------------------|
//! | `seekComplete`  | `()`                 |
//! | `complete`      | `()`                 |
//! | `duration`      | [`Duration`]         |
//! | `position`      | [`Duration`]         |
//! | `prepared`      | `bool`               |
//! | `log`           | [`LogEntry`]         |
//! | global `log`    | [`LogEntry`], no player |
//!
//! Every per-player event is a [`PlayerEvent`] carrying the emitting
//! [`PlayerId`]. Subscribers that only care about one player wrap their
//! receiver in an [`EventStream`] filtered to that id.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  emit   ┌──────────────┐  subscribe  ┌────────────┐
//! │ Player A ├────────>│ EventChannel ├────────────>│ Subscriber │
//! └──────────┘         │  (fan-out)   │             └────────────┘
//! ┌──────────┐  emit   │              │  subscribe  ┌────────────┐
//! │ Player B ├────────>│              ├────────────>│ Subscriber │
//! └──────────┘         └──────────────┘             └────────────┘
//! ```
//!
//! ## Closing
//!
//! [`EventBus::dispose`] closes every channel. Closing drops the channel's
//! senders: subscribers drain what was already emitted and then observe
//! the end of the stream. Closing twice is a no-op, and emitting on a closed
//! channel returns [`Error::ChannelClosed`].
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, PlayerId};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new();
//! let player = PlayerId::from("click");
//! let mut stream = bus.complete().subscribe_player(player.clone());
//!
//! bus.emit_complete(&player).unwrap();
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.player_id, player);
//!
//! bus.dispose();
//! assert!(bus.emit_complete(&player).is_err());
//! # }
//! ```

use crate::error::{Error, Result};
use bridge_traits::logging::LogEntry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedSender};
use uuid::Uuid;

// Re-export commonly used types
pub use tokio::sync::mpsc::UnboundedReceiver as Receiver;

/// Returned by [`EventStream`] once its channel is closed and drained.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error("event channel closed")]
    Closed,
}

// ============================================================================
// Player identity and payloads
// ============================================================================

/// Identifier of a logical player, carried by every per-player event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An event emitted on behalf of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEvent<T> {
    pub player_id: PlayerId,
    pub payload: T,
}

impl<T> PlayerEvent<T> {
    pub fn new(player_id: PlayerId, payload: T) -> Self {
        Self { player_id, payload }
    }
}

/// The per-player channels of an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerEventKind {
    SeekComplete,
    Complete,
    Duration,
    Position,
    Prepared,
    Log,
}

impl PlayerEventKind {
    pub const ALL: [PlayerEventKind; 6] = [
        PlayerEventKind::SeekComplete,
        PlayerEventKind::Complete,
        PlayerEventKind::Duration,
        PlayerEventKind::Position,
        PlayerEventKind::Prepared,
        PlayerEventKind::Log,
    ];

    /// Wire name of the channel.
    pub fn channel_name(&self) -> &'static str {
        match self {
            PlayerEventKind::SeekComplete => "seekComplete",
            PlayerEventKind::Complete => "complete",
            PlayerEventKind::Duration => "duration",
            PlayerEventKind::Position => "position",
            PlayerEventKind::Prepared => "prepared",
            PlayerEventKind::Log => "log",
        }
    }
}

const GLOBAL_LOG_CHANNEL: &str = "globalLog";

// ============================================================================
// Event Channel
// ============================================================================

/// A single multicast channel with an explicit, idempotent close.
///
/// Every subscriber owns an unbounded queue:
/// - Any number of subscribers, each receiving every later emission
/// - Sends never block and never drop; a slow subscriber only grows its queue
/// - Dropped subscribers are pruned on the next emit
/// - Closing drops every sender, which ends every subscription
pub struct EventChannel<T> {
    name: &'static str,
    subscribers: Mutex<Option<Vec<UnboundedSender<T>>>>,
}

impl<T: Clone> EventChannel<T> {
    /// Creates an open channel with no subscribers.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that will see the event; zero
    /// subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once the channel has been closed.
    pub fn emit(&self, event: T) -> Result<usize> {
        let mut guard = self.subscribers.lock();
        let subscribers = guard.as_mut().ok_or(Error::ChannelClosed(self.name))?;
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        Ok(subscribers.len())
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events; past events are not replayed. Subscribing to a closed channel
    /// yields a receiver that is already at its end.
    pub fn subscribe(&self) -> Receiver<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(subscribers) = self.subscribers.lock().as_mut() {
            subscribers.push(sender);
        }
        receiver
    }

    /// Subscribes with an [`EventStream`] wrapper.
    pub fn stream(&self) -> EventStream<T> {
        EventStream::new(self.subscribe())
    }

    /// Closes the channel. Returns `true` if this call performed the close.
    pub fn close(&self) -> bool {
        self.subscribers.lock().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.subscribers.lock().is_none()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .as_ref()
            .map(|subscribers| subscribers.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl<P> EventChannel<PlayerEvent<P>>
where
    P: Clone + Send + 'static,
{
    /// Subscribes to the events of a single player.
    pub fn subscribe_player(&self, player_id: PlayerId) -> EventStream<PlayerEvent<P>> {
        EventStream::for_player(self.subscribe(), player_id)
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.subscribers.lock();
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("closed", &guard.is_none())
            .field("subscribers", &guard.as_ref().map(Vec::len).unwrap_or(0))
            .finish()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// The full set of player channels plus the global log channel.
///
/// Share it across players and subscribers with `Arc`.
pub struct EventBus {
    seek_complete: EventChannel<PlayerEvent<()>>,
    complete: EventChannel<PlayerEvent<()>>,
    duration: EventChannel<PlayerEvent<Duration>>,
    position: EventChannel<PlayerEvent<Duration>>,
    prepared: EventChannel<PlayerEvent<bool>>,
    log: EventChannel<PlayerEvent<LogEntry>>,
    global_log: EventChannel<LogEntry>,
}

impl EventBus {
    /// Creates a new event bus with every channel open.
    pub fn new() -> Self {
        Self {
            seek_complete: EventChannel::new(PlayerEventKind::SeekComplete.channel_name()),
            complete: EventChannel::new(PlayerEventKind::Complete.channel_name()),
            duration: EventChannel::new(PlayerEventKind::Duration.channel_name()),
            position: EventChannel::new(PlayerEventKind::Position.channel_name()),
            prepared: EventChannel::new(PlayerEventKind::Prepared.channel_name()),
            log: EventChannel::new(PlayerEventKind::Log.channel_name()),
            global_log: EventChannel::new(GLOBAL_LOG_CHANNEL),
        }
    }

    pub fn seek_complete(&self) -> &EventChannel<PlayerEvent<()>> {
        &self.seek_complete
    }

    pub fn complete(&self) -> &EventChannel<PlayerEvent<()>> {
        &self.complete
    }

    pub fn duration(&self) -> &EventChannel<PlayerEvent<Duration>> {
        &self.duration
    }

    pub fn position(&self) -> &EventChannel<PlayerEvent<Duration>> {
        &self.position
    }

    pub fn prepared(&self) -> &EventChannel<PlayerEvent<bool>> {
        &self.prepared
    }

    pub fn log(&self) -> &EventChannel<PlayerEvent<LogEntry>> {
        &self.log
    }

    pub fn global_log(&self) -> &EventChannel<LogEntry> {
        &self.global_log
    }

    pub fn emit_seek_complete(&self, player_id: &PlayerId) -> Result<usize> {
        self.seek_complete
            .emit(PlayerEvent::new(player_id.clone(), ()))
    }

    pub fn emit_complete(&self, player_id: &PlayerId) -> Result<usize> {
        self.complete.emit(PlayerEvent::new(player_id.clone(), ()))
    }

    pub fn emit_duration(&self, player_id: &PlayerId, duration: Duration) -> Result<usize> {
        self.duration
            .emit(PlayerEvent::new(player_id.clone(), duration))
    }

    pub fn emit_position(&self, player_id: &PlayerId, position: Duration) -> Result<usize> {
        self.position
            .emit(PlayerEvent::new(player_id.clone(), position))
    }

    pub fn emit_prepared(&self, player_id: &PlayerId, prepared: bool) -> Result<usize> {
        self.prepared
            .emit(PlayerEvent::new(player_id.clone(), prepared))
    }

    pub fn emit_log(&self, player_id: &PlayerId, entry: LogEntry) -> Result<usize> {
        self.log.emit(PlayerEvent::new(player_id.clone(), entry))
    }

    pub fn emit_global_log(&self, entry: LogEntry) -> Result<usize> {
        self.global_log.emit(entry)
    }

    /// Closes every channel. Returns how many channels this call closed, so a
    /// second dispose returns `0`.
    pub fn dispose(&self) -> usize {
        [
            self.seek_complete.close(),
            self.complete.close(),
            self.duration.close(),
            self.position.close(),
            self.prepared.close(),
            self.log.close(),
            self.global_log.close(),
        ]
        .into_iter()
        .filter(|closed| *closed)
        .count()
    }

    /// Returns `true` once every channel is closed.
    pub fn is_disposed(&self) -> bool {
        self.seek_complete.is_closed()
            && self.complete.is_closed()
            && self.duration.is_closed()
            && self.position.is_closed()
            && self.prepared.is_closed()
            && self.log.is_closed()
            && self.global_log.is_closed()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("disposed", &self.is_disposed())
            .field("global_log", &self.global_log)
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A wrapper around a subscriber queue with an optional filter.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
/// use std::time::Duration;
///
/// let bus = EventBus::new();
/// let long_only = EventStream::new(bus.duration().subscribe())
///     .filter(|event| event.payload > Duration::from_secs(1));
/// ```
pub struct EventStream<T> {
    receiver: Receiver<T>,
    filter: Option<EventFilter<T>>,
}

impl<T: Clone> EventStream<T> {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<T>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &T) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Closed`] once the channel is closed and drained.
    pub async fn recv(&mut self) -> std::result::Result<T, RecvError> {
        loop {
            let event = self.receiver.recv().await.ok_or(RecvError::Closed)?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<std::result::Result<T, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl<P> EventStream<PlayerEvent<P>>
where
    P: Clone + Send + 'static,
{
    /// A stream that only yields events emitted for `player_id`.
    pub fn for_player(receiver: Receiver<PlayerEvent<P>>, player_id: PlayerId) -> Self {
        Self::new(receiver).filter(move |event| event.player_id == player_id)
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
