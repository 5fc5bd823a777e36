//! End-to-end tests for the sound pool: asynchronous completion delivery,
//! playback controls and event fan-out.

mod common;

use bridge_traits::{BufferId, LogLevel, StreamId};
use common::{next_event, next_prepared, pool, Call, RecordingBackend};
use core_playback::{DispatchOutcome, PlaybackError, PlayerState, SoundPool};
use core_runtime::config::PoolConfig;
use core_runtime::{Error, PlayerId};
use std::time::Duration;

#[tokio::test]
async fn test_deferred_start_after_async_completion() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut prepared = pool.events().prepared().subscribe_player("drum".into());

    let player = pool.create_player_with_id("drum");
    player.set_volume(0.25).unwrap();
    player.set_looping(true).unwrap();
    player.set_source("sfx/drum.wav").unwrap();
    player.start().unwrap();

    assert_eq!(player.state(), PlayerState::Loading);
    assert!(backend.plays().is_empty());

    assert!(backend.complete(BufferId(1)));
    let event = next_prepared(&mut prepared).await;
    assert_eq!(event.player_id, PlayerId::from("drum"));
    assert!(event.payload);

    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(
        backend.calls().last(),
        Some(&Call::Play {
            buffer: BufferId(1),
            stream: StreamId(1),
            volume: 0.25,
            rate: 1.0,
            looping: true,
        })
    );
}

#[tokio::test]
async fn test_only_waiting_players_auto_start() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut prepared = pool.events().prepared().stream();

    let eager = pool.create_player();
    let lazy = pool.create_player();
    eager.set_source("hit.wav").unwrap();
    lazy.set_source("hit.wav").unwrap();
    eager.start().unwrap();

    backend.complete(BufferId(1));
    next_prepared(&mut prepared).await;
    next_prepared(&mut prepared).await;

    assert_eq!(eager.state(), PlayerState::Playing);
    assert_eq!(lazy.state(), PlayerState::Ready);
    assert_eq!(backend.plays().len(), 1);
}

#[tokio::test]
async fn test_start_stop_pause_resume() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("tone.wav").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));

    player.start().unwrap();
    assert!(player.is_playing());
    let stream = player.stream_id().unwrap();

    player.pause().unwrap();
    assert_eq!(player.state(), PlayerState::Paused);
    assert_eq!(player.stream_id(), Some(stream));

    player.start().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(backend.calls().contains(&Call::Resume(stream)));
    assert_eq!(backend.plays().len(), 1);

    player.stop().unwrap();
    assert_eq!(player.state(), PlayerState::Ready);
    assert_eq!(player.stream_id(), None);
    assert!(backend.calls().contains(&Call::Stop(stream)));

    // Stop without a stream is harmless
    player.stop().unwrap();
}

#[tokio::test]
async fn test_stop_before_completion_cancels_intent() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("tone.wav").unwrap();
    player.start().unwrap();
    player.stop().unwrap();

    pool.dispatcher().on_decode_complete(BufferId(1));
    assert_eq!(player.state(), PlayerState::Ready);
    assert!(backend.plays().is_empty());
}

#[tokio::test]
async fn test_seek_to_zero_restarts_playing_player() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut seeks = pool.events().seek_complete().stream();

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();

    player.seek_to(Duration::ZERO).unwrap();

    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.stream_id(), Some(StreamId(2)));
    assert!(backend.calls().contains(&Call::Stop(StreamId(1))));
    assert_eq!(next_event(&mut seeks).await.player_id, *player.id());
}

#[tokio::test]
async fn test_seek_to_zero_keeps_paused_player_stopped() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();
    player.pause().unwrap();

    player.seek_to(Duration::ZERO).unwrap();
    assert_eq!(player.state(), PlayerState::Ready);
    assert_eq!(backend.plays().len(), 1);
}

#[tokio::test]
async fn test_nonzero_seek_is_unsupported() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut seeks = pool.events().seek_complete().stream();

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();
    let calls_before = backend.calls().len();

    let err = player.seek_to(Duration::from_millis(1500)).unwrap_err();

    assert!(err.is_unsupported());
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.stream_id(), Some(StreamId(1)));
    assert_eq!(backend.calls().len(), calls_before);
    assert!(seeks.try_recv().is_none());
}

#[tokio::test]
async fn test_seek_keeps_stream_when_platform_stop_fails() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut seeks = pool.events().seek_complete().stream();

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();

    backend.fail_stop(true);
    let err = player.seek_to(Duration::ZERO).unwrap_err();
    assert!(matches!(err, PlaybackError::Backend(_)));
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.stream_id(), Some(StreamId(1)));
    assert_eq!(backend.plays().len(), 1);
    assert!(seeks.try_recv().is_none());

    // Once the platform cooperates the same stream is stopped and replaced
    backend.fail_stop(false);
    player.seek_to(Duration::ZERO).unwrap();
    assert!(backend.calls().contains(&Call::Stop(StreamId(1))));
    assert_eq!(player.stream_id(), Some(StreamId(2)));
    assert_eq!(backend.plays().len(), 2);
}

#[tokio::test]
async fn test_stop_keeps_playing_when_platform_stop_fails() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();

    backend.fail_stop(true);
    assert!(player.stop().is_err());
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(player.wants_playback());
    assert_eq!(player.stream_id(), Some(StreamId(1)));

    backend.fail_stop(false);
    player.stop().unwrap();
    assert_eq!(player.state(), PlayerState::Ready);
    assert!(!player.wants_playback());
    assert_eq!(player.stream_id(), None);
}

#[tokio::test]
async fn test_duration_and_position_are_unavailable() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("song.ogg").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();

    assert_eq!(player.duration(), None);
    assert_eq!(player.current_position(), None);
}

#[tokio::test]
async fn test_volume_rate_loop_apply_to_live_stream() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("engine.wav").unwrap();
    pool.dispatcher().on_decode_complete(BufferId(1));
    player.start().unwrap();

    player.set_volume(0.5).unwrap();
    player.set_rate(1.5).unwrap();
    player.set_looping(true).unwrap();

    let calls = backend.calls();
    assert!(calls.contains(&Call::SetVolume(StreamId(1), 0.5)));
    assert!(calls.contains(&Call::SetRate(StreamId(1), 1.5)));
    assert!(calls.contains(&Call::SetLoop(StreamId(1), true)));
    assert_eq!(player.volume(), 0.5);
    assert_eq!(player.rate(), 1.5);
    assert!(player.is_looping());
}

#[tokio::test]
async fn test_invalid_volume_and_rate_are_rejected() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let player = pool.create_player();

    assert_eq!(
        player.set_volume(1.2).unwrap_err(),
        PlaybackError::InvalidVolume(1.2)
    );
    let err = player.set_rate(4.0).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(matches!(err, PlaybackError::InvalidRate { min, max, .. } if min == 0.5 && max == 2.0));

    assert_eq!(player.volume(), 1.0);
    assert_eq!(player.rate(), 1.0);
}

#[tokio::test]
async fn test_config_defaults_flow_into_players() {
    let backend = RecordingBackend::new();
    let config = PoolConfig::builder()
        .default_volume(0.8)
        .rate_range(0.25, 4.0)
        .build()
        .unwrap();
    let pool = SoundPool::new(backend.clone(), config).unwrap();

    let player = pool.create_player();
    assert_eq!(player.volume(), 0.8);
    player.set_rate(3.0).unwrap();
    assert_eq!(player.rate(), 3.0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let backend = RecordingBackend::new();
    let config = PoolConfig {
        max_streams: 0,
        ..PoolConfig::default()
    };

    let err = SoundPool::new(backend, config).unwrap_err();
    assert!(matches!(err, PlaybackError::Runtime(Error::Config(_))));
}

#[test]
fn test_pool_requires_runtime() {
    let backend = RecordingBackend::new();
    let err = SoundPool::new(backend, PoolConfig::default()).unwrap_err();
    assert!(matches!(err, PlaybackError::Runtime(Error::Internal(_))));
}

#[tokio::test]
async fn test_player_events_are_isolated() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut for_a = pool.events().prepared().subscribe_player("A".into());
    let mut for_b = pool.events().prepared().subscribe_player("B".into());

    let a = pool.create_player_with_id("A");
    let b = pool.create_player_with_id("B");
    a.set_source("a.wav").unwrap();
    b.set_source("b.wav").unwrap();

    backend.complete(BufferId(1));
    assert_eq!(next_prepared(&mut for_a).await.player_id, PlayerId::from("A"));
    assert!(for_b.try_recv().is_none());

    backend.complete(BufferId(2));
    assert_eq!(next_prepared(&mut for_b).await.player_id, PlayerId::from("B"));
    assert!(for_a.try_recv().is_none());
}

#[tokio::test]
async fn test_multiple_subscribers_each_receive_events() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut first = pool.events().seek_complete().stream();
    let mut second = pool.events().seek_complete().stream();

    let player = pool.create_player();
    player.seek_to(Duration::ZERO).unwrap();

    assert_eq!(next_event(&mut first).await.player_id, *player.id());
    assert_eq!(next_event(&mut second).await.player_id, *player.id());
}

#[tokio::test]
async fn test_player_log_channel_and_global_log() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut player_logs = pool.events().log().subscribe_player("P".into());
    let mut global = pool.events().global_log().stream();

    let player = pool.create_player_with_id("P");
    player.set_source("x.wav").unwrap();
    let entry = next_event(&mut player_logs).await;
    assert_eq!(entry.payload.message, "source attached");
    assert_eq!(entry.payload.fields.get("player_id").map(String::as_str), Some("P"));

    assert_eq!(pool.log(LogLevel::Warn, "low memory").unwrap(), 1);
    let entry = next_event(&mut global).await;
    assert_eq!(entry.level, LogLevel::Warn);
    assert_eq!(entry.message, "low memory");
}

#[tokio::test]
async fn test_player_logs_can_be_disabled() {
    let backend = RecordingBackend::new();
    let config = PoolConfig::builder().emit_player_logs(false).build().unwrap();
    let pool = SoundPool::new(backend.clone(), config).unwrap();
    let mut logs = pool.events().log().stream();

    let player = pool.create_player();
    player.set_source("x.wav").unwrap();
    player.release();

    assert!(logs.try_recv().is_none());
}

#[tokio::test]
async fn test_async_failure_reports_on_logs() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut player_logs = pool
        .events()
        .log()
        .subscribe_player("F".into())
        .filter(|event| event.payload.level == LogLevel::Error);
    let mut global = pool.events().global_log().stream();

    let player = pool.create_player_with_id("F");
    player.set_source("corrupt.wav").unwrap();
    player.start().unwrap();

    assert!(backend.fail(BufferId(1), "bad header"));

    let entry = next_event(&mut player_logs).await;
    assert!(entry.payload.message.contains("bad header"));
    let entry = next_event(&mut global).await;
    assert_eq!(entry.level, LogLevel::Error);
    assert_eq!(entry.fields.get("buffer").map(String::as_str), Some("buffer#1"));

    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(backend.unloads(), vec![BufferId(1)]);
}

#[tokio::test]
async fn test_failed_deferred_start_still_prepares() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut prepared = pool.events().prepared().stream();

    let player = pool.create_player();
    player.set_source("busy.wav").unwrap();
    player.start().unwrap();
    backend.fail_play(true);

    backend.complete(BufferId(1));
    next_prepared(&mut prepared).await;

    assert_eq!(player.state(), PlayerState::Ready);
    assert!(!player.wants_playback());

    backend.fail_play(false);
    player.start().unwrap();
    assert!(player.is_playing());
}

#[tokio::test]
async fn test_dispose_closes_channels_once() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);
    let mut seeks = pool.events().seek_complete().stream();

    assert!(pool.dispose());
    assert!(pool.is_disposed());
    assert!(pool.events().is_disposed());
    assert!(!pool.dispose());

    // Emission after dispose is a caller error
    assert!(matches!(
        pool.log(LogLevel::Info, "too late"),
        Err(PlaybackError::Runtime(Error::ChannelClosed(_)))
    ));
    assert!(seeks.recv().await.is_err());

    // Player operations keep working but emit nothing
    let player = pool.create_player();
    player.seek_to(Duration::ZERO).unwrap();
    player.set_source("x.wav").unwrap();
    player.release();
    assert_eq!(backend.unloads(), vec![BufferId(1)]);
}

#[tokio::test]
async fn test_dispose_reclaims_pending_decodes() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let abandoned = pool.create_player();
    abandoned.set_source("gone.wav").unwrap();
    abandoned.release();
    let loading = pool.create_player();
    loading.set_source("slow.wav").unwrap();
    assert_eq!(pool.stats().pending_decodes, 2);

    // The released decode can no longer be completed, so dispose unloads it
    pool.dispose();
    assert_eq!(backend.unloads(), vec![BufferId(1)]);
    assert_eq!(pool.stats().pending_decodes, 1);

    loading.release();
    assert_eq!(backend.unloads(), vec![BufferId(1), BufferId(2)]);
    let stats = pool.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.pending_decodes, 0);

    // A completion reported directly after dispose finds nothing to unload
    assert_eq!(
        pool.dispatcher().on_decode_complete(BufferId(2)),
        DispatchOutcome::Unknown
    );
    assert_eq!(backend.unloads().len(), 2);
}

#[tokio::test]
async fn test_dispose_stops_dispatcher() {
    let backend = RecordingBackend::new();
    let pool = pool(&backend);

    let player = pool.create_player();
    player.set_source("x.wav").unwrap();
    player.start().unwrap();
    pool.dispose();
    tokio::task::yield_now().await;

    backend.complete(BufferId(1));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(player.state(), PlayerState::Loading);
    assert!(backend.plays().is_empty());
}
