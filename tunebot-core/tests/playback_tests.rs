// File: tunebot-core/tests/playback_tests.rs

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tunebot_common::models::discord::{VoiceMember, VoicePresenceChange};
use tunebot_common::models::playback::{PlaybackState, QueueView};
use tunebot_common::models::track::Track;
use tunebot_core::services::playback::{
    PlaybackService, SessionSettings, SkipOutcome, AUTO_LEAVE_NOTICE,
};
use tunebot_core::test_utils::{
    InMemoryHistoryRepository, RecordingChat, RecordingVoiceGateway, VoiceCall,
};
use tunebot_core::Error;

const VOICE: u64 = 900;

struct Session {
    service: PlaybackService,
    voice: Arc<RecordingVoiceGateway>,
    chat: Arc<RecordingChat>,
    history: Arc<InMemoryHistoryRepository>,
}

fn start() -> Session {
    let voice = Arc::new(RecordingVoiceGateway::new());
    let chat = Arc::new(RecordingChat::new());
    let history = Arc::new(InMemoryHistoryRepository::new());
    let (service, _join) = PlaybackService::spawn(
        voice.clone(),
        chat.clone(),
        history.clone(),
        SessionSettings::default(),
    );
    Session { service, voice, chat, history }
}

fn track(title: &str) -> Track {
    Track {
        track_id: format!("search-{title}"),
        added_by: "Alice".into(),
        uploader_name: format!("{title} Uploader"),
        title: title.into(),
        stream_url: format!("https://cdn.example/{title}"),
        watch_url: format!("https://www.youtube.com/watch?v={title}"),
    }
}

async fn enqueue_all(s: &Session, titles: &[&str]) -> Result<(), Error> {
    for t in titles {
        s.service.enqueue(track(t), Some(VOICE)).await?;
    }
    Ok(())
}

#[tokio::test]
async fn first_enqueue_starts_playback() -> Result<(), Error> {
    let s = start();
    s.service.enqueue(track("A"), Some(VOICE)).await?;

    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Playing);
    assert_eq!(snap.current_index, Some(0));
    assert_eq!(s.voice.calls(), vec![
        VoiceCall::Connect(VOICE),
        VoiceCall::Play("https://cdn.example/A".into()),
    ]);

    let texts = s.chat.texts();
    assert!(texts.contains(&"Added to queue: A".to_string()));
    assert!(texts.contains(&"Now playing: A - (Channel: A Uploader)".to_string()));
    Ok(())
}

#[tokio::test]
async fn later_enqueues_leave_state_alone() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B", "C"]).await?;

    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Playing);
    assert_eq!(snap.current_index, Some(0));
    assert_eq!(snap.len, 3);
    assert_eq!(s.voice.count(|c| matches!(c, VoiceCall::Connect(_))), 1);
    assert_eq!(s.voice.played().len(), 1);
    assert_eq!(s.chat.containing("Added to queue").len(), 3);
    Ok(())
}

#[tokio::test]
async fn natural_completion_advances_until_idle() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B"]).await?;

    s.voice.finish_current();
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(1));
    assert_eq!(snap.state, PlaybackState::Playing);

    s.voice.finish_current();
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(1), "cursor stays on the last slot");
    assert_eq!(snap.state, PlaybackState::Idle);
    assert_eq!(s.voice.played(), vec![
        "https://cdn.example/A".to_string(),
        "https://cdn.example/B".to_string(),
    ]);
    Ok(())
}

#[tokio::test]
async fn enqueue_after_exhaustion_plays_the_new_slot() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A"]).await?;
    s.voice.finish_current();
    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Idle);

    s.service.enqueue(track("B"), Some(VOICE)).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Playing);
    assert_eq!(snap.current_index, Some(1));
    // still connected, so no second join
    assert_eq!(s.voice.count(|c| matches!(c, VoiceCall::Connect(_))), 1);
    Ok(())
}

#[tokio::test]
async fn skip_two_lands_on_the_third_slot_with_one_stop() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B", "C"]).await?;

    let outcome = s.service.skip(Some(2)).await?;
    assert_eq!(outcome, SkipOutcome::Skipped { count: 2 });

    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(2));
    assert_eq!(snap.state, PlaybackState::Playing);
    assert_eq!(s.voice.count(|c| *c == VoiceCall::Stop), 1);
    assert_eq!(s.voice.played(), vec![
        "https://cdn.example/A".to_string(),
        "https://cdn.example/C".to_string(),
    ]);
    assert_eq!(s.chat.containing("Skipped 2 songs").len(), 1);
    Ok(())
}

#[tokio::test]
async fn skip_without_count_behaves_like_skip_one() -> Result<(), Error> {
    let plain = start();
    let one = start();
    enqueue_all(&plain, &["A", "B", "C"]).await?;
    enqueue_all(&one, &["A", "B", "C"]).await?;

    plain.service.skip(None).await?;
    one.service.skip(Some(1)).await?;

    let a = plain.service.snapshot().await?;
    let b = one.service.snapshot().await?;
    assert_eq!(a.current_index, Some(1));
    assert_eq!(a.current_index, b.current_index);
    assert_eq!(plain.voice.played(), one.voice.played());
    Ok(())
}

#[tokio::test]
async fn oversized_skip_stops_on_the_last_slot() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B", "C", "D"]).await?;

    assert_eq!(s.service.skip(Some(99)).await?, SkipOutcome::Skipped { count: 3 });
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(3));
    assert_eq!(snap.state, PlaybackState::Playing);

    // and on the last slot a further skip runs the queue out
    s.service.skip(Some(5)).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(3));
    assert_eq!(snap.state, PlaybackState::Idle);
    Ok(())
}

#[tokio::test]
async fn skip_while_idle_does_nothing() -> Result<(), Error> {
    let s = start();
    assert_eq!(s.service.skip(Some(2)).await?, SkipOutcome::NothingPlaying);
    assert!(s.voice.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn pause_and_resume_round_trip() -> Result<(), Error> {
    let s = start();
    assert!(!s.service.pause().await?, "nothing to pause yet");

    enqueue_all(&s, &["A"]).await?;
    assert!(!s.service.resume().await?);
    assert!(s.service.pause().await?);
    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Paused);
    assert!(!s.service.pause().await?);
    assert!(s.service.resume().await?);
    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Playing);

    assert_eq!(s.voice.count(|c| *c == VoiceCall::Pause), 1);
    assert_eq!(s.voice.count(|c| *c == VoiceCall::Resume), 1);
    Ok(())
}

#[tokio::test]
async fn skip_from_paused_advances() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B"]).await?;
    s.service.pause().await?;

    assert_eq!(s.service.skip(None).await?, SkipOutcome::Skipped { count: 1 });
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(1));
    assert_eq!(snap.state, PlaybackState::Playing);
    Ok(())
}

#[tokio::test]
async fn disconnect_resets_and_ignores_the_stale_completion() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B", "C"]).await?;

    s.service.disconnect().await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Idle);
    assert_eq!(snap.current_index, None);
    assert_eq!(snap.len, 0);
    assert_eq!(snap.voice, None);

    // the driver's end event for A arrived after the reset and must not play anything
    assert_eq!(s.voice.played().len(), 1);
    assert_eq!(s.voice.count(|c| *c == VoiceCall::Disconnect), 1);

    // a fresh enqueue starts over from the first slot
    s.service.enqueue(track("D"), Some(VOICE)).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(0));
    assert_eq!(s.voice.count(|c| matches!(c, VoiceCall::Connect(_))), 2);
    Ok(())
}

#[tokio::test]
async fn stop_completion_advances_exactly_once() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B", "C"]).await?;

    // natural end of A starts B; starting B ends nothing further
    s.voice.finish_current();
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(1));

    // stopping B produces exactly one completion, hence one advance
    let generation_before = snap.generation;
    s.service.skip(None).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.current_index, Some(2));
    assert_eq!(snap.generation, generation_before + 1);
    assert_eq!(s.voice.played().len(), 3);
    Ok(())
}

#[tokio::test]
async fn connect_failure_falls_back_to_idle_with_notice() -> Result<(), Error> {
    let s = start();
    s.voice.fail_connect.store(true, Ordering::SeqCst);

    s.service.enqueue(track("A"), Some(VOICE)).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Idle);
    assert!(s.voice.played().is_empty());
    assert_eq!(s.chat.containing("Could not connect to the voice channel").len(), 1);
    assert!(s.history.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn requester_outside_voice_gets_a_notice() -> Result<(), Error> {
    let s = start();
    s.service.enqueue(track("A"), None).await?;

    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Idle);
    assert_eq!(
        s.chat.containing("Requester not connected to any voice channel").len(),
        1
    );
    assert!(s.voice.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn playback_follows_the_requester_to_another_channel() -> Result<(), Error> {
    let s = start();
    s.service.enqueue(track("A"), Some(VOICE)).await?;
    s.service.enqueue(track("B"), Some(VOICE + 1)).await?;

    s.voice.finish_current();
    s.service.snapshot().await?;
    assert!(s.voice.calls().contains(&VoiceCall::MoveTo(VOICE + 1)));
    assert_eq!(s.voice.connected_channel(), Some(VOICE + 1));
    Ok(())
}

#[tokio::test]
async fn history_is_written_on_start_not_on_enqueue() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B"]).await?;
    s.service.snapshot().await?;

    let entries = s.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].search_id, "search-A");

    s.voice.finish_current();
    s.service.snapshot().await?;
    assert_eq!(s.history.entries().len(), 2);
    Ok(())
}

#[tokio::test]
async fn history_failures_do_not_stop_playback() -> Result<(), Error> {
    let s = start();
    s.history.fail_writes.store(true, Ordering::SeqCst);

    enqueue_all(&s, &["A"]).await?;
    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Playing);
    assert_eq!(s.voice.played().len(), 1);
    Ok(())
}

#[tokio::test]
async fn play_failure_goes_idle() -> Result<(), Error> {
    let s = start();
    s.voice.fail_play.store(true, Ordering::SeqCst);
    enqueue_all(&s, &["A"]).await?;
    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Idle);
    assert!(s.history.entries().is_empty());
    Ok(())
}

#[tokio::test]
async fn describe_shows_five_from_the_cursor() -> Result<(), Error> {
    let s = start();
    assert_eq!(s.service.describe().await?, QueueView::Empty);

    enqueue_all(&s, &["A", "B", "C", "D", "E", "F", "G"]).await?;
    s.voice.finish_current();
    s.voice.finish_current();

    match s.service.describe().await? {
        QueueView::Lines(lines) => {
            let idx: Vec<usize> = lines.iter().map(|l| l.slot_index).collect();
            assert_eq!(idx, vec![2, 3, 4, 5, 6]);
            assert!(lines[0].is_current);
        }
        QueueView::Empty => panic!("queue should not be empty"),
    }
    assert!(s.service.describe().await?.render().starts_with("Playlist:\n► C\n"));
    Ok(())
}

fn left(channel: u64, remaining: Vec<VoiceMember>) -> VoicePresenceChange {
    VoicePresenceChange { user_id: 77, left_channel: channel, remaining }
}

#[tokio::test]
async fn abandoned_channel_disconnects_exactly_once() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A", "B"]).await?;

    let bot = VoiceMember { user_id: 1, is_bot: true };
    assert!(s.service.voice_presence_changed(left(VOICE, vec![bot])).await?);
    assert!(!s.service.voice_presence_changed(left(VOICE, vec![bot])).await?);

    let snap = s.service.snapshot().await?;
    assert_eq!(snap.state, PlaybackState::Idle);
    assert_eq!(snap.current_index, None);
    assert_eq!(snap.len, 0);
    assert_eq!(s.voice.count(|c| *c == VoiceCall::Disconnect), 1);

    let notices = s.chat.containing(AUTO_LEAVE_NOTICE);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].delete_after, Some(std::time::Duration::from_secs(5)));
    Ok(())
}

#[tokio::test]
async fn departures_elsewhere_or_with_listeners_are_ignored() -> Result<(), Error> {
    let s = start();
    enqueue_all(&s, &["A"]).await?;

    let bot = VoiceMember { user_id: 1, is_bot: true };
    let human = VoiceMember { user_id: 2, is_bot: false };
    assert!(!s.service.voice_presence_changed(left(VOICE + 5, vec![])).await?);
    assert!(!s.service.voice_presence_changed(left(VOICE, vec![bot, human])).await?);

    assert_eq!(s.service.snapshot().await?.state, PlaybackState::Playing);
    assert_eq!(s.voice.count(|c| *c == VoiceCall::Disconnect), 0);
    Ok(())
}
