use std::sync::Arc;

use async_trait::async_trait;
use playcall_core::{
    CommentaryStore, NarrationResource, PlaycallError, PreloadOutcome, PreloadStatus, Preloader,
    ScriptedCommentary, Session, SpeechError, SpeechRequest, SpeechSynthesizer, VideoReference,
    load_session, save_session,
};
use serde_json::json;
use tokio::sync::Notify;

/// Holds every request until released.
struct GatedSpeech {
    gate: Arc<Notify>,
}

#[async_trait]
impl SpeechSynthesizer for GatedSpeech {
    async fn synthesize(
        &self,
        request: &SpeechRequest<'_>,
    ) -> Result<NarrationResource, SpeechError> {
        self.gate.notified().await;
        Ok(NarrationResource::new(request.text.as_bytes().to_vec(), "audio/mpeg"))
    }
}

struct RevokedSpeech;

#[async_trait]
impl SpeechSynthesizer for RevokedSpeech {
    async fn synthesize(
        &self,
        _request: &SpeechRequest<'_>,
    ) -> Result<NarrationResource, SpeechError> {
        Err(SpeechError::Unauthorized { status: 401 })
    }
}

fn timecodes() -> serde_json::Value {
    json!([
        {"time": "00:00", "text": "A"},
        {"time": "00:03", "text": "B"},
        {"time": "00:07", "text": "C"},
    ])
}

#[tokio::test]
async fn preload_for_a_replaced_video_is_discarded() {
    let mut session = Session::new();
    session.load_video(VideoReference::local("first.mp4"), Some(9.0));
    session
        .regenerate(&ScriptedCommentary::with_timecodes(timecodes()))
        .await
        .unwrap();

    let gate = Arc::new(Notify::new());
    let preloader = Arc::new(Preloader::new(
        Arc::new(GatedSpeech { gate: gate.clone() }),
        "voice",
    ));
    let (store, guard) = session.preload_ticket().unwrap();
    let pass = tokio::spawn({
        let preloader = preloader.clone();
        let guard = guard.clone();
        async move { preloader.preload(&store, &guard).await }
    });
    tokio::task::yield_now().await;

    session.load_video(VideoReference::local("second.mp4"), Some(5.0));
    gate.notify_one();

    let outcome = pass.await.unwrap().unwrap();
    assert!(matches!(outcome, PreloadOutcome::Abandoned));
    assert!(!session.install_narration(&guard, playcall_core::NarrationSet::silent(3)));
    assert!(session.narration().is_none());
    assert!(session.store().unwrap().is_empty());
}

#[tokio::test]
async fn reset_mid_preload_leaves_no_progress_behind() {
    let mut session = Session::new();
    session.load_video(VideoReference::local("clip.mp4"), Some(9.0));
    session
        .regenerate(&ScriptedCommentary::with_timecodes(timecodes()))
        .await
        .unwrap();

    let gate = Arc::new(Notify::new());
    let preloader = Arc::new(Preloader::new(
        Arc::new(GatedSpeech { gate: gate.clone() }),
        "voice",
    ));
    let (store, guard) = session.preload_ticket().unwrap();
    let pass = tokio::spawn({
        let preloader = preloader.clone();
        async move { preloader.preload(&store, &guard).await }
    });
    tokio::task::yield_now().await;
    assert_eq!(preloader.status(), PreloadStatus::Loading { done: 0, total: 3 });

    session.reset();
    gate.notify_one();

    assert!(matches!(pass.await.unwrap().unwrap(), PreloadOutcome::Abandoned));
    assert_eq!(preloader.status(), PreloadStatus::Idle);
    assert!(!preloader.status().is_loading());
}

#[tokio::test]
async fn revoked_credentials_leave_video_only_playback() {
    let mut session = Session::new();
    session.load_video(VideoReference::local("clip.mp4"), Some(9.0));
    session
        .regenerate(&ScriptedCommentary::with_timecodes(timecodes()))
        .await
        .unwrap();

    let preloader = Preloader::new(Arc::new(RevokedSpeech), "voice");
    let err = session.prepare_narration(&preloader).await.unwrap_err();
    assert!(matches!(
        err,
        PlaycallError::Speech(SpeechError::Unauthorized { status: 401 })
    ));
    assert!(matches!(preloader.status(), PreloadStatus::Failed { .. }));

    let narration = session.narration().unwrap();
    assert_eq!(narration.len(), 3);
    assert_eq!(narration.playable(), 0);
}

#[tokio::test]
async fn malformed_entry_is_dropped_not_fatal() {
    let mut session = Session::new();
    session.load_video(VideoReference::local("clip.mp4"), Some(9.0));
    let raw = json!([
        {"time": "00:00", "text": "A"},
        {"time": "later", "text": "B"},
        {"time": "00:03", "text": "C"},
        {"time": "00:07", "text": "D"},
    ]);
    session
        .regenerate(&ScriptedCommentary::with_timecodes(raw))
        .await
        .unwrap();

    let texts: Vec<_> = session
        .store()
        .unwrap()
        .entries()
        .iter()
        .map(|entry| entry.text.as_str())
        .collect();
    assert_eq!(texts, ["A", "C", "D"]);
}

#[tokio::test]
async fn saved_session_replays_without_the_commentary_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("key_moments.json");

    let mut session = Session::new();
    session.load_video(VideoReference::remote("https://cdn.example.com/clip.mp4"), Some(9.0));
    session
        .regenerate(&ScriptedCommentary::new())
        .await
        .unwrap();
    save_session(&session.export().unwrap(), &path).await.unwrap();

    let replayed: CommentaryStore = load_session(&path).await.unwrap();
    assert_eq!(
        replayed.video(),
        &VideoReference::remote("https://cdn.example.com/clip.mp4")
    );
    assert_eq!(replayed.entries(), session.store().unwrap().entries());
}
