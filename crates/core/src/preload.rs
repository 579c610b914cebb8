//! Resolves every commentary line to audio before playback starts.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{
    epoch::EpochGuard,
    error::Result,
    speech::{NarrationResource, SpeechRequest, SpeechSynthesizer},
    store::CommentaryStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PreloadStatus {
    Idle,
    Loading { done: usize, total: usize },
    Ready { playable: usize, total: usize },
    Failed { message: String },
}

impl PreloadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, PreloadStatus::Loading { .. })
    }
}

/// Audio for each entry, index-aligned with the store. `None` marks a line
/// that could not be synthesized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrationSet {
    resources: Vec<Option<NarrationResource>>,
}

impl NarrationSet {
    pub fn new(resources: Vec<Option<NarrationResource>>) -> Self {
        Self { resources }
    }

    /// No audio for any of `len` entries: video-only playback.
    pub fn silent(len: usize) -> Self {
        Self::new(vec![None; len])
    }

    pub fn get(&self, index: usize) -> Option<&NarrationResource> {
        self.resources.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn playable(&self) -> usize {
        self.resources.iter().filter(|r| r.is_some()).count()
    }

    pub fn resources(&self) -> &[Option<NarrationResource>] {
        &self.resources
    }
}

#[derive(Debug)]
pub enum PreloadOutcome {
    Ready(NarrationSet),
    /// A newer store replaced the one this pass was started for.
    Abandoned,
}

pub struct Preloader {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice_id: String,
    status: watch::Sender<PreloadStatus>,
    pass: Mutex<()>,
}

impl Preloader {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, voice_id: impl Into<String>) -> Self {
        let (status, _) = watch::channel(PreloadStatus::Idle);
        Self {
            synthesizer,
            voice_id: voice_id.into(),
            status,
            pass: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> PreloadStatus {
        self.status.borrow().clone()
    }

    /// Synthesize each entry in index order.
    ///
    /// A failed line becomes `None` and the pass continues. Only a fatal
    /// speech error (bad credentials, unreachable service) stops the pass.
    /// Results are dropped once `guard` goes stale.
    pub async fn preload(
        &self,
        store: &CommentaryStore,
        guard: &EpochGuard,
    ) -> Result<PreloadOutcome> {
        let _pass = self.pass.lock().await;
        if !guard.is_current() {
            return Ok(PreloadOutcome::Abandoned);
        }

        let total = store.len();
        let mut resources = Vec::with_capacity(total);
        self.status
            .send_replace(PreloadStatus::Loading { done: 0, total });

        for (index, entry) in store.entries().iter().enumerate() {
            let request = SpeechRequest {
                text: &entry.text,
                voice_id: &self.voice_id,
                style: entry.delivery_style(),
            };
            let result = self.synthesizer.synthesize(&request).await;

            if !guard.is_current() {
                debug!(epoch = %guard.epoch(), index, "preload pass abandoned");
                // progress counted against a store that no longer exists
                self.status.send_replace(PreloadStatus::Idle);
                return Ok(PreloadOutcome::Abandoned);
            }

            match result {
                Ok(resource) => resources.push(Some(resource)),
                Err(e) if e.is_fatal() => {
                    warn!(index, error = %e, "narration preload halted");
                    self.status.send_replace(PreloadStatus::Failed {
                        message: e.to_string(),
                    });
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(index, error = %e, "narration unavailable for entry, continuing");
                    resources.push(None);
                }
            }

            self.status.send_replace(PreloadStatus::Loading {
                done: index + 1,
                total,
            });
        }

        let set = NarrationSet::new(resources);
        info!(
            epoch = %guard.epoch(),
            playable = set.playable(),
            total,
            "narration preloaded"
        );
        self.status.send_replace(PreloadStatus::Ready {
            playable: set.playable(),
            total,
        });
        Ok(PreloadOutcome::Ready(set))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        epoch::EpochCounter,
        error::PlaycallError,
        speech::SpeechError,
        types::VideoReference,
    };

    /// Fails the lines whose text is listed, fatally if `fatal` is set.
    struct FlakySpeech {
        failing: Vec<&'static str>,
        fatal: bool,
        calls: StdMutex<Vec<String>>,
    }

    impl FlakySpeech {
        fn new(failing: Vec<&'static str>, fatal: bool) -> Self {
            Self {
                failing,
                fatal,
                calls: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySpeech {
        async fn synthesize(
            &self,
            request: &SpeechRequest<'_>,
        ) -> std::result::Result<NarrationResource, SpeechError> {
            self.calls.lock().unwrap().push(request.text.to_string());
            if self.failing.contains(&request.text) {
                return Err(if self.fatal {
                    SpeechError::Unauthorized { status: 401 }
                } else {
                    SpeechError::Rejected {
                        status: 500,
                        reason: "boom".into(),
                    }
                });
            }
            Ok(NarrationResource::new(request.text.as_bytes().to_vec(), "audio/mpeg"))
        }
    }

    fn store() -> CommentaryStore {
        CommentaryStore::create(
            VideoReference::local("clip.mp4"),
            Some(9.0),
            &json!([
                {"time": "00:00", "text": "A"},
                {"time": "00:03", "text": "B"},
                {"time": "00:07", "text": "C"},
            ]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn one_failed_line_leaves_a_hole_at_its_index() {
        let speech = Arc::new(FlakySpeech::new(vec!["B"], false));
        let preloader = Preloader::new(speech.clone(), "voice");
        let epochs = EpochCounter::new();

        let outcome = preloader.preload(&store(), &epochs.guard()).await.unwrap();
        let PreloadOutcome::Ready(set) = outcome else {
            panic!("expected Ready");
        };
        assert_eq!(set.len(), 3);
        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
        assert!(set.get(2).is_some());
        assert_eq!(set.playable(), 2);
        assert_eq!(*speech.calls.lock().unwrap(), ["A", "B", "C"]);
        assert_eq!(
            preloader.status(),
            PreloadStatus::Ready {
                playable: 2,
                total: 3
            }
        );
    }

    #[tokio::test]
    async fn fatal_error_halts_the_pass() {
        let speech = Arc::new(FlakySpeech::new(vec!["A"], true));
        let preloader = Preloader::new(speech.clone(), "voice");
        let epochs = EpochCounter::new();

        let err = preloader.preload(&store(), &epochs.guard()).await.unwrap_err();
        assert!(matches!(err, PlaycallError::Speech(SpeechError::Unauthorized { .. })));
        assert_eq!(speech.calls.lock().unwrap().len(), 1);
        assert!(matches!(preloader.status(), PreloadStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn stale_guard_abandons_before_work() {
        let speech = Arc::new(FlakySpeech::new(vec![], false));
        let preloader = Preloader::new(speech.clone(), "voice");
        let epochs = EpochCounter::new();
        let guard = epochs.guard();
        epochs.advance();

        let outcome = preloader.preload(&store(), &guard).await.unwrap();
        assert!(matches!(outcome, PreloadOutcome::Abandoned));
        assert!(speech.calls.lock().unwrap().is_empty());
        assert_eq!(preloader.status(), PreloadStatus::Idle);
    }

    /// Replaces the store mid-pass by advancing the epoch on its first call.
    struct ReplacingSpeech {
        epochs: EpochCounter,
    }

    #[async_trait]
    impl SpeechSynthesizer for ReplacingSpeech {
        async fn synthesize(
            &self,
            request: &SpeechRequest<'_>,
        ) -> std::result::Result<NarrationResource, SpeechError> {
            self.epochs.advance();
            Ok(NarrationResource::new(request.text.as_bytes().to_vec(), "audio/mpeg"))
        }
    }

    #[tokio::test]
    async fn abandoned_pass_clears_its_progress() {
        let epochs = EpochCounter::new();
        let speech = Arc::new(ReplacingSpeech {
            epochs: epochs.clone(),
        });
        let preloader = Preloader::new(speech, "voice");
        let mut status = preloader.subscribe();

        let outcome = preloader.preload(&store(), &epochs.guard()).await.unwrap();
        assert!(matches!(outcome, PreloadOutcome::Abandoned));
        assert_eq!(preloader.status(), PreloadStatus::Idle);
        assert!(!status.borrow_and_update().is_loading());
    }
}
