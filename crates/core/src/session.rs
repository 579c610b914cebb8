//! One loaded video and everything derived from it.
//!
//! Loading a video advances the epoch; commentary and narration built for an
//! older epoch are refused, so late results from abandoned work never reach
//! the player.

use std::{path::Path, sync::Arc};

use tokio::fs;
use tracing::{info, warn};

use crate::{
    epoch::{Epoch, EpochCounter, EpochGuard},
    error::{PlaycallError, Result},
    intelligence::{CommentaryRequest, CommentaryService},
    preload::{NarrationSet, PreloadOutcome, Preloader},
    store::CommentaryStore,
    types::{RawSession, SessionExport, VideoReference},
};

#[derive(Default)]
pub struct Session {
    epochs: EpochCounter,
    store: Option<Arc<CommentaryStore>>,
    narration: Option<Arc<NarrationSet>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> Epoch {
        self.epochs.current()
    }

    pub fn store(&self) -> Option<&Arc<CommentaryStore>> {
        self.store.as_ref()
    }

    pub fn narration(&self) -> Option<&Arc<NarrationSet>> {
        self.narration.as_ref()
    }

    /// Replace the current video with an empty store, orphaning in-flight work.
    pub fn load_video(&mut self, video: VideoReference, duration: Option<f64>) -> Epoch {
        let epoch = self.epochs.advance();
        info!(%epoch, video = %video.video_path(), "video loaded");
        self.store = Some(Arc::new(CommentaryStore::empty(video, duration)));
        self.narration = None;
        epoch
    }

    /// Install a freshly built store wholesale. Narration for the previous
    /// store is dropped and any preload pass for it is abandoned.
    pub fn install_commentary(&mut self, store: CommentaryStore) -> Result<Epoch> {
        if self.store.is_none() {
            return Err(PlaycallError::NoVideoLoaded);
        }
        let epoch = self.epochs.advance();
        info!(%epoch, entries = store.len(), "commentary installed");
        self.store = Some(Arc::new(store));
        self.narration = None;
        Ok(epoch)
    }

    /// Ask `service` for commentary on the loaded video and install the result.
    pub async fn regenerate(&mut self, service: &dyn CommentaryService) -> Result<Epoch> {
        let current = self.store.as_ref().ok_or(PlaycallError::NoVideoLoaded)?;
        let video = current.video().clone();
        let duration = current.duration().ok_or_else(|| {
            PlaycallError::validation("Video duration is not known yet; cannot generate commentary")
        })?;
        let guard = self.epochs.guard();

        let raw = service
            .generate(&CommentaryRequest {
                video: video.clone(),
                duration_seconds: duration,
            })
            .await?;

        if !guard.is_current() {
            warn!(epoch = %guard.epoch(), "discarding commentary for a replaced video");
            return Err(PlaycallError::Superseded {
                epoch: guard.epoch(),
            });
        }
        let store = CommentaryStore::create(video, Some(duration), &raw)?;
        self.install_commentary(store)
    }

    /// The current store and a guard to run a preload pass under.
    pub fn preload_ticket(&self) -> Result<(Arc<CommentaryStore>, EpochGuard)> {
        let store = self.store.clone().ok_or(PlaycallError::NoVideoLoaded)?;
        Ok((store, self.epochs.guard()))
    }

    /// Accept narration only if it was built for the current store.
    pub fn install_narration(&mut self, guard: &EpochGuard, set: NarrationSet) -> bool {
        if !guard.is_current() {
            warn!(epoch = %guard.epoch(), current = %self.epoch(), "discarding stale narration");
            return false;
        }
        self.narration = Some(Arc::new(set));
        true
    }

    /// Preload narration for the current store.
    ///
    /// A fatal speech error still leaves the session playable: a silent set
    /// is installed before the error is returned.
    pub async fn prepare_narration(&mut self, preloader: &Preloader) -> Result<Arc<NarrationSet>> {
        let (store, guard) = self.preload_ticket()?;
        match preloader.preload(&store, &guard).await {
            Ok(PreloadOutcome::Ready(set)) => {
                self.install_narration(&guard, set);
            }
            Ok(PreloadOutcome::Abandoned) => {}
            Err(e) => {
                self.install_narration(&guard, NarrationSet::silent(store.len()));
                return Err(e);
            }
        }
        self.narration
            .clone()
            .ok_or(PlaycallError::Superseded {
                epoch: guard.epoch(),
            })
    }

    pub fn export(&self) -> Result<SessionExport> {
        self.store
            .as_ref()
            .map(|store| store.export())
            .ok_or(PlaycallError::NoVideoLoaded)
    }

    /// Back to nothing loaded.
    pub fn reset(&mut self) -> Epoch {
        self.store = None;
        self.narration = None;
        self.epochs.advance()
    }
}

pub async fn save_session(export: &SessionExport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(export)?;
    fs::write(path, json).await?;
    Ok(())
}

/// Read a `{videoPath, timecodeList}` file back into a store.
pub async fn load_session(path: &Path) -> Result<CommentaryStore> {
    let content = fs::read_to_string(path).await?;
    let raw: RawSession = serde_json::from_str(&content)?;
    CommentaryStore::create(
        VideoReference::from_video_path(&raw.video_path),
        None,
        &raw.timecode_list,
    )
}
