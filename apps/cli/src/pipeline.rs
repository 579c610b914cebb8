use std::{path::Path, sync::Arc};

use playcall_core::{
    CommentaryService, Config, ElevenLabsSpeech, GeminiCommentary, NarrationOutput, NarrationSet,
    PlaybackDriver, PlaybackReport, ScriptedCommentary, Session, SigningEndpoint,
    SilentSpeech, SimulatedVideo, SpeechSynthesizer, VideoReference, player_channel,
    upload_video,
};
use tokio::{sync::broadcast, task::JoinHandle};

/// The external services a run talks to, real or scripted.
pub struct Services {
    pub commentary: Box<dyn CommentaryService>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub voice_id: String,
    client: reqwest::Client,
    upload_endpoint: Option<String>,
}

impl Services {
    /// Debug mode never touches the network. Otherwise the speech key must be
    /// set, and the commentary key too when `generating`.
    pub fn from_config(config: &Config, generating: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let voice_id = config.speech.voice_id.clone();

        if config.debug {
            return Ok(Self {
                commentary: Box::new(ScriptedCommentary::new()),
                speech: Arc::new(SilentSpeech::new()),
                voice_id,
                client,
                upload_endpoint: None,
            });
        }

        if generating {
            config.gemini.require_key()?;
        }
        config.speech.require_key()?;
        Ok(Self {
            commentary: Box::new(GeminiCommentary::new(client.clone(), &config.gemini)),
            speech: Arc::new(ElevenLabsSpeech::new(client.clone(), &config.speech)),
            voice_id,
            client,
            upload_endpoint: config.upload_endpoint.clone(),
        })
    }

    /// Upload through the signing endpoint when one is configured, otherwise
    /// hand the local file to the commentary service directly.
    pub async fn video_reference(&self, path: &Path) -> anyhow::Result<VideoReference> {
        match &self.upload_endpoint {
            Some(endpoint) => {
                let storage = SigningEndpoint::new(self.client.clone(), endpoint.clone());
                Ok(upload_video(&storage, &self.client, path).await?)
            }
            None => Ok(VideoReference::local(path)),
        }
    }
}

pub struct PlaybackHandle {
    pub shutdown_tx: broadcast::Sender<()>,
    pub done: JoinHandle<playcall_core::Result<PlaybackReport>>,
}

/// Spawn a driver over a simulated video of `duration` seconds and start it
/// from the top.
pub async fn start_playback(
    session: &Session,
    narration: Arc<NarrationSet>,
    duration: f64,
    output: Arc<dyn NarrationOutput>,
) -> anyhow::Result<PlaybackHandle> {
    let store = session
        .store()
        .cloned()
        .ok_or(playcall_core::PlaycallError::NoVideoLoaded)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let (player, events) = player_channel();
    let video = SimulatedVideo::new(duration, player.sender());
    let driver = PlaybackDriver::new(video, output, player.clone(), events);
    let done = tokio::spawn(driver.run(shutdown_rx));

    player.load(store, narration, session.epoch()).await?;
    player.start().await?;

    Ok(PlaybackHandle {
        shutdown_tx,
        done,
    })
}
