//! Runs a [`Synchronizer`] against a real clock: one task owns the machine
//! and the video, and every input reaches it as a [`PlayerEvent`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, trace};

use super::{
    machine::{Directive, Synchronizer, Ticket},
    video::VideoSurface,
};
use crate::{
    epoch::Epoch,
    error::{PlaycallError, Result},
    preload::NarrationSet,
    speech::NarrationResource,
    store::CommentaryStore,
    types::CommentaryEntry,
};

const EVENT_BUFFER: usize = 64;

#[derive(Debug)]
pub enum PlayerEvent {
    Load {
        store: Arc<CommentaryStore>,
        narration: Arc<NarrationSet>,
        epoch: Epoch,
    },
    Start,
    Play,
    Pause,
    Seek(f64),
    Reset,
    TimeUpdate(f64),
    Ended,
    NarrationEnded(Ticket),
    CheckDue(Ticket),
}

/// Cloneable sender side of a player.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerEvent>,
}

pub fn player_channel() -> (PlayerHandle, mpsc::Receiver<PlayerEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    (PlayerHandle { tx }, rx)
}

impl PlayerHandle {
    pub fn sender(&self) -> mpsc::Sender<PlayerEvent> {
        self.tx.clone()
    }

    pub async fn send(&self, event: PlayerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| PlaycallError::PlayerClosed)
    }

    pub async fn load(
        &self,
        store: Arc<CommentaryStore>,
        narration: Arc<NarrationSet>,
        epoch: Epoch,
    ) -> Result<()> {
        self.send(PlayerEvent::Load {
            store,
            narration,
            epoch,
        })
        .await
    }

    pub async fn start(&self) -> Result<()> {
        self.send(PlayerEvent::Start).await
    }

    pub async fn play(&self) -> Result<()> {
        self.send(PlayerEvent::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(PlayerEvent::Pause).await
    }

    pub async fn seek(&self, to: f64) -> Result<()> {
        self.send(PlayerEvent::Seek(to)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(PlayerEvent::Reset).await
    }
}

/// Where narration audio goes. `speak` resolves when the line has been
/// spoken in full; a stopped line is dropped mid-await.
#[async_trait]
pub trait NarrationOutput: Send + Sync + 'static {
    async fn speak(&self, index: usize, entry: &CommentaryEntry, resource: &NarrationResource);

    /// Called for every entry that becomes current, spoken or not.
    fn entry_reached(&self, _index: usize, _entry: &CommentaryEntry) {}

    fn stop(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarratedLine {
    pub index: usize,
    pub video_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    pub narrated: Vec<NarratedLine>,
    pub reached: Vec<usize>,
}

pub struct PlaybackDriver<V: VideoSurface> {
    machine: Synchronizer,
    video: V,
    output: Arc<dyn NarrationOutput>,
    handle: PlayerHandle,
    events: mpsc::Receiver<PlayerEvent>,
    narration: Option<(Ticket, JoinHandle<()>)>,
    check: Option<(Ticket, JoinHandle<()>)>,
    report: PlaybackReport,
}

impl<V: VideoSurface> PlaybackDriver<V> {
    pub fn new(
        video: V,
        output: Arc<dyn NarrationOutput>,
        handle: PlayerHandle,
        events: mpsc::Receiver<PlayerEvent>,
    ) -> Self {
        Self {
            machine: Synchronizer::new(),
            video,
            output,
            handle,
            events,
            narration: None,
            check: None,
            report: PlaybackReport::default(),
        }
    }

    /// Process events until the video ends or `shutdown` fires. At the end
    /// of the video a line still being spoken is allowed to finish.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<PlaybackReport> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("playback driver shutting down");
                    self.stop_narration();
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    if self.handle_event(event) {
                        self.finish_narration(&mut shutdown).await;
                        break;
                    }
                }
            }
        }

        self.cancel_check();
        info!(
            narrated = self.report.narrated.len(),
            reached = self.report.reached.len(),
            "playback finished"
        );
        Ok(self.report)
    }

    /// Wait out the line still being spoken at the end of the video. Events
    /// keep draining meanwhile so its completion can always be queued.
    async fn finish_narration(&mut self, shutdown: &mut broadcast::Receiver<()>) {
        let Some((_, mut task)) = self.narration.take() else {
            return;
        };
        loop {
            tokio::select! {
                _ = &mut task => break,
                _ = shutdown.recv() => {
                    task.abort();
                    self.output.stop();
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => trace!(?event, "event after end of video ignored"),
                    None => {
                        let _ = task.await;
                        break;
                    }
                },
            }
        }
    }

        /// Returns true once the video has finished.
    fn handle_event(&mut self, event: PlayerEvent) -> bool {
        let now = self.video.current_time();
        let directives = match event {
            PlayerEvent::Load {
                store,
                narration,
                epoch,
            } => self.machine.load(store, narration, epoch),
            PlayerEvent::Start => self.machine.start(),
            PlayerEvent::Play => self.machine.play(now),
            PlayerEvent::Pause => self.machine.pause(),
            PlayerEvent::Seek(to) => self.machine.seek(to),
            PlayerEvent::Reset => self.machine.reset(),
            PlayerEvent::TimeUpdate(reported) => {
                trace!(reported, now, "time update");
                self.machine.time_update(now)
            }
            PlayerEvent::Ended => self.machine.ended(),
            PlayerEvent::NarrationEnded(ticket) => {
                if self.narration.as_ref().is_some_and(|(t, _)| *t == ticket) {
                    self.narration = None;
                }
                self.machine.narration_ended(ticket, now)
            }
            PlayerEvent::CheckDue(ticket) => {
                if self.check.as_ref().is_some_and(|(t, _)| *t == ticket) {
                    self.check = None;
                }
                self.machine.check_due(ticket, now)
            }
        };

        let mut finished = false;
        for directive in directives {
            finished |= self.apply(directive);
        }
        finished
    }

    fn apply(&mut self, directive: Directive) -> bool {
        match directive {
            Directive::SeekVideo(to) => self.video.seek(to),
            Directive::PlayVideo => self.video.play(),
            Directive::PauseVideo => self.video.pause(),
            Directive::EntryReached { index } => {
                self.report.reached.push(index);
                if let Some(entry) = self.machine.store().and_then(|store| store.get(index)) {
                    self.output.entry_reached(index, entry);
                }
            }
            Directive::Narrate { index, ticket, at } => self.narrate(index, ticket, at),
            Directive::StopNarration => self.stop_narration(),
            Directive::ScheduleCheck { after, ticket } => self.schedule_check(after, ticket),
            Directive::CancelCheck => self.cancel_check(),
            Directive::Finished => return true,
            Directive::Released => debug!("player released commentary"),
        }
        false
    }

    fn narrate(&mut self, index: usize, ticket: Ticket, at: f64) {
        let entry = self
            .machine
            .store()
            .and_then(|store| store.get(index))
            .cloned();
        let resource = self
            .machine
            .narration()
            .and_then(|narration| narration.get(index))
            .cloned();
        let (Some(entry), Some(resource)) = (entry, resource) else {
            return;
        };

        debug!(index, at, "narrating");
        self.report.narrated.push(NarratedLine {
            index,
            video_time: at,
        });

        let output = Arc::clone(&self.output);
        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            output.speak(index, &entry, &resource).await;
            let _ = handle.send(PlayerEvent::NarrationEnded(ticket)).await;
        });
        self.narration = Some((ticket, task));
    }

    fn stop_narration(&mut self) {
        if let Some((_, task)) = self.narration.take() {
            task.abort();
        }
        self.output.stop();
    }

    fn schedule_check(&mut self, after: Duration, ticket: Ticket) {
        self.cancel_check();
        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = handle.send(PlayerEvent::CheckDue(ticket)).await;
        });
        self.check = Some((ticket, task));
    }

    fn cancel_check(&mut self) {
        if let Some((_, task)) = self.check.take() {
            task.abort();
        }
    }
}
