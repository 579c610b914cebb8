//! The playback synchronizer as a pure state machine.
//!
//! Every input (user action, video event, narration completion, timer) is a
//! method call carrying the current video time. The machine updates its
//! cursor and answers with [`Directive`]s; it never touches a clock or an
//! audio device itself, so the driver and the tests share the same logic.
//!
//! Narration is triggered off the video clock, not the wall clock. A trigger
//! check finds the highest entry index past the cursor whose trigger point
//! has been reached; entries skipped over are never narrated.

use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{epoch::Epoch, preload::NarrationSet, store::CommentaryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Ready,
    Playing,
    Narrating,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackCursor {
    pub current_index: Option<usize>,
    pub is_video_playing: bool,
    pub is_narrating: bool,
}

/// Identifies one narration or one scheduled check. Completions carrying a
/// ticket that is no longer outstanding are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub epoch: Epoch,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    SeekVideo(f64),
    PlayVideo,
    PauseVideo,
    /// The entry at `index` is now current, with or without audio.
    EntryReached { index: usize },
    /// Start the entry's audio from its beginning and report back with `ticket`.
    Narrate { index: usize, ticket: Ticket, at: f64 },
    StopNarration,
    /// Run a trigger check after `after` and report back with `ticket`.
    ScheduleCheck { after: Duration, ticket: Ticket },
    CancelCheck,
    /// The video reached its end; no further triggers.
    Finished,
    /// Store and audio handles were discarded.
    Released,
}

struct Loaded {
    store: Arc<CommentaryStore>,
    narration: Arc<NarrationSet>,
    epoch: Epoch,
    active: bool,
    finished: bool,
}

pub struct Synchronizer {
    loaded: Option<Loaded>,
    cursor: PlaybackCursor,
    narration_ticket: Option<Ticket>,
    check_ticket: Option<Ticket>,
    next_seq: u64,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Self {
            loaded: None,
            cursor: PlaybackCursor::default(),
            narration_ticket: None,
            check_ticket: None,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        match &self.loaded {
            None => SyncState::Idle,
            Some(loaded) if !loaded.active => SyncState::Ready,
            Some(_) if !self.cursor.is_video_playing => SyncState::Paused,
            Some(_) if self.cursor.is_narrating => SyncState::Narrating,
            Some(_) => SyncState::Playing,
        }
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn epoch(&self) -> Option<Epoch> {
        self.loaded.as_ref().map(|loaded| loaded.epoch)
    }

    pub fn store(&self) -> Option<&Arc<CommentaryStore>> {
        self.loaded.as_ref().map(|loaded| &loaded.store)
    }

    pub fn narration(&self) -> Option<&Arc<NarrationSet>> {
        self.loaded.as_ref().map(|loaded| &loaded.narration)
    }

    pub fn is_finished(&self) -> bool {
        self.loaded.as_ref().is_some_and(|loaded| loaded.finished)
    }

    /// Take a store and its narration: `Idle`/any -> `Ready`.
    pub fn load(
        &mut self,
        store: Arc<CommentaryStore>,
        narration: Arc<NarrationSet>,
        epoch: Epoch,
    ) -> Vec<Directive> {
        let mut out = self.release();
        out.retain(|d| *d != Directive::Released);
        debug!(%epoch, entries = store.len(), playable = narration.playable(), "synchronizer loaded");
        self.loaded = Some(Loaded {
            store,
            narration,
            epoch,
            active: false,
            finished: false,
        });
        out
    }

    /// Drop the store and everything tied to it: any state -> `Idle`.
    pub fn reset(&mut self) -> Vec<Directive> {
        self.release()
    }

    fn release(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.loaded.take().is_some() {
            if self.narration_ticket.take().is_some() {
                out.push(Directive::StopNarration);
            }
            if self.check_ticket.take().is_some() {
                out.push(Directive::CancelCheck);
            }
            out.push(Directive::Released);
        }
        self.cursor = PlaybackCursor::default();
        out
    }

    /// Play from the top. Stops any line still being spoken.
    pub fn start(&mut self) -> Vec<Directive> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Vec::new();
        };
        loaded.active = true;
        loaded.finished = false;

        let mut out = Vec::new();
        if self.narration_ticket.take().is_some() {
            out.push(Directive::StopNarration);
        }
        self.cancel_check(&mut out);
        self.cursor = PlaybackCursor {
            current_index: None,
            is_video_playing: true,
            is_narrating: false,
        };
        out.push(Directive::SeekVideo(0.0));
        out.push(Directive::PlayVideo);
        self.check_or_schedule(0.0, &mut out);
        out
    }

    /// Play from wherever the video is: activates a `Ready` session in place,
    /// resumes a paused one, restarts a finished one.
    pub fn play(&mut self, now: f64) -> Vec<Directive> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Vec::new();
        };
        if loaded.finished {
            return self.start();
        }
        if loaded.active && self.cursor.is_video_playing {
            return Vec::new();
        }
        loaded.active = true;
        self.cursor.is_video_playing = true;

        let mut out = vec![Directive::PlayVideo];
        if !self.cursor.is_narrating {
            self.check_or_schedule(now, &mut out);
        }
        out
    }

    /// Pause the video only; a line being spoken runs to its end.
    pub fn pause(&mut self) -> Vec<Directive> {
        if !self.is_active() || !self.cursor.is_video_playing {
            return Vec::new();
        }
        self.cursor.is_video_playing = false;
        let mut out = vec![Directive::PauseVideo];
        self.cancel_check(&mut out);
        out
    }

    /// Move the video. A backward seek past the current entry rewinds the
    /// cursor to the last entry at or before `to`; that entry is not spoken
    /// again, later ones are once the video reaches them.
    pub fn seek(&mut self, to: f64) -> Vec<Directive> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Vec::new();
        };
        let mut to = to.max(0.0);
        if let Some(duration) = loaded.store.duration() {
            to = to.min(duration);
        }
        loaded.finished = false;

        let mut out = vec![Directive::SeekVideo(to)];
        if !loaded.active {
            return out;
        }

        let entries = loaded.store.entries();
        if let Some(current) = self.cursor.current_index {
            if to < entries[current].seconds {
                let landing = (0..current).rev().find(|&j| entries[j].seconds <= to);
                debug!(from = current, to = ?landing, at = to, "backward seek rewound cursor");
                self.cursor.current_index = landing;
            }
        }

        self.cancel_check(&mut out);
        if self.cursor.is_video_playing && !self.cursor.is_narrating {
            self.check_or_schedule(to, &mut out);
        }
        out
    }

    pub fn time_update(&mut self, now: f64) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.is_active() && self.cursor.is_video_playing && !self.cursor.is_narrating {
            self.check(now, &mut out);
        }
        out
    }

    /// A line finished. Catch up at once if the video has already passed the
    /// next trigger point, otherwise wait for it on the video clock.
    pub fn narration_ended(&mut self, ticket: Ticket, now: f64) -> Vec<Directive> {
        if self.narration_ticket != Some(ticket) {
            return Vec::new();
        }
        self.narration_ticket = None;
        self.cursor.is_narrating = false;

        let mut out = Vec::new();
        if self.is_active() && self.cursor.is_video_playing {
            self.check_or_schedule(now, &mut out);
        }
        out
    }

    pub fn check_due(&mut self, ticket: Ticket, now: f64) -> Vec<Directive> {
        if self.check_ticket != Some(ticket) {
            return Vec::new();
        }
        self.check_ticket = None;

        let mut out = Vec::new();
        if self.is_active() && self.cursor.is_video_playing && !self.cursor.is_narrating {
            self.check_or_schedule(now, &mut out);
        }
        out
    }

    /// End of video. Stops triggering; a line being spoken is left to finish.
    pub fn ended(&mut self) -> Vec<Directive> {
        let Some(loaded) = self.loaded.as_mut() else {
            return Vec::new();
        };
        if !loaded.active || loaded.finished {
            return Vec::new();
        }
        loaded.finished = true;
        self.cursor.is_video_playing = false;

        let mut out = Vec::new();
        self.cancel_check(&mut out);
        out.push(Directive::Finished);
        out
    }

    fn is_active(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|loaded| loaded.active && !loaded.finished)
    }

    fn next_ticket(&mut self) -> Option<Ticket> {
        let epoch = self.loaded.as_ref()?.epoch;
        self.next_seq += 1;
        Some(Ticket {
            epoch,
            seq: self.next_seq,
        })
    }

    fn cancel_check(&mut self, out: &mut Vec<Directive>) {
        if self.check_ticket.take().is_some() {
            out.push(Directive::CancelCheck);
        }
    }

    fn check_or_schedule(&mut self, now: f64, out: &mut Vec<Directive>) {
        if !self.check(now, out) && !self.cursor.is_narrating {
            self.schedule_next(now, out);
        }
    }

    /// Fire the latest entry whose trigger point is at or before `now`.
    /// Returns whether an entry became current.
    fn check(&mut self, now: f64, out: &mut Vec<Directive>) -> bool {
        let Some(loaded) = self.loaded.as_ref() else {
            return false;
        };
        let entries = loaded.store.entries();
        let from = self.cursor.current_index.map_or(0, |i| i + 1);
        let Some(index) = (from..entries.len())
            .rev()
            .find(|&j| entries[j].seconds <= now)
        else {
            return false;
        };

        if index > from {
            debug!(skipped = index - from, index, "collapsed to latest entry");
        }
        let has_audio = loaded.narration.get(index).is_some();
        self.cursor.current_index = Some(index);
        self.cancel_check(out);
        out.push(Directive::EntryReached { index });

        if has_audio {
            if let Some(ticket) = self.next_ticket() {
                self.narration_ticket = Some(ticket);
                self.cursor.is_narrating = true;
                out.push(Directive::Narrate {
                    index,
                    ticket,
                    at: now,
                });
            }
        } else {
            debug!(index, "no narration for entry, advancing");
            self.schedule_next(now, out);
        }
        true
    }

    fn schedule_next(&mut self, now: f64, out: &mut Vec<Directive>) {
        let next = self.cursor.current_index.map_or(0, |i| i + 1);
        let Some(next_at) = self
            .loaded
            .as_ref()
            .and_then(|loaded| loaded.store.get(next))
            .map(|entry| entry.seconds)
        else {
            return;
        };
        let Ok(after) = Duration::try_from_secs_f64((next_at - now).max(0.0)) else {
            warn!(index = next, at = next_at, "entry trigger point unreachable, not scheduling");
            return;
        };
        let Some(ticket) = self.next_ticket() else {
            return;
        };
        self.cancel_check(out);
        self.check_ticket = Some(ticket);
        out.push(Directive::ScheduleCheck { after, ticket });
    }
}
