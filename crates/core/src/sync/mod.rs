//! Keeps narration aligned with the video clock.

pub mod driver;
pub mod machine;
pub mod video;

pub use driver::{
    NarratedLine, NarrationOutput, PlaybackDriver, PlaybackReport, PlayerEvent, PlayerHandle,
    player_channel,
};
pub use machine::{Directive, PlaybackCursor, SyncState, Synchronizer, Ticket};
pub use video::{SimulatedVideo, TICK, VideoSurface};
