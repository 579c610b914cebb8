//! Play-by-play narration for short videos: commentary generation, speech
//! preloading and a synchronizer that keeps narration on the video clock.

pub mod config;
pub mod epoch;
pub mod error;
pub mod format;
pub mod intelligence;
pub mod preload;
pub mod session;
pub mod speech;
pub mod storage;
pub mod store;
#[cfg(test)]
mod stub_http;
pub mod sync;
pub mod timecode;
pub mod types;
pub mod validate;

pub use config::{Config, GeminiConfig, SpeechConfig, UploadLimits};
pub use epoch::{Epoch, EpochCounter, EpochGuard};
pub use error::{PlaycallError, Result};
pub use format::{format_commentary_readable, format_entry};
pub use intelligence::{
    CommentaryError, CommentaryRequest, CommentaryService, GeminiCommentary, ScriptedCommentary,
};
pub use preload::{NarrationSet, PreloadOutcome, PreloadStatus, Preloader};
pub use session::{Session, load_session, save_session};
pub use speech::{
    ElevenLabsSpeech, NarrationResource, SilentSpeech, SpeechError, SpeechRequest,
    SpeechSynthesizer, estimate_speech_duration,
};
pub use storage::{
    ObjectStorage, SignedUpload, SigningEndpoint, StorageError, get_cache_dir, get_root_cache_dir,
    get_session_path, upload_video,
};
pub use store::{CommentaryStore, EntryWarning, Normalized, normalize};
pub use sync::{
    NarratedLine, NarrationOutput, PlaybackCursor, PlaybackDriver, PlaybackReport, PlayerEvent,
    PlayerHandle, SimulatedVideo, SyncState, Synchronizer, VideoSurface, player_channel,
};
pub use types::{CommentaryEntry, DeliveryStyle, SessionExport, VideoReference};
pub use validate::{ValidatedVideo, validate_video_file};
