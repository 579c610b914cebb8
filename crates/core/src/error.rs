use std::path::PathBuf;
use thiserror::Error;

use crate::{
    epoch::Epoch,
    intelligence::CommentaryError, speech::SpeechError, storage::StorageError,
    timecode::TimecodeError,
};

#[derive(Error, Debug)]
pub enum PlaycallError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("Could not probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Commentary generation failed: {0}")]
    Commentary(#[from] CommentaryError),

    #[error("Narration preload failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid timecode: {0}")]
    Timecode(#[from] TimecodeError),

    #[error("Invalid commentary: {reason}")]
    InvalidCommentary { reason: String },

    #[error("No video is loaded")]
    NoVideoLoaded,

    #[error("Superseded by newer commentary ({epoch})")]
    Superseded { epoch: Epoch },

    #[error("Player has shut down")]
    PlayerClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

impl PlaycallError {
    pub fn validation(reason: impl Into<String>) -> Self {
        PlaycallError::Validation {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaycallError>;
