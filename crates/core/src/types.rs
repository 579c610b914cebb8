use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timecode::{self, TimecodeError};

/// One timestamped narration line.
///
/// `time` keeps the display form the entry arrived with so an exported
/// session reproduces its input; `seconds` is the parsed trigger point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentaryEntry {
    pub time: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excitement_level: Option<u8>,
    #[serde(skip)]
    pub seconds: f64,
}

impl CommentaryEntry {
    pub fn new(
        time: impl Into<String>,
        text: impl Into<String>,
        excitement_level: Option<u8>,
    ) -> Result<Self, TimecodeError> {
        let time = time.into();
        let seconds = timecode::parse(&time)?;
        Ok(Self {
            time,
            text: text.into(),
            excitement_level,
            seconds,
        })
    }

    pub fn delivery_style(&self) -> DeliveryStyle {
        DeliveryStyle::for_excitement(self.excitement_level)
    }
}

/// How a line should be spoken. Never affects when it is spoken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryStyle {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl DeliveryStyle {
    pub const NEUTRAL: DeliveryStyle = DeliveryStyle {
        rate: 1.0,
        pitch: 0.0,
        volume: 1.0,
    };

    pub fn for_excitement(level: Option<u8>) -> Self {
        match level {
            Some(2) => DeliveryStyle {
                rate: 1.1,
                pitch: 0.2,
                volume: 1.0,
            },
            Some(3) => DeliveryStyle {
                rate: 1.2,
                pitch: 0.4,
                volume: 1.0,
            },
            Some(4) | Some(5) => DeliveryStyle {
                rate: 1.4,
                pitch: 0.7,
                volume: 1.2,
            },
            _ => Self::NEUTRAL,
        }
    }
}

/// Opaque handle to the source video, as understood by the commentary service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoReference {
    Local { path: PathBuf, mime_type: String },
    Remote { uri: String, mime_type: String },
}

impl VideoReference {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_for_path(&path).to_string();
        VideoReference::Local { path, mime_type }
    }

    pub fn remote(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let mime_type = mime_for_path(Path::new(&uri)).to_string();
        VideoReference::Remote { uri, mime_type }
    }

    /// Interpret a `videoPath` from a saved session.
    pub fn from_video_path(video_path: &str) -> Self {
        let is_remote = ["http://", "https://", "gs://"]
            .iter()
            .any(|scheme| video_path.starts_with(scheme));
        if is_remote {
            Self::remote(video_path)
        } else {
            Self::local(video_path)
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            VideoReference::Local { mime_type, .. } | VideoReference::Remote { mime_type, .. } => {
                mime_type
            }
        }
    }

    pub fn video_path(&self) -> String {
        match self {
            VideoReference::Local { path, .. } => path.display().to_string(),
            VideoReference::Remote { uri, .. } => uri.clone(),
        }
    }
}

pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "webm", "mkv", "mov", "avi"];

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// The downloadable `{videoPath, timecodeList}` artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub video_path: String,
    pub timecode_list: Vec<CommentaryEntry>,
}

/// A saved session before its entries have been normalized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub video_path: String,
    #[serde(default)]
    pub timecode_list: serde_json::Value,
}
