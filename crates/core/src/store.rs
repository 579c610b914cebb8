//! The commentary store and its normalization boundary.
//!
//! Everything the commentary service returns passes through [`normalize`]
//! before it becomes a [`CommentaryStore`]. A malformed entry is dropped with a
//! warning; it never discards the rest of the set.

use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::{
    error::{PlaycallError, Result},
    types::{CommentaryEntry, SessionExport, VideoReference},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EntryWarning {
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for EntryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {}: {}", self.index, self.reason)
    }
}

/// Outcome of normalizing a raw commentary payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Ok(Vec<CommentaryEntry>),
    PartialOk {
        entries: Vec<CommentaryEntry>,
        warnings: Vec<EntryWarning>,
    },
    Fatal {
        reason: String,
    },
}

impl Normalized {
    pub fn into_result(self) -> Result<(Vec<CommentaryEntry>, Vec<EntryWarning>)> {
        match self {
            Normalized::Ok(entries) => Ok((entries, Vec::new())),
            Normalized::PartialOk { entries, warnings } => Ok((entries, warnings)),
            Normalized::Fatal { reason } => Err(PlaycallError::InvalidCommentary { reason }),
        }
    }
}

/// Turn an untrusted JSON payload into commentary entries.
pub fn normalize(raw: &Value) -> Normalized {
    let Some(items) = raw.as_array() else {
        return Normalized::Fatal {
            reason: format!("expected an array of entries, got {}", json_kind(raw)),
        };
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match normalize_entry(item) {
            Ok((entry, level_warning)) => {
                if let Some(reason) = level_warning {
                    warnings.push(EntryWarning { index, reason });
                }
                entries.push(entry);
            }
            Err(reason) => warnings.push(EntryWarning { index, reason }),
        }
    }

    if entries.is_empty() && !items.is_empty() {
        return Normalized::Fatal {
            reason: format!(
                "none of the {} entries were usable ({})",
                items.len(),
                warnings
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        };
    }

    if warnings.is_empty() {
        Normalized::Ok(entries)
    } else {
        Normalized::PartialOk { entries, warnings }
    }
}

/// A usable entry, plus a warning if its excitement level had to be discarded.
fn normalize_entry(
    item: &Value,
) -> std::result::Result<(CommentaryEntry, Option<String>), String> {
    let Some(fields) = item.as_object() else {
        return Err(format!("expected an object, got {}", json_kind(item)));
    };

    let time = fields
        .get("time")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing string `time`".to_string())?;

    let text = fields
        .get("text")
        .and_then(Value::as_str)
        .map(|text| text.replace("\\'", "'").trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err("missing or empty `text`".to_string());
    }

    let (level, level_warning) = match fields.get("excitementLevel") {
        None | Some(Value::Null) => (None, None),
        Some(value) => match value.as_u64() {
            Some(level @ 1..=5) => (Some(level as u8), None),
            _ => (
                None,
                Some(format!("ignoring excitementLevel {value}, expected 1-5")),
            ),
        },
    };

    let entry = CommentaryEntry::new(time, text, level).map_err(|e| e.to_string())?;
    Ok((entry, level_warning))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Commentary for one loaded video. Immutable; regenerating builds a new store.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryStore {
    video: VideoReference,
    duration: Option<f64>,
    entries: Vec<CommentaryEntry>,
}

impl CommentaryStore {
    pub fn empty(video: VideoReference, duration: Option<f64>) -> Self {
        Self::from_entries(video, duration, Vec::new())
    }

    pub fn from_entries(
        video: VideoReference,
        duration: Option<f64>,
        entries: Vec<CommentaryEntry>,
    ) -> Self {
        Self {
            video,
            duration,
            entries,
        }
    }

    /// Normalize `raw` and build a store from whatever survived.
    pub fn create(video: VideoReference, duration: Option<f64>, raw: &Value) -> Result<Self> {
        let (entries, warnings) = normalize(raw).into_result()?;
        for warning in &warnings {
            warn!(%warning, "dropped or trimmed commentary entry");
        }
        Ok(Self::from_entries(video, duration, entries))
    }

    pub fn with_duration(&self, duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..self.clone()
        }
    }

    pub fn video(&self) -> &VideoReference {
        &self.video
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn entries(&self) -> &[CommentaryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CommentaryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn export(&self) -> SessionExport {
        SessionExport {
            video_path: self.video.video_path(),
            timecode_list: self.entries.clone(),
        }
    }
}
