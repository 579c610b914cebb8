//! Input checks that run before anything is sent over the network.

use std::path::{Path, PathBuf};

use tokio::{fs, process::Command};

use crate::{
    config::UploadLimits,
    error::{PlaycallError, Result},
    types::{VIDEO_EXTENSIONS, VideoReference},
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedVideo {
    pub reference: VideoReference,
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

/// Check extension, size and duration of a local video against `limits`.
pub async fn validate_video_file(path: &Path, limits: &UploadLimits) -> Result<ValidatedVideo> {
    let size_bytes = check_file(path, limits).await?;

    let duration_seconds = probe_duration(path).await?;
    if duration_seconds > limits.max_duration_secs {
        return Err(PlaycallError::validation(format!(
            "Video is too long ({:.2} seconds). Max allowed is {} seconds.",
            duration_seconds, limits.max_duration_secs
        )));
    }

    Ok(ValidatedVideo {
        reference: VideoReference::local(path),
        size_bytes,
        duration_seconds,
    })
}

/// The checks that need no external tools. Returns the file size.
async fn check_file(path: &Path, limits: &UploadLimits) -> Result<u64> {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PlaycallError::validation(format!(
            "{} is not a supported video ({})",
            path.display(),
            VIDEO_EXTENSIONS.join(", ")
        )));
    }

    let metadata = fs::metadata(path).await.map_err(|e| {
        PlaycallError::validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(PlaycallError::validation(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let size_mb = metadata.len() as f64 / BYTES_PER_MB;
    if size_mb > limits.max_size_mb {
        return Err(PlaycallError::validation(format!(
            "Video file is too large ({:.2} MB). Max allowed is {} MB.",
            size_mb, limits.max_size_mb
        )));
    }

    Ok(metadata.len())
}

/// Read the container duration with ffprobe
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(path)
        .output()
        .await
        .map_err(|e| probe_failed(path, e.to_string()))?;

    if !output.status.success() {
        return Err(probe_failed(
            path,
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|duration| duration.is_finite() && *duration >= 0.0)
        .ok_or_else(|| probe_failed(path, format!("unexpected ffprobe output {:?}", stdout.trim())))
}

fn probe_failed(path: &Path, reason: String) -> PlaycallError {
    PlaycallError::ProbeFailed {
        path: PathBuf::from(path),
        reason,
    }
}
