use std::process::Stdio;

use async_trait::async_trait;
use console::style;
use playcall_core::{
    CommentaryEntry, NarrationOutput, NarrationResource, estimate_speech_duration, format_entry,
};
use tokio::{fs, process::Command};
use tracing::warn;

/// Prints each line as it is reached and, with `audio`, plays it through ffplay.
pub struct TerminalNarrator {
    audio: bool,
}

impl TerminalNarrator {
    pub fn new(audio: bool) -> Self {
        Self { audio }
    }

    async fn play_through_ffplay(
        entry: &CommentaryEntry,
        resource: &NarrationResource,
    ) -> anyhow::Result<()> {
        let file = tempfile::Builder::new()
            .prefix("playcall-")
            .suffix(&format!(".{}", resource.file_extension()))
            .tempfile()?;
        fs::write(file.path(), &resource.audio).await?;

        let style = entry.delivery_style();
        let filter = format!(
            "atempo={:.2},volume={:.2}",
            style.rate.clamp(0.5, 2.0),
            style.volume
        );
        let status = Command::new("ffplay")
            .args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-af", &filter])
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            anyhow::bail!("ffplay exited with {status}");
        }
        Ok(())
    }
}

#[async_trait]
impl NarrationOutput for TerminalNarrator {
    async fn speak(&self, index: usize, entry: &CommentaryEntry, resource: &NarrationResource) {
        if self.audio {
            match Self::play_through_ffplay(entry, resource).await {
                Ok(()) => return,
                Err(e) => warn!(index, error = %e, "audio playback failed, pacing by estimate"),
            }
        }

        let length = resource
            .wav_duration()
            .unwrap_or_else(|| estimate_speech_duration(&entry.text, entry.delivery_style()));
        tokio::time::sleep(length).await;
    }

    fn entry_reached(&self, _index: usize, entry: &CommentaryEntry) {
        let line = format_entry(entry);
        let line = match entry.excitement_level {
            Some(4..) => style(line).red().bold(),
            Some(3) => style(line).yellow(),
            _ => style(line).white(),
        };
        println!("  {} {}", style("▶").cyan(), line);
    }

    fn stop(&self) {
        println!("  {}", style("(narration cut)").dim());
    }
}
