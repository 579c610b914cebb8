use crate::{store::CommentaryStore, timecode, types::CommentaryEntry};

/// Format one entry as `[m:ss] text (excitement n/5)`
pub fn format_entry(entry: &CommentaryEntry) -> String {
    let mut line = format!("[{}] {}", timecode::format(entry.seconds), entry.text);
    if let Some(level) = entry.excitement_level {
        line.push_str(&format!(" (excitement {}/5)", level));
    }
    line
}

pub fn format_commentary_readable(store: &CommentaryStore) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", store.video().video_path()));
    match store.duration() {
        Some(duration) => output.push_str(&format!(
            "**Duration:** {} | **Lines:** {}\n\n",
            timecode::format(duration),
            store.len()
        )),
        None => output.push_str(&format!("**Lines:** {}\n\n", store.len())),
    }

    for entry in store.entries() {
        output.push_str(&format_entry(entry));
        output.push('\n');
    }

    output
}
