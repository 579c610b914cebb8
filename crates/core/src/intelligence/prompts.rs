use serde_json::{Value, json};

pub static COMMENTATOR_INSTRUCTION: &str = r#"
  You are a live TV sports broadcaster calling play-by-play over a short video.
  Whatever the video shows, call it with sports-style energy.

  RULES:
  - Pick 3-4 key moments and give each a short, vivid line
  - Make mundane actions sound thrilling, vary your phrases and transitions
  - If there is one big event, build the excitement up to it
  - Scale the number of moments to the length and content of the video
  - Timing matters: place each line where the moment actually happens
"#;

pub static REFINE_INSTRUCTION: &str = r#"
  Review and tighten play-by-play commentary while keeping the broadcaster energy.

  RULES:
  - Keep each line to 10-15 words, with specific detail (colors, numbers, actions)
  - About 3-4 lines for a 15 second video; a single line for 5 seconds or less
  - Leave at least 3-4 seconds between lines so each can be spoken in full
  - First line at 00:00, last line no later than 80% of the duration
  - Spread lines evenly and make sure events near the end are covered
  - Give each line an excitementLevel from 1 (mildly interesting) to 5 (climactic)
  - Levels should follow the story of the video; avoid repeating a level back to back
  - Mix short punchy phrases with longer sentences, exclamations and questions

  OUTPUT: call set_timecodes, or return ONLY a JSON array:
  [{"time": "mm:ss", "text": "...", "excitementLevel": 3}]
"#;

pub fn key_moments_prompt(duration_seconds: f64) -> String {
    format!(
        "Call energetic play-by-play for this video like a live broadcast. For every significant \
         event, give its timecode (mm:ss) and one or two exciting sentences. Fast-paced clips \
         of 10-15 seconds should have 4-6 moments; slower clips fewer, longer lines. Leave \
         enough room between lines for text-to-speech. The video is {duration_seconds:.1} \
         seconds long. Describe specific visual elements (colors, how many people, kinds of \
         movement, notable objects) and capture how the energy builds and shifts."
    )
}

pub fn refine_prompt(duration_seconds: f64, initial: &Value) -> String {
    let tail_start = (duration_seconds * 0.8).floor();
    format!(
        "Optimize the following commentary, keeping the most important moments with no overlap. \
         The video is {duration_seconds:.1} seconds long. Make sure significant events near the \
         end (around {tail_start:.0} to {duration_seconds:.0} seconds) are covered and assign \
         each line an excitementLevel from 1 to 5:\n{initial}"
    )
}

pub fn set_timecodes_declaration() -> Value {
    json!({
        "name": "set_timecodes",
        "description": "Set the list of timestamped commentary lines for the video.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "timecodes": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "time": {"type": "STRING", "description": "mm:ss offset into the video"},
                            "text": {"type": "STRING", "description": "the commentary line"},
                            "excitementLevel": {"type": "INTEGER", "description": "1 (calm) to 5 (climactic)"},
                        },
                        "required": ["time", "text"],
                    },
                },
            },
            "required": ["timecodes"],
        },
    })
}
