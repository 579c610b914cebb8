//! Pulls the timecode array out of a `generateContent` response.
//!
//! The model answers in one of several shapes: a function call, a fenced JSON
//! block, bare JSON after some prose, or plain `mm:ss text` lines. Each is
//! tried in that order; the first that yields entries wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use super::CommentaryError;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("valid regex"));

static FENCED_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("valid regex"));

static TIMECODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^\w\n]*(\d{1,2}:\d{2}(?::\d{2})?)[^\w\n]*[ \t](?:[-–:][ \t]*)?(\S.*?)[ \t\r]*$")
        .expect("valid regex")
});

pub fn extract_timecodes(response: &Value) -> Result<Value, CommentaryError> {
    if let Some(timecodes) = function_call_timecodes(response) {
        return Ok(timecodes);
    }

    let text = response_text(response).ok_or_else(|| CommentaryError::Extraction {
        reason: "response has neither a function call nor text".to_string(),
    })?;
    timecodes_from_text(&text)
}

fn parts(response: &Value) -> impl Iterator<Item = &Value> {
    response["candidates"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate["content"]["parts"].as_array())
        .flatten()
}

fn function_call_timecodes(response: &Value) -> Option<Value> {
    parts(response)
        .filter_map(|part| part.get("functionCall"))
        .find_map(|call| call["args"].get("timecodes").filter(|t| t.is_array()))
        .cloned()
}

fn response_text(response: &Value) -> Option<String> {
    let text: Vec<&str> = parts(response)
        .filter_map(|part| part["text"].as_str())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join("\n"))
    }
}

pub fn timecodes_from_text(text: &str) -> Result<Value, CommentaryError> {
    let text = text.trim();

    let fenced = FENCED_JSON
        .captures(text)
        .or_else(|| FENCED_ANY.captures(text))
        .and_then(|captures| captures.get(1))
        .and_then(|block| parse_json_prefix(block.as_str()));
    if let Some(timecodes) = fenced {
        return Ok(timecodes);
    }

    let bare = text
        .find(['[', '{'])
        .and_then(|start| parse_json_prefix(&text[start..]));
    if let Some(timecodes) = bare {
        return Ok(timecodes);
    }

    let lines: Vec<Value> = TIMECODE_LINE
        .captures_iter(text)
        .map(|captures| json!({ "time": &captures[1], "text": &captures[2] }))
        .collect();
    if !lines.is_empty() {
        return Ok(Value::Array(lines));
    }

    Err(CommentaryError::Extraction {
        reason: format!(
            "no timecodes found in response text: {}",
            text.chars().take(120).collect::<String>()
        ),
    })
}

/// Parse the first JSON value in `text`, ignoring anything after it, and
/// unwrap `{"timecodes": [...]}`.
fn parse_json_prefix(text: &str) -> Option<Value> {
    let value = serde_json::Deserializer::from_str(text.trim())
        .into_iter::<Value>()
        .next()?
        .ok()?;
    match value {
        Value::Array(_) => Some(value),
        Value::Object(mut object) => match object.remove("timecodes") {
            Some(timecodes @ Value::Array(_)) => Some(timecodes),
            _ => None,
        },
        _ => None,
    }
}
