use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;

/// Work the dispatcher hands off to run after it has already answered.
/// Resolved on a spawned task that posts its result back through the
/// single-writer pipeline; it must tolerate completing after the consumer
/// has moved on.
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    EnrichFromTranscript { event_id: String, path: PathBuf },
}

/// What transcript parsing recovers for a feed event patch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptSummary {
    pub message_count: usize,
    pub last_assistant_message: Option<String>,
}

/// Read a JSONL transcript leniently: lines that fail to parse are skipped,
/// the count and the last assistant text win out of whatever remains.
pub fn read_transcript_summary(path: &Path) -> std::io::Result<TranscriptSummary> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut summary = TranscriptSummary::default();
    for line in reader.lines() {
        let line = line?;
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let role = value
            .get("role")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if role.is_empty() {
            continue;
        }
        summary.message_count += 1;
        if role == "assistant" {
            if let Some(text) = assistant_text(&value) {
                summary.last_assistant_message = Some(text);
            }
        }
    }
    Ok(summary)
}

/// Assistant text lives either directly under `content` or nested in the
/// host's `message.content` block list.
fn assistant_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("content").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let blocks = value
        .get("message")
        .and_then(|m| m.get("content"))
        .or_else(|| value.get("content"))?
        .as_array()?;
    let joined: Vec<&str> = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join("\n"))
    }
}
