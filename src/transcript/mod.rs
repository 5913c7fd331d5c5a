use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

// ===================================================================
// Top-level transcript entry, one per JSONL line
// ===================================================================

/// A single line in a Claude Code `.jsonl` transcript file.
///
/// Kept as the decoded JSON object: callers get the whole line back, and
/// the handful of fields this crate cares about are exposed as accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    fields: Map<String, Value>,
}

impl TranscriptEntry {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The `type` tag (`"user"`, `"assistant"`, `"system"`, ...).
    pub fn entry_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// The nested `message` object, if the line carries one.
    pub fn message(&self) -> Option<&Value> {
        self.fields.get("message")
    }

    /// Session id as written by Claude Code (`sessionId`), or the
    /// snake_case spelling some tools emit.
    pub fn session_id(&self) -> Option<&str> {
        self.fields
            .get("sessionId")
            .or_else(|| self.fields.get("session_id"))
            .and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }

    /// Assistant-authored lines qualify on shape alone: the tag must be
    /// `assistant` and a `message` key must exist, whatever it holds.
    pub fn is_assistant(&self) -> bool {
        self.entry_type() == Some("assistant") && self.fields.contains_key("message")
    }
}

// ===================================================================
// Reading: parse-or-skip over JSONL lines
// ===================================================================

/// Decode one raw line. Blank lines and anything that is not a JSON
/// object yield `None`; the reason is only visible at debug level.
fn parse_line(line_no: usize, line: &[u8]) -> Option<TranscriptEntry> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Map<String, Value>>(line) {
        Ok(fields) => Some(TranscriptEntry::new(fields)),
        Err(e) => {
            tracing::debug!(line = line_no, error = %e, "skipping malformed transcript line");
            None
        }
    }
}

/// Lazily decode every well-formed line of a transcript stream, in file
/// order. Reading stops at the first I/O error.
pub fn entries<R: BufRead>(reader: R) -> impl Iterator<Item = TranscriptEntry> {
    reader
        .split(b'\n')
        .map_while(|line| match line {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "transcript read aborted");
                None
            }
        })
        .enumerate()
        .filter_map(|(i, bytes)| parse_line(i + 1, &bytes))
}

/// Return the last assistant entry of the transcript at `path`.
///
/// A missing file, an empty file, or a file with no assistant lines all
/// yield `None`; none of them is an error for the caller.
pub fn read_last_assistant_entry(path: &Path) -> Option<TranscriptEntry> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "transcript not found");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot open transcript");
            return None;
        }
    };
    last_assistant_entry(BufReader::new(file))
}

/// Stream variant of [`read_last_assistant_entry`].
pub fn last_assistant_entry<R: BufRead>(reader: R) -> Option<TranscriptEntry> {
    entries(reader).filter(TranscriptEntry::is_assistant).last()
}

// ===================================================================
// Metadata extraction
// ===================================================================

/// What the hooks keep from an assistant entry. Every field is
/// independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// All `text` blocks joined with `\n`; `None` when there are none.
    pub output: Option<String>,
    pub model: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub service_tier: Option<String>,
}

impl ExtractedMetadata {
    /// The output text, treating an empty string like no output.
    pub fn text(&self) -> Option<&str> {
        self.output.as_deref().filter(|t| !t.is_empty())
    }
}

/// A content block inside `message.content[]`. Only text matters here.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Pull the output text and usage metadata out of an assistant entry.
///
/// Never fails: a missing entry, a missing `message`, a non-array
/// `content` or a non-object `usage` each just leave fields empty.
pub fn extract_metadata(entry: Option<&TranscriptEntry>) -> ExtractedMetadata {
    let Some(message) = entry.and_then(TranscriptEntry::message) else {
        return ExtractedMetadata::default();
    };

    let texts: Vec<String> = message
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|block| match ContentBlock::deserialize(block) {
            Ok(ContentBlock::Text { text }) => Some(text),
            Ok(ContentBlock::Other) | Err(_) => None,
        })
        .collect();
    let output = (!texts.is_empty()).then(|| texts.join("\n"));

    let model = message
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_string);

    let usage = message.get("usage").and_then(Value::as_object);
    let count = |key: &str| usage.and_then(|u| u.get(key)).and_then(Value::as_i64);

    // Cache token counts are reported separately by the API and are not
    // folded into input_tokens.
    let cache_created = count("cache_creation_input_tokens");
    let cache_read = count("cache_read_input_tokens");
    if cache_created.is_some() || cache_read.is_some() {
        tracing::debug!(?cache_created, ?cache_read, "usage carries cache token counts");
    }

    ExtractedMetadata {
        output,
        model,
        input_tokens: count("input_tokens"),
        output_tokens: count("output_tokens"),
        service_tier: usage
            .and_then(|u| u.get("service_tier"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
