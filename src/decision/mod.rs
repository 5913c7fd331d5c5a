use crate::notify::{MessageContext, format_message};
use crate::transcript::{ExtractedMetadata, TranscriptEntry, extract_metadata};
use std::fmt;

// ===================================================================
// Output: what the Stop-time handlers should do
// ===================================================================

#[derive(Debug, PartialEq)]
pub enum OutputDecision {
    /// The transcript holds no assistant entry (or could not be read).
    NoAssistantMessage,
    /// The last assistant entry carries no text blocks.
    NoText,
    /// Store this. `output` is the non-empty reply text.
    Persist {
        output: String,
        meta: ExtractedMetadata,
    },
}

#[derive(Debug, PartialEq)]
pub enum NotifyDecision {
    NoAssistantMessage,
    NoText,
    /// The fully formatted chat message.
    Send(String),
}

// ===================================================================
// Error: only template rendering can fail in pure code
// ===================================================================

#[derive(Debug)]
pub enum DecisionError {
    TemplateRender(String),
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionError::TemplateRender(msg) => write!(f, "template render error: {msg}"),
        }
    }
}

impl std::error::Error for DecisionError {}

// ===================================================================
// Pure entry points
// ===================================================================

/// Decide whether the last assistant entry yields anything to persist.
pub fn decide_output(entry: Option<&TranscriptEntry>) -> OutputDecision {
    let Some(entry) = entry else {
        return OutputDecision::NoAssistantMessage;
    };
    let meta = extract_metadata(Some(entry));
    let Some(output) = meta.text().map(str::to_string) else {
        return OutputDecision::NoText;
    };
    OutputDecision::Persist { output, meta }
}

/// Decide whether, and what, to relay to the chat.
pub fn decide_notification(
    entry: Option<&TranscriptEntry>,
    ctx: &MessageContext<'_>,
) -> Result<NotifyDecision, DecisionError> {
    let output = match decide_output(entry) {
        OutputDecision::NoAssistantMessage => return Ok(NotifyDecision::NoAssistantMessage),
        OutputDecision::NoText => return Ok(NotifyDecision::NoText),
        OutputDecision::Persist { output, .. } => output,
    };
    format_message(&output, ctx)
        .map(NotifyDecision::Send)
        .map_err(|e| DecisionError::TemplateRender(e.to_string()))
}

#[cfg(test)]
mod tests;
