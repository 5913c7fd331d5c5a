use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Fields shared by all hook event inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonInput {
    pub transcript_path: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl CommonInput {
    /// The transcript path with a leading `~` expanded to the home directory.
    pub fn transcript_path(&self) -> PathBuf {
        expand_home(&self.transcript_path)
    }

    /// The session id, if present and non-empty.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }
}

// --- Per-event input structs ---

#[derive(Debug, Deserialize)]
pub struct UserPromptSubmitInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct StopInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub stop_hook_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field to determine which event fired.
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    UserPromptSubmit(UserPromptSubmitInput),
    Stop(StopInput),
    Notification(NotificationInput),
}

/// The lifecycle events a subcommand can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    UserPromptSubmit,
    Stop,
    Notification,
}

impl HookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::Notification => "Notification",
        }
    }
}

impl HookInput {
    /// Access the common fields shared by all hook events.
    pub fn common(&self) -> &CommonInput {
        match self {
            Self::UserPromptSubmit(e) => &e.common,
            Self::Stop(e) => &e.common,
            Self::Notification(e) => &e.common,
        }
    }

    pub fn event(&self) -> HookEvent {
        match self {
            Self::UserPromptSubmit(_) => HookEvent::UserPromptSubmit,
            Self::Stop(_) => HookEvent::Stop,
            Self::Notification(_) => HookEvent::Notification,
        }
    }
}

// ===================================================================
// Input validation
// ===================================================================

/// Why a hook payload was rejected before any work was done.
#[derive(Debug)]
pub enum InputError {
    /// Not JSON, a required field is missing, or the event tag is unknown.
    InvalidJson(String),
    /// Well-formed, but for an event this subcommand does not handle.
    UnexpectedEvent {
        got: &'static str,
        expected: Vec<&'static str>,
    },
    /// `UserPromptSubmit` with a blank prompt.
    EmptyPrompt,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidJson(msg) => write!(f, "invalid hook input: {msg}"),
            InputError::UnexpectedEvent { got, expected } => write!(
                f,
                "unexpected hook event `{got}` (expected {})",
                expected.join(" or ")
            ),
            InputError::EmptyPrompt => write!(f, "no user prompt found in hook input"),
        }
    }
}

impl std::error::Error for InputError {}

/// Parse raw stdin into a `HookInput`, accepting only the listed events.
pub fn parse_hook_input(raw: &str, accepted: &[HookEvent]) -> Result<HookInput, InputError> {
    let input: HookInput =
        serde_json::from_str(raw).map_err(|e| InputError::InvalidJson(e.to_string()))?;

    let event = input.event();
    if !accepted.contains(&event) {
        return Err(InputError::UnexpectedEvent {
            got: event.as_str(),
            expected: accepted.iter().map(|e| e.as_str()).collect(),
        });
    }

    if let HookInput::UserPromptSubmit(e) = &input {
        if e.prompt.trim().is_empty() {
            return Err(InputError::EmptyPrompt);
        }
    }

    Ok(input)
}

/// Expand `~` and `~/...` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests;
