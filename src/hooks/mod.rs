use crate::config::HookConfig;
use crate::decision::{NotifyDecision, OutputDecision, decide_notification, decide_output};
use crate::notify::{DEFAULT_HEADER_TEMPLATE, MessageContext, TelegramClient};
use crate::repository::identify_repository;
use crate::store::{
    self, DatabaseSink, OutputRecord, PostgresDatabase, PromptRecord, YamlSink, insert_record,
    store_with_fallback,
};
use crate::transcript::read_last_assistant_entry;
use crate::types::{HookEvent, HookInput, parse_hook_input};
use anyhow::{Context, Result, bail};
use chrono::Local;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How a handler finished when it did not fail.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    PromptStored { sink: &'static str },
    OutputStored,
    Notified,
    /// Benign: the transcript gave nothing to act on.
    NothingToDo(&'static str),
    /// Benign: the feature is not configured.
    Skipped(&'static str),
    SchemaReady,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::PromptStored { sink } => write!(f, "prompt stored via {sink}"),
            Outcome::OutputStored => write!(f, "assistant output stored"),
            Outcome::Notified => write!(f, "notification sent"),
            Outcome::NothingToDo(why) => write!(f, "nothing to do: {why}"),
            Outcome::Skipped(why) => write!(f, "skipped: {why}"),
            Outcome::SchemaReady => write!(f, "database schema is in place"),
        }
    }
}

/// Transcript and session for `notify` run outside a hook.
#[derive(Debug, Clone)]
pub struct Standalone {
    pub transcript: PathBuf,
    pub session_id: Option<String>,
}

/// The repository is looked up from the project directory, else from the
/// hook's working directory.
fn working_dir(config: &HookConfig, cwd: Option<&str>) -> Option<PathBuf> {
    config
        .project_dir
        .clone()
        .or_else(|| cwd.map(PathBuf::from))
}

fn session_id(config: &HookConfig, from_input: Option<&str>) -> Option<String> {
    from_input
        .map(str::to_string)
        .or_else(|| config.session_id.clone())
}

fn connect(config: &HookConfig) -> Result<PostgresDatabase> {
    let settings = config
        .database
        .as_ref()
        .context("no PostgreSQL connection configured")?;
    PostgresDatabase::connect(settings, config.settings.connect_timeout())
        .context("could not connect to PostgreSQL")
}

// ===================================================================
// UserPromptSubmit: database first, YAML file as fallback
// ===================================================================

pub fn save_prompt(config: &HookConfig, raw: &str) -> Result<Outcome> {
    let HookInput::UserPromptSubmit(event) = parse_hook_input(raw, &[HookEvent::UserPromptSubmit])?
    else {
        bail!("expected a UserPromptSubmit payload");
    };
    let cwd = event.common.cwd.as_deref();

    let record = PromptRecord {
        created_at: Local::now().naive_local(),
        prompt: event.prompt.clone(),
        session_id: session_id(config, event.common.session_id()),
        repository: identify_repository(working_dir(config, cwd).as_deref()),
    };

    let db = match &config.database {
        Some(settings) => PostgresDatabase::connect(settings, config.settings.connect_timeout()),
        None => {
            tracing::info!("no PostgreSQL connection configured, using the fallback file");
            None
        }
    };
    let fallback_path = config.prompt_file(cwd);
    let mut primary = DatabaseSink::new(db);
    let mut fallback = YamlSink::new(fallback_path.clone());

    match store_with_fallback(&mut [&mut primary, &mut fallback], &record) {
        Some(sink) => Ok(Outcome::PromptStored { sink }),
        None => bail!(
            "prompt could not be stored in PostgreSQL or {}",
            fallback_path.display()
        ),
    }
}

// ===================================================================
// Stop: last assistant message into the database
// ===================================================================

pub fn save_output(config: &HookConfig, raw: &str) -> Result<Outcome> {
    let input = parse_hook_input(raw, &[HookEvent::Stop])?;
    if let HookInput::Stop(stop) = &input {
        tracing::debug!(stop_hook_active = ?stop.stop_hook_active, "stop event");
    }
    let common = input.common();

    let entry = read_last_assistant_entry(&common.transcript_path());
    if let Some(e) = &entry {
        tracing::debug!(timestamp = ?e.timestamp(), "found last assistant entry");
    }
    let (output, meta) = match decide_output(entry.as_ref()) {
        OutputDecision::NoAssistantMessage => {
            return Ok(Outcome::NothingToDo("no assistant message in the transcript"));
        }
        OutputDecision::NoText => {
            return Ok(Outcome::NothingToDo("the last assistant message has no text"));
        }
        OutputDecision::Persist { output, meta } => (output, meta),
    };

    let session = session_id(config, common.session_id())
        .or_else(|| entry.as_ref().and_then(|e| e.session_id()).map(str::to_string));

    let mut db = connect(config)?;
    let record = OutputRecord::from_metadata(
        output,
        meta,
        session,
        identify_repository(working_dir(config, common.cwd.as_deref()).as_deref()),
        Local::now().naive_local(),
    );

    if !insert_record(&mut db, &record) {
        bail!("could not store the assistant output");
    }
    Ok(Outcome::OutputStored)
}

// ===================================================================
// Stop / Notification: relay the last assistant message
// ===================================================================

/// Relay the last assistant message. Without Telegram settings this is a
/// no-op and `read_input` is never called.
pub fn notify<F>(config: &HookConfig, standalone: Option<Standalone>, read_input: F) -> Result<Outcome>
where
    F: FnOnce() -> Result<String>,
{
    let Some(telegram) = &config.telegram else {
        tracing::info!("Telegram is not configured, not sending");
        return Ok(Outcome::Skipped("Telegram is not configured"));
    };

    let (transcript, session) = match standalone {
        Some(s) => (s.transcript, s.session_id.or_else(|| config.session_id.clone())),
        None => {
            let raw = read_input()?;
            let input = parse_hook_input(&raw, &[HookEvent::Stop, HookEvent::Notification])?;
            if let HookInput::Notification(n) = &input {
                tracing::debug!(title = ?n.title, message = ?n.message, "notification event");
            }
            let common = input.common();
            (common.transcript_path(), session_id(config, common.session_id()))
        }
    };

    let entry = read_last_assistant_entry(&transcript);
    let session =
        session.or_else(|| entry.as_ref().and_then(|e| e.session_id()).map(str::to_string));
    let settings = &config.settings.notify;
    let project_dir = config
        .project_dir
        .as_ref()
        .map(|d| d.to_string_lossy().into_owned());
    let ctx = MessageContext {
        header_template: settings
            .header_template
            .as_deref()
            .unwrap_or(DEFAULT_HEADER_TEMPLATE),
        max_length: settings.max_length,
        project_dir: project_dir.as_deref(),
        session_id: session.as_deref(),
        now: Local::now().fixed_offset(),
    };

    match decide_notification(entry.as_ref(), &ctx)? {
        NotifyDecision::NoAssistantMessage => {
            Ok(Outcome::NothingToDo("no assistant message in the transcript"))
        }
        NotifyDecision::NoText => Ok(Outcome::NothingToDo("the last assistant message has no text")),
        NotifyDecision::Send(message) => {
            let client = TelegramClient::new(telegram, Duration::from_secs(settings.timeout_secs))?;
            if !client.send(&message) {
                bail!("Telegram did not accept the message");
            }
            Ok(Outcome::Notified)
        }
    }
}

// ===================================================================
// init-db
// ===================================================================

pub fn init_db(config: &HookConfig) -> Result<Outcome> {
    let mut db = connect(config)?;
    store::Database::batch_execute(&mut db, store::SCHEMA)?;
    Ok(Outcome::SchemaReady)
}
