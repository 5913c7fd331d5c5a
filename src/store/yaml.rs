use super::{PromptRecord, PromptSink};
use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ROOT_KEY: &str = "user_prompts";

/// Entry key for the fallback file: local time to the minute.
pub fn timestamp_key(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Add (or overwrite) the `timestamp_key` entry under `user_prompts` and
/// rewrite the whole file. Existing content that cannot be read as a
/// mapping is left untouched and reported as a failure.
pub fn append_structured(
    path: &Path,
    timestamp_key: &str,
    text: &str,
    session_id: Option<&str>,
) -> bool {
    match try_append(path, timestamp_key, text, session_id) {
        Ok(()) => {
            tracing::info!(path = %path.display(), key = timestamp_key, "prompt written to fallback file");
            true
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %format!("{e:#}"), "fallback file write failed");
            false
        }
    }
}

fn load(path: &Path) -> Result<Mapping> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))? {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => bail!("{} does not hold a mapping", path.display()),
    }
}

fn try_append(
    path: &Path,
    timestamp_key: &str,
    text: &str,
    session_id: Option<&str>,
) -> Result<()> {
    let mut root = load(path)?;

    let prompts = root
        .entry(Value::from(ROOT_KEY))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if prompts.is_null() {
        *prompts = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(prompts) = prompts else {
        bail!("`{ROOT_KEY}` in {} is not a mapping", path.display());
    };

    let mut entry = Mapping::new();
    entry.insert("session_id".into(), session_id.unwrap_or_default().into());
    entry.insert("user_prompt".into(), text.into());
    prompts.insert(timestamp_key.into(), Value::Mapping(entry));

    let rendered = serde_yaml::to_string(&Value::Mapping(root)).context("serializing prompts")?;
    fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))
}

/// The structured-file fallback for prompts.
pub struct YamlSink {
    path: PathBuf,
}

impl YamlSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PromptSink for YamlSink {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn store(&mut self, record: &PromptRecord) -> bool {
        append_structured(
            &self.path,
            &timestamp_key(record.created_at),
            &record.prompt,
            record.session_id.as_deref(),
        )
    }
}
