use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DSN_VAR: &str = "CLAUDE_POSTGRES_SERVER_DSN";
pub const HOST_PORT_VAR: &str = "CLAUDE_POSTGRES_SERVER_HOST_PORT";
pub const USER_VAR: &str = "CLAUDE_POSTGRES_SERVER_USER";
pub const PASS_VAR: &str = "CLAUDE_POSTGRES_SERVER_PASS";
pub const DB_NAME_VAR: &str = "CLAUDE_POSTGRES_SERVER_DB_NAME";
pub const BOT_TOKEN_VAR: &str = "CLAUDE_TELEGRAM_BOT_ID";
pub const CHAT_ID_VAR: &str = "CLAUDE_TELEGRAM_CHAT_ID";
pub const API_URL_VAR: &str = "CLAUDE_TELEGRAM_API_URL";
pub const PROJECT_DIR_VAR: &str = "CLAUDE_PROJECT_DIR";
pub const SESSION_ID_VAR: &str = "CLAUDE_SESSION_ID";
pub const LOG_DIR_VAR: &str = "CLAUDE_HOOKS_LOG_DIR";

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const SETTINGS_FILENAME: &str = "hookrelay.toml";

// ===================================================================
// Settings file (.claude/hookrelay.toml)
// ===================================================================

/// Notifier knobs, the `[notify]` table of the settings file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NotifySettings {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    /// Jinja template for the message header. Sees `timestamp`,
    /// `project_dir` and `session_id`.
    #[serde(default)]
    pub header_template: Option<String>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            timeout_secs: default_http_timeout(),
            header_template: None,
        }
    }
}

/// Optional per-project settings. Every key has a default, so a missing
/// file and an empty file behave the same.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_retention")]
    pub log_retention_days: usize,
    /// File name of the YAML fallback, relative to the project directory.
    #[serde(default = "default_prompt_file")]
    pub prompt_file: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub notify: NotifySettings,
}

fn default_max_length() -> usize {
    4096
}

fn default_http_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".into()
}

fn default_retention() -> usize {
    3
}

fn default_prompt_file() -> String {
    "user_prompts.yaml".into()
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: default_log_level(),
            log_retention_days: default_retention(),
            prompt_file: default_prompt_file(),
            connect_timeout_secs: default_connect_timeout(),
            notify: NotifySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults; it is
    /// not created.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Where the settings file lives for a project.
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".claude").join(SETTINGS_FILENAME)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ===================================================================
// Environment-derived configuration
// ===================================================================

/// How to reach PostgreSQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSettings {
    /// A full libpq connection string or URL.
    Dsn(String),
    Discrete {
        host: String,
        port: u16,
        user: String,
        password: String,
        dbname: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

/// Everything a hook needs from its environment, resolved once in `main`.
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    pub database: Option<DatabaseSettings>,
    pub telegram: Option<TelegramSettings>,
    pub project_dir: Option<PathBuf>,
    pub session_id: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub settings: Settings,
    /// Problems found while resolving, logged once a subscriber exists.
    pub warnings: Vec<String>,
}

impl HookConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        Self {
            database: database_settings(&var, &mut warnings),
            telegram: telegram_settings(&var),
            project_dir: var(PROJECT_DIR_VAR).map(PathBuf::from),
            session_id: var(SESSION_ID_VAR).and_then(|s| validate_session_id(&s, &mut warnings)),
            log_dir: var(LOG_DIR_VAR).map(PathBuf::from),
            settings: Settings::default(),
            warnings,
        }
    }

    /// Attach settings loaded from `explicit`, or from the project's
    /// `.claude/hookrelay.toml` when no path is given.
    pub fn with_settings_file(mut self, explicit: Option<&Path>) -> Result<Self> {
        let path = match (explicit, &self.project_dir) {
            (Some(p), _) => Some(p.to_path_buf()),
            (None, Some(dir)) => Some(Settings::default_path(dir)),
            (None, None) => None,
        };
        if let Some(path) = path {
            self.settings = Settings::load(&path)?;
        }
        Ok(self)
    }

    /// Path of the YAML fallback file: under the project directory, else
    /// under the hook's working directory.
    pub fn prompt_file(&self, cwd: Option<&str>) -> PathBuf {
        let base = self
            .project_dir
            .clone()
            .or_else(|| cwd.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(&self.settings.prompt_file)
    }
}

fn database_settings(
    var: &impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) -> Option<DatabaseSettings> {
    if let Some(dsn) = var(DSN_VAR) {
        return Some(DatabaseSettings::Dsn(dsn));
    }

    let (host_port, user, password, dbname) =
        match (var(HOST_PORT_VAR), var(USER_VAR), var(PASS_VAR), var(DB_NAME_VAR)) {
            (Some(h), Some(u), Some(p), Some(d)) => (h, u, p, d),
            _ => return None,
        };

    let (host, port) = match split_host_port(&host_port) {
        Some(hp) => hp,
        None => {
            warnings.push(format!(
                "ignoring unparseable {HOST_PORT_VAR} {host_port:?}, PostgreSQL is not configured"
            ));
            return None;
        }
    };

    Some(DatabaseSettings::Discrete {
        host,
        port,
        user,
        password,
        dbname,
    })
}

/// Split `host[:port]`, defaulting the port to 5432.
pub fn split_host_port(value: &str) -> Option<(String, u16)> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        Some(_) => None,
        None => Some((value.to_string(), DEFAULT_PORT)),
    }
}

fn telegram_settings(var: &impl Fn(&str) -> Option<String>) -> Option<TelegramSettings> {
    let bot_token = var(BOT_TOKEN_VAR)?;
    let chat_id = var(CHAT_ID_VAR)?;
    let api_base = var(API_URL_VAR)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string();
    Some(TelegramSettings {
        bot_token,
        chat_id,
        api_base,
    })
}

/// Session ids from the environment must be UUIDs.
fn validate_session_id(raw: &str, warnings: &mut Vec<String>) -> Option<String> {
    match uuid::Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id.hyphenated().to_string()),
        Err(e) => {
            warnings.push(format!("ignoring malformed {SESSION_ID_VAR} {raw:?}: {e}"));
            None
        }
    }
}
