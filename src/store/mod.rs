mod pg;
mod yaml;

pub use self::pg::PostgresDatabase;
pub use self::yaml::YamlSink;

use crate::transcript::ExtractedMetadata;
use anyhow::Result;
use chrono::NaiveDateTime;

// ===================================================================
// Parameters and the database seam
// ===================================================================

/// A bound statement parameter. Every variant is nullable except the
/// timestamp, which this crate always assigns itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Integer(Option<i32>),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Token counts land in `int` columns; anything wider is stored as NULL.
    fn integer(value: Option<i64>, column: &str) -> Self {
        SqlValue::Integer(value.and_then(|n| match i32::try_from(n) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(column, value = n, "value does not fit an int column, storing NULL");
                None
            }
        }))
    }
}

/// The one capability the hooks need from a relational database.
pub trait Database {
    /// Run a parameterized statement in its own transaction: committed on
    /// success, rolled back on failure.
    fn insert(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a batch of parameterless statements.
    fn batch_execute(&mut self, sql: &str) -> Result<()>;
}

// ===================================================================
// Records
// ===================================================================

/// A row this crate writes. Statements are generated only from the
/// constants here, never from record contents.
pub trait Record {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// The required text column.
    fn text(&self) -> &str;

    /// Parameters in `COLUMNS` order.
    fn params(&self) -> Vec<SqlValue>;
}

/// `INSERT INTO <table> (<cols>) VALUES ($1, ..., $n)`.
pub fn insert_statement<R: Record>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptRecord {
    pub created_at: NaiveDateTime,
    pub prompt: String,
    pub session_id: Option<String>,
    pub repository: Option<String>,
}

impl Record for PromptRecord {
    const TABLE: &'static str = "user_prompts";
    const COLUMNS: &'static [&'static str] = &["created_at", "prompt", "session_id", "repository"];

    fn text(&self) -> &str {
        &self.prompt
    }

    fn params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Timestamp(self.created_at),
            SqlValue::Text(Some(self.prompt.clone())),
            SqlValue::Text(self.session_id.clone()),
            SqlValue::Text(self.repository.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub created_at: NaiveDateTime,
    pub output: String,
    pub session_id: Option<String>,
    pub repository: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub model: Option<String>,
    pub service_tier: Option<String>,
}

impl OutputRecord {
    /// Build a record for `output` carrying the reply's metadata.
    pub fn from_metadata(
        output: String,
        meta: ExtractedMetadata,
        session_id: Option<String>,
        repository: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            created_at,
            output,
            session_id,
            repository,
            input_tokens: meta.input_tokens,
            output_tokens: meta.output_tokens,
            model: meta.model,
            service_tier: meta.service_tier,
        }
    }
}

impl Record for OutputRecord {
    const TABLE: &'static str = "llm_outputs";
    const COLUMNS: &'static [&'static str] = &[
        "created_at",
        "output",
        "session_id",
        "repository",
        "input_tokens",
        "output_tokens",
        "model",
        "service_tier",
    ];

    fn text(&self) -> &str {
        &self.output
    }

    fn params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Timestamp(self.created_at),
            SqlValue::Text(Some(self.output.clone())),
            SqlValue::Text(self.session_id.clone()),
            SqlValue::Text(self.repository.clone()),
            SqlValue::integer(self.input_tokens, "input_tokens"),
            SqlValue::integer(self.output_tokens, "output_tokens"),
            SqlValue::Text(self.model.clone()),
            SqlValue::Text(self.service_tier.clone()),
        ]
    }
}

/// Insert one record. Returns `false` on any failure, including a record
/// without text, which never reaches the database.
pub fn insert_record<R: Record>(db: &mut dyn Database, record: &R) -> bool {
    if record.text().is_empty() {
        tracing::warn!(table = R::TABLE, "refusing to insert a record without text");
        return false;
    }
    match db.insert(&insert_statement::<R>(), &record.params()) {
        Ok(_) => {
            tracing::info!(table = R::TABLE, "record inserted");
            true
        }
        Err(e) => {
            tracing::error!(table = R::TABLE, error = %format!("{e:#}"), "insert failed");
            false
        }
    }
}

/// Tables and indexes, for `hookrelay init-db`.
pub const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS user_prompts (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMP NOT NULL,
    prompt TEXT NOT NULL,
    session_id VARCHAR(255),
    repository VARCHAR(500)
);
CREATE INDEX IF NOT EXISTS idx_user_prompts_created_at ON user_prompts (created_at);
CREATE INDEX IF NOT EXISTS idx_user_prompts_session_id ON user_prompts (session_id);
CREATE INDEX IF NOT EXISTS idx_user_prompts_repository ON user_prompts (repository);

CREATE TABLE IF NOT EXISTS llm_outputs (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMP NOT NULL,
    output TEXT NOT NULL,
    session_id VARCHAR(255),
    repository VARCHAR(500),
    input_tokens INTEGER,
    output_tokens INTEGER,
    model VARCHAR(100),
    service_tier VARCHAR(100)
);
CREATE INDEX IF NOT EXISTS idx_llm_outputs_created_at ON llm_outputs (created_at);
CREATE INDEX IF NOT EXISTS idx_llm_outputs_session_id ON llm_outputs (session_id);
CREATE INDEX IF NOT EXISTS idx_llm_outputs_repository ON llm_outputs (repository);
";

// ===================================================================
// Prompt sinks and the fallback policy
// ===================================================================

/// A destination for user prompts.
pub trait PromptSink {
    fn name(&self) -> &'static str;
    fn store(&mut self, record: &PromptRecord) -> bool;
}

/// Stores prompts through a database connection, when there is one.
pub struct DatabaseSink<D: Database> {
    db: Option<D>,
}

impl<D: Database> DatabaseSink<D> {
    pub fn new(db: Option<D>) -> Self {
        Self { db }
    }
}

impl<D: Database> PromptSink for DatabaseSink<D> {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn store(&mut self, record: &PromptRecord) -> bool {
        match self.db.as_mut() {
            Some(db) => insert_record(db, record),
            None => false,
        }
    }
}

/// Try each sink in order and stop at the first that succeeds. Returns
/// that sink's name, or `None` when every sink failed.
pub fn store_with_fallback(
    sinks: &mut [&mut dyn PromptSink],
    record: &PromptRecord,
) -> Option<&'static str> {
    for sink in sinks.iter_mut() {
        let name = sink.name();
        if sink.store(record) {
            tracing::info!(sink = name, "prompt stored");
            return Some(name);
        }
        tracing::info!(sink = name, "prompt not stored, trying next sink");
    }
    None
}
