use super::{Database, SqlValue};
use crate::config::DatabaseSettings;
use anyhow::{Context, Result};
use postgres::types::ToSql;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;

impl SqlValue {
    fn as_pg(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlValue::Text(v) => v,
            SqlValue::Integer(v) => v,
            SqlValue::Timestamp(v) => v,
        }
    }
}

/// Append `sslmode=require` to a DSN that does not choose an SSL mode.
///
/// URL-style DSNs get a query parameter; key/value DSNs get another pair.
pub fn with_ssl_required(dsn: &str) -> String {
    let dsn = dsn.trim();
    if dsn.contains("sslmode=") {
        return dsn.to_string();
    }
    if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
        let sep = if dsn.contains('?') { '&' } else { '?' };
        format!("{dsn}{sep}sslmode=require")
    } else if dsn.is_empty() {
        "sslmode=require".to_string()
    } else {
        format!("{dsn} sslmode=require")
    }
}

/// Quote a key/value conninfo value when it needs it.
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if plain {
        value.to_string()
    } else {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    }
}

/// Render connection settings to the string handed to the driver.
/// Encryption is always requested.
pub fn conninfo(settings: &DatabaseSettings, connect_timeout: Duration) -> String {
    match settings {
        DatabaseSettings::Dsn(dsn) => with_ssl_required(dsn),
        DatabaseSettings::Discrete {
            host,
            port,
            user,
            password,
            dbname,
        } => format!(
            "host={} port={port} dbname={} user={} password={} sslmode=require connect_timeout={}",
            quote(host),
            quote(dbname),
            quote(user),
            quote(password),
            connect_timeout.as_secs(),
        ),
    }
}

/// A live PostgreSQL connection.
pub struct PostgresDatabase {
    client: postgres::Client,
}

impl PostgresDatabase {
    /// Connect, or log why not and return `None`.
    pub fn connect(settings: &DatabaseSettings, timeout: Duration) -> Option<Self> {
        match Self::try_connect(settings, timeout) {
            Ok(db) => {
                tracing::info!("connected to PostgreSQL");
                Some(db)
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "PostgreSQL connection failed");
                None
            }
        }
    }

    fn try_connect(settings: &DatabaseSettings, timeout: Duration) -> Result<Self> {
        let mut config: postgres::Config = conninfo(settings, timeout)
            .parse()
            .context("parsing PostgreSQL connection settings")?;
        config.connect_timeout(timeout);

        // sslmode=require encrypts without verifying the server certificate,
        // matching libpq.
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .context("building TLS connector")?;

        let client = config
            .connect(MakeTlsConnector::new(connector))
            .context("connecting to PostgreSQL")?;
        Ok(Self { client })
    }
}

impl Database for PostgresDatabase {
    fn insert(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(SqlValue::as_pg).collect();
        let mut tx = self.client.transaction().context("starting transaction")?;
        match tx.execute(statement, &refs) {
            Ok(rows) => {
                tx.commit().context("committing insert")?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e).context("executing insert")
            }
        }
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.client
            .batch_execute(sql)
            .context("executing schema statements")
    }
}
