use crate::config::TelegramSettings;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use minijinja::{Environment, context};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ===================================================================
// Message formatting
// ===================================================================

/// Header shown above every relayed message. Lines for the project and
/// session only appear when those are known.
pub const DEFAULT_HEADER_TEMPLATE: &str = "\
🤖 *Claude Code*
🕐 {{ timestamp }}
{% if project_dir %}📁 `{{ project_dir }}`
{% endif %}{% if session_id %}🔑 `{{ session_id }}`
{% endif %}";

const FENCE: &str = "```";
const ELLIPSIS: &str = "...";

/// Everything about a message except its body.
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
    pub header_template: &'a str,
    /// Limit in Unicode scalar values.
    pub max_length: usize,
    pub project_dir: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub now: DateTime<FixedOffset>,
}

fn render_header(ctx: &MessageContext<'_>) -> Result<String, minijinja::Error> {
    let env = Environment::new();
    let template = env.template_from_str(ctx.header_template)?;
    let rendered = template.render(context! {
        timestamp => ctx.now.to_rfc3339_opts(SecondsFormat::Secs, false),
        project_dir => ctx.project_dir,
        session_id => ctx.session_id,
    })?;
    Ok(rendered.trim_end().to_string())
}

/// Compose the Markdown message: rendered header, a blank line, then the
/// body in a code fence. Only the body is ever shortened.
pub fn format_message(text: &str, ctx: &MessageContext<'_>) -> Result<String, minijinja::Error> {
    let header = render_header(ctx)?;
    // A fence inside the body would close ours early.
    let body = text.replace(FENCE, "'''");

    let opening = format!("{header}\n\n{FENCE}\n");
    let closing = format!("\n{FENCE}");
    let full_len = opening.chars().count() + body.chars().count() + closing.chars().count();
    if full_len <= ctx.max_length {
        return Ok(format!("{opening}{body}{closing}"));
    }

    let reserved = opening.chars().count() + ELLIPSIS.len() + closing.chars().count();
    if reserved > ctx.max_length {
        return Ok(cut_header(&header, ctx.max_length));
    }
    let room = ctx.max_length - reserved;
    let cut: String = body.chars().take(room).collect();
    tracing::info!(
        original = body.chars().count(),
        kept = room,
        "message truncated to fit the chat limit"
    );
    Ok(format!("{opening}{cut}{ELLIPSIS}{closing}"))
}

/// The header alone leaves no room for a body: cut the header instead and
/// keep the result within `max_length`.
fn cut_header(header: &str, max_length: usize) -> String {
    let tail = format!("\n\n{FENCE}\n{ELLIPSIS}\n{FENCE}");
    let room = max_length.saturating_sub(tail.chars().count());
    tracing::warn!(
        header = header.chars().count(),
        limit = max_length,
        "message header does not fit the chat limit, cutting the header"
    );
    let message: String = header.chars().take(room).chain(tail.chars()).collect();
    message.chars().take(max_length).collect()
}

// ===================================================================
// Telegram Bot API
// ===================================================================

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

/// Posts messages to one chat through the Bot API.
pub struct TelegramClient {
    http: Client,
    /// Carries the bot token; never logged.
    endpoint: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(settings: &TelegramSettings, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                settings.api_base, settings.bot_token
            ),
            chat_id: settings.chat_id.clone(),
        })
    }

    /// Deliver `message`. `true` only for HTTP 200 with `"ok": true`.
    pub fn send(&self, message: &str) -> bool {
        match self.try_send(message) {
            Ok(()) => {
                tracing::info!(chat_id = %self.chat_id, "Telegram message sent");
                true
            }
            Err(e) => {
                tracing::error!(chat_id = %self.chat_id, error = %format!("{e:#}"), "Telegram send failed");
                false
            }
        }
    }

    fn try_send(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
                parse_mode: "Markdown",
            })
            .send()
            .map_err(reqwest::Error::without_url)
            .context("posting to the Bot API")?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().ok();
        let description = body
            .as_ref()
            .and_then(|b| b.description.clone())
            .unwrap_or_default();

        if status != StatusCode::OK {
            bail!("Bot API answered {status} {description}");
        }
        match body {
            Some(ApiResponse { ok: true, .. }) => Ok(()),
            Some(_) => bail!("Bot API rejected the message: {description}"),
            None => bail!("Bot API response was not JSON"),
        }
    }
}
