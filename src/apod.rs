use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;

pub const DEFAULT_FEED_URL: &str = "https://cdn.jsdelivr.net/gh/GCA-Classroom/apod/data.json";
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("feed body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One APOD feed entry. Fields are kept exactly as the feed supplied them;
/// the accessors treat blank strings as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub title: Option<String>,
    pub date: Option<String>,
    pub media_type: String,
    pub url: Option<String>,
    pub hdurl: Option<String>,
    pub thumbnail_url: Option<String>,
    pub explanation: Option<String>,
    pub copyright: Option<String>,
    pub service_version: Option<String>,
}

impl Record {
    /// Lenient decoding: non-object entries and non-string fields never fail,
    /// they just leave the corresponding field empty.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| -> Option<String> {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };
        Self {
            title: field("title"),
            date: field("date"),
            media_type: field("media_type").unwrap_or_default(),
            url: field("url"),
            hdurl: field("hdurl"),
            thumbnail_url: field("thumbnail_url"),
            explanation: field("explanation"),
            copyright: field("copyright"),
            service_version: field("service_version"),
        }
    }

    pub fn display_title(&self) -> &str {
        present(&self.title).unwrap_or(UNTITLED)
    }

    pub fn display_date(&self) -> &str {
        present(&self.date).unwrap_or("")
    }

    pub fn display_explanation(&self) -> &str {
        present(&self.explanation).unwrap_or("")
    }

    pub fn url(&self) -> Option<&str> {
        present(&self.url)
    }

    pub fn hdurl(&self) -> Option<&str> {
        present(&self.hdurl)
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        present(&self.thumbnail_url)
    }

    pub fn copyright(&self) -> Option<&str> {
        present(&self.copyright)
    }
}

pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Decodes a feed document. A valid JSON document that is not an array is a
/// non-sequence feed and yields no records.
pub fn parse_feed(body: &str) -> Result<Vec<Record>, FeedError> {
    let document: Value = serde_json::from_str(body)?;
    match document {
        Value::Array(entries) => Ok(entries.iter().map(Record::from_value).collect()),
        other => {
            tracing::warn!(kind = json_kind(&other), "feed document is not an array");
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("apod-tui/{}", crate::VERSION),
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("apod client user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
        })
    }

    /// Single attempt: no retry, no partial results.
    pub fn load(&self, source_url: &str) -> Result<Vec<Record>, FeedError> {
        let network = |reason: String| FeedError::Network {
            url: source_url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(source_url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|err| network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP status {status}")));
        }

        let body = response.text().map_err(|err| network(err.to_string()))?;
        parse_feed(&body)
    }
}
