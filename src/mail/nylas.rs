//! Nylas v3 REST client: lists recent inbox messages for one grant.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::MailError;
use crate::mail::{Email, MailSource, Participant};

pub const DEFAULT_API_URI: &str = "https://api.us.nylas.com";

/// Connection settings for the Nylas API.
#[derive(Debug, Clone)]
pub struct NylasConfig {
    pub api_key: SecretString,
    pub api_uri: String,
    pub grant_id: String,
}

/// Mail source backed by the Nylas messages endpoint.
pub struct NylasClient {
    config: NylasConfig,
    client: reqwest::Client,
}

impl NylasClient {
    pub fn new(config: NylasConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/v3/grants/{}/messages",
            self.config.api_uri.trim_end_matches('/'),
            self.config.grant_id
        )
    }

    async fn list_messages(&self, query: &[(&str, String)]) -> Result<Vec<Email>, MailError> {
        let url = self.messages_url();
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::RequestFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| MailError::RequestFailed {
            endpoint: url.clone(),
            reason: format!("failed to read body: {e}"),
        })?;

        match status {
            s if s.is_success() => parse_messages(&text),
            StatusCode::TOO_MANY_REQUESTS => Err(MailError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MailError::AuthFailed(
                format!("HTTP {status}"),
            )),
            _ => {
                let preview: String = text.chars().take(300).collect();
                Err(MailError::RequestFailed {
                    endpoint: url,
                    reason: format!("HTTP {status}: {preview}"),
                })
            }
        }
    }
}

#[async_trait]
impl MailSource for NylasClient {
    fn name(&self) -> &str {
        "nylas"
    }

    async fn fetch_recent(&self, window: Duration, limit: usize) -> Result<Vec<Email>, MailError> {
        let received_after = (Utc::now() - window).timestamp();
        debug!(limit, received_after, "Listing recent Nylas messages");

        let mut emails = self
            .list_messages(&[
                ("limit", limit.to_string()),
                ("received_after", received_after.to_string()),
                ("in", "INBOX".to_string()),
            ])
            .await?;

        sort_newest_first(&mut emails);
        emails.truncate(limit);
        Ok(emails)
    }

    async fn health_check(&self) -> Result<(), MailError> {
        self.list_messages(&[("limit", "1".to_string())])
            .await
            .map(|_| ())
    }
}

fn sort_newest_first(emails: &mut [Email]) {
    emails.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<NylasMessage>,
}

#[derive(Debug, Deserialize)]
struct NylasMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    from: Vec<NylasParticipant>,
    #[serde(default)]
    to: Vec<NylasParticipant>,
    #[serde(default)]
    cc: Vec<NylasParticipant>,
    #[serde(default)]
    date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NylasParticipant {
    #[serde(default)]
    name: Option<String>,
    email: String,
}

impl From<NylasParticipant> for Participant {
    fn from(p: NylasParticipant) -> Self {
        Participant {
            name: p.name.filter(|n| !n.trim().is_empty()),
            email: p.email,
        }
    }
}

impl From<NylasMessage> for Email {
    fn from(m: NylasMessage) -> Self {
        Email {
            id: m.id,
            subject: m.subject.unwrap_or_default(),
            body: m.body.unwrap_or_default(),
            from: m.from.into_iter().map(Participant::from).collect(),
            to: m.to.into_iter().map(Participant::from).collect(),
            cc: m.cc.into_iter().map(Participant::from).collect(),
            received_at: m.date.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

fn parse_messages(text: &str) -> Result<Vec<Email>, MailError> {
    let list: MessageList =
        serde_json::from_str(text).map_err(|e| MailError::InvalidResponse(e.to_string()))?;
    Ok(list.data.into_iter().map(Email::from).collect())
}
