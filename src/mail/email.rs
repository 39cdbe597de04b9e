//! Email types as delivered by the mail provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extraction::EmailMetadata;

/// A sender or recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl Participant {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    pub fn named(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// `Name <email>` when a non-empty name is known, else the bare address.
    pub fn display(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{name} <{}>", self.email),
            _ => self.email.clone(),
        }
    }
}

/// One fetched email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from: Vec<Participant>,
    #[serde(default)]
    pub to: Vec<Participant>,
    #[serde(default)]
    pub cc: Vec<Participant>,
    pub received_at: Option<DateTime<Utc>>,
}

impl Email {
    /// Subject and body as one text blob for the model.
    pub fn content(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject, self.body)
    }

    /// Sender address of the first `from` entry, or empty.
    pub fn sender_address(&self) -> &str {
        self.from.first().map(|p| p.email.as_str()).unwrap_or("")
    }

    /// Metadata used to resolve who is responsible for a task.
    pub fn metadata(&self, user_email: Option<&str>) -> EmailMetadata {
        EmailMetadata {
            sender: self.from.first().map(Participant::display),
            recipients: self.to.iter().map(Participant::display).collect(),
            cc: self.cc.iter().map(Participant::display).collect(),
            user_email: user_email
                .filter(|e| !e.trim().is_empty())
                .map(str::to_string),
            subject: (!self.subject.is_empty()).then(|| self.subject.clone()),
        }
    }
}
