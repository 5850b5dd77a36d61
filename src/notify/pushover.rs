//! Pushover delivery over the messages API.

#![allow(missing_docs)]

use std::time::Duration;

use serde::Deserialize;

use crate::core::errors::{MonError, Result};
use crate::notify::Notifier;

/// Pushover messages endpoint.
pub const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

pub struct PushoverNotifier {
    client: reqwest::blocking::Client,
    token: String,
    endpoint: String,
}

impl PushoverNotifier {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hbsdmon/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            endpoint: PUSHOVER_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Notifier for PushoverNotifier {
    fn submit(&self, dest: &str, title: &str, body: &str) -> Result<()> {
        let form = [
            ("token", self.token.as_str()),
            ("user", dest),
            ("title", title),
            ("message", body),
        ];
        let response = self.client.post(&self.endpoint).form(&form).send()?;
        let http_status = response.status();
        let raw = response.text()?;
        let parsed: PushoverResponse = serde_json::from_str(&raw)?;
        check_response(http_status.as_u16(), &parsed)
    }
}

fn check_response(http_status: u16, parsed: &PushoverResponse) -> Result<()> {
    if parsed.status == 1 && http_status < 400 {
        return Ok(());
    }
    let details = if parsed.errors.is_empty() {
        format!("pushover returned HTTP {http_status}")
    } else {
        format!("pushover returned HTTP {http_status}: {}", parsed.errors.join("; "))
    };
    Err(MonError::Notify { details })
}
