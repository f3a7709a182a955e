use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::SyncError;
use crate::models::Item;

/// Readwise Reader save endpoint.
pub const READWISE_SAVE_URL: &str = "https://readwise.io/api/reader_api/v3/save";

const SERVICE: &str = "Readwise";

/// Pause between saves during an export.
const EXPORT_PAUSE: Duration = Duration::from_millis(120);

/// Blocking Readwise Reader client.
pub struct ReadwiseClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl ReadwiseClient {
    /// # Errors
    ///
    /// Returns `SyncError::MissingToken` for an empty token.
    pub fn new(token: impl Into<String>) -> Result<Self, SyncError> {
        Self::with_endpoint(READWISE_SAVE_URL, token)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let endpoint = endpoint.into();
        let token = token.into();
        if token.is_empty() {
            return Err(SyncError::MissingToken { service: SERVICE });
        }

        reqwest::Url::parse(&endpoint)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(SyncError::Network)?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    /// Saves one item to Reader.
    pub fn save(&self, item: &Item) -> Result<(), SyncError> {
        debug!(url = %item.url, "saving to Readwise");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Token {}", self.token))
            .json(&save_body(item))
            .send()
            .map_err(SyncError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Http {
                service: SERVICE,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Saves every item, skipping failures. Returns how many were saved.
    pub fn export(&self, items: &[Item]) -> usize {
        export_each(items, EXPORT_PAUSE, |item| self.save(item))
    }
}

fn save_body(item: &Item) -> serde_json::Value {
    let mut body = serde_json::json!({
        "url": item.url,
        "tags": item.tags,
        "source": "tldr"
    });
    if !item.title.is_empty() {
        body["title"] = serde_json::Value::String(item.title.clone());
    }
    body
}

fn export_each<F>(items: &[Item], pause: Duration, mut save: F) -> usize
where
    F: FnMut(&Item) -> Result<(), SyncError>,
{
    let mut saved = 0;
    for item in items {
        match save(item) {
            Ok(()) => {
                saved += 1;
                thread::sleep(pause);
            }
            Err(e) => warn!(url = %item.url, error = %e, "Readwise export failed"),
        }
    }
    saved
}
