use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::SyncError;
use crate::config::PinboardSettings;
use crate::models::Item;

/// Base URL of the Pinboard v1 API.
pub const PINBOARD_API_URL: &str = "https://api.pinboard.in/v1";

const SERVICE: &str = "Pinboard";

/// Requests made before giving up on HTTP 429.
const MAX_ATTEMPTS: u32 = 3;

/// Backoff unit after a 429; the n-th retry waits n units.
const RATE_LIMIT_STEP: Duration = Duration::from_millis(1100);

/// Pinboard truncates `extended` anyway; keep requests short.
const EXTENDED_CHARS: usize = 250;

/// Trait for Pinboard operations.
///
/// This trait enables mocking in unit tests.
pub trait PinboardClientTrait: Send + Sync {
    /// Adds (or replaces) the bookmark for `item`.
    fn add_post(&self, item: &Item, settings: &PinboardSettings) -> Result<(), SyncError>;

    /// Fetches every tag of the account with its usage count.
    fn get_tags(&self) -> Result<Vec<(String, u64)>, SyncError>;
}

/// Blocking Pinboard API client authenticated with a `user:TOKEN` token.
pub struct PinboardClient {
    client: reqwest::blocking::Client,
    base_url: String,
    auth_token: String,
}

impl PinboardClient {
    /// Creates a client for the public Pinboard API.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingToken` for an empty token.
    pub fn new(auth_token: impl Into<String>) -> Result<Self, SyncError> {
        Self::with_base_url(PINBOARD_API_URL, auth_token)
    }

    /// Creates a client against another API root (a proxy or a test server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let base_url = base_url.into();
        let auth_token = auth_token.into();
        if auth_token.is_empty() {
            return Err(SyncError::MissingToken { service: SERVICE });
        }

        reqwest::Url::parse(&base_url)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(SyncError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// GETs `{base}/{method}` with `params` plus auth, and parses the JSON body.
    fn call(
        &self,
        method: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<serde_json::Value, SyncError> {
        params.push(("auth_token", self.auth_token.clone()));
        params.push(("format", "json".to_string()));

        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "calling Pinboard");

        retry_rate_limited(
            || {
                let response = self
                    .client
                    .get(&url)
                    .query(&params)
                    .send()
                    .map_err(SyncError::Network)?;

                let status = response.status();
                if !status.is_success() {
                    return Err(SyncError::Http {
                        service: SERVICE,
                        status: status.as_u16(),
                    });
                }

                let text = response.text().map_err(SyncError::Network)?;
                serde_json::from_str(&text).map_err(SyncError::Serialization)
            },
            RATE_LIMIT_STEP,
        )
    }
}

impl PinboardClientTrait for PinboardClient {
    fn add_post(&self, item: &Item, settings: &PinboardSettings) -> Result<(), SyncError> {
        let json = self.call("posts/add", post_params(item, settings))?;
        check_result(&json)
    }

    fn get_tags(&self) -> Result<Vec<(String, u64)>, SyncError> {
        let json = self.call("tags/get", Vec::new())?;
        parse_tag_counts(json)
    }
}

/// Query parameters of `posts/add`, without auth.
fn post_params(item: &Item, settings: &PinboardSettings) -> Vec<(&'static str, String)> {
    let description = if item.title.is_empty() {
        item.url.clone()
    } else {
        item.title.clone()
    };
    let extended: String = item
        .excerpt
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(EXTENDED_CHARS)
        .collect();

    vec![
        ("url", item.url.clone()),
        ("description", description),
        ("extended", extended),
        ("tags", item.tags.join(" ")),
        ("shared", yes_no(settings.shared)),
        ("toread", yes_no(settings.toread)),
    ]
}

fn yes_no(flag: bool) -> String {
    let value = if flag { "yes" } else { "no" };
    value.to_string()
}

/// Pinboard answers 200 with `{"result_code": "..."}`; anything but `done`
/// is a refusal.
fn check_result(json: &serde_json::Value) -> Result<(), SyncError> {
    match json.get("result_code").and_then(|v| v.as_str()) {
        Some(code) if code != "done" => Err(SyncError::Rejected {
            service: SERVICE,
            code: code.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Reads a `tags/get` response: `{tag: count}` where counts arrive as
/// numbers or numeric strings. Unreadable counts become 0.
fn parse_tag_counts(json: serde_json::Value) -> Result<Vec<(String, u64)>, SyncError> {
    let tags: BTreeMap<String, serde_json::Value> =
        serde_json::from_value(json).map_err(SyncError::Serialization)?;

    Ok(tags
        .into_iter()
        .map(|(name, count)| {
            let count = match &count {
                serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
                serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
                _ => 0,
            };
            (name, count)
        })
        .collect())
}

/// Runs `f` until it stops returning HTTP 429, at most `MAX_ATTEMPTS`
/// times, waiting `step * attempt` between tries.
fn retry_rate_limited<T, F>(mut f: F, step: Duration) -> Result<T, SyncError>
where
    F: FnMut() -> Result<T, SyncError>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match f() {
            Err(SyncError::Http { status: 429, .. }) => {
                if attempt < MAX_ATTEMPTS {
                    let delay = step * attempt;
                    warn!(attempt, ?delay, "Pinboard rate limited, backing off");
                    thread::sleep(delay);
                }
            }
            other => return other,
        }
    }

    Err(SyncError::RateLimited { service: SERVICE })
}
