//! Pushing items to bookmarking and read-later services.
//!
//! - Pinboard: `posts/add` for saved items and `tags/get` to seed the ledger.
//! - Readwise Reader: batch export of items.
//! - GoodLinks: `goodlinks://add` URLs for the caller to open.
//!
//! [`content_hash`] fingerprints what a push sends, so an item whose url,
//! title and tags have not changed since the last successful push can be
//! skipped.

mod goodlinks;
mod pinboard;
mod readwise;

use thiserror::Error;

use crate::models::Item;

pub use goodlinks::goodlinks_url;
pub use pinboard::{PINBOARD_API_URL, PinboardClient, PinboardClientTrait};
pub use readwise::{READWISE_SAVE_URL, ReadwiseClient};

/// Errors from talking to a sync target.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No token configured for the service
    #[error("{service} token not set")]
    MissingToken { service: &'static str },

    /// Network-related errors (connection failures, timeouts, DNS)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("{service} error {status}")]
    Http { service: &'static str, status: u16 },

    /// Still throttled after every retry
    #[error("{service} rate limited")]
    RateLimited { service: &'static str },

    /// The service answered but refused the request
    #[error("{service}: {code}")]
    Rejected { service: &'static str, code: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Fingerprint of the synced fields of an item (url, title, tags).
///
/// # Examples
///
/// ```
/// use tagmark::ItemBuilder;
/// use tagmark::sync::content_hash;
///
/// let a = ItemBuilder::new().url("https://a.com").tags(vec!["x".into()]).build();
/// let mut b = a.clone();
/// assert_eq!(content_hash(&a), content_hash(&b));
///
/// b.tags.push("y".into());
/// assert_ne!(content_hash(&a), content_hash(&b));
/// ```
pub fn content_hash(item: &Item) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(item.url.as_bytes());
    hasher.update(b"\n");
    hasher.update(item.title.as_bytes());
    hasher.update(b"\n");
    for tag in &item.tags {
        hasher.update(tag.as_bytes());
        hasher.update(b"\0");
    }
    hasher.finalize().to_hex().to_string()
}
