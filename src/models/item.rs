use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ItemId;

/// Processing state of a saved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Captured but not yet tagged.
    New,
    /// Tags resolved and stored locally.
    Tagged,
    /// Pushed to the bookmarking service.
    Synced,
    /// Processing failed; see `last_error`.
    Error,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Tagged => write!(f, "tagged"),
            Self::Synced => write!(f, "synced"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "tagged" => Ok(Self::Tagged),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// A captured page: what the upstream extractor hands to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageCapture {
    pub url: String,
    pub title: String,
    pub domain: String,
    /// Readable text of the page, if extraction produced any.
    pub text: Option<String>,
}

/// A bookmarked page with its canonical tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub url: String,
    pub domain: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Canonical tag slugs, in resolution order.
    pub tags: Vec<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Builder for constructing `Item` instances with optional fields.
///
/// # Examples
///
/// ```
/// use tagmark::{ItemBuilder, ItemStatus};
///
/// let item = ItemBuilder::new()
///     .url("https://example.com/post")
///     .title("A post")
///     .tags(vec!["rust".to_string()])
///     .build();
///
/// assert_eq!(item.domain, "example.com");
/// assert_eq!(item.status, ItemStatus::New);
/// ```
#[derive(Debug, Default)]
pub struct ItemBuilder {
    id: Option<ItemId>,
    url: Option<String>,
    domain: Option<String>,
    title: Option<String>,
    excerpt: Option<String>,
    created_at: Option<OffsetDateTime>,
    tags: Option<Vec<String>>,
    status: Option<ItemStatus>,
    last_error: Option<String>,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn excerpt(mut self, excerpt: Option<String>) -> Self {
        self.excerpt = excerpt;
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn last_error(mut self, last_error: Option<String>) -> Self {
        self.last_error = last_error;
        self
    }

    /// Builds the `Item`.
    ///
    /// Missing fields default to: a fresh id, empty url/title, the url's host
    /// as domain, now as creation time, no tags, status `new`.
    pub fn build(self) -> Item {
        let url = self.url.unwrap_or_default();
        let domain = self.domain.unwrap_or_else(|| domain_of(&url));
        Item {
            id: self.id.unwrap_or_else(ItemId::generate),
            url,
            domain,
            title: self.title.unwrap_or_default(),
            excerpt: self.excerpt,
            created_at: self.created_at.unwrap_or_else(OffsetDateTime::now_utc),
            tags: self.tags.unwrap_or_default(),
            status: self.status.unwrap_or(ItemStatus::New),
            last_error: self.last_error,
        }
    }
}

/// Host part of `url`, or an empty string if it has none.
///
/// # Examples
///
/// ```
/// use tagmark::models::domain_of;
///
/// assert_eq!(domain_of("https://blog.rust-lang.org/2024/"), "blog.rust-lang.org");
/// assert_eq!(domain_of("not a url"), "");
/// ```
pub fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
