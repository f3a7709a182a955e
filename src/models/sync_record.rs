use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ItemId;

/// External service an item can be pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncService {
    Pinboard,
    Readwise,
}

impl fmt::Display for SyncService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pinboard => write!(f, "pinboard"),
            Self::Readwise => write!(f, "readwise"),
        }
    }
}

impl FromStr for SyncService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pinboard" => Ok(Self::Pinboard),
            "readwise" => Ok(Self::Readwise),
            other => Err(format!("unknown sync service: {other}")),
        }
    }
}

/// Outcome of the most recent push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Ok,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// Per-item, per-service sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub item_id: ItemId,
    pub service: SyncService,
    /// Content hash of what was last pushed (url, title, tags).
    pub last_hash: Option<String>,
    pub status: SyncStatus,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SyncRecord {
    /// Records a successful push of content with `hash`.
    pub fn ok(item_id: ItemId, service: SyncService, hash: impl Into<String>) -> Self {
        Self {
            item_id,
            service,
            last_hash: Some(hash.into()),
            status: SyncStatus::Ok,
            last_error: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Records a failed push.
    pub fn failed(item_id: ItemId, service: SyncService, error: impl Into<String>) -> Self {
        Self {
            item_id,
            service,
            last_hash: None,
            status: SyncStatus::Error,
            last_error: Some(error.into()),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// True when this record shows `hash` was already pushed successfully.
    pub fn is_current(&self, hash: &str) -> bool {
        self.status == SyncStatus::Ok && self.last_hash.as_deref() == Some(hash)
    }
}
