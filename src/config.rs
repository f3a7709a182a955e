//! User settings with defaults.
//!
//! Settings are stored as one camelCase JSON document. Every section and
//! field falls back to its default, so a partial document (or one written by
//! an older version) merges cleanly over the defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tagging::AliasTable;

/// Errors from validating settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dedupe threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(u8),

    #[error("known tag limit must be at least 1")]
    InvalidLimit,

    #[error("LLM max chars must be at least 1")]
    InvalidMaxChars,
}

/// How much page text leaves the machine for tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyMode {
    /// Only title, url and domain.
    TitleOnly,
    /// A short excerpt (at most 800 characters).
    #[default]
    TitleExcerpt,
    /// The text truncated to `maxChars`.
    FullTruncated,
}

/// Excerpt cap for `PrivacyMode::TitleExcerpt`.
const SHORT_EXCERPT_CHARS: usize = 800;

impl PrivacyMode {
    /// The excerpt this mode allows from `text`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmark::config::PrivacyMode;
    ///
    /// assert_eq!(PrivacyMode::TitleOnly.excerpt(Some("body"), 4000), None);
    /// assert_eq!(PrivacyMode::FullTruncated.excerpt(Some("body"), 2), Some("bo".to_string()));
    /// ```
    pub fn excerpt(self, text: Option<&str>, max_chars: usize) -> Option<String> {
        let limit = match self {
            Self::TitleOnly => return None,
            Self::TitleExcerpt => SHORT_EXCERPT_CHARS.min(max_chars),
            Self::FullTruncated => max_chars,
        };
        text.map(|t| t.chars().take(limit).collect())
    }
}

impl std::str::FromStr for PrivacyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title_only" => Ok(Self::TitleOnly),
            "title_excerpt" => Ok(Self::TitleExcerpt),
            "full_truncated" => Ok(Self::FullTruncated),
            other => Err(format!(
                "unknown privacy mode '{other}' (expected title_only, title_excerpt or full_truncated)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the secret holding the API key.
    pub api_key_ref: Option<String>,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
    pub max_chars: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.moonshot.cn/v1".to_string(),
            model: "kimi-k2-0905-preview".to_string(),
            api_key_ref: None,
            json_mode: false,
            max_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PinboardSettings {
    /// Name of the secret holding the `user:TOKEN` auth token.
    pub auth_token_ref: Option<String>,
    pub shared: bool,
    pub toread: bool,
}

impl Default for PinboardSettings {
    fn default() -> Self {
        Self {
            auth_token_ref: None,
            shared: true,
            toread: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadwiseSettings {
    pub api_token_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaggingSettings {
    /// How many top-ranked tags the canonicalizer sees.
    pub known_tag_limit: usize,
    /// Minimum similarity (0-100) for a fuzzy merge.
    pub dedupe_threshold: u8,
    /// Alias slug -> canonical slug.
    pub aliases: AliasTable,
}

impl Default for TaggingSettings {
    fn default() -> Self {
        Self {
            known_tag_limit: 200,
            dedupe_threshold: 82,
            aliases: AliasTable::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacySettings {
    pub mode: PrivacyMode,
}

/// All user settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub llm: LlmSettings,
    pub pinboard: PinboardSettings,
    pub readwise: ReadwiseSettings,
    pub tagging: TaggingSettings,
    pub privacy: PrivacySettings,
}

impl Settings {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tagging.dedupe_threshold > 100 {
            return Err(ConfigError::InvalidThreshold(self.tagging.dedupe_threshold));
        }
        if self.tagging.known_tag_limit == 0 {
            return Err(ConfigError::InvalidLimit);
        }
        if self.llm.max_chars == 0 {
            return Err(ConfigError::InvalidMaxChars);
        }
        Ok(())
    }
}
