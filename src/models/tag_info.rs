use serde::{Deserialize, Serialize};

/// One canonical tag and how often it has been applied.
///
/// `count` goes up by one for every item that resolves to this slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<String>,
    count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<String>,
}

impl TagInfo {
    /// Creates an unused tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmark::TagInfo;
    ///
    /// let tag = TagInfo::new("rust");
    /// assert_eq!(tag.slug(), "rust");
    /// assert_eq!(tag.count(), 0);
    /// ```
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            display: None,
            count: 0,
            aliases: Vec::new(),
        }
    }

    /// Creates a tag with a known usage count.
    pub fn with_count(slug: impl Into<String>, count: u64) -> Self {
        Self {
            count,
            ..Self::new(slug)
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Human-facing label, if one was recorded.
    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn set_display(&mut self, display: impl Into<String>) {
        self.display = Some(display.into());
    }

    pub fn set_aliases(&mut self, aliases: Vec<String>) {
        self.aliases = aliases;
    }

    /// Adds `n` uses, saturating at `u64::MAX`.
    pub fn add_uses(&mut self, n: u64) {
        self.count = self.count.saturating_add(n);
    }
}
