//! Tagging orchestration.
//!
//! A [`TaggingPipeline`] turns a captured page into a stored, tagged item:
//! rank the ledger, ask the suggester, canonicalize against the ranked
//! corpus, commit the item together with its ledger increments, then push
//! to Pinboard when a client is configured. A failed push never fails the
//! save; the item stays `tagged` and the failure is recorded.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Settings, TaggingSettings};
use crate::models::{Item, ItemBuilder, ItemStatus, PageCapture, SyncRecord, SyncService};
use crate::store::Store;
use crate::sync::{PinboardClientTrait, SyncError, content_hash};
use crate::tagging::{Canonicalizer, SuggestionContext, TagSuggester, normalize_all};

/// Result of a sync attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The item was sent to the service.
    Pushed,
    /// The service already has this exact content.
    Unchanged,
}

/// Resolves raw candidates to the slugs stored on an item.
///
/// Canonicalizes against `known`, then re-normalizes the result so alias
/// targets written by hand still end up as valid, unique slugs.
///
/// # Examples
///
/// ```
/// use tagmark::config::TaggingSettings;
/// use tagmark::pipeline::resolve_tags;
///
/// let mut tagging = TaggingSettings::default();
/// tagging.aliases.insert("js".to_string(), "JavaScript".to_string());
///
/// let known = vec!["rust".to_string()];
/// let tags = resolve_tags(&["JS", "Rust!", "rusty"], &known, &tagging);
/// assert_eq!(tags, vec!["javascript", "rust", "rusty"]);
/// ```
pub fn resolve_tags<S: AsRef<str>>(
    candidates: &[S],
    known: &[String],
    tagging: &TaggingSettings,
) -> Vec<String> {
    let canonicalizer = Canonicalizer::new(known, &tagging.aliases, tagging.dedupe_threshold);
    normalize_all(canonicalizer.canonicalize(candidates))
}

/// Capture-to-item workflow over a [`Store`].
pub struct TaggingPipeline<'a> {
    store: &'a Store,
    suggester: TagSuggester,
    pinboard: Option<Box<dyn PinboardClientTrait>>,
}

impl<'a> TaggingPipeline<'a> {
    pub fn new(store: &'a Store, suggester: TagSuggester) -> Self {
        Self {
            store,
            suggester,
            pinboard: None,
        }
    }

    /// Enables pushing saved items to Pinboard.
    pub fn with_pinboard(mut self, client: Box<dyn PinboardClientTrait>) -> Self {
        self.pinboard = Some(client);
        self
    }

    /// Tags and stores a captured page.
    ///
    /// # Errors
    ///
    /// Fails if settings or the ledger cannot be read, the suggester fails,
    /// or the item cannot be committed. Nothing is stored in those cases.
    /// Sync failures are logged and recorded instead.
    pub fn save(&self, capture: PageCapture) -> Result<Item> {
        let settings = self.store.settings()?;
        let ledger = self.store.load_ledger()?;
        let known = ledger.ranked(settings.tagging.known_tag_limit);

        let excerpt = settings
            .privacy
            .mode
            .excerpt(capture.text.as_deref(), settings.llm.max_chars);

        let candidates = self
            .suggester
            .suggest(&SuggestionContext {
                title: &capture.title,
                url: &capture.url,
                domain: &capture.domain,
                excerpt: excerpt.as_deref(),
                known_tags: &known,
            })
            .context("Failed to get tag suggestions")?;

        let tags = resolve_tags(&candidates, &known, &settings.tagging);

        let mut item = ItemBuilder::new()
            .url(capture.url)
            .domain(capture.domain)
            .title(capture.title)
            .excerpt(excerpt)
            .tags(tags)
            .status(ItemStatus::Tagged)
            .build();

        self.store.commit_tagging(&item)?;
        info!(id = %item.id, tags = ?item.tags, "item tagged");

        if self.pinboard.is_some()
            && let Err(e) = self.sync_with(&mut item, &settings)
        {
            warn!(id = %item.id, error = %e, "Pinboard sync failed");
        }

        Ok(item)
    }

    /// Pushes a stored item to Pinboard, skipping it when the last
    /// successful push sent the same content.
    ///
    /// On success the item becomes `synced` and is stored again. On failure
    /// the sync record holds the error and the item is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingToken` when no Pinboard client is
    /// configured, or the push/storage error.
    pub fn sync_item(&self, item: &mut Item) -> Result<SyncOutcome> {
        let settings = self.store.settings()?;
        self.sync_with(item, &settings)
    }

    fn sync_with(&self, item: &mut Item, settings: &Settings) -> Result<SyncOutcome> {
        let Some(pinboard) = &self.pinboard else {
            return Err(SyncError::MissingToken {
                service: "Pinboard",
            }
            .into());
        };

        let hash = content_hash(item);
        if let Some(record) = self.store.sync_record(item.id, SyncService::Pinboard)?
            && record.is_current(&hash)
        {
            info!(id = %item.id, "Pinboard already up to date");
            return Ok(SyncOutcome::Unchanged);
        }

        if let Err(e) = pinboard.add_post(item, &settings.pinboard) {
            self.store.set_sync_record(&SyncRecord::failed(
                item.id,
                SyncService::Pinboard,
                e.to_string(),
            ))?;
            return Err(e.into());
        }

        item.status = ItemStatus::Synced;
        item.last_error = None;
        self.store.upsert_item(item)?;
        self.store
            .set_sync_record(&SyncRecord::ok(item.id, SyncService::Pinboard, hash))?;
        info!(id = %item.id, "item synced to Pinboard");

        Ok(SyncOutcome::Pushed)
    }
}

#[cfg(test)]
#[path = "pipeline/tests.rs"]
mod tests;
