use super::*;
use crate::config::{PinboardSettings, PrivacyMode};
use crate::llm::{LlmClientTrait, LlmError};
use crate::models::{SyncStatus, TagInfo};
use crate::{Database, TagLedger};
use std::sync::{Arc, Mutex};

struct MockLlmClient {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl LlmClientTrait for MockLlmClient {
    fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(self.response.clone())
    }
}

struct FailingLlmClient;

impl LlmClientTrait for FailingLlmClient {
    fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::Http { status: 401 })
    }
}

#[derive(Clone, Default)]
struct MockPinboard {
    posts: Arc<Mutex<Vec<Item>>>,
    fail_with: Option<u16>,
}

impl PinboardClientTrait for MockPinboard {
    fn add_post(&self, item: &Item, _settings: &PinboardSettings) -> Result<(), SyncError> {
        if let Some(status) = self.fail_with {
            return Err(SyncError::Http {
                service: "Pinboard",
                status,
            });
        }
        self.posts.lock().unwrap().push(item.clone());
        Ok(())
    }

    fn get_tags(&self) -> Result<Vec<(String, u64)>, SyncError> {
        Ok(Vec::new())
    }
}

fn store() -> Store {
    Store::new(Database::in_memory().unwrap())
}

fn reply(tags: &[&str]) -> String {
    let tags: Vec<serde_json::Value> = tags
        .iter()
        .map(|t| serde_json::json!({ "name": t, "confidence": 0.9 }))
        .collect();
    serde_json::json!({ "tags": tags }).to_string()
}

fn capture(url: &str) -> PageCapture {
    PageCapture {
        url: url.to_string(),
        title: "A page".to_string(),
        domain: "example.com".to_string(),
        text: Some("Body text of the page".to_string()),
    }
}

fn pipeline<'a>(store: &'a Store, client: Arc<dyn LlmClientTrait>) -> TaggingPipeline<'a> {
    TaggingPipeline::new(store, TagSuggester::new(client, 4000))
}

#[test]
fn save_tags_and_stores_item() {
    let store = store();
    let llm = MockLlmClient::new(&reply(&["Rust", "Web Dev"]));
    let item = pipeline(&store, llm).save(capture("https://a.com")).unwrap();

    assert_eq!(item.tags, vec!["rust", "web-dev"]);
    assert_eq!(item.status, ItemStatus::Tagged);
    assert_eq!(item.domain, "example.com");
    let stored = store.get_item(item.id).unwrap().expect("item should be stored");
    assert_eq!(stored.tags, item.tags);
    assert_eq!(stored.excerpt.as_deref(), Some("Body text of the page"));

    let ledger = store.load_ledger().unwrap();
    assert_eq!(ledger.get("rust").map(TagInfo::count), Some(1));
    assert_eq!(ledger.get("web-dev").map(TagInfo::count), Some(1));
}

#[test]
fn save_merges_into_known_tags() {
    let store = store();
    let ledger: TagLedger = [TagInfo::with_count("machine-learning", 5)]
        .into_iter()
        .collect();
    store.save_ledger(&ledger).unwrap();

    let llm = MockLlmClient::new(&reply(&["machinelearning", "ML"]));
    let item = pipeline(&store, llm.clone())
        .save(capture("https://a.com"))
        .unwrap();

    assert_eq!(item.tags, vec!["machine-learning", "ml"]);
    assert!(llm.last_prompt().contains("Known tags: machine-learning"));

    let ledger = store.load_ledger().unwrap();
    assert_eq!(ledger.get("machine-learning").map(TagInfo::count), Some(6));
}

#[test]
fn save_applies_aliases_and_renormalizes_targets() {
    let store = store();
    let mut settings = store.settings().unwrap();
    settings
        .tagging
        .aliases
        .insert("js".to_string(), "Java Script".to_string());
    store.save_settings(&settings).unwrap();

    let llm = MockLlmClient::new(&reply(&["JS", "javascript"]));
    let item = pipeline(&store, llm).save(capture("https://a.com")).unwrap();

    assert_eq!(item.tags, vec!["java-script", "javascript"]);
}

#[test]
fn empty_alias_target_keeps_the_known_tag() {
    let store = store();
    let mut settings = store.settings().unwrap();
    settings
        .tagging
        .aliases
        .insert("rust".to_string(), String::new());
    store.save_settings(&settings).unwrap();

    let known = vec!["rust".to_string()];
    assert_eq!(resolve_tags(&["Rust"], &known, &settings.tagging), vec!["rust"]);

    let llm = MockLlmClient::new(&reply(&["Rust"]));
    let item = pipeline(&store, llm).save(capture("https://a.com")).unwrap();
    assert_eq!(item.tags, vec!["rust"]);
}

#[test]
fn repeated_saves_raise_rank() {
    let store = store();
    let pipeline_a = pipeline(&store, MockLlmClient::new(&reply(&["zeta"])));
    let pipeline_b = pipeline(&store, MockLlmClient::new(&reply(&["alpha"])));

    pipeline_b.save(capture("https://1.com")).unwrap();
    pipeline_a.save(capture("https://2.com")).unwrap();
    pipeline_a.save(capture("https://3.com")).unwrap();

    assert_eq!(store.load_ledger().unwrap().ranked(1), vec!["zeta"]);
}

#[test]
fn known_tag_limit_restricts_prompt_corpus() {
    let store = store();
    let ledger: TagLedger = [
        TagInfo::with_count("rust", 9),
        TagInfo::with_count("python", 3),
    ]
    .into_iter()
    .collect();
    store.save_ledger(&ledger).unwrap();

    let mut settings = store.settings().unwrap();
    settings.tagging.known_tag_limit = 1;
    store.save_settings(&settings).unwrap();

    let llm = MockLlmClient::new(&reply(&["pythons"]));
    let item = pipeline(&store, llm.clone())
        .save(capture("https://a.com"))
        .unwrap();

    assert!(llm.last_prompt().contains("Known tags: rust"));
    assert!(!llm.last_prompt().contains("python"));
    assert_eq!(item.tags, vec!["pythons"]);
}

#[test]
fn privacy_title_only_sends_no_excerpt() {
    let store = store();
    let mut settings = store.settings().unwrap();
    settings.privacy.mode = PrivacyMode::TitleOnly;
    store.save_settings(&settings).unwrap();

    let llm = MockLlmClient::new(&reply(&["rust"]));
    let item = pipeline(&store, llm.clone())
        .save(capture("https://a.com"))
        .unwrap();

    assert_eq!(item.excerpt, None);
    assert!(!llm.last_prompt().contains("Excerpt:"));
}

#[test]
fn privacy_title_excerpt_caps_at_800_chars() {
    let store = store();
    let llm = MockLlmClient::new(&reply(&["rust"]));
    let mut page = capture("https://a.com");
    page.text = Some("x".repeat(2000));

    let item = pipeline(&store, llm).save(page).unwrap();

    assert_eq!(item.excerpt.map(|e| e.chars().count()), Some(800));
}

#[test]
fn unparseable_reply_saves_untagged_item() {
    let store = store();
    let llm = MockLlmClient::new("I can't help with that.");
    let item = pipeline(&store, llm).save(capture("https://a.com")).unwrap();

    assert!(item.tags.is_empty());
    assert_eq!(item.status, ItemStatus::Tagged);
    assert!(store.load_ledger().unwrap().is_empty());
}

#[test]
fn suggestion_failure_stores_nothing() {
    let store = store();
    let result = pipeline(&store, Arc::new(FailingLlmClient)).save(capture("https://a.com"));

    assert!(result.is_err());
    assert!(store.list_items(10).unwrap().is_empty());
    assert!(store.load_ledger().unwrap().is_empty());
}

#[test]
fn save_syncs_when_pinboard_configured() {
    let store = store();
    let pinboard = MockPinboard::default();
    let posts = pinboard.posts.clone();

    let item = pipeline(&store, MockLlmClient::new(&reply(&["rust"])))
        .with_pinboard(Box::new(pinboard))
        .save(capture("https://a.com"))
        .unwrap();

    assert_eq!(item.status, ItemStatus::Synced);
    assert_eq!(posts.lock().unwrap().len(), 1);
    assert_eq!(
        store.get_item(item.id).unwrap().map(|i| i.status),
        Some(ItemStatus::Synced)
    );
    let record = store
        .sync_record(item.id, SyncService::Pinboard)
        .unwrap()
        .unwrap();
    assert!(record.is_current(&content_hash(&item)));
}

#[test]
fn sync_failure_keeps_item_tagged() {
    let store = store();
    let pinboard = MockPinboard {
        fail_with: Some(500),
        ..MockPinboard::default()
    };

    let item = pipeline(&store, MockLlmClient::new(&reply(&["rust"])))
        .with_pinboard(Box::new(pinboard))
        .save(capture("https://a.com"))
        .unwrap();

    assert_eq!(item.status, ItemStatus::Tagged);
    let record = store
        .sync_record(item.id, SyncService::Pinboard)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SyncStatus::Error);
    assert_eq!(record.last_error.as_deref(), Some("Pinboard error 500"));
}

#[test]
fn sync_item_skips_unchanged_content() {
    let store = store();
    let pinboard = MockPinboard::default();
    let posts = pinboard.posts.clone();
    let pipeline = pipeline(&store, MockLlmClient::new(&reply(&["rust"])))
        .with_pinboard(Box::new(pinboard));

    let mut item = pipeline.save(capture("https://a.com")).unwrap();
    assert_eq!(pipeline.sync_item(&mut item).unwrap(), SyncOutcome::Unchanged);
    assert_eq!(posts.lock().unwrap().len(), 1);

    item.tags.push("web".to_string());
    assert_eq!(pipeline.sync_item(&mut item).unwrap(), SyncOutcome::Pushed);
    assert_eq!(posts.lock().unwrap().len(), 2);
}

#[test]
fn sync_item_without_pinboard_is_missing_token() {
    let store = store();
    let pipeline = pipeline(&store, MockLlmClient::new(&reply(&["rust"])));
    let mut item = pipeline.save(capture("https://a.com")).unwrap();

    let error = pipeline.sync_item(&mut item).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SyncError>(),
        Some(SyncError::MissingToken { .. })
    ));
}
