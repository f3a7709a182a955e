//! Tag suggestions for a captured page via an LLM.
//!
//! This module provides the `TagSuggester` struct which asks an
//! OpenAI-compatible chat model for candidate tags. Its output is raw
//! candidate strings; canonicalization happens downstream.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{LlmClientTrait, LlmError};

/// System prompt for tag suggestion.
const SYSTEM_PROMPT: &str = "You tag bookmarks. Prefer existing tags from the provided list; avoid near-duplicates. Output strict JSON {\"tags\":[{\"name\":\"lowercase-slug\",\"confidence\":0-1}]}.";

/// Default cap on excerpt characters sent to the model.
const DEFAULT_MAX_CHARS: usize = 4000;

/// Page details handed to the model.
#[derive(Debug, Clone, Default)]
pub struct SuggestionContext<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub domain: &'a str,
    pub excerpt: Option<&'a str>,
    /// Ranked known tags, most used first.
    pub known_tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SuggestionReply {
    tags: Vec<SuggestedTag>,
}

#[derive(Debug, Deserialize)]
struct SuggestedTag {
    #[serde(default)]
    name: Option<String>,
}

/// Builder for constructing `TagSuggester` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tagmark::llm::LlmClientBuilder;
/// use tagmark::tagging::TagSuggesterBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = LlmClientBuilder::new()
///     .base_url("https://api.openai.com/v1")
///     .model("gpt-4o-mini")
///     .build()?;
///
/// let suggester = TagSuggesterBuilder::new()
///     .client(Arc::new(client))
///     .max_chars(2000)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct TagSuggesterBuilder {
    client: Option<Arc<dyn LlmClientTrait>>,
    max_chars: Option<usize>,
}

impl TagSuggesterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chat client used for suggestions.
    pub fn client(mut self, client: Arc<dyn LlmClientTrait>) -> Self {
        self.client = Some(client);
        self
    }

    /// Caps the number of excerpt characters included in the prompt.
    pub fn max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    /// Builds the `TagSuggester`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Api` if no client was configured.
    pub fn build(self) -> Result<TagSuggester, LlmError> {
        let client = self.client.ok_or_else(|| LlmError::Api {
            message: "tag suggester requires a client".to_string(),
        })?;
        Ok(TagSuggester {
            client,
            max_chars: self.max_chars.unwrap_or(DEFAULT_MAX_CHARS),
        })
    }
}

/// Proposes candidate tags for a page.
pub struct TagSuggester {
    client: Arc<dyn LlmClientTrait>,
    max_chars: usize,
}

impl TagSuggester {
    #[must_use]
    pub fn new(client: Arc<dyn LlmClientTrait>, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    /// Asks the model for tags describing the page.
    ///
    /// Returns lowercased, de-duplicated names in the model's order. An
    /// unparseable reply yields an empty list rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` if the request itself fails.
    pub fn suggest(&self, ctx: &SuggestionContext<'_>) -> Result<Vec<String>, LlmError> {
        let prompt = build_user_prompt(ctx, self.max_chars);
        let reply = self.client.complete(SYSTEM_PROMPT, &prompt)?;
        Ok(parse_suggestions(&reply))
    }
}

fn build_user_prompt(ctx: &SuggestionContext<'_>, max_chars: usize) -> String {
    let mut lines = vec![
        format!("Title: {}", ctx.title),
        format!("URL: {}", ctx.url),
        format!("Domain: {}", ctx.domain),
    ];
    if let Some(excerpt) = ctx.excerpt.filter(|e| !e.is_empty()) {
        let truncated: String = excerpt.chars().take(max_chars).collect();
        lines.push(format!("Excerpt: {truncated}"));
    }
    lines.push(format!("Known tags: {}", ctx.known_tags.join(", ")));
    lines.join("\n")
}

/// Parses a model reply, tolerating prose or code fences around the JSON.
fn parse_suggestions(reply: &str) -> Vec<String> {
    let parsed = serde_json::from_str::<SuggestionReply>(reply.trim())
        .ok()
        .or_else(|| {
            extract_json(reply).and_then(|json| serde_json::from_str::<SuggestionReply>(json).ok())
        });

    let Some(parsed) = parsed else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    parsed
        .tags
        .into_iter()
        .filter_map(|tag| tag.name)
        .map(|name| name.to_lowercase())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Outermost `{...}` span of the reply, if any.
fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockLlmClient {
        response: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl MockLlmClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmClientTrait for MockLlmClient {
        fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(self.response.clone())
        }
    }

    fn context<'a>(known: &'a [String], excerpt: Option<&'a str>) -> SuggestionContext<'a> {
        SuggestionContext {
            title: "Ownership in Rust",
            url: "https://doc.rust-lang.org/book/ch04-00.html",
            domain: "doc.rust-lang.org",
            excerpt,
            known_tags: known,
        }
    }

    #[test]
    fn parses_strict_json_reply() {
        let tags = parse_suggestions(
            r#"{"tags":[{"name":"rust","confidence":0.9},{"name":"memory-safety","confidence":0.7}]}"#,
        );
        assert_eq!(tags, vec!["rust", "memory-safety"]);
    }

    #[test]
    fn extracts_json_wrapped_in_prose_and_fences() {
        let reply = "Sure! Here you go:\n```json\n{\"tags\":[{\"name\":\"Rust\"}]}\n```\nEnjoy.";
        assert_eq!(parse_suggestions(reply), vec!["rust"]);
    }

    #[test]
    fn lowercases_and_dedupes_names() {
        let reply = r#"{"tags":[{"name":"Rust"},{"name":"RUST"},{"name":"Borrow Checker"}]}"#;
        assert_eq!(parse_suggestions(reply), vec!["rust", "borrow checker"]);
    }

    #[test]
    fn skips_missing_and_empty_names() {
        let reply = r#"{"tags":[{"confidence":0.4},{"name":""},{"name":"ok"}]}"#;
        assert_eq!(parse_suggestions(reply), vec!["ok"]);
    }

    #[test]
    fn unparseable_reply_is_empty() {
        assert!(parse_suggestions("no json here").is_empty());
        assert!(parse_suggestions("{not json}").is_empty());
        assert!(parse_suggestions(r#"{"tags":"rust"}"#).is_empty());
        assert!(parse_suggestions(r#"{"labels":[]}"#).is_empty());
    }

    #[test]
    fn extract_json_needs_ordered_braces() {
        assert_eq!(extract_json("} before {"), None);
        assert_eq!(extract_json("x {\"a\":1} y"), Some("{\"a\":1}"));
    }

    #[test]
    fn prompt_lists_page_details_and_known_tags() {
        let known = vec!["rust".to_string(), "programming".to_string()];
        let prompt = build_user_prompt(&context(&known, Some("Ownership rules")), 4000);

        assert_eq!(
            prompt,
            "Title: Ownership in Rust\n\
             URL: https://doc.rust-lang.org/book/ch04-00.html\n\
             Domain: doc.rust-lang.org\n\
             Excerpt: Ownership rules\n\
             Known tags: rust, programming"
        );
    }

    #[test]
    fn prompt_omits_missing_excerpt() {
        let prompt = build_user_prompt(&context(&[], None), 4000);
        assert!(!prompt.contains("Excerpt:"));
        assert!(prompt.ends_with("Known tags: "));
    }

    #[test]
    fn prompt_truncates_excerpt_by_characters() {
        let prompt = build_user_prompt(&context(&[], Some("éééééé")), 3);
        assert!(prompt.contains("Excerpt: ééé\n"));
    }

    #[test]
    fn suggest_sends_system_prompt_and_parses_reply() {
        let mock = Arc::new(MockLlmClient::new(
            r#"{"tags":[{"name":"rust"},{"name":"ownership"}]}"#,
        ));
        let suggester = TagSuggester::new(mock.clone(), 100);

        let known = vec!["rust".to_string()];
        let tags = suggester.suggest(&context(&known, None)).unwrap();
        assert_eq!(tags, vec!["rust", "ownership"]);

        let prompts = mock.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, SYSTEM_PROMPT);
        assert!(prompts[0].1.contains("Known tags: rust"));
    }

    #[test]
    fn suggest_propagates_client_errors() {
        struct FailingClient;

        impl LlmClientTrait for FailingClient {
            fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
                Err(LlmError::Http { status: 401 })
            }
        }

        let suggester = TagSuggester::new(Arc::new(FailingClient), 100);
        let result = suggester.suggest(&context(&[], None));
        assert!(matches!(result, Err(LlmError::Http { status: 401 })));
    }

    #[test]
    fn builder_requires_client() {
        assert!(TagSuggesterBuilder::new().build().is_err());
    }
}
