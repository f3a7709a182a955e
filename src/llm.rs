/// LLM chat client module.
///
/// This module provides a blocking HTTP client for OpenAI-compatible
/// chat-completions APIs, including error handling, retry logic, and timeout
/// configuration.
mod client;

pub use client::{LlmClient, LlmClientBuilder, LlmClientTrait, LlmError, retry_with_backoff};
