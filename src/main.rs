use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tagmark::config::{ConfigError, PrivacyMode, Settings};
use tagmark::db::{default_database_path, ensure_database_directory};
use tagmark::llm::LlmClientBuilder;
use tagmark::pipeline::resolve_tags;
use tagmark::sync::{
    PinboardClient, PinboardClientTrait, ReadwiseClient, SyncError, goodlinks_url,
};
use tagmark::tagging::{TagSuggester, normalize};
use tagmark::{Database, ItemId, PageCapture, Store, SyncOutcome, TaggingPipeline};
use tracing_subscriber::EnvFilter;

/// tagmark - LLM-assisted bookmark tagging with a self-converging vocabulary
#[derive(Parser)]
#[command(name = "tagmark")]
#[command(about = "Tag bookmarks with an LLM and keep the tag vocabulary canonical")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Tag and store a page
    Save(SaveCommand),
    /// List saved items, newest first
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show the most used tags
    Tags {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Resolve candidate tags against the current vocabulary without saving
    Canonicalize {
        #[arg(value_name = "CANDIDATE", required = true)]
        candidates: Vec<String>,
    },
    /// Manage tag aliases
    #[command(subcommand)]
    Alias(AliasCommand),
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage stored secrets
    #[command(subcommand)]
    Secret(SecretCommand),
    /// Push a saved item to Pinboard
    Sync {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Add Pinboard tag counts to the local vocabulary
    ImportPinboardTags,
    /// Export recent items to another service
    Export {
        #[arg(value_enum)]
        target: ExportTarget,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
}

/// Tag and store a page
#[derive(Parser)]
struct SaveCommand {
    #[arg(long)]
    url: String,

    #[arg(long, default_value = "")]
    title: String,

    /// Defaults to the host of the URL
    #[arg(long)]
    domain: Option<String>,

    /// File with the page text; `-` reads stdin
    #[arg(long, value_name = "FILE")]
    text_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AliasCommand {
    /// Map a tag to a canonical tag
    Add { from: String, to: String },
    /// Remove an alias
    Remove { from: String },
    /// List aliases
    List,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print settings as JSON
    Show,
    /// Minimum similarity (0-100) for merging into a known tag
    SetThreshold { value: u8 },
    /// How many top tags are visible to matching
    SetLimit { value: usize },
    /// title_only, title_excerpt or full_truncated
    SetPrivacy { mode: PrivacyMode },
    /// Configure the chat-completions endpoint
    SetLlm {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Name of the secret holding the API key
        #[arg(long)]
        api_key_ref: Option<String>,
        #[arg(long)]
        json_mode: Option<bool>,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Name the secrets holding service tokens
    SetTokens {
        #[arg(long)]
        pinboard: Option<String>,
        #[arg(long)]
        readwise: Option<String>,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Store a secret; an empty value removes it
    Set { key: String, value: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ExportTarget {
    Readwise,
    Goodlinks,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = open_store().and_then(|store| run(&cli.command, &store));

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr, filtered by `TAGMARK_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGMARK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store() -> Result<Store> {
    let db_path = default_database_path()?;
    ensure_database_directory(&db_path)?;
    let db = Database::open(&db_path).context("Failed to open database")?;
    Ok(Store::new(db))
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors include invalid settings, missing tokens and bad input.
/// Internal errors include database failures, network and I/O errors.
fn is_user_error(error: &anyhow::Error) -> bool {
    let typed = error.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<SyncError>(),
                Some(SyncError::MissingToken { .. })
            )
    });
    let error_msg = error.to_string();
    typed
        || error_msg.contains("cannot be empty")
        || error_msg.contains("not found")
        || error_msg.contains("Invalid item id")
}

fn run(command: &Commands, store: &Store) -> Result<()> {
    match command {
        Commands::Save(cmd) => execute_save(cmd, store),
        Commands::List { limit } => execute_list(store, *limit),
        Commands::Tags { limit } => execute_tags(store, *limit),
        Commands::Canonicalize { candidates } => {
            for slug in execute_canonicalize(store, candidates)? {
                println!("{slug}");
            }
            Ok(())
        }
        Commands::Alias(cmd) => execute_alias(cmd, store),
        Commands::Config(cmd) => execute_config(cmd, store),
        Commands::Secret(SecretCommand::Set { key, value }) => {
            store.set_secret(key, value)?;
            println!("Secret '{key}' {}", if value.is_empty() { "removed" } else { "saved" });
            Ok(())
        }
        Commands::Sync { id } => execute_sync(store, id),
        Commands::ImportPinboardTags => {
            let client = pinboard_client(store, &store.settings()?)?
                .ok_or(SyncError::MissingToken { service: "Pinboard" })?;
            let counts = client.get_tags()?;
            let imported = store.import_tag_counts(counts)?;
            println!("Imported {imported} tags from Pinboard");
            Ok(())
        }
        Commands::Export { target, limit } => execute_export(store, *target, *limit),
    }
}

/// Builds the tagging pipeline from stored settings and secrets.
fn build_pipeline(store: &Store) -> Result<TaggingPipeline<'_>> {
    let settings = store.settings()?;
    let api_key = store.secret_ref(settings.llm.api_key_ref.as_deref())?;

    let client = LlmClientBuilder::new()
        .base_url(settings.llm.base_url.clone())
        .model(settings.llm.model.clone())
        .api_key(api_key)
        .json_mode(settings.llm.json_mode)
        .build()
        .context("Failed to create LLM client")?;
    let suggester = TagSuggester::new(Arc::new(client), settings.llm.max_chars);

    let mut pipeline = TaggingPipeline::new(store, suggester);
    if let Some(pinboard) = pinboard_client(store, &settings)? {
        pipeline = pipeline.with_pinboard(Box::new(pinboard));
    }
    Ok(pipeline)
}

fn pinboard_client(store: &Store, settings: &Settings) -> Result<Option<PinboardClient>> {
    match store.secret_ref(settings.pinboard.auth_token_ref.as_deref())? {
        Some(token) => Ok(Some(PinboardClient::new(token)?)),
        None => Ok(None),
    }
}

fn execute_save(cmd: &SaveCommand, store: &Store) -> Result<()> {
    if cmd.url.trim().is_empty() {
        anyhow::bail!("URL cannot be empty");
    }
    let text = match &cmd.text_file {
        Some(path) => Some(read_text(path)?),
        None => None,
    };
    let capture = page_capture(&cmd.url, &cmd.title, cmd.domain.as_deref(), text);

    let item = build_pipeline(store)?.save(capture)?;
    println!("Saved {} [{}]: {}", item.id, item.status, item.tags.join(", "));
    Ok(())
}

fn page_capture(url: &str, title: &str, domain: Option<&str>, text: Option<String>) -> PageCapture {
    PageCapture {
        url: url.to_string(),
        title: title.to_string(),
        domain: domain
            .map(str::to_string)
            .unwrap_or_else(|| tagmark::models::domain_of(url)),
        text: text.filter(|t| !t.trim().is_empty()),
    }
}

fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read page text from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page text from {}", path.display()))
}

fn execute_list(store: &Store, limit: usize) -> Result<()> {
    for item in store.list_items(limit)? {
        println!(
            "{}  {:<6}  {}  {}",
            item.id,
            item.status.to_string(),
            item.url,
            item.tags.join(", ")
        );
    }
    Ok(())
}

fn execute_tags(store: &Store, limit: usize) -> Result<()> {
    let ledger = store.load_ledger()?;
    for slug in ledger.ranked(limit) {
        let count = ledger.get(&slug).map_or(0, |info| info.count());
        println!("{count:>6}  {slug}");
    }
    Ok(())
}

/// Dry run of tag resolution against the current vocabulary.
fn execute_canonicalize(store: &Store, candidates: &[String]) -> Result<Vec<String>> {
    let settings = store.settings()?;
    let known = store.load_ledger()?.ranked(settings.tagging.known_tag_limit);
    Ok(resolve_tags(candidates, &known, &settings.tagging))
}

fn execute_alias(cmd: &AliasCommand, store: &Store) -> Result<()> {
    let mut settings = store.settings()?;
    match cmd {
        AliasCommand::Add { from, to } => {
            let (from, to) = (normalize(from), normalize(to));
            if from.is_empty() || to.is_empty() {
                anyhow::bail!("Alias and target cannot be empty");
            }
            settings.tagging.aliases.insert(from.clone(), to.clone());
            store.save_settings(&settings)?;
            println!("{from} -> {to}");
        }
        AliasCommand::Remove { from } => {
            let from = normalize(from);
            if settings.tagging.aliases.remove(&from).is_none() {
                anyhow::bail!("Alias '{from}' not found");
            }
            store.save_settings(&settings)?;
            println!("Removed alias {from}");
        }
        AliasCommand::List => {
            for (from, to) in &settings.tagging.aliases {
                println!("{from} -> {to}");
            }
        }
    }
    Ok(())
}

fn execute_config(cmd: &ConfigCommand, store: &Store) -> Result<()> {
    let mut settings = store.settings()?;
    match cmd {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigCommand::SetThreshold { value } => settings.tagging.dedupe_threshold = *value,
        ConfigCommand::SetLimit { value } => settings.tagging.known_tag_limit = *value,
        ConfigCommand::SetPrivacy { mode } => settings.privacy.mode = *mode,
        ConfigCommand::SetLlm {
            base_url,
            model,
            api_key_ref,
            json_mode,
            max_chars,
        } => {
            let llm = &mut settings.llm;
            if let Some(base_url) = base_url {
                llm.base_url = base_url.clone();
            }
            if let Some(model) = model {
                llm.model = model.clone();
            }
            if let Some(api_key_ref) = api_key_ref {
                llm.api_key_ref = Some(api_key_ref.clone()).filter(|r| !r.is_empty());
            }
            if let Some(json_mode) = json_mode {
                llm.json_mode = *json_mode;
            }
            if let Some(max_chars) = max_chars {
                llm.max_chars = *max_chars;
            }
        }
        ConfigCommand::SetTokens { pinboard, readwise } => {
            if let Some(name) = pinboard {
                settings.pinboard.auth_token_ref = Some(name.clone()).filter(|r| !r.is_empty());
            }
            if let Some(name) = readwise {
                settings.readwise.api_token_ref = Some(name.clone()).filter(|r| !r.is_empty());
            }
        }
    }
    store.save_settings(&settings)?;
    println!("Settings saved");
    Ok(())
}

fn execute_sync(store: &Store, id: &str) -> Result<()> {
    let id: ItemId = id.parse().context("Invalid item id")?;
    let mut item = store
        .get_item(id)?
        .ok_or_else(|| anyhow::anyhow!("Item {id} not found"))?;

    match build_pipeline(store)?.sync_item(&mut item)? {
        SyncOutcome::Pushed => println!("Synced {id}"),
        SyncOutcome::Unchanged => println!("{id} already up to date"),
    }
    Ok(())
}

fn execute_export(store: &Store, target: ExportTarget, limit: usize) -> Result<()> {
    let items = store.list_items(limit)?;
    match target {
        ExportTarget::Readwise => {
            let settings = store.settings()?;
            let token = store
                .secret_ref(settings.readwise.api_token_ref.as_deref())?
                .ok_or(SyncError::MissingToken { service: "Readwise" })?;
            let exported = ReadwiseClient::new(token)?.export(&items);
            println!("Exported {exported} of {} items to Readwise", items.len());
        }
        ExportTarget::Goodlinks => {
            for item in &items {
                println!("{}", goodlinks_url(item)?);
            }
        }
    }
    Ok(())
}
