pub mod config;
pub mod db;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod sync;
pub mod tagging;

pub use config::Settings;
pub use db::Database;
pub use ledger::TagLedger;
pub use models::{Item, ItemBuilder, ItemId, ItemStatus, PageCapture, TagInfo};
pub use pipeline::{SyncOutcome, TaggingPipeline};
pub use store::Store;
