mod ids;
mod item;
mod sync_record;
mod tag_info;

pub use ids::ItemId;
pub use item::{Item, ItemBuilder, ItemStatus, PageCapture, domain_of};
pub use sync_record::{SyncRecord, SyncService, SyncStatus};
pub use tag_info::TagInfo;
