pub mod backfill;
pub mod decoder;
pub mod engine;
pub mod store;
pub mod timestamps;
pub mod watcher;

pub use engine::LedgerSession;
pub use store::HistoryStore;
pub use timestamps::BlockTimestampCache;
