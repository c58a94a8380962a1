pub mod coordinator;
pub mod models;

pub use coordinator::SettlementCoordinator;
pub use models::{BatchStatus, SettlementBatch, SettlementCandidate};
