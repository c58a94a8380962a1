use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement batch status. Both `Confirmed` and `Failed` are terminal;
/// there is no transition back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Coordinator-local record of one settlement attempt over a contiguous
/// registry window. Created per attempt and discarded once a terminal
/// status is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: Uuid,
    pub start_index: u64,
    pub count: u64,
    /// The window's addresses captured at submission time. The
    /// post-confirmation refresh targets exactly these, so registry
    /// mutations while the batch is pending cannot widen it.
    pub addresses: Vec<Address>,
    pub status: BatchStatus,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl SettlementBatch {
    pub fn pending(start_index: u64, count: u64, addresses: Vec<Address>, tx_hash: TxHash) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_index,
            count,
            addresses,
            status: BatchStatus::Pending,
            tx_hash: Some(tx_hash),
            error: None,
            submitted_at: Utc::now(),
            confirmed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BatchStatus::Pending
    }
}

/// An employee eligible for settlement within one registry page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCandidate {
    pub address: Address,
    pub name: String,
    pub accrued: U256,
    /// Absolute index within the full registry, NOT the position within
    /// the filtered page. Settling by the filtered position would pay the
    /// wrong employee.
    pub registry_index: u64,
}
