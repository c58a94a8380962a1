use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::AppResult;
use crate::ledger::models::{AttendanceEntry, Employee, EventKind};

/// A raw log entry as delivered by the node, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

/// Terminal result of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Reverted,
}

pub type LogStream = BoxStream<'static, RawLog>;

/// Boundary to the payroll ledger and its node. Everything above this
/// trait is deterministic and testable against an in-memory mock.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    // --- reads ---

    async fn employee(&self, who: Address) -> AppResult<Employee>;

    async fn all_employees(&self) -> AppResult<Vec<Address>>;

    async fn employee_count(&self) -> AppResult<u64>;

    async fn accrued_of(&self, who: Address) -> AppResult<U256>;

    async fn attendance_count(&self, who: Address) -> AppResult<u64>;

    async fn attendance(
        &self,
        who: Address,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<AttendanceEntry>>;

    async fn contract_balance(&self) -> AppResult<U256>;

    async fn owner(&self) -> AppResult<Address>;

    // --- chain metadata and logs ---

    async fn latest_block(&self) -> AppResult<u64>;

    async fn block_timestamp(&self, block: u64) -> AppResult<DateTime<Utc>>;

    /// All ledger logs in the inclusive block range, in node order.
    async fn logs_in_range(&self, from_block: u64, to_block: u64) -> AppResult<Vec<RawLog>>;

    /// Open a watch for one event kind, delivering logs from `from_block`
    /// onward. The watch re-polls internally; a dropped stream ends it.
    async fn watch_kind(&self, kind: EventKind, from_block: u64) -> AppResult<LogStream>;

    // --- writes ---

    async fn add_employee(&self, who: Address, name: &str, hourly_rate: U256)
        -> AppResult<TxHash>;

    async fn update_rate(&self, who: Address, hourly_rate: U256) -> AppResult<TxHash>;

    async fn remove_employee(&self, who: Address) -> AppResult<TxHash>;

    async fn check_in(&self) -> AppResult<TxHash>;

    async fn check_out(&self) -> AppResult<TxHash>;

    async fn withdraw(&self) -> AppResult<TxHash>;

    async fn deposit(&self, amount: U256) -> AppResult<TxHash>;

    /// `payAll(start, limit)` at the ABI boundary.
    async fn settle_batch(&self, start: u64, count: u64) -> AppResult<TxHash>;

    async fn withdraw_funds(&self, amount: U256) -> AppResult<TxHash>;

    /// Block until the transaction is mined and report its outcome. No
    /// local timeout: the wait is externally bounded, callers decide.
    async fn wait_for_confirmation(&self, tx: TxHash) -> AppResult<TxOutcome>;
}
