//! In-memory ledger double for unit tests.
//!
//! `MockLedger` implements the full provider boundary over a scripted
//! in-memory state, records every submitted write for assertions, and lets
//! tests drive the live watch channels by hand.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, IntoLogData, TxHash, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{AppError, AppResult, RejectedOperationError, TransientIoError};
use crate::ledger::models::{AttendanceEntry, Employee, EventKind, LedgerEvent};
use crate::provider::traits::{LedgerProvider, LogStream, RawLog, TxOutcome};

/// Ledger contract address used throughout the tests.
pub const LEDGER: Address = Address::with_last_byte(0xAA);

pub fn addr(n: u8) -> Address {
    Address::with_last_byte(n)
}

pub fn tx(n: u64) -> TxHash {
    B256::from(U256::from(n))
}

/// Synthesize a raw log from a typed event, the way the node would emit it.
pub fn raw_log<E: IntoLogData>(event: E, block: u64, tx_hash: TxHash, log_index: u64) -> RawLog {
    let data = event.into_log_data();
    RawLog {
        topics: data.topics().to_vec(),
        data: data.data.clone(),
        block_number: block,
        tx_hash,
        log_index,
    }
}

/// A ready-made timeline record for store-level tests.
pub fn event(
    kind: EventKind,
    actor: Address,
    block: u64,
    tx_hash: TxHash,
    log_index: u64,
) -> LedgerEvent {
    LedgerEvent {
        kind,
        actor,
        counterparty: None,
        amount: match kind {
            EventKind::CheckIn | EventKind::CheckOut => None,
            _ => Some(U256::from(1u64)),
        },
        worked_minutes: None,
        block_number: block,
        tx_hash,
        log_index,
        timestamp: mock_timestamp(block),
    }
}

fn mock_timestamp(block: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + block as i64 * 12, 0).unwrap()
}

/// Poll a condition until it holds, failing the test after a second.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within timeout");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    AddEmployee {
        who: Address,
        name: String,
        hourly_rate: U256,
    },
    UpdateRate {
        who: Address,
        hourly_rate: U256,
    },
    RemoveEmployee {
        who: Address,
    },
    CheckIn,
    CheckOut,
    Withdraw,
    Deposit {
        amount: U256,
    },
    SettleBatch {
        start: u64,
        count: u64,
    },
    WithdrawFunds {
        amount: U256,
    },
}

enum PendingWrite {
    Settle { start: u64, count: u64, ok: bool },
    Plain,
}

#[derive(Default)]
struct MockState {
    owner: Address,
    contract_balance: U256,
    registry: Vec<Address>,
    employees: HashMap<Address, Employee>,
    attendance: HashMap<Address, Vec<AttendanceEntry>>,
    logs: Vec<RawLog>,
    latest_block: u64,
    next_tx: u64,
    submitted: Vec<WriteCall>,
    pending: HashMap<TxHash, PendingWrite>,
    watch_senders: HashMap<EventKind, mpsc::UnboundedSender<RawLog>>,
    watch_from: HashMap<EventKind, u64>,
    log_queries: Vec<(u64, u64)>,
    timestamp_fetches: usize,
    employee_fetches: usize,
    fail_log_queries: bool,
    fail_settlements: bool,
    check_in_rejection: Option<String>,
}

pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn shared(self: &Arc<Self>) -> Arc<dyn LedgerProvider> {
        self.clone()
    }

    // --- scripting ---

    pub fn set_owner(&self, owner: Address) {
        self.state.lock().unwrap().owner = owner;
    }

    pub fn set_contract_balance(&self, balance: U256) {
        self.state.lock().unwrap().contract_balance = balance;
    }

    pub fn add_employee_record(&self, who: Address, name: &str, hourly_rate: U256, accrued: U256) {
        let mut state = self.state.lock().unwrap();
        state.registry.push(who);
        state.employees.insert(
            who,
            Employee {
                address: who,
                name: name.to_string(),
                hourly_rate,
                accrued,
                exists: true,
            },
        );
    }

    pub fn remove_employee_record(&self, who: Address) {
        let mut state = self.state.lock().unwrap();
        state.registry.retain(|address| *address != who);
        state.employees.remove(&who);
    }

    pub fn set_attendance(&self, who: Address, entries: Vec<AttendanceEntry>) {
        self.state.lock().unwrap().attendance.insert(who, entries);
    }

    pub fn set_logs(&self, logs: Vec<RawLog>) {
        self.state.lock().unwrap().logs = logs;
    }

    pub fn set_latest_block(&self, block: u64) {
        self.state.lock().unwrap().latest_block = block;
    }

    pub fn fail_log_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_log_queries = fail;
    }

    pub fn fail_settlements(&self, fail: bool) {
        self.state.lock().unwrap().fail_settlements = fail;
    }

    pub fn reject_check_in(&self, message: &str) {
        self.state.lock().unwrap().check_in_rejection = Some(message.to_string());
    }

    /// Deliver a raw log on the open watch channel for `kind`.
    pub fn push_live(&self, kind: EventKind, raw: RawLog) {
        let state = self.state.lock().unwrap();
        let sender = state
            .watch_senders
            .get(&kind)
            .expect("no watch opened for this kind");
        sender.send(raw).expect("watch receiver dropped");
    }

    // --- assertions ---

    pub fn submitted(&self) -> Vec<WriteCall> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn watch_from(&self, kind: EventKind) -> Option<u64> {
        self.state.lock().unwrap().watch_from.get(&kind).copied()
    }

    pub fn open_watches(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .watch_senders
            .values()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().log_queries.clone()
    }

    pub fn timestamp_fetches(&self) -> usize {
        self.state.lock().unwrap().timestamp_fetches
    }

    pub fn employee_fetches(&self) -> usize {
        self.state.lock().unwrap().employee_fetches
    }

    pub fn reset_employee_fetches(&self) {
        self.state.lock().unwrap().employee_fetches = 0;
    }

    fn submit(&self, call: WriteCall, pending: PendingWrite) -> TxHash {
        let mut state = self.state.lock().unwrap();
        state.next_tx += 1;
        let tx_hash = B256::from(U256::from(0xDEAD_0000u64 + state.next_tx));
        state.submitted.push(call);
        state.pending.insert(tx_hash, pending);
        tx_hash
    }
}

#[async_trait]
impl LedgerProvider for MockLedger {
    async fn employee(&self, who: Address) -> AppResult<Employee> {
        let mut state = self.state.lock().unwrap();
        state.employee_fetches += 1;
        Ok(state
            .employees
            .get(&who)
            .cloned()
            .unwrap_or_else(|| Employee::missing(who)))
    }

    async fn all_employees(&self) -> AppResult<Vec<Address>> {
        Ok(self.state.lock().unwrap().registry.clone())
    }

    async fn employee_count(&self) -> AppResult<u64> {
        Ok(self.state.lock().unwrap().registry.len() as u64)
    }

    async fn accrued_of(&self, who: Address) -> AppResult<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .employees
            .get(&who)
            .map(|employee| employee.accrued)
            .unwrap_or(U256::ZERO))
    }

    async fn attendance_count(&self, who: Address) -> AppResult<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attendance
            .get(&who)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }

    async fn attendance(
        &self,
        who: Address,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<AttendanceEntry>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attendance
            .get(&who)
            .map(|entries| {
                entries
                    .iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn contract_balance(&self) -> AppResult<U256> {
        Ok(self.state.lock().unwrap().contract_balance)
    }

    async fn owner(&self) -> AppResult<Address> {
        Ok(self.state.lock().unwrap().owner)
    }

    async fn latest_block(&self) -> AppResult<u64> {
        Ok(self.state.lock().unwrap().latest_block)
    }

    async fn block_timestamp(&self, block: u64) -> AppResult<DateTime<Utc>> {
        self.state.lock().unwrap().timestamp_fetches += 1;
        Ok(mock_timestamp(block))
    }

    async fn logs_in_range(&self, from_block: u64, to_block: u64) -> AppResult<Vec<RawLog>> {
        let mut state = self.state.lock().unwrap();
        state.log_queries.push((from_block, to_block));
        if state.fail_log_queries {
            return Err(AppError::Transport(TransientIoError::Rpc(
                "connection reset".to_string(),
            )));
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
            .cloned()
            .collect())
    }

    async fn watch_kind(&self, kind: EventKind, from_block: u64) -> AppResult<LogStream> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.watch_senders.insert(kind, sender);
        state.watch_from.insert(kind, from_block);
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn add_employee(
        &self,
        who: Address,
        name: &str,
        hourly_rate: U256,
    ) -> AppResult<TxHash> {
        Ok(self.submit(
            WriteCall::AddEmployee {
                who,
                name: name.to_string(),
                hourly_rate,
            },
            PendingWrite::Plain,
        ))
    }

    async fn update_rate(&self, who: Address, hourly_rate: U256) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::UpdateRate { who, hourly_rate }, PendingWrite::Plain))
    }

    async fn remove_employee(&self, who: Address) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::RemoveEmployee { who }, PendingWrite::Plain))
    }

    async fn check_in(&self) -> AppResult<TxHash> {
        if let Some(message) = self.state.lock().unwrap().check_in_rejection.clone() {
            return Err(AppError::Rejected(RejectedOperationError::Reverted(
                format!("execution reverted: {message}"),
            )));
        }
        Ok(self.submit(WriteCall::CheckIn, PendingWrite::Plain))
    }

    async fn check_out(&self) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::CheckOut, PendingWrite::Plain))
    }

    async fn withdraw(&self) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::Withdraw, PendingWrite::Plain))
    }

    async fn deposit(&self, amount: U256) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::Deposit { amount }, PendingWrite::Plain))
    }

    async fn settle_batch(&self, start: u64, count: u64) -> AppResult<TxHash> {
        let ok = !self.state.lock().unwrap().fail_settlements;
        Ok(self.submit(
            WriteCall::SettleBatch { start, count },
            PendingWrite::Settle { start, count, ok },
        ))
    }

    async fn withdraw_funds(&self, amount: U256) -> AppResult<TxHash> {
        Ok(self.submit(WriteCall::WithdrawFunds { amount }, PendingWrite::Plain))
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> AppResult<TxOutcome> {
        let mut state = self.state.lock().unwrap();
        match state.pending.remove(&tx) {
            Some(PendingWrite::Settle { ok: false, .. }) => Ok(TxOutcome::Reverted),
            Some(PendingWrite::Settle { start, count, ok: true }) => {
                // The ledger pays the window and resets accruals to zero,
                // skipping zero-balance entries on its own.
                let window: Vec<Address> = state
                    .registry
                    .iter()
                    .skip(start as usize)
                    .take(count as usize)
                    .copied()
                    .collect();
                for who in window {
                    if let Some(employee) = state.employees.get_mut(&who) {
                        employee.accrued = U256::ZERO;
                    }
                }
                Ok(TxOutcome::Confirmed)
            }
            Some(PendingWrite::Plain) | None => Ok(TxOutcome::Confirmed),
        }
    }
}
