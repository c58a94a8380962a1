use alloy::primitives::{utils::format_ether, Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five event kinds emitted by the payroll ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Deposit,
    Withdrawal,
    SalaryPayment,
    CheckIn,
    CheckOut,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdrawal => "withdrawal",
            EventKind::SalaryPayment => "salary_payment",
            EventKind::CheckIn => "check_in",
            EventKind::CheckOut => "check_out",
        }
    }

    /// Every kind, in the order watches are opened.
    pub fn all() -> [EventKind; 5] {
        [
            EventKind::Deposit,
            EventKind::Withdrawal,
            EventKind::SalaryPayment,
            EventKind::CheckIn,
            EventKind::CheckOut,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one observed ledger event.
///
/// `(tx_hash, log_index)` is globally unique and is the sole deduplication
/// key across the historical and live sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: EventKind,
    /// Initiator or subject: payer for a deposit, employee otherwise.
    pub actor: Address,
    pub counterparty: Option<Address>,
    /// Wei. Absent for check-in / check-out.
    pub amount: Option<U256>,
    /// Present only for check-out.
    pub worked_minutes: Option<u64>,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn identity(&self) -> (TxHash, u64) {
        (self.tx_hash, self.log_index)
    }

    /// Timeline position. The reconciled timeline is ordered by this key,
    /// descending.
    pub fn ord_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Mutable employee projection. All fields other than `address` are
/// meaningless when `exists` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub address: Address,
    pub name: String,
    pub hourly_rate: U256,
    pub accrued: U256,
    pub exists: bool,
}

impl Employee {
    /// Projection for an address the registry does not (or no longer does)
    /// contain. The ledger's mapping getter yields the zero struct for
    /// unknown addresses, never a revert.
    pub fn missing(address: Address) -> Self {
        Self {
            address,
            name: String::new(),
            hourly_rate: U256::ZERO,
            accrued: U256::ZERO,
            exists: false,
        }
    }

    pub fn has_accrued_balance(&self) -> bool {
        self.exists && self.accrued > U256::ZERO
    }
}

/// One closed attendance record as stored on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub timestamp: DateTime<Utc>,
    pub worked_minutes: u64,
}

/// An attendance session derived from check-in / check-out pairs. At most
/// one open session exists per employee at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub employee: Address,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub worked_minutes: Option<u64>,
}

impl AttendanceSession {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Wage earned by a closed session: `minutes * hourly_rate / 60` in
    /// integer wei arithmetic, matching the ledger's own accrual math.
    pub fn earned(&self, hourly_rate: U256) -> Option<U256> {
        self.worked_minutes
            .map(|minutes| U256::from(minutes) * hourly_rate / U256::from(60u64))
    }
}

/// Human-readable rendering of a wei amount, e.g. for log lines.
pub fn format_wei(amount: U256) -> String {
    format_ether(amount)
}
