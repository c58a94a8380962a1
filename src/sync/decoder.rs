//! Classification of raw ledger logs into typed event records.
//!
//! Decoding is pure and per-log: a log that does not match a known
//! selector, or whose payload does not decode, yields a `DecodeError` that
//! the caller drops without failing the containing batch.

use alloy::primitives::{Address, LogData, TxHash, B256, U256};
use alloy::sol_types::SolEvent;
use chrono::{DateTime, Utc};

use crate::bindings::Payroll;
use crate::error::DecodeError;
use crate::ledger::models::{EventKind, LedgerEvent};
use crate::provider::traits::RawLog;

/// topic0 selector for one event kind.
pub fn selector(kind: EventKind) -> B256 {
    match kind {
        EventKind::Deposit => Payroll::Deposited::SIGNATURE_HASH,
        EventKind::Withdrawal => Payroll::Withdrawn::SIGNATURE_HASH,
        EventKind::SalaryPayment => Payroll::SalaryPaid::SIGNATURE_HASH,
        EventKind::CheckIn => Payroll::CheckedIn::SIGNATURE_HASH,
        EventKind::CheckOut => Payroll::CheckedOut::SIGNATURE_HASH,
    }
}

/// A classified log, still missing its wall-clock timestamp (attached by
/// the caller via the block timestamp cache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub kind: EventKind,
    pub actor: Address,
    pub counterparty: Option<Address>,
    pub amount: Option<U256>,
    pub worked_minutes: Option<u64>,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl DecodedLog {
    pub fn into_event(self, timestamp: DateTime<Utc>) -> LedgerEvent {
        LedgerEvent {
            kind: self.kind,
            actor: self.actor,
            counterparty: self.counterparty,
            amount: self.amount,
            worked_minutes: self.worked_minutes,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            timestamp,
        }
    }
}

/// Match topic0 against the known selectors and decode the payload.
/// `ledger` is the contract address, recorded as the counterparty of
/// deposits.
pub fn decode_log(ledger: Address, raw: &RawLog) -> Result<DecodedLog, DecodeError> {
    let Some(topic0) = raw.topics.first().copied() else {
        return Err(DecodeError::MissingTopics);
    };

    let data = LogData::new_unchecked(raw.topics.clone(), raw.data.clone());

    let (kind, actor, counterparty, amount, worked_minutes) =
        if topic0 == Payroll::Deposited::SIGNATURE_HASH {
            let event = Payroll::Deposited::decode_log_data(&data)
                .map_err(|e| malformed("Deposited", e))?;
            (EventKind::Deposit, event.from, Some(ledger), Some(event.amount), None)
        } else if topic0 == Payroll::Withdrawn::SIGNATURE_HASH {
            let event = Payroll::Withdrawn::decode_log_data(&data)
                .map_err(|e| malformed("Withdrawn", e))?;
            (EventKind::Withdrawal, event.who, None, Some(event.amount), None)
        } else if topic0 == Payroll::SalaryPaid::SIGNATURE_HASH {
            let event = Payroll::SalaryPaid::decode_log_data(&data)
                .map_err(|e| malformed("SalaryPaid", e))?;
            (EventKind::SalaryPayment, event.to, None, Some(event.amount), None)
        } else if topic0 == Payroll::CheckedIn::SIGNATURE_HASH {
            let event = Payroll::CheckedIn::decode_log_data(&data)
                .map_err(|e| malformed("CheckedIn", e))?;
            (EventKind::CheckIn, event.who, None, None, None)
        } else if topic0 == Payroll::CheckedOut::SIGNATURE_HASH {
            let event = Payroll::CheckedOut::decode_log_data(&data)
                .map_err(|e| malformed("CheckedOut", e))?;
            let minutes = u64::try_from(event.workedMinutes).map_err(|_| {
                DecodeError::ValueOutOfRange {
                    event: "CheckedOut",
                    field: "workedMinutes",
                }
            })?;
            (EventKind::CheckOut, event.who, None, None, Some(minutes))
        } else {
            return Err(DecodeError::UnknownSelector(topic0));
        };

    Ok(DecodedLog {
        kind,
        actor,
        counterparty,
        amount,
        worked_minutes,
        block_number: raw.block_number,
        tx_hash: raw.tx_hash,
        log_index: raw.log_index,
    })
}

fn malformed(event: &'static str, error: alloy::sol_types::Error) -> DecodeError {
    DecodeError::MalformedPayload {
        event,
        reason: error.to_string(),
    }
}
