use alloy::primitives::{Address, B256};
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("ledger rejected operation: {0}")]
    Rejected(#[from] RejectedOperationError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransientIoError),

    #[error("log decode failure: {0}")]
    Decode(#[from] DecodeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Malformed input caught before any external call ever happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("hourly rate must be greater than zero")]
    NonPositiveRate,

    #[error("employee name must not be empty")]
    EmptyName,

    #[error("page size must be greater than zero")]
    ZeroPageSize,

    #[error("settlement batch must cover at least one employee")]
    EmptyBatch,

    #[error("settlement batch of {requested} exceeds the configured maximum of {max}")]
    BatchTooLarge { requested: u64, max: u64 },

    #[error("settlement window [{start}, {start}+{count}) exceeds registry size {size}")]
    WindowOutOfRange { start: u64, count: u64, size: u64 },

    #[error("address {0} is not in the employee registry")]
    UnknownEmployee(Address),
}

/// The external ledger refused or reverted a write. The ledger's own
/// message is carried verbatim where one was available.
#[derive(Error, Debug, Clone)]
pub enum RejectedOperationError {
    #[error("{0}")]
    Reverted(String),
}

/// Network or provider failure during a read or a submission.
#[derive(Error, Debug, Clone)]
pub enum TransientIoError {
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// A log entry that cannot be classified. Always non-fatal: the entry is
/// excluded from the timeline and the containing batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopics,

    #[error("unknown event selector {0}")]
    UnknownSelector(B256),

    #[error("malformed {event} payload: {reason}")]
    MalformedPayload { event: &'static str, reason: String },

    #[error("{event} field {field} does not fit the expected width")]
    ValueOutOfRange {
        event: &'static str,
        field: &'static str,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("{error:?}"))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
