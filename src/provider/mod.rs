pub mod rpc;
pub mod traits;

pub use rpc::RpcLedgerProvider;
pub use traits::{LedgerProvider, LogStream, RawLog, TxOutcome};
