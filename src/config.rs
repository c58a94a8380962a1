use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub ledger_address: String,
    /// Hex-encoded private key for the submitting account. Optional: a
    /// read-only session can sync history without one.
    pub signer_key: Option<String>,
    pub start_block: u64,
    /// Block span per eth_getLogs call during backfill.
    pub backfill_chunk: u64,
    /// Upper bound on employees per settlement submission.
    pub max_settlement_batch: u64,
    pub watch_poll_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            rpc_url: std::env::var("RPC_URL")
                .unwrap_or_else(|_| "http://localhost:8545".to_string()),
            ledger_address: std::env::var("LEDGER_ADDRESS").map_err(|_| {
                config::ConfigError::Message("LEDGER_ADDRESS must be set".to_string())
            })?,
            signer_key: std::env::var("SIGNER_KEY").ok(),
            start_block: parse_var("START_BLOCK", 0)?,
            backfill_chunk: parse_var("BACKFILL_CHUNK", 50_000)?,
            max_settlement_batch: parse_var("MAX_SETTLEMENT_BATCH", 50)?,
            watch_poll_ms: parse_var("WATCH_POLL_MS", 7_000)?,
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{name} must be an integer"))),
        Err(_) => Ok(default),
    }
}
