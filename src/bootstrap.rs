use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::ledger::models::format_wei;
use crate::provider::RpcLedgerProvider;
use crate::sync::engine::{LedgerSession, SessionOptions};

pub async fn initialize_session(config: &Config) -> AppResult<Arc<LedgerSession>> {
    info!("Initializing application components ...");

    let provider = RpcLedgerProvider::connect(config).await?;
    let ledger = provider.ledger_address();

    let options = SessionOptions {
        start_block: config.start_block,
        backfill_chunk: config.backfill_chunk,
        max_settlement_batch: config.max_settlement_batch,
    };
    let session = Arc::new(LedgerSession::new(Arc::new(provider), ledger, options));

    // Backfill first, then live watches; the session enforces the order.
    session.start().await?;
    info!("✅ Ledger session started for {}", ledger);

    match session.contract_balance().await {
        Ok(balance) => info!("💰 Payroll pool balance: {}", format_wei(balance)),
        Err(AppError::Transport(e)) => info!("Payroll pool balance unavailable: {e}"),
        Err(e) => return Err(e),
    }

    let registry = session.registry();
    info!("👥 Registry size: {}", registry.len().await?);

    Ok(session)
}
