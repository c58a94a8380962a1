use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, RejectedOperationError, ValidationError};
use crate::ledger::models::{format_wei, AttendanceEntry};
use crate::provider::traits::{LedgerProvider, TxOutcome};
use crate::registry::EmployeeRegistry;
use crate::settlement::SettlementCoordinator;
use crate::sync::backfill::HistoricalIngestor;
use crate::sync::store::HistoryStore;
use crate::sync::timestamps::BlockTimestampCache;
use crate::sync::watcher::{self, LiveFeed};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub start_block: u64,
    pub backfill_chunk: u64,
    pub max_settlement_batch: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_block: 0,
            backfill_chunk: 50_000,
            max_settlement_batch: 50,
        }
    }
}

/// The one owned application state for a ledger address.
///
/// All mutation flows through this session: the sync tasks feed the
/// history store, and consumers act through the explicit command
/// operations below while observing the store, registry and coordinator
/// through read-only views.
pub struct LedgerSession {
    provider: Arc<dyn LedgerProvider>,
    ledger: Address,
    store: Arc<HistoryStore>,
    registry: Arc<EmployeeRegistry>,
    timestamps: Arc<BlockTimestampCache>,
    coordinator: SettlementCoordinator,
    options: SessionOptions,
    live_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LedgerSession {
    pub fn new(
        provider: Arc<dyn LedgerProvider>,
        ledger: Address,
        options: SessionOptions,
    ) -> Self {
        let store = Arc::new(HistoryStore::new());
        let registry = Arc::new(EmployeeRegistry::new(provider.clone()));
        let timestamps = Arc::new(BlockTimestampCache::new());
        let coordinator = SettlementCoordinator::new(
            provider.clone(),
            registry.clone(),
            options.max_settlement_batch,
        );

        Self {
            provider,
            ledger,
            store,
            registry,
            timestamps,
            coordinator,
            options,
            live_tasks: Mutex::new(Vec::new()),
        }
    }

    // --- read views ---

    pub fn history(&self) -> Arc<HistoryStore> {
        self.store.clone()
    }

    pub fn registry(&self) -> Arc<EmployeeRegistry> {
        self.registry.clone()
    }

    pub fn settlements(&self) -> &SettlementCoordinator {
        &self.coordinator
    }

    pub async fn contract_balance(&self) -> AppResult<U256> {
        self.provider.contract_balance().await
    }

    pub async fn is_owner(&self, who: Address) -> AppResult<bool> {
        Ok(self.provider.owner().await? == who)
    }

    pub async fn attendance_count(&self, who: Address) -> AppResult<u64> {
        self.provider.attendance_count(who).await
    }

    /// One page of the employee's attendance records as stored on the
    /// ledger, independent of the event-derived sessions.
    pub async fn attendance(
        &self,
        who: Address,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<AttendanceEntry>> {
        self.provider.attendance(who, offset, limit).await
    }

    // --- sync lifecycle ---

    /// Backfill the full history, then open the live watches strictly
    /// after the baseline is in place: live events must never be observed
    /// before the backfill claims their range.
    pub async fn start(&self) -> AppResult<()> {
        let ingestor = HistoricalIngestor::new(
            self.provider.clone(),
            self.timestamps.clone(),
            self.ledger,
            self.options.backfill_chunk,
        );
        let (records, max_block) = ingestor.ingest(self.options.start_block, None).await?;

        let applied = self.store.apply_historical(records, max_block).await?;
        info!(applied, max_block, "📜 Baseline timeline established");

        let feed = watcher::open_feed(
            self.provider.clone(),
            self.ledger,
            self.timestamps.clone(),
            max_block + 1,
        )
        .await?;

        let LiveFeed { mut events, mut handles } = feed;
        let store = self.store.clone();
        handles.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let identity = event.identity();
                if store.apply_live(event).await {
                    debug!("Admitted live event {:?}", identity);
                }
            }
        }));

        *self.live_tasks.lock().await = handles;
        Ok(())
    }

    /// Tear down every live watch for this session together.
    pub async fn shutdown(&self) {
        let mut tasks = self.live_tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
        info!("Ledger session for {} shut down", self.ledger);
    }

    // --- command operations ---

    pub async fn add_employee(
        &self,
        who: Address,
        name: &str,
        hourly_rate: U256,
    ) -> AppResult<TxHash> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if hourly_rate.is_zero() {
            return Err(ValidationError::NonPositiveRate.into());
        }
        self.provider.add_employee(who, name, hourly_rate).await
    }

    pub async fn update_rate(&self, who: Address, hourly_rate: U256) -> AppResult<TxHash> {
        if hourly_rate.is_zero() {
            return Err(ValidationError::NonPositiveRate.into());
        }
        self.provider.update_rate(who, hourly_rate).await
    }

    pub async fn remove_employee(&self, who: Address) -> AppResult<TxHash> {
        self.provider.remove_employee(who).await
    }

    /// Check-in is not pre-validated locally: whether a session is already
    /// open is the ledger's call, and its revert is surfaced as a
    /// rejection.
    pub async fn check_in(&self) -> AppResult<TxHash> {
        self.provider.check_in().await
    }

    pub async fn check_out(&self) -> AppResult<TxHash> {
        self.provider.check_out().await
    }

    pub async fn withdraw(&self) -> AppResult<TxHash> {
        self.provider.withdraw().await
    }

    /// Deposit funds into the payroll pool and wait for the receipt, so a
    /// revert is reported to the depositor instead of discovered later.
    pub async fn deposit(&self, amount: U256) -> AppResult<TxHash> {
        if amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        let tx_hash = self.provider.deposit(amount).await?;
        match self.provider.wait_for_confirmation(tx_hash).await? {
            TxOutcome::Confirmed => {
                info!("💰 Deposited {} into the payroll pool", format_wei(amount));
                Ok(tx_hash)
            }
            TxOutcome::Reverted => Err(AppError::Rejected(RejectedOperationError::Reverted(
                "deposit reverted by the ledger".to_string(),
            ))),
        }
    }

    pub async fn withdraw_funds(&self, amount: U256) -> AppResult<TxHash> {
        if amount.is_zero() {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        self.provider.withdraw_funds(amount).await
    }
}
