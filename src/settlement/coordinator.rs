use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::provider::traits::{LedgerProvider, TxOutcome};
use crate::registry::EmployeeRegistry;
use crate::settlement::models::{BatchStatus, SettlementBatch, SettlementCandidate};

/// Drives multi-step wage settlement across the employee registry in
/// bounded-size windows.
///
/// The coordinator submits `payAll(start, count)` over the *raw* registry
/// window; the ledger itself skips zero-balance entries. It holds no lock
/// across the confirmation wait, so the registry may change underneath a
/// pending batch; the post-confirmation refresh reflects the then-current
/// ledger state.
pub struct SettlementCoordinator {
    provider: Arc<dyn LedgerProvider>,
    registry: Arc<EmployeeRegistry>,
    max_batch: u64,
}

impl SettlementCoordinator {
    pub fn new(
        provider: Arc<dyn LedgerProvider>,
        registry: Arc<EmployeeRegistry>,
        max_batch: u64,
    ) -> Self {
        Self {
            provider,
            registry,
            max_batch: max_batch.max(1),
        }
    }

    /// Employees in the registry window `[page*page_size, (page+1)*page_size)`
    /// holding a strictly positive accrued balance. Accrued balances are
    /// read fresh from the ledger; names come from the registry projection.
    pub async fn candidates_for_page(
        &self,
        page: u64,
        page_size: u64,
    ) -> AppResult<Vec<SettlementCandidate>> {
        if page_size == 0 {
            return Err(ValidationError::ZeroPageSize.into());
        }

        let addresses = self.registry.all_addresses().await?;
        let size = addresses.len() as u64;
        let start = (page * page_size).min(size);
        let end = ((page + 1) * page_size).min(size);

        let mut candidates = Vec::new();
        for index in start..end {
            let address = addresses[index as usize];
            let accrued = self.provider.accrued_of(address).await?;
            if accrued > U256::ZERO {
                let name = self.registry.get(address).await?.name;
                candidates.push(SettlementCandidate {
                    address,
                    name,
                    accrued,
                    registry_index: index,
                });
            }
        }
        Ok(candidates)
    }

    /// Submit settlement for a contiguous registry window and return the
    /// pending batch. The window is validated against the current registry
    /// size; staleness after submission is tolerated and re-validated on
    /// the next page load.
    pub async fn settle_batch(&self, start: u64, count: u64) -> AppResult<SettlementBatch> {
        if count == 0 {
            return Err(ValidationError::EmptyBatch.into());
        }
        if count > self.max_batch {
            return Err(ValidationError::BatchTooLarge {
                requested: count,
                max: self.max_batch,
            }
            .into());
        }

        let addresses = self.registry.all_addresses().await?;
        let size = addresses.len() as u64;
        if start + count > size {
            return Err(ValidationError::WindowOutOfRange { start, count, size }.into());
        }

        let window = addresses[start as usize..(start + count) as usize].to_vec();
        let tx_hash = self.provider.settle_batch(start, count).await?;
        info!(
            start,
            count,
            tx = %tx_hash,
            "🔄 Settlement batch submitted"
        );
        Ok(SettlementBatch::pending(start, count, window, tx_hash))
    }

    /// Settle a single employee: a batch of size one at the employee's
    /// absolute registry index, resolved by an explicit scan of the full
    /// listing so filtering and pagination state cannot skew it.
    pub async fn settle_one(&self, who: Address) -> AppResult<SettlementBatch> {
        let index = self
            .registry
            .absolute_index_of(who)
            .await?
            .ok_or(ValidationError::UnknownEmployee(who))?;
        self.settle_batch(index as u64, 1).await
    }

    /// Sweep the whole registry in maximally-sized windows, confirming each
    /// batch before submitting the next. Stops at the first failed batch.
    pub async fn settle_all(&self) -> AppResult<Vec<SettlementBatch>> {
        let size = self.registry.len().await? as u64;
        let mut batches = Vec::new();
        let mut start = 0;

        while start < size {
            let count = self.max_batch.min(size - start);
            let pending = self.settle_batch(start, count).await?;
            let settled = self.confirm(pending).await?;
            let failed = settled.status == BatchStatus::Failed;
            batches.push(settled);
            if failed {
                warn!("Stopping registry sweep after failed batch at index {start}");
                break;
            }
            start += count;
        }
        Ok(batches)
    }

    /// Wait for the batch's transaction to reach a terminal state.
    /// `Pending -> Confirmed` triggers a registry refresh for the batch's
    /// captured window; `Pending -> Failed` is surfaced to the caller and
    /// never retried here. Transient transport failures leave the batch
    /// pending and bubble up so the caller can wait again.
    pub async fn confirm(&self, mut batch: SettlementBatch) -> AppResult<SettlementBatch> {
        if batch.is_terminal() {
            return Ok(batch);
        }
        let tx_hash = batch.tx_hash.ok_or_else(|| {
            AppError::Internal("pending settlement batch without a transaction".to_string())
        })?;

        match self.provider.wait_for_confirmation(tx_hash).await {
            Ok(TxOutcome::Confirmed) => {
                batch.status = BatchStatus::Confirmed;
                batch.confirmed_at = Some(Utc::now());
                self.registry.refresh_window(&batch.addresses).await?;
                info!(
                    start = batch.start_index,
                    count = batch.count,
                    "✅ Settlement batch confirmed"
                );
            }
            Ok(TxOutcome::Reverted) => {
                batch.status = BatchStatus::Failed;
                batch.error = Some("settlement reverted by the ledger".to_string());
                error!(
                    start = batch.start_index,
                    count = batch.count,
                    "❌ Settlement batch reverted"
                );
            }
            Err(AppError::Rejected(rejection)) => {
                batch.status = BatchStatus::Failed;
                batch.error = Some(rejection.to_string());
                error!(
                    start = batch.start_index,
                    count = batch.count,
                    "❌ Settlement batch rejected: {rejection}"
                );
            }
            Err(other) => return Err(other),
        }
        Ok(batch)
    }
}
