use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::ledger::models::LedgerEvent;
use crate::provider::traits::LedgerProvider;
use crate::sync::decoder;
use crate::sync::timestamps::BlockTimestampCache;

/// One-shot retrieval of every past ledger event up to the chain head,
/// establishing the baseline timeline.
///
/// All-or-nothing: any RPC failure aborts the whole ingestion and nothing
/// is returned, since a partial backfill would corrupt the store's no-gap
/// guarantee. The caller retries the entire range.
pub struct HistoricalIngestor {
    provider: Arc<dyn LedgerProvider>,
    timestamps: Arc<BlockTimestampCache>,
    ledger: Address,
    chunk_span: u64,
}

impl HistoricalIngestor {
    pub fn new(
        provider: Arc<dyn LedgerProvider>,
        timestamps: Arc<BlockTimestampCache>,
        ledger: Address,
        chunk_span: u64,
    ) -> Self {
        Self {
            provider,
            timestamps,
            ledger,
            chunk_span: chunk_span.max(1),
        }
    }

    /// Fetch and decode all logs in `[from_block, to_block]`, defaulting
    /// the upper bound to the current chain head. Returns the records
    /// (newest first) plus the upper bound of the scanned range, which is
    /// the exclusive predecessor of the live watch's starting block.
    pub async fn ingest(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> AppResult<(Vec<LedgerEvent>, u64)> {
        let to_block = match to_block {
            Some(block) => block,
            None => self.provider.latest_block().await?,
        };

        info!(
            from = from_block,
            to = to_block,
            "🔄 Starting historical backfill"
        );

        let mut decoded = Vec::new();
        let mut skipped = 0usize;
        let mut cursor = from_block;

        while cursor <= to_block {
            let chunk_end = to_block.min(cursor.saturating_add(self.chunk_span - 1));
            let logs = self.provider.logs_in_range(cursor, chunk_end).await?;
            debug!(
                from = cursor,
                to = chunk_end,
                logs = logs.len(),
                "Fetched backfill chunk"
            );

            for raw in &logs {
                match decoder::decode_log(self.ledger, raw) {
                    Ok(record) => decoded.push(record),
                    Err(e) => {
                        skipped += 1;
                        debug!("Skipping undecodable log at block {}: {e}", raw.block_number);
                    }
                }
            }

            if chunk_end == u64::MAX {
                break;
            }
            cursor = chunk_end + 1;
        }

        // Resolve each distinct block once instead of once per log.
        let resolved = self
            .timestamps
            .resolve_many(
                self.provider.as_ref(),
                decoded.iter().map(|record| record.block_number),
            )
            .await?;

        let mut records: Vec<LedgerEvent> = decoded
            .into_iter()
            .filter_map(|record| {
                resolved
                    .get(&record.block_number)
                    .map(|ts| record.into_event(*ts))
            })
            .collect();
        records.sort_by(|a, b| b.ord_key().cmp(&a.ord_key()));

        info!(
            records = records.len(),
            skipped,
            max_block = to_block,
            "✅ Historical backfill complete"
        );
        Ok((records, to_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Payroll;
    use crate::error::AppError;
    use crate::ledger::models::EventKind;
    use crate::testing::{addr, raw_log, tx, MockLedger, LEDGER};
    use alloy::primitives::U256;

    fn deposit_log(block: u64, tx_n: u64, log_index: u64) -> crate::provider::traits::RawLog {
        raw_log(
            Payroll::Deposited {
                from: addr(1),
                amount: U256::from(100u64),
            },
            block,
            tx(tx_n),
            log_index,
        )
    }

    #[tokio::test]
    async fn test_backfill_decodes_orders_and_reports_upper_bound() {
        let ledger = MockLedger::new();
        ledger.set_latest_block(30);
        ledger.set_logs(vec![
            deposit_log(20, 2, 1),
            deposit_log(5, 1, 0),
            deposit_log(20, 2, 0),
        ]);

        let ingestor = HistoricalIngestor::new(
            ledger.shared(),
            Arc::new(BlockTimestampCache::new()),
            LEDGER,
            1_000,
        );
        let (records, max_block) = ingestor.ingest(0, None).await.unwrap();

        assert_eq!(max_block, 30);
        assert_eq!(records.len(), 3);
        // Newest first, ties broken by log index descending.
        assert_eq!(
            records
                .iter()
                .map(|r| (r.block_number, r.log_index))
                .collect::<Vec<_>>(),
            vec![(20, 1), (20, 0), (5, 0)]
        );
        assert!(records.iter().all(|r| r.kind == EventKind::Deposit));
    }

    #[tokio::test]
    async fn test_backfill_chunks_the_block_range() {
        let ledger = MockLedger::new();
        ledger.set_latest_block(25);

        let ingestor = HistoricalIngestor::new(
            ledger.shared(),
            Arc::new(BlockTimestampCache::new()),
            LEDGER,
            10,
        );
        ingestor.ingest(0, None).await.unwrap();

        assert_eq!(ledger.log_queries(), vec![(0, 9), (10, 19), (20, 25)]);
    }

    #[tokio::test]
    async fn test_undecodable_logs_are_excluded_without_aborting() {
        let ledger = MockLedger::new();
        ledger.set_latest_block(10);

        let mut bad = deposit_log(4, 9, 0);
        let truncated = bad.data[..bad.data.len() / 2].to_vec();
        bad.data = truncated.into();

        ledger.set_logs(vec![deposit_log(3, 1, 0), bad, deposit_log(6, 2, 0)]);

        let ingestor = HistoricalIngestor::new(
            ledger.shared(),
            Arc::new(BlockTimestampCache::new()),
            LEDGER,
            1_000,
        );
        let (records, _) = ingestor.ingest(0, None).await.unwrap();

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_rpc_failure_aborts_the_whole_ingestion() {
        let ledger = MockLedger::new();
        ledger.set_latest_block(10);
        ledger.set_logs(vec![deposit_log(3, 1, 0)]);
        ledger.fail_log_queries(true);

        let ingestor = HistoricalIngestor::new(
            ledger.shared(),
            Arc::new(BlockTimestampCache::new()),
            LEDGER,
            1_000,
        );

        assert!(matches!(
            ingestor.ingest(0, None).await,
            Err(AppError::Transport(_))
        ));
    }
}
