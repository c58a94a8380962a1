use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AppResult;
use crate::provider::traits::LedgerProvider;

/// In-memory block-number -> wall-clock timestamp cache.
///
/// Many event records fall in the same block, so each block is resolved at
/// most once per process lifetime. No eviction: the distinct-block
/// cardinality of a single payroll ledger stays small.
pub struct BlockTimestampCache {
    cache: RwLock<HashMap<u64, DateTime<Utc>>>,
}

impl BlockTimestampCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve one block, suspending only on the first lookup.
    pub async fn timestamp_of(
        &self,
        provider: &dyn LedgerProvider,
        block: u64,
    ) -> AppResult<DateTime<Utc>> {
        if let Some(ts) = self.cache.read().await.get(&block) {
            return Ok(*ts);
        }

        let ts = provider.block_timestamp(block).await?;
        self.cache.write().await.insert(block, ts);
        debug!("💾 Cached timestamp for block {}", block);
        Ok(ts)
    }

    /// Resolve a set of blocks, fetching each distinct missing block once,
    /// concurrently. Fails as a whole if any lookup fails.
    pub async fn resolve_many(
        &self,
        provider: &dyn LedgerProvider,
        blocks: impl IntoIterator<Item = u64>,
    ) -> AppResult<HashMap<u64, DateTime<Utc>>> {
        let wanted: BTreeSet<u64> = blocks.into_iter().collect();

        let missing: Vec<u64> = {
            let cache = self.cache.read().await;
            wanted
                .iter()
                .copied()
                .filter(|block| !cache.contains_key(block))
                .collect()
        };

        if !missing.is_empty() {
            let fetched = futures::future::try_join_all(missing.iter().map(|&block| async move {
                let ts = provider.block_timestamp(block).await?;
                Ok::<_, crate::error::AppError>((block, ts))
            }))
            .await?;

            let mut cache = self.cache.write().await;
            for (block, ts) in fetched {
                cache.insert(block, ts);
            }
            debug!("💾 Cached timestamps for {} new blocks", missing.len());
        }

        let cache = self.cache.read().await;
        Ok(wanted
            .into_iter()
            .filter_map(|block| cache.get(&block).map(|ts| (block, *ts)))
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl Default for BlockTimestampCache {
    fn default() -> Self {
        Self::new()
    }
}
