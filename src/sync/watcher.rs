use std::sync::Arc;

use alloy::primitives::Address;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::ledger::models::{EventKind, LedgerEvent};
use crate::provider::traits::{LedgerProvider, LogStream};
use crate::sync::decoder;
use crate::sync::timestamps::BlockTimestampCache;

const FEED_BUFFER: usize = 256;

/// The merged live event feed: one watch per event kind, all decoded and
/// forwarded into a single channel so exactly one merge routine downstream
/// handles deduplication.
///
/// Watches are opened together and torn down together; there is no
/// partial teardown.
pub struct LiveFeed {
    pub events: mpsc::Receiver<LedgerEvent>,
    pub handles: Vec<JoinHandle<()>>,
}

impl LiveFeed {
    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        info!("Live watches torn down");
    }
}

/// Open one watch per event kind starting at `from_block` and multiplex
/// them. Every watch is established before any forwarding task starts, so
/// a failure to open any of them opens none.
pub async fn open_feed(
    provider: Arc<dyn LedgerProvider>,
    ledger: Address,
    timestamps: Arc<BlockTimestampCache>,
    from_block: u64,
) -> AppResult<LiveFeed> {
    let mut streams: Vec<(EventKind, LogStream)> = Vec::new();
    for kind in EventKind::all() {
        let stream = provider.watch_kind(kind, from_block).await?;
        streams.push((kind, stream));
    }

    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    let mut handles = Vec::with_capacity(streams.len());
    for (kind, stream) in streams {
        handles.push(tokio::spawn(forward_kind(
            kind,
            stream,
            provider.clone(),
            ledger,
            timestamps.clone(),
            tx.clone(),
        )));
    }

    info!(
        from = from_block,
        "✅ Live subscriptions opened for all {} event kinds",
        EventKind::all().len()
    );
    Ok(LiveFeed { events: rx, handles })
}

async fn forward_kind(
    kind: EventKind,
    mut stream: LogStream,
    provider: Arc<dyn LedgerProvider>,
    ledger: Address,
    timestamps: Arc<BlockTimestampCache>,
    tx: mpsc::Sender<LedgerEvent>,
) {
    while let Some(raw) = stream.next().await {
        let decoded = match decoder::decode_log(ledger, &raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Skipping undecodable live log on {kind} watch: {e}");
                continue;
            }
        };

        let timestamp = match timestamps
            .timestamp_of(provider.as_ref(), raw.block_number)
            .await
        {
            Ok(ts) => ts,
            Err(e) => {
                error!(
                    "Failed to resolve timestamp for live block {}: {e}",
                    raw.block_number
                );
                continue;
            }
        };

        if tx.send(decoded.into_event(timestamp)).await.is_err() {
            debug!("Feed receiver dropped, ending {kind} watch");
            break;
        }
    }
    info!("Watch stream for {kind} ended");
}
