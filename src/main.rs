mod bindings;
mod bootstrap;
mod config;
mod error;
mod ledger;
mod provider;
mod registry;
mod settlement;
mod sync;
#[cfg(test)]
mod testing;

use ledger::models::EventKind;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,syncd=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting Payroll Sync & Settlement Backend");

    dotenv::dotenv().ok();
    let config = config::Config::from_env()?;

    let session = bootstrap::initialize_session(&config).await?;

    let store = session.history();
    let counts = store.counts_by_kind().await;
    info!(
        events = store.len().await,
        baseline = ?store.baseline().await,
        deposits = counts.get(&EventKind::Deposit).copied().unwrap_or(0),
        withdrawals = counts.get(&EventKind::Withdrawal).copied().unwrap_or(0),
        salaries = counts.get(&EventKind::SalaryPayment).copied().unwrap_or(0),
        "Timeline synchronized; watching for live events"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.shutdown().await;

    Ok(())
}
