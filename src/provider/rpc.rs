use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{info, warn};

use crate::bindings::Payroll;
use crate::config::Config;
use crate::error::{AppError, AppResult, RejectedOperationError, TransientIoError};
use crate::ledger::models::{AttendanceEntry, Employee, EventKind};
use crate::provider::traits::{LedgerProvider, LogStream, RawLog, TxOutcome};
use crate::sync::decoder;

/// Production `LedgerProvider` backed by an EVM JSON-RPC node via alloy.
pub struct RpcLedgerProvider {
    provider: DynProvider,
    contract: Payroll::PayrollInstance<DynProvider>,
    address: Address,
    poll_interval: Duration,
}

impl RpcLedgerProvider {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let address: Address = config
            .ledger_address
            .parse()
            .map_err(|_| AppError::Config(format!("invalid ledger address {}", config.ledger_address)))?;

        let provider: DynProvider = match &config.signer_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|e| AppError::Config(format!("invalid signer key: {e}")))?;
                info!("🔑 Submitting account: {}", signer.address());
                ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect(&config.rpc_url)
                    .await
                    .map_err(transport)?
                    .erased()
            }
            None => {
                warn!("SIGNER_KEY not set - write operations disabled, sync-only session");
                ProviderBuilder::new()
                    .connect(&config.rpc_url)
                    .await
                    .map_err(transport)?
                    .erased()
            }
        };

        let contract = Payroll::new(address, provider.clone());
        info!("✅ Connected to ledger {} via {}", address, config.rpc_url);

        Ok(Self {
            provider,
            contract,
            address,
            poll_interval: Duration::from_millis(config.watch_poll_ms),
        })
    }

    pub fn ledger_address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl LedgerProvider for RpcLedgerProvider {
    async fn employee(&self, who: Address) -> AppResult<Employee> {
        let info = self.contract.employees(who).call().await.map_err(transport)?;
        Ok(Employee {
            address: who,
            name: info.name,
            hourly_rate: info.hourlyRate,
            accrued: info.accrued,
            exists: info.exists,
        })
    }

    async fn all_employees(&self) -> AppResult<Vec<Address>> {
        self.contract.allEmployees().call().await.map_err(transport)
    }

    async fn employee_count(&self) -> AppResult<u64> {
        let count = self
            .contract
            .getEmployeeCount()
            .call()
            .await
            .map_err(transport)?;
        u64::try_from(count)
            .map_err(|_| AppError::Internal("employee count exceeds u64".to_string()))
    }

    async fn accrued_of(&self, who: Address) -> AppResult<U256> {
        self.contract.accruedOf(who).call().await.map_err(transport)
    }

    async fn attendance_count(&self, who: Address) -> AppResult<u64> {
        let count = self
            .contract
            .attendanceCount(who)
            .call()
            .await
            .map_err(transport)?;
        u64::try_from(count)
            .map_err(|_| AppError::Internal("attendance count exceeds u64".to_string()))
    }

    async fn attendance(
        &self,
        who: Address,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<AttendanceEntry>> {
        let page = self
            .contract
            .attendance(who, U256::from(offset), U256::from(limit))
            .call()
            .await
            .map_err(transport)?;

        let mut entries = Vec::with_capacity(page.timestamps.len());
        for (ts, minutes) in page.timestamps.iter().zip(page.workedMinutes.iter()) {
            let secs = u64::try_from(*ts)
                .map_err(|_| AppError::Internal("attendance timestamp exceeds u64".to_string()))?;
            let worked_minutes = u64::try_from(*minutes)
                .map_err(|_| AppError::Internal("worked minutes exceed u64".to_string()))?;
            entries.push(AttendanceEntry {
                timestamp: timestamp_from_secs(secs)?,
                worked_minutes,
            });
        }
        Ok(entries)
    }

    async fn contract_balance(&self) -> AppResult<U256> {
        self.contract.contractBalance().call().await.map_err(transport)
    }

    async fn owner(&self) -> AppResult<Address> {
        self.contract.getOwner().call().await.map_err(transport)
    }

    async fn latest_block(&self) -> AppResult<u64> {
        self.provider.get_block_number().await.map_err(transport)
    }

    async fn block_timestamp(&self, block: u64) -> AppResult<DateTime<Utc>> {
        let header = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .map_err(transport)?
            .ok_or_else(|| {
                AppError::Transport(TransientIoError::Rpc(format!("block {block} not found")))
            })?;
        timestamp_from_secs(header.header.timestamp)
    }

    async fn logs_in_range(&self, from_block: u64, to_block: u64) -> AppResult<Vec<RawLog>> {
        let filter = Filter::new()
            .address(self.address)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(transport)?;
        Ok(logs.into_iter().filter_map(raw_from_log).collect())
    }

    async fn watch_kind(&self, kind: EventKind, from_block: u64) -> AppResult<LogStream> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(decoder::selector(kind))
            .from_block(from_block);

        let poller = self
            .provider
            .watch_logs(&filter)
            .await
            .map_err(transport)?
            .with_poll_interval(self.poll_interval);

        Ok(poller
            .into_stream()
            .flat_map(|logs| futures::stream::iter(logs.into_iter().filter_map(raw_from_log)))
            .boxed())
    }

    async fn add_employee(
        &self,
        who: Address,
        name: &str,
        hourly_rate: U256,
    ) -> AppResult<TxHash> {
        let pending = self
            .contract
            .addEmployee(who, name.to_string(), hourly_rate)
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn update_rate(&self, who: Address, hourly_rate: U256) -> AppResult<TxHash> {
        let pending = self
            .contract
            .updateRate(who, hourly_rate)
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn remove_employee(&self, who: Address) -> AppResult<TxHash> {
        let pending = self
            .contract
            .removeEmployee(who)
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn check_in(&self) -> AppResult<TxHash> {
        let pending = self.contract.checkIn().send().await.map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn check_out(&self) -> AppResult<TxHash> {
        let pending = self.contract.checkOut().send().await.map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw(&self) -> AppResult<TxHash> {
        let pending = self.contract.withdraw().send().await.map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn deposit(&self, amount: U256) -> AppResult<TxHash> {
        let pending = self
            .contract
            .deposit()
            .value(amount)
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn settle_batch(&self, start: u64, count: u64) -> AppResult<TxHash> {
        let pending = self
            .contract
            .payAll(U256::from(start), U256::from(count))
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw_funds(&self, amount: U256) -> AppResult<TxHash> {
        let pending = self
            .contract
            .withdrawFunds(amount)
            .send()
            .await
            .map_err(classify_send)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> AppResult<TxOutcome> {
        loop {
            if let Some(receipt) = self
                .provider
                .get_transaction_receipt(tx)
                .await
                .map_err(transport)?
            {
                return Ok(if receipt.status() {
                    TxOutcome::Confirmed
                } else {
                    TxOutcome::Reverted
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn raw_from_log(log: Log) -> Option<RawLog> {
    Some(RawLog {
        topics: log.inner.data.topics().to_vec(),
        data: log.inner.data.data.clone(),
        block_number: log.block_number?,
        tx_hash: log.transaction_hash?,
        log_index: log.log_index?,
    })
}

fn timestamp_from_secs(secs: u64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs as i64, 0)
        .ok_or_else(|| AppError::Internal(format!("timestamp {secs} out of range")))
}

fn transport<E: std::fmt::Display>(error: E) -> AppError {
    AppError::Transport(TransientIoError::Rpc(error.to_string()))
}

/// A submission failure is either the ledger refusing the write (a revert,
/// usually surfaced during gas estimation) or plain transport trouble.
fn classify_send(error: alloy::contract::Error) -> AppError {
    let message = error.to_string();
    if message.contains("revert") || message.contains("execution reverted") {
        AppError::Rejected(RejectedOperationError::Reverted(message))
    } else {
        AppError::Transport(TransientIoError::Rpc(message))
    }
}
