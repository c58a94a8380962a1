use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::ledger::models::Employee;
use crate::provider::traits::LedgerProvider;

/// Read-through cache of employee attributes keyed by address.
///
/// The registry is a disposable projection, never a source of truth: a
/// refresh re-reads the ledger, and an employee vanishing between the
/// listing and the detail fetch simply comes back with `exists = false`.
pub struct EmployeeRegistry {
    provider: Arc<dyn LedgerProvider>,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    addresses: Option<Vec<Address>>,
    details: HashMap<Address, Employee>,
}

impl EmployeeRegistry {
    pub fn new(provider: Arc<dyn LedgerProvider>) -> Self {
        Self {
            provider,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The ordered registry listing, fetched once per refresh cycle.
    pub async fn all_addresses(&self) -> AppResult<Vec<Address>> {
        if let Some(addresses) = &self.inner.read().await.addresses {
            return Ok(addresses.clone());
        }

        let fetched = self.provider.all_employees().await?;
        debug!("Fetched employee registry listing: {} entries", fetched.len());
        self.inner.write().await.addresses = Some(fetched.clone());
        Ok(fetched)
    }

    pub async fn len(&self) -> AppResult<usize> {
        Ok(self.all_addresses().await?.len())
    }

    /// Employee details, suspending only on the first access per address
    /// per refresh cycle.
    pub async fn get(&self, who: Address) -> AppResult<Employee> {
        if let Some(employee) = self.inner.read().await.details.get(&who) {
            return Ok(employee.clone());
        }
        self.refresh_one(who).await
    }

    /// Force a re-read of one employee.
    pub async fn refresh_one(&self, who: Address) -> AppResult<Employee> {
        let employee = self.provider.employee(who).await?;
        self.inner.write().await.details.insert(who, employee.clone());
        Ok(employee)
    }

    /// Re-read a fixed set of addresses, e.g. a settlement batch's window.
    pub async fn refresh_window(&self, addresses: &[Address]) -> AppResult<()> {
        for who in addresses {
            self.refresh_one(*who).await?;
        }
        info!("🔄 Refreshed {} registry entries", addresses.len());
        Ok(())
    }

    /// Drop every cached value; the next reads re-fetch from the ledger.
    pub async fn refresh_all(&self) -> AppResult<()> {
        {
            let mut inner = self.inner.write().await;
            inner.addresses = None;
            inner.details.clear();
        }
        self.all_addresses().await?;
        Ok(())
    }

    /// The employee's absolute index within the full registry listing,
    /// independent of any filtered or paginated view of it.
    pub async fn absolute_index_of(&self, who: Address) -> AppResult<Option<usize>> {
        Ok(self
            .all_addresses()
            .await?
            .iter()
            .position(|address| *address == who))
    }
}
