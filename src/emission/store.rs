use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::state::{EmissionRecord, EmissionState};
use crate::core::FacturaError;

/// Persistence of emission records, keyed by access key.
///
/// Implementations must tolerate concurrent use from the foreground emission
/// path and the reconciliation worker.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a new record. Fails if the access key already exists.
    async fn insert(&self, record: EmissionRecord) -> Result<(), FacturaError>;

    /// Overwrite an existing record in place.
    async fn update(&self, record: &EmissionRecord) -> Result<(), FacturaError>;

    async fn get(&self, access_key: &str) -> Result<Option<EmissionRecord>, FacturaError>;

    /// The most recently created record.
    async fn latest(&self) -> Result<Option<EmissionRecord>, FacturaError>;

    /// All records in `state`, in creation order.
    async fn find_by_state(&self, state: &EmissionState) -> Result<Vec<EmissionRecord>, FacturaError>;

    /// All records, in creation order.
    async fn all(&self) -> Result<Vec<EmissionRecord>, FacturaError>;
}

/// In-process [`InvoiceStore`] holding records in creation order.
#[derive(Debug, Default)]
pub struct MemoryInvoiceStore {
    records: Mutex<Vec<EmissionRecord>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`, oldest first.
    pub fn with_records(records: Vec<EmissionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<EmissionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn insert(&self, record: EmissionRecord) -> Result<(), FacturaError> {
        let mut records = self.records();
        if records.iter().any(|r| r.access_key == record.access_key) {
            return Err(FacturaError::Store(format!(
                "access key {} already exists",
                record.access_key
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn update(&self, record: &EmissionRecord) -> Result<(), FacturaError> {
        let mut records = self.records();
        let existing = records
            .iter_mut()
            .find(|r| r.access_key == record.access_key)
            .ok_or_else(|| {
                FacturaError::Store(format!("access key {} not found", record.access_key))
            })?;
        *existing = record.clone();
        Ok(())
    }

    async fn get(&self, access_key: &str) -> Result<Option<EmissionRecord>, FacturaError> {
        Ok(self
            .records()
            .iter()
            .find(|r| r.access_key == access_key)
            .cloned())
    }

    async fn latest(&self) -> Result<Option<EmissionRecord>, FacturaError> {
        Ok(self.records().last().cloned())
    }

    async fn find_by_state(&self, state: &EmissionState) -> Result<Vec<EmissionRecord>, FacturaError> {
        Ok(self
            .records()
            .iter()
            .filter(|r| &r.state == state)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<EmissionRecord>, FacturaError> {
        Ok(self.records().clone())
    }
}
