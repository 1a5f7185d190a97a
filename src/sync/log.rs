use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

/// Entries kept before the oldest is dropped.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Action names shown in the activity log.
pub mod actions {
    pub const EMISSION: &str = "Emision";
    pub const SUBMISSION: &str = "Envio";
    pub const AUTHORIZATION: &str = "Autorizacion";
    pub const SYNC: &str = "Sincronizacion";
    pub const CONNECTIVITY: &str = "Conectividad";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: u64,
    /// Wall-clock `HH:MM:SS`.
    pub timestamp: String,
    pub action: String,
    pub status: LogStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Debug, Default)]
struct LogInner {
    entries: VecDeque<SyncLogEntry>,
    next_id: u64,
}

/// Bounded, most-recent-first activity log shared between the foreground
/// emission path and the reconciliation worker.
///
/// Every entry is mirrored to `tracing` at the matching level.
#[derive(Debug, Clone, Default)]
pub struct SyncLog {
    inner: Arc<Mutex<LogInner>>,
}

impl SyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: &str, status: LogStatus, detail: impl Into<String>) {
        self.record(action, status, detail.into(), None, None);
    }

    /// An entry carrying the request and response it describes.
    pub fn push_exchange(
        &self,
        action: &str,
        status: LogStatus,
        detail: impl Into<String>,
        request: impl Into<String>,
        response: impl Into<String>,
    ) {
        self.record(
            action,
            status,
            detail.into(),
            Some(request.into()),
            Some(response.into()),
        );
    }

    /// Snapshot, most recent first.
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn record(
        &self,
        action: &str,
        status: LogStatus,
        detail: String,
        request: Option<String>,
        response: Option<String>,
    ) {
        match status {
            LogStatus::Error => error!(action, %detail),
            LogStatus::Warning => warn!(action, %detail),
            LogStatus::Success | LogStatus::Info => info!(action, %detail),
        }

        let mut inner = self.lock();
        inner.next_id += 1;
        let entry = SyncLogEntry {
            id: inner.next_id,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            action: action.to_string(),
            status,
            detail,
            request,
            response,
        };
        inner.entries.push_front(entry);
        inner.entries.truncate(MAX_LOG_ENTRIES);
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
