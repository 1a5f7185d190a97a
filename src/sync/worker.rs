use std::sync::Arc;

use tokio::sync::{Notify, Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::log::{LogStatus, SyncLog, actions};
use crate::config::SyncConfig;
use crate::core::FacturaError;
use crate::emission::{EmissionRecord, EmissionState, InvoiceStore, transitions};
use crate::sri::SriClient;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// The SRI was unreachable and nothing was attempted.
    pub offline: bool,
    pub considered: usize,
    pub authorized: usize,
    /// Rejected by the SRI or failed locally.
    pub rejected: usize,
    /// Still PENDIENTE_ENVIO or RECIBIDA.
    pub pending: usize,
    /// Tasks that did not complete.
    pub failed: usize,
}

/// Retries documents left in PENDIENTE_ENVIO or RECIBIDA.
#[derive(Clone)]
pub struct ReconciliationWorker {
    store: Arc<dyn InvoiceStore>,
    client: Arc<dyn SriClient>,
    log: SyncLog,
    config: SyncConfig,
}

impl ReconciliationWorker {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        client: Arc<dyn SriClient>,
        log: SyncLog,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            client,
            log,
            config,
        }
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    /// Run a single pass.
    ///
    /// At most `max_concurrency` documents are in flight at once; each one is
    /// persisted as soon as it settles.
    pub async fn run_once(&self) -> Result<ReconcileSummary, FacturaError> {
        let mut summary = ReconcileSummary::default();

        if !self.client.is_reachable().await {
            self.log.push(
                actions::CONNECTIVITY,
                LogStatus::Error,
                "SRI unreachable, skipping reconciliation",
            );
            summary.offline = true;
            return Ok(summary);
        }

        let mut records = self
            .store
            .find_by_state(&EmissionState::PendingSubmission)
            .await?;
        records.extend(self.store.find_by_state(&EmissionState::Received).await?);
        summary.considered = records.len();

        if records.is_empty() {
            debug!("no documents awaiting reconciliation");
            return Ok(summary);
        }

        self.log.push(
            actions::SYNC,
            LogStatus::Info,
            format!("processing {} pending documents", records.len()),
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for record in records {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let worker = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                worker.reconcile(record).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(EmissionState::Authorized) => summary.authorized += 1,
                Ok(EmissionState::Rejected(_) | EmissionState::TechnicalError) => {
                    summary.rejected += 1
                }
                Ok(_) => summary.pending += 1,
                Err(e) => {
                    error!(error = %e, "reconciliation task failed");
                    summary.failed += 1;
                }
            }
        }

        self.log.push(
            actions::SYNC,
            LogStatus::Success,
            format!(
                "pass finished: {} authorized, {} rejected, {} pending",
                summary.authorized, summary.rejected, summary.pending
            ),
        );
        Ok(summary)
    }

    async fn reconcile(&self, mut record: EmissionRecord) -> EmissionState {
        transitions::advance(
            self.client.as_ref(),
            &mut record,
            self.config.authorization_delay(),
            &self.log,
        )
        .await;

        if let Err(e) = self.store.update(&record).await {
            self.log.push(
                actions::SYNC,
                LogStatus::Error,
                format!("cannot persist {}: {e}", record.access_key),
            );
        }
        record.state
    }

    /// Spawn the periodic loop. Passes never overlap.
    pub fn start(self) -> WorkerHandle {
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let notified = trigger.clone();
        let period = self.config.interval();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            info!(interval_secs = period.as_secs(), "reconciliation worker started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                    _ = notified.notified() => debug!("manual reconciliation requested"),
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                if let Err(e) = self.run_once().await {
                    self.log
                        .push(actions::SYNC, LogStatus::Error, format!("pass failed: {e}"));
                }
            }
            info!("reconciliation worker stopped");
        });

        WorkerHandle {
            trigger,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Control handle for a running [`ReconciliationWorker`].
pub struct WorkerHandle {
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request an immediate pass without waiting for it.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "reconciliation worker panicked");
        }
    }
}
