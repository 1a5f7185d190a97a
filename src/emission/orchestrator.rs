use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::render::{DocumentRenderer, TextRenderer};
use super::secrets::CredentialProvider;
use super::state::{EmissionRecord, EmissionState};
use super::store::InvoiceStore;
use super::transitions;
use crate::config::EmissionConfig;
use crate::core::{FacturaError, Issuer, SaleRequest, Sequential, TaxDocument, TaxDocumentBuilder};
use crate::sri::SriClient;
use crate::sync::{LogStatus, SyncLog, actions};
use crate::xades::{SignedDocument, XadesSigner};
use crate::xml::to_factura_xml;

/// What the caller learns about one emission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionReport {
    pub access_key: String,
    pub sequential: String,
    pub state: EmissionState,
    pub message: Option<String>,
}

impl From<&EmissionRecord> for EmissionReport {
    fn from(record: &EmissionRecord) -> Self {
        Self {
            access_key: record.access_key.clone(),
            sequential: record.sequential.clone(),
            state: record.state.clone(),
            message: record.error_message.clone(),
        }
    }
}

/// Foreground emission: build, sign, submit, authorize, render, persist.
///
/// Emissions run one at a time so sequential assignment cannot race.
pub struct Orchestrator {
    issuer: Issuer,
    config: EmissionConfig,
    store: Arc<dyn InvoiceStore>,
    client: Arc<dyn SriClient>,
    credentials: Arc<dyn CredentialProvider>,
    renderer: Arc<dyn DocumentRenderer>,
    log: SyncLog,
    emission_lock: Mutex<()>,
}

impl Orchestrator {
    /// An orchestrator rendering with [`TextRenderer`] and a private log.
    pub fn new(
        issuer: Issuer,
        config: EmissionConfig,
        store: Arc<dyn InvoiceStore>,
        client: Arc<dyn SriClient>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            issuer,
            config,
            store,
            client,
            credentials,
            renderer: Arc::new(TextRenderer),
            log: SyncLog::new(),
            emission_lock: Mutex::new(()),
        }
    }

    /// Replace the plain-text renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Share a log with the reconciliation worker.
    pub fn with_log(mut self, log: SyncLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    /// One past the most recently persisted sequential.
    pub async fn next_sequential(&self) -> Result<Sequential, FacturaError> {
        let latest = self.store.latest().await?;
        Sequential::after(latest.as_ref().map(|r| r.sequential.as_str()))
    }

    /// Emit a sale issued now.
    pub async fn emit(&self, request: &SaleRequest) -> Result<EmissionReport, FacturaError> {
        self.emit_at(request, Local::now().naive_local()).await
    }

    /// Emit a sale issued at `issued_at`.
    ///
    /// Validation, regulatory, configuration and certificate failures return
    /// `Err` before any network call and persist nothing. Every other outcome
    /// is persisted exactly once and summarized in the report.
    pub async fn emit_at(
        &self,
        request: &SaleRequest,
        issued_at: NaiveDateTime,
    ) -> Result<EmissionReport, FacturaError> {
        let _guard = self.emission_lock.lock().await;

        if request.sequential.is_some() {
            warn!("ignoring caller-supplied sequential");
        }
        let sequential = self.next_sequential().await?;
        let doc = TaxDocumentBuilder::new(self.issuer.clone(), issued_at.date())
            .sequential(sequential)
            .security_code(self.config.security_code.clone())
            .build(request)?;
        let identity = self.credentials.signing_identity()?;

        let mut record = match serialize_and_sign(&doc, XadesSigner::new(identity)) {
            Ok(signed) => EmissionRecord::new(&doc, signed, issued_at),
            Err(e) => {
                warn!(access_key = %doc.access_key, error = %e, "document could not be signed");
                EmissionRecord::technical_error(&doc, issued_at, e.to_string())
            }
        };

        transitions::advance(
            self.client.as_ref(),
            &mut record,
            self.config.authorization_delay(),
            &self.log,
        )
        .await;

        if record.state != EmissionState::TechnicalError {
            match self.renderer.render(&record) {
                Ok(bytes) => record.rendered = Some(bytes),
                Err(e) => warn!(access_key = %record.access_key, error = %e, "rendering failed"),
            }
        }

        self.store.insert(record.clone()).await?;

        let status = match &record.state {
            EmissionState::Authorized => LogStatus::Success,
            EmissionState::Received | EmissionState::PendingSubmission => LogStatus::Warning,
            _ => LogStatus::Error,
        };
        self.log.push(
            actions::EMISSION,
            status,
            format!("invoice {} emitted as {}", record.sequential, record.state),
        );
        info!(
            access_key = %record.access_key,
            sequential = %record.sequential,
            state = %record.state,
            "emission settled"
        );

        Ok(EmissionReport::from(&record))
    }
}

fn serialize_and_sign(doc: &TaxDocument, signer: XadesSigner) -> Result<SignedDocument, FacturaError> {
    let xml = to_factura_xml(doc)?;
    signer.sign(&xml)
}
