//! The submit/authorize state machine shared by foreground emission and the
//! reconciliation worker.

use std::time::Duration;

use tracing::debug;

use super::state::{EmissionRecord, EmissionState};
use crate::sri::{
    Authorization, AuthorizationResponse, ProtocolRejection, ReceptionResponse, SriClient, SriError,
};
use crate::sync::{LogStatus, SyncLog, actions};

/// Authorization status meaning the SRI is still processing.
pub const IN_PROCESS: &str = "EN PROCESO";

/// What a reception call amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Received,
    Rejected(ProtocolRejection),
    /// No answer: keep the document for a later attempt.
    NetworkFailure(String),
    /// An answer that could not be understood.
    InvalidResponse(String),
}

impl SubmitOutcome {
    pub fn classify(result: Result<ReceptionResponse, SriError>) -> Self {
        match result {
            Ok(response) if response.is_received() => Self::Received,
            Ok(response) if response.status.is_empty() => {
                Self::InvalidResponse("reception response carries no status".into())
            }
            Ok(response) => Self::Rejected(ProtocolRejection::from_reception(&response)),
            Err(SriError::Network(e)) => Self::NetworkFailure(e),
            Err(SriError::InvalidResponse(e)) => Self::InvalidResponse(e),
        }
    }
}

/// What an authorization query amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    Authorized(Authorization),
    Rejected(ProtocolRejection),
    /// No entry yet, or the SRI is still processing.
    NotYetAvailable,
    NetworkFailure(String),
    InvalidResponse(String),
}

impl AuthorizeOutcome {
    pub fn classify(result: Result<AuthorizationResponse, SriError>) -> Self {
        match result {
            Ok(response) => {
                if let Some(authorization) = response.authorized() {
                    return Self::Authorized(authorization.clone());
                }
                match response.authorizations.last() {
                    None => Self::NotYetAvailable,
                    Some(last) if last.status == IN_PROCESS => Self::NotYetAvailable,
                    Some(_) => Self::Rejected(ProtocolRejection::from_authorization(&response)),
                }
            }
            Err(SriError::Network(e)) => Self::NetworkFailure(e),
            Err(SriError::InvalidResponse(e)) => Self::InvalidResponse(e),
        }
    }
}

impl EmissionRecord {
    /// An unreadable reception answer is ERROR_TECNICO on first submission,
    /// but a PENDIENTE_ENVIO record stays queued for the next pass.
    pub fn apply_submit(&mut self, outcome: &SubmitOutcome) {
        match outcome {
            SubmitOutcome::Received => {
                self.state = EmissionState::Received;
                self.error_message = None;
            }
            SubmitOutcome::Rejected(rejection) => {
                self.state = EmissionState::Rejected(rejection.status.clone());
                self.error_message = Some(rejection.detail.clone());
            }
            SubmitOutcome::NetworkFailure(e) => {
                self.state = EmissionState::PendingSubmission;
                self.error_message =
                    Some(format!("SRI unreachable ({e}); stored for later submission"));
            }
            // A contingency document already left the building once; keep it queued.
            SubmitOutcome::InvalidResponse(e)
                if self.state == EmissionState::PendingSubmission =>
            {
                self.error_message = Some(format!(
                    "unexpected reception response ({e}); kept for later submission"
                ));
            }
            SubmitOutcome::InvalidResponse(e) => {
                self.state = EmissionState::TechnicalError;
                self.error_message = Some(format!("unexpected reception response: {e}"));
            }
        }
    }

    /// Authorization failures that carry no verdict leave the record RECIBIDA.
    pub fn apply_authorize(&mut self, outcome: &AuthorizeOutcome) {
        match outcome {
            AuthorizeOutcome::Authorized(authorization) => {
                self.state = EmissionState::Authorized;
                self.error_message = None;
                self.authorization_number = authorization.number.clone();
                self.authorization_date = authorization.date.clone();
            }
            AuthorizeOutcome::Rejected(rejection) => {
                self.state = EmissionState::Rejected(rejection.status.clone());
                self.error_message = Some(rejection.detail.clone());
            }
            AuthorizeOutcome::NotYetAvailable => {
                self.state = EmissionState::Received;
                self.error_message = Some("received; authorization not yet available".into());
            }
            AuthorizeOutcome::NetworkFailure(e) => {
                self.state = EmissionState::Received;
                self.error_message = Some(format!("received; authorization query failed: {e}"));
            }
            AuthorizeOutcome::InvalidResponse(e) => {
                self.state = EmissionState::Received;
                self.error_message =
                    Some(format!("received; unexpected authorization response: {e}"));
            }
        }
    }
}

/// Advance `record` as far as the SRI allows in one go.
///
/// PENDIENTE and PENDIENTE_ENVIO records are submitted; a RECIBIDA result is
/// followed by `delay` and an authorization query. RECIBIDA records go
/// straight to the query. Other states are left untouched.
pub async fn advance(
    client: &dyn SriClient,
    record: &mut EmissionRecord,
    delay: Duration,
    log: &SyncLog,
) {
    match record.state {
        EmissionState::Pending | EmissionState::PendingSubmission => {
            let outcome = SubmitOutcome::classify(client.submit(&record.signed_xml).await);
            record.apply_submit(&outcome);
            log_submit(log, record, &outcome);
            if record.state != EmissionState::Received {
                return;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        EmissionState::Received => {}
        _ => {
            debug!(access_key = %record.access_key, state = %record.state, "nothing to advance");
            return;
        }
    }

    let outcome = AuthorizeOutcome::classify(client.authorize(&record.access_key).await);
    record.apply_authorize(&outcome);
    log_authorize(log, record, &outcome);
}

fn log_submit(log: &SyncLog, record: &EmissionRecord, outcome: &SubmitOutcome) {
    let (status, detail) = match outcome {
        SubmitOutcome::Received => (LogStatus::Success, "received by the SRI".to_string()),
        SubmitOutcome::Rejected(r) => (LogStatus::Error, format!("rejected: {r}")),
        SubmitOutcome::NetworkFailure(e) => (LogStatus::Warning, format!("SRI unreachable: {e}")),
        SubmitOutcome::InvalidResponse(e) => (LogStatus::Error, format!("invalid response: {e}")),
    };
    log.push_exchange(
        actions::SUBMISSION,
        status,
        format!("{} {}", record.sequential, detail),
        record.access_key.as_str(),
        record.state.code(),
    );
}

fn log_authorize(log: &SyncLog, record: &EmissionRecord, outcome: &AuthorizeOutcome) {
    let (status, detail) = match outcome {
        AuthorizeOutcome::Authorized(_) => (LogStatus::Success, "authorized".to_string()),
        AuthorizeOutcome::Rejected(r) => (LogStatus::Error, format!("not authorized: {r}")),
        AuthorizeOutcome::NotYetAvailable => {
            (LogStatus::Info, "authorization not yet available".to_string())
        }
        AuthorizeOutcome::NetworkFailure(e) => {
            (LogStatus::Warning, format!("authorization query failed: {e}"))
        }
        AuthorizeOutcome::InvalidResponse(e) => {
            (LogStatus::Warning, format!("invalid authorization response: {e}"))
        }
    };
    log.push_exchange(
        actions::AUTHORIZATION,
        status,
        format!("{} {}", record.sequential, detail),
        record.access_key.as_str(),
        record.state.code(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sri::{ReceptionDocument, SriMessage};

    fn authorization(status: &str, id: &str) -> Authorization {
        Authorization {
            status: status.into(),
            messages: vec![SriMessage {
                identifier: id.into(),
                message: "detalle".into(),
                additional_info: None,
                kind: "ERROR".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn reception_classification() {
        let received = ReceptionResponse {
            status: "RECIBIDA".into(),
            documents: Vec::new(),
        };
        assert_eq!(SubmitOutcome::classify(Ok(received)), SubmitOutcome::Received);

        let returned = ReceptionResponse {
            status: "DEVUELTA".into(),
            documents: vec![ReceptionDocument::default()],
        };
        assert!(matches!(
            SubmitOutcome::classify(Ok(returned)),
            SubmitOutcome::Rejected(r) if r.status == "DEVUELTA"
        ));

        assert_eq!(
            SubmitOutcome::classify(Err(SriError::Network("timeout".into()))),
            SubmitOutcome::NetworkFailure("timeout".into())
        );
        assert!(matches!(
            SubmitOutcome::classify(Ok(ReceptionResponse::default())),
            SubmitOutcome::InvalidResponse(_)
        ));
    }

    #[test]
    fn any_authorized_entry_wins() {
        let response = AuthorizationResponse {
            authorizations: vec![authorization("NO AUTORIZADO", "45"), authorization("AUTORIZADO", "60")],
            ..Default::default()
        };
        assert!(matches!(
            AuthorizeOutcome::classify(Ok(response)),
            AuthorizeOutcome::Authorized(_)
        ));
    }

    #[test]
    fn empty_or_in_process_is_not_yet_available() {
        assert_eq!(
            AuthorizeOutcome::classify(Ok(AuthorizationResponse::default())),
            AuthorizeOutcome::NotYetAvailable
        );
        let response = AuthorizationResponse {
            authorizations: vec![authorization(IN_PROCESS, "70")],
            ..Default::default()
        };
        assert_eq!(
            AuthorizeOutcome::classify(Ok(response)),
            AuthorizeOutcome::NotYetAvailable
        );
    }

    #[test]
    fn rejection_takes_last_status() {
        let response = AuthorizationResponse {
            authorizations: vec![authorization(IN_PROCESS, "70"), authorization("NO AUTORIZADO", "45")],
            ..Default::default()
        };
        match AuthorizeOutcome::classify(Ok(response)) {
            AuthorizeOutcome::Rejected(r) => {
                assert_eq!(r.status, "NO AUTORIZADO");
                assert!(r.detail.contains("[NO AUTORIZADO] 45: detalle; "));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
