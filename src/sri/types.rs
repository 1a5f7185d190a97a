use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reception status meaning the document was queued for authorization.
pub const RECEIVED: &str = "RECIBIDA";
/// Reception status meaning the document was returned as invalid.
pub const RETURNED: &str = "DEVUELTA";
/// Authorization status of an accepted document.
pub const AUTHORIZED: &str = "AUTORIZADO";

/// Failure to obtain a usable answer from the SRI.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SriError {
    /// Timeout, connection failure or a 5xx status. Retry later.
    #[error("SRI network error: {0}")]
    Network(String),
    /// The service answered, but not with the expected SOAP response.
    #[error("SRI invalid response: {0}")]
    InvalidResponse(String),
}

/// A message attached by the SRI to a document (`mensajes/mensaje`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SriMessage {
    pub identifier: String,
    pub message: String,
    pub additional_info: Option<String>,
    /// ERROR or ADVERTENCIA.
    pub kind: String,
}

impl fmt::Display for SriMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identifier, self.message)?;
        if let Some(info) = &self.additional_info {
            write!(f, " ({info})")?;
        }
        Ok(())
    }
}

/// Per-document section of a reception response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionDocument {
    pub access_key: String,
    pub messages: Vec<SriMessage>,
}

/// Answer of `validarComprobante`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionResponse {
    /// RECIBIDA or DEVUELTA.
    pub status: String,
    pub documents: Vec<ReceptionDocument>,
}

impl ReceptionResponse {
    pub fn is_received(&self) -> bool {
        self.status == RECEIVED
    }

    /// All messages across documents, in response order.
    pub fn messages(&self) -> impl Iterator<Item = &SriMessage> {
        self.documents.iter().flat_map(|d| d.messages.iter())
    }
}

/// One `autorizacion` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// AUTORIZADO, NO AUTORIZADO, EN PROCESO, ...
    pub status: String,
    pub number: Option<String>,
    pub date: Option<String>,
    pub environment: Option<String>,
    /// The authorized document as returned by the SRI.
    pub document: Option<String>,
    pub messages: Vec<SriMessage>,
}

impl Authorization {
    pub fn is_authorized(&self) -> bool {
        self.status == AUTHORIZED
    }
}

/// Answer of `autorizacionComprobante`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub access_key: Option<String>,
    pub count: Option<u32>,
    pub authorizations: Vec<Authorization>,
}

impl AuthorizationResponse {
    /// The first AUTORIZADO entry, if any.
    pub fn authorized(&self) -> Option<&Authorization> {
        self.authorizations.iter().find(|a| a.is_authorized())
    }
}

/// A document the SRI parsed and refused. Not retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRejection {
    /// The SRI's own status code (DEVUELTA, NO AUTORIZADO, ...).
    pub status: String,
    /// Message text as stored on the record.
    pub detail: String,
}

impl fmt::Display for ProtocolRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl ProtocolRejection {
    /// Rejection at reception: `"{id}: {message} ({info}); "` per message.
    pub fn from_reception(response: &ReceptionResponse) -> Self {
        let detail = response.messages().map(|m| format!("{m}; ")).collect();
        Self {
            status: response.status.clone(),
            detail,
        }
    }

    /// Rejection at authorization: the last entry's status, and
    /// `"[{status}] {id}: {message}; "` for every message of every entry.
    pub fn from_authorization(response: &AuthorizationResponse) -> Self {
        let status = response
            .authorizations
            .last()
            .map(|a| a.status.clone())
            .unwrap_or_default();
        let detail = response
            .authorizations
            .iter()
            .flat_map(|a| {
                a.messages
                    .iter()
                    .map(move |m| format!("[{}] {}: {}; ", a.status, m.identifier, m.message))
            })
            .collect();
        Self { status, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, text: &str, info: Option<&str>) -> SriMessage {
        SriMessage {
            identifier: id.into(),
            message: text.into(),
            additional_info: info.map(Into::into),
            kind: "ERROR".into(),
        }
    }

    #[test]
    fn reception_rejection_text() {
        let response = ReceptionResponse {
            status: RETURNED.into(),
            documents: vec![ReceptionDocument {
                access_key: "x".into(),
                messages: vec![
                    message("43", "CLAVE ACCESO REGISTRADA", None),
                    message("35", "ARCHIVO NO CUMPLE ESTRUCTURA XML", Some("linea 3")),
                ],
            }],
        };
        let rejection = ProtocolRejection::from_reception(&response);
        assert_eq!(rejection.status, "DEVUELTA");
        assert_eq!(
            rejection.detail,
            "43: CLAVE ACCESO REGISTRADA; 35: ARCHIVO NO CUMPLE ESTRUCTURA XML (linea 3); "
        );
    }

    #[test]
    fn authorization_rejection_uses_last_status() {
        let response = AuthorizationResponse {
            access_key: None,
            count: Some(2),
            authorizations: vec![
                Authorization {
                    status: "EN PROCESO".into(),
                    messages: vec![message("70", "CLAVE DE ACCESO EN PROCESAMIENTO", None)],
                    ..Default::default()
                },
                Authorization {
                    status: "NO AUTORIZADO".into(),
                    messages: vec![message("39", "FIRMA INVALIDA", None)],
                    ..Default::default()
                },
            ],
        };
        assert!(response.authorized().is_none());
        let rejection = ProtocolRejection::from_authorization(&response);
        assert_eq!(rejection.status, "NO AUTORIZADO");
        assert_eq!(
            rejection.detail,
            "[EN PROCESO] 70: CLAVE DE ACCESO EN PROCESAMIENTO; [NO AUTORIZADO] 39: FIRMA INVALIDA; "
        );
    }
}
