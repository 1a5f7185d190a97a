//! SOAP 1.1 envelopes for the SRI offline web services and typed parsing of
//! their responses.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::escape::partial_escape;
use quick_xml::events::Event;

use super::types::*;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const RECEPTION_NS: &str = "http://ec.gob.sri.ws.recepcion";
pub const AUTHORIZATION_NS: &str = "http://ec.gob.sri.ws.autorizacion";

/// `validarComprobante` request carrying the signed document in base64.
pub fn reception_envelope(signed_document: &[u8]) -> String {
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="{soap}" xmlns:ecua="{ns}">"#,
            "\n   <soapenv:Header/>",
            "\n   <soapenv:Body>",
            "\n      <ecua:validarComprobante>",
            "\n         <xml>{document}</xml>",
            "\n      </ecua:validarComprobante>",
            "\n   </soapenv:Body>",
            "\n</soapenv:Envelope>",
        ),
        soap = SOAP_ENVELOPE_NS,
        ns = RECEPTION_NS,
        document = STANDARD.encode(signed_document),
    )
}

/// `autorizacionComprobante` request for one access key.
pub fn authorization_envelope(access_key: &str) -> String {
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="{soap}" xmlns:ecua="{ns}">"#,
            "\n   <soapenv:Header/>",
            "\n   <soapenv:Body>",
            "\n      <ecua:autorizacionComprobante>",
            "\n         <claveAccesoComprobante>{key}</claveAccesoComprobante>",
            "\n      </ecua:autorizacionComprobante>",
            "\n   </soapenv:Body>",
            "\n</soapenv:Envelope>",
        ),
        soap = SOAP_ENVELOPE_NS,
        ns = AUTHORIZATION_NS,
        key = partial_escape(access_key.trim()),
    )
}

/// Parse a `validarComprobanteResponse`.
pub fn parse_reception_response(body: &str) -> Result<ReceptionResponse, SriError> {
    let mut parser = ReceptionParser::default();
    walk(body, &mut parser)?;
    if !parser.found {
        return Err(SriError::InvalidResponse(
            "no RespuestaRecepcionComprobante element in response".into(),
        ));
    }
    Ok(parser.response)
}

/// Parse an `autorizacionComprobanteResponse`.
pub fn parse_authorization_response(body: &str) -> Result<AuthorizationResponse, SriError> {
    let mut parser = AuthorizationParser::default();
    walk(body, &mut parser)?;
    if !parser.found {
        return Err(SriError::InvalidResponse(
            "no RespuestaAutorizacionComprobante element in response".into(),
        ));
    }
    Ok(parser.response)
}

/// Callbacks over a SOAP body; `path` holds local names and ends with the
/// current element.
trait SoapHandler {
    fn start(&mut self, path: &[String]);
    fn text(&mut self, path: &[String], text: &str);
    fn end(&mut self, path: &[String]);
}

fn walk(body: &str, handler: &mut impl SoapHandler) -> Result<(), SriError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut fault: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(local_name(e.local_name().as_ref()));
                if path.last().is_some_and(|n| n == "Fault") {
                    fault.get_or_insert_with(String::new);
                }
                handler.start(&path);
            }
            Ok(Event::Empty(ref e)) => {
                path.push(local_name(e.local_name().as_ref()));
                handler.start(&path);
                handler.end(&path);
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| SriError::InvalidResponse(format!("bad text: {err}")))?;
                if path.last().is_some_and(|n| n == "faultstring") {
                    fault = Some(text.to_string());
                }
                handler.text(&path, &text);
            }
            Ok(Event::CData(ref e)) => {
                let text = e
                    .decode()
                    .map_err(|err| SriError::InvalidResponse(format!("bad CDATA: {err}")))?;
                handler.text(&path, &text);
            }
            Ok(Event::End(_)) => {
                handler.end(&path);
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SriError::InvalidResponse(format!(
                    "malformed XML at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    match fault {
        Some(fault) => Err(SriError::InvalidResponse(format!("SOAP fault: {fault}"))),
        None => Ok(()),
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// The element and its parent, by local name.
fn tail(path: &[String]) -> (&str, &str) {
    let name = path.last().map_or("", String::as_str);
    let parent = path
        .len()
        .checked_sub(2)
        .and_then(|i| path.get(i))
        .map_or("", String::as_str);
    (parent, name)
}

fn message_field(message: &mut SriMessage, field: &str, text: &str) {
    match field {
        "identificador" => message.identifier = text.to_string(),
        "mensaje" => message.message = text.to_string(),
        "informacionAdicional" => message.additional_info = Some(text.to_string()),
        "tipo" => message.kind = text.to_string(),
        _ => {}
    }
}

#[derive(Default)]
struct ReceptionParser {
    found: bool,
    response: ReceptionResponse,
    document: Option<ReceptionDocument>,
    message: Option<SriMessage>,
}

fn is_reception_root(name: &str) -> bool {
    name == "RespuestaRecepcionComprobante" || name == "RespuestaSolicitud"
}

impl SoapHandler for ReceptionParser {
    fn start(&mut self, path: &[String]) {
        match tail(path) {
            (_, name) if is_reception_root(name) => self.found = true,
            ("comprobantes", "comprobante") => self.document = Some(ReceptionDocument::default()),
            ("mensajes", "mensaje") => self.message = Some(SriMessage::default()),
            _ => {}
        }
    }

    fn text(&mut self, path: &[String], text: &str) {
        match tail(path) {
            (parent, "estado") if is_reception_root(parent) => {
                self.response.status = text.to_string();
            }
            ("comprobante", "claveAcceso") => {
                if let Some(doc) = self.document.as_mut() {
                    doc.access_key = text.to_string();
                }
            }
            ("mensaje", field) => {
                if let Some(message) = self.message.as_mut() {
                    message_field(message, field, text);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, path: &[String]) {
        match tail(path) {
            ("mensajes", "mensaje") => {
                if let (Some(message), Some(doc)) = (self.message.take(), self.document.as_mut()) {
                    doc.messages.push(message);
                }
            }
            ("comprobantes", "comprobante") => {
                if let Some(doc) = self.document.take() {
                    self.response.documents.push(doc);
                }
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct AuthorizationParser {
    found: bool,
    response: AuthorizationResponse,
    authorization: Option<Authorization>,
    message: Option<SriMessage>,
}

impl SoapHandler for AuthorizationParser {
    fn start(&mut self, path: &[String]) {
        match tail(path) {
            (_, "RespuestaAutorizacionComprobante") => self.found = true,
            ("autorizaciones", "autorizacion") => {
                self.authorization = Some(Authorization::default());
            }
            ("mensajes", "mensaje") => self.message = Some(SriMessage::default()),
            _ => {}
        }
    }

    fn text(&mut self, path: &[String], text: &str) {
        match tail(path) {
            ("RespuestaAutorizacionComprobante", "claveAccesoConsultada") => {
                self.response.access_key = Some(text.to_string());
            }
            ("RespuestaAutorizacionComprobante", "numeroComprobantes") => {
                self.response.count = text.trim().parse().ok();
            }
            ("autorizacion", field) => {
                if let Some(auth) = self.authorization.as_mut() {
                    let value = Some(text.to_string());
                    match field {
                        "estado" => auth.status = text.to_string(),
                        "numeroAutorizacion" => auth.number = value,
                        "fechaAutorizacion" => auth.date = value,
                        "ambiente" => auth.environment = value,
                        "comprobante" => auth.document = value,
                        _ => {}
                    }
                }
            }
            ("mensaje", field) => {
                if let Some(message) = self.message.as_mut() {
                    message_field(message, field, text);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, path: &[String]) {
        match tail(path) {
            ("mensajes", "mensaje") => {
                if let (Some(message), Some(auth)) =
                    (self.message.take(), self.authorization.as_mut())
                {
                    auth.messages.push(message);
                }
            }
            ("autorizaciones", "autorizacion") => {
                if let Some(auth) = self.authorization.take() {
                    self.response.authorizations.push(auth);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reception_envelope_encodes_document() {
        let envelope = reception_envelope(b"<factura/>");
        assert!(envelope.contains(r#"xmlns:ecua="http://ec.gob.sri.ws.recepcion""#));
        assert!(envelope.contains("<xml>PGZhY3R1cmEvPg==</xml>"));
    }

    #[test]
    fn authorization_envelope_carries_key() {
        let envelope = authorization_envelope("2110201101179214673900110020010000000011234567813");
        assert!(envelope.contains(r#"xmlns:ecua="http://ec.gob.sri.ws.autorizacion""#));
        assert!(envelope.contains(
            "<claveAccesoComprobante>2110201101179214673900110020010000000011234567813</claveAccesoComprobante>"
        ));
    }

    #[test]
    fn parses_received() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion"><RespuestaRecepcionComprobante><estado>RECIBIDA</estado><comprobantes/></RespuestaRecepcionComprobante></ns2:validarComprobanteResponse></soap:Body></soap:Envelope>"#;
        let response = parse_reception_response(body).unwrap();
        assert!(response.is_received());
        assert!(response.documents.is_empty());
    }

    #[test]
    fn parses_returned_with_messages() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion">
      <RespuestaRecepcionComprobante>
        <estado>DEVUELTA</estado>
        <comprobantes>
          <comprobante>
            <claveAcceso>2110201101179214673900110020010000000011234567813</claveAcceso>
            <mensajes>
              <mensaje>
                <identificador>43</identificador>
                <mensaje>CLAVE ACCESO REGISTRADA</mensaje>
                <informacionAdicional>La clave de acceso ya fue registrada</informacionAdicional>
                <tipo>ERROR</tipo>
              </mensaje>
            </mensajes>
          </comprobante>
        </comprobantes>
      </RespuestaRecepcionComprobante>
    </ns2:validarComprobanteResponse>
  </soap:Body>
</soap:Envelope>"#;
        let response = parse_reception_response(body).unwrap();
        assert_eq!(response.status, RETURNED);
        let doc = &response.documents[0];
        assert_eq!(doc.access_key, "2110201101179214673900110020010000000011234567813");
        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.messages[0].identifier, "43");
        assert_eq!(doc.messages[0].message, "CLAVE ACCESO REGISTRADA");
        assert_eq!(doc.messages[0].kind, "ERROR");
    }

    #[test]
    fn parses_authorization_with_cdata() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ns2:autorizacionComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.autorizacion"><RespuestaAutorizacionComprobante><claveAccesoConsultada>2110201101179214673900110020010000000011234567813</claveAccesoConsultada><numeroComprobantes>1</numeroComprobantes><autorizaciones><autorizacion><estado>AUTORIZADO</estado><numeroAutorizacion>2110201101179214673900110020010000000011234567813</numeroAutorizacion><fechaAutorizacion>2024-06-15T10:31:02-05:00</fechaAutorizacion><ambiente>PRUEBAS</ambiente><comprobante><![CDATA[<?xml version="1.0" encoding="UTF-8"?><factura id="comprobante"></factura>]]></comprobante><mensajes/></autorizacion></autorizaciones></RespuestaAutorizacionComprobante></ns2:autorizacionComprobanteResponse></soap:Body></soap:Envelope>"#;
        let response = parse_authorization_response(body).unwrap();
        assert_eq!(response.count, Some(1));
        let auth = response.authorized().unwrap();
        assert_eq!(auth.date.as_deref(), Some("2024-06-15T10:31:02-05:00"));
        assert_eq!(auth.environment.as_deref(), Some("PRUEBAS"));
        assert!(auth.document.as_deref().unwrap().contains("<factura id=\"comprobante\">"));
    }

    #[test]
    fn fault_is_invalid_response() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>soap:Client</faultcode><faultstring>Unmarshalling Error</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;
        let err = parse_reception_response(body).unwrap_err();
        assert!(matches!(err, SriError::InvalidResponse(ref m) if m.contains("Unmarshalling Error")));
    }

    #[test]
    fn unexpected_body_is_invalid_response() {
        assert!(parse_authorization_response("<html><body>Service Unavailable</body></html>").is_err());
        assert!(parse_reception_response("not xml <<<").is_err());
    }
}
