//! Canonical text fragments of the XAdES-BES signature block.
//!
//! Every fragment is written by hand in canonical form (double-quoted
//! attributes in canonical order, explicit end tags, no insignificant
//! whitespace) so the bytes digested here are the bytes a verifier obtains
//! by canonicalizing the embedded signature. The embedded forms inherit the
//! `ds` and `etsi` namespaces from `ds:Signature`; [`with_namespaces`] gives
//! the standalone form that is actually digested or signed.

use chrono::NaiveDateTime;
use rand::Rng;

use crate::core::FacturaError;
use crate::xml::xml_utils::escape_text;

pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const ETSI_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";

pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const RSA_SHA1_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const SHA1_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const SIGNED_PROPERTIES_TYPE: &str = "http://uri.etsi.org/01903#SignedProperties";

/// Element identifiers of one signature, all derived from a single number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureIds {
    pub signature: String,
    pub signed_properties: String,
    pub object: String,
    pub reference: String,
    pub signed_info: String,
    pub key_info: String,
    pub signature_value: String,
}

impl SignatureIds {
    pub fn new(number: u32) -> Self {
        let signature = format!("Signature-{number}");
        Self {
            signed_properties: format!("SignedProperties-{signature}"),
            object: format!("Object-{signature}"),
            reference: format!("Reference-{signature}"),
            signed_info: format!("SignedInfo-{signature}"),
            key_info: format!("KeyInfo-{signature}"),
            signature_value: format!("SignatureValue-{signature}"),
            signature,
        }
    }

    /// Identifiers from a random number in `0..1_000_000`.
    pub fn random() -> Self {
        Self::new(rand::rng().random_range(0..1_000_000))
    }
}

/// Signer metadata covered by `SignedProperties`.
#[derive(Debug, Clone)]
pub struct SignerDetails<'a> {
    pub signing_time: NaiveDateTime,
    /// Base64 SHA-1 of the certificate DER.
    pub certificate_digest: &'a str,
    pub issuer_name: &'a str,
    pub serial_number: &'a str,
}

/// `etsi:SignedProperties` as embedded in the signature.
pub fn signed_properties(ids: &SignatureIds, signer: &SignerDetails<'_>) -> String {
    format!(
        concat!(
            r#"<etsi:SignedProperties Id="{props_id}">"#,
            "<etsi:SignedSignatureProperties>",
            "<etsi:SigningTime>{time}</etsi:SigningTime>",
            "<etsi:SigningCertificate><etsi:Cert><etsi:CertDigest>",
            r#"<ds:DigestMethod Algorithm="{sha1}"></ds:DigestMethod>"#,
            "<ds:DigestValue>{cert_digest}</ds:DigestValue>",
            "</etsi:CertDigest><etsi:IssuerSerial>",
            "<ds:X509IssuerName>{issuer}</ds:X509IssuerName>",
            "<ds:X509SerialNumber>{serial}</ds:X509SerialNumber>",
            "</etsi:IssuerSerial></etsi:Cert></etsi:SigningCertificate>",
            "</etsi:SignedSignatureProperties>",
            "<etsi:SignedDataObjectProperties>",
            r##"<etsi:DataObjectFormat ObjectReference="#{reference_id}">"##,
            "<etsi:Description>contenido comprobante</etsi:Description>",
            "<etsi:MimeType>text/xml</etsi:MimeType>",
            "</etsi:DataObjectFormat>",
            "</etsi:SignedDataObjectProperties>",
            "</etsi:SignedProperties>",
        ),
        props_id = ids.signed_properties,
        time = signer.signing_time.format("%Y-%m-%dT%H:%M:%S"),
        sha1 = SHA1_ALGORITHM,
        cert_digest = signer.certificate_digest,
        issuer = escape_text(signer.issuer_name),
        serial = signer.serial_number,
        reference_id = ids.reference,
    )
}

/// `ds:SignedInfo` with the document and signed-properties references.
pub fn signed_info(ids: &SignatureIds, document_digest: &str, properties_digest: &str) -> String {
    format!(
        concat!(
            r#"<ds:SignedInfo Id="{signed_info_id}">"#,
            r#"<ds:CanonicalizationMethod Algorithm="{c14n}"></ds:CanonicalizationMethod>"#,
            r#"<ds:SignatureMethod Algorithm="{rsa_sha1}"></ds:SignatureMethod>"#,
            r##"<ds:Reference Id="{reference_id}" URI="#{root_id}">"##,
            r#"<ds:Transforms><ds:Transform Algorithm="{enveloped}"></ds:Transform></ds:Transforms>"#,
            r#"<ds:DigestMethod Algorithm="{sha1}"></ds:DigestMethod>"#,
            "<ds:DigestValue>{document_digest}</ds:DigestValue>",
            "</ds:Reference>",
            r##"<ds:Reference Type="{props_type}" URI="#{props_id}">"##,
            r#"<ds:Transforms><ds:Transform Algorithm="{c14n}"></ds:Transform></ds:Transforms>"#,
            r#"<ds:DigestMethod Algorithm="{sha1}"></ds:DigestMethod>"#,
            "<ds:DigestValue>{properties_digest}</ds:DigestValue>",
            "</ds:Reference>",
            "</ds:SignedInfo>",
        ),
        signed_info_id = ids.signed_info,
        c14n = C14N_ALGORITHM,
        rsa_sha1 = RSA_SHA1_ALGORITHM,
        reference_id = ids.reference,
        root_id = crate::xml::ROOT_ID,
        enveloped = ENVELOPED_TRANSFORM,
        sha1 = SHA1_ALGORITHM,
        document_digest = document_digest,
        props_type = SIGNED_PROPERTIES_TYPE,
        props_id = ids.signed_properties,
        properties_digest = properties_digest,
    )
}

/// `ds:KeyInfo` carrying the certificate and the raw RSA public key.
pub fn key_info(ids: &SignatureIds, certificate_b64: &str, modulus_b64: &str, exponent_b64: &str) -> String {
    format!(
        concat!(
            r#"<ds:KeyInfo Id="{key_info_id}">"#,
            "<ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data>",
            "<ds:KeyValue><ds:RSAKeyValue>",
            "<ds:Modulus>{modulus}</ds:Modulus>",
            "<ds:Exponent>{exponent}</ds:Exponent>",
            "</ds:RSAKeyValue></ds:KeyValue>",
            "</ds:KeyInfo>",
        ),
        key_info_id = ids.key_info,
        certificate = certificate_b64,
        modulus = modulus_b64,
        exponent = exponent_b64,
    )
}

/// The complete `ds:Signature` element.
pub fn signature(
    ids: &SignatureIds,
    signed_info: &str,
    signature_value_b64: &str,
    key_info: &str,
    signed_properties: &str,
) -> String {
    format!(
        concat!(
            r#"<ds:Signature xmlns:ds="{ds}" xmlns:etsi="{etsi}" Id="{signature_id}">"#,
            "{signed_info}",
            r#"<ds:SignatureValue Id="{value_id}">{value}</ds:SignatureValue>"#,
            "{key_info}",
            r#"<ds:Object Id="{object_id}">"#,
            r##"<etsi:QualifyingProperties Target="#{signature_id}">"##,
            "{signed_properties}",
            "</etsi:QualifyingProperties>",
            "</ds:Object>",
            "</ds:Signature>",
        ),
        ds = DS_NS,
        etsi = ETSI_NS,
        signature_id = ids.signature,
        signed_info = signed_info,
        value_id = ids.signature_value,
        value = signature_value_b64,
        key_info = key_info,
        object_id = ids.object,
        signed_properties = signed_properties,
    )
}

/// Standalone form of an embedded fragment: the inherited `ds` and `etsi`
/// declarations are written on its first element, ahead of its attributes.
pub fn with_namespaces(fragment: &str) -> String {
    let declarations = format!(r#" xmlns:ds="{DS_NS}" xmlns:etsi="{ETSI_NS}""#);
    let name_end = fragment
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || *c == '>' || *c == '/')
        .map_or(fragment.len(), |(i, _)| i);
    let mut out = String::with_capacity(fragment.len() + declarations.len());
    out.push_str(&fragment[..name_end]);
    out.push_str(&declarations);
    out.push_str(&fragment[name_end..]);
    out
}

/// Byte offset and name of the document's root element, skipping the prolog.
pub fn find_root(xml: &str) -> Result<(usize, &str), FacturaError> {
    let mut pos = 0;
    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let rest = &xml[start..];
        let skip_to = if rest.starts_with("<?") {
            rest.find("?>").map(|i| i + 2)
        } else if rest.starts_with("<!--") {
            rest.find("-->").map(|i| i + 3)
        } else if rest.starts_with("<!") {
            rest.find('>').map(|i| i + 1)
        } else {
            let name_len = rest[1..]
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(rest.len() - 1);
            let name = &rest[1..1 + name_len];
            if name.is_empty() {
                break;
            }
            return Ok((start, name));
        };
        match skip_to {
            Some(len) => pos = start + len,
            None => break,
        }
    }
    Err(FacturaError::Signature("document has no root element".into()))
}

/// The root element through its closing tag, without prolog or trailing text.
pub fn root_element(xml: &str) -> Result<&str, FacturaError> {
    let (start, name) = find_root(xml)?;
    let closing = format!("</{name}>");
    let end = xml
        .rfind(&closing)
        .filter(|&i| i > start)
        .ok_or_else(|| FacturaError::Signature(format!("document has no closing {closing} tag")))?;
    Ok(&xml[start..end + closing.len()])
}

/// Insert `fragment` immediately before the root element's closing tag.
pub fn insert_before_root_close(xml: &str, fragment: &str) -> Result<String, FacturaError> {
    let (start, name) = find_root(xml)?;
    let closing = format!("</{name}>");
    let at = xml
        .rfind(&closing)
        .filter(|&i| i > start)
        .ok_or_else(|| FacturaError::Signature(format!("document has no closing {closing} tag")))?;
    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..at]);
    out.push_str(fragment);
    out.push_str(&xml[at..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn details() -> SignerDetails<'static> {
        SignerDetails {
            signing_time: NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_opt(10, 30, 5)
                .unwrap(),
            certificate_digest: "CA8ROC1Wx2swblnSgH3iBoOP+0w=",
            issuer_name: "CN=AC PRUEBAS SRI,O=ENTIDAD & CIA,C=EC",
            serial_number: "4660",
        }
    }

    #[test]
    fn ids_share_one_number() {
        let ids = SignatureIds::new(4711);
        assert_eq!(ids.signature, "Signature-4711");
        assert_eq!(ids.signed_properties, "SignedProperties-Signature-4711");
        assert_eq!(ids.reference, "Reference-Signature-4711");
        assert_eq!(ids.signature_value, "SignatureValue-Signature-4711");
    }

    #[test]
    fn signed_properties_content() {
        let props = signed_properties(&SignatureIds::new(7), &details());
        assert!(props.starts_with(r#"<etsi:SignedProperties Id="SignedProperties-Signature-7">"#));
        assert!(props.contains("<etsi:SigningTime>2024-06-15T10:30:05</etsi:SigningTime>"));
        assert!(props.contains("<ds:X509IssuerName>CN=AC PRUEBAS SRI,O=ENTIDAD &amp; CIA,C=EC</ds:X509IssuerName>"));
        assert!(props.contains("<ds:X509SerialNumber>4660</ds:X509SerialNumber>"));
        assert!(props.contains(r##"ObjectReference="#Reference-Signature-7""##));
        assert!(!props.contains("/>"));
    }

    #[test]
    fn namespaces_precede_attributes() {
        let props = signed_properties(&SignatureIds::new(7), &details());
        let hashed = with_namespaces(&props);
        assert!(hashed.starts_with(&format!(
            r#"<etsi:SignedProperties xmlns:ds="{DS_NS}" xmlns:etsi="{ETSI_NS}" Id="SignedProperties-Signature-7">"#
        )));
        assert_eq!(hashed.len(), props.len() + with_namespaces("<a>").len() - "<a>".len());
    }

    #[test]
    fn signed_info_references() {
        let info = signed_info(&SignatureIds::new(1), "DOC=", "PROPS=");
        assert!(info.contains(r##"<ds:Reference Id="Reference-Signature-1" URI="#comprobante">"##));
        assert!(info.contains(ENVELOPED_TRANSFORM));
        assert!(info.contains(r##"URI="#SignedProperties-Signature-1""##));
        assert!(info.contains("<ds:DigestValue>DOC=</ds:DigestValue>"));
        assert!(info.contains("<ds:DigestValue>PROPS=</ds:DigestValue>"));
    }

    #[test]
    fn root_skips_prolog_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<!-- x -->\n<factura id=\"comprobante\"><a/></factura>\n";
        let (start, name) = find_root(xml).unwrap();
        assert_eq!(name, "factura");
        assert_eq!(&xml[start..start + 8], "<factura");
        assert_eq!(root_element(xml).unwrap(), "<factura id=\"comprobante\"><a/></factura>");
    }

    #[test]
    fn inserts_before_last_closing_tag() {
        let xml = "<factura><factura>inner</factura>\n</factura>";
        let out = insert_before_root_close(xml, "<ds:Signature/>").unwrap();
        assert_eq!(out, "<factura><factura>inner</factura>\n<ds:Signature/></factura>");
    }

    #[test]
    fn missing_closing_tag_is_an_error() {
        let err = insert_before_root_close("<factura id=\"comprobante\">", "<x/>").unwrap_err();
        assert!(matches!(err, FacturaError::Signature(_)));
    }
}
