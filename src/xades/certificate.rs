//! Signing credentials: the RSA private key and the signer's X.509 certificate.

use std::fmt;
use std::path::Path;

use p12_keystore::KeyStore;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use x509_parser::certificate::X509Certificate;
use x509_parser::objects::{oid_registry, oid2abbrev};
use x509_parser::x509::X509Name;

use crate::core::FacturaError;

/// The signer's certificate with the fields the signature block needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCertificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial_number: String,
    not_before: String,
    not_after: String,
    currently_valid: bool,
    is_ca: bool,
    public_key_der: Vec<u8>,
}

impl SigningCertificate {
    /// Parse a DER-encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, FacturaError> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| FacturaError::Certificate(format!("unreadable certificate: {e}")))?;
        Ok(Self::from_parsed(der, &cert))
    }

    fn from_parsed(der: &[u8], cert: &X509Certificate<'_>) -> Self {
        let validity = cert.validity();
        Self {
            der: der.to_vec(),
            subject: rfc4514_name(cert.subject()),
            issuer: rfc4514_name(cert.issuer()),
            serial_number: cert.tbs_certificate.serial.to_string(),
            not_before: validity.not_before.to_string(),
            not_after: validity.not_after.to_string(),
            currently_valid: validity.is_valid(),
            is_ca: cert.is_ca(),
            public_key_der: cert.public_key().subject_public_key.data.to_vec(),
        }
    }

    /// Raw DER bytes, as embedded in `X509Certificate` and digested in `CertDigest`.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name (RFC 4514).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name (RFC 4514), as written to `X509IssuerName`.
    pub fn issuer_name(&self) -> &str {
        &self.issuer
    }

    /// Serial number in decimal, as written to `X509SerialNumber`.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn not_before(&self) -> &str {
        &self.not_before
    }

    pub fn not_after(&self) -> &str {
        &self.not_after
    }

    /// Whether the current time falls inside the validity window.
    pub fn is_currently_valid(&self) -> bool {
        self.currently_valid
    }

    pub fn is_ca(&self) -> bool {
        self.is_ca
    }
}

/// A private key paired with the certificate that identifies it.
#[derive(Clone)]
pub struct SigningIdentity {
    key: RsaPrivateKey,
    certificate: SigningCertificate,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("certificate", &self.certificate.subject)
            .field("key_bits", &(self.key.size() * 8))
            .finish()
    }
}

impl SigningIdentity {
    /// Pair a key with a certificate, checking that they belong together.
    pub fn new(key: RsaPrivateKey, certificate: SigningCertificate) -> Result<Self, FacturaError> {
        let public_der = key
            .to_public_key()
            .to_pkcs1_der()
            .map_err(|e| FacturaError::Certificate(format!("cannot encode public key: {e}")))?;
        if public_der.as_bytes() != certificate.public_key_der.as_slice() {
            return Err(FacturaError::Certificate(
                "private key does not match the certificate".into(),
            ));
        }
        Ok(Self { key, certificate })
    }

    /// Load the key and the first non-CA certificate of its chain from a PKCS#12 bundle.
    pub fn from_pkcs12(data: &[u8], password: &str) -> Result<Self, FacturaError> {
        let store = KeyStore::from_pkcs12(data, password).map_err(|e| {
            FacturaError::Certificate(format!(
                "cannot open PKCS#12 bundle (wrong password or corrupt file): {e}"
            ))
        })?;
        let (_, chain) = store.private_key_chain().ok_or_else(|| {
            FacturaError::Certificate("PKCS#12 bundle contains no private key".into())
        })?;

        let key = parse_private_key_der(chain.key())?;

        let mut signer = None;
        for cert in chain.chain() {
            let candidate = SigningCertificate::from_der(cert.as_der())?;
            if !candidate.is_ca() {
                signer = Some(candidate);
                break;
            }
        }
        let certificate = signer.ok_or_else(|| {
            FacturaError::Certificate("PKCS#12 bundle contains no end-entity certificate".into())
        })?;

        Self::new(key, certificate)
    }

    /// Read and open a PKCS#12 file.
    pub fn from_pkcs12_file(path: &Path, password: &str) -> Result<Self, FacturaError> {
        let data = std::fs::read(path).map_err(|e| {
            FacturaError::Certificate(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pkcs12(&data, password)
    }

    /// Build from a PEM private key (PKCS#8 or PKCS#1) and a DER certificate.
    pub fn from_pem_der(key_pem: &str, cert_der: &[u8]) -> Result<Self, FacturaError> {
        let key = RsaPrivateKey::from_pkcs8_pem(key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(key_pem))
            .map_err(|e| FacturaError::Certificate(format!("unreadable RSA private key: {e}")))?;
        Self::new(key, SigningCertificate::from_der(cert_der)?)
    }

    pub fn key(&self) -> &RsaPrivateKey {
        &self.key
    }

    pub fn certificate(&self) -> &SigningCertificate {
        &self.certificate
    }
}

/// Open a PKCS#12 bundle and report on its signing certificate.
///
/// Used to check an uploaded bundle and passphrase before they are saved.
pub fn validate_pkcs12(data: &[u8], password: &str) -> Result<SigningCertificate, FacturaError> {
    let identity = SigningIdentity::from_pkcs12(data, password)?;
    Ok(identity.certificate)
}

fn parse_private_key_der(der: &[u8]) -> Result<RsaPrivateKey, FacturaError> {
    RsaPrivateKey::from_pkcs8_der(der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
        .map_err(|e| {
            FacturaError::Certificate(format!("private key is not a supported RSA key: {e}"))
        })
}

/// Render a name most-specific RDN first, as RFC 4514 strings are written.
fn rfc4514_name(name: &X509Name<'_>) -> String {
    let registry = oid_registry();
    let rdns: Vec<String> = name
        .iter_rdn()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let key = oid2abbrev(attr.attr_type(), registry)
                        .map(str::to_string)
                        .unwrap_or_else(|_| attr.attr_type().to_id_string());
                    let value = match attr.as_str() {
                        Ok(s) => escape_dn_value(s),
                        Err(_) => format!("#{}", hex(attr.as_slice())),
                    };
                    format!("{key}={value}")
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    rdns.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && (c == ' ' || c == '#');
        let trailing = i == last && c == ' ';
        if leading || trailing || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
