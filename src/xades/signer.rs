use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, NaiveDateTime};
use rsa::Pkcs1v15Sign;
use rsa::traits::PublicKeyParts;
use sha1::{Digest, Sha1};

use super::certificate::SigningIdentity;
use super::fragments::{self, SignatureIds, SignerDetails};
use crate::core::FacturaError;

/// Base64 of the SHA-1 digest of `data`.
pub fn sha1_base64(data: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(data))
}

/// A serialized document with its embedded signature.
///
/// Immutable once produced: resubmissions send these exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument(String);

impl SignedDocument {
    /// Wrap bytes previously produced by [`XadesSigner`], e.g. loaded from a store.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FacturaError> {
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|e| FacturaError::Signature(format!("signed document is not UTF-8: {e}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

/// XAdES-BES enveloped signer (RSA-SHA1), as required by the SRI.
pub struct XadesSigner {
    identity: SigningIdentity,
    certificate_b64: String,
    certificate_digest: String,
    modulus_b64: String,
    exponent_b64: String,
}

impl XadesSigner {
    pub fn new(identity: SigningIdentity) -> Self {
        let der = identity.certificate().der();
        let key = identity.key();
        Self {
            certificate_b64: STANDARD.encode(der),
            certificate_digest: sha1_base64(der),
            modulus_b64: STANDARD.encode(key.n().to_bytes_be()),
            exponent_b64: STANDARD.encode(key.e().to_bytes_be()),
            identity,
        }
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Sign with fresh random identifiers and the current local time.
    pub fn sign(&self, xml: &str) -> Result<SignedDocument, FacturaError> {
        self.sign_with(xml, &SignatureIds::random(), Local::now().naive_local())
    }

    /// Sign with explicit identifiers and signing time.
    pub fn sign_with(
        &self,
        xml: &str,
        ids: &SignatureIds,
        signing_time: NaiveDateTime,
    ) -> Result<SignedDocument, FacturaError> {
        let document_digest = sha1_base64(fragments::root_element(xml)?.as_bytes());

        let certificate = self.identity.certificate();
        let signed_properties = fragments::signed_properties(
            ids,
            &SignerDetails {
                signing_time,
                certificate_digest: &self.certificate_digest,
                issuer_name: certificate.issuer_name(),
                serial_number: certificate.serial_number(),
            },
        );
        let properties_digest =
            sha1_base64(fragments::with_namespaces(&signed_properties).as_bytes());

        let signed_info = fragments::signed_info(ids, &document_digest, &properties_digest);
        let hashed = Sha1::digest(fragments::with_namespaces(&signed_info).as_bytes());
        let signature_value = self
            .identity
            .key()
            .sign(Pkcs1v15Sign::new::<Sha1>(), &hashed)
            .map_err(|e| FacturaError::Signature(format!("RSA signing failed: {e}")))?;

        let key_info = fragments::key_info(
            ids,
            &self.certificate_b64,
            &self.modulus_b64,
            &self.exponent_b64,
        );
        let signature = fragments::signature(
            ids,
            &signed_info,
            &STANDARD.encode(signature_value),
            &key_info,
            &signed_properties,
        );

        fragments::insert_before_root_close(xml, &signature).map(SignedDocument)
    }
}
