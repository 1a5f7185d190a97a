use std::path::PathBuf;

use crate::config::CredentialsConfig;
use crate::core::FacturaError;
use crate::xades::SigningIdentity;

/// Decrypts secrets stored in the configuration.
pub trait SecretStore: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, FacturaError>;
}

/// A [`SecretStore`] for configurations that keep the passphrase in clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextSecrets;

impl SecretStore for PlaintextSecrets {
    fn decrypt(&self, ciphertext: &str) -> Result<String, FacturaError> {
        Ok(ciphertext.to_string())
    }
}

/// Supplies the signing key and certificate at emission time.
pub trait CredentialProvider: Send + Sync {
    fn signing_identity(&self) -> Result<SigningIdentity, FacturaError>;
}

/// A fixed, already loaded identity.
impl CredentialProvider for SigningIdentity {
    fn signing_identity(&self) -> Result<SigningIdentity, FacturaError> {
        Ok(self.clone())
    }
}

/// Loads a PKCS#12 bundle on every request, decrypting its passphrase first.
#[derive(Debug, Clone)]
pub struct Pkcs12Credentials<S> {
    path: PathBuf,
    encrypted_password: String,
    secrets: S,
}

impl<S: SecretStore> Pkcs12Credentials<S> {
    pub fn new(path: impl Into<PathBuf>, encrypted_password: impl Into<String>, secrets: S) -> Self {
        Self {
            path: path.into(),
            encrypted_password: encrypted_password.into(),
            secrets,
        }
    }

    pub fn from_config(config: &CredentialsConfig, secrets: S) -> Self {
        Self::new(&config.pkcs12_path, &config.encrypted_password, secrets)
    }
}

impl<S: SecretStore> CredentialProvider for Pkcs12Credentials<S> {
    fn signing_identity(&self) -> Result<SigningIdentity, FacturaError> {
        let password = self.secrets.decrypt(&self.encrypted_password).map_err(|e| {
            FacturaError::Certificate(format!("cannot decrypt certificate passphrase: {e}"))
        })?;
        SigningIdentity::from_pkcs12_file(&self.path, &password)
    }
}
