//! Settings for a point of emission, loaded from TOML.
//!
//! ```toml
//! [issuer]
//! ruc = "1792146739001"
//! legal_name = "COMERCIAL ANDINA S.A."
//! establishment = "001"
//! emission_point = "001"
//! environment = "test"
//!
//! [credentials]
//! pkcs12_path = "/etc/comprobantes/firma.p12"
//! encrypted_password = "..."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{DEFAULT_SECURITY_CODE, Environment, Issuer, validate_issuer, validate_security_code};

/// Reception endpoint of the SRI test environment (celcer).
pub const TEST_RECEPTION_URL: &str =
    "https://celcer.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline?wsdl";
/// Authorization endpoint of the SRI test environment (celcer).
pub const TEST_AUTHORIZATION_URL: &str =
    "https://celcer.sri.gob.ec/comprobantes-electronicos-ws/AutorizacionComprobantesOffline?wsdl";
/// Reception endpoint of the SRI production environment.
pub const PRODUCTION_RECEPTION_URL: &str =
    "https://cel.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline?wsdl";
/// Authorization endpoint of the SRI production environment.
pub const PRODUCTION_AUTHORIZATION_URL: &str =
    "https://cel.sri.gob.ec/comprobantes-electronicos-ws/AutorizacionComprobantesOffline?wsdl";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Issuer identity and fiscal flags.
    pub issuer: Issuer,

    /// Where the signing credentials live.
    pub credentials: CredentialsConfig,

    /// SRI web service endpoints and timeouts.
    #[serde(default)]
    pub sri: SriConfig,

    /// Foreground emission settings.
    #[serde(default)]
    pub emission: EmissionConfig,

    /// Reconciliation worker settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the issuer fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = validate_issuer(&self.issuer);
        if let Err(e) = validate_security_code(&self.emission.security_code) {
            errors.push(e);
        }
        if self.sync.max_concurrency == 0 {
            errors.push(crate::core::ValidationError::new(
                "sync.max_concurrency",
                "must be at least 1",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(crate::core::join_errors(&errors)))
        }
    }
}

/// PKCS#12 bundle location and its encrypted passphrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub pkcs12_path: PathBuf,
    /// Ciphertext handed to the secret store for decryption.
    pub encrypted_password: String,
}

/// SRI web service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SriConfig {
    /// Overrides the environment's reception endpoint.
    #[serde(default)]
    pub reception_url: Option<String>,
    /// Overrides the environment's authorization endpoint.
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for SriConfig {
    fn default() -> Self {
        Self {
            reception_url: None,
            authorization_url: None,
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl SriConfig {
    pub fn reception_url(&self, environment: Environment) -> String {
        self.reception_url.clone().unwrap_or_else(|| {
            match environment {
                Environment::Test => TEST_RECEPTION_URL,
                Environment::Production => PRODUCTION_RECEPTION_URL,
            }
            .to_string()
        })
    }

    pub fn authorization_url(&self, environment: Environment) -> String {
        self.authorization_url.clone().unwrap_or_else(|| {
            match environment {
                Environment::Test => TEST_AUTHORIZATION_URL,
                Environment::Production => PRODUCTION_AUTHORIZATION_URL,
            }
            .to_string()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Foreground emission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Pause between a RECIBIDA reception and the authorization query.
    #[serde(default = "default_emission_delay_ms")]
    pub authorization_delay_ms: u64,
    /// 8-digit code embedded in access keys.
    #[serde(default = "default_security_code")]
    pub security_code: String,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            authorization_delay_ms: default_emission_delay_ms(),
            security_code: default_security_code(),
        }
    }
}

impl EmissionConfig {
    pub fn authorization_delay(&self) -> Duration {
        Duration::from_millis(self.authorization_delay_ms)
    }
}

/// Reconciliation worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between reconciliation passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Documents in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_sync_delay_ms")]
    pub authorization_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrency: default_max_concurrency(),
            authorization_delay_ms: default_sync_delay_ms(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn authorization_delay(&self) -> Duration {
        Duration::from_millis(self.authorization_delay_ms)
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_probe_timeout_secs() -> u64 {
    5
}

const fn default_emission_delay_ms() -> u64 {
    2000
}

fn default_security_code() -> String {
    DEFAULT_SECURITY_CODE.to_string()
}

const fn default_interval_secs() -> u64 {
    120
}

const fn default_max_concurrency() -> usize {
    3
}

const fn default_sync_delay_ms() -> u64 {
    1000
}

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the settings file.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid settings.
    #[error("invalid settings: {0}")]
    Invalid(String),
}
