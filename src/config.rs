//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::MachineDescriptor;
use crate::lifecycle::ManagerConfig;
use crate::retry::RetryPolicy;

/// Lifecycle settings derived from defaults, configuration files, and
/// `BERTH_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "BERTH")]
pub struct LifecycleConfig {
    /// Provider identifier; must be in the caller's supported set.
    pub provider: String,
    /// Reference to the credential the backend should use.
    pub credential_ref: String,
    /// Image or template identifier.
    pub image: String,
    /// Group new nodes are created in.
    #[ortho_config(default = "berth-test".to_owned())]
    pub group: String,
    /// Comma-separated list of ports opened for inbound traffic.
    #[ortho_config(default = "22".to_owned())]
    pub inbound_ports: String,
    /// Login user assumed when the backend does not report one.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_user: String,
    /// Port probed for reachability.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Upper bound for a single backend create call, in seconds.
    #[ortho_config(default = 1200)]
    pub creation_timeout_secs: u64,
    /// Ceiling for the reachability wait, in milliseconds.
    #[ortho_config(default = 120_000)]
    pub reachability_timeout_ms: u64,
    /// Pause between reachability attempts, in milliseconds.
    #[ortho_config(default = 10_000)]
    pub reachability_interval_ms: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to berth.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const REQUIRED_FIELDS: [FieldMetadata; 4] = [
    FieldMetadata::new("provider identifier", "BERTH_PROVIDER", "provider"),
    FieldMetadata::new("credential reference", "BERTH_CREDENTIAL_REF", "credential_ref"),
    FieldMetadata::new("image identifier", "BERTH_IMAGE", "image"),
    FieldMetadata::new("SSH user", "BERTH_SSH_USER", "ssh_user"),
];

impl LifecycleConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without parsing process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("berth")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty,
    /// [`ConfigError::InvalidPort`] when a port cannot be used, or
    /// [`ConfigError::InvalidTiming`] when the reachability interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            &self.provider,
            &self.credential_ref,
            &self.image,
            &self.ssh_user,
        ];
        for (value, metadata) in values.into_iter().zip(REQUIRED_FIELDS.iter()) {
            if value.trim().is_empty() {
                return Err(metadata.missing());
            }
        }
        if self.ssh_port == 0 {
            return Err(ConfigError::InvalidPort(String::from(
                "ssh_port must be between 1 and 65535 (BERTH_SSH_PORT)",
            )));
        }
        if self.reachability_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming(String::from(
                "reachability_interval_ms must be at least 1 (BERTH_REACHABILITY_INTERVAL_MS)",
            )));
        }
        self.parsed_inbound_ports()?;
        Ok(())
    }

    /// Parses [`Self::inbound_ports`] into port numbers. An empty string
    /// yields no ports.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] when an entry is not a port in
    /// `1..=65535`.
    pub fn parsed_inbound_ports(&self) -> Result<Vec<u16>, ConfigError> {
        self.inbound_ports
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.parse::<u16>() {
                Ok(port) if port != 0 => Ok(port),
                _ => Err(ConfigError::InvalidPort(format!(
                    "'{entry}' in inbound_ports (BERTH_INBOUND_PORTS) is not a port"
                ))),
            })
            .collect()
    }

    /// Builds a [`MachineDescriptor`] from the configured values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn descriptor(&self) -> Result<MachineDescriptor, ConfigError> {
        self.validate()?;
        MachineDescriptor::builder()
            .provider(&self.provider)
            .image(&self.image)
            .credential_ref(&self.credential_ref)
            .inbound_ports(self.parsed_inbound_ports()?)
            .group(&self.group)
            .build()
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Converts the configuration into a [`ManagerConfig`] using real time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        let descriptor = self.descriptor()?;
        let policy = RetryPolicy::new(
            Duration::from_millis(self.reachability_timeout_ms),
            Duration::from_millis(self.reachability_interval_ms),
        );
        Ok(ManagerConfig::new(descriptor)
            .with_retry_policy(policy)
            .with_default_user(self.ssh_user.trim())
            .with_ssh_port(self.ssh_port)
            .with_creation_timeout(Duration::from_secs(self.creation_timeout_secs)))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a port setting is out of range or unparsable.
    #[error("invalid port: {0}")]
    InvalidPort(String),
    /// Indicates a timing setting would make polling spin.
    #[error("invalid timing: {0}")]
    InvalidTiming(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
