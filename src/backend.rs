//! Provisioning backend abstraction and the machine descriptor it consumes.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

use crate::machine::MachineHandle;

/// Node group applied when the caller does not name one.
pub const DEFAULT_GROUP: &str = "berth-test";

/// Immutable description of the machine a manager provisions.
///
/// The credential is carried as a reference (for example the name of an
/// environment variable or secret store entry). The secret itself never
/// passes through this crate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineDescriptor {
    /// Provider identifier (for example `aws-ec2`).
    pub provider: String,
    /// Image or template identifier understood by the provider.
    pub image: String,
    /// Reference to the credential used by the backend.
    pub credential_ref: String,
    /// Ports that must accept inbound connections once the node exists.
    pub inbound_ports: Vec<u16>,
    /// Group the node is created in.
    pub group: String,
}

impl MachineDescriptor {
    /// Starts a builder for a [`MachineDescriptor`].
    #[must_use]
    pub fn builder() -> MachineDescriptorBuilder {
        MachineDescriptorBuilder::new()
    }

    /// Validates the descriptor, naming the first offending field.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Validation`] when a string field is empty
    /// or an inbound port is zero.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.provider.is_empty() {
            return Err(DescriptorError::Validation("provider".to_owned()));
        }
        if self.image.is_empty() {
            return Err(DescriptorError::Validation("image".to_owned()));
        }
        if self.credential_ref.is_empty() {
            return Err(DescriptorError::Validation("credential_ref".to_owned()));
        }
        if self.group.is_empty() {
            return Err(DescriptorError::Validation("group".to_owned()));
        }
        if self.inbound_ports.contains(&0) {
            return Err(DescriptorError::Validation("inbound_ports".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`MachineDescriptor`] that trims and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MachineDescriptorBuilder {
    provider: String,
    image: String,
    credential_ref: String,
    inbound_ports: Vec<u16>,
    group: Option<String>,
}

impl MachineDescriptorBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the provider identifier.
    #[must_use]
    pub fn provider(mut self, value: impl Into<String>) -> Self {
        self.provider = value.into();
        self
    }

    /// Sets the image or template identifier.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = value.into();
        self
    }

    /// Sets the credential reference.
    #[must_use]
    pub fn credential_ref(mut self, value: impl Into<String>) -> Self {
        self.credential_ref = value.into();
        self
    }

    /// Replaces the inbound port list. Duplicates are dropped, keeping the
    /// first occurrence.
    #[must_use]
    pub fn inbound_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.inbound_ports.clear();
        for port in ports {
            if !self.inbound_ports.contains(&port) {
                self.inbound_ports.push(port);
            }
        }
        self
    }

    /// Sets the node group; defaults to [`DEFAULT_GROUP`].
    #[must_use]
    pub fn group(mut self, value: impl Into<String>) -> Self {
        self.group = Some(value.into());
        self
    }

    /// Builds and validates the [`MachineDescriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Validation`] when a required field is
    /// empty after trimming or a port is zero.
    pub fn build(self) -> Result<MachineDescriptor, DescriptorError> {
        let descriptor = MachineDescriptor {
            provider: self.provider.trim().to_owned(),
            image: self.image.trim().to_owned(),
            credential_ref: self.credential_ref.trim().to_owned(),
            inbound_ports: self.inbound_ports,
            group: self
                .group
                .map_or_else(|| DEFAULT_GROUP.to_owned(), |group| group.trim().to_owned()),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Errors raised while building a descriptor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DescriptorError {
    /// Raised when a field is missing or holds an unusable value.
    #[error("missing or invalid descriptor field: {0}")]
    Validation(String),
}

/// Node details reported by a backend once creation succeeds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionedNode {
    /// Provider assigned identifier.
    pub id: String,
    /// Login user reported by the provider, when it has one.
    pub user: Option<String>,
    /// Address reachable from the caller.
    pub public_address: IpAddr,
    /// Address inside the provider network, if any.
    pub private_address: Option<IpAddr>,
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by provisioning backends.
pub trait ProvisioningBackend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a single node from the descriptor.
    fn create<'a>(
        &'a self,
        descriptor: &'a MachineDescriptor,
    ) -> BackendFuture<'a, ProvisionedNode, Self::Error>;

    /// Destroys the node. Destroying an id the provider no longer knows must
    /// succeed.
    fn destroy<'a>(&'a self, id: &'a str) -> BackendFuture<'a, (), Self::Error>;

    /// Opens the given ports for inbound traffic on a freshly created node.
    ///
    /// The default implementation does nothing.
    fn authorize_ports<'a>(
        &'a self,
        _handle: &'a MachineHandle,
        _ports: &'a [u16],
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async { Ok(()) })
    }
}
