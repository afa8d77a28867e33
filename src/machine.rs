//! Machine handles and their lifecycle status.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use serde::Serialize;

use crate::backend::ProvisionedNode;

/// Lifecycle status of a machine handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    /// Created by the backend; reachability not yet confirmed.
    Provisioning,
    /// Accepted a connection within the retry budget.
    Ready,
    /// Never became reachable, or the wait was cancelled.
    Unreachable,
    /// Destroyed by the backend and removed from the registry.
    Destroyed,
}

impl MachineStatus {
    /// Returns the status as a lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Unreachable => "unreachable",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-process record of a remote machine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MachineHandle {
    /// Provider assigned identifier.
    pub id: String,
    /// Login user.
    pub user: String,
    /// Address reachable from the caller.
    pub public_address: IpAddr,
    /// Address inside the provider network, if any.
    pub private_address: Option<IpAddr>,
    /// Port probed for reachability.
    pub ssh_port: u16,
    /// When the backend reported the node as created.
    pub created_at: SystemTime,
    /// Current lifecycle status.
    pub status: MachineStatus,
}

impl MachineHandle {
    /// Builds a `Provisioning` handle from a freshly created node. The
    /// fallback user applies when the backend did not report one.
    #[must_use]
    pub fn provisioning(
        node: ProvisionedNode,
        fallback_user: &str,
        ssh_port: u16,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id: node.id,
            user: node.user.unwrap_or_else(|| fallback_user.to_owned()),
            public_address: node.public_address,
            private_address: node.private_address,
            ssh_port,
            created_at,
            status: MachineStatus::Provisioning,
        }
    }

    /// Returns `true` once the machine accepted a connection.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == MachineStatus::Ready
    }
}
