//! Reachability probes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::machine::MachineHandle;

/// Upper bound for a single TCP connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Future returned by [`ReachabilityProbe::check`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, ProbeError>> + Send + 'a>>;

/// Errors raised by probes when the target cannot be checked at all.
///
/// Ordinary connection failures are not errors; probes report them as
/// `Ok(false)`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProbeError {
    /// Raised when the handle does not describe a usable target.
    #[error("probe misconfigured for machine {id}: {reason}")]
    Misconfigured {
        /// Machine identifier.
        id: String,
        /// What is wrong with the target.
        reason: String,
    },
}

/// Checks whether a machine accepts connections.
pub trait ReachabilityProbe {
    /// Returns `Ok(true)` when the machine is reachable.
    fn check<'a>(&'a self, handle: &'a MachineHandle) -> ProbeFuture<'a>;
}

/// Opens and immediately drops a TCP connection to the handle's SSH port.
#[derive(Clone, Copy, Debug)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpProbe {
    /// Creates a probe using [`DEFAULT_CONNECT_TIMEOUT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Overrides the per-attempt connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl ReachabilityProbe for TcpProbe {
    fn check<'a>(&'a self, handle: &'a MachineHandle) -> ProbeFuture<'a> {
        Box::pin(async move {
            if handle.ssh_port == 0 {
                return Err(ProbeError::Misconfigured {
                    id: handle.id.clone(),
                    reason: String::from("ssh port is 0"),
                });
            }
            if handle.public_address.is_unspecified() {
                return Err(ProbeError::Misconfigured {
                    id: handle.id.clone(),
                    reason: format!("public address {} is unspecified", handle.public_address),
                });
            }

            let addr = (handle.public_address, handle.ssh_port);
            let connect = timeout(self.connect_timeout, TcpStream::connect(addr)).await;
            Ok(matches!(connect, Ok(Ok(_))))
        })
    }
}
