//! Probe module for host reachability checks.
//!
//! A probe runs one bounded reachability check against a target and
//! collapses the outcome into a [`Classification`]. Faults never reach
//! the caller: they are logged and reported as [`Classification::Failure`].

mod ping;

pub use ping::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to execute ping: {0}")]
    Launch(#[from] std::io::Error),
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Success,
    Failure,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Success => "Success",
            Classification::Failure => "Failure",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Classification::Success),
            "Failure" => Ok(Classification::Failure),
            other => Err(format!("unknown classification: {}", other)),
        }
    }
}

/// Raw output of one reachability check.
#[derive(Debug, Clone, Default)]
pub struct CheckOutput {
    /// Whether the check process exited with status zero.
    pub exited_ok: bool,
    /// Combined stdout and stderr.
    pub text: String,
}

/// A platform facility that performs one reachability check.
///
/// Implementations should honour `timeout` themselves where they can;
/// [`ProbeExecutor`] also bounds the returned future by the same timeout.
pub trait Reachability: Send + Sync + 'static {
    fn check(
        &self,
        target: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<CheckOutput, ProbeError>> + Send;
}

/// Runs reachability checks and classifies their outcome.
#[derive(Debug, Clone)]
pub struct ProbeExecutor<R = SystemPing> {
    check: R,
    timeout: Duration,
}

impl ProbeExecutor<SystemPing> {
    /// Create an executor backed by the system `ping` command.
    pub fn new(timeout: Duration) -> Self {
        Self::with_check(SystemPing, timeout)
    }
}

impl<R: Reachability> ProbeExecutor<R> {
    pub fn with_check(check: R, timeout: Duration) -> Self {
        Self { check, timeout }
    }

    /// Probe `target` once. Never fails; faults classify as `Failure`.
    pub async fn probe(&self, target: &str) -> Classification {
        let result = match tokio::time::timeout(self.timeout, self.check.check(target, self.timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        };

        match result {
            Ok(output) => classify(&output),
            Err(ProbeError::Timeout(timeout)) => {
                tracing::debug!("Ping to {} timed out after {:?}", target, timeout);
                Classification::Failure
            }
            Err(e) => {
                tracing::warn!("Unexpected error during ping of {}: {}", target, e);
                Classification::Failure
            }
        }
    }
}
