//! Execution strategies for the external dump/restore tools.
//!
//! One invocation moves through `Built → Running → Succeeded | Failed`. The
//! strategy is picked once per invocation from the connection descriptor:
//! local subprocess when the endpoint is directly reachable, remote command
//! over SSH otherwise. A failed invocation must never leave a partial
//! archive behind.

pub mod local;
pub mod ssh;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::connection::ConnectionDescriptor;
use crate::error::Result;
use crate::exec::ssh::SshTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Built,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Built => "built",
            ExecutionState::Running => "running",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which way archive bytes flow for this invocation.
#[derive(Debug, Clone)]
pub enum ArchiveTransfer {
    /// Dump: the tool produces the archive; bytes land at this local path.
    WriteLocal(PathBuf),
    /// Restore: the tool consumes the archive already at this local path.
    ReadLocal(PathBuf),
}

impl ArchiveTransfer {
    pub fn path(&self) -> &Path {
        match self {
            ArchiveTransfer::WriteLocal(path) | ArchiveTransfer::ReadLocal(path) => path,
        }
    }
}

/// A fully built tool invocation, ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: &'static str,
    pub args: Vec<String>,
    pub transfer: ArchiveTransfer,
}

pub enum ExecutionStrategy {
    Local,
    Ssh { target: SshTarget },
}

/// Pick the strategy from the descriptor: the presence of an SSH descriptor
/// decides, nothing else.
pub fn select_strategy(descriptor: &ConnectionDescriptor) -> Result<ExecutionStrategy> {
    match &descriptor.ssh {
        Some(ssh) => Ok(ExecutionStrategy::Ssh {
            target: SshTarget::from_descriptor(ssh)?,
        }),
        None => Ok(ExecutionStrategy::Local),
    }
}

impl ExecutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionStrategy::Local => "local",
            ExecutionStrategy::Ssh { .. } => "ssh",
        }
    }

    /// Run the invocation to completion. On failure any partially written
    /// archive is removed before the error is returned.
    pub async fn run(&self, invocation: Invocation) -> Result<PathBuf> {
        let archive = invocation.transfer.path().to_path_buf();
        tracing::debug!(
            program = invocation.program,
            strategy = self.name(),
            state = %ExecutionState::Built,
            args = invocation.args.len(),
            "invocation assembled"
        );
        tracing::debug!(
            program = invocation.program,
            strategy = self.name(),
            state = %ExecutionState::Running,
            "invoking external tool"
        );

        let outcome = match self {
            ExecutionStrategy::Local => local::run(&invocation).await,
            ExecutionStrategy::Ssh { target } => ssh::run(target, &invocation).await,
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    program = invocation.program,
                    state = %ExecutionState::Succeeded,
                    archive = %archive.display(),
                    "external tool finished"
                );
                Ok(archive)
            }
            Err(e) => {
                tracing::warn!(
                    program = invocation.program,
                    state = %ExecutionState::Failed,
                    error = %e,
                    "external tool failed"
                );
                discard_partial_archive(&invocation.transfer);
                Err(e)
            }
        }
    }
}

/// A stale partial archive must never be mistaken for a usable backup.
fn discard_partial_archive(transfer: &ArchiveTransfer) {
    let ArchiveTransfer::WriteLocal(path) = transfer else {
        return;
    };
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(archive = %path.display(), "removed partial archive"),
        Err(e) => {
            tracing::warn!(archive = %path.display(), error = %e, "could not remove partial archive")
        }
    }
}
