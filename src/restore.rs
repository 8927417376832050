//! Restore orchestration and namespace remapping.
//!
//! A restore starts from the sidecar metadata: it names the source database,
//! and everything under `source.*` is remapped into the target database. No
//! sidecar, no restore; guessing at an archive's contents risks writing
//! collections into the wrong namespace.

use std::path::{Path, PathBuf};

use crate::command;
use crate::connection::{self, ConnectionDescriptor};
use crate::error::{Error, Result};
use crate::exec::{self, ArchiveTransfer, Invocation};
use crate::metadata::BackupRecord;

/// How the restore tool should place the archive's collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceRemap {
    /// Everything under `from.*` lands under `to.*`.
    Remap { from: String, to: String },
    /// Source database unknown (legacy sidecar): plain target flag only.
    TargetOnly { database: String },
}

/// Compute the remap from recorded source and configured target. Falls back
/// to a plain target flag when the source name is unknown, since no safe
/// remap can be derived from a guess.
pub fn namespace_remap(source_db: Option<&str>, target_db: &str) -> NamespaceRemap {
    match source_db {
        Some(source) if !source.is_empty() => NamespaceRemap::Remap {
            from: source.into(),
            to: target_db.into(),
        },
        _ => {
            tracing::warn!(
                target = target_db,
                "sidecar does not name a source database, restoring without a namespace remap"
            );
            NamespaceRemap::TargetOnly {
                database: target_db.into(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub connection: ConnectionDescriptor,
    /// Archive file name inside the backup directory.
    pub archive: String,
    /// Drop target collections before restoring them.
    pub drop_target: bool,
}

#[derive(Debug)]
pub struct RestoreOutcome {
    pub archive_path: PathBuf,
    pub record: BackupRecord,
}

pub async fn run_restore(request: &RestoreRequest, backup_dir: &Path) -> Result<RestoreOutcome> {
    let archive_path = backup_dir.join(&request.archive);
    let record = BackupRecord::load(&archive_path)?;
    if !archive_path.exists() {
        return Err(Error::Execution(format!(
            "archive not found: {}",
            archive_path.display()
        )));
    }

    let resolved = connection::resolve(&request.connection).await?;
    let target_db = resolved.database.clone().ok_or_else(|| {
        Error::Configuration(format!(
            "connection '{}' does not name a target database, required for restore",
            request.connection.name
        ))
    })?;

    let remap = namespace_remap(record.database.as_deref(), &target_db);
    let args = command::restore_args(&resolved, &remap, request.drop_target)?;
    let strategy = exec::select_strategy(&request.connection)?;

    tracing::info!(
        archive = %archive_path.display(),
        source = record.database.as_deref().unwrap_or("<unknown>"),
        target = %target_db,
        strategy = strategy.name(),
        "starting restore"
    );

    let invocation = Invocation {
        program: command::RESTORE_BIN,
        args,
        transfer: ArchiveTransfer::ReadLocal(archive_path.clone()),
    };
    strategy.run(invocation).await?;

    tracing::info!(target = %target_db, "restore complete");
    Ok(RestoreOutcome {
        archive_path,
        record,
    })
}
