//! Backup orchestration.
//!
//! One pass: validate the selection before any I/O, resolve the connection,
//! transform the intent against the live catalog, run the dump through the
//! chosen strategy, then record the sidecar. The sidecar stores the intent
//! as stated, not the resolved filter.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::catalog::MongoCatalog;
use crate::command;
use crate::connection::{self, ConnectionDescriptor};
use crate::error::{Error, Result};
use crate::exec::{self, ArchiveTransfer, Invocation};
use crate::metadata::BackupRecord;
use crate::selection::{self, SelectionIntent};

#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub connection: ConnectionDescriptor,
    pub intent: SelectionIntent,
    /// Only dump documents created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub preset: Option<String>,
}

#[derive(Debug)]
pub struct BackupOutcome {
    pub archive_path: std::path::PathBuf,
    pub record: BackupRecord,
}

pub async fn run_backup(request: &BackupRequest, backup_dir: &Path) -> Result<BackupOutcome> {
    selection::validate_time_filter(&request.intent, request.since)?;

    let resolved = connection::resolve(&request.connection).await?;
    let database = resolved.database.clone().ok_or_else(|| {
        Error::Configuration(format!(
            "connection '{}' does not name a database",
            request.connection.name
        ))
    })?;

    let catalog = MongoCatalog::new(resolved.clone());
    let selection =
        selection::resolve_selection(&request.intent, request.since, &database, &catalog).await?;

    let args = command::dump_args(&resolved, &selection)?;
    let strategy = exec::select_strategy(&request.connection)?;

    std::fs::create_dir_all(backup_dir)
        .map_err(|e| Error::Execution(format!("cannot create {}: {e}", backup_dir.display())))?;

    let created = Utc::now();
    let archive_name = archive_name(&request.connection.name, &database, created);
    let archive_path = backup_dir.join(&archive_name);

    tracing::info!(
        connection = %request.connection.name,
        database = %database,
        mode = %selection.mode,
        strategy = strategy.name(),
        archive = %archive_name,
        "starting backup"
    );

    let invocation = Invocation {
        program: command::DUMP_BIN,
        args,
        transfer: ArchiveTransfer::WriteLocal(archive_path.clone()),
    };
    let archive_path = strategy.run(invocation).await?;

    let record = BackupRecord::new(
        &request.connection.name,
        &database,
        &request.intent,
        &archive_name,
        request.preset.clone(),
        request.since,
        created,
    );
    record.write(&archive_path)?;

    tracing::info!(archive = %archive_path.display(), "backup complete");
    Ok(BackupOutcome {
        archive_path,
        record,
    })
}

/// Timestamp-qualified to the millisecond; concurrent backups of the same
/// source get distinct names.
fn archive_name(connection: &str, database: &str, created: DateTime<Utc>) -> String {
    format!(
        "{connection}-{database}-{}.gz",
        created.format("%Y%m%dT%H%M%S%3f")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn archive_names_are_timestamp_qualified() {
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 3, 30, 0).unwrap();
        let t2 = t1 + chrono::Duration::milliseconds(1);
        let a = archive_name("staging", "app", t1);
        let b = archive_name("staging", "app", t2);
        assert_eq!(a, "staging-app-20240601T033000000.gz");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn time_filter_violations_fail_before_any_work() {
        let request = BackupRequest {
            connection: ConnectionDescriptor {
                name: "x".into(),
                uri: None,
                host: Some("127.0.0.1".into()),
                port: 27017,
                username: None,
                password: None,
                auth_database: None,
                database: Some("app".into()),
                ssh: None,
            },
            intent: SelectionIntent {
                mode: crate::selection::SelectionMode::Exclude,
                collections: vec!["a".into()],
            },
            since: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            preset: None,
        };

        let dir = tempfile::tempdir().unwrap();
        let err = run_backup(&request, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Selection(_)));
        // Nothing was created.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
