//! Sidecar metadata describing what an archive contains.
//!
//! Each successful backup writes `<archive>.json` next to the archive. The
//! record stores the operator's original intent, not the resolved filter the
//! dump tool ran with, so a later restore (or human) can see what was asked
//! for. Unknown fields in older or newer sidecars are tolerated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::selection::{SelectionIntent, SelectionMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Logical name of the source connection.
    pub connection: String,

    /// Source database. Absent only in legacy sidecars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default)]
    pub mode: SelectionMode,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_collections: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_collections: Vec<String>,

    /// Creation time, epoch milliseconds.
    pub created_at: i64,

    pub created_at_iso: String,

    /// Archive file name. Basename only; the directory comes from config.
    pub archive: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_start_time: Option<DateTime<Utc>>,
}

impl BackupRecord {
    pub fn new(
        connection: &str,
        database: &str,
        intent: &SelectionIntent,
        archive: &str,
        preset: Option<String>,
        query_start_time: Option<DateTime<Utc>>,
        created: DateTime<Utc>,
    ) -> Self {
        let (included_collections, excluded_collections) = match intent.mode {
            SelectionMode::Include => (intent.collections.clone(), Vec::new()),
            SelectionMode::Exclude => (Vec::new(), intent.collections.clone()),
            SelectionMode::All => (Vec::new(), Vec::new()),
        };
        Self {
            connection: connection.into(),
            database: Some(database.into()),
            mode: intent.mode,
            included_collections,
            excluded_collections,
            created_at: created.timestamp_millis(),
            created_at_iso: created.to_rfc3339(),
            archive: archive.into(),
            preset,
            query_start_time,
        }
    }

    /// `<archive>.json`, next to the archive.
    pub fn sidecar_path(archive_path: &Path) -> PathBuf {
        let mut raw = archive_path.as_os_str().to_owned();
        raw.push(".json");
        PathBuf::from(raw)
    }

    pub fn write(&self, archive_path: &Path) -> Result<()> {
        let path = Self::sidecar_path(archive_path);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Metadata(format!("cannot serialize record: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| Error::Metadata(format!("cannot write {}: {e}", path.display())))?;
        tracing::debug!(sidecar = %path.display(), "wrote backup metadata");
        Ok(())
    }

    /// Load and validate the sidecar for an archive. A missing or incomplete
    /// sidecar is a hard failure; restoring on guesswork is worse.
    pub fn load(archive_path: &Path) -> Result<Self> {
        let path = Self::sidecar_path(archive_path);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Metadata(format!("cannot read sidecar {}: {e}", path.display())))?;
        let record: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Metadata(format!("corrupt sidecar {}: {e}", path.display())))?;
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<()> {
        if self.connection.is_empty() {
            return Err(Error::Metadata("sidecar has no source connection".into()));
        }
        if self.created_at <= 0 {
            return Err(Error::Metadata("sidecar has no creation timestamp".into()));
        }
        if self.archive.is_empty() {
            return Err(Error::Metadata("sidecar has no archive reference".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> BackupRecord {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 3, 30, 0).unwrap();
        BackupRecord::new(
            "staging",
            "app",
            &SelectionIntent {
                mode: SelectionMode::Include,
                collections: vec!["users".into()],
            },
            "staging-app-20240601T033000000.gz",
            Some("nightly".into()),
            None,
            created,
        )
    }

    #[test]
    fn records_original_intent_not_resolved_filter() {
        let record = record();
        assert_eq!(record.mode, SelectionMode::Include);
        assert_eq!(record.included_collections, vec!["users"]);
        assert!(record.excluded_collections.is_empty());
    }

    #[test]
    fn round_trips_through_the_sidecar_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("staging-app-20240601T033000000.gz");

        let original = record();
        original.write(&archive).unwrap();

        let sidecar = BackupRecord::sidecar_path(&archive);
        assert!(sidecar.ends_with("staging-app-20240601T033000000.gz.json"));

        let loaded = BackupRecord::load(&archive).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn sidecar_uses_camel_case_field_names() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("includedCollections").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("createdAtIso").is_some());
        assert_eq!(json.get("mode").unwrap(), "include");
    }

    #[test]
    fn time_filtered_backup_records_its_start_instant() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let record = BackupRecord::new(
            "staging",
            "app",
            &SelectionIntent {
                mode: SelectionMode::Include,
                collections: vec!["events".into()],
            },
            "staging-app-x.gz",
            None,
            Some(start),
            start,
        );
        assert_eq!(record.query_start_time, Some(start));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("queryStartTime").is_some());
    }

    #[test]
    fn missing_sidecar_is_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ghost.gz");
        let err = BackupRecord::load(&archive).unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[test]
    fn unknown_and_absent_optional_fields_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("old.gz");
        std::fs::write(
            BackupRecord::sidecar_path(&archive),
            r#"{
                "connection": "legacy",
                "createdAt": 1700000000000,
                "createdAtIso": "2023-11-14T22:13:20+00:00",
                "archive": "old.gz",
                "someFutureField": {"nested": true}
            }"#,
        )
        .unwrap();

        let loaded = BackupRecord::load(&archive).unwrap();
        assert_eq!(loaded.connection, "legacy");
        assert_eq!(loaded.database, None);
        assert_eq!(loaded.mode, SelectionMode::All);
        assert!(loaded.preset.is_none());
    }

    #[test]
    fn incomplete_sidecar_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.gz");
        std::fs::write(
            BackupRecord::sidecar_path(&archive),
            r#"{"connection": "", "createdAt": 1, "createdAtIso": "x", "archive": "bad.gz"}"#,
        )
        .unwrap();
        assert!(matches!(
            BackupRecord::load(&archive),
            Err(Error::Metadata(_))
        ));
    }
}
