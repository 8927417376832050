//! Selection-mode transformation.
//!
//! Operators state intent as "everything", "only these collections" or
//! "everything except these". The dump tool filters by repeatable exclusion
//! flags far more robustly than by inclusion, so an include intent is turned
//! into the exclusion of its catalog complement. The original intent is what
//! gets recorded in backup metadata; the resolved form is what the tool runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CollectionCatalog;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    All,
    Include,
    Exclude,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionMode::All => "all",
            SelectionMode::Include => "include",
            SelectionMode::Exclude => "exclude",
        };
        f.write_str(name)
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(SelectionMode::All),
            "include" => Ok(SelectionMode::Include),
            "exclude" => Ok(SelectionMode::Exclude),
            other => Err(format!("unknown selection mode '{other}'")),
        }
    }
}

/// What the operator asked for. Immutable once handed to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionIntent {
    pub mode: SelectionMode,
    pub collections: Vec<String>,
}

impl SelectionIntent {
    pub fn all() -> Self {
        Self {
            mode: SelectionMode::All,
            collections: Vec::new(),
        }
    }
}

/// The concrete parameters the dump tool receives. At most one of
/// `included`/`excluded` is populated; a time filter implies `included`
/// holds exactly one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub mode: SelectionMode,
    pub included: Vec<String>,
    pub excluded: Vec<String>,
    pub query_start: Option<DateTime<Utc>>,
}

impl ResolvedSelection {
    fn all() -> Self {
        Self {
            mode: SelectionMode::All,
            included: Vec::new(),
            excluded: Vec::new(),
            query_start: None,
        }
    }
}

/// A time filter is only meaningful for a single named collection. Checked
/// before any connection is opened.
pub fn validate_time_filter(
    intent: &SelectionIntent,
    since: Option<DateTime<Utc>>,
) -> Result<()> {
    if since.is_none() {
        return Ok(());
    }
    if intent.mode != SelectionMode::Include {
        return Err(Error::Selection(format!(
            "a time filter requires include mode, got '{}'",
            intent.mode
        )));
    }
    if intent.collections.len() != 1 {
        return Err(Error::Selection(format!(
            "a time filter requires exactly one collection, got {}",
            intent.collections.len()
        )));
    }
    Ok(())
}

/// Transform intent into the parameters the dump tool accepts.
///
/// Include mode needs the live catalog to compute its exclusion complement;
/// every degenerate outcome (empty list, full coverage, nothing matching,
/// catalog unreachable) falls back to a full backup rather than backing up
/// nothing.
pub async fn resolve_selection<C: CollectionCatalog>(
    intent: &SelectionIntent,
    since: Option<DateTime<Utc>>,
    database: &str,
    catalog: &C,
) -> Result<ResolvedSelection> {
    validate_time_filter(intent, since)?;

    if let Some(start) = since {
        return Ok(ResolvedSelection {
            mode: SelectionMode::Include,
            included: intent.collections.clone(),
            excluded: Vec::new(),
            query_start: Some(start),
        });
    }

    match intent.mode {
        SelectionMode::All => Ok(ResolvedSelection::all()),
        SelectionMode::Exclude => {
            if intent.collections.is_empty() {
                return Ok(ResolvedSelection::all());
            }
            Ok(ResolvedSelection {
                mode: SelectionMode::Exclude,
                included: Vec::new(),
                excluded: intent.collections.clone(),
                query_start: None,
            })
        }
        SelectionMode::Include => resolve_include(intent, database, catalog).await,
    }
}

async fn resolve_include<C: CollectionCatalog>(
    intent: &SelectionIntent,
    database: &str,
    catalog: &C,
) -> Result<ResolvedSelection> {
    if intent.collections.is_empty() {
        tracing::warn!(database, "include mode with no collections, backing up everything");
        return Ok(ResolvedSelection::all());
    }

    let live = match catalog.collection_names(database).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(database, error = %e, "catalog enumeration failed, backing up everything");
            return Ok(ResolvedSelection::all());
        }
    };

    let complement: Vec<String> = live
        .iter()
        .filter(|name| !intent.collections.contains(*name))
        .cloned()
        .collect();

    if complement.is_empty() {
        // The include list covers the whole catalog.
        return Ok(ResolvedSelection::all());
    }
    if complement.len() == live.len() {
        tracing::warn!(
            database,
            requested = ?intent.collections,
            "none of the requested collections exist, backing up everything"
        );
        return Ok(ResolvedSelection::all());
    }

    Ok(ResolvedSelection {
        mode: SelectionMode::Exclude,
        included: Vec::new(),
        excluded: complement,
        query_start: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct StubCatalog(Vec<&'static str>);

    impl CollectionCatalog for StubCatalog {
        async fn collection_names(&self, _database: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FailingCatalog;

    impl CollectionCatalog for FailingCatalog {
        async fn collection_names(&self, _database: &str) -> Result<Vec<String>> {
            Err(Error::CatalogFetch("connection refused".into()))
        }
    }

    struct PanickingCatalog;

    impl CollectionCatalog for PanickingCatalog {
        async fn collection_names(&self, _database: &str) -> Result<Vec<String>> {
            panic!("catalog must not be queried");
        }
    }

    fn intent(mode: SelectionMode, collections: &[&str]) -> SelectionIntent {
        SelectionIntent {
            mode,
            collections: collections.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn include_becomes_exclusion_of_complement() {
        let catalog = StubCatalog(vec!["users", "orders", "logs"]);
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &["users"]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();

        assert_eq!(resolved.mode, SelectionMode::Exclude);
        assert!(resolved.included.is_empty());
        assert_eq!(resolved.excluded, vec!["orders", "logs"]);
    }

    #[tokio::test]
    async fn include_covering_catalog_collapses_to_all() {
        let catalog = StubCatalog(vec!["a", "b"]);
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &["a", "b"]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::All);
        assert!(resolved.excluded.is_empty());
    }

    #[tokio::test]
    async fn include_matching_nothing_falls_back_to_all() {
        let catalog = StubCatalog(vec!["users", "orders"]);
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &["ghost"]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::All);
    }

    #[tokio::test]
    async fn empty_include_falls_back_to_all() {
        let catalog = PanickingCatalog;
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &[]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::All);
    }

    #[tokio::test]
    async fn catalog_failure_degrades_to_all() {
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &["users"]),
            None,
            "app",
            &FailingCatalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::All);
    }

    #[tokio::test]
    async fn exclude_passes_through_verbatim() {
        let catalog = PanickingCatalog;
        let resolved = resolve_selection(
            &intent(SelectionMode::Exclude, &["logs", "cache"]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::Exclude);
        assert_eq!(resolved.excluded, vec!["logs", "cache"]);
    }

    #[tokio::test]
    async fn empty_exclude_degenerates_to_all() {
        let catalog = PanickingCatalog;
        let resolved = resolve_selection(
            &intent(SelectionMode::Exclude, &[]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();
        assert_eq!(resolved.mode, SelectionMode::All);
    }

    #[tokio::test]
    async fn time_filter_passes_single_include_through_unchanged() {
        // The catalog must not be consulted on this path.
        let resolved = resolve_selection(
            &intent(SelectionMode::Include, &["events"]),
            Some(instant()),
            "app",
            &PanickingCatalog,
        )
        .await
        .unwrap();

        assert_eq!(resolved.mode, SelectionMode::Include);
        assert_eq!(resolved.included, vec!["events"]);
        assert!(resolved.excluded.is_empty());
        assert_eq!(resolved.query_start, Some(instant()));
    }

    #[tokio::test]
    async fn time_filter_rejects_non_include_modes() {
        for mode in [SelectionMode::All, SelectionMode::Exclude] {
            let err = resolve_selection(
                &intent(mode, &["events"]),
                Some(instant()),
                "app",
                &PanickingCatalog,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::Selection(_)));
        }
    }

    #[tokio::test]
    async fn time_filter_rejects_multiple_collections() {
        for collections in [&[][..], &["a", "b"][..]] {
            let err = resolve_selection(
                &intent(SelectionMode::Include, collections),
                Some(instant()),
                "app",
                &PanickingCatalog,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::Selection(_)));
        }
    }

    #[tokio::test]
    async fn include_then_resolved_exclude_selects_the_same_set() {
        // Resolving the computed exclusion over the same catalog is
        // idempotent with resolving the original inclusion.
        let catalog = StubCatalog(vec!["users", "orders", "logs"]);
        let first = resolve_selection(
            &intent(SelectionMode::Include, &["users"]),
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();

        let second = resolve_selection(
            &SelectionIntent {
                mode: SelectionMode::Exclude,
                collections: first.excluded.clone(),
            },
            None,
            "app",
            &catalog,
        )
        .await
        .unwrap();

        assert_eq!(first.excluded, second.excluded);
        assert_eq!(first.mode, second.mode);
    }

    #[test]
    fn mode_round_trips_through_strings() {
        for mode in [
            SelectionMode::All,
            SelectionMode::Include,
            SelectionMode::Exclude,
        ] {
            assert_eq!(mode.to_string().parse::<SelectionMode>().unwrap(), mode);
        }
        assert!("everything".parse::<SelectionMode>().is_err());
    }
}
