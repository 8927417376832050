//! Flag assembly for the external dump/restore tools.
//!
//! Flag names and ordering follow the tools' own contract: connection flags,
//! database, collection filters, then compression and scan hints. The archive
//! flag itself is appended by the execution strategy, because its form
//! depends on whether bytes go to a local path or through a stream.

use crate::connection::{Endpoint, ResolvedConnection};
use crate::error::{Error, Result};
use crate::restore::NamespaceRemap;
use crate::selection::{ResolvedSelection, SelectionMode};
use crate::time_filter;

pub const DUMP_BIN: &str = "mongodump";
pub const RESTORE_BIN: &str = "mongorestore";

/// Ordered flag list for a dump invocation.
pub fn dump_args(
    connection: &ResolvedConnection,
    selection: &ResolvedSelection,
) -> Result<Vec<String>> {
    let mut args = Vec::new();
    push_connection_flags(connection, &mut args)?;
    push_database_flag(connection, &mut args)?;

    match selection.mode {
        SelectionMode::All => {}
        SelectionMode::Include => {
            for name in &selection.included {
                args.push(format!("--collection={name}"));
            }
            if let Some(start) = selection.query_start {
                args.push(format!("--query={}", time_filter::id_lower_bound_query(start)));
            }
        }
        SelectionMode::Exclude => {
            for name in &selection.excluded {
                args.push(format!("--excludeCollection={name}"));
            }
        }
    }

    args.push("--gzip".into());
    if selection.query_start.is_some() {
        args.push("--forceTableScan".into());
    }
    Ok(args)
}

/// Ordered flag list for a restore invocation.
pub fn restore_args(
    connection: &ResolvedConnection,
    remap: &NamespaceRemap,
    drop_target: bool,
) -> Result<Vec<String>> {
    let mut args = Vec::new();
    push_connection_flags(connection, &mut args)?;

    match remap {
        NamespaceRemap::Remap { from, to } => {
            args.push(format!("--nsFrom={from}.*"));
            args.push(format!("--nsTo={to}.*"));
        }
        NamespaceRemap::TargetOnly { database } => {
            args.push(format!("--db={database}"));
        }
    }

    if drop_target {
        args.push("--drop".into());
    }
    args.push("--gzip".into());
    Ok(args)
}

fn push_connection_flags(connection: &ResolvedConnection, args: &mut Vec<String>) -> Result<()> {
    match &connection.endpoint {
        Endpoint::Uri { uri, .. } => {
            if uri.is_empty() {
                return Err(Error::Configuration("connection uri is empty".into()));
            }
            args.push(format!("--uri={uri}"));
        }
        Endpoint::Discrete {
            host,
            port,
            username,
            password,
            auth_database,
        } => {
            if host.is_empty() {
                return Err(Error::Configuration("connection host is empty".into()));
            }
            args.push(format!("--host={host}"));
            args.push(format!("--port={port}"));
            if let Some(username) = username {
                args.push(format!("--username={username}"));
            }
            if let Some(password) = password {
                args.push(format!("--password={password}"));
            }
            if let Some(auth_database) = auth_database {
                args.push(format!("--authenticationDatabase={auth_database}"));
            }
        }
    }
    Ok(())
}

/// The tool rejects a second database name when the URI already carries one.
fn push_database_flag(connection: &ResolvedConnection, args: &mut Vec<String>) -> Result<()> {
    let in_uri = matches!(
        connection.endpoint,
        Endpoint::Uri {
            carries_database: true,
            ..
        }
    );
    if in_uri {
        return Ok(());
    }
    match &connection.database {
        Some(database) => {
            args.push(format!("--db={database}"));
            Ok(())
        }
        None => Err(Error::Configuration(
            "no database name in connection or uri".into(),
        )),
    }
}
