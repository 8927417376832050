//! Connection descriptors and the connection resolver.
//!
//! A named connection either carries a full MongoDB URI or discrete
//! host/port/credential fields, plus an optional SSH descriptor. Resolution
//! decides what the dump tool will actually be handed: a URI when the tool
//! runs locally against a reachable endpoint, or discrete flags when it runs
//! on the far side of an SSH session and a locally assembled URI would
//! describe the wrong network path.

use std::path::PathBuf;

use mongodb::options::{ClientOptions, ServerAddress};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_MONGO_PORT: u16 = 27017;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Logical name, filled in from the config key.
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Database to authenticate against (`authSource`).
    #[serde(default)]
    pub auth_database: Option<String>,

    /// Database the backup/restore targets. Required for restore, optional
    /// for backup when the URI names one.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub ssh: Option<SshDescriptor>,
}

fn default_port() -> u16 {
    DEFAULT_MONGO_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshDescriptor {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub private_key: Option<PathBuf>,

    #[serde(default)]
    pub passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// One unambiguous SSH credential.
#[derive(Debug, Clone)]
pub enum SshAuth {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl SshDescriptor {
    pub fn auth(&self) -> Result<SshAuth> {
        match (&self.password, &self.private_key) {
            (Some(password), None) => Ok(SshAuth::Password(password.clone())),
            (None, Some(path)) => Ok(SshAuth::PrivateKey {
                path: path.clone(),
                passphrase: self.passphrase.clone(),
            }),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "ssh auth is ambiguous: both password and private key are set".into(),
            )),
            (None, None) => Err(Error::Configuration(
                "ssh auth requires either a password or a private key".into(),
            )),
        }
    }
}

/// How the external tool will address the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Hand the tool the URI verbatim. `carries_database` records whether
    /// the URI path already names a database.
    Uri { uri: String, carries_database: bool },

    /// Discrete flags, as required when the tool runs remotely.
    Discrete {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        auth_database: Option<String>,
    },
}

/// A descriptor after resolution: the effective target database plus the
/// endpoint form the execution strategy should emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub database: Option<String>,
    pub endpoint: Endpoint,
}

/// Resolve a descriptor per the URI-vs-discrete rule.
///
/// Without SSH an explicit URI wins. With SSH the URI's transport details are
/// discarded and host/port/credentials are extracted into discrete fields;
/// a database host that equals the SSH host is rewritten to loopback, since
/// that is where the server listens as seen from the far side.
pub async fn resolve(descriptor: &ConnectionDescriptor) -> Result<ResolvedConnection> {
    let parsed = match &descriptor.uri {
        Some(uri) => Some(parse_uri(uri).await?),
        None => None,
    };

    if descriptor.ssh.is_none() {
        if let (Some(uri), Some(parsed)) = (&descriptor.uri, &parsed) {
            let carries_database = parsed.default_database.is_some();
            let database = descriptor
                .database
                .clone()
                .or_else(|| parsed.default_database.clone());
            return Ok(ResolvedConnection {
                database,
                endpoint: Endpoint::Uri {
                    uri: uri.clone(),
                    carries_database,
                },
            });
        }
        return discrete_from(descriptor, parsed.as_ref(), None);
    }

    let ssh = descriptor.ssh.as_ref().unwrap();
    ssh.auth()?;
    discrete_from(descriptor, parsed.as_ref(), Some(&ssh.host))
}

fn discrete_from(
    descriptor: &ConnectionDescriptor,
    parsed: Option<&ClientOptions>,
    ssh_host: Option<&str>,
) -> Result<ResolvedConnection> {
    let uri_host = parsed.and_then(first_host);

    let (mut host, port) = match (&descriptor.host, uri_host) {
        (Some(host), _) => (host.clone(), descriptor.port),
        (None, Some((host, port))) => (host, port),
        (None, None) => {
            return Err(Error::Configuration(format!(
                "connection '{}' has neither a uri nor a host",
                descriptor.name
            )))
        }
    };

    // The server address as the remote tool sees it.
    if ssh_host == Some(host.as_str()) {
        host = "127.0.0.1".into();
    }

    let credential = parsed.and_then(|options| options.credential.as_ref());
    let username = descriptor
        .username
        .clone()
        .or_else(|| credential.and_then(|c| c.username.clone()));
    let password = descriptor
        .password
        .clone()
        .or_else(|| credential.and_then(|c| c.password.clone()));
    let auth_database = descriptor
        .auth_database
        .clone()
        .or_else(|| credential.and_then(|c| c.source.clone()));
    let database = descriptor
        .database
        .clone()
        .or_else(|| parsed.and_then(|options| options.default_database.clone()));

    Ok(ResolvedConnection {
        database,
        endpoint: Endpoint::Discrete {
            host,
            port,
            username,
            password,
            auth_database,
        },
    })
}

async fn parse_uri(uri: &str) -> Result<ClientOptions> {
    ClientOptions::parse(uri)
        .await
        .map_err(|e| Error::Configuration(format!("invalid connection uri: {e}")))
}

fn first_host(options: &ClientOptions) -> Option<(String, u16)> {
    options.hosts.first().and_then(|address| match address {
        ServerAddress::Tcp { host, port } => {
            Some((host.clone(), port.unwrap_or(DEFAULT_MONGO_PORT)))
        }
        _ => None,
    })
}
