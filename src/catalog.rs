//! Live collection catalog lookup.
//!
//! The selection resolver only needs one thing from the server: the set of
//! collection names currently present in a database. The trait keeps that
//! seam narrow so tests can substitute a canned catalog.

use std::time::Duration;

use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;

use crate::connection::{Endpoint, ResolvedConnection};
use crate::error::{Error, Result};

pub trait CollectionCatalog {
    /// Names of the collections currently present in `database`.
    fn collection_names(
        &self,
        database: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// Catalog backed by a real driver connection. The connection is opened for
/// the single listing call and shut down before returning, on both paths.
pub struct MongoCatalog {
    connection: ResolvedConnection,
}

impl MongoCatalog {
    pub fn new(connection: ResolvedConnection) -> Self {
        Self { connection }
    }

    async fn client_options(&self) -> Result<ClientOptions> {
        let mut options = match &self.connection.endpoint {
            Endpoint::Uri { uri, .. } => ClientOptions::parse(uri)
                .await
                .map_err(|e| Error::CatalogFetch(format!("invalid uri: {e}")))?,
            Endpoint::Discrete {
                host,
                port,
                username,
                password,
                auth_database,
            } => {
                let address = ServerAddress::parse(format!("{host}:{port}"))
                    .map_err(|e| Error::CatalogFetch(format!("invalid address: {e}")))?;
                let mut options = ClientOptions::default();
                options.hosts = vec![address];
                if username.is_some() {
                    let mut credential = Credential::default();
                    credential.username = username.clone();
                    credential.password = password.clone();
                    credential.source = auth_database.clone();
                    options.credential = Some(credential);
                }
                options
            }
        };
        options.app_name = Some("mongovault".into());
        options.server_selection_timeout = Some(Duration::from_secs(10));
        options.connect_timeout = Some(Duration::from_secs(10));
        Ok(options)
    }
}

impl CollectionCatalog for MongoCatalog {
    async fn collection_names(&self, database: &str) -> Result<Vec<String>> {
        let options = self.client_options().await?;
        let client = Client::with_options(options)
            .map_err(|e| Error::CatalogFetch(format!("driver setup failed: {e}")))?;
        let listed = client.database(database).list_collection_names().await;
        client.shutdown().await;
        listed.map_err(|e| Error::CatalogFetch(format!("listing collections failed: {e}")))
    }
}
