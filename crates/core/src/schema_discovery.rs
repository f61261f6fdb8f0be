use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ColumnSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// Snapshot of everything the discovery collaborator knows about, in the
/// order it reported it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub databases: Vec<DatabaseSchema>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn database(&self, name: &str) -> Option<&DatabaseSchema> {
        self.databases.iter().find(|database| database.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaBackendError {
    message: String,
}

impl SchemaBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaDiscoveryError {
    #[error("schema backend failed: {0}")]
    Backend(#[source] SchemaBackendError),
    #[error("database `{0}` is not in the catalog")]
    UnknownDatabase(String),
    #[error("table `{table}` is not in database `{database}`")]
    UnknownTable { database: String, table: String },
}

#[async_trait]
pub trait SchemaBackend {
    async fn fetch_schema(&self) -> Result<SchemaCatalog, SchemaBackendError>;
}

#[derive(Debug)]
struct Snapshot {
    expires_at: Instant,
    catalog: Arc<SchemaCatalog>,
}

/// Serves the catalog to the data-source and column pickers, asking the
/// backend again once a snapshot is older than `ttl`.
#[derive(Debug)]
pub struct SchemaDiscovery<B: SchemaBackend> {
    backend: B,
    ttl: Duration,
    snapshot: Option<Snapshot>,
}

impl<B: SchemaBackend> SchemaDiscovery<B> {
    #[must_use]
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            snapshot: None,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// True when a snapshot is held and has not expired.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| Instant::now() <= snapshot.expires_at)
    }

    pub fn invalidate(&mut self) {
        if self.snapshot.take().is_some() {
            debug!("schema snapshot dropped");
        }
    }

    pub async fn catalog(&mut self) -> Result<Arc<SchemaCatalog>, SchemaDiscoveryError> {
        if let Some(snapshot) = self.snapshot.as_ref().filter(|_| self.is_fresh()) {
            return Ok(Arc::clone(&snapshot.catalog));
        }
        self.refresh().await
    }

    /// Fetches a new snapshot. A failed fetch keeps the previous one.
    pub async fn refresh(&mut self) -> Result<Arc<SchemaCatalog>, SchemaDiscoveryError> {
        let catalog = match self.backend.fetch_schema().await {
            Ok(catalog) => Arc::new(catalog),
            Err(error) => {
                warn!(%error, "schema fetch failed");
                return Err(SchemaDiscoveryError::Backend(error));
            }
        };
        info!(
            databases = catalog.databases.len(),
            "schema snapshot refreshed"
        );
        self.snapshot = Some(Snapshot {
            expires_at: Instant::now() + self.ttl,
            catalog: Arc::clone(&catalog),
        });
        Ok(catalog)
    }

    pub async fn database(
        &mut self,
        database: &str,
    ) -> Result<DatabaseSchema, SchemaDiscoveryError> {
        self.catalog()
            .await?
            .database(database)
            .cloned()
            .ok_or_else(|| SchemaDiscoveryError::UnknownDatabase(database.to_string()))
    }

    pub async fn table(
        &mut self,
        database: &str,
        table: &str,
    ) -> Result<TableSchema, SchemaDiscoveryError> {
        self.database(database)
            .await?
            .table(table)
            .cloned()
            .ok_or_else(|| SchemaDiscoveryError::UnknownTable {
                database: database.to_string(),
                table: table.to_string(),
            })
    }
}
