//! Catalog snapshots
//!
//! A snapshot is a JSON capture of a server's catalog. It lets an export run
//! without a live server and reproduces edition-dependent collection failures
//! through the `unavailable` list.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CatalogAdapter;
use crate::domain::CollectionKind;
use crate::error::{CoreError, Result};
use crate::object::{CatalogObject, Database, Dependency};

/// One database of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub database: Database,
    #[serde(default)]
    pub collections: BTreeMap<CollectionKind, Vec<CatalogObject>>,
    /// Collections that fail to load, as on editions lacking the feature
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<CollectionKind>,
    /// `None` when the catalog offered no dependency information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
}

impl DatabaseSnapshot {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            collections: BTreeMap::new(),
            unavailable: Vec::new(),
            dependencies: None,
        }
    }
}

/// Serializable catalog of a whole server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub databases: Vec<DatabaseSnapshot>,
}

impl CatalogSnapshot {
    pub fn from_json(text: &str) -> Result<Self> {
        let mut snapshot: CatalogSnapshot = serde_json::from_str(text)?;
        for db in &mut snapshot.databases {
            for object in db.collections.values_mut().flatten() {
                object.adopt_children();
            }
        }
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CoreError::Config(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path.as_ref(), self.to_json()?).await?;
        info!("Saved catalog snapshot to {}", path.as_ref().display());
        Ok(())
    }

    /// Capture `databases` from a live adapter. Collections that fail to
    /// load are recorded as unavailable.
    pub async fn capture<A: CatalogAdapter + ?Sized>(
        adapter: &A,
        databases: &[Database],
    ) -> Result<Self> {
        let mut snapshot = CatalogSnapshot::default();

        for database in databases {
            let mut db = DatabaseSnapshot::new(database.clone());
            for kind in CollectionKind::ALL {
                match adapter.load_collection(&database.name, kind).await {
                    Ok(objects) => {
                        db.collections.insert(kind, objects);
                    }
                    Err(e) => {
                        warn!("Capturing {} of {} failed: {}", kind, database.name, e);
                        db.unavailable.push(kind);
                    }
                }
            }
            db.dependencies = match adapter.load_dependencies(&database.name).await {
                Ok(deps) => deps,
                Err(e) => {
                    warn!("Capturing dependencies of {} failed: {}", database.name, e);
                    None
                }
            };
            snapshot.databases.push(db);
        }

        Ok(snapshot)
    }

    fn database(&self, name: &str) -> Result<&DatabaseSnapshot> {
        self.databases
            .iter()
            .find(|db| db.database.name == name)
            .ok_or_else(|| {
                CoreError::IntrospectionFailed(format!("database {} is not in the snapshot", name))
            })
    }
}

/// Catalog adapter serving a [`CatalogSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotAdapter {
    snapshot: CatalogSnapshot,
}

impl SnapshotAdapter {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(CatalogSnapshot::load(path).await?))
    }
}

#[async_trait]
impl CatalogAdapter for SnapshotAdapter {
    async fn list_databases(&self) -> Result<Vec<Database>> {
        Ok(self
            .snapshot
            .databases
            .iter()
            .map(|db| db.database.clone())
            .collect())
    }

    async fn load_collection(
        &self,
        database: &str,
        kind: CollectionKind,
    ) -> Result<Vec<CatalogObject>> {
        let db = self.snapshot.database(database)?;
        if db.unavailable.contains(&kind) {
            return Err(CoreError::IntrospectionFailed(format!(
                "{} are not available on this server",
                kind
            )));
        }
        Ok(db.collections.get(&kind).cloned().unwrap_or_default())
    }

    async fn load_dependencies(&self, database: &str) -> Result<Option<Vec<Dependency>>> {
        Ok(self.snapshot.database(database)?.dependencies.clone())
    }
}
