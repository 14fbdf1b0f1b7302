//! Catalog adapter abstraction
//!
//! The export engine never talks to a server directly. It asks a
//! [`CatalogAdapter`] for the databases on the server, for each database's
//! typed collections, and optionally for the catalog's dependency graph.

use async_trait::async_trait;

use crate::domain::CollectionKind;
use crate::error::Result;
use crate::object::{CatalogObject, Database, Dependency};

pub mod mssql;
pub mod snapshot;

pub use mssql::MssqlAdapter;
pub use snapshot::{CatalogSnapshot, DatabaseSnapshot, SnapshotAdapter};

/// Source of catalog metadata
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Every database on the server, system databases included
    async fn list_databases(&self) -> Result<Vec<Database>>;

    /// One collection of a database, in catalog order. Sub-objects are
    /// attached to their owning table or view.
    async fn load_collection(&self, database: &str, kind: CollectionKind)
        -> Result<Vec<CatalogObject>>;

    /// Object-level dependencies, or `None` when the catalog cannot provide
    /// them
    async fn load_dependencies(&self, _database: &str) -> Result<Option<Vec<Dependency>>> {
        Ok(None)
    }
}

#[async_trait]
impl<A: CatalogAdapter + ?Sized> CatalogAdapter for std::sync::Arc<A> {
    async fn list_databases(&self) -> Result<Vec<Database>> {
        (**self).list_databases().await
    }

    async fn load_collection(
        &self,
        database: &str,
        kind: CollectionKind,
    ) -> Result<Vec<CatalogObject>> {
        (**self).load_collection(database, kind).await
    }

    async fn load_dependencies(&self, database: &str) -> Result<Option<Vec<Dependency>>> {
        (**self).load_dependencies(database).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::object::SchemaObject;
    use crate::test_support::{shop_catalog, MockCatalog};
    use std::sync::Arc;

    struct ListOnly;

    #[async_trait]
    impl CatalogAdapter for ListOnly {
        async fn list_databases(&self) -> Result<Vec<Database>> {
            Ok(vec![Database::new("Shop")])
        }

        async fn load_collection(
            &self,
            _database: &str,
            _kind: CollectionKind,
        ) -> Result<Vec<CatalogObject>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_dependency_capability_absent_by_default() {
        let deps = ListOnly.load_dependencies("Shop").await.unwrap();
        assert!(deps.is_none());
    }

    #[tokio::test]
    async fn test_mock_adapter_serves_collections() {
        let adapter = shop_catalog();
        let tables = adapter
            .load_collection("Shop", CollectionKind::Tables)
            .await
            .unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].identity(), "[dbo].[Orders]");
    }

    #[tokio::test]
    async fn test_shared_adapter_delegates() {
        let mut mock = MockCatalog::new();
        mock.expect_list_databases()
            .times(1)
            .returning(|| Err(CoreError::IntrospectionFailed("login failed".into())));

        let shared: Arc<dyn CatalogAdapter> = Arc::new(mock);
        let err = shared.list_databases().await.unwrap_err();
        assert!(err.to_string().contains("login failed"));
    }
}
