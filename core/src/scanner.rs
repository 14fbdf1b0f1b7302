//! Catalog scanning

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::CatalogAdapter;
use crate::domain::CollectionKind;
use crate::error::{CoreError, Result};
use crate::filter::ObjectFilter;
use crate::object::CatalogObject;

/// One collection of a database after filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedCollection {
    pub kind: CollectionKind,
    pub objects: Vec<CatalogObject>,
}

/// Enumerates a database's exportable objects
pub struct CatalogScanner<'a, A: CatalogAdapter + ?Sized> {
    adapter: &'a A,
    filter: &'a ObjectFilter,
}

impl<'a, A: CatalogAdapter + ?Sized> CatalogScanner<'a, A> {
    pub fn new(adapter: &'a A, filter: &'a ObjectFilter) -> Self {
        Self { adapter, filter }
    }

    /// Scan every collection of `database` in [`CollectionKind::ALL`] order.
    ///
    /// A collection that fails to load is logged and returned empty. The scan
    /// only fails as a whole when cancelled or when every collection failed,
    /// which means the database itself is unreachable.
    pub async fn scan(
        &self,
        database: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScannedCollection>> {
        let mut collections = Vec::with_capacity(CollectionKind::ALL.len());
        let mut failures = 0;
        let mut last_failure = None;

        for kind in CollectionKind::ALL {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let objects = match self.adapter.load_collection(database, kind).await {
                Ok(objects) => self.select(objects),
                Err(e) => {
                    let err = CoreError::scan(kind, e);
                    warn!("{} in database {}", err, database);
                    failures += 1;
                    last_failure = Some(err);
                    Vec::new()
                }
            };

            debug!("Scanned {} {} in {}", objects.len(), kind, database);
            collections.push(ScannedCollection { kind, objects });
        }

        match last_failure {
            Some(err) if failures == CollectionKind::ALL.len() => Err(
                CoreError::IntrospectionFailed(format!("no collection could be loaded ({})", err)),
            ),
            _ => Ok(collections),
        }
    }

    fn select(&self, objects: Vec<CatalogObject>) -> Vec<CatalogObject> {
        objects
            .into_iter()
            .filter(|o| self.filter.is_exportable(o))
            .map(prune_sub_objects)
            .collect()
    }
}

/// Drop system-owned indexes, triggers, statistics and constraints
fn prune_sub_objects(mut object: CatalogObject) -> CatalogObject {
    match &mut object {
        CatalogObject::Table(table) => {
            table.indexes.retain(|i| ObjectFilter::passes_system_check(i));
            table.triggers.retain(|t| ObjectFilter::passes_system_check(t));
            table.statistics.retain(|s| ObjectFilter::passes_system_check(s));
            table.foreign_keys.retain(|fk| ObjectFilter::passes_system_check(fk));
            table.checks.retain(|c| ObjectFilter::passes_system_check(c));
        }
        CatalogObject::View(view) => {
            view.indexes.retain(|i| ObjectFilter::passes_system_check(i));
            view.triggers.retain(|t| ObjectFilter::passes_system_check(t));
            view.statistics.retain(|s| ObjectFilter::passes_system_check(s));
        }
        _ => {}
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{SchemaObject, Table};
    use crate::test_support::{shop_collection, MockCatalog};

    fn scanned<'c>(collections: &'c [ScannedCollection], kind: CollectionKind) -> &'c [CatalogObject] {
        &collections
            .iter()
            .find(|c| c.kind == kind)
            .unwrap()
            .objects
    }

    #[tokio::test]
    async fn test_scan_returns_every_collection_in_order() {
        let mut adapter = MockCatalog::new();
        adapter
            .expect_load_collection()
            .times(CollectionKind::ALL.len())
            .returning(|_, kind| Ok(shop_collection(kind)));

        let filter = ObjectFilter::all();
        let collections = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &CancellationToken::new())
            .await
            .unwrap();

        let kinds: Vec<CollectionKind> = collections.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, CollectionKind::ALL.to_vec());
        assert!(scanned(&collections, CollectionKind::FullTextCatalogs).is_empty());
        assert_eq!(scanned(&collections, CollectionKind::Tables).len(), 2);
    }

    #[tokio::test]
    async fn test_system_objects_are_filtered() {
        let mut adapter = MockCatalog::new();
        adapter
            .expect_load_collection()
            .returning(|_, kind| Ok(shop_collection(kind)));

        let filter = ObjectFilter::all();
        let collections = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &CancellationToken::new())
            .await
            .unwrap();

        let schemas = scanned(&collections, CollectionKind::Schemas);
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name(), "sales");

        // auto-created statistics are pruned, user statistics survive
        let orders = scanned(&collections, CollectionKind::Tables)[0]
            .as_table()
            .unwrap();
        assert_eq!(orders.statistics.len(), 1);
        assert_eq!(orders.statistics[0].name, "ST_Orders_Placed");
    }

    #[tokio::test]
    async fn test_collection_failure_is_isolated() {
        let mut adapter = MockCatalog::new();
        adapter.expect_load_collection().returning(|_, kind| match kind {
            CollectionKind::FullTextCatalogs => Err(CoreError::IntrospectionFailed(
                "full-text search is not installed".into(),
            )),
            other => Ok(shop_collection(other)),
        });

        let filter = ObjectFilter::all();
        let collections = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(collections.len(), CollectionKind::ALL.len());
        assert!(scanned(&collections, CollectionKind::FullTextCatalogs).is_empty());
        assert_eq!(scanned(&collections, CollectionKind::Views).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_scan() {
        let mut adapter = MockCatalog::new();
        adapter
            .expect_load_collection()
            .returning(|_, _| Err(CoreError::pool("connection refused", "checking out connection")));

        let filter = ObjectFilter::all();
        let err = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::IntrospectionFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_database_is_not_a_failure() {
        let mut adapter = MockCatalog::new();
        adapter.expect_load_collection().returning(|_, _| Ok(Vec::new()));

        let filter = ObjectFilter::all();
        let collections = CatalogScanner::new(&adapter, &filter)
            .scan("Empty", &CancellationToken::new())
            .await
            .unwrap();
        assert!(collections.iter().all(|c| c.objects.is_empty()));
    }

    #[tokio::test]
    async fn test_inclusion_list_applies_to_tables() {
        let mut adapter = MockCatalog::new();
        adapter
            .expect_load_collection()
            .returning(|_, kind| Ok(shop_collection(kind)));

        let filter = ObjectFilter::from_names(["Orders"]);
        let collections = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &CancellationToken::new())
            .await
            .unwrap();

        let tables: Vec<&Table> = scanned(&collections, CollectionKind::Tables)
            .iter()
            .filter_map(CatalogObject::as_table)
            .collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Orders");
        assert_eq!(scanned(&collections, CollectionKind::Schemas).len(), 1);
        assert!(scanned(&collections, CollectionKind::StoredProcedures).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_scan_stops_before_loading() {
        let mut adapter = MockCatalog::new();
        adapter.expect_load_collection().times(0);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let filter = ObjectFilter::all();
        let err = CatalogScanner::new(&adapter, &filter)
            .scan("Shop", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
    }
}
