//! SQL Server catalog adapter
//!
//! Reads the `sys.*` catalog views over a pooled tiberius connection. Every
//! query runs as a `USE [db]` batch so one pool serves all databases.

use std::collections::HashMap;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{Client, Config, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::CatalogAdapter;
use crate::domain::{CollectionKind, FkAction};
use crate::error::{CoreError, Result};
use crate::object::{
    CatalogObject, CheckConstraint, Column, ComputedColumn, Database, DefaultConstraint,
    Dependency, DependencyKey, ForeignKey, FullTextCatalog, FullTextStopList, IdentitySpec, Index,
    IndexColumn, IndexKind, KeyConstraint, ObjectName, Routine, RoutineKind, Schema, SqlType,
    Statistic, StopWord, Table, TableType, Trigger, UserType, UserTypeDefinition, View,
};
use crate::sql_gen::DdlGenerator;

/// Databases with an id up to this are the server's own
const LAST_SYSTEM_DATABASE_ID: i32 = 4;

/// Marks objects created by SQL Server's tooling, such as diagram support
const TOOLS_SUPPORT_PROPERTY: &str = "microsoft_database_tools_support";

/// Expression dependencies keyed by the scheduled object. Constraints and
/// triggers resolve to the table or view that owns them.
const DEPENDENCIES_QUERY: &str = "SELECT SCHEMA_NAME(p.schema_id), p.name, CAST(d.referenced_class AS int), \
    COALESCE(d.referenced_schema_name, SCHEMA_NAME(ro.schema_id), SCHEMA_NAME(rt.schema_id)), \
    d.referenced_entity_name \
    FROM sys.sql_expression_dependencies d \
    JOIN sys.objects o ON o.object_id = d.referencing_id \
    JOIN sys.objects p ON p.object_id = COALESCE(NULLIF(o.parent_object_id, 0), o.object_id) \
    LEFT JOIN sys.objects ro ON d.referenced_class = 1 AND ro.object_id = d.referenced_id \
    LEFT JOIN sys.types rt ON d.referenced_class = 6 AND rt.user_type_id = d.referenced_id \
    WHERE d.referencing_class = 1 \
      AND d.referenced_server_name IS NULL AND d.referenced_database_name IS NULL";

/// Connection manager for bb8 pool with tiberius
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: Config,
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.config.clone();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Catalog adapter for a live SQL Server instance
pub struct MssqlAdapter {
    pool: Pool<TiberiusConnectionManager>,
}

/// Which parent objects a sub-object query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Tables,
    Views,
    TableTypes,
}

impl Scope {
    fn object_ids(self) -> &'static str {
        match self {
            Scope::Tables => "SELECT object_id FROM sys.tables",
            Scope::Views => "SELECT object_id FROM sys.views",
            Scope::TableTypes => "SELECT type_table_object_id FROM sys.table_types",
        }
    }
}

impl MssqlAdapter {
    /// Connect with an ADO.NET style connection string and a pool of
    /// `max_size` connections
    pub async fn connect(connection_string: &str, max_size: u32) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)
            .map_err(|e| CoreError::Config(format!("invalid connection string: {}", e)))?;

        let pool = Pool::builder()
            .max_size(max_size.max(1))
            .build(TiberiusConnectionManager { config })
            .await
            .map_err(|e| CoreError::pool(e, "creating connection pool"))?;

        // Test connection
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| CoreError::pool(e, "testing connection"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!("Connected to SQL Server (pool size {})", max_size.max(1));
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CoreError::pool(e, "checking out connection"))
    }

    /// Run `sql` at server level and return its rows
    async fn query_server(&self, sql: &str) -> Result<Vec<Row>> {
        let mut client = self.client().await?;
        let rows = client.simple_query(sql).await?.into_first_result().await?;
        Ok(rows)
    }

    /// Run `sql` inside `database` and return the rows of its last result set
    async fn query(&self, database: &str, sql: &str) -> Result<Vec<Row>> {
        let mut client = self.client().await?;
        let results = client
            .simple_query(scoped_batch(database, sql))
            .await?
            .into_results()
            .await?;
        Ok(results.into_iter().last().unwrap_or_default())
    }

    async fn load_schemas(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT s.name, USER_NAME(s.principal_id), \
                   CAST(CASE WHEN s.schema_id < 5 OR s.schema_id >= 16384 THEN 1 ELSE 0 END AS bit) \
                   FROM sys.schemas s ORDER BY s.name";
        let rows = self.query(database, sql).await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogObject::Schema(Schema {
                    name: text(row, 0)?,
                    owner: opt_text(row, 1)?,
                    is_system: Some(flag(row, 2)?),
                }))
            })
            .collect()
    }

    async fn load_alias_types(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT SCHEMA_NAME(t.schema_id), t.name, bt.name, \
                   CAST(t.max_length AS int), CAST(t.precision AS int), CAST(t.scale AS int), t.is_nullable \
                   FROM sys.types t \
                   JOIN sys.types bt ON bt.user_type_id = t.system_type_id \
                   WHERE t.is_user_defined = 1 AND t.is_assembly_type = 0 AND t.is_table_type = 0 \
                   ORDER BY SCHEMA_NAME(t.schema_id), t.name";
        let rows = self.query(database, sql).await?;

        rows.iter()
            .map(|row| {
                let base = SqlType::new(text(row, 2)?)
                    .with_length(int(row, 3)?)
                    .with_precision(int(row, 4)?, int(row, 5)?);
                Ok(CatalogObject::UserType(UserType {
                    schema: text(row, 0)?,
                    name: text(row, 1)?,
                    definition: UserTypeDefinition::Alias {
                        base,
                        nullable: flag(row, 6)?,
                    },
                    is_system: Some(false),
                }))
            })
            .collect()
    }

    async fn load_clr_types(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT SCHEMA_NAME(t.schema_id), t.name, a.name, t.assembly_class \
                   FROM sys.assembly_types t \
                   JOIN sys.assemblies a ON a.assembly_id = t.assembly_id \
                   WHERE t.is_user_defined = 1 \
                   ORDER BY SCHEMA_NAME(t.schema_id), t.name";
        let rows = self.query(database, sql).await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogObject::UserType(UserType {
                    schema: text(row, 0)?,
                    name: text(row, 1)?,
                    definition: UserTypeDefinition::Clr {
                        assembly: text(row, 2)?,
                        class: text(row, 3)?,
                    },
                    is_system: Some(false),
                }))
            })
            .collect()
    }

    async fn load_table_types(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT tt.type_table_object_id, SCHEMA_NAME(tt.schema_id), tt.name \
                   FROM sys.table_types tt \
                   WHERE tt.is_user_defined = 1 \
                   ORDER BY SCHEMA_NAME(tt.schema_id), tt.name";
        let rows = self.query(database, sql).await?;
        let mut columns = self.load_columns(database, Scope::TableTypes).await?;
        let mut keys = self.load_keys(database, Scope::TableTypes).await?;

        rows.iter()
            .map(|row| {
                let id = int(row, 0)?;
                Ok(CatalogObject::TableType(TableType {
                    schema: text(row, 1)?,
                    name: text(row, 2)?,
                    columns: columns.remove(&id).unwrap_or_default(),
                    keys: keys.remove(&id).unwrap_or_default(),
                    is_system: Some(false),
                }))
            })
            .collect()
    }

    async fn load_fulltext_catalogs(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT c.name, c.is_default, c.is_accent_sensitivity_on, fg.name \
                   FROM sys.fulltext_catalogs c \
                   LEFT JOIN sys.filegroups fg ON fg.data_space_id = c.data_space_id \
                   ORDER BY c.name";
        let rows = self.query(database, sql).await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogObject::FullTextCatalog(FullTextCatalog {
                    name: text(row, 0)?,
                    is_default: flag(row, 1)?,
                    accent_sensitive: flag(row, 2)?,
                    filegroup: opt_text(row, 3)?,
                    is_system: Some(false),
                }))
            })
            .collect()
    }

    async fn load_stop_lists(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = "SELECT l.name, w.stopword, w.language_id \
                   FROM sys.fulltext_stoplists l \
                   LEFT JOIN sys.fulltext_stopwords w ON w.stoplist_id = l.stoplist_id \
                   ORDER BY l.name, w.language_id, w.stopword";
        let rows = self.query(database, sql).await?;

        let mut lists: Vec<FullTextStopList> = Vec::new();
        for row in &rows {
            let name = text(row, 0)?;
            if lists.last().map_or(true, |l| l.name != name) {
                lists.push(FullTextStopList {
                    name,
                    words: Vec::new(),
                    is_system: Some(false),
                });
            }
            if let (Some(word), Some(list)) = (opt_text(row, 1)?, lists.last_mut()) {
                list.words.push(StopWord {
                    word,
                    language_id: int(row, 2)?,
                });
            }
        }

        Ok(lists.into_iter().map(CatalogObject::FullTextStopList).collect())
    }

    async fn load_tables(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = format!(
            "SELECT t.object_id, SCHEMA_NAME(t.schema_id), t.name, ds.name, {} \
             FROM sys.tables t \
             LEFT JOIN sys.indexes i ON i.object_id = t.object_id AND i.index_id IN (0, 1) \
             LEFT JOIN sys.data_spaces ds ON ds.data_space_id = i.data_space_id \
             ORDER BY SCHEMA_NAME(t.schema_id), t.name",
            system_object_expr("t")
        );
        let rows = self.query(database, &sql).await?;

        let mut columns = self.load_columns(database, Scope::Tables).await?;
        let mut keys = self.load_keys(database, Scope::Tables).await?;
        let mut indexes = self.load_indexes(database, Scope::Tables).await?;
        let mut triggers = self.load_triggers(database, Scope::Tables).await?;
        let mut statistics = self.load_statistics(database, Scope::Tables).await?;
        let mut foreign_keys = self.load_foreign_keys(database).await?;
        let mut checks = self.load_checks(database).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = int(row, 0)?;
            let mut table = Table::new(text(row, 1)?, text(row, 2)?);
            table.filegroup = opt_text(row, 3)?;
            table.is_system = Some(flag(row, 4)?);
            table.columns = columns.remove(&id).unwrap_or_default();
            table.keys = keys.remove(&id).unwrap_or_default();
            table.indexes = indexes.remove(&id).unwrap_or_default();
            table.triggers = triggers.remove(&id).unwrap_or_default();
            table.statistics = statistics.remove(&id).unwrap_or_default();
            table.foreign_keys = foreign_keys.remove(&id).unwrap_or_default();
            table.checks = checks.remove(&id).unwrap_or_default();
            table.adopt_children();
            tables.push(CatalogObject::Table(table));
        }

        debug!("Loaded {} tables from {}", tables.len(), database);
        Ok(tables)
    }

    async fn load_views(&self, database: &str) -> Result<Vec<CatalogObject>> {
        let sql = format!(
            "SELECT v.object_id, SCHEMA_NAME(v.schema_id), v.name, m.definition, \
             m.uses_ansi_nulls, m.uses_quoted_identifier, {} \
             FROM sys.views v \
             LEFT JOIN sys.sql_modules m ON m.object_id = v.object_id \
             ORDER BY SCHEMA_NAME(v.schema_id), v.name",
            system_object_expr("v")
        );
        let rows = self.query(database, &sql).await?;

        let mut indexes = self.load_indexes(database, Scope::Views).await?;
        let mut triggers = self.load_triggers(database, Scope::Views).await?;
        let mut statistics = self.load_statistics(database, Scope::Views).await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = int(row, 0)?;
            let mut view = View {
                schema: text(row, 1)?,
                name: text(row, 2)?,
                definition: opt_text(row, 3)?,
                ansi_nulls: flag_or(row, 4, true)?,
                quoted_identifier: flag_or(row, 5, true)?,
                indexes: indexes.remove(&id).unwrap_or_default(),
                triggers: triggers.remove(&id).unwrap_or_default(),
                statistics: statistics.remove(&id).unwrap_or_default(),
                is_system: Some(flag(row, 6)?),
            };
            view.adopt_children();
            views.push(CatalogObject::View(view));
        }
        Ok(views)
    }

    async fn load_routines(&self, database: &str, types: &str) -> Result<Vec<CatalogObject>> {
        let sql = format!(
            "SELECT SCHEMA_NAME(o.schema_id), o.name, o.type, m.definition, \
             m.uses_ansi_nulls, m.uses_quoted_identifier, {} \
             FROM sys.objects o \
             LEFT JOIN sys.sql_modules m ON m.object_id = o.object_id \
             WHERE o.type IN ({}) \
             ORDER BY SCHEMA_NAME(o.schema_id), o.name",
            system_object_expr("o"),
            types
        );
        let rows = self.query(database, &sql).await?;

        let mut routines = Vec::with_capacity(rows.len());
        for row in &rows {
            let object_type = text(row, 2)?;
            let Some(kind) = RoutineKind::from_catalog(&object_type) else {
                debug!("Ignoring module of type {}", object_type);
                continue;
            };
            routines.push(CatalogObject::Routine(Routine {
                schema: text(row, 0)?,
                name: text(row, 1)?,
                kind,
                definition: opt_text(row, 3)?,
                ansi_nulls: flag_or(row, 4, true)?,
                quoted_identifier: flag_or(row, 5, true)?,
                is_system: Some(flag(row, 6)?),
            }));
        }
        Ok(routines)
    }

    async fn load_columns(&self, database: &str, scope: Scope) -> Result<HashMap<i32, Vec<Column>>> {
        let sql = format!(
            "SELECT c.object_id, c.name, ty.name, \
             CASE WHEN ty.is_user_defined = 1 THEN SCHEMA_NAME(ty.schema_id) END, \
             CAST(c.max_length AS int), CAST(c.precision AS int), CAST(c.scale AS int), c.is_nullable, \
             CAST(ic.seed_value AS bigint), CAST(ic.increment_value AS bigint), \
             cc.definition, cc.is_persisted, dc.name, dc.definition, \
             CASE WHEN c.collation_name <> CAST(DATABASEPROPERTYEX(DB_NAME(), 'Collation') AS sysname) \
                  THEN c.collation_name END \
             FROM sys.columns c \
             JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
             LEFT JOIN sys.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id \
             LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id \
             LEFT JOIN sys.default_constraints dc ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id \
             WHERE c.object_id IN ({}) \
             ORDER BY c.object_id, c.column_id",
            scope.object_ids()
        );
        let rows = self.query(database, &sql).await?;

        let mut grouped: HashMap<i32, Vec<Column>> = HashMap::new();
        for row in &rows {
            let mut data_type = SqlType::new(text(row, 2)?)
                .with_length(int(row, 4)?)
                .with_precision(int(row, 5)?, int(row, 6)?);
            data_type.schema = opt_text(row, 3)?;

            let mut column = Column::new(text(row, 1)?, data_type);
            column.is_nullable = flag(row, 7)?;
            column.identity = match (row.try_get::<i64, _>(8)?, row.try_get::<i64, _>(9)?) {
                (Some(seed), Some(increment)) => Some(IdentitySpec { seed, increment }),
                _ => None,
            };
            column.computed = match opt_text(row, 10)? {
                Some(definition) => Some(ComputedColumn {
                    definition,
                    persisted: flag(row, 11)?,
                }),
                None => None,
            };
            column.default = match (opt_text(row, 12)?, opt_text(row, 13)?) {
                (Some(name), Some(definition)) => Some(DefaultConstraint { name, definition }),
                _ => None,
            };
            column.collation = opt_text(row, 14)?;

            grouped.entry(int(row, 0)?).or_default().push(column);
        }
        Ok(grouped)
    }

    async fn load_keys(
        &self,
        database: &str,
        scope: Scope,
    ) -> Result<HashMap<i32, Vec<KeyConstraint>>> {
        let sql = format!(
            "SELECT kc.parent_object_id, kc.name, kc.type, i.type, ds.name, col.name, ic.is_descending_key \
             FROM sys.key_constraints kc \
             JOIN sys.indexes i ON i.object_id = kc.parent_object_id AND i.index_id = kc.unique_index_id \
             JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.key_ordinal > 0 \
             JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id \
             LEFT JOIN sys.data_spaces ds ON ds.data_space_id = i.data_space_id \
             WHERE kc.parent_object_id IN ({}) \
             ORDER BY kc.parent_object_id, kc.name, ic.key_ordinal",
            scope.object_ids()
        );
        let rows = self.query(database, &sql).await?;

        let mut grouped: HashMap<i32, Vec<KeyConstraint>> = HashMap::new();
        for row in &rows {
            let name = text(row, 1)?;
            let keys = grouped.entry(int(row, 0)?).or_default();
            if keys.last().map_or(true, |k| k.name != name) {
                keys.push(KeyConstraint {
                    name,
                    is_primary_key: text(row, 2)?.trim() == "PK",
                    is_clustered: tiny(row, 3)? == 1,
                    columns: Vec::new(),
                    filegroup: opt_text(row, 4)?,
                });
            }
            if let Some(key) = keys.last_mut() {
                key.columns.push(IndexColumn {
                    name: text(row, 5)?,
                    descending: flag(row, 6)?,
                });
            }
        }
        Ok(grouped)
    }

    async fn load_indexes(&self, database: &str, scope: Scope) -> Result<HashMap<i32, Vec<Index>>> {
        let sql = format!(
            "SELECT i.object_id, i.name, i.type, i.is_unique, i.filter_definition, ds.name, \
             i.is_disabled, i.is_hypothetical, col.name, ic.is_descending_key, ic.is_included_column \
             FROM sys.indexes i \
             LEFT JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             LEFT JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id \
             LEFT JOIN sys.data_spaces ds ON ds.data_space_id = i.data_space_id \
             WHERE i.type > 0 AND i.is_primary_key = 0 AND i.is_unique_constraint = 0 \
               AND i.object_id IN ({}) \
             ORDER BY i.object_id, i.name, ic.is_included_column, ic.key_ordinal, ic.index_column_id",
            scope.object_ids()
        );
        let rows = self.query(database, &sql).await?;

        let mut grouped: HashMap<i32, Vec<Index>> = HashMap::new();
        for row in &rows {
            let name = text(row, 1)?;
            let indexes = grouped.entry(int(row, 0)?).or_default();
            if indexes.last().map_or(true, |i| i.name != name) {
                indexes.push(Index {
                    parent: ObjectName::default(),
                    name,
                    kind: IndexKind::from_catalog(tiny(row, 2)?),
                    is_unique: flag(row, 3)?,
                    columns: Vec::new(),
                    included: Vec::new(),
                    filter: opt_text(row, 4)?,
                    filegroup: opt_text(row, 5)?,
                    is_disabled: flag(row, 6)?,
                    is_system: Some(flag(row, 7)?),
                });
            }

            let (Some(index), Some(column)) = (indexes.last_mut(), opt_text(row, 8)?) else {
                continue;
            };
            let columnstore = matches!(
                index.kind,
                IndexKind::ClusteredColumnstore | IndexKind::NonclusteredColumnstore
            );
            if flag(row, 10)? && !columnstore {
                index.included.push(column);
            } else {
                index.columns.push(IndexColumn {
                    name: column,
                    descending: flag(row, 9)?,
                });
            }
        }
        Ok(grouped)
    }

    async fn load_triggers(&self, database: &str, scope: Scope) -> Result<HashMap<i32, Vec<Trigger>>> {
        let sql = format!(
            "SELECT tr.parent_id, tr.name, m.definition, tr.is_disabled, \
             m.uses_ansi_nulls, m.uses_quoted_identifier, tr.is_ms_shipped \
             FROM sys.triggers tr \
             LEFT JOIN sys.sql_modules m ON m.object_id = tr.object_id \
             WHERE tr.parent_class = 1 AND tr.parent_id IN ({}) \
             ORDER BY tr.parent_id, tr.name",
            scope.object_ids()
        );
        let rows = self.query(database, &sql).await?;

        let mut grouped: HashMap<i32, Vec<Trigger>> = HashMap::new();
        for row in &rows {
            grouped.entry(int(row, 0)?).or_default().push(Trigger {
                parent: ObjectName::default(),
                name: text(row, 1)?,
                definition: opt_text(row, 2)?,
                is_disabled: flag(row, 3)?,
                ansi_nulls: flag_or(row, 4, true)?,
                quoted_identifier: flag_or(row, 5, true)?,
                is_system: Some(flag(row, 6)?),
            });
        }
        Ok(grouped)
    }

    async fn load_statistics(
        &self,
        database: &str,
        scope: Scope,
    ) -> Result<HashMap<i32, Vec<Statistic>>> {
        // statistics backing an index are created with it
        let sql = format!(
            "SELECT s.object_id, s.name, s.filter_definition, s.no_recompute, \
             CAST(CASE WHEN s.auto_created = 1 OR s.user_created = 0 THEN 1 ELSE 0 END AS bit), col.name \
             FROM sys.stats s \
             JOIN sys.stats_columns sc ON sc.object_id = s.object_id AND sc.stats_id = s.stats_id \
             JOIN sys.columns col ON col.object_id = sc.object_id AND col.column_id = sc.column_id \
             WHERE s.object_id IN ({}) \
               AND NOT EXISTS (SELECT 1 FROM sys.indexes i WHERE i.object_id = s.object_id AND i.index_id = s.stats_id) \
             ORDER BY s.object_id, s.name, sc.stats_column_id",
            scope.object_ids()
        );
        let rows = self.query(database, &sql).await?;

        let mut grouped: HashMap<i32, Vec<Statistic>> = HashMap::new();
        for row in &rows {
            let name = text(row, 1)?;
            let stats = grouped.entry(int(row, 0)?).or_default();
            if stats.last().map_or(true, |s| s.name != name) {
                stats.push(Statistic {
                    parent: ObjectName::default(),
                    name,
                    columns: Vec::new(),
                    filter: opt_text(row, 2)?,
                    no_recompute: flag(row, 3)?,
                    is_system: Some(flag(row, 4)?),
                });
            }
            if let Some(stat) = stats.last_mut() {
                stat.columns.push(text(row, 5)?);
            }
        }
        Ok(grouped)
    }

    async fn load_foreign_keys(&self, database: &str) -> Result<HashMap<i32, Vec<ForeignKey>>> {
        let sql = "SELECT fk.parent_object_id, fk.name, SCHEMA_NAME(rt.schema_id), rt.name, \
                   pc.name, rc.name, fk.delete_referential_action_desc, fk.update_referential_action_desc, \
                   CAST(CASE WHEN fk.is_disabled = 1 OR fk.is_not_trusted = 1 THEN 1 ELSE 0 END AS bit), \
                   fk.is_ms_shipped \
                   FROM sys.foreign_keys fk \
                   JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
                   JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id \
                   JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
                   JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
                   ORDER BY fk.parent_object_id, fk.name, fkc.constraint_column_id";
        let rows = self.query(database, sql).await?;

        let mut grouped: HashMap<i32, Vec<ForeignKey>> = HashMap::new();
        for row in &rows {
            let name = text(row, 1)?;
            let fks = grouped.entry(int(row, 0)?).or_default();
            if fks.last().map_or(true, |fk| fk.name != name) {
                fks.push(ForeignKey {
                    parent: ObjectName::default(),
                    name,
                    columns: Vec::new(),
                    references: ObjectName::new(text(row, 2)?, text(row, 3)?),
                    referenced_columns: Vec::new(),
                    on_delete: FkAction::from_catalog(&text(row, 6)?),
                    on_update: FkAction::from_catalog(&text(row, 7)?),
                    is_disabled: flag(row, 8)?,
                    is_system: Some(flag(row, 9)?),
                });
            }
            if let Some(fk) = fks.last_mut() {
                fk.columns.push(text(row, 4)?);
                fk.referenced_columns.push(text(row, 5)?);
            }
        }
        Ok(grouped)
    }

    async fn load_checks(&self, database: &str) -> Result<HashMap<i32, Vec<CheckConstraint>>> {
        let sql = "SELECT cc.parent_object_id, cc.name, cc.definition, \
                   CAST(CASE WHEN cc.is_disabled = 1 OR cc.is_not_trusted = 1 THEN 1 ELSE 0 END AS bit), \
                   cc.is_ms_shipped \
                   FROM sys.check_constraints cc \
                   WHERE cc.parent_object_id IN (SELECT object_id FROM sys.tables) \
                   ORDER BY cc.parent_object_id, cc.name";
        let rows = self.query(database, sql).await?;

        let mut grouped: HashMap<i32, Vec<CheckConstraint>> = HashMap::new();
        for row in &rows {
            grouped.entry(int(row, 0)?).or_default().push(CheckConstraint {
                parent: ObjectName::default(),
                name: text(row, 1)?,
                definition: text(row, 2)?,
                is_disabled: flag(row, 3)?,
                is_system: Some(flag(row, 4)?),
            });
        }
        Ok(grouped)
    }
}

#[async_trait]
impl CatalogAdapter for MssqlAdapter {
    async fn list_databases(&self) -> Result<Vec<Database>> {
        let sql = "SELECT name, database_id, collation_name, compatibility_level \
                   FROM sys.databases ORDER BY name";
        let rows = self.query_server(sql).await?;

        rows.iter()
            .map(|row| {
                Ok(Database {
                    name: text(row, 0)?,
                    is_system: Some(int(row, 1)? <= LAST_SYSTEM_DATABASE_ID),
                    collation: opt_text(row, 2)?,
                    compatibility_level: row.try_get::<u8, _>(3)?,
                })
            })
            .collect()
    }

    async fn load_collection(
        &self,
        database: &str,
        kind: CollectionKind,
    ) -> Result<Vec<CatalogObject>> {
        match kind {
            CollectionKind::Schemas => self.load_schemas(database).await,
            CollectionKind::UserDefinedDataTypes => self.load_alias_types(database).await,
            CollectionKind::UserDefinedTypes => self.load_clr_types(database).await,
            CollectionKind::UserDefinedTableTypes => self.load_table_types(database).await,
            CollectionKind::FullTextCatalogs => self.load_fulltext_catalogs(database).await,
            CollectionKind::FullTextStopLists => self.load_stop_lists(database).await,
            CollectionKind::Tables => self.load_tables(database).await,
            CollectionKind::Views => self.load_views(database).await,
            CollectionKind::StoredProcedures => self.load_routines(database, "'P', 'PC'").await,
            CollectionKind::UserDefinedFunctions => {
                self.load_routines(database, "'FN', 'IF', 'TF', 'FS', 'FT'")
                    .await
            }
        }
    }

    async fn load_dependencies(&self, database: &str) -> Result<Option<Vec<Dependency>>> {
        let rows = self.query(database, DEPENDENCIES_QUERY).await?;

        let mut dependencies = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(schema) = opt_text(row, 3)? else {
                continue;
            };
            let name = text(row, 4)?;
            let to = match int(row, 2)? {
                1 => DependencyKey::object(schema, name),
                6 => DependencyKey::Type { schema, name },
                _ => continue,
            };
            dependencies.push(Dependency {
                from: DependencyKey::object(text(row, 0)?, text(row, 1)?),
                to,
            });
        }

        debug!("Loaded {} dependencies from {}", dependencies.len(), database);
        Ok(Some(dependencies))
    }
}

/// Prefix `sql` with a switch to `database`
fn scoped_batch(database: &str, sql: &str) -> String {
    format!("USE {};\n{}", DdlGenerator::quote_ident(database), sql)
}

/// `bit` expression flagging shipped and tooling-support objects of `alias`
fn system_object_expr(alias: &str) -> String {
    format!(
        "CAST(CASE WHEN {a}.is_ms_shipped = 1 OR EXISTS (SELECT 1 FROM sys.extended_properties ep \
         WHERE ep.class = 1 AND ep.major_id = {a}.object_id AND ep.minor_id = 0 \
         AND ep.name = N'{p}') THEN 1 ELSE 0 END AS bit)",
        a = alias,
        p = TOOLS_SUPPORT_PROPERTY
    )
}

fn text(row: &Row, idx: usize) -> Result<String> {
    Ok(row.try_get::<&str, _>(idx)?.unwrap_or_default().to_string())
}

fn opt_text(row: &Row, idx: usize) -> Result<Option<String>> {
    Ok(row.try_get::<&str, _>(idx)?.map(str::to_string))
}

fn int(row: &Row, idx: usize) -> Result<i32> {
    Ok(row.try_get::<i32, _>(idx)?.unwrap_or(0))
}

fn tiny(row: &Row, idx: usize) -> Result<u8> {
    Ok(row.try_get::<u8, _>(idx)?.unwrap_or(0))
}

fn flag(row: &Row, idx: usize) -> Result<bool> {
    flag_or(row, idx, false)
}

/// A nullable `bit`, with `default` standing in for NULL
fn flag_or(row: &Row, idx: usize, default: bool) -> Result<bool> {
    Ok(row.try_get::<bool, _>(idx)?.unwrap_or(default))
}
