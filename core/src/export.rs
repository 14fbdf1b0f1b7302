//! Export orchestration
//!
//! Selects the databases to export, drives scanner, scheduler and emitter for
//! each of them and writes one `<database>.sql` file per database. Failures
//! are isolated per database; only a failure to list databases stops the run.

use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapter::CatalogAdapter;
use crate::domain::{ExportOutcome, ExportReport, PhaseKind, RenderOptions, SchedulingStrategy};
use crate::emitter::ScriptEmitter;
use crate::error::{CoreError, Result};
use crate::filter::ObjectFilter;
use crate::object::Database;
use crate::scanner::CatalogScanner;
use crate::scheduler::PhaseScheduler;

/// Upper bound on concurrently exported databases
pub const MAX_PARALLELISM: usize = 32;

/// Export run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Directory receiving `<database>.sql` files
    pub output_dir: PathBuf,
    /// Database inclusion list
    pub databases: ObjectFilter,
    /// Restrict the run to one database
    pub database: Option<String>,
    /// Object inclusion list
    pub objects: ObjectFilter,
    pub strategy: SchedulingStrategy,
    /// Databases exported concurrently
    pub parallelism: usize,
    /// Leave the partial script of a failed database on disk
    pub keep_partial: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            databases: ObjectFilter::all(),
            database: None,
            objects: ObjectFilter::all(),
            strategy: SchedulingStrategy::Phases,
            parallelism: 1,
            keep_partial: false,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(CoreError::Config(format!(
                "parallelism must be between 1 and {}, got {}",
                MAX_PARALLELISM, self.parallelism
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CoreError::Config("output directory must not be empty".into()));
        }
        if matches!(&self.database, Some(name) if name.trim().is_empty()) {
            return Err(CoreError::Config("database name must not be empty".into()));
        }
        Ok(())
    }

    /// Script path for a database
    pub fn output_path(&self, database: &str) -> PathBuf {
        self.output_dir.join(format!("{}.sql", file_stem(database)))
    }
}

/// Database name with characters that are invalid in file names replaced
fn file_stem(database: &str) -> String {
    database
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Drives the export of every eligible database
pub struct ExportOrchestrator<A: CatalogAdapter> {
    adapter: A,
    config: ExportConfig,
    cancel: CancellationToken,
}

impl<A: CatalogAdapter> ExportOrchestrator<A> {
    pub fn new(adapter: A, config: ExportConfig) -> Self {
        Self {
            adapter,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop scheduling work once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Databases the run will export, in catalog order
    pub async fn eligible_databases(&self) -> Result<Vec<Database>> {
        let databases = self.adapter.list_databases().await?;

        let eligible: Vec<Database> = databases
            .into_iter()
            .filter(|db| self.config.databases.is_exportable(db))
            .filter(|db| match &self.config.database {
                Some(name) => &db.name == name,
                None => true,
            })
            .collect();

        if let Some(name) = &self.config.database {
            if eligible.is_empty() {
                warn!("Database {} is not on the server or not eligible for export", name);
            }
        }

        Ok(eligible)
    }

    /// Export every eligible database. Fails only when the run cannot start.
    pub async fn run(&self) -> Result<ExportReport> {
        self.config.validate()?;
        let started_at = Utc::now();

        let databases = self.eligible_databases().await?;
        info!(
            "Exporting {} database(s) to {} (strategy: {:?}, parallelism: {})",
            databases.len(),
            self.config.output_dir.display(),
            self.config.strategy,
            self.config.parallelism
        );

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let outcomes: Vec<ExportOutcome> = stream::iter(databases.iter())
            .map(|db| self.export_or_skip(db))
            .buffered(self.config.parallelism)
            .collect()
            .await;

        let report = ExportReport {
            started_at,
            finished_at: Utc::now(),
            cancelled: self.cancel.is_cancelled(),
            outcomes,
        };

        info!(
            "Export finished: {} written, {} failed, {} object failure(s)",
            report.written_count(),
            report.outcomes.iter().filter(|o| o.is_failure()).count(),
            report.object_failure_count()
        );

        Ok(report)
    }

    async fn export_or_skip(&self, database: &Database) -> ExportOutcome {
        if self.cancel.is_cancelled() {
            info!("Skipping database {}: run cancelled", database.name);
            return ExportOutcome::Skipped {
                database: database.name.clone(),
                reason: "run cancelled before export started".to_string(),
            };
        }
        self.export_database(database).await
    }

    /// Export one database, isolating every failure into its outcome
    pub async fn export_database(&self, database: &Database) -> ExportOutcome {
        info!("Exporting database {}", database.name);
        let path = self.config.output_path(&database.name);

        let mut emitter = ScriptEmitter::new();
        let built = self.build_script(database, &mut emitter).await;
        let (buffer, failures) = emitter.finish();

        let cause = match built {
            Ok(()) => match write_script(&path, buffer.to_text()).await {
                Ok(()) => {
                    info!(
                        "Wrote {} ({} statements, {} object failure(s))",
                        path.display(),
                        buffer.statement_count(),
                        failures.len()
                    );
                    return ExportOutcome::Written {
                        database: database.name.clone(),
                        path,
                        statements: buffer.statement_count(),
                        failures,
                    };
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        error!("{}", CoreError::database(&database.name, &cause));

        let partial = if self.config.keep_partial && !buffer.is_empty() {
            match write_script(&path, buffer.to_text()).await {
                Ok(()) => {
                    warn!("Left partial script {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("Could not write partial script {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        ExportOutcome::Failed {
            database: database.name.clone(),
            cause: match cause {
                CoreError::Cancelled => "cancelled".to_string(),
                other => other.to_string(),
            },
            partial,
        }
    }

    async fn build_script(&self, database: &Database, emitter: &mut ScriptEmitter) -> Result<()> {
        emitter.emit_object(PhaseKind::Database, database, &RenderOptions::database());
        emitter.emit_statement(&database.use_statement());

        let scanner = CatalogScanner::new(&self.adapter, &self.config.objects);
        let collections = scanner.scan(&database.name, &self.cancel).await?;

        let dependencies = match self.config.strategy {
            SchedulingStrategy::Phases => None,
            SchedulingStrategy::Dependencies => {
                match self.adapter.load_dependencies(&database.name).await {
                    Ok(deps) => deps,
                    Err(e) => {
                        warn!("Could not load dependencies of {}: {}", database.name, e);
                        None
                    }
                }
            }
        };

        let phases = PhaseScheduler::schedule(&collections, self.config.strategy, dependencies.as_deref());
        for phase in &phases {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            info!(
                "{}: {} phase, {} object(s)",
                database.name,
                phase.kind,
                phase.objects.len()
            );
            emitter.emit_phase(phase);
        }

        Ok(())
    }
}

async fn write_script(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CollectionKind;
    use crate::test_support::{position, shop_catalog, shop_collection, MockCatalog};

    fn config(dir: &Path) -> ExportConfig {
        ExportConfig {
            output_dir: dir.to_path_buf(),
            ..ExportConfig::default()
        }
    }

    fn two_databases() -> MockCatalog {
        let mut catalog = MockCatalog::new();
        catalog.expect_list_databases().returning(|| {
            let mut master = Database::new("master");
            master.is_system = Some(true);
            Ok(vec![master, Database::new("Shop"), Database::new("Archive")])
        });
        catalog
            .expect_load_collection()
            .returning(|_, kind| Ok(shop_collection(kind)));
        catalog.expect_load_dependencies().returning(|_| Ok(None));
        catalog
    }

    #[test]
    fn test_validate_rejects_parallelism_out_of_range() {
        let mut config = ExportConfig::default();
        assert!(config.validate().is_ok());

        config.parallelism = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        config.parallelism = MAX_PARALLELISM + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_path_sanitizes_name() {
        let config = ExportConfig {
            output_dir: PathBuf::from("out"),
            ..ExportConfig::default()
        };
        assert_eq!(config.output_path("Shop"), PathBuf::from("out/Shop.sql"));
        assert_eq!(config.output_path("a/b:c"), PathBuf::from("out/a_b_c.sql"));
    }

    #[tokio::test]
    async fn test_run_writes_one_file_per_database() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = ExportOrchestrator::new(two_databases(), config(dir.path()));

        let report = orchestrator.run().await.unwrap();
        assert_eq!(report.written_count(), 2);
        assert!(!report.has_failures());
        assert_eq!(report.outcomes[0].database(), "Shop");

        assert!(dir.path().join("Shop.sql").exists());
        assert!(dir.path().join("Archive.sql").exists());
        assert!(!dir.path().join("master.sql").exists());
    }

    #[tokio::test]
    async fn test_script_layout() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = ExportOrchestrator::new(shop_catalog(), config(dir.path()));
        orchestrator.run().await.unwrap();

        let script = std::fs::read_to_string(dir.path().join("Shop.sql")).unwrap();
        assert!(script.starts_with(
            "IF NOT EXISTS (SELECT name FROM sys.databases WHERE name = N'Shop')\nBEGIN\nCREATE DATABASE [Shop]\nEND\nGO\n\nUSE [Shop]\nGO\n\n"
        ));

        let use_db = position(&script, "USE [Shop]");
        let orders = position(&script, "CREATE TABLE [dbo].[Orders]");
        let customers = position(&script, "CREATE TABLE [dbo].[Customers]");
        let fk = position(&script, "ADD CONSTRAINT [FK_Orders_Customers]");
        assert!(use_db < orders);
        assert!(orders < customers);
        assert!(customers < fk);

        // system schema and auto-created statistics never appear
        assert!(!script.contains("CREATE SCHEMA [dbo]"));
        assert!(!script.contains("_WA_Sys"));
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = ExportOrchestrator::new(shop_catalog(), config(dir.path()));

        orchestrator.run().await.unwrap();
        let first = std::fs::read(dir.path().join("Shop.sql")).unwrap();
        orchestrator.run().await.unwrap();
        let second = std::fs::read(dir.path().join("Shop.sql")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_single_database_restriction() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            database: Some("Archive".to_string()),
            ..config(dir.path())
        };
        let report = ExportOrchestrator::new(two_databases(), config)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].database(), "Archive");
        assert!(!dir.path().join("Shop.sql").exists());
    }

    #[tokio::test]
    async fn test_database_inclusion_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            databases: ObjectFilter::from_names(["Shop", "master"]),
            ..config(dir.path())
        };
        let report = ExportOrchestrator::new(two_databases(), config)
            .run()
            .await
            .unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.database()).collect();
        assert_eq!(names, vec!["Shop"]);
    }

    #[tokio::test]
    async fn test_object_inclusion_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            objects: ObjectFilter::from_names(["Orders"]),
            ..config(dir.path())
        };
        ExportOrchestrator::new(shop_catalog(), config)
            .run()
            .await
            .unwrap();

        let script = std::fs::read_to_string(dir.path().join("Shop.sql")).unwrap();
        assert!(script.contains("CREATE TABLE [dbo].[Orders]"));
        assert!(script.contains("IX_Orders_CustomerId"));
        // the retained foreign key still references the excluded table
        assert!(script.contains("REFERENCES [dbo].[Customers]"));
        assert!(!script.contains("CREATE TABLE [dbo].[Customers]"));
        assert!(!script.contains("GetOrders"));
    }

    #[tokio::test]
    async fn test_listing_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_list_databases()
            .returning(|| Err(CoreError::pool("login failed for user 'sa'", "connecting")));
        catalog.expect_load_collection().times(0);

        let output = dir.path().join("out");
        let err = ExportOrchestrator::new(catalog, config(&output))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_database_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_list_databases()
            .returning(|| Ok(vec![Database::new("Offline"), Database::new("Shop")]));
        catalog.expect_load_collection().returning(|db, kind| {
            if db == "Offline" {
                Err(CoreError::IntrospectionFailed("database is offline".into()))
            } else {
                Ok(shop_collection(kind))
            }
        });

        let report = ExportOrchestrator::new(catalog, config(dir.path()))
            .run()
            .await
            .unwrap();

        assert!(report.has_failures());
        assert_eq!(report.written_count(), 1);
        match &report.outcomes[0] {
            ExportOutcome::Failed { database, cause, partial } => {
                assert_eq!(database, "Offline");
                assert!(cause.contains("database is offline"));
                assert!(partial.is_none());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!dir.path().join("Offline.sql").exists());
        assert!(dir.path().join("Shop.sql").exists());
    }

    #[tokio::test]
    async fn test_keep_partial_leaves_prologue() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_list_databases()
            .returning(|| Ok(vec![Database::new("Offline")]));
        catalog
            .expect_load_collection()
            .returning(|_, _| Err(CoreError::IntrospectionFailed("offline".into())));

        let config = ExportConfig {
            keep_partial: true,
            ..config(dir.path())
        };
        let report = ExportOrchestrator::new(catalog, config).run().await.unwrap();

        match &report.outcomes[0] {
            ExportOutcome::Failed { partial: Some(path), .. } => {
                let text = std::fs::read_to_string(path).unwrap();
                assert!(text.ends_with("USE [Offline]\nGO\n\n"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_databases() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = ExportOrchestrator::new(two_databases(), config(dir.path()))
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.written_count(), 0);
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o, ExportOutcome::Skipped { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_mid_scan_discards_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let mut catalog = MockCatalog::new();
        catalog
            .expect_list_databases()
            .returning(|| Ok(vec![Database::new("Shop")]));
        catalog.expect_load_collection().returning(move |_, kind| {
            if kind == CollectionKind::Tables {
                trigger.cancel();
            }
            Ok(shop_collection(kind))
        });

        let report = ExportOrchestrator::new(catalog, config(dir.path()))
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap();

        assert!(report.cancelled);
        match &report.outcomes[0] {
            ExportOutcome::Failed { cause, partial, .. } => {
                assert_eq!(cause, "cancelled");
                assert!(partial.is_none());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!dir.path().join("Shop.sql").exists());
    }

    #[tokio::test]
    async fn test_parallel_run_keeps_database_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            parallelism: 4,
            ..config(dir.path())
        };
        let report = ExportOrchestrator::new(two_databases(), config)
            .run()
            .await
            .unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.database()).collect();
        assert_eq!(names, vec!["Shop", "Archive"]);
    }

    #[tokio::test]
    async fn test_dependency_strategy_without_capability_uses_phases() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            strategy: SchedulingStrategy::Dependencies,
            ..config(dir.path())
        };
        ExportOrchestrator::new(shop_catalog(), config)
            .run()
            .await
            .unwrap();

        let script = std::fs::read_to_string(dir.path().join("Shop.sql")).unwrap();
        assert!(script.contains("ADD CONSTRAINT [FK_Orders_Customers]"));
    }

    #[tokio::test]
    async fn test_dependency_strategy_orders_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::new();
        catalog
            .expect_list_databases()
            .returning(|| Ok(vec![Database::new("Shop")]));
        catalog
            .expect_load_collection()
            .returning(|_, kind| Ok(shop_collection(kind)));
        catalog
            .expect_load_dependencies()
            .times(1)
            .returning(|_| Ok(Some(Vec::new())));

        let config = ExportConfig {
            strategy: SchedulingStrategy::Dependencies,
            ..config(dir.path())
        };
        ExportOrchestrator::new(catalog, config).run().await.unwrap();

        let script = std::fs::read_to_string(dir.path().join("Shop.sql")).unwrap();
        let customers = position(&script, "CREATE TABLE [dbo].[Customers]");
        let orders = position(&script, "CREATE TABLE [dbo].[Orders]");
        assert!(customers < orders);
        assert!(!script.contains("ADD CONSTRAINT"));
    }
}
