//! Domain models for the export engine

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collection a database exposes to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Schemas,
    UserDefinedDataTypes,
    UserDefinedTypes,
    UserDefinedTableTypes,
    FullTextCatalogs,
    FullTextStopLists,
    Tables,
    Views,
    StoredProcedures,
    UserDefinedFunctions,
}

impl CollectionKind {
    /// Every collection the scanner consults, in scan order
    pub const ALL: [CollectionKind; 10] = [
        CollectionKind::Schemas,
        CollectionKind::UserDefinedDataTypes,
        CollectionKind::UserDefinedTypes,
        CollectionKind::UserDefinedTableTypes,
        CollectionKind::FullTextCatalogs,
        CollectionKind::FullTextStopLists,
        CollectionKind::Tables,
        CollectionKind::Views,
        CollectionKind::StoredProcedures,
        CollectionKind::UserDefinedFunctions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Schemas => "schemas",
            CollectionKind::UserDefinedTypes => "user-defined types",
            CollectionKind::UserDefinedTableTypes => "user-defined table types",
            CollectionKind::UserDefinedDataTypes => "user-defined data types",
            CollectionKind::FullTextCatalogs => "full-text catalogs",
            CollectionKind::FullTextStopLists => "full-text stop lists",
            CollectionKind::Tables => "tables",
            CollectionKind::Views => "views",
            CollectionKind::StoredProcedures => "stored procedures",
            CollectionKind::UserDefinedFunctions => "user-defined functions",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete kind of a schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Database,
    Schema,
    UserType,
    TableType,
    FullTextCatalog,
    FullTextStopList,
    Table,
    View,
    StoredProcedure,
    Function,
    Index,
    Trigger,
    Statistic,
    ForeignKey,
    CheckConstraint,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Database => "database",
            ObjectKind::Schema => "schema",
            ObjectKind::UserType => "user type",
            ObjectKind::TableType => "table type",
            ObjectKind::FullTextCatalog => "full-text catalog",
            ObjectKind::FullTextStopList => "full-text stop list",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::StoredProcedure => "stored procedure",
            ObjectKind::Function => "function",
            ObjectKind::Index => "index",
            ObjectKind::Trigger => "trigger",
            ObjectKind::Statistic => "statistic",
            ObjectKind::ForeignKey => "foreign key",
            ObjectKind::CheckConstraint => "check constraint",
        }
    }

    /// Whether the object inclusion list applies to this kind.
    ///
    /// Containers (schemas, full-text catalogs and stop lists) and
    /// sub-objects owned by a table or view are only subject to the
    /// system-object check.
    pub fn honours_inclusion_list(&self) -> bool {
        matches!(
            self,
            ObjectKind::Database
                | ObjectKind::UserType
                | ObjectKind::TableType
                | ObjectKind::Table
                | ObjectKind::View
                | ObjectKind::StoredProcedure
                | ObjectKind::Function
        )
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which integrity constraints a table renders inline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintMode {
    /// No keys or constraints at all
    None,
    /// Primary key and unique constraints only
    #[default]
    UniqueOnly,
    /// Keys plus foreign keys and check constraints
    All,
}

/// Rendering configuration handed to every object's render operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Prefix object names with their schema
    pub schema_qualify: bool,
    /// Guard creation with an existence check
    pub include_if_not_exists: bool,
    /// Suppress filegroup / storage clauses
    pub no_file_group: bool,
    pub constraints: ConstraintMode,
    pub include_indexes: bool,
    pub include_triggers: bool,
    pub include_statistics: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            schema_qualify: true,
            include_if_not_exists: true,
            no_file_group: true,
            constraints: ConstraintMode::UniqueOnly,
            include_indexes: false,
            include_triggers: false,
            include_statistics: false,
        }
    }
}

impl RenderOptions {
    /// Profile for the `CREATE DATABASE` statement
    pub fn database() -> Self {
        Self {
            schema_qualify: false,
            ..Self::default()
        }
    }

    /// Profile for schemas, user types and full-text objects
    pub fn containers() -> Self {
        Self::default()
    }

    /// Profile for base table and view definitions
    pub fn structure() -> Self {
        Self::default()
    }

    /// Profile for indexes, triggers and statistics
    pub fn attachments() -> Self {
        Self::structure()
    }

    /// Profile for foreign keys and check constraints
    pub fn cross_references() -> Self {
        Self {
            constraints: ConstraintMode::All,
            ..Self::default()
        }
    }

    /// Profile for stored procedures and functions
    pub fn programmability() -> Self {
        Self::default()
    }

    /// Single profile carrying every dependent feature inline
    pub fn inline() -> Self {
        Self {
            constraints: ConstraintMode::All,
            include_indexes: true,
            include_triggers: true,
            include_statistics: true,
            ..Self::default()
        }
    }
}

/// An emission phase, in script order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// `CREATE DATABASE` and `USE`, emitted before everything else
    Database,
    Containers,
    Structure,
    Attachments,
    CrossReferences,
    Programmability,
    /// Single dependency-ordered pass
    Ordered,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Database => "database",
            PhaseKind::Containers => "containers",
            PhaseKind::Structure => "primary structure",
            PhaseKind::Attachments => "attachments",
            PhaseKind::CrossReferences => "cross references",
            PhaseKind::Programmability => "programmability",
            PhaseKind::Ordered => "dependency order",
        }
    }

    pub fn options(&self) -> RenderOptions {
        match self {
            PhaseKind::Database => RenderOptions::database(),
            PhaseKind::Containers => RenderOptions::containers(),
            PhaseKind::Structure => RenderOptions::structure(),
            PhaseKind::Attachments => RenderOptions::attachments(),
            PhaseKind::CrossReferences => RenderOptions::cross_references(),
            PhaseKind::Programmability => RenderOptions::programmability(),
            PhaseKind::Ordered => RenderOptions::inline(),
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a database's objects are ordered into phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategy {
    /// Five fixed phases
    #[default]
    Phases,
    /// Topological order over catalog dependencies, falling back to phases
    Dependencies,
}

impl std::str::FromStr for SchedulingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phases" => Ok(SchedulingStrategy::Phases),
            "dependencies" | "deps" => Ok(SchedulingStrategy::Dependencies),
            other => Err(format!(
                "unknown strategy '{}', expected 'phases' or 'dependencies'",
                other
            )),
        }
    }
}

/// Referential action on a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FkAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    /// Parse the `*_referential_action_desc` text SQL Server reports
    pub fn from_catalog(desc: &str) -> Self {
        match desc.to_uppercase().replace('_', " ").as_str() {
            "CASCADE" => FkAction::Cascade,
            "SET NULL" => FkAction::SetNull,
            "SET DEFAULT" => FkAction::SetDefault,
            _ => FkAction::NoAction,
        }
    }
}

impl std::fmt::Display for FkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FkAction::NoAction => write!(f, "NO ACTION"),
            FkAction::Cascade => write!(f, "CASCADE"),
            FkAction::SetNull => write!(f, "SET NULL"),
            FkAction::SetDefault => write!(f, "SET DEFAULT"),
        }
    }
}

/// A single object that could not be rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub identity: String,
    pub kind: ObjectKind,
    pub phase: PhaseKind,
    pub cause: String,
}

/// Result of exporting one database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    Written {
        database: String,
        path: PathBuf,
        statements: usize,
        failures: Vec<ObjectFailure>,
    },
    Failed {
        database: String,
        cause: String,
        /// Partial script left behind, if any
        partial: Option<PathBuf>,
    },
    Skipped {
        database: String,
        reason: String,
    },
}

impl ExportOutcome {
    pub fn database(&self) -> &str {
        match self {
            ExportOutcome::Written { database, .. }
            | ExportOutcome::Failed { database, .. }
            | ExportOutcome::Skipped { database, .. } => database,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExportOutcome::Failed { .. })
    }
}

/// Summary of a whole export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub outcomes: Vec<ExportOutcome>,
}

impl ExportReport {
    /// Whether at least one database failed entirely
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(ExportOutcome::is_failure)
    }

    pub fn written_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ExportOutcome::Written { .. }))
            .count()
    }

    /// Total per-object render failures across written databases
    pub fn object_failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                ExportOutcome::Written { failures, .. } => failures.len(),
                _ => 0,
            })
            .sum()
    }
}
