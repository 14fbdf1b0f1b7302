//! Catalog object model
//!
//! Every exportable entity is one of a closed set of kinds. Top-level kinds
//! live in [`CatalogObject`]; indexes, triggers, statistics, foreign keys and
//! check constraints are owned by their table or view. All of them share the
//! [`SchemaObject`] capability: an identity for diagnostics, a system flag,
//! and a render operation producing T-SQL statements.

use serde::{Deserialize, Serialize};

use crate::domain::{ConstraintMode, FkAction, ObjectKind, RenderOptions};
use crate::error::{CoreError, Result};
use crate::sql_gen::DdlGenerator;

/// Uniform capability every catalog object exposes
pub trait SchemaObject: Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// Unqualified name
    fn name(&self) -> &str;

    /// Owning schema, if the kind is schema-scoped
    fn schema(&self) -> Option<&str> {
        None
    }

    /// Qualified identity used in logs and failure reports
    fn identity(&self) -> String {
        match self.schema() {
            Some(schema) => format!(
                "{}.{}",
                DdlGenerator::quote_ident(schema),
                DdlGenerator::quote_ident(self.name())
            ),
            None => DdlGenerator::quote_ident(self.name()),
        }
    }

    /// Whether the engine owns this object. Fails when the catalog could not
    /// resolve the flag.
    fn is_system_object(&self) -> Result<bool>;

    /// Render the object's DDL statements
    fn render(&self, options: &RenderOptions) -> Result<Vec<String>>;

    /// Objects attached to this one (indexes, triggers, statistics)
    fn attachments(&self) -> Vec<&dyn SchemaObject> {
        Vec::new()
    }

    /// Identity of the owning table or view, for sub-objects
    fn owner(&self) -> Option<String> {
        None
    }
}

fn user_object() -> Option<bool> {
    Some(false)
}

fn enabled() -> bool {
    true
}

fn system_flag(flag: Option<bool>, identity: impl FnOnce() -> String) -> Result<bool> {
    flag.ok_or_else(|| {
        CoreError::IntrospectionFailed(format!("system flag unavailable for {}", identity()))
    })
}

/// Schema-qualified object name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// `schema.name`, unquoted
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}",
            DdlGenerator::quote_ident(&self.schema),
            DdlGenerator::quote_ident(&self.name)
        )
    }
}

/// A database on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
    #[serde(default)]
    pub collation: Option<String>,
    #[serde(default)]
    pub compatibility_level: Option<u8>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_system: Some(false),
            collation: None,
            compatibility_level: None,
        }
    }

    /// The statement switching the session to this database
    pub fn use_statement(&self) -> String {
        format!("USE {}", DdlGenerator::quote_ident(&self.name))
    }
}

impl SchemaObject for Database {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Database
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        Ok(DdlGenerator::create_database(self, options))
    }
}

/// Column data type as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub name: String,
    /// Set for user-defined types, which render as `[schema].[name]`
    #[serde(default)]
    pub schema: Option<String>,
    /// Length in bytes, -1 for `max`
    #[serde(default)]
    pub max_length: i32,
    #[serde(default)]
    pub precision: i32,
    #[serde(default)]
    pub scale: i32,
}

impl SqlType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            max_length: 0,
            precision: 0,
            scale: 0,
        }
    }

    pub fn with_length(mut self, max_length: i32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// A user-defined type living in `schema`
    pub fn user_defined(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::new(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub seed: i64,
    pub increment: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedColumn {
    /// Expression as stored by the catalog, including outer parentheses
    pub definition: String,
    #[serde(default)]
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultConstraint {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: SqlType,
    #[serde(default = "enabled")]
    pub is_nullable: bool,
    #[serde(default)]
    pub identity: Option<IdentitySpec>,
    #[serde(default)]
    pub computed: Option<ComputedColumn>,
    #[serde(default)]
    pub default: Option<DefaultConstraint>,
    #[serde(default)]
    pub collation: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_nullable: true,
            identity: None,
            computed: None,
            default: None,
            collation: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn identity(mut self, seed: i64, increment: i64) -> Self {
        self.identity = Some(IdentitySpec { seed, increment });
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.default = Some(DefaultConstraint {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    #[serde(default)]
    pub descending: bool,
}

impl IndexColumn {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: false,
        }
    }
}

/// Primary key or unique constraint declared with a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConstraint {
    pub name: String,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_clustered: bool,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub filegroup: Option<String>,
}

impl KeyConstraint {
    pub fn primary_key(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            is_primary_key: true,
            is_clustered: true,
            columns: columns.iter().map(|c| IndexColumn::asc(*c)).collect(),
            filegroup: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for Schema {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Schema
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        Ok(vec![DdlGenerator::create_schema(self, options)])
    }
}

/// How a user-defined scalar type is implemented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum UserTypeDefinition {
    /// `CREATE TYPE .. FROM <base type>`
    Alias { base: SqlType, nullable: bool },
    /// Backed by a CLR assembly
    Clr { assembly: String, class: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserType {
    pub schema: String,
    pub name: String,
    pub definition: UserTypeDefinition,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for UserType {
    fn kind(&self) -> ObjectKind {
        ObjectKind::UserType
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        match &self.definition {
            UserTypeDefinition::Alias { base, nullable } => Ok(vec![
                DdlGenerator::create_alias_type(self, base, *nullable, options),
            ]),
            UserTypeDefinition::Clr { assembly, .. } => Err(CoreError::render(
                self.identity(),
                format!(
                    "assembly-backed type requires assembly [{}], which is not exported",
                    assembly
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableType {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub keys: Vec<KeyConstraint>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for TableType {
    fn kind(&self) -> ObjectKind {
        ObjectKind::TableType
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if self.columns.is_empty() {
            return Err(CoreError::render(self.identity(), "table type has no columns"));
        }
        Ok(vec![DdlGenerator::create_table_type(self, options)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTextCatalog {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "enabled")]
    pub accent_sensitive: bool,
    #[serde(default)]
    pub filegroup: Option<String>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for FullTextCatalog {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FullTextCatalog
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        Ok(vec![DdlGenerator::create_fulltext_catalog(self, options)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopWord {
    pub word: String,
    pub language_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTextStopList {
    pub name: String,
    #[serde(default)]
    pub words: Vec<StopWord>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for FullTextStopList {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FullTextStopList
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        Ok(DdlGenerator::create_fulltext_stoplist(self, options))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Clustered,
    Nonclustered,
    ClusteredColumnstore,
    NonclusteredColumnstore,
    Xml,
    Spatial,
}

impl IndexKind {
    /// Map `sys.indexes.type`
    pub fn from_catalog(index_type: u8) -> Self {
        match index_type {
            1 => IndexKind::Clustered,
            3 => IndexKind::Xml,
            4 => IndexKind::Spatial,
            5 => IndexKind::ClusteredColumnstore,
            6 => IndexKind::NonclusteredColumnstore,
            _ => IndexKind::Nonclustered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Owning table or view; filled in by the owner
    #[serde(default)]
    pub parent: ObjectName,
    pub name: String,
    pub kind: IndexKind,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub filegroup: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for Index {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Index
    }

    fn owner(&self) -> Option<String> {
        Some(self.parent.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.parent.schema)
    }

    fn identity(&self) -> String {
        format!("{}.{}", self.parent, DdlGenerator::quote_ident(&self.name))
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        match self.kind {
            IndexKind::Xml | IndexKind::Spatial => Err(CoreError::render(
                self.identity(),
                format!("{:?} indexes are not supported", self.kind).to_lowercase(),
            )),
            _ => Ok(DdlGenerator::create_index(self, options)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub parent: ObjectName,
    pub name: String,
    /// `None` when the module is encrypted
    pub definition: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default = "enabled")]
    pub ansi_nulls: bool,
    #[serde(default = "enabled")]
    pub quoted_identifier: bool,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for Trigger {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Trigger
    }

    fn owner(&self) -> Option<String> {
        Some(self.parent.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.parent.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        let definition = self
            .definition
            .as_deref()
            .ok_or_else(|| CoreError::render(self.identity(), "definition is encrypted"))?;
        Ok(DdlGenerator::create_trigger(self, definition, options))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    #[serde(default)]
    pub parent: ObjectName,
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub no_recompute: bool,
    /// Auto-created statistics are owned by the engine
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for Statistic {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Statistic
    }

    fn owner(&self) -> Option<String> {
        Some(self.parent.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.parent.schema)
    }

    fn identity(&self) -> String {
        format!("{}.{}", self.parent, DdlGenerator::quote_ident(&self.name))
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if self.columns.is_empty() {
            return Err(CoreError::render(self.identity(), "statistic has no columns"));
        }
        Ok(vec![DdlGenerator::create_statistic(self, options)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default)]
    pub parent: ObjectName,
    pub name: String,
    pub columns: Vec<String>,
    pub references: ObjectName,
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: FkAction,
    #[serde(default)]
    pub on_update: FkAction,
    /// Created `WITH NOCHECK` / currently not enforced
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for ForeignKey {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ForeignKey
    }

    fn owner(&self) -> Option<String> {
        Some(self.parent.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.parent.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if options.constraints != ConstraintMode::All {
            return Ok(Vec::new());
        }
        if self.columns.is_empty() || self.columns.len() != self.referenced_columns.len() {
            return Err(CoreError::render(
                self.identity(),
                "column list does not match referenced columns",
            ));
        }
        Ok(DdlGenerator::add_foreign_key(self, options))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    #[serde(default)]
    pub parent: ObjectName,
    pub name: String,
    /// Expression as stored by the catalog, including outer parentheses
    pub definition: String,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for CheckConstraint {
    fn kind(&self) -> ObjectKind {
        ObjectKind::CheckConstraint
    }

    fn owner(&self) -> Option<String> {
        Some(self.parent.to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.parent.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if options.constraints != ConstraintMode::All {
            return Ok(Vec::new());
        }
        Ok(DdlGenerator::add_check_constraint(self, options))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    /// Primary key and unique constraints
    #[serde(default)]
    pub keys: Vec<KeyConstraint>,
    #[serde(default)]
    pub filegroup: Option<String>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub statistics: Vec<Statistic>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            keys: Vec::new(),
            filegroup: None,
            indexes: Vec::new(),
            triggers: Vec::new(),
            statistics: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            is_system: Some(false),
        }
    }

    pub fn object_name(&self) -> ObjectName {
        ObjectName::new(&self.schema, &self.name)
    }

    /// Point every owned sub-object back at this table
    pub fn adopt_children(&mut self) {
        let parent = self.object_name();
        for index in &mut self.indexes {
            index.parent = parent.clone();
        }
        for trigger in &mut self.triggers {
            trigger.parent = parent.clone();
        }
        for statistic in &mut self.statistics {
            statistic.parent = parent.clone();
        }
        for fk in &mut self.foreign_keys {
            fk.parent = parent.clone();
        }
        for check in &mut self.checks {
            check.parent = parent.clone();
        }
    }
}

impl SchemaObject for Table {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Table
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if self.columns.is_empty() {
            return Err(CoreError::render(self.identity(), "table has no columns"));
        }
        Ok(DdlGenerator::create_table(self, options))
    }

    fn attachments(&self) -> Vec<&dyn SchemaObject> {
        attachments_of(&self.indexes, &self.triggers, &self.statistics)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub schema: String,
    pub name: String,
    /// `None` when the module is encrypted
    pub definition: Option<String>,
    #[serde(default = "enabled")]
    pub ansi_nulls: bool,
    #[serde(default = "enabled")]
    pub quoted_identifier: bool,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub statistics: Vec<Statistic>,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl View {
    pub fn object_name(&self) -> ObjectName {
        ObjectName::new(&self.schema, &self.name)
    }

    pub fn adopt_children(&mut self) {
        let parent = self.object_name();
        for index in &mut self.indexes {
            index.parent = parent.clone();
        }
        for trigger in &mut self.triggers {
            trigger.parent = parent.clone();
        }
        for statistic in &mut self.statistics {
            statistic.parent = parent.clone();
        }
    }
}

impl SchemaObject for View {
    fn kind(&self) -> ObjectKind {
        ObjectKind::View
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        let definition = self
            .definition
            .as_deref()
            .ok_or_else(|| CoreError::render(self.identity(), "definition is encrypted"))?;
        Ok(DdlGenerator::create_view(self, definition, options))
    }

    fn attachments(&self) -> Vec<&dyn SchemaObject> {
        attachments_of(&self.indexes, &self.triggers, &self.statistics)
    }
}

fn attachments_of<'a>(
    indexes: &'a [Index],
    triggers: &'a [Trigger],
    statistics: &'a [Statistic],
) -> Vec<&'a dyn SchemaObject> {
    let mut out: Vec<&dyn SchemaObject> = Vec::new();
    out.extend(indexes.iter().map(|i| i as &dyn SchemaObject));
    out.extend(triggers.iter().map(|t| t as &dyn SchemaObject));
    out.extend(statistics.iter().map(|s| s as &dyn SchemaObject));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure,
    ClrProcedure,
    ScalarFunction,
    InlineTableFunction,
    TableFunction,
    ClrFunction,
}

impl RoutineKind {
    /// Map `sys.objects.type`
    pub fn from_catalog(object_type: &str) -> Option<Self> {
        match object_type.trim() {
            "P" => Some(RoutineKind::Procedure),
            "PC" => Some(RoutineKind::ClrProcedure),
            "FN" => Some(RoutineKind::ScalarFunction),
            "IF" => Some(RoutineKind::InlineTableFunction),
            "TF" => Some(RoutineKind::TableFunction),
            "FS" | "FT" => Some(RoutineKind::ClrFunction),
            _ => None,
        }
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, RoutineKind::Procedure | RoutineKind::ClrProcedure)
    }

    pub fn is_clr(&self) -> bool {
        matches!(self, RoutineKind::ClrProcedure | RoutineKind::ClrFunction)
    }
}

/// Stored procedure or user-defined function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub schema: String,
    pub name: String,
    pub kind: RoutineKind,
    /// `None` when the module is encrypted or CLR-backed
    pub definition: Option<String>,
    #[serde(default = "enabled")]
    pub ansi_nulls: bool,
    #[serde(default = "enabled")]
    pub quoted_identifier: bool,
    #[serde(default = "user_object")]
    pub is_system: Option<bool>,
}

impl SchemaObject for Routine {
    fn kind(&self) -> ObjectKind {
        if self.kind.is_procedure() {
            ObjectKind::StoredProcedure
        } else {
            ObjectKind::Function
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn is_system_object(&self) -> Result<bool> {
        system_flag(self.is_system, || self.identity())
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        if self.kind.is_clr() {
            return Err(CoreError::render(
                self.identity(),
                "assembly-backed routines are not exported",
            ));
        }
        let definition = self
            .definition
            .as_deref()
            .ok_or_else(|| CoreError::render(self.identity(), "definition is encrypted"))?;
        Ok(DdlGenerator::create_routine(self, definition, options))
    }
}

/// Node key used by the dependency-ordered scheduler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DependencyKey {
    Schema { name: String },
    Type { schema: String, name: String },
    Object { schema: String, name: String },
    FullText { name: String },
}

impl DependencyKey {
    pub fn object(schema: impl Into<String>, name: impl Into<String>) -> Self {
        DependencyKey::Object {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

/// `from` cannot be created before `to` exists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub from: DependencyKey,
    pub to: DependencyKey,
}

/// A top-level object from one of a database's collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum CatalogObject {
    Schema(Schema),
    UserType(UserType),
    TableType(TableType),
    FullTextCatalog(FullTextCatalog),
    FullTextStopList(FullTextStopList),
    Table(Table),
    View(View),
    Routine(Routine),
}

impl CatalogObject {
    pub fn as_object(&self) -> &dyn SchemaObject {
        match self {
            CatalogObject::Schema(o) => o,
            CatalogObject::UserType(o) => o,
            CatalogObject::TableType(o) => o,
            CatalogObject::FullTextCatalog(o) => o,
            CatalogObject::FullTextStopList(o) => o,
            CatalogObject::Table(o) => o,
            CatalogObject::View(o) => o,
            CatalogObject::Routine(o) => o,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            CatalogObject::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Restore parent links on owned sub-objects
    pub fn adopt_children(&mut self) {
        match self {
            CatalogObject::Table(t) => t.adopt_children(),
            CatalogObject::View(v) => v.adopt_children(),
            _ => {}
        }
    }

    /// Key identifying this object in a dependency graph
    pub fn dependency_key(&self) -> DependencyKey {
        match self {
            CatalogObject::Schema(s) => DependencyKey::Schema {
                name: s.name.clone(),
            },
            CatalogObject::UserType(t) => DependencyKey::Type {
                schema: t.schema.clone(),
                name: t.name.clone(),
            },
            CatalogObject::TableType(t) => DependencyKey::Type {
                schema: t.schema.clone(),
                name: t.name.clone(),
            },
            CatalogObject::FullTextCatalog(c) => DependencyKey::FullText {
                name: c.name.clone(),
            },
            CatalogObject::FullTextStopList(s) => DependencyKey::FullText {
                name: s.name.clone(),
            },
            CatalogObject::Table(t) => DependencyKey::object(&t.schema, &t.name),
            CatalogObject::View(v) => DependencyKey::object(&v.schema, &v.name),
            CatalogObject::Routine(r) => DependencyKey::object(&r.schema, &r.name),
        }
    }

    /// Dependencies implied by the object's own definition: its schema, the
    /// user types its columns use, and the tables its foreign keys reference
    pub fn intrinsic_dependencies(&self) -> Vec<DependencyKey> {
        let mut deps = Vec::new();
        if let Some(schema) = self.as_object().schema() {
            deps.push(DependencyKey::Schema {
                name: schema.to_string(),
            });
        }

        let columns: &[Column] = match self {
            CatalogObject::Table(t) => &t.columns,
            CatalogObject::TableType(t) => &t.columns,
            _ => &[],
        };
        for column in columns {
            if let Some(type_schema) = &column.data_type.schema {
                deps.push(DependencyKey::Type {
                    schema: type_schema.clone(),
                    name: column.data_type.name.clone(),
                });
            }
        }

        if let CatalogObject::UserType(UserType {
            definition: UserTypeDefinition::Alias { base, .. },
            ..
        }) = self
        {
            if let Some(type_schema) = &base.schema {
                deps.push(DependencyKey::Type {
                    schema: type_schema.clone(),
                    name: base.name.clone(),
                });
            }
        }

        if let CatalogObject::Table(t) = self {
            for fk in &t.foreign_keys {
                deps.push(DependencyKey::object(
                    &fk.references.schema,
                    &fk.references.name,
                ));
            }
        }

        deps
    }
}

impl SchemaObject for CatalogObject {
    fn kind(&self) -> ObjectKind {
        self.as_object().kind()
    }

    fn name(&self) -> &str {
        self.as_object().name()
    }

    fn schema(&self) -> Option<&str> {
        self.as_object().schema()
    }

    fn identity(&self) -> String {
        self.as_object().identity()
    }

    fn is_system_object(&self) -> Result<bool> {
        self.as_object().is_system_object()
    }

    fn render(&self, options: &RenderOptions) -> Result<Vec<String>> {
        self.as_object().render(options)
    }

    fn attachments(&self) -> Vec<&dyn SchemaObject> {
        self.as_object().attachments()
    }
}
