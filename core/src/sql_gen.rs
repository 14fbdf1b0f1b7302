//! T-SQL DDL generation for catalog objects

use crate::domain::{ConstraintMode, FkAction, RenderOptions};
use crate::object::{
    CheckConstraint, Column, Database, ForeignKey, FullTextCatalog, FullTextStopList, Index,
    IndexColumn, IndexKind, KeyConstraint, ObjectName, Routine, Schema, SqlType, Statistic, Table,
    TableType, Trigger, UserType, View,
};

/// DDL text generator
pub struct DdlGenerator;

impl DdlGenerator {
    /// Quote an identifier with brackets
    pub fn quote_ident(name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    /// Unicode string literal
    pub fn quote_literal(value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    /// Object reference, schema-qualified when the options ask for it
    pub fn object_ref(name: &ObjectName, options: &RenderOptions) -> String {
        if options.schema_qualify {
            name.to_string()
        } else {
            Self::quote_ident(&name.name)
        }
    }

    /// Render a column type the way `CREATE TABLE` expects it
    pub fn format_type(data_type: &SqlType) -> String {
        if let Some(schema) = &data_type.schema {
            return format!(
                "{}.{}",
                Self::quote_ident(schema),
                Self::quote_ident(&data_type.name)
            );
        }

        let quoted = Self::quote_ident(&data_type.name);
        let lower = data_type.name.to_lowercase();
        match lower.as_str() {
            "decimal" | "numeric" => {
                if data_type.precision > 0 {
                    format!("{}({}, {})", quoted, data_type.precision, data_type.scale)
                } else {
                    format!("{}(18, 0)", quoted)
                }
            }

            "float" => {
                if data_type.precision > 0 && data_type.precision != 53 {
                    format!("{}({})", quoted, data_type.precision)
                } else {
                    quoted
                }
            }

            "datetime2" | "time" | "datetimeoffset" => {
                if data_type.scale != 7 {
                    format!("{}({})", quoted, data_type.scale)
                } else {
                    quoted
                }
            }

            "char" | "varchar" | "nchar" | "nvarchar" => {
                if data_type.max_length == -1 {
                    format!("{}(max)", quoted)
                } else if data_type.max_length > 0 {
                    // catalog lengths are in bytes; n-types store two bytes per character
                    let len = if lower.starts_with('n') {
                        data_type.max_length / 2
                    } else {
                        data_type.max_length
                    };
                    format!("{}({})", quoted, len)
                } else {
                    format!("{}(1)", quoted)
                }
            }

            "binary" | "varbinary" => {
                if data_type.max_length == -1 {
                    format!("{}(max)", quoted)
                } else if data_type.max_length > 0 {
                    format!("{}({})", quoted, data_type.max_length)
                } else {
                    format!("{}(1)", quoted)
                }
            }

            _ => quoted,
        }
    }

    fn column_definition(column: &Column) -> String {
        let name = Self::quote_ident(&column.name);

        if let Some(computed) = &column.computed {
            let persisted = if computed.persisted { " PERSISTED" } else { "" };
            return format!("{} AS {}{}", name, computed.definition, persisted);
        }

        let mut def = format!("{} {}", name, Self::format_type(&column.data_type));
        if let Some(collation) = &column.collation {
            def.push_str(&format!(" COLLATE {}", collation));
        }
        if let Some(identity) = &column.identity {
            def.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.increment));
        }
        def.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &column.default {
            def.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                Self::quote_ident(&default.name),
                default.definition
            ));
        }
        def
    }

    fn index_columns(columns: &[IndexColumn]) -> String {
        columns
            .iter()
            .map(|c| {
                format!(
                    "{} {}",
                    Self::quote_ident(&c.name),
                    if c.descending { "DESC" } else { "ASC" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn column_list(columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| Self::quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn filegroup_clause(filegroup: &Option<String>, options: &RenderOptions) -> String {
        match filegroup {
            Some(fg) if !options.no_file_group => format!(" ON {}", Self::quote_ident(fg)),
            _ => String::new(),
        }
    }

    /// Key constraint as it appears inside a table body. Table types carry
    /// system-named keys, so they render without a constraint name.
    fn key_constraint(key: &KeyConstraint, named: bool, options: &RenderOptions) -> String {
        let kind = if key.is_primary_key { "PRIMARY KEY" } else { "UNIQUE" };
        let clustering = if key.is_clustered { "CLUSTERED" } else { "NONCLUSTERED" };
        let prefix = if named {
            format!("CONSTRAINT {} ", Self::quote_ident(&key.name))
        } else {
            String::new()
        };
        format!(
            "{}{} {} ({}){}",
            prefix,
            kind,
            clustering,
            Self::index_columns(&key.columns),
            Self::filegroup_clause(&key.filegroup, options)
        )
    }

    fn referential_actions(fk: &ForeignKey) -> String {
        let mut out = String::new();
        if fk.on_delete != FkAction::NoAction {
            out.push_str(&format!(" ON DELETE {}", fk.on_delete));
        }
        if fk.on_update != FkAction::NoAction {
            out.push_str(&format!(" ON UPDATE {}", fk.on_update));
        }
        out
    }

    /// Wrap a statement that must start a batch so it can follow a guard
    fn exec_sql(statement: &str) -> String {
        format!("EXEC sys.sp_executesql {}", Self::quote_literal(statement))
    }

    fn guarded(guard: String, statement: String, options: &RenderOptions) -> String {
        if options.include_if_not_exists {
            format!("{}\n{}", guard, statement)
        } else {
            statement
        }
    }

    fn object_exists(
        catalog: &str,
        name: &ObjectName,
        extra: &str,
        options: &RenderOptions,
    ) -> String {
        format!(
            "SELECT * FROM {} WHERE object_id = OBJECT_ID({}){}",
            catalog,
            Self::quote_literal(&Self::object_ref(name, options)),
            extra
        )
    }

    fn module_settings(ansi_nulls: bool, quoted_identifier: bool) -> Vec<String> {
        vec![
            format!("SET ANSI_NULLS {}", if ansi_nulls { "ON" } else { "OFF" }),
            format!(
                "SET QUOTED_IDENTIFIER {}",
                if quoted_identifier { "ON" } else { "OFF" }
            ),
        ]
    }

    pub fn create_database(database: &Database, options: &RenderOptions) -> Vec<String> {
        let name = Self::quote_ident(&database.name);
        let mut create = format!("CREATE DATABASE {}", name);
        if let Some(collation) = &database.collation {
            create.push_str(&format!("\n COLLATE {}", collation));
        }

        let create = if options.include_if_not_exists {
            format!(
                "IF NOT EXISTS (SELECT name FROM sys.databases WHERE name = {})\nBEGIN\n{}\nEND",
                Self::quote_literal(&database.name),
                create
            )
        } else {
            create
        };

        let mut statements = vec![create];
        if let Some(level) = database.compatibility_level {
            statements.push(format!(
                "ALTER DATABASE {} SET COMPATIBILITY_LEVEL = {}",
                name, level
            ));
        }
        statements
    }

    pub fn create_schema(schema: &Schema, options: &RenderOptions) -> String {
        let mut create = format!("CREATE SCHEMA {}", Self::quote_ident(&schema.name));
        if let Some(owner) = &schema.owner {
            create.push_str(&format!(" AUTHORIZATION {}", Self::quote_ident(owner)));
        }

        if options.include_if_not_exists {
            format!(
                "IF NOT EXISTS (SELECT * FROM sys.schemas WHERE name = {})\n{}",
                Self::quote_literal(&schema.name),
                Self::exec_sql(&create)
            )
        } else {
            create
        }
    }

    fn type_exists(schema: &str, name: &str) -> String {
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.types st JOIN sys.schemas ss ON st.schema_id = ss.schema_id WHERE st.name = {} AND ss.name = {})",
            Self::quote_literal(name),
            Self::quote_literal(schema)
        )
    }

    pub fn create_alias_type(
        user_type: &UserType,
        base: &SqlType,
        nullable: bool,
        options: &RenderOptions,
    ) -> String {
        let name = ObjectName::new(&user_type.schema, &user_type.name);
        let create = format!(
            "CREATE TYPE {} FROM {}{}",
            Self::object_ref(&name, options),
            Self::format_type(base),
            if nullable { " NULL" } else { " NOT NULL" }
        );
        Self::guarded(
            Self::type_exists(&user_type.schema, &user_type.name),
            create,
            options,
        )
    }

    pub fn create_table_type(table_type: &TableType, options: &RenderOptions) -> String {
        let name = ObjectName::new(&table_type.schema, &table_type.name);
        let mut body: Vec<String> = table_type
            .columns
            .iter()
            .map(|c| format!("\t{}", Self::column_definition(c)))
            .collect();
        if options.constraints != ConstraintMode::None {
            body.extend(
                table_type
                    .keys
                    .iter()
                    .map(|k| format!("\t{}", Self::key_constraint(k, false, options))),
            );
        }

        let create = format!(
            "CREATE TYPE {} AS TABLE(\n{}\n)",
            Self::object_ref(&name, options),
            body.join(",\n")
        );
        Self::guarded(
            Self::type_exists(&table_type.schema, &table_type.name),
            create,
            options,
        )
    }

    pub fn create_fulltext_catalog(catalog: &FullTextCatalog, options: &RenderOptions) -> String {
        let mut create = format!("CREATE FULLTEXT CATALOG {}", Self::quote_ident(&catalog.name));
        if let Some(fg) = &catalog.filegroup {
            if !options.no_file_group {
                create.push_str(&format!(" ON FILEGROUP {}", Self::quote_ident(fg)));
            }
        }
        create.push_str(&format!(
            " WITH ACCENT_SENSITIVITY = {}",
            if catalog.accent_sensitive { "ON" } else { "OFF" }
        ));
        if catalog.is_default {
            create.push_str(" AS DEFAULT");
        }

        Self::guarded(
            format!(
                "IF NOT EXISTS (SELECT * FROM sys.fulltext_catalogs WHERE name = {})",
                Self::quote_literal(&catalog.name)
            ),
            create,
            options,
        )
    }

    pub fn create_fulltext_stoplist(
        stoplist: &FullTextStopList,
        options: &RenderOptions,
    ) -> Vec<String> {
        let name = Self::quote_ident(&stoplist.name);
        let create = Self::guarded(
            format!(
                "IF NOT EXISTS (SELECT * FROM sys.fulltext_stoplists WHERE name = {})",
                Self::quote_literal(&stoplist.name)
            ),
            format!("CREATE FULLTEXT STOPLIST {}", name),
            options,
        );

        let mut statements = vec![create];
        statements.extend(stoplist.words.iter().map(|w| {
            format!(
                "ALTER FULLTEXT STOPLIST {} ADD {} LANGUAGE {}",
                name,
                Self::quote_literal(&w.word),
                w.language_id
            )
        }));
        statements
    }

    pub fn create_table(table: &Table, options: &RenderOptions) -> Vec<String> {
        let name = table.object_name();
        let table_ref = Self::object_ref(&name, options);

        let mut body: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("\t{}", Self::column_definition(c)))
            .collect();

        if options.constraints != ConstraintMode::None {
            body.extend(
                table
                    .keys
                    .iter()
                    .map(|k| format!("\t{}", Self::key_constraint(k, true, options))),
            );
        }

        if options.constraints == ConstraintMode::All {
            body.extend(table.foreign_keys.iter().map(|fk| {
                format!(
                    "\tCONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}){}",
                    Self::quote_ident(&fk.name),
                    Self::column_list(&fk.columns),
                    Self::object_ref(&fk.references, options),
                    Self::column_list(&fk.referenced_columns),
                    Self::referential_actions(fk)
                )
            }));
            body.extend(table.checks.iter().map(|ck| {
                format!(
                    "\tCONSTRAINT {} CHECK {}",
                    Self::quote_ident(&ck.name),
                    ck.definition
                )
            }));
        }

        let create = format!(
            "CREATE TABLE {}(\n{}\n){}",
            table_ref,
            body.join(",\n"),
            Self::filegroup_clause(&table.filegroup, options)
        );

        let create = if options.include_if_not_exists {
            format!(
                "IF NOT EXISTS ({})\nBEGIN\n{}\nEND",
                Self::object_exists("sys.objects", &name, " AND type in (N'U')", options),
                create
            )
        } else {
            create
        };

        let mut statements = vec![create];

        // constraints declared inline cannot carry NOCHECK, so disable them afterwards
        if options.constraints == ConstraintMode::All {
            statements.extend(
                table
                    .foreign_keys
                    .iter()
                    .filter(|fk| fk.is_disabled)
                    .map(|fk| &fk.name)
                    .chain(table.checks.iter().filter(|c| c.is_disabled).map(|c| &c.name))
                    .map(|constraint| {
                        format!(
                            "ALTER TABLE {} NOCHECK CONSTRAINT {}",
                            table_ref,
                            Self::quote_ident(constraint)
                        )
                    }),
            );
        }

        statements
    }

    pub fn create_view(view: &View, definition: &str, options: &RenderOptions) -> Vec<String> {
        let name = view.object_name();
        let mut statements = Self::module_settings(view.ansi_nulls, view.quoted_identifier);
        statements.push(Self::guarded(
            format!(
                "IF NOT EXISTS ({})",
                Self::object_exists("sys.views", &name, "", options)
            ),
            Self::exec_sql(definition.trim()),
            options,
        ));
        statements
    }

    pub fn create_routine(routine: &Routine, definition: &str, options: &RenderOptions) -> Vec<String> {
        let name = ObjectName::new(&routine.schema, &routine.name);
        let types = if routine.kind.is_procedure() {
            " AND type in (N'P', N'PC')"
        } else {
            " AND type in (N'FN', N'IF', N'TF', N'FS', N'FT')"
        };

        let mut statements = Self::module_settings(routine.ansi_nulls, routine.quoted_identifier);
        statements.push(Self::guarded(
            format!(
                "IF NOT EXISTS ({})",
                Self::object_exists("sys.objects", &name, types, options)
            ),
            Self::exec_sql(definition.trim()),
            options,
        ));
        statements
    }

    pub fn create_trigger(trigger: &Trigger, definition: &str, options: &RenderOptions) -> Vec<String> {
        let name = ObjectName::new(&trigger.parent.schema, &trigger.name);
        let mut statements = Self::module_settings(trigger.ansi_nulls, trigger.quoted_identifier);
        statements.push(Self::guarded(
            format!(
                "IF NOT EXISTS ({})",
                Self::object_exists("sys.triggers", &name, "", options)
            ),
            Self::exec_sql(definition.trim()),
            options,
        ));
        if trigger.is_disabled {
            statements.push(format!(
                "ALTER TABLE {} DISABLE TRIGGER {}",
                Self::object_ref(&trigger.parent, options),
                Self::quote_ident(&trigger.name)
            ));
        }
        statements
    }

    pub fn create_index(index: &Index, options: &RenderOptions) -> Vec<String> {
        let parent = Self::object_ref(&index.parent, options);
        let name = Self::quote_ident(&index.name);

        let mut create = match index.kind {
            IndexKind::ClusteredColumnstore => {
                format!("CREATE CLUSTERED COLUMNSTORE INDEX {} ON {}", name, parent)
            }
            IndexKind::NonclusteredColumnstore => format!(
                "CREATE NONCLUSTERED COLUMNSTORE INDEX {} ON {} ({})",
                name,
                parent,
                Self::column_list(&index.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>())
            ),
            _ => {
                let unique = if index.is_unique { "UNIQUE " } else { "" };
                let clustering = if index.kind == IndexKind::Clustered {
                    "CLUSTERED"
                } else {
                    "NONCLUSTERED"
                };
                let mut create = format!(
                    "CREATE {}{} INDEX {} ON {} ({})",
                    unique,
                    clustering,
                    name,
                    parent,
                    Self::index_columns(&index.columns)
                );
                if !index.included.is_empty() {
                    create.push_str(&format!(" INCLUDE ({})", Self::column_list(&index.included)));
                }
                create
            }
        };
        if let Some(filter) = &index.filter {
            create.push_str(&format!(" WHERE {}", filter));
        }
        create.push_str(&Self::filegroup_clause(&index.filegroup, options));

        let guard = format!(
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE object_id = OBJECT_ID({}) AND name = {})",
            Self::quote_literal(&parent),
            Self::quote_literal(&index.name)
        );

        let mut statements = vec![Self::guarded(guard, create, options)];
        if index.is_disabled {
            statements.push(format!("ALTER INDEX {} ON {} DISABLE", name, parent));
        }
        statements
    }

    pub fn create_statistic(statistic: &Statistic, options: &RenderOptions) -> String {
        let parent = Self::object_ref(&statistic.parent, options);
        let mut create = format!(
            "CREATE STATISTICS {} ON {}({})",
            Self::quote_ident(&statistic.name),
            parent,
            Self::column_list(&statistic.columns)
        );
        if let Some(filter) = &statistic.filter {
            create.push_str(&format!(" WHERE {}", filter));
        }
        if statistic.no_recompute {
            create.push_str(" WITH NORECOMPUTE");
        }

        let guard = format!(
            "IF NOT EXISTS (SELECT * FROM sys.stats WHERE object_id = OBJECT_ID({}) AND name = {})",
            Self::quote_literal(&parent),
            Self::quote_literal(&statistic.name)
        );
        Self::guarded(guard, create, options)
    }

    fn constraint_exists(
        catalog: &str,
        constraint: &str,
        parent: &ObjectName,
        options: &RenderOptions,
    ) -> String {
        let constraint = ObjectName::new(&parent.schema, constraint);
        format!(
            "SELECT * FROM {} WHERE object_id = OBJECT_ID({}) AND parent_object_id = OBJECT_ID({})",
            catalog,
            Self::quote_literal(&Self::object_ref(&constraint, options)),
            Self::quote_literal(&Self::object_ref(parent, options))
        )
    }

    pub fn add_foreign_key(fk: &ForeignKey, options: &RenderOptions) -> Vec<String> {
        let parent = Self::object_ref(&fk.parent, options);
        let name = Self::quote_ident(&fk.name);
        let check = if fk.is_disabled { "NOCHECK" } else { "CHECK" };
        let exists = Self::constraint_exists("sys.foreign_keys", &fk.name, &fk.parent, options);

        let add = format!(
            "ALTER TABLE {} WITH {} ADD CONSTRAINT {} FOREIGN KEY({})\nREFERENCES {} ({}){}",
            parent,
            check,
            name,
            Self::column_list(&fk.columns),
            Self::object_ref(&fk.references, options),
            Self::column_list(&fk.referenced_columns),
            Self::referential_actions(fk)
        );
        let enable = format!("ALTER TABLE {} {} CONSTRAINT {}", parent, check, name);

        vec![
            Self::guarded(format!("IF NOT EXISTS ({})", exists), add, options),
            Self::guarded(format!("IF EXISTS ({})", exists), enable, options),
        ]
    }

    pub fn add_check_constraint(check: &CheckConstraint, options: &RenderOptions) -> Vec<String> {
        let parent = Self::object_ref(&check.parent, options);
        let name = Self::quote_ident(&check.name);
        let mode = if check.is_disabled { "NOCHECK" } else { "CHECK" };
        let exists =
            Self::constraint_exists("sys.check_constraints", &check.name, &check.parent, options);

        let add = format!(
            "ALTER TABLE {} WITH {} ADD CONSTRAINT {} CHECK {}",
            parent, mode, name, check.definition
        );
        let enable = format!("ALTER TABLE {} {} CONSTRAINT {}", parent, mode, name);

        vec![
            Self::guarded(format!("IF NOT EXISTS ({})", exists), add, options),
            Self::guarded(format!("IF EXISTS ({})", exists), enable, options),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{SchemaObject, StopWord, UserTypeDefinition};
    use crate::test_support::{customers_table, orders_table};

    #[test]
    fn test_quote_ident_escapes_brackets() {
        assert_eq!(DdlGenerator::quote_ident("Order]Lines"), "[Order]]Lines]");
        assert_eq!(DdlGenerator::quote_literal("O'Brien"), "N'O''Brien'");
    }

    #[test]
    fn test_format_type() {
        assert_eq!(
            DdlGenerator::format_type(&SqlType::new("nvarchar").with_length(100)),
            "[nvarchar](50)"
        );
        assert_eq!(
            DdlGenerator::format_type(&SqlType::new("varchar").with_length(-1)),
            "[varchar](max)"
        );
        assert_eq!(
            DdlGenerator::format_type(&SqlType::new("decimal").with_precision(18, 2)),
            "[decimal](18, 2)"
        );
        assert_eq!(
            DdlGenerator::format_type(&SqlType::new("datetime2").with_precision(27, 7)),
            "[datetime2]"
        );
        assert_eq!(
            DdlGenerator::format_type(&SqlType::new("datetime2").with_precision(23, 3)),
            "[datetime2](3)"
        );
        assert_eq!(
            DdlGenerator::format_type(&SqlType::user_defined("dbo", "Phone")),
            "[dbo].[Phone]"
        );
    }

    #[test]
    fn test_create_table_guarded_without_foreign_keys() {
        let sql = DdlGenerator::create_table(&orders_table(), &RenderOptions::structure());
        assert_eq!(sql.len(), 1);
        let create = &sql[0];

        assert!(create.starts_with(
            "IF NOT EXISTS (SELECT * FROM sys.objects WHERE object_id = OBJECT_ID(N'[dbo].[Orders]') AND type in (N'U'))\nBEGIN\nCREATE TABLE [dbo].[Orders](\n"
        ));
        assert!(create.contains("\t[Id] [int] IDENTITY(1,1) NOT NULL"));
        assert!(create.contains("CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id] ASC)"));
        assert!(create.contains("CONSTRAINT [DF_Orders_Placed] DEFAULT (getdate())"));
        assert!(!create.contains("FOREIGN KEY"));
        assert!(!create.contains("CHECK"));
        assert!(create.ends_with("\n)\nEND"));
    }

    #[test]
    fn test_create_table_inline_constraints() {
        let sql = DdlGenerator::create_table(&orders_table(), &RenderOptions::inline());
        let create = &sql[0];
        assert!(create.contains(
            "CONSTRAINT [FK_Orders_Customers] FOREIGN KEY ([CustomerId]) REFERENCES [dbo].[Customers] ([Id]) ON DELETE CASCADE"
        ));
        assert!(create.contains("CONSTRAINT [CK_Orders_Total] CHECK ([Total]>=(0))"));
    }

    #[test]
    fn test_create_table_without_keys() {
        let options = RenderOptions {
            constraints: ConstraintMode::None,
            ..RenderOptions::default()
        };
        let sql = DdlGenerator::create_table(&customers_table(), &options);
        assert!(!sql[0].contains("PRIMARY KEY"));
    }

    #[test]
    fn test_filegroup_clause_follows_options() {
        let mut table = customers_table();
        table.filegroup = Some("DATA".to_string());

        let suppressed = DdlGenerator::create_table(&table, &RenderOptions::structure());
        assert!(!suppressed[0].contains("ON [DATA]"));

        let options = RenderOptions {
            no_file_group: false,
            ..RenderOptions::structure()
        };
        let kept = DdlGenerator::create_table(&table, &options);
        assert!(kept[0].contains(") ON [DATA]"));
    }

    #[test]
    fn test_unqualified_unguarded_table() {
        let options = RenderOptions {
            schema_qualify: false,
            include_if_not_exists: false,
            ..RenderOptions::default()
        };
        let sql = DdlGenerator::create_table(&customers_table(), &options);
        assert!(sql[0].starts_with("CREATE TABLE [Customers](\n"));
    }

    #[test]
    fn test_add_foreign_key() {
        let orders = orders_table();
        let sql = DdlGenerator::add_foreign_key(&orders.foreign_keys[0], &RenderOptions::cross_references());
        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            "IF NOT EXISTS (SELECT * FROM sys.foreign_keys WHERE object_id = OBJECT_ID(N'[dbo].[FK_Orders_Customers]') AND parent_object_id = OBJECT_ID(N'[dbo].[Orders]'))\n\
             ALTER TABLE [dbo].[Orders] WITH CHECK ADD CONSTRAINT [FK_Orders_Customers] FOREIGN KEY([CustomerId])\n\
             REFERENCES [dbo].[Customers] ([Id]) ON DELETE CASCADE"
        );
        assert!(sql[1].ends_with("ALTER TABLE [dbo].[Orders] CHECK CONSTRAINT [FK_Orders_Customers]"));
    }

    #[test]
    fn test_add_disabled_check_constraint() {
        let mut check = orders_table().checks[0].clone();
        check.is_disabled = true;
        let sql = DdlGenerator::add_check_constraint(&check, &RenderOptions::cross_references());
        assert!(sql[0].contains("WITH NOCHECK ADD CONSTRAINT [CK_Orders_Total] CHECK ([Total]>=(0))"));
        assert!(sql[1].ends_with("NOCHECK CONSTRAINT [CK_Orders_Total]"));
    }

    #[test]
    fn test_create_index() {
        let orders = orders_table();
        let sql = DdlGenerator::create_index(&orders.indexes[0], &RenderOptions::attachments());
        assert_eq!(
            sql[0],
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE object_id = OBJECT_ID(N'[dbo].[Orders]') AND name = N'IX_Orders_CustomerId')\n\
             CREATE NONCLUSTERED INDEX [IX_Orders_CustomerId] ON [dbo].[Orders] ([CustomerId] ASC) INCLUDE ([Total])"
        );
    }

    #[test]
    fn test_create_columnstore_index() {
        let mut index = orders_table().indexes[0].clone();
        index.kind = IndexKind::ClusteredColumnstore;
        index.is_disabled = true;
        let sql = DdlGenerator::create_index(&index, &RenderOptions::attachments());
        assert!(sql[0].ends_with("CREATE CLUSTERED COLUMNSTORE INDEX [IX_Orders_CustomerId] ON [dbo].[Orders]"));
        assert_eq!(sql[1], "ALTER INDEX [IX_Orders_CustomerId] ON [dbo].[Orders] DISABLE");
    }

    #[test]
    fn test_create_trigger_wraps_definition() {
        let orders = orders_table();
        let trigger = &orders.triggers[0];
        let sql = DdlGenerator::create_trigger(
            trigger,
            trigger.definition.as_deref().unwrap(),
            &RenderOptions::attachments(),
        );
        assert_eq!(sql[0], "SET ANSI_NULLS ON");
        assert_eq!(sql[1], "SET QUOTED_IDENTIFIER ON");
        assert!(sql[2].starts_with(
            "IF NOT EXISTS (SELECT * FROM sys.triggers WHERE object_id = OBJECT_ID(N'[dbo].[TR_Orders_Audit]'))\nEXEC sys.sp_executesql N'CREATE TRIGGER"
        ));
        assert!(sql[2].contains("N''orders''"));
    }

    #[test]
    fn test_create_statistic() {
        let orders = orders_table();
        let sql = DdlGenerator::create_statistic(&orders.statistics[0], &RenderOptions::attachments());
        assert!(sql.ends_with("CREATE STATISTICS [ST_Orders_Placed] ON [dbo].[Orders]([Placed], [CustomerId]) WITH NORECOMPUTE"));
    }

    #[test]
    fn test_create_schema_uses_dynamic_sql() {
        let schema = Schema {
            name: "sales".to_string(),
            owner: Some("dbo".to_string()),
            is_system: Some(false),
        };
        assert_eq!(
            DdlGenerator::create_schema(&schema, &RenderOptions::containers()),
            "IF NOT EXISTS (SELECT * FROM sys.schemas WHERE name = N'sales')\nEXEC sys.sp_executesql N'CREATE SCHEMA [sales] AUTHORIZATION [dbo]'"
        );
    }

    #[test]
    fn test_create_alias_type() {
        let phone = UserType {
            schema: "dbo".to_string(),
            name: "Phone".to_string(),
            definition: UserTypeDefinition::Alias {
                base: SqlType::new("varchar").with_length(20),
                nullable: false,
            },
            is_system: Some(false),
        };
        let sql = phone.render(&RenderOptions::containers()).unwrap();
        assert!(sql[0].ends_with("CREATE TYPE [dbo].[Phone] FROM [varchar](20) NOT NULL"));
    }

    #[test]
    fn test_create_table_type_keys_are_unnamed() {
        let table_type = TableType {
            schema: "dbo".to_string(),
            name: "OrderIds".to_string(),
            columns: vec![Column::new("Id", SqlType::new("int")).not_null()],
            keys: vec![KeyConstraint::primary_key("PK__OrderIds__3214EC07", &["Id"])],
            is_system: Some(false),
        };
        let sql = DdlGenerator::create_table_type(&table_type, &RenderOptions::containers());
        assert!(sql.contains("CREATE TYPE [dbo].[OrderIds] AS TABLE(\n\t[Id] [int] NOT NULL,\n\tPRIMARY KEY CLUSTERED ([Id] ASC)\n)"));
        assert!(!sql.contains("PK__OrderIds"));
    }

    #[test]
    fn test_fulltext_objects() {
        let catalog = FullTextCatalog {
            name: "ftDocs".to_string(),
            is_default: true,
            accent_sensitive: false,
            filegroup: Some("FT".to_string()),
            is_system: Some(false),
        };
        let sql = DdlGenerator::create_fulltext_catalog(&catalog, &RenderOptions::containers());
        assert!(sql.ends_with("CREATE FULLTEXT CATALOG [ftDocs] WITH ACCENT_SENSITIVITY = OFF AS DEFAULT"));

        let stoplist = FullTextStopList {
            name: "slDocs".to_string(),
            words: vec![StopWord {
                word: "the".to_string(),
                language_id: 1033,
            }],
            is_system: Some(false),
        };
        let sql = DdlGenerator::create_fulltext_stoplist(&stoplist, &RenderOptions::containers());
        assert_eq!(sql[1], "ALTER FULLTEXT STOPLIST [slDocs] ADD N'the' LANGUAGE 1033");
    }

    #[test]
    fn test_create_database() {
        let mut db = Database::new("Shop");
        db.collation = Some("SQL_Latin1_General_CP1_CI_AS".to_string());
        db.compatibility_level = Some(150);
        let sql = DdlGenerator::create_database(&db, &RenderOptions::database());
        assert_eq!(
            sql[0],
            "IF NOT EXISTS (SELECT name FROM sys.databases WHERE name = N'Shop')\nBEGIN\nCREATE DATABASE [Shop]\n COLLATE SQL_Latin1_General_CP1_CI_AS\nEND"
        );
        assert_eq!(sql[1], "ALTER DATABASE [Shop] SET COMPATIBILITY_LEVEL = 150");
    }
}
