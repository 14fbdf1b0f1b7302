//! Catalog fixtures shared by unit tests

use async_trait::async_trait;
use mockall::mock;

use crate::adapter::CatalogAdapter;
use crate::domain::{CollectionKind, FkAction};
use crate::error::Result;
use crate::object::{
    CatalogObject, CheckConstraint, Column, Database, Dependency, ForeignKey, Index, IndexColumn,
    IndexKind, KeyConstraint, ObjectName, Routine, RoutineKind, Schema, SqlType, Statistic, Table,
    Trigger, UserType, UserTypeDefinition, View,
};

mock! {
    pub Catalog {}

    #[async_trait]
    impl CatalogAdapter for Catalog {
        async fn list_databases(&self) -> Result<Vec<Database>>;
        async fn load_collection(&self, database: &str, kind: CollectionKind) -> Result<Vec<CatalogObject>>;
        async fn load_dependencies(&self, database: &str) -> Result<Option<Vec<Dependency>>>;
    }
}

pub fn phone_type() -> UserType {
    UserType {
        schema: "dbo".to_string(),
        name: "Phone".to_string(),
        definition: UserTypeDefinition::Alias {
            base: SqlType::new("varchar").with_length(20),
            nullable: true,
        },
        is_system: Some(false),
    }
}

pub fn customers_table() -> Table {
    let mut table = Table::new("dbo", "Customers");
    table.columns = vec![
        Column::new("Id", SqlType::new("int")).not_null().identity(1, 1),
        Column::new("Name", SqlType::new("nvarchar").with_length(400)).not_null(),
        Column::new("Phone", SqlType::user_defined("dbo", "Phone")),
    ];
    table.keys = vec![KeyConstraint::primary_key("PK_Customers", &["Id"])];
    table.adopt_children();
    table
}

pub fn orders_table() -> Table {
    let mut table = Table::new("dbo", "Orders");
    table.columns = vec![
        Column::new("Id", SqlType::new("int")).not_null().identity(1, 1),
        Column::new("CustomerId", SqlType::new("int")).not_null(),
        Column::new("Placed", SqlType::new("datetime"))
            .not_null()
            .with_default("DF_Orders_Placed", "(getdate())"),
        Column::new("Total", SqlType::new("decimal").with_precision(18, 2)).not_null(),
    ];
    table.keys = vec![KeyConstraint::primary_key("PK_Orders", &["Id"])];
    table.indexes = vec![Index {
        parent: ObjectName::default(),
        name: "IX_Orders_CustomerId".to_string(),
        kind: IndexKind::Nonclustered,
        is_unique: false,
        columns: vec![IndexColumn::asc("CustomerId")],
        included: vec!["Total".to_string()],
        filter: None,
        filegroup: None,
        is_disabled: false,
        is_system: Some(false),
    }];
    table.triggers = vec![Trigger {
        parent: ObjectName::default(),
        name: "TR_Orders_Audit".to_string(),
        definition: Some(
            "CREATE TRIGGER [dbo].[TR_Orders_Audit] ON [dbo].[Orders] AFTER INSERT AS PRINT N'orders'"
                .to_string(),
        ),
        is_disabled: false,
        ansi_nulls: true,
        quoted_identifier: true,
        is_system: Some(false),
    }];
    table.statistics = vec![
        Statistic {
            parent: ObjectName::default(),
            name: "ST_Orders_Placed".to_string(),
            columns: vec!["Placed".to_string(), "CustomerId".to_string()],
            filter: None,
            no_recompute: true,
            is_system: Some(false),
        },
        Statistic {
            parent: ObjectName::default(),
            name: "_WA_Sys_00000004_Orders".to_string(),
            columns: vec!["Total".to_string()],
            filter: None,
            no_recompute: false,
            is_system: Some(true),
        },
    ];
    table.foreign_keys = vec![ForeignKey {
        parent: ObjectName::default(),
        name: "FK_Orders_Customers".to_string(),
        columns: vec!["CustomerId".to_string()],
        references: ObjectName::new("dbo", "Customers"),
        referenced_columns: vec!["Id".to_string()],
        on_delete: FkAction::Cascade,
        on_update: FkAction::NoAction,
        is_disabled: false,
        is_system: Some(false),
    }];
    table.checks = vec![CheckConstraint {
        parent: ObjectName::default(),
        name: "CK_Orders_Total".to_string(),
        definition: "([Total]>=(0))".to_string(),
        is_disabled: false,
        is_system: Some(false),
    }];
    table.adopt_children();
    table
}

pub fn order_totals_view() -> View {
    View {
        schema: "sales".to_string(),
        name: "OrderTotals".to_string(),
        definition: Some(
            "CREATE VIEW [sales].[OrderTotals] AS SELECT CustomerId, SUM(Total) AS Total FROM [dbo].[Orders] GROUP BY CustomerId"
                .to_string(),
        ),
        ansi_nulls: true,
        quoted_identifier: true,
        indexes: vec![],
        triggers: vec![],
        statistics: vec![],
        is_system: Some(false),
    }
}

pub fn get_orders_procedure() -> Routine {
    Routine {
        schema: "dbo".to_string(),
        name: "GetOrders".to_string(),
        kind: RoutineKind::Procedure,
        definition: Some(
            "CREATE PROCEDURE [dbo].[GetOrders] @CustomerId int AS SELECT * FROM [dbo].[Orders] WHERE CustomerId = @CustomerId"
                .to_string(),
        ),
        ansi_nulls: true,
        quoted_identifier: true,
        is_system: Some(false),
    }
}

/// Collections of the `Shop` database. `Orders` is scanned before the
/// `Customers` table it references.
pub fn shop_collection(kind: CollectionKind) -> Vec<CatalogObject> {
    match kind {
        CollectionKind::Schemas => vec![
            CatalogObject::Schema(Schema {
                name: "dbo".to_string(),
                owner: Some("dbo".to_string()),
                is_system: Some(true),
            }),
            CatalogObject::Schema(Schema {
                name: "sales".to_string(),
                owner: Some("dbo".to_string()),
                is_system: Some(false),
            }),
        ],
        CollectionKind::UserDefinedDataTypes => vec![CatalogObject::UserType(phone_type())],
        CollectionKind::Tables => vec![
            CatalogObject::Table(orders_table()),
            CatalogObject::Table(customers_table()),
        ],
        CollectionKind::Views => vec![CatalogObject::View(order_totals_view())],
        CollectionKind::StoredProcedures => vec![CatalogObject::Routine(get_orders_procedure())],
        _ => Vec::new(),
    }
}

/// A catalog double serving the `Shop` database without dependency support
pub fn shop_catalog() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_list_databases()
        .returning(|| Ok(vec![Database::new("Shop")]));
    catalog
        .expect_load_collection()
        .returning(|_, kind| Ok(shop_collection(kind)));
    catalog.expect_load_dependencies().returning(|_| Ok(None));
    catalog
}

/// Position of `needle` in `script`, panicking with the script when absent
pub fn position(script: &str, needle: &str) -> usize {
    script
        .find(needle)
        .unwrap_or_else(|| panic!("{:?} not found in script:\n{}", needle, script))
}
