use pg_escape::quote_identifier;
use scd::bail;
use scd::error::{ErrorKind, ScdResult};
use scd::types::{
    AttributeType, CHANGE_TS_COLUMN_NAME, CREATED_AT_COLUMN_NAME, EFFECTIVE_FROM_COLUMN_NAME,
    EFFECTIVE_TO_COLUMN_NAME, EntitySchema, IS_CURRENT_COLUMN_NAME, OPERATION_COLUMN_NAME,
    SURROGATE_KEY_COLUMN_NAME, UPDATED_AT_COLUMN_NAME,
};
use sqlx::PgPool;
use tracing::info;

use crate::error::store_error;

/// Identity column of the stage table, preserving the order in which changes were staged.
pub const STAGE_SEQUENCE_COLUMN_NAME: &str = "stage_seq";

/// Returns the Postgres type used to store an attribute of the given type.
pub fn column_sql_type(data_type: AttributeType) -> &'static str {
    match data_type {
        AttributeType::Text => "text",
        AttributeType::Integer => "bigint",
        AttributeType::Float => "double precision",
        AttributeType::Boolean => "boolean",
        AttributeType::Date => "date",
        AttributeType::Timestamp => "timestamp",
    }
}

/// Location and shape of the stage, SCD1 and SCD2 tables of one deployment.
///
/// Builds every statement the adapter runs. Identifiers are quoted, values are always left to
/// bound parameters.
#[derive(Debug, Clone)]
pub struct ScdTables {
    schema: String,
    stage_table: String,
    scd1_table: String,
    scd2_table: String,
    snapshot_table: Option<String>,
    entity_schema: EntitySchema,
}

impl ScdTables {
    pub fn new(
        schema: impl Into<String>,
        stage_table: impl Into<String>,
        scd1_table: impl Into<String>,
        scd2_table: impl Into<String>,
        entity_schema: EntitySchema,
    ) -> ScdResult<Self> {
        if entity_schema.entity_column() == STAGE_SEQUENCE_COLUMN_NAME
            || entity_schema
                .attribute_columns()
                .iter()
                .any(|column| column.name == STAGE_SEQUENCE_COLUMN_NAME)
        {
            bail!(
                ErrorKind::ConfigError,
                "Column name is reserved by the stage table",
                STAGE_SEQUENCE_COLUMN_NAME
            );
        }

        Ok(Self {
            schema: schema.into(),
            stage_table: stage_table.into(),
            scd1_table: scd1_table.into(),
            scd2_table: scd2_table.into(),
            snapshot_table: None,
            entity_schema,
        })
    }

    /// Sets the source table read by a snapshot load. It lives in the same schema.
    pub fn with_snapshot_table(mut self, snapshot_table: impl Into<String>) -> Self {
        self.snapshot_table = Some(snapshot_table.into());
        self
    }

    pub fn entity_schema(&self) -> &EntitySchema {
        &self.entity_schema
    }

    pub fn stage_table(&self) -> String {
        self.qualified(&self.stage_table)
    }

    pub fn scd1_table(&self) -> String {
        self.qualified(&self.scd1_table)
    }

    pub fn scd2_table(&self) -> String {
        self.qualified(&self.scd2_table)
    }

    pub fn snapshot_table(&self) -> Option<String> {
        self.snapshot_table
            .as_deref()
            .map(|table| self.qualified(table))
    }

    fn qualified(&self, table: &str) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.schema),
            quote_identifier(table)
        )
    }

    fn entity_column(&self) -> String {
        quote_identifier(self.entity_schema.entity_column()).into_owned()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.entity_schema
            .attribute_columns()
            .iter()
            .map(|column| quote_identifier(&column.name).into_owned())
            .collect()
    }

    fn attribute_definitions(&self) -> Vec<String> {
        self.entity_schema
            .attribute_columns()
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column_sql_type(column.data_type)
                )
            })
            .collect()
    }

    pub fn create_schema_sql(&self) -> String {
        format!(
            "create schema if not exists {}",
            quote_identifier(&self.schema)
        )
    }

    pub fn create_scd1_table_sql(&self) -> String {
        let mut columns = vec![format!("{} bigint primary key", self.entity_column())];
        columns.extend(self.attribute_definitions());
        columns.push(format!("{CHANGE_TS_COLUMN_NAME} timestamp not null"));
        columns.push(format!("{CREATED_AT_COLUMN_NAME} timestamp"));
        columns.push(format!("{UPDATED_AT_COLUMN_NAME} timestamp"));

        format!(
            "create table if not exists {} ({})",
            self.scd1_table(),
            columns.join(", ")
        )
    }

    pub fn create_scd2_table_sql(&self) -> String {
        let mut columns = vec![
            format!("{SURROGATE_KEY_COLUMN_NAME} bigint generated always as identity primary key"),
            format!("{} bigint not null", self.entity_column()),
        ];
        columns.extend(self.attribute_definitions());
        columns.push(format!("{EFFECTIVE_FROM_COLUMN_NAME} timestamp not null"));
        columns.push(format!("{EFFECTIVE_TO_COLUMN_NAME} timestamp"));
        columns.push(format!("{IS_CURRENT_COLUMN_NAME} boolean not null"));
        columns.push(format!("{CREATED_AT_COLUMN_NAME} timestamp"));
        columns.push(format!("{UPDATED_AT_COLUMN_NAME} timestamp"));
        columns.push(format!(
            "check ({IS_CURRENT_COLUMN_NAME} = ({EFFECTIVE_TO_COLUMN_NAME} is null))"
        ));
        columns.push(format!(
            "check ({EFFECTIVE_TO_COLUMN_NAME} is null or {EFFECTIVE_TO_COLUMN_NAME} >= {EFFECTIVE_FROM_COLUMN_NAME})"
        ));

        format!(
            "create table if not exists {} ({})",
            self.scd2_table(),
            columns.join(", ")
        )
    }

    /// At most one current version per entity, enforced by the database as well.
    pub fn create_scd2_current_index_sql(&self) -> String {
        let index = quote_identifier(&format!("{}_current_idx", self.scd2_table)).into_owned();
        format!(
            "create unique index if not exists {index} on {} ({}) where {IS_CURRENT_COLUMN_NAME}",
            self.scd2_table(),
            self.entity_column()
        )
    }

    pub fn create_stage_table_sql(&self) -> String {
        let mut columns = vec![
            format!("{STAGE_SEQUENCE_COLUMN_NAME} bigint generated always as identity"),
            format!("{} bigint", self.entity_column()),
        ];
        columns.extend(self.attribute_definitions());
        columns.push(format!("{OPERATION_COLUMN_NAME} text"));
        columns.push(format!("{CHANGE_TS_COLUMN_NAME} timestamp"));
        columns.push(format!("{CREATED_AT_COLUMN_NAME} timestamp"));
        columns.push(format!("{UPDATED_AT_COLUMN_NAME} timestamp"));

        format!(
            "create table if not exists {} ({})",
            self.stage_table(),
            columns.join(", ")
        )
    }

    /// Columns of the stage table that carry change data, in select order.
    pub fn stage_columns(&self) -> Vec<String> {
        let mut columns = vec![self.entity_schema.entity_column().to_string()];
        columns.extend(
            self.entity_schema
                .attribute_columns()
                .iter()
                .map(|column| column.name.clone()),
        );
        columns.extend(
            [
                OPERATION_COLUMN_NAME,
                CHANGE_TS_COLUMN_NAME,
                CREATED_AT_COLUMN_NAME,
                UPDATED_AT_COLUMN_NAME,
            ]
            .map(str::to_string),
        );
        columns
    }

    /// Reads the stage in staging order, every column cast to text.
    pub fn select_stage_sql(&self) -> String {
        let columns = self
            .stage_columns()
            .iter()
            .map(|column| {
                let quoted = quote_identifier(column);
                format!("{quoted}::text as {quoted}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "select {columns} from {} order by {STAGE_SEQUENCE_COLUMN_NAME}",
            self.stage_table()
        )
    }

    /// Inserts one staged row from text parameters, cast to the column types.
    pub fn insert_stage_sql(&self) -> String {
        let mut types = vec!["bigint"];
        types.extend(
            self.entity_schema
                .attribute_columns()
                .iter()
                .map(|column| column_sql_type(column.data_type)),
        );
        types.extend(["text", "timestamp", "timestamp", "timestamp"]);

        let columns = self
            .stage_columns()
            .iter()
            .map(|column| quote_identifier(column).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        let values = types
            .iter()
            .enumerate()
            .map(|(i, data_type)| format!("${}::{data_type}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "insert into {} ({columns}) values ({values})",
            self.stage_table()
        )
    }

    /// Columns read from the snapshot table, in select order.
    pub fn snapshot_columns(&self) -> Vec<String> {
        let mut columns = vec![self.entity_schema.entity_column().to_string()];
        columns.extend(
            self.entity_schema
                .attribute_columns()
                .iter()
                .map(|column| column.name.clone()),
        );
        columns.push(CREATED_AT_COLUMN_NAME.to_string());
        columns.push(UPDATED_AT_COLUMN_NAME.to_string());
        columns
    }

    /// Reads the snapshot table as text, or `None` if no snapshot table is set.
    pub fn select_snapshot_sql(&self) -> Option<String> {
        let table = self.snapshot_table()?;
        let columns = self
            .snapshot_columns()
            .iter()
            .map(|column| {
                let quoted = quote_identifier(column);
                format!("{quoted}::text as {quoted}")
            })
            .collect::<Vec<_>>()
            .join(", ");

        Some(format!(
            "select {columns} from {table} order by {}",
            self.entity_column()
        ))
    }

    pub fn truncate_stage_sql(&self) -> String {
        format!("truncate table {}", self.stage_table())
    }

    fn scd1_columns(&self) -> String {
        let mut columns = vec![self.entity_column()];
        columns.extend(self.attribute_names());
        columns.push(CHANGE_TS_COLUMN_NAME.to_string());
        columns.push(CREATED_AT_COLUMN_NAME.to_string());
        columns.push(UPDATED_AT_COLUMN_NAME.to_string());
        columns.join(", ")
    }

    /// Selects the rows of the entities bound as a `bigint[]` in `$1`.
    pub fn select_scd1_by_ids_sql(&self) -> String {
        format!(
            "select {} from {} where {} = any($1) order by {}",
            self.scd1_columns(),
            self.scd1_table(),
            self.entity_column(),
            self.entity_column()
        )
    }

    pub fn select_all_scd1_sql(&self) -> String {
        format!(
            "select {} from {} order by {}",
            self.scd1_columns(),
            self.scd1_table(),
            self.entity_column()
        )
    }

    pub fn insert_scd1_sql(&self) -> String {
        let placeholders = (1..=self.entity_schema.attribute_count() + 4)
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "insert into {} ({}) values ({placeholders})",
            self.scd1_table(),
            self.scd1_columns()
        )
    }

    /// Overwrites the attributes, bound from `$2`, then `change_ts` and `updated_at`.
    pub fn update_scd1_sql(&self) -> String {
        let attribute_count = self.entity_schema.attribute_count();
        let mut assignments: Vec<String> = self
            .attribute_names()
            .into_iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 2))
            .collect();
        assignments.push(format!(
            "{CHANGE_TS_COLUMN_NAME} = ${}",
            attribute_count + 2
        ));
        assignments.push(format!(
            "{UPDATED_AT_COLUMN_NAME} = ${}",
            attribute_count + 3
        ));

        format!(
            "update {} set {} where {} = $1",
            self.scd1_table(),
            assignments.join(", "),
            self.entity_column()
        )
    }

    pub fn delete_scd1_sql(&self) -> String {
        format!(
            "delete from {} where {} = $1",
            self.scd1_table(),
            self.entity_column()
        )
    }

    fn scd2_columns(&self) -> String {
        let mut columns = vec![SURROGATE_KEY_COLUMN_NAME.to_string(), self.entity_column()];
        columns.extend(self.attribute_names());
        columns.extend(
            [
                EFFECTIVE_FROM_COLUMN_NAME,
                EFFECTIVE_TO_COLUMN_NAME,
                IS_CURRENT_COLUMN_NAME,
                CREATED_AT_COLUMN_NAME,
                UPDATED_AT_COLUMN_NAME,
            ]
            .map(str::to_string),
        );
        columns.join(", ")
    }

    fn scd2_order(&self) -> String {
        format!(
            "{}, {EFFECTIVE_FROM_COLUMN_NAME}, {SURROGATE_KEY_COLUMN_NAME}",
            self.entity_column()
        )
    }

    /// Selects the history of the entities bound as a `bigint[]` in `$1`.
    pub fn select_scd2_by_ids_sql(&self) -> String {
        format!(
            "select {} from {} where {} = any($1) order by {}",
            self.scd2_columns(),
            self.scd2_table(),
            self.entity_column(),
            self.scd2_order()
        )
    }

    pub fn select_current_scd2_sql(&self) -> String {
        format!(
            "select {} from {} where {IS_CURRENT_COLUMN_NAME} order by {}",
            self.scd2_columns(),
            self.scd2_table(),
            self.scd2_order()
        )
    }

    pub fn select_all_scd2_sql(&self) -> String {
        format!(
            "select {} from {} order by {}",
            self.scd2_columns(),
            self.scd2_table(),
            self.scd2_order()
        )
    }

    /// Closes the version keyed by `$1` only if it is still current.
    pub fn close_scd2_sql(&self) -> String {
        format!(
            "update {} set {EFFECTIVE_TO_COLUMN_NAME} = $2, {IS_CURRENT_COLUMN_NAME} = false, \
             {UPDATED_AT_COLUMN_NAME} = coalesce($3, {UPDATED_AT_COLUMN_NAME}) \
             where {SURROGATE_KEY_COLUMN_NAME} = $1 and {IS_CURRENT_COLUMN_NAME}",
            self.scd2_table()
        )
    }

    /// Appends a version; the surrogate key is generated by the identity column.
    pub fn insert_scd2_sql(&self) -> String {
        let mut columns = vec![self.entity_column()];
        columns.extend(self.attribute_names());
        columns.extend(
            [
                EFFECTIVE_FROM_COLUMN_NAME,
                EFFECTIVE_TO_COLUMN_NAME,
                IS_CURRENT_COLUMN_NAME,
                CREATED_AT_COLUMN_NAME,
                UPDATED_AT_COLUMN_NAME,
            ]
            .map(str::to_string),
        );
        let placeholders = (1..=columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "insert into {} ({}) values ({placeholders})",
            self.scd2_table(),
            columns.join(", ")
        )
    }

    pub fn drop_stage_table_sql(&self) -> String {
        format!("drop table if exists {}", self.stage_table())
    }

    pub fn drop_target_tables_sql(&self) -> Vec<String> {
        vec![
            format!("drop table if exists {}", self.scd1_table()),
            format!("drop table if exists {}", self.scd2_table()),
        ]
    }
}

/// Creates the schema, the stage table and both target tables if they do not exist.
pub async fn create_tables(pool: &PgPool, tables: &ScdTables) -> ScdResult<()> {
    let statements = [
        tables.create_schema_sql(),
        tables.create_stage_table_sql(),
        tables.create_scd1_table_sql(),
        tables.create_scd2_table_sql(),
        tables.create_scd2_current_index_sql(),
    ];

    let mut transaction = pool.begin().await.map_err(store_error)?;
    for statement in &statements {
        sqlx::query(statement)
            .execute(&mut *transaction)
            .await
            .map_err(store_error)?;
    }
    transaction.commit().await.map_err(store_error)?;

    info!(
        stage = %tables.stage_table(),
        scd1 = %tables.scd1_table(),
        scd2 = %tables.scd2_table(),
        "created tables"
    );

    Ok(())
}

/// Drops the stage table.
pub async fn drop_stage_table(pool: &PgPool, tables: &ScdTables) -> ScdResult<()> {
    sqlx::query(&tables.drop_stage_table_sql())
        .execute(pool)
        .await
        .map_err(store_error)?;

    Ok(())
}

/// Drops the stage table and both target tables.
pub async fn drop_tables(pool: &PgPool, tables: &ScdTables) -> ScdResult<()> {
    let mut transaction = pool.begin().await.map_err(store_error)?;
    for statement in std::iter::once(tables.drop_stage_table_sql())
        .chain(tables.drop_target_tables_sql())
    {
        sqlx::query(&statement)
            .execute(&mut *transaction)
            .await
            .map_err(store_error)?;
    }
    transaction.commit().await.map_err(store_error)?;

    Ok(())
}
