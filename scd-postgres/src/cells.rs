use chrono::{NaiveDate, NaiveDateTime};
use scd::types::{AttributeType, Attributes, Cell, EntitySchema};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Binds a cell to the next parameter of `query`.
///
/// Nulls are bound with the Postgres type of their column so that untyped `null`s never reach
/// the server.
pub fn bind_cell<'q>(query: PgQuery<'q>, cell: &Cell, data_type: AttributeType) -> PgQuery<'q> {
    match cell {
        Cell::Null => bind_null(query, data_type),
        Cell::Bool(value) => query.bind(*value),
        Cell::I64(value) => query.bind(*value),
        Cell::F64(value) => query.bind(*value),
        Cell::String(value) => query.bind(value.clone()),
        Cell::Date(value) => query.bind(*value),
        Cell::Timestamp(value) => query.bind(*value),
    }
}

fn bind_null(query: PgQuery<'_>, data_type: AttributeType) -> PgQuery<'_> {
    match data_type {
        AttributeType::Text => query.bind(None::<String>),
        AttributeType::Integer => query.bind(None::<i64>),
        AttributeType::Float => query.bind(None::<f64>),
        AttributeType::Boolean => query.bind(None::<bool>),
        AttributeType::Date => query.bind(None::<NaiveDate>),
        AttributeType::Timestamp => query.bind(None::<NaiveDateTime>),
    }
}

/// Binds every attribute in schema order.
pub fn bind_attributes<'q>(
    mut query: PgQuery<'q>,
    schema: &EntitySchema,
    attributes: &Attributes,
) -> PgQuery<'q> {
    for (column, cell) in schema
        .attribute_columns()
        .iter()
        .zip(attributes.values())
    {
        query = bind_cell(query, cell, column.data_type);
    }

    query
}

/// Decodes the column named `column` of `row` as a cell of the given type.
pub fn decode_cell(row: &PgRow, column: &str, data_type: AttributeType) -> sqlx::Result<Cell> {
    let cell = match data_type {
        AttributeType::Text => row.try_get::<Option<String>, _>(column)?.into(),
        AttributeType::Integer => row.try_get::<Option<i64>, _>(column)?.into(),
        AttributeType::Boolean => row.try_get::<Option<bool>, _>(column)?.into(),
        AttributeType::Float => row
            .try_get::<Option<f64>, _>(column)?
            .map_or(Cell::Null, Cell::F64),
        AttributeType::Date => row
            .try_get::<Option<NaiveDate>, _>(column)?
            .map_or(Cell::Null, Cell::Date),
        AttributeType::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(column)?
            .map_or(Cell::Null, Cell::Timestamp),
    };

    Ok(cell)
}

/// Decodes the attribute columns of `row` in schema order.
pub fn decode_attributes(row: &PgRow, schema: &EntitySchema) -> sqlx::Result<Attributes> {
    let values = schema
        .attribute_columns()
        .iter()
        .map(|column| decode_cell(row, &column.name, column.data_type))
        .collect::<sqlx::Result<Vec<_>>>()?;

    Ok(Attributes::new(values))
}
