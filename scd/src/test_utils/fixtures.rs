use chrono::NaiveDateTime;

use crate::batch::ChangeBatch;
use crate::conversions::parse_timestamp;
use crate::types::{AttributeColumn, AttributeType, Attributes, Cell, EntitySchema, RawChangeRow};

/// Returns the customer schema used throughout the tests: `customer_id` plus `name`, `email` and
/// `city` text attributes.
pub fn customer_schema() -> EntitySchema {
    EntitySchema::new(
        "customer_id",
        vec![
            AttributeColumn::new("name", AttributeType::Text),
            AttributeColumn::new("email", AttributeType::Text),
            AttributeColumn::new("city", AttributeType::Text),
        ],
    )
    .expect("customer schema is valid")
}

/// Parses a timestamp literal.
pub fn ts(value: &str) -> NaiveDateTime {
    parse_timestamp(value).expect("valid timestamp literal")
}

/// Returns a customer payload; an empty email is stored as null.
pub fn customer(name: &str, email: &str, city: &str) -> Attributes {
    let email = (!email.is_empty()).then_some(email);
    Attributes::new(vec![Cell::from(name), Cell::from(email), Cell::from(city)])
}

/// Builds a staged change row for a customer.
///
/// Audit timestamps are set to the change timestamp, except for deletes which carry none.
pub fn change(
    id: i64,
    op: &str,
    change_ts: &str,
    name: &str,
    email: &str,
    city: &str,
) -> RawChangeRow {
    let mut row = RawChangeRow::new()
        .with("customer_id", id.to_string())
        .with("op", op)
        .with("change_ts", change_ts);

    if !name.is_empty() {
        row = row.with("name", name);
    }
    if !email.is_empty() {
        row = row.with("email", email);
    }
    if !city.is_empty() {
        row = row.with("city", city);
    }
    if op != "D" {
        row = row.with("created_at", change_ts).with("updated_at", change_ts);
    }

    row
}

/// Builds a delete row for a customer.
pub fn delete(id: i64, change_ts: &str) -> RawChangeRow {
    change(id, "D", change_ts, "", "", "")
}

/// Parses rows against the customer schema.
pub fn customer_batch(rows: Vec<RawChangeRow>) -> ChangeBatch {
    ChangeBatch::parse(&customer_schema(), &rows).expect("fixture rows are valid")
}
