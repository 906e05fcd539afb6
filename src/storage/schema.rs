//! Database schema definitions

use crate::value::ValueType;

/// SQL to create the string value table
pub const CREATE_STRING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kvp_string (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// SQL to create the bool value table
pub const CREATE_BOOL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kvp_bool (
    key TEXT PRIMARY KEY,
    value BOOLEAN
)
"#;

/// SQL to create the float value table
pub const CREATE_FLOAT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kvp_float (
    key TEXT PRIMARY KEY,
    value REAL
)
"#;

/// SQL to create the int value table
pub const CREATE_INT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kvp_int (
    key TEXT PRIMARY KEY,
    value INTEGER
)
"#;

/// Name of the file identity table. Outside the `kvp_` namespace so
/// enumeration never sees it.
pub const METADATA_TABLE: &str = "sqlitedatastore_metadata";

/// SQL to create the metadata table
pub const CREATE_METADATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sqlitedatastore_metadata (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts: Vec<&'static str> = ValueType::all()
        .iter()
        .map(|ty| create_table_statement(*ty))
        .collect();
    stmts.push(CREATE_METADATA_TABLE);
    stmts
}

/// Creation statement for the table backing `ty`
pub fn create_table_statement(ty: ValueType) -> &'static str {
    match ty {
        ValueType::String => CREATE_STRING_TABLE,
        ValueType::Bool => CREATE_BOOL_TABLE,
        ValueType::Float => CREATE_FLOAT_TABLE,
        ValueType::Int => CREATE_INT_TABLE,
    }
}

/// Single-row lookup for `ty`
pub fn select_value_sql(ty: ValueType) -> String {
    format!("SELECT value FROM {} WHERE key = ?1", ty.table_name())
}

/// Upsert keyed on `key` for `ty`
pub fn upsert_value_sql(ty: ValueType) -> String {
    format!(
        "INSERT INTO {} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        ty.table_name()
    )
}

/// Delete by key for `ty`
pub fn delete_value_sql(ty: ValueType) -> String {
    format!("DELETE FROM {} WHERE key = ?1", ty.table_name())
}

/// Single-row lookup in the metadata table
pub fn select_metadata_sql() -> String {
    format!("SELECT value FROM {} WHERE key = ?1", METADATA_TABLE)
}

/// Upsert into the metadata table
pub fn upsert_metadata_sql() -> String {
    format!(
        "INSERT INTO {} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        METADATA_TABLE
    )
}
