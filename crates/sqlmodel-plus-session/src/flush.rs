//! SQL for the statements a flush issues.
//!
//! Every builder returns the SQL text together with positional parameters
//! numbered from 1 in the order they appear.

use sqlmodel_plus_core::{Dialect, FieldInfo, Params, Value};

/// Build an INSERT for one row.
///
/// NULL values are left out for columns the database fills in itself
/// (auto-increment keys and columns with a server default). A row left
/// with no columns becomes `INSERT ... DEFAULT VALUES`.
pub fn insert_statement(
    dialect: Dialect,
    table: &str,
    fields: &[FieldInfo],
    values: &[(&str, Value)],
) -> (String, Params) {
    let table = dialect.quote_identifier(table);
    let (columns, params): (Vec<&str>, Vec<Value>) = values
        .iter()
        .filter(|(col, value)| {
            !(value.is_null()
                && fields
                    .iter()
                    .find(|f| f.column_name == *col)
                    .is_some_and(FieldInfo::is_server_generated))
        })
        .map(|(col, value)| (*col, value.clone()))
        .unzip();

    if columns.is_empty() {
        return (format!("INSERT INTO {table} DEFAULT VALUES"), Params::new());
    }

    let col_list: Vec<String> = columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len())
        .map(|i| dialect.placeholder(i))
        .collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        col_list.join(", "),
        placeholders.join(", ")
    );
    (sql, Params::from(params))
}

/// Build an UPDATE setting every non-key column of one row.
///
/// Returns `None` when the row has nothing besides its key.
pub fn update_statement(
    dialect: Dialect,
    table: &str,
    pk_columns: &[&str],
    values: &[(&str, Value)],
) -> Option<(String, Params)> {
    let mut params = Vec::new();
    let mut set_clauses = Vec::new();
    for (col, value) in values.iter().filter(|(col, _)| !pk_columns.contains(col)) {
        params.push(value.clone());
        set_clauses.push(format!(
            "{} = {}",
            dialect.quote_identifier(col),
            dialect.placeholder(params.len())
        ));
    }
    if set_clauses.is_empty() {
        return None;
    }

    let mut where_clauses = Vec::new();
    for col in pk_columns {
        let value = values
            .iter()
            .find(|(name, _)| name == col)
            .map_or(Value::Null, |(_, v)| v.clone());
        params.push(value);
        where_clauses.push(format!(
            "{} = {}",
            dialect.quote_identifier(col),
            dialect.placeholder(params.len())
        ));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.quote_identifier(table),
        set_clauses.join(", "),
        where_clauses.join(" AND ")
    );
    Some((sql, Params::from(params)))
}

/// Build a DELETE for the row with the given key.
pub fn delete_statement(
    dialect: Dialect,
    table: &str,
    pk_columns: &[&str],
    pk_values: &[Value],
) -> (String, Params) {
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        dialect.quote_identifier(table),
        key_condition(dialect, pk_columns)
    );
    (sql, Params::from(pk_values.to_vec()))
}

/// Build a SELECT for the row with the given key.
pub fn select_by_key(
    dialect: Dialect,
    table: &str,
    pk_columns: &[&str],
    pk_values: &[Value],
) -> (String, Params) {
    let sql = format!(
        "SELECT * FROM {} WHERE {} LIMIT 1",
        dialect.quote_identifier(table),
        key_condition(dialect, pk_columns)
    );
    (sql, Params::from(pk_values.to_vec()))
}

fn key_condition(dialect: Dialect, pk_columns: &[&str]) -> String {
    pk_columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            format!(
                "{} = {}",
                dialect.quote_identifier(col),
                dialect.placeholder(i + 1)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}
