//! Row operations on the JSON document tables.
//!
//! Filters compile to `json_extract` predicates with bound parameters;
//! column names are validated identifiers, never user text spliced into SQL.

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter};
use serde_json::Value;
use uuid::Uuid;

use alumnet_shared::timefmt;

use crate::database::Database;
use crate::error::{BackendError, Result};
use crate::query::{validate_column, Filter, Patch, Query, Row, Table};

impl Database {
    pub fn select_rows(&self, query: &Query) -> Result<Vec<Row>> {
        let mut sql = format!("SELECT data FROM {}", query.table);
        let mut args = Vec::new();

        if let Some(filter) = &query.filter {
            sql.push_str(" WHERE ");
            compile_filter(filter, &mut sql, &mut args)?;
        }

        match &query.order {
            Some((column, order)) => {
                validate_column(column)?;
                let dir = order.as_sql();
                sql.push_str(&format!(
                    " ORDER BY json_extract(data, '$.{column}') {dir}, rowid {dir}"
                ));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.push(SqlValue::Integer(limit as i64));
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for data in rows {
            out.push(parse_document(&data?)?);
        }
        Ok(out)
    }

    pub fn count_rows(&self, table: Table, filter: Option<&Filter>) -> Result<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut args = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            compile_filter(filter, &mut sql, &mut args)?;
        }
        let n: i64 = self
            .conn()
            .query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Insert a row. The server assigns `created_at`, and `id` unless the
    /// caller supplied one (profiles are keyed by the auth user id).
    pub fn insert_row(&self, table: Table, mut row: Row) -> Result<Row> {
        for key in row.keys() {
            validate_column(key)?;
        }

        let id = match row.get("id") {
            Some(Value::String(s)) => Uuid::parse_str(s)?.to_string(),
            Some(other) => {
                return Err(BackendError::InvalidPatch(format!(
                    "id must be a UUID string, got {other}"
                )))
            }
            None => Uuid::new_v4().to_string(),
        };
        row.insert("id".into(), Value::String(id.clone()));
        row.insert(
            "created_at".into(),
            Value::String(timefmt::format(&Utc::now())),
        );

        let data = serde_json::to_string(&row)?;
        self.conn()
            .execute(
                &format!("INSERT INTO {table} (id, data) VALUES (?1, ?2)"),
                params![id, data],
            )
            .map_err(BackendError::from_write)?;

        tracing::trace!(table = %table, id = %id, "row inserted");
        Ok(row)
    }

    /// Apply a patch to every row matching the filter inside one
    /// transaction. Returns the rows as written.
    pub fn update_rows(&mut self, table: Table, filter: &Filter, patch: &Patch) -> Result<Vec<Row>> {
        patch.validate()?;

        let mut sql = format!("SELECT id, data FROM {table} WHERE ");
        let mut args = Vec::new();
        compile_filter(filter, &mut sql, &mut args)?;
        sql.push_str(" ORDER BY rowid ASC");

        let tx = self.conn_mut().transaction()?;

        let matched: Vec<(String, String)> = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let collected = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            collected
        };

        let mut updated = Vec::with_capacity(matched.len());
        for (id, data) in matched {
            let mut row = parse_document(&data)?;
            patch.apply(&mut row);
            tx.execute(
                &format!("UPDATE {table} SET data = ?1 WHERE id = ?2"),
                params![serde_json::to_string(&row)?, id],
            )?;
            updated.push(row);
        }

        tx.commit()?;
        Ok(updated)
    }
}

fn parse_document(data: &str) -> Result<Row> {
    match serde_json::from_str(data)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidPatch(format!(
            "stored document is not an object: {other}"
        ))),
    }
}

/// Convert a JSON scalar into what `json_extract` returns for it.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn compile_filter(filter: &Filter, sql: &mut String, args: &mut Vec<SqlValue>) -> Result<()> {
    match filter {
        Filter::Eq(column, value) => {
            validate_column(column)?;
            if value.is_null() {
                sql.push_str(&format!("json_extract(data, '$.{column}') IS NULL"));
            } else {
                sql.push_str(&format!("json_extract(data, '$.{column}') = ?"));
                args.push(to_sql(value));
            }
        }
        Filter::Gte(column, value) => {
            validate_column(column)?;
            sql.push_str(&format!("json_extract(data, '$.{column}') >= ?"));
            args.push(to_sql(value));
        }
        Filter::In(column, values) => {
            validate_column(column)?;
            if values.is_empty() {
                sql.push_str("0");
            } else {
                let marks = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("json_extract(data, '$.{column}') IN ({marks})"));
                args.extend(values.iter().map(to_sql));
            }
        }
        Filter::And(parts) | Filter::Or(parts) => {
            let (joiner, empty) = match filter {
                Filter::And(_) => (" AND ", "1"),
                _ => (" OR ", "0"),
            };
            if parts.is_empty() {
                sql.push_str(empty);
                return Ok(());
            }
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                compile_filter(part, sql, args)?;
            }
            sql.push(')');
        }
    }
    Ok(())
}
