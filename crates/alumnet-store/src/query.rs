//! Table queries, filters and partial updates.
//!
//! Rows are JSON objects. Filters are evaluated by the backend for
//! `select`/`count`/`update` and by the change feed when deciding whether an
//! event reaches a subscriber, so [`Filter::matches`] must agree with the
//! SQL the local backend generates.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BackendError, Result};

pub type Row = serde_json::Map<String, Value>;

/// Tables known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Connections,
    Messages,
    Notifications,
    Events,
    EventAttendees,
    Mentorships,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Profiles,
        Table::Connections,
        Table::Messages,
        Table::Notifications,
        Table::Events,
        Table::EventAttendees,
        Table::Mentorships,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Connections => "connections",
            Table::Messages => "messages",
            Table::Notifications => "notifications",
            Table::Events => "events",
            Table::EventAttendees => "event_attendees",
            Table::Mentorships => "mentorships",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject anything that is not a plain lowercase identifier.
pub fn validate_column(column: &str) -> Result<()> {
    let mut chars = column.chars();
    let valid_first = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(BackendError::InvalidColumn(column.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Serialize) -> Self {
        Filter::Eq(column.to_string(), to_value(value))
    }

    pub fn gte(column: &str, value: impl Serialize) -> Self {
        Filter::Gte(column.to_string(), to_value(value))
    }

    pub fn is_in<T: Serialize>(column: &str, values: impl IntoIterator<Item = T>) -> Self {
        Filter::In(column.to_string(), values.into_iter().map(to_value).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// Check every column name in the filter tree.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::In(c, _) => validate_column(c),
            Filter::And(parts) | Filter::Or(parts) => parts.iter().try_for_each(Filter::validate),
        }
    }

    /// Evaluate the filter against a row in memory. A missing column is
    /// treated as `null`.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(c, v) => json_eq(row.get(c).unwrap_or(&Value::Null), v),
            Filter::Gte(c, v) => matches!(
                compare(row.get(c).unwrap_or(&Value::Null), v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::In(c, vs) => {
                let actual = row.get(c).unwrap_or(&Value::Null);
                !actual.is_null() && vs.iter().any(|v| json_eq(actual, v))
            }
            Filter::And(parts) => parts.iter().all(|f| f.matches(row)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(row)),
        }
    }
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// A `select` against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filter: Option<Filter>,
    pub order: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filter: None,
            order: None,
            limit: None,
        }
    }

    /// Add a filter. Repeated calls are combined with `AND`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Fields to set on every matched row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(Row);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &str, value: impl Serialize) -> Self {
        self.0.insert(column.to_string(), to_value(value));
        self
    }

    /// Build a patch from a serializable struct, e.g. a profile update.
    pub fn from_struct<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(to_row(value)?))
    }

    pub fn fields(&self) -> &Row {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Columns and server-owned fields are checked before anything is
    /// written.
    pub fn validate(&self) -> Result<()> {
        for key in self.0.keys() {
            validate_column(key)?;
            if key == "id" || key == "created_at" {
                return Err(BackendError::InvalidPatch(format!("{key} is assigned by the server")));
            }
        }
        Ok(())
    }

    pub fn apply(&self, row: &mut Row) {
        for (k, v) in &self.0 {
            row.insert(k.clone(), v.clone());
        }
    }
}

/// Serialize a record into a row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidPatch(format!("expected an object, got {other}"))),
    }
}

/// Deserialize a row into a record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
