//! Row-store query description.
//!
//! A [`Query`] is transport-neutral: the HTTP implementation encodes it to
//! the REST dialect, and test fakes evaluate it directly against in-memory
//! rows.

use serde_json::{Map, Value};

/// A raw row travelling to or from the store.
pub type Row = Map<String, Value>;

/// A single predicate over one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    /// Column value is one of the given values.
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Disjunction of simple predicates, possibly over different columns
    /// (the `sender is me OR receiver is me OR group is set` shape).
    /// Members must not nest `In` or `Any`.
    Any(Vec<Filter>),
}

impl Filter {
    /// Evaluate against a row. Used by in-memory fakes; the hosted store
    /// evaluates server-side.
    pub fn matches(&self, row: &Row) -> bool {
        let cell = |col: &str| row.get(col).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(col, value) => cell(col) == value,
            Filter::Neq(col, value) => cell(col) != value,
            Filter::In(col, values) => values.contains(cell(col)),
            Filter::IsNull(col) => cell(col).is_null(),
            Filter::NotNull(col) => !cell(col).is_null(),
            Filter::Any(members) => members.iter().any(|member| member.matches(row)),
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filters, ordering and an optional row limit for a `select`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.to_string(), value.into()));
        self
    }

    pub fn one_of(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::NotNull(column.to_string()));
        self
    }

    pub fn any_of(mut self, members: Vec<Filter>) -> Self {
        self.filters.push(Filter::Any(members));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending: true,
        });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending: false,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
