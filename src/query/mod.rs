//! Native queries over a collection.
//!
//! A [`Query`] is a plain description: a collection path, an ordered list of
//! filters and an ordered list of sort orders. Callers build one from generic
//! descriptors with [`translate`]; stores execute it with the helpers in
//! [`eval`].
//!
//! # Example
//!
//! ```ignore
//! let filters = vec![FilterDescriptor::new("age", ">=", vec![json!(18)])];
//! let sorts = vec![SortDescriptor::new("age", "ASC")];
//! let query = translate("users", &filters, &sorts)?;
//! assert_eq!(query.filters[0].op, FilterOp::GreaterThanOrEqual);
//! ```

pub mod eval;
mod translate;

pub use translate::{translate, FilterDescriptor, OperatorDescriptor, SortDescriptor};

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison and containment operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOp {
    /// Parse a wire token such as `>=` or `array-contains`.
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token.trim() {
            "<" => FilterOp::LessThan,
            "<=" => FilterOp::LessThanOrEqual,
            "==" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            ">=" => FilterOp::GreaterThanOrEqual,
            ">" => FilterOp::GreaterThan,
            "array-contains" => FilterOp::ArrayContains,
            "array-contains-any" => FilterOp::ArrayContainsAny,
            "in" => FilterOp::In,
            "not-in" => FilterOp::NotIn,
            _ => return None,
        };
        Some(op)
    }

    pub fn token(&self) -> &'static str {
        match self {
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::GreaterThan => ">",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::ArrayContainsAny => "array-contains-any",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
        }
    }

    /// Operators whose operand is a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            FilterOp::ArrayContainsAny | FilterOp::In | FilterOp::NotIn
        )
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Parse a direction token, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        }
    }
}

/// A single field filter. List operators carry a `Value::Array` operand.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A single sort order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Query over the documents directly inside one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Normalized collection path.
    pub collection: String,
    /// Filters, in application order.
    pub filters: Vec<Filter>,
    /// Sort orders, in precedence order.
    pub orders: Vec<Order>,
}

impl Query {
    /// Unfiltered, unordered query over a collection.
    pub fn collection(path: &str) -> Self {
        Self {
            collection: crate::path::normalize(path),
            filters: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Narrow the query with one more filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Add a sort order with lower precedence than the existing ones.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }
}
