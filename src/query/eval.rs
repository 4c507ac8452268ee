//! Query execution semantics.
//!
//! Comparison filters only match values of the same type class, documents
//! lacking a filtered or ordered field are excluded, and ties between sort
//! keys are broken by document path in the direction of the last order.

use super::{Direction, Filter, FilterOp, Query};
use crate::path;
use crate::types::{DocumentSnapshot, Fields, Value};
use std::cmp::Ordering;

/// Look up a dotted field path (`address.city`) inside nested maps.
pub fn field_value<'a>(fields: &'a Fields, field_path: &str) -> Option<&'a Value> {
    let mut parts = field_path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        match current {
            Value::Map(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

impl Filter {
    /// Whether a document's fields satisfy this filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        let value = match field_value(fields, &self.field) {
            Some(v) => v,
            None => return false,
        };

        match self.op {
            FilterOp::Equal => value.equals(&self.value),
            FilterOp::NotEqual => !matches!(value, Value::Null) && !value.equals(&self.value),
            FilterOp::LessThan => ordered(value, &self.value, |o| o == Ordering::Less),
            FilterOp::LessThanOrEqual => ordered(value, &self.value, |o| o != Ordering::Greater),
            FilterOp::GreaterThan => ordered(value, &self.value, |o| o == Ordering::Greater),
            FilterOp::GreaterThanOrEqual => ordered(value, &self.value, |o| o != Ordering::Less),
            FilterOp::ArrayContains => match value {
                Value::Array(items) => items.iter().any(|item| item.equals(&self.value)),
                _ => false,
            },
            FilterOp::ArrayContainsAny => match value {
                Value::Array(items) => items
                    .iter()
                    .any(|item| operand_list(&self.value).iter().any(|c| item.equals(c))),
                _ => false,
            },
            FilterOp::In => operand_list(&self.value).iter().any(|c| value.equals(c)),
            FilterOp::NotIn => {
                !matches!(value, Value::Null)
                    && !operand_list(&self.value).iter().any(|c| value.equals(c))
            }
        }
    }
}

fn ordered(value: &Value, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    value.same_type_class(operand) && accept(value.compare(operand))
}

fn operand_list(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

impl Query {
    /// True if the document lives directly in the queried collection.
    pub fn contains_path(&self, document_path: &str) -> bool {
        path::is_document(document_path)
            && path::parent(document_path).as_deref() == Some(self.collection.as_str())
    }

    /// Whether an existing document belongs to the result set.
    pub fn matches(&self, document: &DocumentSnapshot) -> bool {
        let fields = match &document.fields {
            Some(f) => f,
            None => return false,
        };
        if !self.contains_path(&document.path) {
            return false;
        }
        self.filters.iter().all(|f| f.matches(fields))
            && self
                .orders
                .iter()
                .all(|o| field_value(fields, &o.field).is_some())
    }

    /// Result ordering between two matching documents.
    pub fn compare(&self, a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
        let empty = Fields::new();
        let fa = a.fields.as_ref().unwrap_or(&empty);
        let fb = b.fields.as_ref().unwrap_or(&empty);

        for order in &self.orders {
            let ord = match (field_value(fa, &order.field), field_value(fb, &order.field)) {
                (Some(x), Some(y)) => x.compare(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = apply_direction(ord, order.direction);
            if ord != Ordering::Equal {
                return ord;
            }
        }

        let last = self
            .orders
            .last()
            .map(|o| o.direction)
            .unwrap_or(Direction::Ascending);
        apply_direction(path::segments(&a.path).cmp(path::segments(&b.path)), last)
    }

    /// Filter and sort candidate documents into the query result.
    pub fn execute<I>(&self, candidates: I) -> Vec<DocumentSnapshot>
    where
        I: IntoIterator<Item = DocumentSnapshot>,
    {
        let mut result: Vec<DocumentSnapshot> =
            candidates.into_iter().filter(|d| self.matches(d)).collect();
        result.sort_by(|a, b| self.compare(a, b));
        result
    }
}

fn apply_direction(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}
