//! Descriptor to query translation.

use super::{Direction, FilterOp, Query};
use crate::error::{BridgeError, Result};
use crate::path;
use crate::types::Value;
use crate::wire;
use serde::{Deserialize, Serialize};

/// Generic filter as sent by clients: `{field, operator: {type, values}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub field: String,
    pub operator: OperatorDescriptor,
}

impl FilterDescriptor {
    pub fn new(field: &str, op: &str, values: Vec<serde_json::Value>) -> Self {
        Self {
            field: field.to_string(),
            operator: OperatorDescriptor {
                op_type: op.to_string(),
                values,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

/// Generic sort order: `{field, direction}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: String,
    #[serde(alias = "sort")]
    pub direction: String,
}

impl SortDescriptor {
    pub fn new(field: &str, direction: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: direction.to_string(),
        }
    }
}

/// Build a native query from descriptors.
///
/// Filters and sorts are applied in the order given; nothing is merged or
/// reordered. Fails before touching any store.
pub fn translate(
    base_path: &str,
    filters: &[FilterDescriptor],
    sorts: &[SortDescriptor],
) -> Result<Query> {
    if !path::is_collection(base_path) || path::is_root(base_path) {
        return Err(BridgeError::InvalidQuery(format!(
            "not a collection path: {:?}",
            base_path
        )));
    }

    let mut query = Query::collection(base_path);

    for descriptor in filters {
        let field = check_field(&descriptor.field)?;
        let op = FilterOp::from_token(&descriptor.operator.op_type).ok_or_else(|| {
            BridgeError::InvalidQuery(format!(
                "unsupported operator {:?} on field {}",
                descriptor.operator.op_type, field
            ))
        })?;
        let value = operand(field, op, &descriptor.operator.values)?;
        query = query.filter(field, op, value);
    }

    for descriptor in sorts {
        let field = check_field(&descriptor.field)?;
        let direction = Direction::from_token(&descriptor.direction).ok_or_else(|| {
            BridgeError::InvalidQuery(format!(
                "unsupported sort direction {:?} on field {}",
                descriptor.direction, field
            ))
        })?;
        query = query.order_by(field, direction);
    }

    Ok(query)
}

fn check_field(field: &str) -> Result<&str> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(BridgeError::InvalidQuery(format!(
            "invalid field path: {:?}",
            field
        )));
    }
    Ok(field)
}

fn operand(field: &str, op: FilterOp, values: &[serde_json::Value]) -> Result<Value> {
    if op.takes_list() {
        if values.is_empty() {
            return Err(BridgeError::InvalidQuery(format!(
                "operator {} on field {} needs at least one value",
                op, field
            )));
        }
        let items = values.iter().map(scalar).collect::<Result<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }

    match values {
        [single] => scalar(single),
        _ => Err(BridgeError::InvalidQuery(format!(
            "operator {} on field {} takes exactly one value, got {}",
            op,
            field,
            values.len()
        ))),
    }
}

/// Plain JSON scalars, or tagged wire values for the rich types.
fn scalar(raw: &serde_json::Value) -> Result<Value> {
    match raw {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => Ok(wire::number_value(n)),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Object(_) => {
            let tagged: wire::WireValue = serde_json::from_value(raw.clone())
                .map_err(|e| BridgeError::InvalidQuery(format!("bad filter value: {}", e)))?;
            wire::decode_value(&tagged)
                .map_err(|e| BridgeError::InvalidQuery(format!("bad filter value: {}", e)))
        }
        serde_json::Value::Array(_) => Err(BridgeError::InvalidQuery(
            "filter values must be scalars".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use serde_json::json;

    #[test]
    fn test_translate_preserves_order() {
        let filters = vec![
            FilterDescriptor::new("status", "==", vec![json!("active")]),
            FilterDescriptor::new("age", ">=", vec![json!(18)]),
            FilterDescriptor::new("age", "<", vec![json!(65)]),
        ];
        let sorts = vec![
            SortDescriptor::new("age", "DESC"),
            SortDescriptor::new("name", "Ascending"),
        ];

        let query = translate("users", &filters, &sorts).unwrap();
        assert_eq!(query.collection, "users");
        let ops: Vec<_> = query.filters.iter().map(|f| f.op).collect();
        assert_eq!(
            ops,
            vec![FilterOp::Equal, FilterOp::GreaterThanOrEqual, FilterOp::LessThan]
        );
        assert_eq!(query.filters[1].value, Value::Integer(18));
        assert_eq!(query.orders[0].direction, Direction::Descending);
        assert_eq!(query.orders[1].field, "name");
    }

    #[test]
    fn test_list_operators() {
        let filters = vec![FilterDescriptor::new(
            "role",
            "in",
            vec![json!("admin"), json!("owner")],
        )];
        let query = translate("users", &filters, &[]).unwrap();
        assert_eq!(
            query.filters[0].value,
            Value::Array(vec![Value::from("admin"), Value::from("owner")])
        );

        let empty = vec![FilterDescriptor::new("role", "not-in", vec![])];
        assert!(matches!(
            translate("users", &empty, &[]),
            Err(BridgeError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_tagged_filter_value() {
        let filters = vec![FilterDescriptor::new(
            "created",
            ">",
            vec![json!({"kind": "timestamp", "value": {"seconds": 5, "nanoseconds": 7}})],
        )];
        let query = translate("events", &filters, &[]).unwrap();
        assert_eq!(
            query.filters[0].value,
            Value::Timestamp(Timestamp { seconds: 5, nanos: 7 })
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        let bad_op = vec![FilterDescriptor::new("age", "~=", vec![json!(1)])];
        assert!(matches!(
            translate("users", &bad_op, &[]),
            Err(BridgeError::InvalidQuery(_))
        ));

        let two_values = vec![FilterDescriptor::new("age", ">=", vec![json!(1), json!(2)])];
        assert!(translate("users", &two_values, &[]).is_err());

        let bad_sort = vec![SortDescriptor::new("age", "sideways")];
        assert!(translate("users", &[], &bad_sort).is_err());

        let empty_field = vec![FilterDescriptor::new("", "==", vec![json!(1)])];
        assert!(translate("users", &empty_field, &[]).is_err());

        assert!(translate("users/42", &[], &[]).is_err());
        assert!(translate("", &[], &[]).is_err());
    }

    #[test]
    fn test_sort_alias() {
        let sort: SortDescriptor =
            serde_json::from_value(json!({"field": "age", "sort": "ASC"})).unwrap();
        assert_eq!(sort.direction, "ASC");
    }
}
