//! Relation value classification.
//!
//! A relation value is one of:
//! - a primitive shorthand, forwarded to the target type's `cast`
//! - an inline mapping, resolved through the node pipeline
//! - a pointer-by-identifier (`{"@id": ...}` with no other populated field)
//! - an ordered sequence of the above, resolved element-wise
//!
//! An empty sequence omits the field entirely rather than storing an
//! empty list. Classification has no side effects on the graph.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::{GraphError, GraphResult};
use crate::graph::GraphContext;
use crate::model::is_unset;
use crate::registry::{NodeDefinition, Registry};
use crate::resolver::node::resolve_node;

/// Resolve one relation value. `target` is the declared target type's
/// definition, when the field was declared; `declared` distinguishes
/// declared relation fields (strict: primitives must be castable) from
/// opportunistic normalization of open properties (lenient: unknown
/// shapes pass through).
///
/// Returns `None` when the field should be omitted.
pub(crate) fn resolve_relation(
    value: Value,
    owner_type: &str,
    field: &str,
    target: Option<&Arc<NodeDefinition>>,
    declared: bool,
    registry: &Registry,
    ctx: &GraphContext<'_>,
) -> GraphResult<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) =
                    resolve_relation(item, owner_type, field, target, declared, registry, ctx)?
                {
                    out.push(v);
                }
            }
            if out.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Value::Array(out)))
            }
        }
        Value::Object(map) => resolve_mapping(map, owner_type, field, target, registry, ctx),
        primitive => {
            if !declared {
                return Ok(Some(primitive));
            }
            match target {
                Some(def) if def.cast.is_some() => {
                    let node = resolve_node(def, primitive, ctx, registry, false)?;
                    Ok(Some(node.to_value()))
                }
                Some(def) => Err(GraphError::reference(
                    owner_type,
                    field,
                    format!(
                        "type '{}' accepts no shorthand for {primitive}",
                        def.type_name
                    ),
                )),
                None => Err(GraphError::reference(
                    owner_type,
                    field,
                    format!("no registered target type for shorthand {primitive}"),
                )),
            }
        }
    }
}

fn resolve_mapping(
    map: Map<String, Value>,
    owner_type: &str,
    field: &str,
    target: Option<&Arc<NodeDefinition>>,
    registry: &Registry,
    ctx: &GraphContext<'_>,
) -> GraphResult<Option<Value>> {
    if map.is_empty() {
        return Ok(None);
    }

    if is_id_reference(&map) {
        return match map.get("@id") {
            Some(Value::String(id)) if !id.is_empty() => {
                Ok(Some(serde_json::json!({ "@id": id })))
            }
            _ => Err(GraphError::reference(
                owner_type,
                field,
                "id reference without a usable @id".to_string(),
            )),
        };
    }

    // Inline node input: a mapping carrying its own registered @type wins
    // over the declared target.
    let own_type = map
        .get("@type")
        .and_then(first_type)
        .and_then(|t| registry.get(t));

    let def = match own_type.or(target) {
        Some(def) => def,
        // Plain data mapping (an address, an opening-hours block, ...);
        // nothing to resolve it under.
        None => return Ok(Some(Value::Object(map))),
    };

    let node = resolve_node(def, Value::Object(map), ctx, registry, false)?;
    Ok(Some(node.to_value()))
}

/// A mapping holding exactly one populated field, an `@id`.
fn is_id_reference(map: &Map<String, Value>) -> bool {
    map.contains_key("@id") && map.iter().all(|(k, v)| k == "@id" || is_unset(v))
}

fn first_type(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
