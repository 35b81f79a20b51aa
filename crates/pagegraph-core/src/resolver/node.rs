//! The node resolution pipeline.
//!
//! One raw input becomes a fully-formed node through a fixed step order:
//! cast, meta inheritance, defaults merge, identity assignment, type
//! resolve hook, relation recursion, required check. Resolution is a
//! pure function of
//! (definition, input, context): re-resolving the logically same node in
//! one build yields the same identifier.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::errors::{GraphError, GraphResult};
use crate::graph::GraphContext;
use crate::model::key::{node_key, type_slug};
use crate::model::{Id, Node};
use crate::registry::{Defaults, IdAnchor, NodeDefinition, Registry};
use crate::resolver::relation::resolve_relation;

/// Resolve one raw input under `def`. `root` marks a top-level add
/// request: only root nodes get synthesized identifiers; inline relation
/// nodes keep explicit `@id`s only.
pub(crate) fn resolve_node(
    def: &Arc<NodeDefinition>,
    input: Value,
    ctx: &GraphContext<'_>,
    registry: &Registry,
    root: bool,
) -> GraphResult<Node> {
    // 1. Cast: non-mapping input converts via the type's cast or fails.
    let mut node = cast_input(def, input, ctx)?;

    // 2. Meta inheritance: fills fields the input left unset. Running
    //    before the defaults merge keeps the precedence order
    //    explicit input > inherited meta > defaults.
    for inh in &def.inherit_meta {
        if !node.is_set(&inh.field) {
            if let Some(value) = ctx.meta.get(inh.meta) {
                node.set(inh.field.clone(), Value::String(value.to_string()));
            }
        }
    }

    // 3. Defaults merge: fill still-unset fields, statically or from
    //    context.
    match &def.defaults {
        Some(Defaults::Static(map)) => apply_defaults(&mut node, map),
        Some(Defaults::Computed(compute)) => apply_defaults(&mut node, &compute(ctx)),
        None => {}
    }

    if node.types().is_empty() {
        node.push_type(def.type_name.clone());
    }

    // 4. Identity assignment.
    if let Some(id) = node.id() {
        if id.is_fragment() {
            let anchored = id.anchored_to(&ctx.meta.host);
            node.set_id(anchored);
        }
    } else if root {
        if let Some(prefix) = &def.id_prefix {
            let id = synthesize_id(def, prefix.anchor, prefix.fragment, &node, ctx)?;
            node.set_id(id);
        }
    }

    // 5. Type resolve hook.
    if let Some(resolve) = &def.resolve {
        resolve(&mut node, ctx);
    }

    // 6. Relation recursion: declared relation fields strictly, then
    //    opportunistic normalization of open mapping/sequence values.
    for rel in &def.relations {
        if let Some(value) = node.remove(&rel.field) {
            let resolved = resolve_relation(
                value,
                &def.type_name,
                &rel.field,
                registry.get(&rel.target),
                true,
                registry,
                ctx,
            )?;
            if let Some(value) = resolved {
                node.set(rel.field.clone(), value);
            }
        }
    }
    normalize_open_relations(def, &mut node, registry, ctx)?;

    // 7. Required check.
    for field in &def.required {
        if !node.is_set(field) {
            return Err(GraphError::validation(&def.type_name, field));
        }
    }

    trace!(
        type_name = %def.type_name,
        id = node.id().map(Id::as_str),
        root,
        "resolved node"
    );
    Ok(node)
}

fn cast_input(
    def: &NodeDefinition,
    input: Value,
    ctx: &GraphContext<'_>,
) -> GraphResult<Node> {
    let map = match input {
        Value::Object(map) => map,
        other => {
            let cast = def.cast.as_ref().ok_or_else(|| GraphError::shape(&def.type_name))?;
            match cast(other, ctx) {
                Value::Object(map) => map,
                _ => return Err(GraphError::shape(&def.type_name)),
            }
        }
    };
    Node::from_object(map)
        .map_err(|(field, detail)| GraphError::reference(&def.type_name, field, detail))
}

fn apply_defaults(node: &mut Node, defaults: &Map<String, Value>) {
    for (field, value) in defaults {
        match field.as_str() {
            "@type" => {
                if node.types().is_empty() {
                    match value {
                        Value::String(s) => node.push_type(s.clone()),
                        Value::Array(items) => {
                            for item in items.iter().filter_map(Value::as_str) {
                                node.push_type(item.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            "@id" => {
                if node.id().is_none() {
                    if let Some(id) = value.as_str() {
                        node.set_id(Id::new(id));
                    }
                }
            }
            _ => {
                node.set_default(field.clone(), value.clone());
            }
        }
    }
}

/// `{host-or-url}#/schema/{type-slug}/{key}`, or a fixed fragment. The
/// key is a pure function of (type, identity seed).
fn synthesize_id(
    def: &NodeDefinition,
    anchor: IdAnchor,
    fragment: Option<&'static str>,
    node: &Node,
    ctx: &GraphContext<'_>,
) -> GraphResult<Id> {
    let base = match anchor {
        IdAnchor::Host => ctx.meta.host.clone(),
        IdAnchor::Url => match node.get_str("url") {
            Some(url) => ctx.meta.absolutize(url)?,
            None => ctx.meta.url.clone(),
        },
    };
    let fragment = match fragment {
        Some(fixed) => fixed.to_string(),
        None => {
            let slug = type_slug(&def.type_name);
            format!("#/schema/{slug}/{}", node_key(&slug, &identity_seed(node)))
        }
    };
    Ok(Id::new(format!("{base}{fragment}")))
}

/// The content the hashed id key derives from: the most identifying
/// simple field when present, else the full canonical serialization.
fn identity_seed(node: &Node) -> String {
    if let Some(name) = node.get_str("name") {
        return name.to_string();
    }
    if let Some(url) = node.get_str("url") {
        return url.to_string();
    }
    node.to_value().to_string()
}

fn normalize_open_relations(
    def: &NodeDefinition,
    node: &mut Node,
    registry: &Registry,
    ctx: &GraphContext<'_>,
) -> GraphResult<()> {
    let open_fields: Vec<String> = node
        .properties()
        .iter()
        .filter(|(field, value)| {
            !def.relations.iter().any(|r| &r.field == *field)
                && matches!(value, Value::Object(_) | Value::Array(_))
        })
        .map(|(field, _)| field.clone())
        .collect();

    for field in open_fields {
        let Some(value) = node.remove(&field) else {
            continue;
        };
        let resolved =
            resolve_relation(value, &def.type_name, &field, None, false, registry, ctx)?;
        if let Some(value) = resolved {
            node.set(field, value);
        }
    }
    Ok(())
}
