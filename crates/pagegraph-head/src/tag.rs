//! Head-tag model and JSON-LD script rendering.
//!
//! The finalized node sequence is serialized as exactly one
//! `application/ld+json` script tag wrapping a `@graph`. Prop
//! normalization follows the head-tag conventions: boolean attributes
//! collapse to presence, falsy non-data attributes are dropped, and
//! `data-*` attributes keep verbose `"true"`/`"false"` strings.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// The vocabulary base every emitted graph declares.
pub const SCHEMA_ORG_CONTEXT: &str = "https://schema.org";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to serialize graph: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where a rendered tag is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TagPosition {
    #[default]
    Head,
    BodyClose,
}

/// One renderable head tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadTag {
    pub tag: String,
    pub props: Map<String, Value>,
    pub inner_html: Option<String>,
    pub position: TagPosition,
}

/// Render a finalized node sequence into one script tag.
pub fn render_graph(things: &[Value]) -> Result<HeadTag, RenderError> {
    render_graph_at(things, TagPosition::default())
}

/// `render_graph` with an explicit injection position.
pub fn render_graph_at(things: &[Value], position: TagPosition) -> Result<HeadTag, RenderError> {
    let payload = json!({
        "@context": SCHEMA_ORG_CONTEXT,
        "@graph": things,
    });
    let inner_html = serde_json::to_string(&payload)?;
    debug!(nodes = things.len(), "rendered structured-data script tag");

    let mut props = Map::new();
    props.insert("type".to_string(), json!("application/ld+json"));
    Ok(HeadTag {
        tag: "script".to_string(),
        props,
        inner_html: Some(inner_html),
        position,
    })
}

/// Normalize tag props in place.
///
/// - `true` (or `"true"`, or an empty string) becomes boolean presence
/// - falsy values (`false`, null) drop the prop entirely; the string
///   `"false"` is truthy and survives
/// - `data-*` props opt for verbose syntax instead: `"true"`/`"false"`
///   strings survive
pub fn normalise_props(props: &mut Map<String, Value>) {
    let keys: Vec<String> = props.keys().cloned().collect();
    for key in keys {
        let is_data_key = key.starts_with("data-");
        let Some(value) = props.get(&key) else { continue };
        match value {
            Value::Bool(true) => {
                if is_data_key {
                    props.insert(key, json!("true"));
                }
            }
            Value::String(s) if s == "true" || s.is_empty() => {
                let normalized = if is_data_key { json!("true") } else { json!(true) };
                props.insert(key, normalized);
            }
            Value::Bool(false) | Value::Null => {
                if is_data_key {
                    props.insert(key, json!("false"));
                } else {
                    props.remove(&key);
                }
            }
            // A "false" string is truthy and passes through untouched,
            // for data and non-data props alike.
            _ => {}
        }
    }
}
