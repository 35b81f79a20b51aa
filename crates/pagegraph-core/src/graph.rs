//! The per-build graph: add requests in, one finalized node sequence out.
//!
//! A `PageGraph` and its context are created together at the start of one
//! page build, populated by zero-or-more add requests, finalized exactly
//! once, then discarded. `build` consumes the graph, so "finalize once"
//! is a compile-time property; nothing survives across builds. Everything
//! is synchronous and exclusively owned, so concurrent page builds simply
//! use independent instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::Itertools;
use serde_json::Value;
use tracing::debug;

use crate::errors::{GraphError, GraphResult};
use crate::meta::{MetaInput, ResolvedMeta};
use crate::model::{is_unset, DedupeStrategy, Id, IdReference, Node};
use crate::registry::{NodeDefinition, Registry};
use crate::resolver::node::resolve_node;

/// One resolved node plus its transient bookkeeping. The definition and
/// strategy live here, not on the node, so they never appear in output.
pub struct GraphEntry {
    pub node: Node,
    pub(crate) definition: Arc<NodeDefinition>,
    pub(crate) strategy: DedupeStrategy,
}

impl GraphEntry {
    /// Identity key for deduplication: `@id` when present, else
    /// `(type, alias)`. Identity-less entries always append.
    fn identity_key(&self) -> Option<IdentityKey> {
        if let Some(id) = self.node.id() {
            return Some(IdentityKey::Id(id.clone()));
        }
        self.definition
            .alias
            .as_ref()
            .map(|alias| IdentityKey::TypeAlias(self.definition.type_name.clone(), alias.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityKey {
    Id(Id),
    TypeAlias(String, String),
}

/// Read view over the build's state, threaded through every resolver
/// call. No process-wide singleton holds in-progress graphs.
pub struct GraphContext<'g> {
    pub meta: &'g ResolvedMeta,
    entries: &'g [GraphEntry],
}

impl<'g> GraphContext<'g> {
    /// A context over the meta snapshot alone, before any node exists.
    pub fn detached(meta: &'g ResolvedMeta) -> Self {
        Self { meta, entries: &[] }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|e| &e.node)
    }

    pub fn find_id(&self, id: &Id) -> Option<&Node> {
        self.nodes().find(|n| n.id() == Some(id))
    }

    pub fn find_type(&self, type_name: &str) -> Option<&Node> {
        self.nodes().find(|n| n.has_type(type_name))
    }
}

/// Type-to-identifier index over the finalized set, built once before the
/// root hooks run. Hooks read it to point relations at already-present
/// nodes; first-inserted node of a type wins.
pub struct GraphIndex {
    by_type: BTreeMap<String, Id>,
}

impl GraphIndex {
    fn from_entries(entries: &[GraphEntry]) -> Self {
        let mut by_type = BTreeMap::new();
        for entry in entries {
            let Some(id) = entry.node.id() else { continue };
            by_type
                .entry(entry.definition.type_name.clone())
                .or_insert_with(|| id.clone());
            for type_name in entry.node.types() {
                by_type
                    .entry(type_name.clone())
                    .or_insert_with(|| id.clone());
            }
        }
        Self { by_type }
    }

    pub fn id_of(&self, type_name: &str) -> Option<&Id> {
        self.by_type.get(type_name)
    }

    pub fn id_ref_of(&self, type_name: &str) -> Option<Value> {
        self.id_of(type_name)
            .map(|id| IdReference::new(id.clone()).to_value())
    }
}

/// What a `resolve_root` hook sees: the meta snapshot and the id index.
pub struct RootContext<'g> {
    pub meta: &'g ResolvedMeta,
    pub index: &'g GraphIndex,
}

/// Per-add options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Override the definition's dedupe strategy for this add.
    pub dedupe: Option<DedupeStrategy>,
}

/// The relation handle returned by `add`, usable immediately by
/// subsequent adds in the same build. Later adds never change an already
/// computed identifier; only merge/replace policy governs collisions.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: Option<Id>,
}

impl NodeHandle {
    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn id_ref(&self) -> Option<IdReference> {
        self.id.clone().map(IdReference::from)
    }
}

/// One page build's accumulating graph.
pub struct PageGraph {
    registry: Arc<Registry>,
    meta: ResolvedMeta,
    entries: Vec<GraphEntry>,
    aborted: bool,
}

impl PageGraph {
    /// Start a build: the meta snapshot is resolved once, before the
    /// first add request, and is immutable from here on.
    pub fn new(registry: Arc<Registry>, meta: MetaInput) -> GraphResult<Self> {
        Ok(Self {
            registry,
            meta: meta.resolve()?,
            entries: Vec::new(),
            aborted: false,
        })
    }

    /// Start a build over the built-in type set.
    pub fn with_builtin(meta: MetaInput) -> GraphResult<Self> {
        Self::new(Arc::new(Registry::builtin()), meta)
    }

    pub fn meta(&self) -> &ResolvedMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a node for resolution against the registry entry for `type_name`.
    pub fn add(&mut self, type_name: &str, input: Value) -> GraphResult<NodeHandle> {
        self.add_with(type_name, input, AddOptions::default())
    }

    /// `add` with per-call options. A resolution failure aborts the whole
    /// build: the error is returned attributed to this node, sibling
    /// nodes already in the graph stay uncorrupted, and every further use
    /// of this graph reports `Aborted`.
    pub fn add_with(
        &mut self,
        type_name: &str,
        input: Value,
        options: AddOptions,
    ) -> GraphResult<NodeHandle> {
        if self.aborted {
            return Err(GraphError::Aborted);
        }
        let def = self
            .registry
            .get(type_name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownType {
                type_name: type_name.to_string(),
            })?;

        let ctx = GraphContext {
            meta: &self.meta,
            entries: &self.entries,
        };
        let node = match resolve_node(&def, input, &ctx, &self.registry, true) {
            Ok(node) => node,
            Err(err) => {
                self.aborted = true;
                return Err(err);
            }
        };

        debug!(
            type_name,
            id = node.id().map(Id::as_str),
            "adding node to graph"
        );
        let handle = NodeHandle {
            id: node.id().cloned(),
        };
        self.insert(GraphEntry {
            node,
            strategy: options.dedupe.unwrap_or(def.dedupe),
            definition: def,
        });
        Ok(handle)
    }

    /// Deduplicating insert. No collision appends; a collision merges
    /// when either side asks for it, else the incoming node replaces the
    /// stored one at its original position.
    fn insert(&mut self, entry: GraphEntry) {
        let Some(key) = entry.identity_key() else {
            self.entries.push(entry);
            return;
        };
        let collision = self
            .entries
            .iter()
            .position(|stored| stored.identity_key().as_ref() == Some(&key));
        match collision {
            None => self.entries.push(entry),
            Some(pos) => {
                let stored = &mut self.entries[pos];
                if stored.strategy == DedupeStrategy::Merge
                    || entry.strategy == DedupeStrategy::Merge
                {
                    debug!(?key, pos, "merging node into stored entry");
                    merge_nodes(&mut stored.node, entry.node);
                } else {
                    debug!(?key, pos, "replacing stored entry");
                    self.entries[pos] = entry;
                }
            }
        }
    }

    /// Finalize: run every node's root hook in graph order, strip the
    /// internal bookkeeping, and emit the ordered sequence. Never fails
    /// on content — all validation happened at resolution — only on a
    /// previously aborted build.
    pub fn build(mut self) -> GraphResult<Vec<Value>> {
        if self.aborted {
            return Err(GraphError::Aborted);
        }
        let index = GraphIndex::from_entries(&self.entries);
        let root_ctx = RootContext {
            meta: &self.meta,
            index: &index,
        };
        for entry in self.entries.iter_mut() {
            let GraphEntry {
                node, definition, ..
            } = entry;
            if let Some(hook) = definition.resolve_root.as_ref() {
                hook(node, &root_ctx);
            }
        }
        debug!(nodes = self.entries.len(), "finalized graph");
        Ok(self.entries.iter().map(|e| e.node.to_value()).collect())
    }
}

/// Field-level merge, stored node's values winning on conflict.
fn merge_nodes(existing: &mut Node, mut incoming: Node) {
    for type_name in incoming.types().to_vec() {
        existing.push_type(type_name);
    }
    if existing.id().is_none() {
        if let Some(id) = incoming.id() {
            existing.set_id(id.clone());
        }
    }
    let incoming_props = std::mem::take(incoming.properties_mut());
    for (field, value) in incoming_props {
        match existing.properties_mut().get_mut(&field) {
            Some(stored) => merge_value(stored, value),
            None => {
                existing.set(field, value);
            }
        }
    }
}

/// Deep-merge semantics: recurse into nested mappings with existing-wins
/// at each leaf; any sequence on either side is treated as a relation
/// list (the single side promoted to a one-element list) and concatenated
/// with identity-based dedupe; scalars keep the stored value.
fn merge_value(existing: &mut Value, incoming: Value) {
    if is_unset(existing) {
        *existing = incoming;
        return;
    }
    if is_unset(&incoming) {
        return;
    }
    match (existing, incoming) {
        (Value::Object(stored), Value::Object(new)) => {
            for (field, value) in new {
                match stored.get_mut(&field) {
                    Some(sv) => merge_value(sv, value),
                    None => {
                        stored.insert(field, value);
                    }
                }
            }
        }
        (existing @ Value::Array(_), Value::Array(new)) => {
            let Value::Array(stored) = std::mem::take(existing) else {
                unreachable!()
            };
            *existing = Value::Array(concat_dedupe(stored, new));
        }
        (existing @ Value::Array(_), single) => {
            let Value::Array(stored) = std::mem::take(existing) else {
                unreachable!()
            };
            *existing = Value::Array(concat_dedupe(stored, vec![single]));
        }
        (existing, Value::Array(new)) => {
            let single = std::mem::take(existing);
            *existing = Value::Array(concat_dedupe(vec![single], new));
        }
        // Scalar conflict: existing value wins.
        _ => {}
    }
}

/// Concatenate relation lists, deduplicating by identity: same `@id`, or
/// same whole value for inline entries. First occurrence keeps its slot.
fn concat_dedupe(stored: Vec<Value>, new: Vec<Value>) -> Vec<Value> {
    stored
        .into_iter()
        .chain(new)
        .unique_by(element_identity)
        .collect()
}

fn element_identity(value: &Value) -> String {
    match value.get("@id").and_then(Value::as_str) {
        Some(id) => format!("id:{id}"),
        None => format!("val:{value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaInput;
    use serde_json::json;

    fn graph() -> PageGraph {
        PageGraph::with_builtin(MetaInput::new("https://x.com")).unwrap()
    }

    #[test]
    fn merge_scalar_existing_wins_and_unset_fills() {
        let mut g = graph();
        g.add("WebPage", json!({"name": "First", "description": "kept"}))
            .unwrap();
        g.add("WebPage", json!({"description": "ignored", "keywords": "added"}))
            .unwrap();
        let things = g.build().unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0]["name"], "First");
        assert_eq!(things[0]["description"], "kept");
        assert_eq!(things[0]["keywords"], "added");
    }

    #[test]
    fn replace_keeps_the_stored_position() {
        let mut g = graph();
        g.add("WebPage", json!({"name": "page"})).unwrap();
        g.add("Organization", json!({"name": "Acme", "legalName": "Acme Inc"}))
            .unwrap();
        g.add("Person", json!({"name": "Jane"})).unwrap();
        // Same name, same synthesized id: replace (Organization default).
        g.add("Organization", json!({"name": "Acme"})).unwrap();

        let things = g.build().unwrap();
        assert_eq!(things.len(), 3);
        assert_eq!(things[1]["@type"], "Organization");
        // Full redefinition: the earlier legalName must be gone.
        assert!(things[1].get("legalName").is_none());
    }

    #[test]
    fn merge_override_per_add() {
        let mut g = graph();
        g.add("Organization", json!({"name": "Acme", "legalName": "Acme Inc"}))
            .unwrap();
        g.add_with(
            "Organization",
            json!({"name": "Acme", "slogan": "Ship it"}),
            AddOptions {
                dedupe: Some(DedupeStrategy::Merge),
            },
        )
        .unwrap();
        let things = g.build().unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0]["legalName"], "Acme Inc");
        assert_eq!(things[0]["slogan"], "Ship it");
    }

    #[test]
    fn relation_lists_concatenate_with_identity_dedupe() {
        let mut g = graph();
        g.add(
            "WebPage",
            json!({"sameAs": ["https://a.example", "https://b.example"]}),
        )
        .unwrap();
        g.add(
            "WebPage",
            json!({"sameAs": ["https://b.example", "https://c.example"]}),
        )
        .unwrap();
        let things = g.build().unwrap();
        assert_eq!(
            things[0]["sameAs"],
            json!(["https://a.example", "https://b.example", "https://c.example"])
        );
    }

    #[test]
    fn relation_lists_dedupe_by_id_reference() {
        let mut g = graph();
        g.add("WebPage", json!({"about": [{"@id": "#a"}]})).unwrap();
        g.add("WebPage", json!({"about": [{"@id": "#a"}, {"@id": "#b"}]}))
            .unwrap();
        let things = g.build().unwrap();
        assert_eq!(things[0]["about"], json!([{"@id": "#a"}, {"@id": "#b"}]));
    }

    #[test]
    fn single_relation_values_promote_to_lists_on_merge() {
        let mut g = graph();
        g.add("WebPage", json!({"about": {"@id": "#a"}})).unwrap();
        g.add("WebPage", json!({"about": [{"@id": "#b"}]})).unwrap();
        let things = g.build().unwrap();
        assert_eq!(things[0]["about"], json!([{"@id": "#a"}, {"@id": "#b"}]));
    }

    #[test]
    fn list_relation_values_absorb_a_later_single() {
        let mut g = graph();
        g.add("WebPage", json!({"about": [{"@id": "#a"}]})).unwrap();
        g.add("WebPage", json!({"about": {"@id": "#a"}})).unwrap();
        g.add("WebPage", json!({"about": {"@id": "#b"}})).unwrap();
        let things = g.build().unwrap();
        assert_eq!(things[0]["about"], json!([{"@id": "#a"}, {"@id": "#b"}]));
    }

    #[test]
    fn nested_mappings_merge_with_existing_wins() {
        let mut g = graph();
        g.add(
            "Organization",
            json!({"name": "Acme", "address": {"streetAddress": "1 Main St"}}),
        )
        .unwrap();
        g.add_with(
            "Organization",
            json!({"name": "Acme", "address": {"streetAddress": "2 Other St", "postalCode": "123"}}),
            AddOptions {
                dedupe: Some(DedupeStrategy::Merge),
            },
        )
        .unwrap();
        let things = g.build().unwrap();
        assert_eq!(things[0]["address"]["streetAddress"], "1 Main St");
        assert_eq!(things[0]["address"]["postalCode"], "123");
    }

    #[test]
    fn identity_less_nodes_always_append() {
        let mut registry = Registry::new();
        registry
            .register(crate::registry::NodeDefinition::new("Note"))
            .unwrap();
        let mut g =
            PageGraph::new(Arc::new(registry), MetaInput::new("https://x.com")).unwrap();
        let a = g.add("Note", json!({"text": "one"})).unwrap();
        g.add("Note", json!({"text": "two"})).unwrap();
        assert!(a.id_ref().is_none());
        let things = g.build().unwrap();
        assert_eq!(things.len(), 2);
    }

    #[test]
    fn failed_add_poisons_the_build() {
        let mut g = graph();
        g.add("WebPage", json!({"name": "ok"})).unwrap();
        // Organization requires a name.
        assert!(g.add("Organization", json!({})).is_err());
        assert_eq!(g.add("Person", json!({"name": "Jane"})).unwrap_err(), GraphError::Aborted);
        assert_eq!(g.build().unwrap_err(), GraphError::Aborted);
    }

    #[test]
    fn root_hooks_link_nodes_in_graph_order() {
        let mut g = graph();
        g.add("WebSite", json!({"name": "Acme site"})).unwrap();
        g.add("WebPage", json!({"name": "About"})).unwrap();
        let things = g.build().unwrap();
        assert_eq!(things.len(), 2);
        assert_eq!(
            things[1]["isPartOf"],
            json!({"@id": "https://x.com#website"})
        );
    }

    #[test]
    fn unknown_type_is_reported() {
        let mut g = graph();
        assert_eq!(
            g.add("Nonsense", json!({})).unwrap_err(),
            GraphError::UnknownType {
                type_name: "Nonsense".to_string()
            }
        );
    }
}
