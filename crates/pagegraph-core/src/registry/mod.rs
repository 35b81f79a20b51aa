//! Per-type resolution behavior, stored as data.
//!
//! A `NodeDefinition` is a strategy table, not virtual dispatch: each
//! behavior slot is an optional callback handle. The registry maps type
//! names to definitions with stable ordering and no global mutable state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::{GraphError, GraphResult};
use crate::graph::{GraphContext, RootContext};
use crate::meta::MetaKey;
use crate::model::{DedupeStrategy, Node};

pub mod builtin;

/// Shorthand-to-canonical conversion for non-mapping input.
pub type CastFn = Box<dyn Fn(Value, &GraphContext<'_>) -> Value + Send + Sync>;

/// Context-computed default fields.
pub type DefaultsFn = Box<dyn Fn(&GraphContext<'_>) -> Map<String, Value> + Send + Sync>;

/// Type-specific post-processing over a resolved node.
pub type ResolveFn = Box<dyn Fn(&mut Node, &GraphContext<'_>) + Send + Sync>;

/// Graph-wide linking hook, run once at finalization in graph order. A
/// hook may add a relation from its own node to another already-present
/// node; it never deletes nodes.
pub type ResolveRootFn = Box<dyn Fn(&mut Node, &RootContext<'_>) + Send + Sync>;

/// Which page address a synthesized identifier is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAnchor {
    /// Site origin: one node of this type per site (`Organization`, ...).
    Host,
    /// Page address: one node of this type per page (`WebPage`, ...).
    Url,
}

/// Identifier synthesis rule for a type.
#[derive(Debug, Clone)]
pub struct IdPrefix {
    pub anchor: IdAnchor,
    /// Fixed fragment such as `#webpage`. When absent, the fragment is
    /// `#/schema/{type-slug}/{key}` with a content-derived key.
    pub fragment: Option<&'static str>,
}

/// One page-metadata inheritance declaration: fill `field` from `meta`
/// only while the field is still unset.
#[derive(Debug, Clone)]
pub struct MetaInherit {
    pub meta: MetaKey,
    pub field: String,
}

impl MetaInherit {
    /// Inherit into the meta key's default field name.
    pub fn same(meta: MetaKey) -> Self {
        Self {
            meta,
            field: meta.default_field().to_string(),
        }
    }

    /// Inherit into a renamed field (`Title` -> `headline`).
    pub fn renamed(meta: MetaKey, field: impl Into<String>) -> Self {
        Self {
            meta,
            field: field.into(),
        }
    }
}

/// Static or context-computed default fields.
pub enum Defaults {
    Static(Map<String, Value>),
    Computed(DefaultsFn),
}

/// A declared relation field and the registry type its values resolve
/// under (shorthand casts need to know their target).
#[derive(Debug, Clone)]
pub struct RelationSpec {
    pub field: String,
    pub target: String,
}

impl RelationSpec {
    pub fn new(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target: target.into(),
        }
    }
}

/// Resolution behavior for one node type.
pub struct NodeDefinition {
    pub type_name: String,
    /// Identity-key fallback for nodes without an `@id`; identity-less
    /// nodes (no alias, no id) always append on insert.
    pub alias: Option<String>,
    pub cast: Option<CastFn>,
    pub id_prefix: Option<IdPrefix>,
    pub inherit_meta: Vec<MetaInherit>,
    pub defaults: Option<Defaults>,
    pub required: Vec<String>,
    pub relations: Vec<RelationSpec>,
    pub resolve: Option<ResolveFn>,
    pub resolve_root: Option<ResolveRootFn>,
    pub dedupe: DedupeStrategy,
}

impl NodeDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            alias: None,
            cast: None,
            id_prefix: None,
            inherit_meta: Vec::new(),
            defaults: None,
            required: Vec::new(),
            relations: Vec::new(),
            resolve: None,
            resolve_root: None,
            dedupe: DedupeStrategy::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn cast(
        mut self,
        cast: impl Fn(Value, &GraphContext<'_>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.cast = Some(Box::new(cast));
        self
    }

    pub fn id_prefix(mut self, anchor: IdAnchor, fragment: Option<&'static str>) -> Self {
        self.id_prefix = Some(IdPrefix { anchor, fragment });
        self
    }

    pub fn inherit(mut self, inherit: MetaInherit) -> Self {
        self.inherit_meta.push(inherit);
        self
    }

    pub fn defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = Some(Defaults::Static(defaults));
        self
    }

    pub fn computed_defaults(
        mut self,
        defaults: impl Fn(&GraphContext<'_>) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.defaults = Some(Defaults::Computed(Box::new(defaults)));
        self
    }

    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn relation(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.push(RelationSpec::new(field, target));
        self
    }

    pub fn resolve(
        mut self,
        resolve: impl Fn(&mut Node, &GraphContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.resolve = Some(Box::new(resolve));
        self
    }

    pub fn resolve_root(
        mut self,
        resolve_root: impl Fn(&mut Node, &RootContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.resolve_root = Some(Box::new(resolve_root));
        self
    }

    pub fn dedupe(mut self, strategy: DedupeStrategy) -> Self {
        self.dedupe = strategy;
        self
    }
}

impl std::fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("type_name", &self.type_name)
            .field("alias", &self.alias)
            .field("id_prefix", &self.id_prefix)
            .field("required", &self.required)
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

/// A registry of node definitions keyed by type name.
///
/// Registration order does not affect resolution; the internal store is a
/// `BTreeMap` so iteration is deterministic.
#[derive(Debug, Default)]
pub struct Registry {
    defs: BTreeMap<String, Arc<NodeDefinition>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Register a definition, rejecting duplicates.
    pub fn register(&mut self, def: NodeDefinition) -> GraphResult<()> {
        if self.defs.contains_key(&def.type_name) {
            return Err(GraphError::DuplicateType {
                type_name: def.type_name.clone(),
            });
        }
        self.defs.insert(def.type_name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<NodeDefinition>> {
        self.defs.get(type_name)
    }

    /// Type names in deterministic order.
    pub fn list_types(&self) -> Vec<String> {
        self.defs.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn register_and_lookup() {
        let mut reg = Registry::new();
        reg.register(NodeDefinition::new("Thing")).unwrap();
        assert!(reg.get("Thing").is_some());
        assert!(reg.get("Other").is_none());
        assert_eq!(reg.list_types(), ["Thing"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = Registry::new();
        reg.register(NodeDefinition::new("Thing")).unwrap();
        let err = reg.register(NodeDefinition::new("Thing")).unwrap_err();
        assert_matches!(err, GraphError::DuplicateType { type_name } if type_name == "Thing");
    }
}
