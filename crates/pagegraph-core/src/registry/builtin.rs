//! Built-in node definitions.
//!
//! The core vocabulary for page structured data: the site, the page, the
//! identity behind it, people, images, and articles. Each definition is
//! plain data in the registry's strategy table; custom types register
//! alongside them.
//!
//! Identity conventions:
//! - one-per-site types anchor to the host with a fixed fragment
//!   (`{host}#website`)
//! - one-per-page types anchor to the page address (`{url}#webpage`)
//! - multi-instance types get `{host}#/schema/{slug}/{key}` with a
//!   content-derived key

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::graph::{GraphContext, RootContext};
use crate::meta::MetaKey;
use crate::model::{DedupeStrategy, Node};
use crate::registry::{IdAnchor, MetaInherit, NodeDefinition, Registry};

impl Registry {
    /// The registry of built-in definitions.
    pub fn builtin() -> Self {
        let mut defs = BTreeMap::new();
        for def in [
            web_site(),
            web_page(),
            organization(),
            person(),
            image_object(),
            article(),
        ] {
            defs.insert(def.type_name.clone(), Arc::new(def));
        }
        Self { defs }
    }
}

fn name_shorthand(input: Value, _ctx: &GraphContext<'_>) -> Value {
    match input {
        Value::String(name) => json!({ "name": name }),
        other => other,
    }
}

fn web_site() -> NodeDefinition {
    NodeDefinition::new("WebSite")
        .alias("website")
        .cast(name_shorthand)
        .id_prefix(IdAnchor::Host, Some("#website"))
        .computed_defaults(|ctx: &GraphContext<'_>| {
            let mut defaults = Map::new();
            defaults.insert("@type".to_string(), json!("WebSite"));
            defaults.insert("url".to_string(), json!(ctx.meta.host));
            defaults
        })
        .inherit(MetaInherit::same(MetaKey::Language))
        .required("name")
        .relation("publisher", "Organization")
        .dedupe(DedupeStrategy::Merge)
}

fn web_page() -> NodeDefinition {
    NodeDefinition::new("WebPage")
        .alias("webpage")
        .cast(name_shorthand)
        .id_prefix(IdAnchor::Url, Some("#webpage"))
        .computed_defaults(|ctx: &GraphContext<'_>| {
            let mut defaults = Map::new();
            defaults.insert("@type".to_string(), json!("WebPage"));
            defaults.insert("url".to_string(), json!(ctx.meta.url));
            defaults
        })
        .inherit(MetaInherit::renamed(MetaKey::Title, "name"))
        .inherit(MetaInherit::same(MetaKey::Description))
        .inherit(MetaInherit::same(MetaKey::Language))
        .inherit(MetaInherit::same(MetaKey::DatePublished))
        .inherit(MetaInherit::same(MetaKey::DateModified))
        .relation("primaryImageOfPage", "ImageObject")
        .relation("isPartOf", "WebSite")
        .relation("author", "Person")
        .resolve(absolutize_url)
        .resolve_root(|node: &mut Node, ctx: &RootContext<'_>| {
            if let Some(site) = ctx.index.id_ref_of("WebSite") {
                node.set_default("isPartOf", site);
            }
            if let Some(image) = ctx.index.id_ref_of("ImageObject") {
                node.set_default("primaryImageOfPage", image);
            }
        })
        .dedupe(DedupeStrategy::Merge)
}

fn organization() -> NodeDefinition {
    NodeDefinition::new("Organization")
        .cast(name_shorthand)
        .id_prefix(IdAnchor::Host, None)
        .computed_defaults(|ctx: &GraphContext<'_>| {
            let mut defaults = Map::new();
            defaults.insert("@type".to_string(), json!("Organization"));
            defaults.insert("url".to_string(), json!(ctx.meta.host));
            defaults
        })
        .required("name")
        .relation("logo", "ImageObject")
}

fn person() -> NodeDefinition {
    NodeDefinition::new("Person")
        .cast(name_shorthand)
        .id_prefix(IdAnchor::Host, None)
        .defaults(static_type("Person"))
        .required("name")
        .relation("image", "ImageObject")
}

fn image_object() -> NodeDefinition {
    NodeDefinition::new("ImageObject")
        .cast(|input: Value, _ctx: &GraphContext<'_>| match input {
            Value::String(url) => json!({ "url": url }),
            other => other,
        })
        .id_prefix(IdAnchor::Host, None)
        .defaults(static_type("ImageObject"))
        .inherit(MetaInherit::same(MetaKey::Language))
        .required("url")
        .resolve(|node: &mut Node, ctx: &GraphContext<'_>| {
            absolutize_url(node, ctx);
            if let Some(url) = node.get_str("url").map(str::to_string) {
                node.set_default("contentUrl", json!(url));
            }
        })
}

fn article() -> NodeDefinition {
    NodeDefinition::new("Article")
        .alias("article")
        .cast(|input: Value, _ctx: &GraphContext<'_>| match input {
            Value::String(headline) => json!({ "headline": headline }),
            other => other,
        })
        .id_prefix(IdAnchor::Url, Some("#article"))
        .defaults(static_type("Article"))
        .inherit(MetaInherit::renamed(MetaKey::Title, "headline"))
        .inherit(MetaInherit::same(MetaKey::Description))
        .inherit(MetaInherit::same(MetaKey::Language))
        .inherit(MetaInherit::same(MetaKey::Image))
        .inherit(MetaInherit::same(MetaKey::DatePublished))
        .inherit(MetaInherit::same(MetaKey::DateModified))
        .relation("author", "Person")
        .relation("publisher", "Organization")
        .relation("image", "ImageObject")
        .resolve(|node: &mut Node, _ctx: &GraphContext<'_>| {
            if !node.is_set("dateModified") {
                if let Some(published) = node.get_str("datePublished").map(str::to_string) {
                    node.set("dateModified", json!(published));
                }
            }
        })
        .resolve_root(|node: &mut Node, ctx: &RootContext<'_>| {
            if let Some(page) = ctx.index.id_ref_of("WebPage") {
                node.set_default("isPartOf", page.clone());
                node.set_default("mainEntityOfPage", page);
            }
        })
}

fn static_type(type_name: &str) -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("@type".to_string(), json!(type_name));
    defaults
}

fn absolutize_url(node: &mut Node, ctx: &GraphContext<'_>) {
    let Some(url) = node.get_str("url").map(str::to_string) else {
        return;
    };
    if let Ok(absolute) = ctx.meta.absolutize(&url) {
        node.set("url", json!(absolute));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_the_core_vocabulary() {
        let reg = Registry::builtin();
        assert_eq!(
            reg.list_types(),
            [
                "Article",
                "ImageObject",
                "Organization",
                "Person",
                "WebPage",
                "WebSite"
            ]
        );
    }

    #[test]
    fn page_and_site_definitions_merge_by_default() {
        let reg = Registry::builtin();
        assert_eq!(reg.get("WebPage").unwrap().dedupe, DedupeStrategy::Merge);
        assert_eq!(reg.get("WebSite").unwrap().dedupe, DedupeStrategy::Merge);
        assert_eq!(
            reg.get("Organization").unwrap().dedupe,
            DedupeStrategy::Replace
        );
    }
}
