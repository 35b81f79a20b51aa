//! pagegraph-core
//!
//! The resolution engine behind a page's structured-data graph:
//! - typed node definitions stored as data (cast/defaults/inherit/resolve)
//! - a fixed-order resolution pipeline with validated required fields
//! - deterministic identifier synthesis anchored to the page's addresses
//! - identity-based deduplication with merge/replace strategies
//! - one-shot graph finalization with graph-wide linking hooks
//!
//! The engine is a pure, synchronous transform: an ordered sequence of
//! add requests plus a fixed metadata snapshot in, an ordered node
//! sequence out. It performs no I/O, no JSON encoding, and holds no
//! state across builds; serialization into a head tag lives downstream
//! in `pagegraph-head`.

pub mod errors;
pub mod graph;
pub mod meta;
pub mod model;
pub mod registry;

mod resolver;

pub use crate::errors::{GraphError, GraphResult};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::graph::{AddOptions, GraphContext, GraphIndex, NodeHandle, PageGraph, RootContext};
    pub use crate::meta::{MetaInput, MetaKey, ResolvableDate, ResolvedMeta};
    pub use crate::model::{DedupeStrategy, Id, IdReference, Node};
    pub use crate::registry::{
        Defaults, IdAnchor, MetaInherit, NodeDefinition, Registry, RelationSpec,
    };
    pub use crate::{GraphError, GraphResult};
}
