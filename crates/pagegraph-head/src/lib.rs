//! pagegraph-head
//!
//! Downstream collaborator of `pagegraph-core`: takes a finalized node
//! sequence as one opaque value and turns it into a single script-type
//! head tag, plus the tag prop normalization and coalesced flush
//! scheduling that surround rendering. The engine itself never encodes
//! JSON or touches tags; that boundary lives here.

pub mod flush;
pub mod tag;

pub use crate::flush::{Debounced, ManualScheduler, Scheduler};
pub use crate::tag::{normalise_props, render_graph, HeadTag, RenderError, TagPosition};
