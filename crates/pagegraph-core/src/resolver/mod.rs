//! The resolution pipeline.
//!
//! `relation` classifies relation values (shorthand, inline node, id
//! reference); `node` runs one raw input through the fixed step order of
//! its type's definition. Both are pure given the graph context.

pub(crate) mod node;
pub(crate) mod relation;
