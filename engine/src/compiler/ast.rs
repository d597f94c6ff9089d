//! The logical node list produced by the grammar parser, before byte layout
//! is assigned (§3.3).

use crate::value::Parameter;
use serde::{Deserialize, Serialize};

/// One parsed node, before compilation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedNode {
    /// Dense, positive, unique within one tree. Root children's `parent` is 0.
    pub node_id: u32,
    /// Index into the registered type table.
    pub type_idx: u16,
    /// Nesting depth; 0 at roots.
    pub level: u32,
    /// `node_id` of the parent, or 0 for a root child.
    pub parent: u32,
    pub params: Vec<Parameter>,
}

/// The flat output of `parse` — one forest's worth of nodes in parse order.
///
/// Parse order is a pre-order walk of the forest, which is exactly the order
/// the layout compiler needs to assign forward byte offsets in a single pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeList {
    pub nodes: Vec<ParsedNode>,
}

impl NodeList {
    /// `node_id`s of the nodes with `parent == 0`, in parse order.
    pub fn root_children(&self) -> impl Iterator<Item = &ParsedNode> {
        self.nodes.iter().filter(|n| n.parent == 0)
    }

    pub fn children_of(&self, node_id: u32) -> impl Iterator<Item = &ParsedNode> {
        self.nodes.iter().filter(move |n| n.parent == node_id)
    }
}
