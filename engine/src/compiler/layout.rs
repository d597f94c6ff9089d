//! Layout compiler (§4.3): two-pass assignment of byte offsets, turning a
//! parsed [`NodeList`] into a compiled [`CompiledTree`].
//!
//! Pass A sizes every record; Pass B allocates one buffer and emits node
//! headers, parameters, and zeroed composites in parse order, then
//! backpatches every forward reference (parent pointers, child-offset
//! tables, the root-children table) once all offsets are known.

use super::ast::NodeList;
use crate::codec::{self, Composite, Header, NodeHeader, StepResultRaw};
use crate::error::EngineError;
use crate::value::{Direction, State};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A compiled tree: the owned byte buffer plus nothing else. All node and
/// execution state lives inside the buffer itself.
#[derive(Clone, Debug)]
pub struct CompiledTree {
    buf: Vec<u8>,
}

impl CompiledTree {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// SHA-256 fingerprint of the compiled bytes — `compile` is pure, so two
    /// calls on identical source (and identical type registration) produce
    /// identical fingerprints (§4.3 Determinism, §8.2).
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.buf);
        hasher.finalize().into()
    }
}

/// Compile a parsed node list into a byte buffer (§4.3).
pub fn compile(nodes: &NodeList) -> Result<CompiledTree, EngineError> {
    // ── Pass A: size ──
    let mut children_count: HashMap<u32, u16> = HashMap::new();
    for n in &nodes.nodes {
        *children_count.entry(n.parent).or_insert(0) += 1;
    }
    let root_children_count = *children_count.get(&0).unwrap_or(&0);

    let mut record_sizes = Vec::with_capacity(nodes.nodes.len());
    let mut total: u64 = codec::HEADER_SIZE as u64 + root_children_count as u64 * 4;
    for n in &nodes.nodes {
        let cc = *children_count.get(&n.node_id).unwrap_or(&0);
        let pc = n.params.len() as u16;
        let size = codec::record_size(cc, pc);
        record_sizes.push((cc, pc, size));
        total += size as u64;
    }

    let mut buf = vec![0u8; total as usize];
    let first_node_offset = codec::HEADER_SIZE as u32 + root_children_count as u32 * 4;

    codec::write_header(
        &mut buf,
        &Header {
            node_count: nodes.nodes.len() as u32,
            ptr: 0,
            children_count: root_children_count,
            first_node_offset,
            last_result: StepResultRaw {
                state: State::Success,
                direction: Direction::Down,
            },
            child_idx: 0,
        },
    )?;

    if nodes.nodes.is_empty() {
        return Ok(CompiledTree { buf });
    }

    // ── Pass B, step 3: assign offsets, write headers/params/zeroed composite ──
    let mut offset_of: HashMap<u32, u32> = HashMap::new();
    let mut running = first_node_offset;
    for (n, (_, _, size)) in nodes.nodes.iter().zip(&record_sizes) {
        offset_of.insert(n.node_id, running);
        running += size;
    }

    for (n, (cc, pc, size)) in nodes.nodes.iter().zip(&record_sizes) {
        let offset = offset_of[&n.node_id];
        let children_offset = offset + codec::NODE_HEADER_SIZE as u32;
        let params_offset = children_offset + *cc as u32 * 4;
        let comp_offset = params_offset + *pc as u32 * 5;
        codec::write_node_header(
            &mut buf,
            offset,
            &NodeHeader {
                type_idx: n.type_idx as i16,
                parent: 0, // backpatched in step 4
                children_offset,
                children_count: *cc,
                params_offset,
                params_count: *pc,
                comp_offset,
                node_size: *size,
            },
        )?;
        for (i, p) in n.params.iter().enumerate() {
            codec::write_param(&mut buf, offset, i as u16, *p)?;
        }
        codec::write_composite(&mut buf, offset, &Composite::default())?;
    }

    // ── Pass B, step 4: backpatch parent + child-offset tables + root table ──
    let mut next_child_slot: HashMap<u32, u16> = HashMap::new();
    let mut root_slot: u16 = 0;
    for n in &nodes.nodes {
        let offset = offset_of[&n.node_id];
        if n.parent == 0 {
            codec::write_root_child(&mut buf, root_slot, offset)?;
            root_slot += 1;
        } else {
            let parent_offset = offset_of[&n.parent];
            codec::write_node_header(
                &mut buf,
                offset,
                &{
                    let mut h = codec::read_node_header(&buf, offset)?;
                    h.parent = parent_offset;
                    h
                },
            )?;
            let slot = next_child_slot.entry(n.parent).or_insert(0);
            codec::write_child(&mut buf, parent_offset, *slot, offset)?;
            *slot += 1;
        }
    }

    Ok(CompiledTree { buf })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser;
    use std::collections::HashMap as Map;

    fn types(names: &[&str]) -> Map<String, u16> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i as u16))
            .collect()
    }

    #[test]
    fn empty_forest_compiles() {
        let list = parser::parse("", &types(&["Task"])).unwrap();
        let tree = compile(&list).unwrap();
        let h = codec::read_header(tree.as_bytes()).unwrap();
        assert_eq!(h.node_count, 0);
        assert_eq!(h.children_count, 0);
    }

    #[test]
    fn determinism() {
        let t = types(&["TaskA", "TaskB"]);
        let list = parser::parse("TaskA(1)[TaskB($0)]", &t).unwrap();
        let a = compile(&list).unwrap();
        let b = compile(&list).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn parent_offsets_and_child_table() {
        let t = types(&["TaskA", "TaskB"]);
        let list = parser::parse("TaskA[TaskB, TaskB]", &t).unwrap();
        let tree = compile(&list).unwrap();
        let buf = tree.as_bytes();
        let h = codec::read_header(buf).unwrap();
        assert_eq!(h.children_count, 1);
        let root = codec::read_root_child(buf, 0).unwrap();
        assert_eq!(root, h.first_node_offset);
        let root_nh = codec::read_node_header(buf, root).unwrap();
        assert_eq!(root_nh.parent, 0);
        assert_eq!(root_nh.children_count, 2);
        let c0 = codec::read_child(buf, root, 0).unwrap();
        let c1 = codec::read_child(buf, root, 1).unwrap();
        assert_ne!(c0, c1);
        assert_eq!(codec::read_node_header(buf, c0).unwrap().parent, root);
        assert_eq!(codec::read_node_header(buf, c1).unwrap().parent, root);
    }

    #[test]
    fn deep_nesting_no_stack_growth_in_layout() {
        let t = types(&["Task"]);
        let mut src = String::new();
        for _ in 0..16 {
            src.push_str("Task[");
        }
        src.push_str("Task");
        for _ in 0..16 {
            src.push(']');
        }
        let list = parser::parse(&src, &t).unwrap();
        let tree = compile(&list).unwrap();
        assert_eq!(codec::read_header(tree.as_bytes()).unwrap().node_count, 17);
    }
}
