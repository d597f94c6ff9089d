//! Byte codec (§4.4): typed, bounds-checked accessors over the compiled
//! buffer's fixed layout (§3.4, §6.2). Nothing here interprets program
//! semantics — it only knows how to find and decode/encode a field at a
//! known offset. All multi-byte integers are little-endian; a `bool` is
//! widened to an `i32` (0 = false).

use crate::error::EngineError;
use crate::value::{Direction, ParamTag, Parameter, State, StepResult};

pub const HEADER_SIZE: usize = 18;
pub const NODE_HEADER_SIZE: usize = 26;
pub const COMPOSITE_SIZE: usize = 18;
pub const PARAM_SLOT_SIZE: usize = 5;
pub const CHILD_PTR_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub node_count: u32,
    pub ptr: u32,
    pub children_count: u16,
    pub first_node_offset: u32,
    pub last_result: StepResultRaw,
    pub child_idx: u16,
}

/// `StepResult` widened to the fixed-width pair actually stored in the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepResultRaw {
    pub state: State,
    pub direction: Direction,
}

impl From<StepResult> for StepResultRaw {
    fn from(r: StepResult) -> Self {
        StepResultRaw {
            state: r.state,
            direction: r.direction,
        }
    }
}
impl From<StepResultRaw> for StepResult {
    fn from(r: StepResultRaw) -> Self {
        StepResult {
            state: r.state,
            direction: r.direction,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeHeader {
    pub type_idx: i16,
    pub parent: u32,
    pub children_offset: u32,
    pub children_count: u16,
    pub params_offset: u32,
    pub params_count: u16,
    pub comp_offset: u32,
    pub node_size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Composite {
    pub ptr: u64,
    pub co: u64,
    pub cur_idx: i16,
}

fn oob(at: usize, len: usize) -> EngineError {
    EngineError::InvalidBuffer(format!("offset {at} out of bounds (buffer len {len})"))
}

fn slice<'a>(buf: &'a [u8], at: usize, len: usize) -> Result<&'a [u8], EngineError> {
    buf.get(at..at + len).ok_or_else(|| oob(at, buf.len()))
}

fn slice_mut<'a>(buf: &'a mut [u8], at: usize, len: usize) -> Result<&'a mut [u8], EngineError> {
    let blen = buf.len();
    buf.get_mut(at..at + len).ok_or_else(|| oob(at, blen))
}

fn state_from_byte(b: u8) -> Result<State, EngineError> {
    match b {
        0 => Ok(State::Busy),
        1 => Ok(State::Failed),
        2 => Ok(State::Success),
        _ => Err(EngineError::InvalidBuffer(format!("bad State byte {b}"))),
    }
}
fn state_to_byte(s: State) -> u8 {
    match s {
        State::Busy => 0,
        State::Failed => 1,
        State::Success => 2,
    }
}
fn dir_from_byte(b: u8) -> Result<Direction, EngineError> {
    match b {
        0 => Ok(Direction::Down),
        1 => Ok(Direction::Up),
        _ => Err(EngineError::InvalidBuffer(format!("bad Direction byte {b}"))),
    }
}
fn dir_to_byte(d: Direction) -> u8 {
    match d {
        Direction::Down => 0,
        Direction::Up => 1,
    }
}

pub fn read_header(buf: &[u8]) -> Result<Header, EngineError> {
    let s = slice(buf, 0, HEADER_SIZE)?;
    Ok(Header {
        node_count: u32::from_le_bytes(s[0..4].try_into().unwrap()),
        ptr: u32::from_le_bytes(s[4..8].try_into().unwrap()),
        children_count: u16::from_le_bytes(s[8..10].try_into().unwrap()),
        first_node_offset: u32::from_le_bytes(s[10..14].try_into().unwrap()),
        last_result: StepResultRaw {
            state: state_from_byte(s[14])?,
            direction: dir_from_byte(s[15])?,
        },
        child_idx: u16::from_le_bytes(s[16..18].try_into().unwrap()),
    })
}

pub fn write_header(buf: &mut [u8], h: &Header) -> Result<(), EngineError> {
    let s = slice_mut(buf, 0, HEADER_SIZE)?;
    s[0..4].copy_from_slice(&h.node_count.to_le_bytes());
    s[4..8].copy_from_slice(&h.ptr.to_le_bytes());
    s[8..10].copy_from_slice(&h.children_count.to_le_bytes());
    s[10..14].copy_from_slice(&h.first_node_offset.to_le_bytes());
    s[14] = state_to_byte(h.last_result.state);
    s[15] = dir_to_byte(h.last_result.direction);
    s[16..18].copy_from_slice(&h.child_idx.to_le_bytes());
    Ok(())
}

pub fn read_root_child(buf: &[u8], i: u16) -> Result<u32, EngineError> {
    let at = HEADER_SIZE + i as usize * CHILD_PTR_SIZE;
    let s = slice(buf, at, CHILD_PTR_SIZE)?;
    Ok(u32::from_le_bytes(s.try_into().unwrap()))
}

pub fn write_root_child(buf: &mut [u8], i: u16, offset: u32) -> Result<(), EngineError> {
    let at = HEADER_SIZE + i as usize * CHILD_PTR_SIZE;
    let s = slice_mut(buf, at, CHILD_PTR_SIZE)?;
    s.copy_from_slice(&offset.to_le_bytes());
    Ok(())
}

pub fn read_node_header(buf: &[u8], offset: u32) -> Result<NodeHeader, EngineError> {
    let s = slice(buf, offset as usize, NODE_HEADER_SIZE)?;
    Ok(NodeHeader {
        type_idx: i16::from_le_bytes(s[0..2].try_into().unwrap()),
        parent: u32::from_le_bytes(s[2..6].try_into().unwrap()),
        children_offset: u32::from_le_bytes(s[6..10].try_into().unwrap()),
        children_count: u16::from_le_bytes(s[10..12].try_into().unwrap()),
        params_offset: u32::from_le_bytes(s[12..16].try_into().unwrap()),
        params_count: u16::from_le_bytes(s[16..18].try_into().unwrap()),
        comp_offset: u32::from_le_bytes(s[18..22].try_into().unwrap()),
        node_size: u32::from_le_bytes(s[22..26].try_into().unwrap()),
    })
}

pub fn write_node_header(buf: &mut [u8], offset: u32, h: &NodeHeader) -> Result<(), EngineError> {
    let s = slice_mut(buf, offset as usize, NODE_HEADER_SIZE)?;
    s[0..2].copy_from_slice(&h.type_idx.to_le_bytes());
    s[2..6].copy_from_slice(&h.parent.to_le_bytes());
    s[6..10].copy_from_slice(&h.children_offset.to_le_bytes());
    s[10..12].copy_from_slice(&h.children_count.to_le_bytes());
    s[12..16].copy_from_slice(&h.params_offset.to_le_bytes());
    s[16..18].copy_from_slice(&h.params_count.to_le_bytes());
    s[18..22].copy_from_slice(&h.comp_offset.to_le_bytes());
    s[22..26].copy_from_slice(&h.node_size.to_le_bytes());
    Ok(())
}

pub fn read_child(buf: &[u8], node_off: u32, i: u16) -> Result<u32, EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let at = nh.children_offset as usize + i as usize * CHILD_PTR_SIZE;
    let s = slice(buf, at, CHILD_PTR_SIZE)?;
    Ok(u32::from_le_bytes(s.try_into().unwrap()))
}

pub fn write_child(buf: &mut [u8], node_off: u32, i: u16, target: u32) -> Result<(), EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let at = nh.children_offset as usize + i as usize * CHILD_PTR_SIZE;
    let s = slice_mut(buf, at, CHILD_PTR_SIZE)?;
    s.copy_from_slice(&target.to_le_bytes());
    Ok(())
}

pub fn read_composite(buf: &[u8], node_off: u32) -> Result<Composite, EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let s = slice(buf, nh.comp_offset as usize, COMPOSITE_SIZE)?;
    Ok(Composite {
        ptr: u64::from_le_bytes(s[0..8].try_into().unwrap()),
        co: u64::from_le_bytes(s[8..16].try_into().unwrap()),
        cur_idx: i16::from_le_bytes(s[16..18].try_into().unwrap()),
    })
}

pub fn write_composite(buf: &mut [u8], node_off: u32, c: &Composite) -> Result<(), EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let s = slice_mut(buf, nh.comp_offset as usize, COMPOSITE_SIZE)?;
    s[0..8].copy_from_slice(&c.ptr.to_le_bytes());
    s[8..16].copy_from_slice(&c.co.to_le_bytes());
    s[16..18].copy_from_slice(&c.cur_idx.to_le_bytes());
    Ok(())
}

pub fn read_param(buf: &[u8], node_off: u32, i: u16) -> Result<Parameter, EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let at = nh.params_offset as usize + i as usize * PARAM_SLOT_SIZE;
    let s = slice(buf, at, PARAM_SLOT_SIZE)?;
    let tag = ParamTag::from_byte(s[0])
        .ok_or_else(|| EngineError::InvalidBuffer(format!("bad param tag {}", s[0])))?;
    let payload: [u8; 4] = s[1..5].try_into().unwrap();
    Ok(match tag {
        ParamTag::Bool => Parameter::Bool(u32::from_le_bytes(payload) != 0),
        ParamTag::Int => Parameter::Int(i32::from_le_bytes(payload)),
        ParamTag::Float => Parameter::Float(f32::from_le_bytes(payload)),
        ParamTag::Dyn => Parameter::Dyn(u32::from_le_bytes(payload)),
    })
}

pub fn write_param(
    buf: &mut [u8],
    node_off: u32,
    i: u16,
    p: Parameter,
) -> Result<(), EngineError> {
    let nh = read_node_header(buf, node_off)?;
    let at = nh.params_offset as usize + i as usize * PARAM_SLOT_SIZE;
    let s = slice_mut(buf, at, PARAM_SLOT_SIZE)?;
    s[0] = p.tag() as u8;
    let payload: [u8; 4] = match p {
        Parameter::Bool(b) => (b as u32).to_le_bytes(),
        Parameter::Int(n) => n.to_le_bytes(),
        Parameter::Float(f) => f.to_le_bytes(),
        Parameter::Dyn(n) => n.to_le_bytes(),
    };
    s[1..5].copy_from_slice(&payload);
    Ok(())
}

/// Total byte size of one NodeRecord given its shape, per §4.3 Pass A.
pub fn record_size(children_count: u16, params_count: u16) -> u32 {
    NODE_HEADER_SIZE as u32
        + children_count as u32 * CHILD_PTR_SIZE as u32
        + params_count as u32 * PARAM_SLOT_SIZE as u32
        + COMPOSITE_SIZE as u32
}
