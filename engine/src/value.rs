//! Scalar vocabulary shared by the grammar, the byte codec, and the task
//! constructor: the four arithmetic kinds a field or a parameter can carry.

use serde::{Deserialize, Serialize};

/// A parameter as it appears in parsed source, before compilation.
///
/// Three of the four alternatives are static literals carried verbatim into
/// the byte buffer; `Dyn` is a reference resolved against the caller's
/// dynamic arguments at dispatch time (see `$N` in the grammar).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    Bool(bool),
    Int(i32),
    Float(f32),
    /// `$N` — index into the dynamic argument list supplied at `prepare`/`enqueue` time.
    Dyn(u32),
}

/// The one-byte tag stored ahead of every parameter slot's 4-byte payload.
///
/// Values are fixed by the wire format (§4.4 / §6.2) and must never change:
/// persisted test fixtures depend on this exact numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParamTag {
    Bool = 1,
    Int = 2,
    Float = 4,
    Dyn = 8,
}

impl ParamTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(ParamTag::Bool),
            2 => Some(ParamTag::Int),
            4 => Some(ParamTag::Float),
            8 => Some(ParamTag::Dyn),
            _ => None,
        }
    }
}

impl Parameter {
    pub fn tag(&self) -> ParamTag {
        match self {
            Parameter::Bool(_) => ParamTag::Bool,
            Parameter::Int(_) => ParamTag::Int,
            Parameter::Float(_) => ParamTag::Float,
            Parameter::Dyn(_) => ParamTag::Dyn,
        }
    }
}

/// The arithmetic kind of one field of a registered task type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    I32,
    F32,
    U32,
}

/// A typed value ready to be written into a task field, either copied from a
/// static parameter or supplied by the caller as a dynamic argument.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    I32(i32),
    F32(f32),
    U32(u32),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::I32(_) => FieldKind::I32,
            FieldValue::F32(_) => FieldKind::F32,
            FieldValue::U32(_) => FieldKind::U32,
        }
    }
}

impl From<Parameter> for FieldValue {
    /// Static parameters carry their value straight across; a `Dyn` reference
    /// has no standalone value and must be resolved against `dyn_args` by the
    /// caller before conversion (callers never invoke this for `Dyn`).
    fn from(p: Parameter) -> Self {
        match p {
            Parameter::Bool(b) => FieldValue::Bool(b),
            Parameter::Int(i) => FieldValue::I32(i),
            Parameter::Float(f) => FieldValue::F32(f),
            Parameter::Dyn(_) => unreachable!("Dyn parameters are resolved, not converted"),
        }
    }
}

/// Outcome of one task operation or one engine step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Busy,
    Failed,
    Success,
}

/// Which way the step engine is currently moving through the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

/// The state + direction pair produced by the most recent step (`Header.last_result`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub state: State,
    pub direction: Direction,
}
