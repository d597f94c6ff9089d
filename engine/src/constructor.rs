//! Task constructor (§4.6, §9 "Field-to-parameter binding"): binds a node's
//! static + dynamic parameters into a freshly default-constructed task
//! instance, positionally, by declared field order.

use crate::codec;
use crate::error::EngineError;
use crate::registry::{CoroutineInstance, FieldDescriptor, PlainInstance, TypeRegistry};
use crate::value::{FieldValue, Parameter};

/// Where one field's value comes from, before the index-shift pass (§4.6
/// step 3): a static slot records its position in `static_params`; a
/// dynamic slot records its raw `$N` index, shifted once `static_params`'
/// final length is known.
enum Slot {
    Static(usize),
    Dyn(u32),
}

/// Walk a node's parameter slots left-to-right, producing the `idxs` /
/// `static_params` pair §4.6 step 3 describes.
fn bind_indices(params: &[Parameter]) -> (Vec<u32>, Vec<Parameter>) {
    let mut static_params = Vec::new();
    let mut slots = Vec::with_capacity(params.len());
    for p in params {
        match p {
            Parameter::Dyn(n) => slots.push(Slot::Dyn(*n)),
            _ => {
                slots.push(Slot::Static(static_params.len()));
                static_params.push(*p);
            }
        }
    }
    let shift = static_params.len() as u32;
    let idxs = slots
        .into_iter()
        .map(|s| match s {
            Slot::Static(pos) => pos as u32,
            Slot::Dyn(n) => n + shift,
        })
        .collect();
    (idxs, static_params)
}

/// Resolve one field's value per §4.6 step 2, applying the kind-match rule:
/// a tag/kind mismatch leaves the field at its default (no error, no panic).
fn resolve_field(
    idx: u32,
    static_params: &[Parameter],
    dyn_args: &[FieldValue],
    kind: crate::value::FieldKind,
) -> Option<FieldValue> {
    let idx = idx as usize;
    let raw = if idx < static_params.len() {
        FieldValue::from(static_params[idx])
    } else {
        *dyn_args.get(idx - static_params.len())?
    };
    (raw.kind() == kind).then_some(raw)
}

fn bind_fields<F: FnMut(usize, FieldValue)>(
    fields: &[FieldDescriptor],
    idxs: &[u32],
    static_params: &[Parameter],
    dyn_args: &[FieldValue],
    mut set_field: F,
) {
    for (k, field) in fields.iter().enumerate().take(idxs.len()) {
        if let Some(value) = resolve_field(idxs[k], static_params, dyn_args, field.kind) {
            set_field(k, value);
        }
    }
}

/// Read a node's parameter slots out of the compiled buffer.
fn read_params(buf: &[u8], node_off: u32, params_count: u16) -> Result<Vec<Parameter>, EngineError> {
    (0..params_count)
        .map(|i| codec::read_param(buf, node_off, i))
        .collect()
}

/// Construct and bind a plain task instance for the node at `node_off`
/// (§4.6 step 1–2).
pub fn construct_plain<S>(
    registry: &TypeRegistry<S>,
    buf: &[u8],
    node_off: u32,
    type_idx: i16,
    params_count: u16,
    dyn_args: &[FieldValue],
) -> Result<Box<dyn PlainInstance<S>>, EngineError> {
    let fields = registry
        .fields(type_idx)
        .ok_or(EngineError::UnknownTaskType(type_idx))?
        .to_vec();
    let mut instance = registry
        .construct_plain(type_idx)
        .ok_or(EngineError::UnknownTaskType(type_idx))?;
    let params = read_params(buf, node_off, params_count)?;
    let (idxs, static_params) = bind_indices(&params);
    bind_fields(&fields, &idxs, &static_params, dyn_args, |k, v| {
        instance.set_field(k, v)
    });
    Ok(instance)
}

/// Construct and bind a coroutine task instance for the node at `node_off`.
pub fn construct_coroutine<S>(
    registry: &TypeRegistry<S>,
    buf: &[u8],
    node_off: u32,
    type_idx: i16,
    params_count: u16,
    dyn_args: &[FieldValue],
) -> Result<Box<dyn CoroutineInstance<S>>, EngineError> {
    let fields = registry
        .fields(type_idx)
        .ok_or(EngineError::UnknownTaskType(type_idx))?
        .to_vec();
    let mut instance = registry
        .construct_coroutine(type_idx)
        .ok_or(EngineError::UnknownTaskType(type_idx))?;
    let params = read_params(buf, node_off, params_count)?;
    let (idxs, static_params) = bind_indices(&params);
    bind_fields(&fields, &idxs, &static_params, dyn_args, |k, v| {
        instance.set_field(k, v)
    });
    Ok(instance)
}
