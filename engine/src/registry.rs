//! Task capability set and type registry (§4.5, §9 "Polymorphism over task
//! types"): a user-registered variant `V` plus a per-type dispatch table
//! populated at registration time, so the engine holds only `type_idx`
//! values in the buffer and never downcasts a trait object.

use crate::coroutine::Coroutine;
use crate::value::{FieldKind, FieldValue, State};
use std::collections::HashMap;

/// One field of a registered task type, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A plain task type: optional `init`/`run`/`exit`, each defaulting to a
/// no-op/SUCCESS per §4.5 ("absent ⇒ treated as SUCCESS").
///
/// `S` is the caller's state object, threaded through every operation by
/// reference.
pub trait TaskType<S>: Default + 'static {
    /// Declaration-order field list, used by the constructor (§4.6) to bind
    /// parameters positionally instead of via reflection.
    fn fields() -> Vec<FieldDescriptor>;

    /// Assign `value` into the `index`-th declared field. The constructor
    /// enforces kind-match before calling this.
    fn set_field(&mut self, index: usize, value: FieldValue);

    fn init(&mut self, _state: &mut S) -> State {
        State::Success
    }

    fn run(&mut self, _state: &mut S) -> State {
        State::Success
    }

    fn exit(&mut self, _state: &mut S) {}
}

/// A coroutine task type: `co_run` replaces `run`/`init`/`exit` entirely
/// (§4.5, mutually exclusive with the plain discipline).
pub trait CoroutineType<S>: Default + 'static {
    fn fields() -> Vec<FieldDescriptor>;
    fn set_field(&mut self, index: usize, value: FieldValue);

    /// Produce the coroutine body for this task invocation.
    fn co_run(&mut self) -> Box<dyn Coroutine<S>>;

    fn exit(&mut self, _state: &mut S) {}
}

/// Type-erased handle to a live plain task instance, held behind
/// `Composite.ptr`'s slab slot (§3.4). Blanket-implemented for every
/// `TaskType<S>` so the engine never needs `dyn Any` downcasting.
pub trait PlainInstance<S> {
    fn init(&mut self, state: &mut S) -> State;
    fn run(&mut self, state: &mut S) -> State;
    fn exit(&mut self, state: &mut S);
    fn set_field(&mut self, index: usize, value: FieldValue);
}

impl<S, T: TaskType<S>> PlainInstance<S> for T {
    fn init(&mut self, state: &mut S) -> State {
        TaskType::init(self, state)
    }
    fn run(&mut self, state: &mut S) -> State {
        TaskType::run(self, state)
    }
    fn exit(&mut self, state: &mut S) {
        TaskType::exit(self, state)
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        TaskType::set_field(self, index, value)
    }
}

/// Type-erased handle to a live coroutine task instance.
pub trait CoroutineInstance<S> {
    fn co_run(&mut self) -> Box<dyn Coroutine<S>>;
    fn exit(&mut self, state: &mut S);
    fn set_field(&mut self, index: usize, value: FieldValue);
}

impl<S, T: CoroutineType<S>> CoroutineInstance<S> for T {
    fn co_run(&mut self) -> Box<dyn Coroutine<S>> {
        CoroutineType::co_run(self)
    }
    fn exit(&mut self, state: &mut S) {
        CoroutineType::exit(self, state)
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        CoroutineType::set_field(self, index, value)
    }
}

/// One registered variant alternative's dispatch entry (§9: `{has_init,
/// has_run, has_exit, has_co_run, construct_default, assign_field_k}`
/// collapsed into two constructors, since our traits already carry
/// presence via default bodies).
enum Entry<S> {
    Plain {
        fields: Vec<FieldDescriptor>,
        construct: Box<dyn Fn() -> Box<dyn PlainInstance<S>>>,
    },
    Coroutine {
        fields: Vec<FieldDescriptor>,
        construct: Box<dyn Fn() -> Box<dyn CoroutineInstance<S>>>,
    },
}

/// Name→index table plus per-type dispatch table, built once at startup and
/// shared by the parser, constructor, and step engine.
pub struct TypeRegistry<S> {
    name_to_idx: HashMap<String, u16>,
    entries: Vec<Entry<S>>,
}

impl<S> Default for TypeRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TypeRegistry<S> {
    pub fn new() -> Self {
        TypeRegistry {
            name_to_idx: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register a plain task type (§4.5).
    pub fn register<T: TaskType<S>>(&mut self, name: &str) -> &mut Self {
        let idx = self.entries.len() as u16;
        self.entries.push(Entry::Plain {
            fields: T::fields(),
            construct: Box::new(|| Box::new(T::default())),
        });
        self.name_to_idx.insert(name.to_string(), idx);
        self
    }

    /// Register a coroutine task type (§4.5).
    pub fn register_coroutine<T: CoroutineType<S>>(&mut self, name: &str) -> &mut Self {
        let idx = self.entries.len() as u16;
        self.entries.push(Entry::Coroutine {
            fields: T::fields(),
            construct: Box::new(|| Box::new(T::default())),
        });
        self.name_to_idx.insert(name.to_string(), idx);
        self
    }

    pub fn type_index(&self) -> &HashMap<String, u16> {
        &self.name_to_idx
    }

    pub fn fields(&self, type_idx: i16) -> Option<&[FieldDescriptor]> {
        self.entries.get(type_idx as usize).map(|e| match e {
            Entry::Plain { fields, .. } => fields.as_slice(),
            Entry::Coroutine { fields, .. } => fields.as_slice(),
        })
    }

    /// `is_coroutine[i]` per §4.5's static corun-mask.
    pub fn is_coroutine(&self, type_idx: i16) -> Option<bool> {
        self.entries
            .get(type_idx as usize)
            .map(|e| matches!(e, Entry::Coroutine { .. }))
    }

    pub fn construct_plain(&self, type_idx: i16) -> Option<Box<dyn PlainInstance<S>>> {
        match self.entries.get(type_idx as usize)? {
            Entry::Plain { construct, .. } => Some(construct()),
            Entry::Coroutine { .. } => None,
        }
    }

    pub fn construct_coroutine(&self, type_idx: i16) -> Option<Box<dyn CoroutineInstance<S>>> {
        match self.entries.get(type_idx as usize)? {
            Entry::Coroutine { construct, .. } => Some(construct()),
            Entry::Plain { .. } => None,
        }
    }
}
