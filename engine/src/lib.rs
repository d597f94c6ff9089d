//! `tree-orc-engine`: compiles a small textual grammar describing forests of
//! typed, parameterized tasks into a compact byte buffer, then steps that
//! buffer forward one node at a time under a single-threaded cooperative
//! discipline (plain, long-running, or coroutine-with-await tasks). A
//! priority-sorted [`dispatcher::Dispatcher`] drives many such trees and
//! lets one suspend on another's completion.

pub mod codec;
pub mod compiler;
pub mod config;
pub mod constructor;
pub mod coroutine;
pub mod dispatcher;
pub mod error;
pub mod registry;
mod slab;
pub mod step;
pub mod value;

use compiler::layout::CompiledTree;
use error::EngineError;
use registry::TypeRegistry;
use step::Runtime;
use value::{FieldValue, State};

/// Compile `source` against `registry`'s type table (§6.3 `compile`).
pub fn compile<S>(source: &str, registry: &TypeRegistry<S>) -> Result<CompiledTree, EngineError> {
    let nodes = compiler::parser::parse(source, registry.type_index())?;
    compiler::layout::compile(&nodes)
}

/// A compiled tree bound to its runtime state, ready to be stepped (§6.3
/// `prepare`). Doesn't own the caller's state object or dynamic arguments
/// borrow — those are supplied fresh to each [`Prepared::step`] call.
pub struct Prepared<S> {
    buffer: CompiledTree,
    runtime: Runtime<S>,
}

impl<S> Prepared<S> {
    pub fn new(buffer: CompiledTree) -> Self {
        Prepared {
            buffer,
            runtime: Runtime::new(),
        }
    }

    pub fn buffer(&self) -> &CompiledTree {
        &self.buffer
    }

    /// Perform one DOWN/UP transition (§4.7).
    pub fn step(
        &mut self,
        registry: &TypeRegistry<S>,
        state: &mut S,
        dyn_args: &[FieldValue],
    ) -> Result<State, EngineError> {
        step::step(self.buffer.as_bytes_mut(), &mut self.runtime, registry, state, dyn_args)
    }
}

/// Compile and wrap `source` in one call (§6.3 `prepare`, folding in
/// `compile` for the common case of a tree run standalone rather than
/// through a [`dispatcher::Dispatcher`]).
pub fn prepare<S>(source: &str, registry: &TypeRegistry<S>) -> Result<Prepared<S>, EngineError> {
    Ok(Prepared::new(compile(source, registry)?))
}
