//! Dispatcher (§4.9): the priority-sorted queue of in-flight trees, the four
//! execution modes, and the cross-tree await primitive.

use crate::compiler::layout::{self, CompiledTree};
use crate::compiler::parser;
use crate::config::EngineConfig;
use crate::coroutine::Awaitable;
use crate::error::EngineError;
use crate::registry::TypeRegistry;
use crate::step::{self, Runtime};
use crate::value::{FieldValue, State};
use std::rc::Rc;
use uuid::Uuid;

/// Execution mode for one queue entry (§4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// One step per tick; remove and fulfill once terminal.
    Stepwise1,
    /// One step per tick forever; result ignored.
    StepwiseInf,
    /// Run to terminal within a single tick; remove and fulfill.
    Full1,
    /// Run to terminal within a single tick, forever (re-armed on terminal).
    FullInf,
}

struct QueueEntry<S> {
    /// Correlates this entry's `tracing` events across ticks; has no
    /// bearing on scheduling or identity beyond log readability.
    id: Uuid,
    priority: i32,
    mode: Mode,
    buffer: CompiledTree,
    runtime: Runtime<S>,
    dyn_args: Vec<FieldValue>,
    registry: Rc<TypeRegistry<S>>,
    completion: Awaitable,
}

/// A deferred `enqueue` request, for the case where the caller doesn't have
/// `&mut Dispatcher` in hand — typically a coroutine running inside a `step`
/// call that's itself being driven by this same dispatcher. §4.9 says queue
/// mutation from inside a task "takes effect after the current tick"; this
/// is that mailbox. The coroutine creates the [`Awaitable`] up front so it
/// can hold onto it across its own suspension, and the driver relays the
/// request into the dispatcher (via [`Dispatcher::enqueue_pending`]) once
/// the tick that produced it has returned.
pub struct PendingEnqueue<S> {
    pub registry: Rc<TypeRegistry<S>>,
    pub priority: i32,
    pub mode: Mode,
    pub source: String,
    pub dyn_args: Vec<FieldValue>,
    pub completion: Awaitable,
}

/// The priority queue of in-flight trees (§4.9). `S` is the caller's shared
/// state object, threaded by reference into every `step` call.
pub struct Dispatcher<S> {
    entries: Vec<QueueEntry<S>>,
    dirty: bool,
}

impl<S> Dispatcher<S> {
    pub fn new(config: EngineConfig) -> Self {
        Dispatcher {
            entries: Vec::with_capacity(config.queue_capacity),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile `source`, bind `dyn_args`, and insert it at `priority` under
    /// `mode` (§6.3 `enqueue`). Returns an [`Awaitable`] that resolves once
    /// the entry reaches a terminal state — usable both by the caller and,
    /// passed into a coroutine's state, as the `await(A)` target of §4.8.
    pub fn enqueue(
        &mut self,
        registry: Rc<TypeRegistry<S>>,
        priority: i32,
        mode: Mode,
        source: &str,
        dyn_args: Vec<FieldValue>,
    ) -> Result<Awaitable, EngineError> {
        let nodes = parser::parse(source, registry.type_index())?;
        let buffer = layout::compile(&nodes)?;
        let completion = Awaitable::new();
        let id = Uuid::new_v4();
        tracing::debug!(%id, priority, ?mode, nodes = nodes.nodes.len(), "enqueue");
        self.entries.push(QueueEntry {
            id,
            priority,
            mode,
            buffer,
            runtime: Runtime::new(),
            dyn_args,
            registry,
            completion: completion.clone(),
        });
        self.dirty = true;
        Ok(completion)
    }

    /// Admit a [`PendingEnqueue`] collected by the caller's state object
    /// during the previous tick, reusing its pre-made `completion` handle
    /// instead of minting a fresh one (the coroutine that built the request
    /// is already holding a clone of it).
    pub fn enqueue_pending(&mut self, pending: PendingEnqueue<S>) -> Result<(), EngineError> {
        let nodes = parser::parse(&pending.source, pending.registry.type_index())?;
        let buffer = layout::compile(&nodes)?;
        let id = Uuid::new_v4();
        tracing::debug!(
            %id,
            priority = pending.priority,
            mode = ?pending.mode,
            nodes = nodes.nodes.len(),
            "enqueue_pending"
        );
        self.entries.push(QueueEntry {
            id,
            priority: pending.priority,
            mode: pending.mode,
            buffer,
            runtime: Runtime::new(),
            dyn_args: pending.dyn_args,
            registry: pending.registry,
            completion: pending.completion,
        });
        self.dirty = true;
        Ok(())
    }

    /// Advance the queue once (§4.9 tick semantics). Re-sorts by descending
    /// priority first if any entry was enqueued since the last tick.
    pub fn run_once(&mut self, state: &mut S) -> Result<(), EngineError> {
        if self.dirty {
            self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));
            self.dirty = false;
        }

        let mut entries = std::mem::take(&mut self.entries);
        let mut keep = Vec::with_capacity(entries.len());

        for mut entry in entries.drain(..) {
            let id = entry.id;
            match entry.mode {
                Mode::Stepwise1 => {
                    let result = run_step(&mut entry, state)?;
                    if let Some(r) = result {
                        tracing::debug!(%id, ?r, "entry fulfilled");
                        entry.completion.fulfill(r);
                    } else {
                        keep.push(entry);
                    }
                }
                Mode::StepwiseInf => {
                    run_step(&mut entry, state)?;
                    keep.push(entry);
                }
                Mode::Full1 => {
                    let result = run_to_terminal(&mut entry, state)?;
                    tracing::debug!(%id, ?result, "entry fulfilled");
                    entry.completion.fulfill(result);
                }
                Mode::FullInf => {
                    run_to_terminal(&mut entry, state)?;
                    keep.push(entry);
                }
            }
        }

        self.entries = keep;
        Ok(())
    }
}

fn run_step<S>(entry: &mut QueueEntry<S>, state: &mut S) -> Result<Option<State>, EngineError> {
    let r = step::step(
        entry.buffer.as_bytes_mut(),
        &mut entry.runtime,
        &entry.registry,
        state,
        &entry.dyn_args,
    )?;
    Ok((r != State::Busy).then_some(r))
}

fn run_to_terminal<S>(entry: &mut QueueEntry<S>, state: &mut S) -> Result<State, EngineError> {
    loop {
        if let Some(r) = run_step(entry, state)? {
            return Ok(r);
        }
    }
}
