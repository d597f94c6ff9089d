//! Stepwise execution engine (§4.7): one DOWN/UP transition per call.
//!
//! `Runtime<S>` owns the two slabs that stand in for `Composite.ptr`/
//! `Composite.co` — the live task instance and, for coroutine nodes, the
//! live coroutine body plus its last published costate.

use crate::codec::{self, Composite, Header, NodeHeader, StepResultRaw};
use crate::constructor;
use crate::coroutine::{Awaitable, CoOutput, Costate};
use crate::error::EngineError;
use crate::registry::{CoroutineInstance, PlainInstance, TypeRegistry};
use crate::slab::Slab;
use crate::value::{Direction, FieldValue, State};

enum Instance<S> {
    Plain(Box<dyn PlainInstance<S>>),
    Coroutine(Box<dyn CoroutineInstance<S>>),
}

struct CoroState<S> {
    body: Box<dyn crate::coroutine::Coroutine<S>>,
    last_costate: Costate,
    awaitable: Option<Awaitable>,
}

/// Side tables the step engine consults via the `Composite.ptr`/`.co`
/// handles (§3.4) — never touched directly by user task code.
pub struct Runtime<S> {
    instances: Slab<Instance<S>>,
    coros: Slab<CoroState<S>>,
}

impl<S> Default for Runtime<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Runtime<S> {
    pub fn new() -> Self {
        Runtime {
            instances: Slab::new(),
            coros: Slab::new(),
        }
    }
}

struct ExecOutcome {
    next_ptr: u32,
    state: State,
    direction: Direction,
}

/// Drive exactly one node transition (§4.7). Returns `State::Busy` while the
/// forest is still in progress, `State::Success`/`State::Failed` once the
/// last root child's subtree has returned to the forest sentinel.
pub fn step<S>(
    buf: &mut [u8],
    runtime: &mut Runtime<S>,
    registry: &TypeRegistry<S>,
    state: &mut S,
    dyn_args: &[FieldValue],
) -> Result<State, EngineError> {
    let mut header = codec::read_header(buf)?;

    if header.children_count == 0 {
        tracing::trace!("empty forest, immediate success");
        return Ok(State::Success);
    }

    if header.ptr < header.first_node_offset && header.last_result.direction == Direction::Down {
        header.ptr = header.first_node_offset;
        header.child_idx = 0;
        tracing::trace!(ptr = header.ptr, "first-entry gate");
    }

    let node_off = header.ptr;
    let incoming_direction = header.last_result.direction;
    let incoming_state = header.last_result.state;
    tracing::trace!(node_off, ?incoming_direction, "step node");

    let outcome = execute_node(
        buf,
        node_off,
        incoming_direction,
        incoming_state,
        runtime,
        registry,
        state,
        dyn_args,
    )?;

    header.ptr = outcome.next_ptr;
    header.last_result = StepResultRaw {
        state: outcome.state,
        direction: outcome.direction,
    };

    if header.last_result.direction == Direction::Up && header.ptr == 0 {
        header.child_idx += 1;
        if header.child_idx == header.children_count {
            let result = header.last_result.state;
            tracing::trace!(?result, "forest complete");
            codec::write_header(
                buf,
                &Header {
                    node_count: header.node_count,
                    ptr: 0,
                    children_count: header.children_count,
                    first_node_offset: header.first_node_offset,
                    last_result: StepResultRaw {
                        state: result,
                        direction: Direction::Down,
                    },
                    child_idx: 0,
                },
            )?;
            return Ok(result);
        }
        header.ptr = codec::read_root_child(buf, header.child_idx)?;
        header.last_result.direction = Direction::Down;
        codec::write_header(buf, &header)?;
        return Ok(State::Busy);
    }

    codec::write_header(buf, &header)?;
    Ok(State::Busy)
}

#[allow(clippy::too_many_arguments)]
fn execute_node<S>(
    buf: &mut [u8],
    node_off: u32,
    direction: Direction,
    incoming_state: State,
    runtime: &mut Runtime<S>,
    registry: &TypeRegistry<S>,
    state: &mut S,
    dyn_args: &[FieldValue],
) -> Result<ExecOutcome, EngineError> {
    let nh = codec::read_node_header(buf, node_off)?;
    let comp = codec::read_composite(buf, node_off)?;

    match direction {
        Direction::Down => down_entry(buf, node_off, &nh, comp.cur_idx, runtime, registry, state, dyn_args),
        Direction::Up if comp.ptr == 0 => up_from_child(buf, node_off, &nh, comp.cur_idx, incoming_state),
        Direction::Up => up_resume(buf, node_off, &nh, comp, runtime, state),
    }
}

#[allow(clippy::too_many_arguments)]
fn down_entry<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    cur_idx: u16,
    runtime: &mut Runtime<S>,
    registry: &TypeRegistry<S>,
    state: &mut S,
    dyn_args: &[FieldValue],
) -> Result<ExecOutcome, EngineError> {
    let is_coroutine = registry
        .is_coroutine(nh.type_idx)
        .ok_or(EngineError::UnknownTaskType(nh.type_idx))?;

    if is_coroutine {
        let instance =
            constructor::construct_coroutine(registry, buf, node_off, nh.type_idx, nh.params_count, dyn_args)?;
        start_coroutine(buf, node_off, nh, runtime, state, instance, cur_idx)
    } else {
        let mut instance =
            constructor::construct_plain(registry, buf, node_off, nh.type_idx, nh.params_count, dyn_args)?;

        let init_result = instance.init(state);
        if init_result == State::Failed {
            instance.exit(state);
            codec::write_composite(buf, node_off, &Composite::default())?;
            tracing::trace!(node_off, "init failed");
            return Ok(ExecOutcome {
                next_ptr: nh.parent,
                state: State::Failed,
                direction: Direction::Up,
            });
        }

        let run_result = instance.run(state);
        match run_result {
            State::Busy => {
                let ptr = runtime.instances.insert(Instance::Plain(instance));
                codec::write_composite(buf, node_off, &Composite { ptr, co: 0, cur_idx })?;
                Ok(ExecOutcome {
                    next_ptr: node_off,
                    state: State::Busy,
                    direction: Direction::Up,
                })
            }
            State::Success | State::Failed => {
                instance.exit(state);
                advance(buf, node_off, nh, cur_idx, run_result)
            }
        }
    }
}

fn up_from_child<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    cur_idx: u16,
    incoming_state: State,
) -> Result<ExecOutcome, EngineError> {
    if incoming_state == State::Busy {
        return Err(EngineError::InvalidBuffer(format!(
            "node {node_off}: UP re-entry with ptr=0 but last_result=BUSY"
        )));
    }
    if cur_idx >= nh.children_count {
        codec::write_composite(buf, node_off, &Composite::default())?;
        Ok(ExecOutcome {
            next_ptr: nh.parent,
            state: incoming_state,
            direction: Direction::Up,
        })
    } else {
        let child_off = codec::read_child(buf, node_off, cur_idx)?;
        codec::write_composite(
            buf,
            node_off,
            &Composite {
                ptr: 0,
                co: 0,
                cur_idx: cur_idx + 1,
            },
        )?;
        Ok(ExecOutcome {
            next_ptr: child_off,
            state: incoming_state,
            direction: Direction::Down,
        })
    }
}

fn up_resume<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    comp: Composite,
    runtime: &mut Runtime<S>,
    state: &mut S,
) -> Result<ExecOutcome, EngineError> {
    if comp.co == 0 {
        let instance = runtime
            .instances
            .get_mut(comp.ptr)
            .ok_or_else(|| EngineError::InvalidBuffer(format!("node {node_off}: dangling instance handle")))?;
        let Instance::Plain(instance) = instance else {
            return Err(EngineError::InvalidBuffer(format!(
                "node {node_off}: coroutine composite missing co handle"
            )));
        };
        let run_result = instance.run(state);
        match run_result {
            State::Busy => Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            }),
            State::Success | State::Failed => {
                instance.exit(state);
                runtime.instances.remove(comp.ptr);
                advance(buf, node_off, nh, comp.cur_idx, run_result)
            }
        }
    } else {
        resume_coroutine(buf, node_off, nh, comp, runtime, state)
    }
}

#[allow(clippy::too_many_arguments)]
fn start_coroutine<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    runtime: &mut Runtime<S>,
    state: &mut S,
    mut instance: Box<dyn CoroutineInstance<S>>,
    cur_idx: u16,
) -> Result<ExecOutcome, EngineError> {
    let mut body = instance.co_run();
    let out = body.start(state);
    commit_fresh_coroutine(buf, node_off, nh, runtime, state, instance, body, out, cur_idx)
}

#[allow(clippy::too_many_arguments)]
fn commit_fresh_coroutine<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    runtime: &mut Runtime<S>,
    state: &mut S,
    mut instance: Box<dyn CoroutineInstance<S>>,
    body: Box<dyn crate::coroutine::Coroutine<S>>,
    out: CoOutput,
    cur_idx: u16,
) -> Result<ExecOutcome, EngineError> {
    match out.costate {
        Costate::Return => {
            instance.exit(state);
            advance(buf, node_off, nh, cur_idx, out.value)
        }
        Costate::Yield => {
            let ptr = runtime.instances.insert(Instance::Coroutine(instance));
            let co = runtime.coros.insert(CoroState {
                body,
                last_costate: Costate::Yield,
                awaitable: None,
            });
            codec::write_composite(buf, node_off, &Composite { ptr, co, cur_idx })?;
            Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            })
        }
        Costate::Await => {
            let awaitable = body.awaiting();
            let ptr = runtime.instances.insert(Instance::Coroutine(instance));
            let co = runtime.coros.insert(CoroState {
                body,
                last_costate: Costate::Await,
                awaitable,
            });
            codec::write_composite(buf, node_off, &Composite { ptr, co, cur_idx })?;
            Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            })
        }
    }
}

fn resume_coroutine<S>(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    comp: Composite,
    runtime: &mut Runtime<S>,
    state: &mut S,
) -> Result<ExecOutcome, EngineError> {
    let last_costate = runtime
        .coros
        .get(comp.co)
        .ok_or_else(|| EngineError::InvalidBuffer(format!("node {node_off}: dangling coroutine handle")))?
        .last_costate;

    if last_costate == Costate::Await {
        let done = runtime
            .coros
            .get(comp.co)
            .and_then(|c| c.awaitable.as_ref())
            .map(|a| a.is_done())
            .unwrap_or(false);
        if !done {
            tracing::trace!(node_off, "await not yet satisfied");
            return Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            });
        }
    }

    let out = runtime.coros.get_mut(comp.co).unwrap().body.resume(state);

    match out.costate {
        Costate::Return => {
            let instance = runtime
                .instances
                .remove(comp.ptr)
                .ok_or_else(|| EngineError::InvalidBuffer(format!("node {node_off}: dangling instance handle")))?;
            runtime.coros.remove(comp.co);
            match instance {
                Instance::Coroutine(mut inst) => inst.exit(state),
                Instance::Plain(_) => {
                    return Err(EngineError::InvalidBuffer(format!(
                        "node {node_off}: plain instance behind coroutine handle"
                    )))
                }
            }
            advance(buf, node_off, nh, comp.cur_idx, out.value)
        }
        Costate::Yield => {
            let slot = runtime.coros.get_mut(comp.co).unwrap();
            slot.last_costate = Costate::Yield;
            slot.awaitable = None;
            Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            })
        }
        Costate::Await => {
            let awaitable = runtime.coros.get_mut(comp.co).unwrap().body.awaiting();
            let slot = runtime.coros.get_mut(comp.co).unwrap();
            slot.last_costate = Costate::Await;
            slot.awaitable = awaitable;
            Ok(ExecOutcome {
                next_ptr: node_off,
                state: State::Busy,
                direction: Direction::Up,
            })
        }
    }
}

/// The shared "advance" rule (§4.7.1): a terminal result either descends
/// into the next child or propagates up, depending on whether any children
/// remain and whether the result was FAILED.
fn advance(
    buf: &mut [u8],
    node_off: u32,
    nh: &NodeHeader,
    cur_idx: u16,
    result: State,
) -> Result<ExecOutcome, EngineError> {
    if result == State::Failed || cur_idx >= nh.children_count {
        codec::write_composite(buf, node_off, &Composite::default())?;
        Ok(ExecOutcome {
            next_ptr: nh.parent,
            state: result,
            direction: Direction::Up,
        })
    } else {
        let child_off = codec::read_child(buf, node_off, cur_idx)?;
        codec::write_composite(
            buf,
            node_off,
            &Composite {
                ptr: 0,
                co: 0,
                cur_idx: cur_idx + 1,
            },
        )?;
        Ok(ExecOutcome {
            next_ptr: child_off,
            state: result,
            direction: Direction::Down,
        })
    }
}
