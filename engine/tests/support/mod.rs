//! Shared fixtures for the integration tests: the same five toy task types
//! the demo CLI registers (TaskA/B/C plain, TaskD/E coroutine), logging
//! every call so a test can assert on the exact trace a tree produces.

#![allow(dead_code)]

use std::rc::Rc;

use tree_orc_engine::coroutine::{Awaitable, CoOutput, Coroutine};
use tree_orc_engine::dispatcher::{Dispatcher, Mode, PendingEnqueue};
use tree_orc_engine::registry::{CoroutineType, FieldDescriptor, TaskType, TypeRegistry};
use tree_orc_engine::value::{FieldKind, FieldValue, State};

pub struct TestState {
    pub log: Vec<String>,
    pub registry: Rc<TypeRegistry<TestState>>,
    pub pending: Vec<PendingEnqueue<TestState>>,
}

impl TestState {
    pub fn new(registry: Rc<TypeRegistry<TestState>>) -> Self {
        TestState {
            log: Vec::new(),
            registry,
            pending: Vec::new(),
        }
    }
}

fn val_field() -> Vec<FieldDescriptor> {
    vec![FieldDescriptor {
        name: "val",
        kind: FieldKind::I32,
    }]
}

fn set_val(slot: &mut i32, index: usize, value: FieldValue) {
    if index == 0 {
        if let FieldValue::I32(v) = value {
            *slot = v;
        }
    }
}

struct TaskA {
    val: i32,
}
impl Default for TaskA {
    fn default() -> Self {
        TaskA { val: 1 }
    }
}
impl TaskType<TestState> for TaskA {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut TestState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut TestState) -> State {
        state.log.push(format!("run[{}]", self.val));
        State::Success
    }
    fn exit(&mut self, state: &mut TestState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

struct TaskB {
    val: i32,
}
impl Default for TaskB {
    fn default() -> Self {
        TaskB { val: 2 }
    }
}
impl TaskType<TestState> for TaskB {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut TestState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut TestState) -> State {
        state.log.push(format!("run[{}]", self.val));
        State::Success
    }
    fn exit(&mut self, state: &mut TestState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

struct TaskC {
    val: i32,
    calls: u8,
}
impl Default for TaskC {
    fn default() -> Self {
        TaskC { val: 3, calls: 0 }
    }
}
impl TaskType<TestState> for TaskC {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut TestState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut TestState) -> State {
        self.calls += 1;
        state.log.push(format!("run[{}]", self.val));
        if self.calls < 3 {
            State::Busy
        } else {
            State::Success
        }
    }
    fn exit(&mut self, state: &mut TestState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

#[derive(Default)]
struct TaskD {
    val: i32,
}
impl CoroutineType<TestState> for TaskD {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn co_run(&mut self) -> Box<dyn Coroutine<TestState>> {
        Box::new(TaskDBody {
            val: self.val,
            awaitable: None,
        })
    }
    fn exit(&mut self, state: &mut TestState) {
        state.log.push(format!("exit [{}]", self.val));
    }
}

struct TaskDBody {
    val: i32,
    awaitable: Option<Awaitable>,
}
impl Coroutine<TestState> for TaskDBody {
    fn start(&mut self, state: &mut TestState) -> CoOutput {
        state.log.push(format!("co_await start [{}]", self.val));
        let awaitable = Awaitable::new();
        state.pending.push(PendingEnqueue {
            registry: state.registry.clone(),
            priority: 0,
            mode: Mode::Full1,
            source: "TaskE".to_string(),
            dyn_args: Vec::new(),
            completion: awaitable.clone(),
        });
        self.awaitable = Some(awaitable);
        CoOutput::await_now()
    }
    fn resume(&mut self, state: &mut TestState) -> CoOutput {
        state.log.push(format!("co_await end [{}]", self.val));
        CoOutput::ret(State::Success)
    }
    fn awaiting(&self) -> Option<Awaitable> {
        self.awaitable.clone()
    }
}

struct TaskE {
    val: i32,
}
impl Default for TaskE {
    fn default() -> Self {
        TaskE { val: 50 }
    }
}
impl CoroutineType<TestState> for TaskE {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn co_run(&mut self) -> Box<dyn Coroutine<TestState>> {
        Box::new(TaskEBody {
            val: self.val,
            yields: 0,
        })
    }
    fn exit(&mut self, state: &mut TestState) {
        state.log.push(format!("exit [{}]", self.val));
    }
}

struct TaskEBody {
    val: i32,
    yields: u8,
}
impl Coroutine<TestState> for TaskEBody {
    fn start(&mut self, state: &mut TestState) -> CoOutput {
        state.log.push(format!("co_yield [{}]", self.val));
        self.yields = 1;
        CoOutput::yield_now()
    }
    fn resume(&mut self, state: &mut TestState) -> CoOutput {
        if self.yields < 3 {
            state.log.push(format!("co_yield [{}]", self.val));
            self.yields += 1;
            CoOutput::yield_now()
        } else {
            CoOutput::ret(State::Success)
        }
    }
}

pub fn build_registry() -> TypeRegistry<TestState> {
    let mut registry = TypeRegistry::new();
    registry
        .register::<TaskA>("TaskA")
        .register::<TaskB>("TaskB")
        .register::<TaskC>("TaskC")
        .register_coroutine::<TaskD>("TaskD")
        .register_coroutine::<TaskE>("TaskE");
    registry
}

/// Run a source tree to terminal via the plain `prepare`/`step` path (no
/// dispatcher, no cross-tree await) and return the resulting log and state.
pub fn run_plain(
    source: &str,
    dyn_args: &[FieldValue],
) -> (State, Vec<String>, tree_orc_engine::compiler::layout::CompiledTree) {
    let registry = Rc::new(build_registry());
    let mut state = TestState::new(registry.clone());
    let mut prepared = tree_orc_engine::prepare(source, &registry).unwrap();
    let mut result = State::Busy;
    while result == State::Busy {
        result = prepared.step(&registry, &mut state, dyn_args).unwrap();
    }
    (result, state.log, prepared.buffer().clone())
}

/// Run a source tree to terminal via the dispatcher, in the given mode,
/// relaying any mid-tick `PendingEnqueue` requests a coroutine raises (the
/// cross-tree await path).
pub fn run_dispatched(source: &str, dyn_args: Vec<FieldValue>, mode: Mode) -> (State, Vec<String>) {
    let registry = Rc::new(build_registry());
    let mut state = TestState::new(registry.clone());
    let mut dispatcher = Dispatcher::new(tree_orc_engine::config::EngineConfig::default());
    let completion = dispatcher
        .enqueue(registry.clone(), 0, mode, source, dyn_args)
        .unwrap();

    while !completion.is_done() {
        dispatcher.run_once(&mut state).unwrap();
        for pending in state.pending.drain(..) {
            dispatcher.enqueue_pending(pending).unwrap();
        }
    }
    (completion.result().unwrap(), state.log)
}
