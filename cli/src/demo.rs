//! Built-in task set used by the `run` subcommand: five toy types (TaskA
//! through TaskE) that only log what they do, standing in for the real
//! business tasks a library consumer of `tree-orc-engine` would register.
//!
//! TaskA/TaskB/TaskC are plain; TaskD/TaskE are coroutines. TaskD's
//! `co_await` demonstrates the cross-tree primitive by enqueueing a fresh,
//! unparameterized "TaskE" tree on the shared dispatcher and suspending
//! until it completes, independently of the structural TaskE child a source
//! tree may also give it.

use std::rc::Rc;

use tree_orc_engine::coroutine::{Awaitable, CoOutput, Coroutine};
use tree_orc_engine::dispatcher::{Mode, PendingEnqueue};
use tree_orc_engine::registry::{CoroutineType, FieldDescriptor, TaskType, TypeRegistry};
use tree_orc_engine::value::{FieldKind, FieldValue, State};

/// Shared state threaded through every task call: the trace the demo
/// prints at the end, the registry (so a coroutine can describe what it
/// wants to enqueue), and a mailbox of enqueue requests a coroutine raised
/// mid-tick but that only the driver, holding `&mut Dispatcher`, can admit.
pub struct DemoState {
    pub log: Vec<String>,
    pub registry: Rc<TypeRegistry<DemoState>>,
    pub pending: Vec<PendingEnqueue<DemoState>>,
}

impl DemoState {
    pub fn new(registry: Rc<TypeRegistry<DemoState>>) -> Self {
        DemoState {
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

/// Always-SUCCESS plain task. Unparameterized instances log `1` so the
/// trace reads the same whether a tree binds `val` or leaves it default.
struct TaskA {
    val: i32,
}
impl Default for TaskA {
    fn default() -> Self {
        TaskA { val: 1 }
    }
}
impl TaskType<DemoState> for TaskA {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut DemoState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut DemoState) -> State {
        state.log.push(format!("run[{}]", self.val));
        State::Success
    }
    fn exit(&mut self, state: &mut DemoState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

/// Same shape as `TaskA`, default `2`.
struct TaskB {
    val: i32,
}
impl Default for TaskB {
    fn default() -> Self {
        TaskB { val: 2 }
    }
}
impl TaskType<DemoState> for TaskB {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut DemoState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut DemoState) -> State {
        state.log.push(format!("run[{}]", self.val));
        State::Success
    }
    fn exit(&mut self, state: &mut DemoState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

/// Plain task whose `run` reports BUSY on its first two calls and SUCCESS
/// on the third, exercising the long-running discipline's suspend/resume
/// path. Default `3`.
struct TaskC {
    val: i32,
    calls: u8,
}
impl Default for TaskC {
    fn default() -> Self {
        TaskC { val: 3, calls: 0 }
    }
}
impl TaskType<DemoState> for TaskC {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn init(&mut self, state: &mut DemoState) -> State {
        state.log.push(format!("init[{}]", self.val));
        State::Success
    }
    fn run(&mut self, state: &mut DemoState) -> State {
        self.calls += 1;
        state.log.push(format!("run[{}]", self.val));
        if self.calls < 3 {
            State::Busy
        } else {
            State::Success
        }
    }
    fn exit(&mut self, state: &mut DemoState) {
        state.log.push(format!("exit[{}]", self.val));
    }
}

/// Coroutine task whose body awaits a freshly enqueued, standalone "TaskE"
/// tree before returning. The structural child a source tree gives TaskD
/// (if any) runs afterward, through ordinary DOWN traversal — it has
/// nothing to do with the awaited tree.
#[derive(Default)]
struct TaskD {
    val: i32,
}
impl CoroutineType<DemoState> for TaskD {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn co_run(&mut self) -> Box<dyn Coroutine<DemoState>> {
        Box::new(TaskDBody {
            val: self.val,
            awaitable: None,
        })
    }
    fn exit(&mut self, state: &mut DemoState) {
        state.log.push(format!("exit [{}]", self.val));
    }
}

struct TaskDBody {
    val: i32,
    awaitable: Option<Awaitable>,
}
impl Coroutine<DemoState> for TaskDBody {
    fn start(&mut self, state: &mut DemoState) -> CoOutput {
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
    fn resume(&mut self, state: &mut DemoState) -> CoOutput {
        state.log.push(format!("co_await end [{}]", self.val));
        CoOutput::ret(State::Success)
    }
    fn awaiting(&self) -> Option<Awaitable> {
        self.awaitable.clone()
    }
}

/// Coroutine task that yields three times, then returns SUCCESS.
/// Unparameterized instances log `50` — the value TaskD's nested enqueue
/// relies on, since that tree never binds `val`.
struct TaskE {
    val: i32,
}
impl Default for TaskE {
    fn default() -> Self {
        TaskE { val: 50 }
    }
}
impl CoroutineType<DemoState> for TaskE {
    fn fields() -> Vec<FieldDescriptor> {
        val_field()
    }
    fn set_field(&mut self, index: usize, value: FieldValue) {
        set_val(&mut self.val, index, value)
    }
    fn co_run(&mut self) -> Box<dyn Coroutine<DemoState>> {
        Box::new(TaskEBody {
            val: self.val,
            yields: 0,
        })
    }
    fn exit(&mut self, state: &mut DemoState) {
        state.log.push(format!("exit [{}]", self.val));
    }
}

struct TaskEBody {
    val: i32,
    yields: u8,
}
impl Coroutine<DemoState> for TaskEBody {
    fn start(&mut self, state: &mut DemoState) -> CoOutput {
        state.log.push(format!("co_yield [{}]", self.val));
        self.yields = 1;
        CoOutput::yield_now()
    }
    fn resume(&mut self, state: &mut DemoState) -> CoOutput {
        if self.yields < 3 {
            state.log.push(format!("co_yield [{}]", self.val));
            self.yields += 1;
            CoOutput::yield_now()
        } else {
            CoOutput::ret(State::Success)
        }
    }
}

/// Build the registry the demo CLI parses and runs source files against.
pub fn build_registry() -> TypeRegistry<DemoState> {
    let mut registry = TypeRegistry::new();
    registry
        .register::<TaskA>("TaskA")
        .register::<TaskB>("TaskB")
        .register::<TaskC>("TaskC")
        .register_coroutine::<TaskD>("TaskD")
        .register_coroutine::<TaskE>("TaskE");
    registry
}
