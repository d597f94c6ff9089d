//! End-to-end scenarios against the toy task set in `support`: a plain
//! hierarchy, static/dynamic parameter binding, a coroutine cross-tree
//! await, a parse error, compile determinism, and deep linear nesting.

mod support;

use std::collections::HashMap;
use tree_orc_engine::compiler::parser;
use tree_orc_engine::dispatcher::Mode;
use tree_orc_engine::error::ParseError;
use tree_orc_engine::value::{FieldValue, State};

#[test]
fn plain_hierarchy_runs_depth_first_with_defaults() {
    let source = "TaskC, TaskA($0)[TaskB(5)[TaskA, TaskB]] TaskA[TaskC]";
    let (result, log, _buffer) = support::run_plain(source, &[FieldValue::I32(-5)]);

    assert_eq!(result, State::Success);
    let expected: Vec<String> = [
        "init[3]", "run[3]", "run[3]", "run[3]", "exit[3]",
        "init[-5]", "run[-5]", "exit[-5]",
        "init[5]", "run[5]", "exit[5]",
        "init[1]", "run[1]", "exit[1]",
        "init[2]", "run[2]", "exit[2]",
        "init[1]", "run[1]", "exit[1]",
        "init[3]", "run[3]", "run[3]", "run[3]", "exit[3]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(log, expected);
}

#[test]
fn static_and_dynamic_params_bind_positionally() {
    let source = "TaskA($0)[TaskB($1), TaskC($2)] TaskA($3)";
    let dyn_args: Vec<FieldValue> = [10, 20, 30, 40].into_iter().map(FieldValue::I32).collect();
    let (result, log, _buffer) = support::run_plain(source, &dyn_args);

    assert_eq!(result, State::Success);
    let expected: Vec<String> = [
        "init[10]", "run[10]", "exit[10]",
        "init[20]", "run[20]", "exit[20]",
        "init[30]", "run[30]", "run[30]", "run[30]", "exit[30]",
        "init[40]", "run[40]", "exit[40]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(log, expected);
}

#[test]
fn coroutine_cross_tree_await_suspends_until_nested_tree_completes() {
    let source = "TaskD($0)[TaskE($1)]";
    let dyn_args: Vec<FieldValue> = [10, 20].into_iter().map(FieldValue::I32).collect();
    let (result, log) = support::run_dispatched(source, dyn_args, Mode::Stepwise1);

    assert_eq!(result, State::Success);
    let expected: Vec<String> = [
        "co_await start [10]",
        "co_yield [50]", "co_yield [50]", "co_yield [50]", "exit [50]",
        "co_await end [10]", "exit [10]",
        "co_yield [20]", "co_yield [20]", "co_yield [20]", "exit [20]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(log, expected);
}

#[test]
fn unknown_type_name_is_rejected_before_any_buffer_is_produced() {
    let types: HashMap<String, u16> = [("Task".to_string(), 0u16)].into_iter().collect();
    let err = parser::parse("Tas", &types).unwrap_err();
    assert_eq!(err, ParseError::UnknownType("Tas".to_string()));
}

#[test]
fn compiling_the_same_source_twice_is_byte_for_byte_deterministic() {
    let registry = support::build_registry();
    let source = "TaskA[TaskB, TaskC(7)]";
    let first = tree_orc_engine::compile(source, &registry).unwrap();
    let second = tree_orc_engine::compile(source, &registry).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn deep_linear_nesting_compiles_and_runs_to_completion() {
    let mut source = String::new();
    for _ in 0..16 {
        source.push_str("TaskA[");
    }
    source.push_str("TaskA");
    for _ in 0..16 {
        source.push(']');
    }

    let (result, log, buffer) = support::run_plain(&source, &[]);
    assert_eq!(result, State::Success);
    assert_eq!(log.len(), 17 * 3);

    let header = tree_orc_engine::codec::read_header(buffer.as_bytes()).unwrap();
    assert_eq!(header.node_count, 17);
}
