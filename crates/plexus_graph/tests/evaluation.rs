// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end evaluation behaviour of the graph engine.

use parking_lot::Mutex;
use plexus_graph::nodes::{add_switch_input, ArithmeticOp};
use plexus_graph::{Context, Graph, GraphError, GraphEvent, PlugId, PlugState, PlugValue, ValueHandle};
use std::sync::Arc;

/// `b.sum = a.sum + 1` with `a.sum = a.op1`
fn increment_graph() -> (Graph, PlugId, PlugId) {
    let mut graph = Graph::new("increment");
    let a = graph.create_node("Add", "a").unwrap();
    let b = graph.create_node("Add", "b").unwrap();
    let a_op1 = graph.plug_by_path(a, "op1").unwrap();
    let a_sum = graph.plug_by_path(a, "sum").unwrap();
    graph.set_value(a_op1, 5).unwrap();
    graph.set_input(graph.plug_by_path(b, "op1").unwrap(), Some(a_sum)).unwrap();
    graph.set_value(graph.plug_by_path(b, "op2").unwrap(), 1).unwrap();
    let b_sum = graph.plug_by_path(b, "sum").unwrap();
    (graph, a_op1, b_sum)
}

#[test]
fn test_increment_scenario() {
    let (mut graph, a, b) = increment_graph();
    let ctx = Context::default();

    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(6));
    let before = graph.hash(b, &ctx).unwrap();

    graph.set_value(a, 10).unwrap();
    assert_eq!(graph.plug_state(b), Ok(PlugState::Dirty));

    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(11));
    assert_ne!(graph.hash(b, &ctx).unwrap(), before);
    assert_eq!(graph.plug_state(b), Ok(PlugState::Clean));
}

#[test]
fn test_reads_are_deterministic() {
    let (graph, _, b) = increment_graph();
    let ctx = Context::at_frame(12.0);

    let first = graph.get_value(b, &ctx).unwrap();
    let second = graph.get_value(b, &ctx).unwrap();
    assert_eq!(first, second);
    assert!(ValueHandle::ptr_eq(&first, &second));
    assert_eq!(graph.hash(b, &ctx).unwrap(), graph.hash(b, &ctx).unwrap());
}

#[test]
fn test_dirty_closure() {
    let (mut graph, a, b) = increment_graph();
    let unrelated = graph.create_node("Add", "unrelated").unwrap();
    let unrelated_sum = graph.plug_by_path(unrelated, "sum").unwrap();
    let ctx = Context::default();
    graph.get_value(b, &ctx).unwrap();
    graph.get_value(unrelated_sum, &ctx).unwrap();

    let dirtied = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&dirtied);
    graph.subscribe(move |event| {
        if let GraphEvent::PlugDirtied(plug) = event {
            sink.lock().push(*plug);
        }
    });

    graph.set_value(a, 2).unwrap();
    let dirtied = dirtied.lock().clone();
    assert!(dirtied.contains(&a));
    assert!(dirtied.contains(&b));
    assert!(!dirtied.contains(&unrelated_sum));
    assert_eq!(graph.plug_state(unrelated_sum), Ok(PlugState::Clean));

    let mut unique = dirtied.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), dirtied.len());
}

#[test]
fn test_fingerprints_separate_values() {
    let mut graph = Graph::new("separate");
    let first = graph.create_node("Add", "first").unwrap();
    let second = graph.create_node("Add", "second").unwrap();
    graph.set_value(graph.plug_by_path(first, "op1").unwrap(), 1).unwrap();
    graph.set_value(graph.plug_by_path(second, "op1").unwrap(), 2).unwrap();
    let first_sum = graph.plug_by_path(first, "sum").unwrap();
    let second_sum = graph.plug_by_path(second, "sum").unwrap();
    let ctx = Context::default();

    graph.get_value(first_sum, &ctx).unwrap();
    graph.get_value(second_sum, &ctx).unwrap();
    let f1 = graph.hash(first_sum, &ctx).unwrap();
    let f2 = graph.hash(second_sum, &ctx).unwrap();
    assert_ne!(f1, f2);

    let cache = graph.engine().value_cache();
    assert_eq!(cache.get(f1).unwrap(), PlugValue::Int(1));
    assert_eq!(cache.get(f2).unwrap(), PlugValue::Int(2));
}

#[test]
fn test_connection_errors() {
    let mut graph = Graph::new("errors");
    let add = graph.create_node("Add", "add").unwrap();
    let vars = graph.create_node("ContextVariables", "vars").unwrap();
    let sum = graph.plug_by_path(add, "sum").unwrap();
    let variable = graph.plug_by_path(vars, "variable").unwrap();

    let result = graph.set_input(variable, Some(sum));
    assert!(matches!(result, Err(GraphError::TypeMismatch { .. })));

    let result = graph.set_value(sum, 3);
    assert!(matches!(result, Err(GraphError::PermissionDenied { .. })));

    let op1 = graph.plug_by_path(add, "op1").unwrap();
    let other = graph.create_node("Add", "other").unwrap();
    graph.set_input(op1, Some(graph.plug_by_path(other, "sum").unwrap())).unwrap();
    assert!(matches!(graph.set_value(op1, 1), Err(GraphError::PermissionDenied { .. })));
}

#[test]
fn test_replacing_input_dirties_downstream() {
    let (mut graph, _, b) = increment_graph();
    let ctx = Context::default();
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(6));

    let c = graph.create_node("Add", "c").unwrap();
    graph.set_value(graph.plug_by_path(c, "op1").unwrap(), 40).unwrap();
    let b_node = graph.node_by_name("b").unwrap();
    let b_op1 = graph.plug_by_path(b_node, "op1").unwrap();
    graph.set_input(b_op1, Some(graph.plug_by_path(c, "sum").unwrap())).unwrap();

    assert_eq!(graph.plug_state(b), Ok(PlugState::Dirty));
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(41));
}

#[test]
fn test_removing_node_severs_and_dirties() {
    let (mut graph, _, b) = increment_graph();
    let ctx = Context::default();
    graph.get_value(b, &ctx).unwrap();

    let a = graph.node_by_name("a").unwrap();
    graph.remove_node(a).unwrap();
    let b_node = graph.node_by_name("b").unwrap();
    let b_op1 = graph.plug_by_path(b_node, "op1").unwrap();

    assert_eq!(graph.input(b_op1), None);
    assert_eq!(graph.plug_state(b), Ok(PlugState::Dirty));
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(1));
}

#[test]
fn test_computed_switch_index() {
    let mut graph = Graph::new("switch");
    let switch = graph.create_node("Switch", "switch").unwrap();
    add_switch_input(&mut graph, switch).unwrap();
    for (i, value) in [1.5, 2.5, 3.5].into_iter().enumerate() {
        let plug = graph.plug_by_path(switch, &format!("in.in{i}")).unwrap();
        graph.set_value(plug, value).unwrap();
    }

    let selector = graph.create_node("Add", "selector").unwrap();
    graph.set_value(graph.plug_by_path(selector, "op1").unwrap(), 1).unwrap();
    graph.set_value(graph.plug_by_path(selector, "op2").unwrap(), 1).unwrap();
    let index = graph.plug_by_path(switch, "index").unwrap();
    graph.set_input(index, Some(graph.plug_by_path(selector, "sum").unwrap())).unwrap();

    let out = graph.plug_by_path(switch, "out").unwrap();
    assert_eq!(graph.get_value(out, &Context::default()).unwrap(), PlugValue::Float(3.5));
}

#[test]
fn test_time_warp_feeds_compute() {
    let mut graph = Graph::new("warp");
    let warp = graph.create_node("TimeWarp", "warp").unwrap();
    let arith = graph.create_node("Arithmetic", "scale").unwrap();
    graph.set_value(graph.plug_by_path(warp, "offset").unwrap(), 10.0).unwrap();
    graph
        .set_value(graph.plug_by_path(arith, "operation").unwrap(), ArithmeticOp::Multiply.index())
        .unwrap();
    graph.set_value(graph.plug_by_path(arith, "a").unwrap(), 3.0).unwrap();
    graph.set_value(graph.plug_by_path(arith, "b").unwrap(), 2.0).unwrap();
    graph
        .set_input(graph.plug_by_path(warp, "in").unwrap(), Some(graph.plug_by_path(arith, "out").unwrap()))
        .unwrap();

    let out = graph.plug_by_path(warp, "out").unwrap();
    let ctx = Context::at_frame(1.0);
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(6.0));
    let (_, source_context) = graph.resolve_source(out, &ctx).unwrap();
    assert_eq!(source_context.frame(), 11.0);
}

#[test]
fn test_sweep_keeps_held_values() {
    let (graph, _, b) = increment_graph();
    let ctx = Context::default();
    let held = graph.get_value(b, &ctx).unwrap();
    assert!(held.is_cached());

    let engine = graph.engine();
    let cached = engine.value_cache().len();
    assert_eq!(cached, 2);

    assert_eq!(engine.sweep(), 1);
    assert_eq!(engine.value_cache().len(), 1);

    drop(held);
    assert_eq!(engine.sweep(), 1);
    assert!(engine.value_cache().is_empty());

    // Values are recomputed on demand after a sweep
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(6));
}

#[test]
fn test_compute_failure_not_cached() {
    let mut graph = Graph::new("failure");
    let div = graph.create_node("Arithmetic", "div").unwrap();
    graph
        .set_value(graph.plug_by_path(div, "operation").unwrap(), ArithmeticOp::Divide.index())
        .unwrap();
    let out = graph.plug_by_path(div, "out").unwrap();
    let ctx = Context::default();

    let error = graph.get_value(out, &ctx).unwrap_err();
    assert!(matches!(error, GraphError::ComputeFailure { .. }));
    assert!(graph.engine().value_cache().is_empty());

    let b = graph.plug_by_path(div, "b").unwrap();
    graph.set_value(b, 4.0).unwrap();
    graph.set_value(graph.plug_by_path(div, "a").unwrap(), 2.0).unwrap();
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(0.5));
}

#[test]
fn test_undo_restores_values_and_connections() {
    let (mut graph, a, b) = increment_graph();
    let ctx = Context::default();
    let b_node = graph.node_by_name("b").unwrap();
    let b_op1 = graph.plug_by_path(b_node, "op1").unwrap();

    graph
        .undoable("Rewire", |graph| {
            graph.set_value(a, 20)?;
            graph.set_input(b_op1, None)?;
            graph.set_value(b_op1, 100)
        })
        .unwrap();
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(101));

    graph.undo().unwrap();
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(6));
    assert!(graph.input(b_op1).is_some());

    graph.redo().unwrap();
    assert_eq!(graph.get_value(b, &ctx).unwrap(), PlugValue::Int(101));
}
