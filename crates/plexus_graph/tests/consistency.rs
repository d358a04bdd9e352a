// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consistency checking catches nodes whose `affects` misses a dependency.

use plexus_graph::{
    AffectsContext, ComputeContext, Context, Engine, EngineConfig, Graph, GraphError, HashValidation, NodeBehaviour,
    NodeRegistry, PlugDescriptor, PlugId, PlugType, PlugValue, Result,
};
use std::any::Any;
use std::sync::Arc;

/// `out = in * 2`, but never reports `out` as affected
struct ForgetfulDouble;

impl NodeBehaviour for ForgetfulDouble {
    fn type_name(&self) -> &'static str {
        "ForgetfulDouble"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("in", 1.0),
            PlugDescriptor::output("out", PlugType::Float),
        ]
    }

    fn affects(&self, _cx: &AffectsContext<'_>, _input: PlugId, _outputs: &mut Vec<PlugId>) {}

    fn compute(&self, cx: &ComputeContext<'_>, _output: PlugId) -> Result<PlugValue> {
        Ok(PlugValue::Float(cx.float("in")? * 2.0))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn forgetful_graph(config: EngineConfig) -> (Graph, PlugId, PlugId) {
    let mut graph = Graph::with_parts(
        "consistency",
        Arc::new(NodeRegistry::with_builtins()),
        Arc::new(Engine::new(config)),
    );
    let node = graph.add_node("double", Arc::new(ForgetfulDouble)).unwrap();
    let input = graph.plug_by_path(node, "in").unwrap();
    let out = graph.plug_by_path(node, "out").unwrap();
    (graph, input, out)
}

fn config(hash_validation: HashValidation, fatal_hash_mismatch: bool) -> EngineConfig {
    EngineConfig {
        hash_validation,
        fatal_hash_mismatch,
        ..EngineConfig::default()
    }
}

#[test]
fn test_fatal_mismatch_reported() {
    let (mut graph, input, out) = forgetful_graph(config(HashValidation::Full, true));
    let ctx = Context::default();
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(2.0));

    graph.set_value(input, 4.0).unwrap();
    let error = graph.get_value(out, &ctx).unwrap_err();
    match error {
        GraphError::HashMismatch { plug, cached, fresh } => {
            assert_eq!(plug, "double.out");
            assert_ne!(cached, fresh);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(graph.engine().stats().hash_mismatches, 1);
}

#[test]
fn test_warning_mismatch_recovers() {
    let (mut graph, input, out) = forgetful_graph(config(HashValidation::Full, false));
    let ctx = Context::default();
    graph.get_value(out, &ctx).unwrap();

    graph.set_value(input, 4.0).unwrap();
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(8.0));
    assert_eq!(graph.engine().stats().hash_mismatches, 1);

    // The corrected fingerprint replaced the stale one
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(8.0));
    assert_eq!(graph.engine().stats().hash_mismatches, 1);
}

#[test]
fn test_unchecked_serves_stale_value() {
    let (mut graph, input, out) = forgetful_graph(config(HashValidation::Off, false));
    let ctx = Context::default();
    graph.get_value(out, &ctx).unwrap();

    graph.set_value(input, 4.0).unwrap();
    assert_eq!(graph.get_value(out, &ctx).unwrap(), PlugValue::Float(2.0));
    assert_eq!(graph.engine().stats().hash_checks, 0);
}

#[test]
fn test_correct_nodes_pass_checks() {
    let mut graph = Graph::with_parts(
        "consistency",
        Arc::new(NodeRegistry::with_builtins()),
        Arc::new(Engine::new(config(HashValidation::Full, true))),
    );
    let add = graph.create_node("Add", "add").unwrap();
    let op1 = graph.plug_by_path(add, "op1").unwrap();
    let sum = graph.plug_by_path(add, "sum").unwrap();
    let ctx = Context::default();

    for value in [1, 2, 3] {
        graph.set_value(op1, value).unwrap();
        assert_eq!(graph.get_value(sum, &ctx).unwrap(), PlugValue::Int(value));
        assert_eq!(graph.get_value(sum, &ctx).unwrap(), PlugValue::Int(value));
    }
    let stats = graph.engine().stats();
    assert!(stats.hash_checks > 0);
    assert_eq!(stats.hash_mismatches, 0);
}

#[test]
fn test_sampled_validation_selects_by_fingerprint() {
    let sampled = HashValidation::Sampled { every: 4 };
    let hits = (0u128..64)
        .filter(|bits| sampled.should_check(plexus_graph::Fingerprint(*bits)))
        .count();
    assert_eq!(hits, 16);
    assert!(HashValidation::Sampled { every: 1 }.should_check(plexus_graph::Fingerprint(3)));
}
