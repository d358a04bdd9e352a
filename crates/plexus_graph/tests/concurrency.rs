// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concurrent evaluation: requests for one fingerprint share a compute.

use plexus_graph::{
    CachePolicy, ComputeContext, Context, Graph, NodeBehaviour, PlugDescriptor, PlugId, PlugType, PlugValue,
    Result, ValueHandle,
};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;

/// Doubles its input slowly, counting computes
struct SlowDouble {
    computes: Arc<AtomicUsize>,
    policy: CachePolicy,
}

impl NodeBehaviour for SlowDouble {
    fn type_name(&self) -> &'static str {
        "SlowDouble"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("in", 0.0),
            PlugDescriptor::output("out", PlugType::Float),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, _output: PlugId) -> Result<PlugValue> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(PlugValue::Float(cx.float("in")? * 2.0))
    }

    fn cache_policy(&self, _output: PlugId) -> CachePolicy {
        self.policy
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn slow_graph(policy: CachePolicy) -> (Graph, PlugId, Arc<AtomicUsize>) {
    let computes = Arc::new(AtomicUsize::new(0));
    let mut graph = Graph::new("concurrent");
    let node = graph
        .add_node(
            "double",
            Arc::new(SlowDouble {
                computes: Arc::clone(&computes),
                policy,
            }),
        )
        .unwrap();
    graph.set_value(graph.plug_by_path(node, "in").unwrap(), 21.0).unwrap();
    let out = graph.plug_by_path(node, "out").unwrap();
    (graph, out, computes)
}

fn race(graph: &Graph, out: PlugId, context: &Context) -> Vec<ValueHandle> {
    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    graph.get_value(out, context).unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    })
}

#[test]
fn test_same_fingerprint_computes_once() {
    let (graph, out, computes) = slow_graph(CachePolicy::Standard);
    let shared = graph.into_shared();
    let reader = shared.read();

    let handles = race(&reader, out, &Context::default());
    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert!(handles.iter().all(|h| ValueHandle::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0], PlugValue::Float(42.0));
    assert_eq!(reader.engine().stats().computes, 1);
}

#[test]
fn test_distinct_contexts_compute_independently() {
    let (graph, out, computes) = slow_graph(CachePolicy::Standard);
    let barrier = Barrier::new(THREADS);

    // The node ignores the frame, so every context shares one fingerprint
    thread::scope(|scope| {
        for frame in 0..THREADS {
            let graph = &graph;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                let value = graph.get_value(out, &Context::at_frame(frame as f32)).unwrap();
                assert_eq!(value, PlugValue::Float(42.0));
            });
        }
    });
    assert_eq!(computes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_uncached_policy_never_stores() {
    let (graph, out, computes) = slow_graph(CachePolicy::Uncached);
    let ctx = Context::default();
    let first = graph.get_value(out, &ctx).unwrap();
    let second = graph.get_value(out, &ctx).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_cached());
    assert_eq!(computes.load(Ordering::SeqCst), 2);
    assert!(graph.engine().value_cache().is_empty());
}

#[test]
fn test_concurrent_policy_publishes_one_value() {
    let (graph, out, computes) = slow_graph(CachePolicy::Concurrent);
    let handles = race(&graph, out, &Context::default());
    assert!(computes.load(Ordering::SeqCst) >= 1);
    assert!(handles.iter().all(|h| *h == PlugValue::Float(42.0)));
    assert_eq!(graph.engine().value_cache().len(), 1);
}

#[test]
fn test_edits_between_reads() {
    let (graph, out, computes) = slow_graph(CachePolicy::Standard);
    let shared = graph.into_shared();
    let ctx = Context::default();

    assert_eq!(shared.read().get_value(out, &ctx).unwrap(), PlugValue::Float(42.0));
    {
        let mut writer = shared.write();
        let node = writer.node_by_name("double").unwrap();
        let input = writer.plug_by_path(node, "in").unwrap();
        writer.set_value(input, 5.0).unwrap();
    }
    let handles = race(&shared.read(), out, &ctx);
    assert!(handles.iter().all(|h| *h == PlugValue::Float(10.0)));
    assert_eq!(computes.load(Ordering::SeqCst), 2);
}
