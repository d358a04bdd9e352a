// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo shot network evaluated from worker threads.
//!
//! An animated exposure, scaled per shot by a spreadsheet, is tweaked into
//! a set of attributes:
//!
//! ```text
//! grade (Spreadsheet) --> exposure.b
//! animation.curve0 -----> exposure.a
//! exposure.out ---------> tweaks.tweaks.tweak0.value
//! attributes.out -------> tweaks.in
//! ```

use anyhow::{anyhow, Context as _};
use plexus_animation::{animate, set_key, Key};
use plexus_graph::nodes::{add_row, ArithmeticOp};
use plexus_graph::{CompoundData, Context, Engine, EngineConfig, Graph, NodeRegistry, PlugId, SharedGraph};
use plexus_scene::{add_attribute, add_tweak_plug, TweakMode};
use std::sync::Arc;
use std::thread;

/// Shots the demo renders, with the per-shot exposure scale they select
pub const SHOTS: [&str; 3] = ["sh010", "sh020", "sh030"];

/// A built demo network
pub struct Demo {
    /// The network, shared with worker threads
    pub graph: SharedGraph,
    /// Final tweaked attributes
    pub output: PlugId,
}

/// Registry with every node type Plexus ships
pub fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    plexus_animation::register(&mut registry);
    plexus_scene::register(&mut registry);
    registry
}

fn plug(graph: &Graph, node: &str, path: &str) -> anyhow::Result<PlugId> {
    let id = graph
        .node_by_name(node)
        .with_context(|| format!("no node named \"{node}\""))?;
    Ok(graph.plug_by_path(id, path)?)
}

/// Build the demo network for `frames` frames
pub fn build(config: EngineConfig, frames: u32) -> anyhow::Result<Demo> {
    let mut graph = Graph::with_parts("demo", Arc::new(registry()), Arc::new(Engine::new(config)));

    let grade = graph.create_node("Spreadsheet", "grade")?;
    graph.set_value(plug(&graph, "grade", "selector")?, "shot")?;
    add_row(&mut graph, grade, "sh010")?;
    add_row(&mut graph, grade, "sh02*")?;
    graph.set_value(plug(&graph, "grade", "rows.default.value")?, 0.25)?;
    graph.set_value(plug(&graph, "grade", "rows.row1.value")?, 1.0)?;
    graph.set_value(plug(&graph, "grade", "rows.row2.value")?, 0.5)?;

    graph.create_node("Arithmetic", "exposure")?;
    graph.set_value(plug(&graph, "exposure", "operation")?, ArithmeticOp::Multiply.index())?;
    graph.set_input(plug(&graph, "exposure", "b")?, Some(plug(&graph, "grade", "out")?))?;
    let a = plug(&graph, "exposure", "a")?;
    animate(&mut graph, a)?;
    set_key(&mut graph, a, Key::new(1.0, 0.0))?;
    set_key(&mut graph, a, Key::new(frames.max(2) as f32, 2.0))?;

    let attributes = graph.create_node("Attributes", "attributes")?;
    add_attribute(&mut graph, attributes, "samples", 4, true)?;
    add_attribute(&mut graph, attributes, "visible", true, true)?;

    graph.create_node("Tweaks", "tweaks")?;
    graph.set_input(plug(&graph, "tweaks", "in")?, Some(plug(&graph, "attributes", "out")?))?;
    graph.set_value(plug(&graph, "tweaks", "ignore_missing")?, true)?;
    let container = plug(&graph, "tweaks", "tweaks")?;
    add_tweak_plug(&mut graph, container, "exposure", 0.0, TweakMode::Replace, true)?;
    add_tweak_plug(&mut graph, container, "samples", 2, TweakMode::Multiply, true)?;
    graph.set_input(
        plug(&graph, "tweaks", "tweaks.tweak0.value")?,
        Some(plug(&graph, "exposure", "out")?),
    )?;

    let output = plug(&graph, "tweaks", "out")?;
    tracing::info!(nodes = graph.nodes().count(), plugs = graph.plug_count(), "built demo network");
    Ok(Demo {
        graph: graph.into_shared(),
        output,
    })
}

/// Evaluate every shot at every frame, splitting frames across `threads`
/// workers. Returns the number of values read.
pub fn evaluate(demo: &Demo, frames: u32, threads: usize) -> anyhow::Result<usize> {
    let threads = threads.max(1);
    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|worker| {
                scope.spawn(move || -> anyhow::Result<usize> {
                    let mut count = 0;
                    for frame in (1..=frames).skip(worker).step_by(threads) {
                        for shot in SHOTS {
                            let context = Context::at_frame(frame as f32).with("shot", shot);
                            let graph = demo.graph.read();
                            let value = graph.get_value(demo.output, &context)?;
                            let attributes = value
                                .as_compound()
                                .ok_or_else(|| anyhow!("demo output is not parameter data"))?;
                            log_attributes(worker, shot, frame, attributes);
                            count += 1;
                        }
                    }
                    Ok(count)
                })
            })
            .collect();

        workers.into_iter().try_fold(0, |total, worker| -> anyhow::Result<usize> {
            let count = worker.join().map_err(|_| anyhow!("worker thread panicked"))??;
            Ok(total + count)
        })
    })
}

fn log_attributes(worker: usize, shot: &str, frame: u32, attributes: &CompoundData) {
    let exposure = attributes.get("exposure").and_then(|v| v.as_float());
    let samples = attributes.get("samples").and_then(|v| v.as_int());
    tracing::debug!(worker, shot, frame, ?exposure, ?samples, "evaluated");
}

/// Change the exposure scale of a shot pattern as one undoable edit
pub fn regrade(demo: &Demo, row: &str, scale: f32) -> anyhow::Result<()> {
    let mut graph = demo.graph.write();
    let value = plug(&graph, "grade", &format!("rows.{row}.value"))?;
    graph.undoable("Regrade", |graph| graph.set_value(value, scale))?;
    Ok(())
}

/// Undo the last edit
pub fn undo(demo: &Demo) -> anyhow::Result<()> {
    demo.graph.write().undo()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_graph::PlugValue;

    fn exposure(demo: &Demo, shot: &str, frame: f32) -> PlugValue {
        let graph = demo.graph.read();
        let context = Context::at_frame(frame).with("shot", shot);
        let value = graph.get_value(demo.output, &context).unwrap().to_value();
        value.as_compound().unwrap().get("exposure").cloned().unwrap()
    }

    #[test]
    fn test_demo_network() {
        let demo = build(EngineConfig::default(), 5).unwrap();
        assert_eq!(exposure(&demo, "sh010", 5.0), PlugValue::Float(2.0));
        assert_eq!(exposure(&demo, "sh020", 5.0), PlugValue::Float(1.0));
        assert_eq!(exposure(&demo, "sh030", 5.0), PlugValue::Float(0.5));
        assert_eq!(exposure(&demo, "sh010", 1.0), PlugValue::Float(0.0));

        let graph = demo.graph.read();
        let value = graph.get_value(demo.output, &Context::at_frame(3.0)).unwrap();
        assert_eq!(value.as_compound().unwrap().get("samples"), Some(&PlugValue::Int(8)));
    }

    #[test]
    fn test_parallel_evaluation_counts() {
        let demo = build(EngineConfig::default(), 6).unwrap();
        assert_eq!(evaluate(&demo, 6, 4).unwrap(), 6 * SHOTS.len());
        let computes = demo.graph.read().engine().stats().computes;

        // Everything is cached the second time round
        assert_eq!(evaluate(&demo, 6, 3).unwrap(), 6 * SHOTS.len());
        assert_eq!(demo.graph.read().engine().stats().computes, computes);
    }

    #[test]
    fn test_regrade_and_undo() {
        let demo = build(EngineConfig::default(), 5).unwrap();
        regrade(&demo, "row1", 2.0).unwrap();
        assert_eq!(exposure(&demo, "sh010", 5.0), PlugValue::Float(4.0));
        undo(&demo).unwrap();
        assert_eq!(exposure(&demo, "sh010", 5.0), PlugValue::Float(2.0));
    }
}
