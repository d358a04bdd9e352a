// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Animation` node and the functions that animate plugs with it.
//!
//! An animation node owns one curve per output plug under `curves`. A plug is
//! animated when its input is one of those outputs. Key edits go through the
//! graph's undo history and dirty the curve's output, so downstream hashes
//! change with the keys.

use crate::curve::{Curve, Key};
use indexmap::IndexMap;
use parking_lot::RwLock;
use plexus_graph::{
    Action, ComputeContext, Direction, Fingerprint, Graph, GraphError, NodeBehaviour, NodeCategory, NodeId,
    NodeRegistry, NodeType, PlugDescriptor, PlugFlags, PlugId, PlugType, PlugValue, Result,
};
use std::any::Any;
use std::sync::Arc;

/// Registered type name of the animation node
pub const ANIMATION_TYPE: &str = "Animation";

/// Compute node evaluating curves at the context frame
#[derive(Debug, Default)]
pub struct AnimationNode {
    /// Curves by output plug name
    curves: RwLock<IndexMap<String, Curve>>,
}

impl AnimationNode {
    /// Create a node without curves
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the curve behind the output named `name`
    pub fn curve(&self, name: &str) -> Option<Curve> {
        self.curves.read().get(name).cloned()
    }

    /// Names of the curve outputs
    pub fn curve_names(&self) -> Vec<String> {
        self.curves.read().keys().cloned().collect()
    }

    fn set_curve(&self, name: &str, curve: Curve) {
        self.curves.write().insert(name.to_string(), curve);
    }

    fn curve_for(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Curve> {
        let plug = cx
            .graph()
            .plug(output)
            .ok_or(GraphError::PlugNotFound(output))?;
        self.curve(plug.name()).ok_or_else(|| {
            GraphError::MissingDependency(format!("no curve for \"{}\"", cx.relative_name(output)))
        })
    }
}

impl NodeBehaviour for AnimationNode {
    fn type_name(&self) -> &'static str {
        ANIMATION_TYPE
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![PlugDescriptor::container("curves", Direction::Out, Vec::new())]
    }

    fn hash(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Fingerprint> {
        let curve = self.curve_for(cx, output)?;
        let mut hasher = cx.hasher_for(output)?;
        curve.hash_into(&mut hasher);
        hasher.append_f32(cx.context().frame());
        Ok(hasher.finish())
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        let curve = self.curve_for(cx, output)?;
        Ok(PlugValue::Float(curve.evaluate(cx.context().frame())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Register the animation node type
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        ANIMATION_TYPE,
        NodeCategory::Animation,
        "Curves evaluated at the context frame",
        AnimationNode::new,
    ));
}

fn animation_behaviour(graph: &Graph, node: NodeId) -> Option<Arc<dyn NodeBehaviour>> {
    let node = graph.node(node)?;
    node.behaviour_as::<AnimationNode>()?;
    Some(Arc::clone(node.behaviour()))
}

fn with_animation<T>(behaviour: &Arc<dyn NodeBehaviour>, f: impl FnOnce(&AnimationNode) -> T) -> Result<T> {
    behaviour
        .as_any()
        .downcast_ref::<AnimationNode>()
        .map(f)
        .ok_or_else(|| GraphError::custom("not an animation node"))
}

/// Add a curve output to an animation node, returning the output plug
pub fn add_curve(graph: &mut Graph, node: NodeId) -> Result<PlugId> {
    let behaviour = animation_behaviour(graph, node).ok_or(GraphError::NodeNotFound(node))?;
    let curves = graph.plug_by_path(node, "curves")?;
    let count = graph.plug(curves).map_or(0, |p| p.children().len());
    let name = format!("curve{count}");

    with_animation(&behaviour, |animation| animation.set_curve(&name, Curve::new()))?;
    graph.add_plug(
        node,
        Some(curves),
        PlugDescriptor::output(name, PlugType::Float).with_flags(PlugFlags::dynamic()),
    )
}

/// The curve output driving `plug`, if it is animated
fn curve_plug(graph: &Graph, plug: PlugId) -> Option<PlugId> {
    let input = graph.input(plug)?;
    let node = graph.plug(input)?.node();
    animation_behaviour(graph, node).map(|_| input)
}

/// Whether `plug` is driven by an animation curve
pub fn is_animated(graph: &Graph, plug: PlugId) -> bool {
    curve_plug(graph, plug).is_some()
}

/// Whether `plug` can be driven by a curve
pub fn can_animate(graph: &Graph, plug: PlugId) -> bool {
    let Some(target) = graph.plug(plug) else {
        return false;
    };
    target.direction() == Direction::In
        && target.plug_type().is_numeric()
        && target.flags().accepts_inputs
        && !target.flags().read_only
        && (target.input().is_none() || is_animated(graph, plug))
}

/// Acquire the curve output driving `plug`, creating an animation node
/// alongside the plug's node on first use
pub fn animate(graph: &mut Graph, plug: PlugId) -> Result<PlugId> {
    if let Some(existing) = curve_plug(graph, plug) {
        return Ok(existing);
    }
    let target = graph.plug(plug).ok_or(GraphError::PlugNotFound(plug))?;
    if !target.plug_type().is_numeric() {
        return Err(GraphError::UnsupportedType(format!(
            "cannot animate {:?} plug \"{}\"",
            target.plug_type(),
            graph.full_name(plug)
        )));
    }
    if !can_animate(graph, plug) {
        return Err(GraphError::PermissionDenied {
            plug: graph.full_name(plug),
            reason: "plug cannot be animated".to_string(),
        });
    }

    let owner = target.node();
    let parent = graph.node(owner).and_then(|n| n.parent());
    let existing = graph
        .nodes()
        .find(|n| n.parent() == parent && n.behaviour_as::<AnimationNode>().is_some())
        .map(|n| n.id());
    let node = match existing {
        Some(node) => node,
        None => {
            let node = graph.create_node(ANIMATION_TYPE, "animation")?;
            graph.set_node_parent(node, parent)?;
            node
        }
    };

    let output = add_curve(graph, node)?;
    graph.set_input(plug, Some(output))?;
    tracing::debug!(plug = %graph.full_name(plug), curve = %graph.full_name(output), "animated");
    Ok(output)
}

/// Copy of the curve driving `plug`
pub fn curve(graph: &Graph, plug: PlugId) -> Option<Curve> {
    let output = curve_plug(graph, plug)?;
    let owner = graph.plug(output)?;
    graph
        .node(owner.node())?
        .behaviour_as::<AnimationNode>()?
        .curve(owner.name())
}

/// Replace the curve behind `output` through an undoable action
fn edit_curve(graph: &mut Graph, output: PlugId, description: String, edit: impl FnOnce(&mut Curve)) -> Result<()> {
    let owner = graph.plug(output).ok_or(GraphError::PlugNotFound(output))?;
    let node = owner.node();
    let name = owner.name().to_string();
    let behaviour = animation_behaviour(graph, node).ok_or(GraphError::NodeNotFound(node))?;

    let before = with_animation(&behaviour, |animation| animation.curve(&name))?
        .ok_or_else(|| GraphError::MissingDependency(format!("no curve \"{name}\"")))?;
    let mut after = before.clone();
    edit(&mut after);
    if after == before {
        return Ok(());
    }

    let apply = move |curve: Curve| {
        let name = name.clone();
        move |graph: &mut Graph| -> Result<()> {
            let behaviour = animation_behaviour(graph, node).ok_or(GraphError::NodeNotFound(node))?;
            with_animation(&behaviour, |animation| animation.set_curve(&name, curve.clone()))?;
            graph.propagate_dirtiness(&[output]);
            Ok(())
        }
    };
    graph.enact(Action::new(description, apply(after), apply(before)))
}

/// Insert or replace a key on the curve driving `plug`
pub fn set_key(graph: &mut Graph, plug: PlugId, key: Key) -> Result<()> {
    let output = curve_plug(graph, plug).ok_or_else(|| GraphError::MissingDependency(format!(
        "\"{}\" is not animated",
        graph.full_name(plug)
    )))?;
    let description = format!("Set key on {} at frame {}", graph.full_name(plug), key.frame);
    edit_curve(graph, output, description, |curve| {
        curve.add_key(key);
    })
}

/// Remove the key at `frame` from the curve driving `plug`
pub fn remove_key(graph: &mut Graph, plug: PlugId, frame: f32) -> Result<Option<Key>> {
    let Some(existing) = curve(graph, plug).and_then(|c| c.key_at(frame).copied()) else {
        return Ok(None);
    };
    let output = curve_plug(graph, plug).ok_or(GraphError::PlugNotFound(plug))?;
    let description = format!("Remove key on {} at frame {frame}", graph.full_name(plug));
    edit_curve(graph, output, description, |curve| {
        curve.remove_key(frame);
    })?;
    Ok(Some(existing))
}

/// Key `value` at `frame` when `plug` is animated, otherwise set its value.
///
/// An existing key at the frame keeps its interpolation and tangents.
pub fn set_value_or_insert_key(graph: &mut Graph, plug: PlugId, frame: f32, value: f32) -> Result<()> {
    if !is_animated(graph, plug) {
        return graph.set_value(plug, value);
    }
    let key = match curve(graph, plug).and_then(|c| c.key_at(frame).copied()) {
        Some(existing) => Key { value, ..existing },
        None => Key::new(frame, value),
    };
    set_key(graph, plug, key)
}
