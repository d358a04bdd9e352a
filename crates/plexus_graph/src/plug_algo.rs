// SPDX-License-Identifier: MIT OR Apache-2.0
//! Algorithms over plugs: source queries, promotion onto an enclosing node,
//! and mapping between plugs and plain values.

use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::plug::{Direction, PlugDescriptor, PlugFlags, PlugId};
use crate::value::{PlugType, PlugValue};

/// The plug that ultimately supplies `plug`'s value, through any number of
/// connection hops
pub fn source(graph: &Graph, plug: PlugId) -> PlugId {
    graph.source(plug)
}

/// The plug and context supplying `plug`'s value under `context`, following
/// connections and the active branches of context-sensitive nodes
pub fn context_sensitive_source(graph: &Graph, plug: PlugId, context: &Context) -> Result<(PlugId, Context)> {
    graph.resolve_source(plug, context)
}

/// Whether the value of `plug`, or of any of its children, comes from a
/// node's compute
pub fn depends_on_compute(graph: &Graph, plug: PlugId) -> Result<bool> {
    let source = graph.source(plug);
    if graph.is_computed(source) {
        return Ok(true);
    }
    let children = graph.plug(plug).ok_or(GraphError::PlugNotFound(plug))?.children().to_vec();
    for child in children {
        if depends_on_compute(graph, child)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// Promotion

fn is_ancestor(graph: &Graph, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = graph.node(node).and_then(|n| n.parent());
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = graph.node(id).and_then(|n| n.parent());
    }
    false
}

/// The plug on an enclosing node that `plug` is connected to, if any
fn external_plug(graph: &Graph, plug: PlugId) -> Option<PlugId> {
    let internal = graph.plug(plug)?;
    let node = internal.node();
    let on_ancestor = |other: &PlugId| graph.plug(*other).is_some_and(|p| is_ancestor(graph, p.node(), node));
    match internal.direction() {
        Direction::In => internal.input().filter(on_ancestor),
        Direction::Out => internal.outputs().iter().copied().find(on_ancestor),
    }
}

/// Whether `plug`, or one of its parent plugs, is driven by or drives a plug
/// on an enclosing node
pub fn is_promoted(graph: &Graph, plug: PlugId) -> bool {
    if external_plug(graph, plug).is_some() {
        return true;
    }
    graph
        .plug(plug)
        .and_then(|p| p.parent())
        .is_some_and(|parent| is_promoted(graph, parent))
}

fn check_promotion(graph: &Graph, plug_id: PlugId, parent: Option<PlugId>) -> Result<NodeId> {
    let plug = graph.plug(plug_id).ok_or(GraphError::PlugNotFound(plug_id))?;
    let refuse = |reason: &str| GraphError::Promotion {
        plug: graph.full_name(plug_id),
        reason: reason.to_string(),
    };

    let enclosing = graph
        .node(plug.node())
        .and_then(|node| node.parent())
        .ok_or_else(|| refuse("node has no enclosing node"))?;
    if is_promoted(graph, plug_id) {
        return Err(refuse("plug is already promoted"));
    }
    if plug.direction() == Direction::In {
        let flags = plug.flags();
        if !flags.serialisable {
            return Err(refuse("plug is not serialisable"));
        }
        if !flags.accepts_inputs {
            return Err(refuse("plug does not accept inputs"));
        }
        if plug.input().is_some() {
            return Err(refuse("plug already has an input"));
        }
    }
    if let Some(parent) = parent {
        let parent_plug = graph.plug(parent).ok_or(GraphError::PlugNotFound(parent))?;
        if parent_plug.node() != enclosing {
            return Err(refuse("parent plug does not belong to the enclosing node"));
        }
    }
    Ok(enclosing)
}

/// Whether `plug` may be promoted, optionally under `parent` on the
/// enclosing node
pub fn can_promote(graph: &Graph, plug: PlugId, parent: Option<PlugId>) -> bool {
    check_promotion(graph, plug, parent).is_ok()
}

/// Promote `plug` onto its enclosing node, named after its relative path
pub fn promote(graph: &mut Graph, plug: PlugId, parent: Option<PlugId>) -> Result<PlugId> {
    let name = graph.relative_name(plug).replace('.', "_");
    promote_with_name(graph, plug, &name, parent)
}

/// Create a plug on the enclosing node that mirrors `plug` and connect the
/// two. An input plug is driven by the new external plug, which takes over
/// its current value; an output plug drives the external plug.
pub fn promote_with_name(graph: &mut Graph, plug: PlugId, name: &str, parent: Option<PlugId>) -> Result<PlugId> {
    let enclosing = check_promotion(graph, plug, parent)?;

    let name = unique_name(graph, enclosing, parent, name);
    let descriptor = descriptor_of(graph, plug)?;
    let flags = PlugFlags {
        dynamic: true,
        serialisable: true,
        ..descriptor.flags
    };
    let descriptor = PlugDescriptor { name, ..descriptor }.with_flags(flags);
    let direction = descriptor.direction;
    let external = graph.add_plug(enclosing, parent, descriptor)?;

    match direction {
        Direction::In => {
            let value = graph.stored_value(plug)?;
            graph.set_value(external, value)?;
            graph.set_input(plug, Some(external))?;
        }
        Direction::Out => graph.set_input(external, Some(plug))?,
    }
    tracing::debug!(plug = %graph.full_name(plug), external = %graph.full_name(external), "promoted");
    Ok(external)
}

/// Undo a promotion: disconnect `plug` from its external plug and remove the
/// external plug, along with any parent plug it leaves empty
pub fn unpromote(graph: &mut Graph, plug: PlugId) -> Result<()> {
    // Children of a promoted compound are connected pairwise; the promotion
    // belongs to the outermost promoted parent.
    if let Some(parent) = graph.plug(plug).and_then(|p| p.parent()) {
        if is_promoted(graph, parent) {
            return unpromote(graph, parent);
        }
    }
    let Some(external) = external_plug(graph, plug) else {
        return Err(GraphError::Promotion {
            plug: graph.full_name(plug),
            reason: "plug is not promoted".to_string(),
        });
    };

    let direction = graph.plug(plug).map(|p| p.direction()).ok_or(GraphError::PlugNotFound(plug))?;
    match direction {
        Direction::In => {
            let value = graph.stored_value(external)?;
            graph.set_input(plug, None)?;
            graph.set_value(plug, value)?;
        }
        Direction::Out => graph.set_input(external, None)?,
    }

    let mut parent = graph.plug(external).and_then(|p| p.parent());
    graph.remove_plug(external)?;
    while let Some(id) = parent {
        let Some(ancestor) = graph.plug(id) else {
            break;
        };
        let unused = ancestor.children().is_empty()
            && ancestor.input().is_none()
            && ancestor.outputs().is_empty()
            && ancestor.flags().dynamic;
        if !unused {
            break;
        }
        parent = ancestor.parent();
        graph.remove_plug(id)?;
    }
    Ok(())
}

fn unique_name(graph: &Graph, node: NodeId, parent: Option<PlugId>, base: &str) -> String {
    let prefix = parent.map(|p| format!("{}.", graph.relative_name(p))).unwrap_or_default();
    let taken = |name: &str| graph.plug_by_path(node, &format!("{prefix}{name}")).is_ok();
    if !taken(base) {
        return base.to_string();
    }
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    (1..)
        .map(|i| format!("{stem}{i}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

/// Describe an existing plug and its children so it can be recreated
fn descriptor_of(graph: &Graph, plug_id: PlugId) -> Result<PlugDescriptor> {
    let plug = graph.plug(plug_id).ok_or(GraphError::PlugNotFound(plug_id))?;
    let children = plug
        .children()
        .iter()
        .map(|child| descriptor_of(graph, *child))
        .collect::<Result<Vec<_>>>()?;
    Ok(PlugDescriptor {
        name: plug.name().to_string(),
        direction: plug.direction(),
        plug_type: plug.plug_type().clone(),
        default_value: plug.default_value().clone(),
        flags: plug.flags(),
        children,
    })
}

// Value mapping

/// Describe a plug able to hold `value`.
///
/// Parameter data has no plug mapping and is refused with `UnsupportedType`.
pub fn create_plug_from_value(
    name: &str,
    direction: Direction,
    flags: PlugFlags,
    value: &PlugValue,
) -> Result<PlugDescriptor> {
    let plug_type = value.plug_type();
    if matches!(plug_type, PlugType::Compound | PlugType::Container) {
        return Err(GraphError::UnsupportedType(format!(
            "no plug type for {plug_type:?} value \"{name}\""
        )));
    }
    Ok(PlugDescriptor::new(name, direction, plug_type)
        .with_default(value.clone())
        .with_flags(flags))
}

/// Effective value of `plug` as plain data, aggregated over children
pub fn get_value_as_data(graph: &Graph, plug: PlugId, context: &Context) -> Result<PlugValue> {
    Ok(graph.get_value(plug, context)?.to_value())
}

/// Whether `value` converts to something `plug` can hold
pub fn can_set_value_from_data(graph: &Graph, plug: PlugId, value: &PlugValue) -> bool {
    let Some(target) = graph.plug(plug) else {
        return false;
    };
    if target.plug_type() != &PlugType::Container {
        return value.coerce(target.plug_type()).is_some();
    }
    let Some(data) = value.as_compound() else {
        return false;
    };
    data.iter().all(|(name, member)| {
        target
            .children()
            .iter()
            .find(|child| graph.plug(**child).is_some_and(|c| c.name() == name))
            .is_some_and(|child| can_set_value_from_data(graph, *child, member))
    })
}

/// Set `plug` from plain data, converting between numeric, vector and color
/// types where a conversion exists
pub fn set_value_from_data(graph: &mut Graph, plug: PlugId, value: PlugValue) -> Result<()> {
    if !can_set_value_from_data(graph, plug, &value) {
        let expected = graph
            .plug(plug)
            .map(|p| p.plug_type().clone())
            .ok_or(GraphError::PlugNotFound(plug))?;
        return Err(GraphError::TypeMismatch {
            plug: graph.full_name(plug),
            expected,
            found: value.plug_type(),
        });
    }
    graph.set_value(plug, value)
}
