// SPDX-License-Identifier: MIT OR Apache-2.0
//! Switch node: passes one of several inputs through to `out`.

use super::{corresponding_plug, default_output};
use crate::compute::ComputeContext;
use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{NodeBehaviour, NodeId};
use crate::plug::{Direction, PlugDescriptor, PlugFlags, PlugId};
use crate::value::{PlugType, PlugValue};
use std::any::Any;

/// Selects input `index mod len`, or the first input when disabled
#[derive(Debug, Clone)]
pub struct SwitchNode {
    plug_type: PlugType,
    inputs: usize,
}

impl SwitchNode {
    /// Create a switch over plugs of `plug_type` with two inputs
    pub fn new(plug_type: PlugType) -> Self {
        Self { plug_type, inputs: 2 }
    }

    /// Set the number of inputs created with the node
    pub fn with_inputs(mut self, inputs: usize) -> Self {
        self.inputs = inputs;
        self
    }

    /// Child plug of `in` that is active under the context
    pub fn active_input(&self, cx: &ComputeContext<'_>) -> Result<Option<PlugId>> {
        let inputs = cx.children("in")?;
        if inputs.is_empty() {
            return Ok(None);
        }
        let index = if cx.bool("enabled")? {
            cx.int("index")?.rem_euclid(inputs.len() as i32) as usize
        } else {
            0
        };
        Ok(inputs.get(index).copied())
    }
}

impl NodeBehaviour for SwitchNode {
    fn type_name(&self) -> &'static str {
        "Switch"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        let inputs = (0..self.inputs)
            .map(|i| PlugDescriptor::new(format!("in{i}"), Direction::In, self.plug_type.clone()))
            .collect();
        vec![
            PlugDescriptor::input("index", 0),
            PlugDescriptor::input("enabled", true),
            PlugDescriptor::container("in", Direction::In, inputs),
            PlugDescriptor::output("out", self.plug_type.clone()),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        default_output(cx, output)
    }

    fn active_source(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Option<(PlugId, Context)>> {
        let Some(active) = self.active_input(cx)? else {
            return Ok(None);
        };
        let to = cx.relative_name(active);
        Ok(corresponding_plug(cx, output, "out", &to)?.map(|plug| (plug, cx.context().clone())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Append another input to a switch node, typed after its `out` plug
pub fn add_switch_input(graph: &mut Graph, node: NodeId) -> Result<PlugId> {
    let container = graph.plug_by_path(node, "in")?;
    let out = graph.plug_by_path(node, "out")?;
    let plug_type = graph
        .plug(out)
        .map(|p| p.plug_type().clone())
        .ok_or(GraphError::PlugNotFound(out))?;
    let count = graph.plug(container).map_or(0, |p| p.children().len());
    graph.add_plug(
        node,
        Some(container),
        PlugDescriptor::new(format!("in{count}"), Direction::In, plug_type).with_flags(PlugFlags::dynamic()),
    )
}
