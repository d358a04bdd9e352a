// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes that evaluate their input under a modified context.

use super::{corresponding_plug, default_output};
use crate::compute::ComputeContext;
use crate::context::Context;
use crate::error::Result;
use crate::node::NodeBehaviour;
use crate::plug::{Direction, PlugDescriptor, PlugId};
use crate::value::{PlugType, PlugValue};
use std::any::Any;

fn pass_through(plug_type: &PlugType, mut plugs: Vec<PlugDescriptor>) -> Vec<PlugDescriptor> {
    plugs.push(PlugDescriptor::new("in", Direction::In, plug_type.clone()));
    plugs.push(PlugDescriptor::output("out", plug_type.clone()));
    plugs
}

/// Sets `variable` to `value` in the context seen by `in`
#[derive(Debug, Clone)]
pub struct ContextVariablesNode {
    plug_type: PlugType,
}

impl ContextVariablesNode {
    /// Create for plugs of `plug_type`
    pub fn new(plug_type: PlugType) -> Self {
        Self { plug_type }
    }
}

impl NodeBehaviour for ContextVariablesNode {
    fn type_name(&self) -> &'static str {
        "ContextVariables"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        pass_through(
            &self.plug_type,
            vec![
                PlugDescriptor::input("variable", ""),
                PlugDescriptor::input("value", ""),
            ],
        )
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        default_output(cx, output)
    }

    fn active_source(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Option<(PlugId, Context)>> {
        let Some(input) = corresponding_plug(cx, output, "out", "in")? else {
            return Ok(None);
        };
        let variable = cx.string("variable")?;
        let context = if variable.is_empty() {
            cx.context().clone()
        } else {
            cx.context().with(variable, cx.string("value")?)
        };
        Ok(Some((input, context)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Evaluates `in` at `frame * speed + offset`
#[derive(Debug, Clone)]
pub struct TimeWarpNode {
    plug_type: PlugType,
}

impl TimeWarpNode {
    /// Create for plugs of `plug_type`
    pub fn new(plug_type: PlugType) -> Self {
        Self { plug_type }
    }
}

impl NodeBehaviour for TimeWarpNode {
    fn type_name(&self) -> &'static str {
        "TimeWarp"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        pass_through(
            &self.plug_type,
            vec![
                PlugDescriptor::input("speed", 1.0),
                PlugDescriptor::input("offset", 0.0),
            ],
        )
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        default_output(cx, output)
    }

    fn active_source(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Option<(PlugId, Context)>> {
        let Some(input) = corresponding_plug(cx, output, "out", "in")? else {
            return Ok(None);
        };
        let frame = cx.context().frame() * cx.float("speed")? + cx.float("offset")?;
        Ok(Some((input, cx.context().with_frame(frame))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::graph::Graph;
    use crate::value::PlugValue;

    #[test]
    fn test_time_warp_remaps_frame() {
        let mut graph = Graph::new("warp");
        let warp = graph.create_node("TimeWarp", "warp").unwrap();
        graph.set_value(graph.plug_by_path(warp, "speed").unwrap(), 2.0).unwrap();
        graph.set_value(graph.plug_by_path(warp, "offset").unwrap(), -1.0).unwrap();
        let out = graph.plug_by_path(warp, "out").unwrap();

        let (source, context) = graph.resolve_source(out, &Context::at_frame(5.0)).unwrap();
        assert_eq!(source, graph.plug_by_path(warp, "in").unwrap());
        assert_eq!(context.frame(), 9.0);
    }

    #[test]
    fn test_context_variables() {
        let mut graph = Graph::new("vars");
        let node = graph.create_node("ContextVariables", "vars").unwrap();
        graph.set_value(graph.plug_by_path(node, "variable").unwrap(), "shot").unwrap();
        graph.set_value(graph.plug_by_path(node, "value").unwrap(), "sh010").unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();

        let (_, context) = graph.resolve_source(out, &Context::default()).unwrap();
        assert_eq!(context.get("shot"), Some(&PlugValue::from("sh010")));
        assert_eq!(context.frame(), 1.0);
    }
}
