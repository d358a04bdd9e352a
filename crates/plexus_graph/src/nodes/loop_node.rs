// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loop node: evaluates a network repeatedly, feeding each iteration's
//! result back in through `previous`.

use super::{corresponding_plug, default_output};
use crate::compute::ComputeContext;
use crate::context::Context;
use crate::error::Result;
use crate::node::NodeBehaviour;
use crate::plug::{Direction, PlugDescriptor, PlugId};
use crate::value::{PlugType, PlugValue};
use std::any::Any;

/// Default name of the context variable holding the iteration index
pub const DEFAULT_INDEX_VARIABLE: &str = "loop:index";

/// `out` is `next` evaluated at the last iteration. `previous` at iteration
/// `i` is `next` at `i - 1`, or `in` for the first iteration.
#[derive(Debug, Clone)]
pub struct LoopNode {
    plug_type: PlugType,
}

impl LoopNode {
    /// Create a loop over values of `plug_type`
    pub fn new(plug_type: PlugType) -> Self {
        Self { plug_type }
    }

    fn iteration(context: &Context, variable: &str) -> Option<i32> {
        context.get(variable).and_then(PlugValue::as_int)
    }
}

impl NodeBehaviour for LoopNode {
    fn type_name(&self) -> &'static str {
        "Loop"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::new("in", Direction::In, self.plug_type.clone()),
            PlugDescriptor::new("next", Direction::In, self.plug_type.clone()),
            PlugDescriptor::input("iterations", 10),
            PlugDescriptor::input("index_variable", DEFAULT_INDEX_VARIABLE),
            PlugDescriptor::output("out", self.plug_type.clone()),
            PlugDescriptor::output("previous", self.plug_type.clone()),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        default_output(cx, output)
    }

    fn active_source(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Option<(PlugId, Context)>> {
        let variable = cx.string("index_variable")?;
        let context = cx.context();

        if let Some(next) = corresponding_plug(cx, output, "out", "next")? {
            let iterations = cx.int("iterations")?;
            if iterations <= 0 || variable.is_empty() {
                let input = corresponding_plug(cx, output, "out", "in")?;
                return Ok(input.map(|plug| (plug, context.clone())));
            }
            return Ok(Some((next, context.with(variable, iterations - 1))));
        }

        if corresponding_plug(cx, output, "previous", "in")?.is_none() {
            return Ok(None);
        }
        match Self::iteration(context, &variable) {
            Some(index) if index >= 1 => {
                let next = corresponding_plug(cx, output, "previous", "next")?;
                Ok(next.map(|plug| (plug, context.with(variable, index - 1))))
            }
            _ => {
                let input = corresponding_plug(cx, output, "previous", "in")?;
                Ok(input.map(|plug| (plug, context.without(&variable))))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
