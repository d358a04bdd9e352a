// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.

pub mod arithmetic;
pub mod box_node;
pub mod context_processor;
pub mod loop_node;
pub mod spreadsheet;
pub mod switch;

pub use arithmetic::{AddNode, ArithmeticNode, ArithmeticOp};
pub use box_node::BoxNode;
pub use context_processor::{ContextVariablesNode, TimeWarpNode};
pub use loop_node::LoopNode;
pub use spreadsheet::{add_row, SpreadsheetNode};
pub use switch::{add_switch_input, SwitchNode};

use crate::compute::ComputeContext;
use crate::error::{GraphError, Result};
use crate::node::{NodeCategory, NodeRegistry, NodeType};
use crate::plug::PlugId;
use crate::value::{PlugType, PlugValue};

/// Register the built-in node types
pub fn register_builtins(registry: &mut NodeRegistry) {
    registry.register(NodeType::new("Add", NodeCategory::Math, "Sum of two integers", || AddNode));
    registry.register(NodeType::new(
        "Arithmetic",
        NodeCategory::Math,
        "Add, subtract, multiply or divide two floats",
        || ArithmeticNode,
    ));
    registry.register(NodeType::new("Box", NodeCategory::Utility, "Container for other nodes", || BoxNode));
    registry.register(NodeType::new("Switch", NodeCategory::Logic, "Selects one of its inputs", || {
        SwitchNode::new(PlugType::Float)
    }));
    registry.register(NodeType::new(
        "ContextVariables",
        NodeCategory::Context,
        "Sets a context variable for its input",
        || ContextVariablesNode::new(PlugType::Float),
    ));
    registry.register(NodeType::new("TimeWarp", NodeCategory::Context, "Remaps the frame for its input", || {
        TimeWarpNode::new(PlugType::Float)
    }));
    registry.register(NodeType::new(
        "Spreadsheet",
        NodeCategory::Logic,
        "Chooses a row value by matching a context variable",
        || SpreadsheetNode::new(PlugType::Float),
    ));
    registry.register(NodeType::new("Loop", NodeCategory::Logic, "Iterates a network", || {
        LoopNode::new(PlugType::Float)
    }));
}

/// Map `output`, which lives under `from`, to the plug at the same relative
/// position under `to`. `None` if `output` is not under `from`.
pub(crate) fn corresponding_plug(
    cx: &ComputeContext<'_>,
    output: PlugId,
    from: &str,
    to: &str,
) -> Result<Option<PlugId>> {
    let name = cx.relative_name(output);
    let Some(suffix) = name.strip_prefix(from) else {
        return Ok(None);
    };
    if !suffix.is_empty() && !suffix.starts_with('.') {
        return Ok(None);
    }
    cx.plug(&format!("{to}{suffix}")).map(Some)
}

/// Default value of an output, for selector nodes with nothing to select
pub(crate) fn default_output(cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
    cx.graph()
        .plug(output)
        .map(|plug| plug.default_value().clone())
        .ok_or(GraphError::PlugNotFound(output))
}

pub(crate) fn unknown_output(cx: &ComputeContext<'_>, output: PlugId) -> GraphError {
    GraphError::custom(format!("no compute for \"{}\"", cx.relative_name(output)))
}
