// SPDX-License-Identifier: MIT OR Apache-2.0
//! Grouping node. Holds child nodes and their promoted plugs, computes nothing.

use crate::compute::ComputeContext;
use crate::error::{GraphError, Result};
use crate::node::NodeBehaviour;
use crate::plug::{PlugDescriptor, PlugId};
use crate::value::PlugValue;
use std::any::Any;

/// Container for other nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxNode;

impl NodeBehaviour for BoxNode {
    fn type_name(&self) -> &'static str {
        "Box"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        Vec::new()
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        Err(GraphError::custom(format!(
            "Box does not compute \"{}\"",
            cx.relative_name(output)
        )))
    }

    fn computes(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
