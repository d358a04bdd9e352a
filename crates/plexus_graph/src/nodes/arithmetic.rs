// SPDX-License-Identifier: MIT OR Apache-2.0
//! Simple numeric compute nodes.

use super::unknown_output;
use crate::compute::ComputeContext;
use crate::error::{GraphError, Result};
use crate::node::NodeBehaviour;
use crate::plug::{PlugDescriptor, PlugId};
use crate::value::{PlugType, PlugValue};
use std::any::Any;

/// Integer sum: `sum = op1 + op2`
#[derive(Debug, Default, Clone, Copy)]
pub struct AddNode;

impl NodeBehaviour for AddNode {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("op1", 0),
            PlugDescriptor::input("op2", 0),
            PlugDescriptor::output("sum", PlugType::Int),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        if output != cx.plug("sum")? {
            return Err(unknown_output(cx, output));
        }
        cx.int("op1")?
            .checked_add(cx.int("op2")?)
            .map(PlugValue::Int)
            .ok_or_else(|| GraphError::custom("integer overflow"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Operation performed by [`ArithmeticNode`], stored as an int plug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`
    Divide,
}

impl ArithmeticOp {
    /// Decode from the `operation` plug value
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Add),
            1 => Some(Self::Subtract),
            2 => Some(Self::Multiply),
            3 => Some(Self::Divide),
            _ => None,
        }
    }

    /// Encode for the `operation` plug
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Apply to two operands
    pub fn apply(self, a: f32, b: f32) -> Result<f32> {
        match self {
            Self::Add => Ok(a + b),
            Self::Subtract => Ok(a - b),
            Self::Multiply => Ok(a * b),
            Self::Divide if b == 0.0 => Err(GraphError::custom("division by zero")),
            Self::Divide => Ok(a / b),
        }
    }
}

/// Float arithmetic: `out = a <operation> b`
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticNode;

impl NodeBehaviour for ArithmeticNode {
    fn type_name(&self) -> &'static str {
        "Arithmetic"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("a", 0.0),
            PlugDescriptor::input("b", 0.0),
            PlugDescriptor::input("operation", ArithmeticOp::Add.index()),
            PlugDescriptor::output("out", PlugType::Float),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        if output != cx.plug("out")? {
            return Err(unknown_output(cx, output));
        }
        let index = cx.int("operation")?;
        let op = ArithmeticOp::from_index(index)
            .ok_or_else(|| GraphError::custom(format!("invalid operation {index}")))?;
        op.apply(cx.float("a")?, cx.float("b")?).map(PlugValue::Float)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::graph::Graph;

    #[test]
    fn test_arithmetic_ops() {
        assert_eq!(ArithmeticOp::Multiply.apply(4.0, 2.0), Ok(8.0));
        assert_eq!(ArithmeticOp::from_index(1), Some(ArithmeticOp::Subtract));
        assert!(ArithmeticOp::Divide.apply(1.0, 0.0).is_err());
    }

    #[test]
    fn test_division_by_zero_names_plug() {
        let mut graph = Graph::new("arith");
        let node = graph.create_node("Arithmetic", "div").unwrap();
        let operation = graph.plug_by_path(node, "operation").unwrap();
        graph.set_value(operation, ArithmeticOp::Divide.index()).unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();

        let error = graph.get_value(out, &Context::default()).unwrap_err();
        match error {
            GraphError::ComputeFailure { plug, source } => {
                assert_eq!(plug, "div.out");
                assert_eq!(*source, GraphError::custom("division by zero"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
