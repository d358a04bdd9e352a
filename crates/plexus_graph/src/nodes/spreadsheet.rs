// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spreadsheet node: picks a row value by matching a context variable
//! against row names.

use super::{corresponding_plug, default_output};
use crate::compute::ComputeContext;
use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{NodeBehaviour, NodeId};
use crate::plug::{Direction, PlugDescriptor, PlugFlags, PlugId};
use crate::value::{PlugType, PlugValue};
use std::any::Any;

/// Rows are matched in order; the first enabled row whose name matches the
/// selector wins, otherwise the `default` row supplies the value
#[derive(Debug, Clone)]
pub struct SpreadsheetNode {
    plug_type: PlugType,
}

impl SpreadsheetNode {
    /// Create with a single value column of `plug_type`
    pub fn new(plug_type: PlugType) -> Self {
        Self { plug_type }
    }

    /// Path of the row active under the context, such as `rows.row1`
    pub fn active_row(&self, cx: &ComputeContext<'_>) -> Result<String> {
        let rows = cx.children("rows")?;
        let default = || "rows.default".to_string();
        if !cx.bool("enabled")? {
            return Ok(default());
        }

        let selector = cx.string("selector")?;
        let key = selector_value(cx.context(), &selector);

        for row in rows.iter().skip(1) {
            let path = cx.relative_name(*row);
            if !cx.bool(&format!("{path}.enabled"))? {
                continue;
            }
            let name = cx.string(&format!("{path}.name"))?;
            if match_multiple(&name, &key) {
                return Ok(path);
            }
        }
        Ok(default())
    }
}

/// String form of the context entry named by `selector`, empty if absent
fn selector_value(context: &Context, selector: &str) -> String {
    match context.get(selector) {
        Some(PlugValue::String(value)) => value.clone(),
        Some(PlugValue::Int(value)) => value.to_string(),
        Some(PlugValue::Float(value)) => value.to_string(),
        Some(PlugValue::Bool(value)) => value.to_string(),
        _ => String::new(),
    }
}

/// Whether `value` matches any of the space-separated `patterns`.
///
/// Patterns support `*` (any run of characters) and `?` (one character).
pub fn match_multiple(patterns: &str, value: &str) -> bool {
    patterns
        .split_whitespace()
        .any(|pattern| match_pattern(pattern.as_bytes(), value.as_bytes()))
}

fn match_pattern(pattern: &[u8], value: &[u8]) -> bool {
    match (pattern.first(), value.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            match_pattern(&pattern[1..], value) || (!value.is_empty() && match_pattern(pattern, &value[1..]))
        }
        (Some(b'?'), Some(_)) => match_pattern(&pattern[1..], &value[1..]),
        (Some(p), Some(v)) if p == v => match_pattern(&pattern[1..], &value[1..]),
        _ => false,
    }
}

fn row_descriptor(name: &str, plug_type: &PlugType, flags: PlugFlags) -> PlugDescriptor {
    PlugDescriptor::container(
        name,
        Direction::In,
        vec![
            PlugDescriptor::input("name", ""),
            PlugDescriptor::input("enabled", true),
            PlugDescriptor::new("value", Direction::In, plug_type.clone()),
        ],
    )
    .with_flags(flags)
}

impl NodeBehaviour for SpreadsheetNode {
    fn type_name(&self) -> &'static str {
        "Spreadsheet"
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("selector", ""),
            PlugDescriptor::input("enabled", true),
            PlugDescriptor::container(
                "rows",
                Direction::In,
                vec![row_descriptor("default", &self.plug_type, PlugFlags::default())],
            ),
            PlugDescriptor::output("out", self.plug_type.clone()),
        ]
    }

    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue> {
        default_output(cx, output)
    }

    fn active_source(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Option<(PlugId, Context)>> {
        let row = self.active_row(cx)?;
        Ok(corresponding_plug(cx, output, "out", &format!("{row}.value"))?
            .map(|plug| (plug, cx.context().clone())))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Append a row named `name`, returning the row plug
pub fn add_row(graph: &mut Graph, node: NodeId, name: &str) -> Result<PlugId> {
    let rows = graph.plug_by_path(node, "rows")?;
    let default_value = graph.plug_by_path(node, "rows.default.value")?;
    let plug_type = graph
        .plug(default_value)
        .map(|p| p.plug_type().clone())
        .ok_or(GraphError::PlugNotFound(default_value))?;
    let count = graph.plug(rows).map_or(0, |p| p.children().len());

    let row = graph.add_plug(
        node,
        Some(rows),
        row_descriptor(&format!("row{count}"), &plug_type, PlugFlags::dynamic()),
    )?;
    let name_plug = graph.plug_by_path(node, &format!("rows.row{count}.name"))?;
    graph.set_value(name_plug, name)?;
    Ok(row)
}
