// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Attributes` node: adds named attributes to parameter data.

use plexus_graph::plug_algo::create_plug_from_value;
use plexus_graph::{
    CompoundData, ComputeContext, Direction, Fingerprint, Graph, GraphError, NodeBehaviour, NodeId, PlugDescriptor,
    PlugFlags, PlugId, PlugType, PlugValue, Result,
};
use std::any::Any;

/// Registered type name of the attributes node
pub const ATTRIBUTES_TYPE: &str = "Attributes";

/// Merges the members under `attributes`, then `extra_attributes`, into `in`
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesNode;

impl AttributesNode {
    fn adds_nothing(cx: &ComputeContext<'_>) -> Result<bool> {
        Ok(cx.children("attributes")?.is_empty() && cx.compound("extra_attributes")?.is_empty())
    }
}

impl NodeBehaviour for AttributesNode {
    fn type_name(&self) -> &'static str {
        ATTRIBUTES_TYPE
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("in", CompoundData::new()),
            PlugDescriptor::container("attributes", Direction::In, Vec::new()),
            PlugDescriptor::input("extra_attributes", CompoundData::new()),
            PlugDescriptor::output("out", PlugType::Compound),
        ]
    }

    fn hash(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Fingerprint> {
        if Self::adds_nothing(cx)? {
            return cx.hash("in");
        }
        cx.default_hash(output)
    }

    fn compute(&self, cx: &ComputeContext<'_>, _output: PlugId) -> Result<PlugValue> {
        let mut attributes = cx.compound("in")?;
        for member in cx.children("attributes")? {
            let path = cx.relative_name(member);
            if !cx.bool(&format!("{path}.enabled"))? {
                continue;
            }
            let name = cx.string(&format!("{path}.name"))?;
            if name.is_empty() {
                continue;
            }
            attributes.insert(name, cx.value(&format!("{path}.value"))?.to_value());
        }
        for (name, value) in cx.compound("extra_attributes")?.iter() {
            attributes.insert(name.clone(), value.clone());
        }
        Ok(PlugValue::Compound(attributes))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Add an attribute member to an attributes node, returning the member plug
pub fn add_attribute(
    graph: &mut Graph,
    node: NodeId,
    name: &str,
    value: impl Into<PlugValue>,
    enabled: bool,
) -> Result<PlugId> {
    let container = graph.plug_by_path(node, "attributes")?;
    let count = graph
        .plug(container)
        .map(|p| p.children().len())
        .ok_or(GraphError::PlugNotFound(container))?;
    let descriptor = PlugDescriptor::container(
        format!("member{count}"),
        Direction::In,
        vec![
            PlugDescriptor::input("name", name),
            create_plug_from_value("value", Direction::In, PlugFlags::default(), &value.into())?,
            PlugDescriptor::input("enabled", enabled),
        ],
    )
    .with_flags(PlugFlags::dynamic());
    graph.add_plug(node, Some(container), descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_graph::Context;
    use std::sync::Arc;

    fn attributes_graph() -> (Graph, NodeId, PlugId, PlugId) {
        let mut graph = Graph::new("attributes");
        let node = graph.add_node("attributes", Arc::new(AttributesNode)).unwrap();
        let input = graph.plug_by_path(node, "in").unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();
        let mut inherited = CompoundData::new();
        inherited.insert("visible", true);
        graph.set_value(input, inherited).unwrap();
        (graph, node, input, out)
    }

    fn attribute(graph: &Graph, out: PlugId, name: &str) -> Option<PlugValue> {
        let value = graph.get_value(out, &Context::default()).unwrap().to_value();
        value.as_compound().and_then(|c| c.get(name).cloned())
    }

    #[test]
    fn test_pass_through_hash() {
        let (graph, _, input, out) = attributes_graph();
        let ctx = Context::default();
        assert_eq!(graph.hash(out, &ctx).unwrap(), graph.hash(input, &ctx).unwrap());
        assert_eq!(attribute(&graph, out, "visible"), Some(PlugValue::Bool(true)));
    }

    #[test]
    fn test_members_and_extras() {
        let (mut graph, node, input, out) = attributes_graph();
        let ctx = Context::default();
        add_attribute(&mut graph, node, "visible", false, true).unwrap();
        add_attribute(&mut graph, node, "sides", 2, false).unwrap();
        assert_ne!(graph.hash(out, &ctx).unwrap(), graph.hash(input, &ctx).unwrap());
        assert_eq!(attribute(&graph, out, "visible"), Some(PlugValue::Bool(false)));
        assert_eq!(attribute(&graph, out, "sides"), None);

        let mut extras = CompoundData::new();
        extras.insert("visible", true);
        extras.insert("matte", 1.0);
        graph
            .set_value(graph.plug_by_path(node, "extra_attributes").unwrap(), extras)
            .unwrap();
        assert_eq!(attribute(&graph, out, "visible"), Some(PlugValue::Bool(true)));
        assert_eq!(attribute(&graph, out, "matte"), Some(PlugValue::Float(1.0)));
    }
}
