// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Tweaks` node: applies tweak plugs to parameter data.

use crate::tweak::{apply_tweaks, Tweak};
use plexus_graph::{
    CompoundData, ComputeContext, Direction, Fingerprint, NodeBehaviour, PlugDescriptor, PlugId, PlugType, PlugValue,
    Result,
};
use std::any::Any;

/// Registered type name of the tweaks node
pub const TWEAKS_TYPE: &str = "Tweaks";

/// Applies the tweaks under `tweaks` to `in`
#[derive(Debug, Clone, Copy, Default)]
pub struct TweaksNode;

impl TweaksNode {
    /// Tweaks defined on the node, evaluated under the current context
    pub fn tweaks(&self, cx: &ComputeContext<'_>) -> Result<Vec<Tweak>> {
        cx.children("tweaks")?
            .into_iter()
            .map(|plug| {
                let path = cx.relative_name(plug);
                Tweak::from_members(|member| Ok(cx.value(&format!("{path}.{member}"))?.to_value()))
            })
            .collect()
    }
}

impl NodeBehaviour for TweaksNode {
    fn type_name(&self) -> &'static str {
        TWEAKS_TYPE
    }

    fn plugs(&self) -> Vec<PlugDescriptor> {
        vec![
            PlugDescriptor::input("in", CompoundData::new()),
            PlugDescriptor::input("ignore_missing", false),
            PlugDescriptor::container("tweaks", Direction::In, Vec::new()),
            PlugDescriptor::output("out", PlugType::Compound),
        ]
    }

    fn hash(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Fingerprint> {
        // Without tweaks `out` is `in`
        if cx.children("tweaks")?.is_empty() {
            return cx.hash("in");
        }
        cx.default_hash(output)
    }

    fn compute(&self, cx: &ComputeContext<'_>, _output: PlugId) -> Result<PlugValue> {
        let mut parameters = cx.compound("in")?;
        let tweaks = self.tweaks(cx)?;
        apply_tweaks(&tweaks, &mut parameters, !cx.bool("ignore_missing")?)?;
        Ok(PlugValue::Compound(parameters))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tweak::{add_tweak_plug, TweakMode};
    use plexus_graph::{Context, Graph, GraphError};
    use std::sync::Arc;

    fn tweaks_graph() -> (Graph, plexus_graph::NodeId) {
        let mut graph = Graph::new("tweaks");
        let node = graph.add_node("tweaks", Arc::new(TweaksNode)).unwrap();
        let mut parameters = CompoundData::new();
        parameters.insert("exposure", 1.5);
        parameters.insert("samples", 4);
        graph.set_value(graph.plug_by_path(node, "in").unwrap(), parameters).unwrap();
        (graph, node)
    }

    #[test]
    fn test_passes_through_without_tweaks() {
        let (graph, node) = tweaks_graph();
        let input = graph.plug_by_path(node, "in").unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();
        let ctx = Context::default();

        assert_eq!(graph.hash(out, &ctx).unwrap(), graph.hash(input, &ctx).unwrap());
        assert_eq!(
            graph.get_value(out, &ctx).unwrap().to_value(),
            graph.get_value(input, &ctx).unwrap().to_value()
        );
    }

    #[test]
    fn test_applies_tweak_plugs() {
        let (mut graph, node) = tweaks_graph();
        let tweaks = graph.plug_by_path(node, "tweaks").unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();
        let ctx = Context::default();
        let before = graph.hash(out, &ctx).unwrap();

        add_tweak_plug(&mut graph, tweaks, "samples", 2, TweakMode::Multiply, true).unwrap();
        add_tweak_plug(&mut graph, tweaks, "exposure", 0.0, TweakMode::Remove, true).unwrap();
        assert_ne!(graph.hash(out, &ctx).unwrap(), before);

        let value = graph.get_value(out, &ctx).unwrap().to_value();
        let result = value.as_compound().unwrap();
        assert_eq!(result.get("samples"), Some(&PlugValue::Int(8)));
        assert!(!result.contains("exposure"));
    }

    #[test]
    fn test_ignore_missing() {
        let (mut graph, node) = tweaks_graph();
        let tweaks = graph.plug_by_path(node, "tweaks").unwrap();
        let out = graph.plug_by_path(node, "out").unwrap();
        let ctx = Context::default();
        add_tweak_plug(&mut graph, tweaks, "gamma", 2.2, TweakMode::Replace, true).unwrap();

        let error = graph.get_value(out, &ctx).unwrap_err();
        assert!(matches!(error.root_cause(), GraphError::MissingDependency(_)));

        graph
            .set_value(graph.plug_by_path(node, "ignore_missing").unwrap(), true)
            .unwrap();
        let value = graph.get_value(out, &ctx).unwrap().to_value();
        assert_eq!(value.as_compound().unwrap().get("gamma"), Some(&PlugValue::Float(2.2)));
    }
}
