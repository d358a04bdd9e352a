// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene processors for Plexus.
//!
//! Parameter data flows through `Compound` plugs. This crate edits it:
//! - Modal tweaks applied to parameters or to shader networks
//! - A `Tweaks` node driven by tweak plugs
//! - An `Attributes` node merging named attributes into its input

pub mod attributes;
pub mod shader_network;
pub mod tweak;
pub mod tweaks_node;

pub use attributes::{add_attribute, AttributesNode, ATTRIBUTES_TYPE};
pub use shader_network::{apply_tweaks_to_network, Connection, Parameter, Shader, ShaderNetwork};
pub use tweak::{add_tweak_plug, apply_tweaks, Tweak, TweakMode};
pub use tweaks_node::{TweaksNode, TWEAKS_TYPE};

use plexus_graph::{NodeCategory, NodeRegistry, NodeType};

/// Register the scene node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        TWEAKS_TYPE,
        NodeCategory::Scene,
        "Applies tweaks to parameter data",
        || TweaksNode,
    ));
    registry.register(NodeType::new(
        ATTRIBUTES_TYPE,
        NodeCategory::Scene,
        "Adds attributes to parameter data",
        || AttributesNode,
    ));
}
