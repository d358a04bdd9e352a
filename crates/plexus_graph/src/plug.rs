// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plug definitions: typed value slots owned by nodes.
//!
//! Plugs live in the graph's arena. Connections are stored as ids in both
//! directions (`input` upstream, `outputs` downstream) and resolved by lookup.

use crate::node::NodeId;
use crate::value::{PlugType, PlugValue};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Unique identifier for a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlugId(pub Uuid);

impl PlugId {
    /// Create a new random plug ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlugId {
    fn default() -> Self {
        Self::new()
    }
}

/// Plug direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Input plug, holds a value or receives a connection
    In,
    /// Output plug, computed or passed through
    Out,
}

/// Behavioural flags of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlugFlags {
    /// Whether the plug may receive an input connection
    pub accepts_inputs: bool,
    /// Whether the plug's value belongs in a saved graph
    pub serialisable: bool,
    /// Whether the plug was added after node construction
    pub dynamic: bool,
    /// Whether `set_value` is refused
    pub read_only: bool,
}

impl PlugFlags {
    /// Flags for a plug added at runtime
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }
}

impl Default for PlugFlags {
    fn default() -> Self {
        Self {
            accepts_inputs: true,
            serialisable: true,
            dynamic: false,
            read_only: false,
        }
    }
}

/// Dirty state of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugState {
    /// Value is valid for the current graph state
    Clean,
    /// Value may be stale and is recomputed on next read
    Dirty,
}

/// Declarative description used to instantiate plugs on a node
#[derive(Debug, Clone, PartialEq)]
pub struct PlugDescriptor {
    /// Plug name, unique among siblings
    pub name: String,
    /// Direction
    pub direction: Direction,
    /// Declared type
    pub plug_type: PlugType,
    /// Default value
    pub default_value: PlugValue,
    /// Flags
    pub flags: PlugFlags,
    /// Child plugs
    pub children: Vec<PlugDescriptor>,
}

impl PlugDescriptor {
    /// Describe a plug of the given type.
    ///
    /// Aggregate types get one `Float` child per component.
    pub fn new(name: impl Into<String>, direction: Direction, plug_type: PlugType) -> Self {
        let default_value = plug_type.default_value();
        let mut descriptor = Self {
            name: name.into(),
            direction,
            plug_type,
            default_value: default_value.clone(),
            flags: PlugFlags::default(),
            children: Vec::new(),
        };
        descriptor.set_aggregate_children(&default_value);
        descriptor
    }

    /// Describe an input plug, typed after its default value
    pub fn input(name: impl Into<String>, default_value: impl Into<PlugValue>) -> Self {
        let default_value = default_value.into();
        Self::new(name, Direction::In, default_value.plug_type()).with_default(default_value)
    }

    /// Describe an output plug
    pub fn output(name: impl Into<String>, plug_type: PlugType) -> Self {
        Self::new(name, Direction::Out, plug_type)
    }

    /// Describe a container plug parenting arbitrary children
    pub fn container(
        name: impl Into<String>,
        direction: Direction,
        children: Vec<PlugDescriptor>,
    ) -> Self {
        let mut descriptor = Self::new(name, direction, PlugType::Container);
        descriptor.children = children
            .into_iter()
            .map(|child| child.with_direction(direction))
            .collect();
        descriptor
    }

    /// Replace the default value
    pub fn with_default(mut self, value: impl Into<PlugValue>) -> Self {
        let value = value.into();
        let value = value.coerce(&self.plug_type).unwrap_or(value);
        self.set_aggregate_children(&value);
        self.default_value = value;
        self
    }

    /// Replace the flags, applying them to children too
    pub fn with_flags(mut self, flags: PlugFlags) -> Self {
        self.flags = flags;
        self.children = self
            .children
            .into_iter()
            .map(|child| child.with_flags(flags))
            .collect();
        self
    }

    /// Change the direction, applying it to children too
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self.children = self
            .children
            .into_iter()
            .map(|child| child.with_direction(direction))
            .collect();
        self
    }

    fn set_aggregate_children(&mut self, value: &PlugValue) {
        let Some(components) = value.components() else {
            return;
        };
        self.children = self
            .plug_type
            .component_names()
            .iter()
            .zip(components)
            .map(|(name, component)| {
                let mut child = Self::new(*name, self.direction, PlugType::Float);
                child.default_value = PlugValue::Float(component);
                child.flags = self.flags;
                child
            })
            .collect();
    }
}

/// A typed value slot in the graph
#[derive(Debug)]
pub struct Plug {
    pub(crate) id: PlugId,
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) parent: Option<PlugId>,
    pub(crate) children: Vec<PlugId>,
    pub(crate) direction: Direction,
    pub(crate) plug_type: PlugType,
    pub(crate) flags: PlugFlags,
    pub(crate) default_value: PlugValue,
    pub(crate) value: PlugValue,
    pub(crate) input: Option<PlugId>,
    pub(crate) outputs: Vec<PlugId>,
    /// Bumped by every dirty propagation reaching this plug
    pub(crate) dirty_count: u64,
    pub(crate) dirty: AtomicBool,
}

impl Plug {
    pub(crate) fn from_descriptor(
        descriptor: &PlugDescriptor,
        node: NodeId,
        parent: Option<PlugId>,
    ) -> Self {
        Self {
            id: PlugId::new(),
            name: descriptor.name.clone(),
            node,
            parent,
            children: Vec::new(),
            direction: descriptor.direction,
            plug_type: descriptor.plug_type.clone(),
            flags: descriptor.flags,
            default_value: descriptor.default_value.clone(),
            value: descriptor.default_value.clone(),
            input: None,
            outputs: Vec::new(),
            dirty_count: 0,
            dirty: AtomicBool::new(false),
        }
    }

    /// Get the plug ID
    pub fn id(&self) -> PlugId {
        self.id
    }

    /// Get the plug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the owning node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Get the parent plug, if this is a child of a compound plug
    pub fn parent(&self) -> Option<PlugId> {
        self.parent
    }

    /// Get the child plugs
    pub fn children(&self) -> &[PlugId] {
        &self.children
    }

    /// Get the direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Get the declared type
    pub fn plug_type(&self) -> &PlugType {
        &self.plug_type
    }

    /// Get the flags
    pub fn flags(&self) -> PlugFlags {
        self.flags
    }

    /// Get the default value
    pub fn default_value(&self) -> &PlugValue {
        &self.default_value
    }

    /// Get the locally stored value
    pub fn stored_value(&self) -> &PlugValue {
        &self.value
    }

    /// Get the upstream connection
    pub fn input(&self) -> Option<PlugId> {
        self.input
    }

    /// Get the downstream connections
    pub fn outputs(&self) -> &[PlugId] {
        &self.outputs
    }

    /// Number of dirty propagations that have reached this plug
    pub fn dirty_count(&self) -> u64 {
        self.dirty_count
    }

    /// Whether this plug parents other plugs
    pub fn is_compound(&self) -> bool {
        !self.children.is_empty()
    }

    /// Get the dirty state
    pub fn state(&self) -> PlugState {
        if self.dirty.load(Ordering::Acquire) {
            PlugState::Dirty
        } else {
            PlugState::Clean
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty_count += 1;
        *self.dirty.get_mut() = true;
    }

    pub(crate) fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_descriptor_children() {
        let descriptor = PlugDescriptor::input("color", PlugValue::Color3f([0.1, 0.2, 0.3]));
        let names: Vec<_> = descriptor.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["r", "g", "b"]);
        assert_eq!(descriptor.children[2].default_value, PlugValue::Float(0.3));
        assert_eq!(descriptor.children[0].direction, Direction::In);
    }

    #[test]
    fn test_container_applies_direction() {
        let descriptor = PlugDescriptor::container(
            "out",
            Direction::Out,
            vec![PlugDescriptor::input("value", 1.0)],
        );
        assert_eq!(descriptor.children[0].direction, Direction::Out);
    }

    #[test]
    fn test_default_coerced_to_declared_type() {
        let descriptor = PlugDescriptor::new("gain", Direction::In, PlugType::Float).with_default(2);
        assert_eq!(descriptor.default_value, PlugValue::Float(2.0));
    }
}
