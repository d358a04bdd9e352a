// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning nodes, plugs and connections.
//!
//! The graph is an arena: it owns every node and plug, and connections are
//! plug ids resolved by lookup. Authoring operations take `&mut self`;
//! evaluation takes `&self`, so a [`SharedGraph`] lets many readers evaluate
//! while structural edits are serialized behind the write lock.

use crate::cache::Engine;
use crate::error::{GraphError, Result};
use crate::history::{Action, History};
use crate::node::{Node, NodeBehaviour, NodeId, NodeRegistry};
use crate::plug::{Direction, Plug, PlugDescriptor, PlugId, PlugState};
use crate::value::{CompoundData, PlugType, PlugValue};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::sync::Arc;

/// Graph shared between an authoring thread and evaluating workers
pub type SharedGraph = Arc<RwLock<Graph>>;

/// Notification emitted by graph edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A plug's stored value changed
    PlugSet(PlugId),
    /// A plug's input connection changed
    InputChanged(PlugId),
    /// A plug was marked dirty
    PlugDirtied(PlugId),
}

/// Handle returned by [`Graph::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&GraphEvent) + Send + Sync>;

/// A dependency graph of nodes and plugs
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    pub(crate) nodes: IndexMap<NodeId, Node>,
    /// Every plug of every node
    pub(crate) plugs: IndexMap<PlugId, Plug>,
    registry: Arc<NodeRegistry>,
    engine: Arc<Engine>,
    observers: IndexMap<SubscriptionId, Observer>,
    next_subscription: u64,
    pub(crate) history: History,
}

impl Graph {
    /// Create a new empty graph with the built-in node types and a default engine
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parts(
            name,
            Arc::new(NodeRegistry::with_builtins()),
            Arc::new(Engine::default()),
        )
    }

    /// Create a new empty graph from an explicit registry and engine
    pub fn with_parts(name: impl Into<String>, registry: Arc<NodeRegistry>, engine: Arc<Engine>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            plugs: IndexMap::new(),
            registry,
            engine,
            observers: IndexMap::new(),
            next_subscription: 1,
            history: History::new(),
        }
    }

    /// Wrap in a lock for sharing between threads
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Get the node registry
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Get the evaluation engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    // Nodes

    /// Add a node driven by `behaviour`, creating its declared plugs
    pub fn add_node(&mut self, name: &str, behaviour: Arc<dyn NodeBehaviour>) -> Result<NodeId> {
        let name = self.unique_node_name(name);
        let descriptors = behaviour.plugs();
        let node = Node::new(name, behaviour);
        let id = node.id;
        self.nodes.insert(id, node);

        for descriptor in &descriptors {
            self.instantiate_plug(id, None, descriptor)?;
        }

        tracing::debug!(node = %self.nodes[&id].name, plugs = self.nodes[&id].plug_paths.len(), "added node");
        Ok(id)
    }

    /// Add a node of a registered type
    pub fn create_node(&mut self, type_id: &str, name: &str) -> Result<NodeId> {
        let behaviour = self.registry.create(type_id)?;
        self.add_node(name, behaviour)
    }

    /// Remove a node, its child nodes and its plugs.
    ///
    /// Connections to the rest of the graph are severed and former
    /// dependents are dirtied.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<()> {
        let node = self.node_ref(node_id)?;
        let children = node.children.clone();
        let parent = node.parent;
        for child in children {
            self.remove_node(child)?;
        }

        let owned: IndexSet<PlugId> = self.nodes[&node_id].plug_paths.values().copied().collect();
        let severed = self.sever_plugs(&owned);

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node_id);
        }
        if let Some(node) = self.nodes.shift_remove(&node_id) {
            tracing::debug!(node = %node.name, "removed node");
        }

        for plug in &severed {
            self.emit(&GraphEvent::InputChanged(*plug));
        }
        self.propagate_dirtiness(&severed);
        Ok(())
    }

    /// Parent a node under another node, or unparent it
    pub fn set_node_parent(&mut self, node_id: NodeId, parent: Option<NodeId>) -> Result<()> {
        let old_parent = self.node_ref(node_id)?.parent;
        if let Some(parent) = parent {
            self.node_ref(parent)?;
            let mut ancestor = Some(parent);
            while let Some(current) = ancestor {
                if current == node_id {
                    return Err(GraphError::custom("cannot parent a node under its own descendant"));
                }
                ancestor = self.nodes.get(&current).and_then(|n| n.parent);
            }
        }

        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != node_id);
        }
        if let Some(new) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            new.children.push(node_id);
        }
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn node_ref(&self, node_id: NodeId) -> Result<&Node> {
        self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))
    }

    /// Find a node by name
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn unique_node_name(&self, name: &str) -> String {
        let taken = |candidate: &str| self.nodes.values().any(|n| n.name == candidate);
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|i| format!("{name}{i}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    // Plugs

    /// Get a plug by ID
    pub fn plug(&self, plug_id: PlugId) -> Option<&Plug> {
        self.plugs.get(&plug_id)
    }

    pub(crate) fn plug_ref(&self, plug_id: PlugId) -> Result<&Plug> {
        self.plugs.get(&plug_id).ok_or(GraphError::PlugNotFound(plug_id))
    }

    /// Look up a plug by node and relative path (`out.x`)
    pub fn plug_by_path(&self, node_id: NodeId, path: &str) -> Result<PlugId> {
        let node = self.node_ref(node_id)?;
        node.plug(path).ok_or_else(|| GraphError::PlugPathNotFound {
            node: node.name.clone(),
            path: path.to_string(),
        })
    }

    /// Number of plugs in the graph
    pub fn plug_count(&self) -> usize {
        self.plugs.len()
    }

    /// Path of a plug relative to its node
    pub fn relative_name(&self, plug_id: PlugId) -> String {
        let mut names = Vec::new();
        let mut current = self.plugs.get(&plug_id);
        while let Some(plug) = current {
            names.push(plug.name.as_str());
            current = plug.parent.and_then(|p| self.plugs.get(&p));
        }
        names.reverse();
        names.join(".")
    }

    /// Path of a plug including its node and enclosing nodes
    pub fn full_name(&self, plug_id: PlugId) -> String {
        let Some(plug) = self.plugs.get(&plug_id) else {
            return format!("{:?}", plug_id);
        };
        let mut names = vec![self.relative_name(plug_id)];
        let mut node = self.nodes.get(&plug.node);
        while let Some(current) = node {
            names.push(current.name.clone());
            node = current.parent.and_then(|p| self.nodes.get(&p));
        }
        names.reverse();
        names.join(".")
    }

    /// Add a plug to a node, under `parent` if given
    pub fn add_plug(
        &mut self,
        node_id: NodeId,
        parent: Option<PlugId>,
        descriptor: PlugDescriptor,
    ) -> Result<PlugId> {
        self.node_ref(node_id)?;
        if let Some(parent) = parent {
            if self.plug_ref(parent)?.node != node_id {
                return Err(GraphError::custom(format!(
                    "\"{}\" does not belong to the target node",
                    self.full_name(parent)
                )));
            }
        }
        let id = self.instantiate_plug(node_id, parent, &descriptor)?;
        self.propagate_dirtiness(&[id]);
        Ok(id)
    }

    /// Remove a plug and its children, severing their connections
    pub fn remove_plug(&mut self, plug_id: PlugId) -> Result<()> {
        let plug = self.plug_ref(plug_id)?;
        let node_id = plug.node;
        let parent = plug.parent;

        let mut owned = IndexSet::new();
        self.collect_descendants(plug_id, &mut owned);
        let mut severed = self.sever_plugs(&owned);

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.plugs.retain(|p| *p != plug_id);
            node.plug_paths.retain(|_, p| !owned.contains(p));
        }
        for plug in &severed {
            self.emit(&GraphEvent::InputChanged(*plug));
        }
        if let Some(parent) = parent {
            if let Some(parent_plug) = self.plugs.get_mut(&parent) {
                parent_plug.children.retain(|p| *p != plug_id);
            }
            severed.push(parent);
        }
        self.propagate_dirtiness(&severed);
        Ok(())
    }

    fn instantiate_plug(
        &mut self,
        node_id: NodeId,
        parent: Option<PlugId>,
        descriptor: &PlugDescriptor,
    ) -> Result<PlugId> {
        let path = match parent {
            Some(parent) => format!("{}.{}", self.relative_name(parent), descriptor.name),
            None => descriptor.name.clone(),
        };
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        if node.plug_paths.contains_key(&path) {
            return Err(GraphError::custom(format!(
                "node \"{}\" already has a plug \"{path}\"",
                node.name
            )));
        }

        let plug = Plug::from_descriptor(descriptor, node_id, parent);
        let id = plug.id;
        node.plug_paths.insert(path, id);
        if parent.is_none() {
            node.plugs.push(id);
        }
        self.plugs.insert(id, plug);
        if let Some(parent) = parent.and_then(|p| self.plugs.get_mut(&p)) {
            parent.children.push(id);
        }

        for child in &descriptor.children {
            self.instantiate_plug(node_id, Some(id), child)?;
        }
        Ok(id)
    }

    /// Collect `plug_id` and all of its descendants
    pub(crate) fn collect_descendants(&self, plug_id: PlugId, out: &mut IndexSet<PlugId>) {
        if !out.insert(plug_id) {
            return;
        }
        if let Some(plug) = self.plugs.get(&plug_id) {
            for child in &plug.children {
                self.collect_descendants(*child, out);
            }
        }
    }

    /// Drop the plugs in `owned` from the arena, disconnecting them from the
    /// rest of the graph. Returns the outside plugs that lost their input.
    fn sever_plugs(&mut self, owned: &IndexSet<PlugId>) -> Vec<PlugId> {
        let mut severed = Vec::new();
        for id in owned {
            let Some(plug) = self.plugs.get(id) else {
                continue;
            };
            let input = plug.input;
            let outputs = plug.outputs.clone();

            if let Some(source) = input.filter(|s| !owned.contains(s)) {
                if let Some(source) = self.plugs.get_mut(&source) {
                    source.outputs.retain(|o| o != id);
                }
            }
            for output in outputs.into_iter().filter(|o| !owned.contains(o)) {
                if let Some(downstream) = self.plugs.get_mut(&output) {
                    downstream.input = None;
                    severed.push(output);
                }
            }
        }
        for id in owned {
            self.plugs.shift_remove(id);
        }
        severed
    }

    // Connections

    /// Get the upstream connection of a plug
    pub fn input(&self, plug_id: PlugId) -> Option<PlugId> {
        self.plugs.get(&plug_id).and_then(|p| p.input)
    }

    /// Get the downstream connections of a plug
    pub fn outputs(&self, plug_id: PlugId) -> &[PlugId] {
        self.plugs.get(&plug_id).map(|p| p.outputs.as_slice()).unwrap_or(&[])
    }

    /// Follow input connections to the plug that ultimately supplies the value
    pub fn source(&self, plug_id: PlugId) -> PlugId {
        let mut current = plug_id;
        let mut hops = 0;
        while let Some(input) = self.input(current) {
            current = input;
            hops += 1;
            if hops > self.plugs.len() {
                break;
            }
        }
        current
    }

    /// Connect `plug` to `input`, or disconnect it with `None`.
    ///
    /// An existing input is replaced atomically. Compound plugs connect
    /// their children pairwise.
    pub fn set_input(&mut self, plug_id: PlugId, input: Option<PlugId>) -> Result<()> {
        let old = self.plug_ref(plug_id)?.input;
        if old == input {
            return Ok(());
        }
        if let Some(source) = input {
            self.check_connection(plug_id, source)?;
        }

        if self.history.is_recording() {
            let description = match input {
                Some(source) => format!("Connect {} to {}", self.full_name(plug_id), self.full_name(source)),
                None => format!("Disconnect {}", self.full_name(plug_id)),
            };
            self.history.record(Action::new(
                description,
                move |graph| graph.set_input(plug_id, input),
                move |graph| graph.set_input(plug_id, old),
            ));
        }

        let mut changed = Vec::new();
        self.connect(plug_id, input, &mut changed);
        for plug in &changed {
            self.emit(&GraphEvent::InputChanged(*plug));
        }
        self.propagate_dirtiness(&changed);
        Ok(())
    }

    fn check_connection(&self, plug_id: PlugId, source_id: PlugId) -> Result<()> {
        let plug = self.plug_ref(plug_id)?;
        let source = self.plug_ref(source_id)?;

        if plug_id == source_id {
            return Err(GraphError::PermissionDenied {
                plug: self.full_name(plug_id),
                reason: "a plug cannot be its own input".to_string(),
            });
        }
        if !plug.flags.accepts_inputs {
            return Err(GraphError::PermissionDenied {
                plug: self.full_name(plug_id),
                reason: "plug does not accept inputs".to_string(),
            });
        }
        let mismatch = || GraphError::TypeMismatch {
            plug: self.full_name(plug_id),
            expected: plug.plug_type.clone(),
            found: source.plug_type.clone(),
        };
        if !source.plug_type.can_connect_to(&plug.plug_type) {
            return Err(mismatch());
        }
        if plug.children.len() != source.children.len() {
            return Err(mismatch());
        }
        for (child, source_child) in plug.children.iter().zip(&source.children) {
            self.check_connection(*child, *source_child)?;
        }
        Ok(())
    }

    fn connect(&mut self, plug_id: PlugId, input: Option<PlugId>, changed: &mut Vec<PlugId>) {
        let Some(plug) = self.plugs.get_mut(&plug_id) else {
            return;
        };
        let old = std::mem::replace(&mut plug.input, input);
        let children = plug.children.clone();
        if old != input {
            changed.push(plug_id);
        }

        if let Some(old) = old.and_then(|o| self.plugs.get_mut(&o)) {
            old.outputs.retain(|o| *o != plug_id);
        }
        if let Some(source) = input.and_then(|i| self.plugs.get_mut(&i)) {
            source.outputs.push(plug_id);
        }

        let source_children = input
            .and_then(|i| self.plugs.get(&i))
            .map(|s| s.children.clone())
            .unwrap_or_default();
        for (index, child) in children.into_iter().enumerate() {
            self.connect(child, source_children.get(index).copied(), changed);
        }
    }

    // Values

    /// Set the stored value of an input plug.
    ///
    /// The value is converted to the plug's type. Setting a compound plug
    /// distributes the value over its children.
    pub fn set_value(&mut self, plug_id: PlugId, value: impl Into<PlugValue>) -> Result<()> {
        let value = value.into();
        let plug = self.plug_ref(plug_id)?;
        let coerced = value.coerce(&plug.plug_type).ok_or_else(|| GraphError::TypeMismatch {
            plug: self.full_name(plug_id),
            expected: plug.plug_type.clone(),
            found: value.plug_type(),
        })?;
        self.check_settable(plug_id)?;

        let old = self.stored_value(plug_id)?;
        if old == coerced {
            return Ok(());
        }

        if self.history.is_recording() {
            let description = format!("Set {}", self.full_name(plug_id));
            let redo_value = coerced.clone();
            self.history.record(Action::new(
                description,
                move |graph| graph.set_value(plug_id, redo_value.clone()),
                move |graph| graph.set_value(plug_id, old.clone()),
            ));
        }

        let mut changed = Vec::new();
        self.store_value(plug_id, coerced, &mut changed)?;
        self.emit(&GraphEvent::PlugSet(plug_id));
        self.propagate_dirtiness(&changed);
        Ok(())
    }

    fn check_settable(&self, plug_id: PlugId) -> Result<()> {
        let plug = self.plug_ref(plug_id)?;
        let denied = |reason: &str| GraphError::PermissionDenied {
            plug: self.full_name(plug_id),
            reason: reason.to_string(),
        };
        if plug.direction == Direction::Out {
            return Err(denied("output plugs cannot be set"));
        }
        if plug.flags.read_only {
            return Err(denied("plug is read-only"));
        }
        if plug.input.is_some() {
            return Err(denied("plug has an input connection"));
        }
        for child in &plug.children {
            self.check_settable(*child)?;
        }
        Ok(())
    }

    fn store_value(&mut self, plug_id: PlugId, value: PlugValue, changed: &mut Vec<PlugId>) -> Result<()> {
        let plug = self.plug_ref(plug_id)?;
        let children = plug.children.clone();
        let plug_type = plug.plug_type.clone();

        if children.is_empty() {
            if let Some(plug) = self.plugs.get_mut(&plug_id) {
                if plug.value != value {
                    plug.value = value;
                    changed.push(plug_id);
                }
            }
            return Ok(());
        }

        if let Some(components) = value.components() {
            for (child, component) in children.into_iter().zip(components) {
                self.store_value(child, PlugValue::Float(component), changed)?;
            }
            return Ok(());
        }

        let Some(data) = value.into_compound() else {
            return Err(GraphError::UnsupportedType(format!("{plug_type:?} value")));
        };
        for (name, member) in data.iter() {
            let child = children
                .iter()
                .copied()
                .find(|c| self.plugs.get(c).is_some_and(|p| &p.name == name))
                .ok_or_else(|| GraphError::PlugPathNotFound {
                    node: self.full_name(plug_id),
                    path: name.clone(),
                })?;
            let child_type = self.plug_ref(child)?.plug_type.clone();
            let member = member.coerce(&child_type).ok_or_else(|| GraphError::TypeMismatch {
                plug: self.full_name(child),
                expected: child_type.clone(),
                found: member.plug_type(),
            })?;
            self.store_value(child, member, changed)?;
        }
        Ok(())
    }

    /// The value stored on a plug, aggregated over children for compound plugs.
    ///
    /// Ignores connections; use `get_value` for the effective value.
    pub fn stored_value(&self, plug_id: PlugId) -> Result<PlugValue> {
        let plug = self.plug_ref(plug_id)?;
        if plug.children.is_empty() {
            return Ok(plug.value.clone());
        }
        let members = plug
            .children
            .iter()
            .map(|child| -> Result<(String, PlugValue)> {
                Ok((self.plug_ref(*child)?.name.clone(), self.stored_value(*child)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(compose(&plug.plug_type, members))
    }

    /// Dirty state of a plug
    pub fn plug_state(&self, plug_id: PlugId) -> Result<PlugState> {
        Ok(self.plug_ref(plug_id)?.state())
    }

    // Notifications

    /// Register an observer for graph events
    pub fn subscribe(&mut self, observer: impl Fn(&GraphEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.insert(id, Box::new(observer));
        id
    }

    /// Remove an observer
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.shift_remove(&id).is_some()
    }

    pub(crate) fn emit(&self, event: &GraphEvent) {
        for observer in self.observers.values() {
            observer(event);
        }
    }
}

/// Build the value of a compound plug from its children's values
pub(crate) fn compose(plug_type: &PlugType, members: Vec<(String, PlugValue)>) -> PlugValue {
    if plug_type.is_aggregate() {
        let components: Vec<f32> = members
            .iter()
            .map(|(_, value)| value.as_float().unwrap_or(0.0))
            .collect();
        if let Some(value) = PlugValue::from_components(plug_type, &components) {
            return value;
        }
        return plug_type.default_value();
    }
    PlugValue::Compound(members.into_iter().collect::<CompoundData>())
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("plugs", &self.plugs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::arithmetic::AddNode;
    use parking_lot::Mutex;

    fn add_node(graph: &mut Graph, name: &str) -> NodeId {
        graph.add_node(name, Arc::new(AddNode)).unwrap()
    }

    #[test]
    fn test_create_and_lookup() {
        let mut graph = Graph::new("test");
        let node = add_node(&mut graph, "add");
        let op1 = graph.plug_by_path(node, "op1").unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.full_name(op1), "add.op1");
        assert_eq!(graph.node_by_name("add"), Some(node));
        assert!(matches!(
            graph.plug_by_path(node, "nope"),
            Err(GraphError::PlugPathNotFound { .. })
        ));
    }

    #[test]
    fn test_unique_node_names() {
        let mut graph = Graph::new("test");
        add_node(&mut graph, "add");
        let second = add_node(&mut graph, "add");
        assert_eq!(graph.node(second).unwrap().name(), "add1");
    }

    #[test]
    fn test_set_value_permissions() {
        let mut graph = Graph::new("test");
        let a = add_node(&mut graph, "a");
        let b = add_node(&mut graph, "b");
        let sum = graph.plug_by_path(a, "sum").unwrap();
        let op1 = graph.plug_by_path(b, "op1").unwrap();

        assert!(matches!(
            graph.set_value(sum, 3),
            Err(GraphError::PermissionDenied { .. })
        ));

        graph.set_input(op1, Some(sum)).unwrap();
        assert!(matches!(
            graph.set_value(op1, 3),
            Err(GraphError::PermissionDenied { .. })
        ));
        let a_op1 = graph.plug_by_path(a, "op1").unwrap();
        assert!(matches!(
            graph.set_value(a_op1, "text"),
            Err(GraphError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_input_replaces_atomically() {
        let mut graph = Graph::new("test");
        let a = add_node(&mut graph, "a");
        let b = add_node(&mut graph, "b");
        let c = add_node(&mut graph, "c");
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        let b_sum = graph.plug_by_path(b, "sum").unwrap();
        let op1 = graph.plug_by_path(c, "op1").unwrap();

        graph.set_input(op1, Some(a_sum)).unwrap();
        graph.set_input(op1, Some(b_sum)).unwrap();

        assert_eq!(graph.input(op1), Some(b_sum));
        assert!(graph.outputs(a_sum).is_empty());
        assert_eq!(graph.outputs(b_sum), &[op1]);
    }

    #[test]
    fn test_remove_node_severs_connections() {
        let mut graph = Graph::new("test");
        let a = add_node(&mut graph, "a");
        let b = add_node(&mut graph, "b");
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        let op1 = graph.plug_by_path(b, "op1").unwrap();
        graph.set_input(op1, Some(a_sum)).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        graph.subscribe(move |event| sink.lock().push(*event));

        graph.remove_node(a).unwrap();

        assert_eq!(graph.input(op1), None);
        assert!(graph.plug(a_sum).is_none());
        assert_eq!(graph.plug_state(op1), Ok(PlugState::Dirty));
        assert!(events.lock().contains(&GraphEvent::InputChanged(op1)));
    }

    #[test]
    fn test_node_parent_cycle_refused() {
        let mut graph = Graph::new("test");
        let outer = graph.create_node("Box", "outer").unwrap();
        let inner = graph.create_node("Box", "inner").unwrap();
        graph.set_node_parent(inner, Some(outer)).unwrap();
        assert!(graph.set_node_parent(outer, Some(inner)).is_err());
        assert_eq!(graph.node(outer).unwrap().children(), &[inner]);
    }
}
