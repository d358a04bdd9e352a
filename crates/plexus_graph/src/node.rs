// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the capability interface node types implement.

use crate::cache::CachePolicy;
use crate::compute::ComputeContext;
use crate::context::Context;
use crate::dirty::AffectsContext;
use crate::error::{GraphError, Result};
use crate::fingerprint::Fingerprint;
use crate::plug::{PlugDescriptor, PlugId};
use crate::value::PlugValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Capabilities of a node type.
///
/// The graph owns plugs and connections; a behaviour only declares its plugs
/// and answers `affects`, `hash` and `compute` queries about them. Plugs are
/// addressed by relative path through the contexts passed in.
pub trait NodeBehaviour: Send + Sync + 'static {
    /// Type name, part of every fingerprint this node produces
    fn type_name(&self) -> &'static str;

    /// Plugs created when the node is added to a graph
    fn plugs(&self) -> Vec<PlugDescriptor>;

    /// Append the plugs of this node affected by a change to `input`.
    ///
    /// Must never omit a real dependency. The default reports every output
    /// for every input.
    fn affects(&self, cx: &AffectsContext<'_>, input: PlugId, outputs: &mut Vec<PlugId>) {
        if cx.is_input(input) {
            cx.all_outputs(outputs);
        }
    }

    /// Fingerprint of `output` under the context.
    ///
    /// The default combines the node type, the plug path and the hashes of
    /// all input plugs.
    fn hash(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<Fingerprint> {
        cx.default_hash(output)
    }

    /// Compute the value of `output`
    fn compute(&self, cx: &ComputeContext<'_>, output: PlugId) -> Result<PlugValue>;

    /// How results for `output` are cached
    fn cache_policy(&self, _output: PlugId) -> CachePolicy {
        CachePolicy::Standard
    }

    /// The upstream plug and context that supply `output` under the current
    /// context, for nodes that merely select or remap their inputs.
    fn active_source(
        &self,
        _cx: &ComputeContext<'_>,
        _output: PlugId,
    ) -> Result<Option<(PlugId, Context)>> {
        Ok(None)
    }

    /// Whether unconnected outputs are computed rather than stored
    fn computes(&self) -> bool {
        true
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// A node instance in the graph
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Top-level plugs in creation order
    pub(crate) plugs: Vec<PlugId>,
    /// Every plug of the node by relative path (`out.x`)
    pub(crate) plug_paths: IndexMap<String, PlugId>,
    pub(crate) behaviour: Arc<dyn NodeBehaviour>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, behaviour: Arc<dyn NodeBehaviour>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            parent: None,
            children: Vec::new(),
            plugs: Vec::new(),
            plug_paths: IndexMap::new(),
            behaviour,
        }
    }

    /// Get the node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the type name
    pub fn type_name(&self) -> &'static str {
        self.behaviour.type_name()
    }

    /// Get the enclosing node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Get the nodes parented under this one
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Get the top-level plugs
    pub fn plugs(&self) -> &[PlugId] {
        &self.plugs
    }

    /// Look up a plug by relative path
    pub fn plug(&self, path: &str) -> Option<PlugId> {
        self.plug_paths.get(path).copied()
    }

    /// Iterate over every plug with its relative path
    pub fn plug_paths(&self) -> impl Iterator<Item = (&str, PlugId)> {
        self.plug_paths.iter().map(|(path, id)| (path.as_str(), *id))
    }

    /// Get the behaviour
    pub fn behaviour(&self) -> &Arc<dyn NodeBehaviour> {
        &self.behaviour
    }

    /// Downcast the behaviour to a concrete node type
    pub fn behaviour_as<T: NodeBehaviour>(&self) -> Option<&T> {
        self.behaviour.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("parent", &self.parent)
            .field("plugs", &self.plug_paths.len())
            .finish()
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Math operations
    Math,
    /// Branch selection and iteration
    Logic,
    /// Context manipulation
    Context,
    /// Time-varying values
    Animation,
    /// Scene description processing
    Scene,
    /// Grouping and other utilities
    Utility,
}

/// Factory producing a fresh behaviour for each node instance
pub type NodeFactory = Arc<dyn Fn() -> Arc<dyn NodeBehaviour> + Send + Sync>;

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Behaviour factory
    pub factory: NodeFactory,
}

impl NodeType {
    /// Create a node type definition
    pub fn new<F, B>(id: impl Into<String>, category: NodeCategory, description: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: NodeBehaviour,
    {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn NodeBehaviour>),
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types.
///
/// Registries are built explicitly and handed to each graph, so separate
/// graphs (and tests) never share registration state.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in node types
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::nodes::register_builtins(&mut registry);
        registry
    }

    /// Register a node type, replacing any type with the same ID
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Instantiate the behaviour for a type ID
    pub fn create(&self, type_id: &str) -> Result<Arc<dyn NodeBehaviour>> {
        self.get(type_id)
            .map(|node_type| (node_type.factory)())
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_string()))
    }
}
