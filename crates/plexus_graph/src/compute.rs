// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hashing and computing plug values.
//!
//! `get_value` and `hash` share one source resolution step
//! ([`Graph::resolve_source`]): follow input connections, and for nodes that
//! select or remap their inputs ask the node which upstream plug supplies the
//! value under the current context. Computed plugs are then hashed through
//! the hash cache and their values fetched from, or published to, the value
//! cache under that fingerprint.

use crate::cache::{HashKey, ValueHandle};
use crate::config::HashValidation;
use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::fingerprint::{Fingerprint, FingerprintHasher};
use crate::graph::{compose, Graph};
use crate::node::{Node, NodeId};
use crate::plug::{Direction, PlugId};
use crate::value::{CompoundData, PlugType, PlugValue};
use std::sync::atomic::Ordering;

/// One frame of the evaluation chain, used to detect cycles
pub(crate) struct Process<'a> {
    plug: PlugId,
    context: Fingerprint,
    parent: Option<&'a Process<'a>>,
}

impl<'a> Process<'a> {
    fn new(plug: PlugId, context: &Context, parent: Option<&'a Process<'a>>) -> Self {
        Self {
            plug,
            context: context.hash(),
            parent,
        }
    }

    fn contains(chain: Option<&Process<'_>>, plug: PlugId, context: Fingerprint) -> bool {
        let mut current = chain;
        while let Some(process) = current {
            if process.plug == plug && process.context == context {
                return true;
            }
            current = process.parent;
        }
        false
    }
}

/// Access to a node's plugs while hashing or computing one of its outputs
pub struct ComputeContext<'a> {
    graph: &'a Graph,
    node: NodeId,
    context: &'a Context,
    process: Option<&'a Process<'a>>,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        node: NodeId,
        context: &'a Context,
        process: Option<&'a Process<'a>>,
    ) -> Self {
        Self {
            graph,
            node,
            context,
            process,
        }
    }

    /// Get the graph
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Get the node being evaluated
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    fn node(&self) -> Result<&'a Node> {
        self.graph.node_ref(self.node)
    }

    /// Get the evaluation context
    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Look up a plug of this node by relative path
    pub fn plug(&self, path: &str) -> Result<PlugId> {
        self.graph.plug_by_path(self.node, path)
    }

    /// Path of a plug relative to its node
    pub fn relative_name(&self, plug: PlugId) -> String {
        self.graph.relative_name(plug)
    }

    /// Child plugs of the plug at `path`
    pub fn children(&self, path: &str) -> Result<Vec<PlugId>> {
        Ok(self.graph.plug_ref(self.plug(path)?)?.children().to_vec())
    }

    /// Value of the plug at `path` under the current context
    pub fn value(&self, path: &str) -> Result<ValueHandle> {
        self.value_in(path, self.context)
    }

    /// Value of the plug at `path` under another context
    pub fn value_in(&self, path: &str, context: &Context) -> Result<ValueHandle> {
        self.graph.value_of(self.plug(path)?, context, self.process)
    }

    /// Value of any plug under the current context
    pub fn plug_value(&self, plug: PlugId) -> Result<ValueHandle> {
        self.graph.value_of(plug, self.context, self.process)
    }

    /// Fingerprint of the plug at `path` under the current context
    pub fn hash(&self, path: &str) -> Result<Fingerprint> {
        self.hash_in(path, self.context)
    }

    /// Fingerprint of the plug at `path` under another context
    pub fn hash_in(&self, path: &str, context: &Context) -> Result<Fingerprint> {
        self.graph.hash_of(self.plug(path)?, context, self.process)
    }

    /// Fingerprint of any plug under the current context
    pub fn plug_hash(&self, plug: PlugId) -> Result<Fingerprint> {
        self.graph.hash_of(plug, self.context, self.process)
    }

    fn mismatch(&self, path: &str, expected: PlugType, found: &PlugValue) -> GraphError {
        GraphError::TypeMismatch {
            plug: path.to_string(),
            expected,
            found: found.plug_type(),
        }
    }

    /// Boolean value of the plug at `path`
    pub fn bool(&self, path: &str) -> Result<bool> {
        let value = self.value(path)?;
        value.as_bool().ok_or_else(|| self.mismatch(path, PlugType::Bool, &value))
    }

    /// Integer value of the plug at `path`
    pub fn int(&self, path: &str) -> Result<i32> {
        let value = self.value(path)?;
        value.as_int().ok_or_else(|| self.mismatch(path, PlugType::Int, &value))
    }

    /// Float value of the plug at `path`
    pub fn float(&self, path: &str) -> Result<f32> {
        let value = self.value(path)?;
        value.as_float().ok_or_else(|| self.mismatch(path, PlugType::Float, &value))
    }

    /// String value of the plug at `path`
    pub fn string(&self, path: &str) -> Result<String> {
        let value = self.value(path)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(path, PlugType::String, &value))
    }

    /// Compound value of the plug at `path`
    pub fn compound(&self, path: &str) -> Result<CompoundData> {
        let value = self.value(path)?;
        value
            .as_compound()
            .cloned()
            .ok_or_else(|| self.mismatch(path, PlugType::Compound, &value))
    }

    /// Hasher seeded with the node type and the output's path and type
    pub fn hasher_for(&self, output: PlugId) -> Result<FingerprintHasher> {
        let mut hasher = FingerprintHasher::new();
        hasher.append_str(self.node()?.type_name());
        hasher.append_str(&self.graph.relative_name(output));
        self.graph.plug_ref(output)?.plug_type().hash_into(&mut hasher);
        Ok(hasher)
    }

    /// Fingerprint from the node type, the output and every input plug
    pub fn default_hash(&self, output: PlugId) -> Result<Fingerprint> {
        let mut hasher = self.hasher_for(output)?;
        for plug in self.node()?.plugs() {
            if self.graph.plug_ref(*plug)?.direction() == Direction::In {
                hasher.append(self.plug_hash(*plug)?);
            }
        }
        Ok(hasher.finish())
    }
}

impl Graph {
    /// Effective value of a plug under a context.
    ///
    /// Computed results are shared with the value cache; reading the same
    /// plug and context twice without an intervening edit returns the same
    /// value object.
    pub fn get_value(&self, plug: PlugId, context: &Context) -> Result<ValueHandle> {
        self.value_of(plug, context, None)
    }

    /// Fingerprint of a plug's value under a context
    pub fn hash(&self, plug: PlugId, context: &Context) -> Result<Fingerprint> {
        self.hash_of(plug, context, None)
    }

    /// The plug and context that actually supply `plug`'s value under
    /// `context`, following connections and context-sensitive nodes
    pub fn resolve_source(&self, plug: PlugId, context: &Context) -> Result<(PlugId, Context)> {
        self.resolve(plug, context, None, false)
    }

    /// Whether a plug's value is produced by its node's compute
    pub fn is_computed(&self, plug: PlugId) -> bool {
        let Some(plug) = self.plugs.get(&plug) else {
            return false;
        };
        plug.direction() == Direction::Out
            && plug.input().is_none()
            && self
                .nodes
                .get(&plug.node())
                .is_some_and(|node| node.behaviour.computes())
    }

    /// Follow input connections to the source plug. With `mark_clean`, every
    /// plug passed through is marked clean.
    fn follow_inputs(&self, plug_id: PlugId, mark_clean: bool) -> PlugId {
        if !mark_clean {
            return self.source(plug_id);
        }
        let mut current = plug_id;
        for _ in 0..=self.plugs.len() {
            let Some(plug) = self.plugs.get(&current) else {
                break;
            };
            plug.mark_clean();
            match plug.input() {
                Some(input) => current = input,
                None => break,
            }
        }
        current
    }

    /// Find the plug and context supplying `plug`. Reads pass `mark_clean` so
    /// every plug on the way is clean once its value has been pulled.
    pub(crate) fn resolve(
        &self,
        plug: PlugId,
        context: &Context,
        parent: Option<&Process<'_>>,
        mark_clean: bool,
    ) -> Result<(PlugId, Context)> {
        let mut current = self.follow_inputs(plug, mark_clean);
        let mut context = context.clone();
        let mut visited: Vec<(PlugId, Fingerprint)> = Vec::new();

        loop {
            let plug = self.plug_ref(current)?;
            if plug.direction() == Direction::In {
                return Ok((current, context));
            }

            let key = (current, context.hash());
            if visited.contains(&key) || Process::contains(parent, key.0, key.1) {
                return Err(GraphError::Cycle(self.full_name(current)));
            }
            visited.push(key);

            let node = self.node_ref(plug.node())?;
            let next = {
                let process = Process::new(current, &context, parent);
                let cx = ComputeContext::new(self, node.id, &context, Some(&process));
                node.behaviour.active_source(&cx, current)?
            };
            match next {
                Some((next, next_context)) => {
                    current = self.follow_inputs(next, mark_clean);
                    context = next_context;
                }
                None => return Ok((current, context)),
            }
        }
    }

    pub(crate) fn value_of(
        &self,
        plug_id: PlugId,
        context: &Context,
        parent: Option<&Process<'_>>,
    ) -> Result<ValueHandle> {
        let plug = self.plug_ref(plug_id)?;

        if plug.is_compound() {
            let members = plug
                .children()
                .iter()
                .map(|child| -> Result<(String, PlugValue)> {
                    let name = self.plug_ref(*child)?.name().to_string();
                    Ok((name, self.value_of(*child, context, parent)?.to_value()))
                })
                .collect::<Result<Vec<_>>>()?;
            plug.mark_clean();
            return Ok(ValueHandle::detached(compose(plug.plug_type(), members)));
        }

        let (source, source_context) = self.resolve(plug_id, context, parent, true)?;
        let handle = if self.is_computed(source) {
            self.compute_value(source, &source_context, parent)?
        } else {
            ValueHandle::detached(self.plug_ref(source)?.stored_value().clone())
        };
        plug.mark_clean();

        if handle.plug_type() == *plug.plug_type() {
            return Ok(handle);
        }
        handle
            .coerce(plug.plug_type())
            .map(ValueHandle::detached)
            .ok_or_else(|| GraphError::TypeMismatch {
                plug: self.full_name(plug_id),
                expected: plug.plug_type().clone(),
                found: handle.plug_type(),
            })
    }

    pub(crate) fn hash_of(
        &self,
        plug_id: PlugId,
        context: &Context,
        parent: Option<&Process<'_>>,
    ) -> Result<Fingerprint> {
        let plug = self.plug_ref(plug_id)?;

        if plug.is_compound() {
            let mut hasher = FingerprintHasher::new();
            plug.plug_type().hash_into(&mut hasher);
            for child in plug.children() {
                hasher.append_str(self.plug_ref(*child)?.name());
                hasher.append(self.hash_of(*child, context, parent)?);
            }
            return Ok(hasher.finish());
        }

        let (source, source_context) = self.resolve(plug_id, context, parent, false)?;
        if self.is_computed(source) {
            return self.compute_hash(source, &source_context, parent);
        }

        let stored = self.plug_ref(source)?.stored_value();
        let mut hasher = FingerprintHasher::new();
        match stored.coerce(plug.plug_type()) {
            Some(value) => value.hash_into(&mut hasher),
            None => stored.hash_into(&mut hasher),
        }
        Ok(hasher.finish())
    }

    /// Hash a computed plug through the hash cache, checking cached entries
    /// against a fresh hash as configured
    fn compute_hash(
        &self,
        plug_id: PlugId,
        context: &Context,
        parent: Option<&Process<'_>>,
    ) -> Result<Fingerprint> {
        if Process::contains(parent, plug_id, context.hash()) {
            return Err(GraphError::Cycle(self.full_name(plug_id)));
        }

        let engine = self.engine();
        let config = engine.config();
        let key = HashKey {
            plug: plug_id,
            dirty_count: self.plug_ref(plug_id)?.dirty_count(),
            context: context.hash(),
        };

        let Some(cached) = engine.hash_cache.get(&key) else {
            engine.stats.hash_misses.fetch_add(1, Ordering::Relaxed);
            let fresh = self.fresh_hash(plug_id, context, parent)?;
            engine.hash_cache.insert(key, fresh);
            return Ok(fresh);
        };

        engine.stats.hash_hits.fetch_add(1, Ordering::Relaxed);
        if !config.hash_validation.should_check(cached) {
            return Ok(cached);
        }

        engine.stats.hash_checks.fetch_add(1, Ordering::Relaxed);
        let fresh = self.fresh_hash(plug_id, context, parent)?;
        if fresh == cached {
            return Ok(cached);
        }
        self.hash_mismatch(plug_id, cached, fresh)?;
        engine.hash_cache.insert(key, fresh);
        Ok(fresh)
    }

    /// Report a stale fingerprint: an error when fatal, else a warning
    fn hash_mismatch(&self, plug_id: PlugId, cached: Fingerprint, fresh: Fingerprint) -> Result<()> {
        let engine = self.engine();
        engine.stats.hash_mismatches.fetch_add(1, Ordering::Relaxed);
        let plug = self.full_name(plug_id);
        if engine.config().fatal_hash_mismatch {
            tracing::error!(%plug, %cached, %fresh, "hash mismatch, node affects or hash is incomplete");
            return Err(GraphError::HashMismatch { plug, cached, fresh });
        }
        tracing::warn!(%plug, %cached, %fresh, "hash mismatch, node affects or hash is incomplete");
        Ok(())
    }

    fn fresh_hash(&self, plug_id: PlugId, context: &Context, parent: Option<&Process<'_>>) -> Result<Fingerprint> {
        let node = self.node_ref(self.plug_ref(plug_id)?.node())?;
        let process = Process::new(plug_id, context, parent);
        let cx = ComputeContext::new(self, node.id, context, Some(&process));
        node.behaviour
            .hash(&cx, plug_id)
            .map_err(|e| e.in_compute_of(self.full_name(plug_id)))
    }

    fn compute_value(
        &self,
        plug_id: PlugId,
        context: &Context,
        parent: Option<&Process<'_>>,
    ) -> Result<ValueHandle> {
        let fingerprint = self.compute_hash(plug_id, context, parent)?;
        let plug = self.plug_ref(plug_id)?;
        let node = self.node_ref(plug.node())?;
        let policy = node.behaviour.cache_policy(plug_id);
        let engine = self.engine();

        let handle = engine
            .value_cache
            .get_or_compute(fingerprint, policy, &engine.stats, || {
                let process = Process::new(plug_id, context, parent);
                let cx = ComputeContext::new(self, node.id, context, Some(&process));
                tracing::debug!(plug = %self.full_name(plug_id), %fingerprint, "computing");

                let value = node
                    .behaviour
                    .compute(&cx, plug_id)
                    .map_err(|e| e.in_compute_of(self.full_name(plug_id)))?;
                let value = value.coerce(plug.plug_type()).ok_or_else(|| {
                    GraphError::TypeMismatch {
                        plug: self.full_name(plug_id),
                        expected: plug.plug_type().clone(),
                        found: value.plug_type(),
                    }
                    .in_compute_of(self.full_name(plug_id))
                })?;

                if engine.config().hash_validation == HashValidation::Full {
                    let rehash = node
                        .behaviour
                        .hash(&cx, plug_id)
                        .map_err(|e| e.in_compute_of(self.full_name(plug_id)))?;
                    if rehash != fingerprint {
                        self.hash_mismatch(plug_id, fingerprint, rehash)?;
                    }
                }
                Ok(value)
            })?;

        plug.mark_clean();
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plug::PlugState;

    fn add_chain() -> (Graph, PlugId, PlugId) {
        let mut graph = Graph::new("compute");
        let a = graph.create_node("Add", "a").unwrap();
        let b = graph.create_node("Add", "b").unwrap();
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        graph.set_input(graph.plug_by_path(b, "op1").unwrap(), Some(a_sum)).unwrap();
        let a_op1 = graph.plug_by_path(a, "op1").unwrap();
        let b_sum = graph.plug_by_path(b, "sum").unwrap();
        (graph, a_op1, b_sum)
    }

    #[test]
    fn test_pull_through_chain() {
        let (mut graph, a_op1, b_sum) = add_chain();
        graph.set_value(a_op1, 4).unwrap();
        let value = graph.get_value(b_sum, &Context::default()).unwrap();
        assert_eq!(value, PlugValue::Int(4));
        assert_eq!(graph.plug_state(b_sum), Ok(PlugState::Clean));
    }

    #[test]
    fn test_repeated_reads_share_value() {
        let (graph, _, b_sum) = add_chain();
        let ctx = Context::default();
        let first = graph.get_value(b_sum, &ctx).unwrap();
        let second = graph.get_value(b_sum, &ctx).unwrap();
        assert!(ValueHandle::ptr_eq(&first, &second));
        assert_eq!(graph.engine().stats().computes, 2);
    }

    #[test]
    fn test_leaf_value_coerced_to_requesting_plug() {
        let mut graph = Graph::new("compute");
        let arith = graph.create_node("Arithmetic", "arith").unwrap();
        let add = graph.create_node("Add", "add").unwrap();
        let a = graph.plug_by_path(arith, "a").unwrap();
        let op1 = graph.plug_by_path(add, "op1").unwrap();
        graph.set_value(op1, 3).unwrap();
        graph.set_input(a, Some(op1)).unwrap();

        assert_eq!(graph.get_value(a, &Context::default()).unwrap(), PlugValue::Float(3.0));
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = Graph::new("compute");
        let a = graph.create_node("Add", "a").unwrap();
        let b = graph.create_node("Add", "b").unwrap();
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        let b_sum = graph.plug_by_path(b, "sum").unwrap();
        graph.set_input(graph.plug_by_path(b, "op1").unwrap(), Some(a_sum)).unwrap();
        graph.set_input(graph.plug_by_path(a, "op1").unwrap(), Some(b_sum)).unwrap();

        let result = graph.get_value(b_sum, &Context::default());
        assert!(matches!(result.map_err(|e| e.root_cause().clone()), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_read_cleans_pass_through_plugs() {
        let mut graph = Graph::new("compute");
        let a = graph.create_node("Add", "a").unwrap();
        let b = graph.create_node("Add", "b").unwrap();
        let c = graph.create_node("Add", "c").unwrap();
        let a_op1 = graph.plug_by_path(a, "op1").unwrap();
        let b_op1 = graph.plug_by_path(b, "op1").unwrap();
        let c_op1 = graph.plug_by_path(c, "op1").unwrap();
        graph.set_input(b_op1, Some(a_op1)).unwrap();
        graph.set_input(c_op1, Some(b_op1)).unwrap();
        graph.set_value(a_op1, 4).unwrap();
        assert_eq!(graph.plug_state(b_op1), Ok(PlugState::Dirty));

        assert_eq!(graph.get_value(c_op1, &Context::default()).unwrap(), PlugValue::Int(4));
        for plug in [a_op1, b_op1, c_op1] {
            assert_eq!(graph.plug_state(plug), Ok(PlugState::Clean));
        }
    }

    #[test]
    fn test_compound_hash_includes_child_names() {
        use crate::plug::PlugDescriptor;

        let mut graph = Graph::new("compute");
        let node = graph.create_node("Box", "box").unwrap();
        let user = graph
            .add_plug(node, None, PlugDescriptor::container("user", Direction::In, Vec::new()))
            .unwrap();
        let a = graph.add_plug(node, Some(user), PlugDescriptor::input("a", 1.0)).unwrap();
        let ctx = Context::default();
        let before = graph.hash(user, &ctx).unwrap();

        graph.remove_plug(a).unwrap();
        graph.add_plug(node, Some(user), PlugDescriptor::input("b", 1.0)).unwrap();
        assert_ne!(graph.hash(user, &ctx).unwrap(), before);
    }
}
