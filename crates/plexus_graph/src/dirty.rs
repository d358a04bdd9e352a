// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dirty propagation.
//!
//! A change to a plug dirties, transitively: plugs wired downstream of it,
//! plugs its node reports through `affects`, and the compound ancestors of
//! every dirtied plug. Dirtying bumps the plug's dirty count, which is part
//! of the hash cache key, so the next read recomputes the fingerprint.
//! Cached values are left alone.

use crate::graph::{Graph, GraphEvent};
use crate::node::NodeId;
use crate::plug::{Direction, PlugId};
use indexmap::IndexSet;
use std::collections::VecDeque;

/// View of a node handed to [`NodeBehaviour::affects`](crate::NodeBehaviour::affects)
pub struct AffectsContext<'a> {
    graph: &'a Graph,
    node: NodeId,
}

impl<'a> AffectsContext<'a> {
    pub(crate) fn new(graph: &'a Graph, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// Get the graph
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Look up a plug of this node by relative path
    pub fn plug(&self, path: &str) -> Option<PlugId> {
        self.graph.node(self.node).and_then(|n| n.plug(path))
    }

    /// Whether `plug` is the plug at `path`
    pub fn is(&self, plug: PlugId, path: &str) -> bool {
        self.plug(path) == Some(plug)
    }

    /// Whether `plug` is the plug at `path` or one of its descendants
    pub fn is_within(&self, plug: PlugId, path: &str) -> bool {
        let Some(root) = self.plug(path) else {
            return false;
        };
        let mut current = Some(plug);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.graph.plug(id).and_then(|p| p.parent());
        }
        false
    }

    /// Whether `plug` is an input plug
    pub fn is_input(&self, plug: PlugId) -> bool {
        self.graph
            .plug(plug)
            .is_some_and(|p| p.direction() == Direction::In)
    }

    /// Append the plug at `path`, if it exists
    pub fn push(&self, path: &str, outputs: &mut Vec<PlugId>) {
        outputs.extend(self.plug(path));
    }

    /// Append every top-level output plug of this node
    pub fn all_outputs(&self, outputs: &mut Vec<PlugId>) {
        let Some(node) = self.graph.node(self.node) else {
            return;
        };
        outputs.extend(node.plugs().iter().copied().filter(|id| {
            self.graph
                .plug(*id)
                .is_some_and(|p| p.direction() == Direction::Out)
        }));
    }
}

impl Graph {
    /// Mark `roots` and everything they affect dirty, notifying observers.
    ///
    /// Returns the dirtied plugs in propagation order, each reported once.
    pub fn propagate_dirtiness(&mut self, roots: &[PlugId]) -> Vec<PlugId> {
        let mut queue: VecDeque<PlugId> = roots.iter().copied().collect();
        let mut visited: IndexSet<PlugId> = IndexSet::new();

        while let Some(plug_id) = queue.pop_front() {
            if visited.contains(&plug_id) {
                continue;
            }
            let Some(plug) = self.plugs.get(&plug_id) else {
                continue;
            };
            visited.insert(plug_id);

            queue.extend(plug.outputs.iter().copied());
            queue.extend(plug.parent);

            let Some(node) = self.nodes.get(&plug.node) else {
                continue;
            };
            let mut affected = Vec::new();
            node.behaviour
                .affects(&AffectsContext::new(self, node.id), plug_id, &mut affected);
            for output in affected {
                let mut family = IndexSet::new();
                self.collect_descendants(output, &mut family);
                queue.extend(family);
            }
        }

        for id in &visited {
            if let Some(plug) = self.plugs.get_mut(id) {
                plug.mark_dirty();
            }
        }

        let dirtied: Vec<PlugId> = visited.into_iter().collect();
        if !dirtied.is_empty() {
            tracing::debug!(roots = roots.len(), dirtied = dirtied.len(), "propagated dirtiness");
        }
        for id in &dirtied {
            self.emit(&GraphEvent::PlugDirtied(*id));
        }
        dirtied
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Graph, GraphEvent};
    use crate::plug::PlugState;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_dirtiness_is_transitive() {
        let mut graph = Graph::new("dirty");
        let a = graph.create_node("Add", "a").unwrap();
        let b = graph.create_node("Add", "b").unwrap();
        let c = graph.create_node("Add", "c").unwrap();
        let a_op1 = graph.plug_by_path(a, "op1").unwrap();
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        let b_op1 = graph.plug_by_path(b, "op1").unwrap();
        let b_sum = graph.plug_by_path(b, "sum").unwrap();
        let c_sum = graph.plug_by_path(c, "sum").unwrap();
        graph.set_input(b_op1, Some(a_sum)).unwrap();

        let dirtied = graph.propagate_dirtiness(&[a_op1]);

        assert_eq!(dirtied, vec![a_op1, a_sum, b_op1, b_sum]);
        assert_eq!(graph.plug_state(b_sum), Ok(PlugState::Dirty));
        assert_eq!(graph.plug_state(c_sum), Ok(PlugState::Clean));
    }

    #[test]
    fn test_each_plug_notified_once() {
        let mut graph = Graph::new("dirty");
        let a = graph.create_node("Add", "a").unwrap();
        let b = graph.create_node("Add", "b").unwrap();
        let a_op1 = graph.plug_by_path(a, "op1").unwrap();
        let a_sum = graph.plug_by_path(a, "sum").unwrap();
        let b_op1 = graph.plug_by_path(b, "op1").unwrap();
        let b_op2 = graph.plug_by_path(b, "op2").unwrap();
        graph.set_input(b_op1, Some(a_sum)).unwrap();
        graph.set_input(b_op2, Some(a_sum)).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        graph.subscribe(move |event| {
            if let GraphEvent::PlugDirtied(plug) = event {
                sink.lock().push(*plug);
            }
        });

        graph.set_value(a_op1, 4).unwrap();

        let events = events.lock();
        let b_sum = graph.plug_by_path(b, "sum").unwrap();
        assert_eq!(events.iter().filter(|p| **p == b_sum).count(), 1);
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_compound_child_dirties_parent() {
        let mut graph = Graph::new("dirty");
        let switch = graph.create_node("Switch", "switch").unwrap();
        let in0 = graph.plug_by_path(switch, "in.in0").unwrap();
        let container = graph.plug_by_path(switch, "in").unwrap();

        let dirtied = graph.propagate_dirtiness(&[in0]);
        assert!(dirtied.contains(&container));
    }
}
