// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph topology (spec.md §4.1). Pure data: node creation, edges, and
//! traversal. Component-capability rules beyond the `allowsIncoming` /
//! `allowsOutgoing` flags tracked here are enforced one layer up, by
//! [`crate::dispatch::Runtime::connect`], which knows each node's bound
//! implementation's [`crate::capability::Capabilities`].

pub mod edge;
pub mod node;

use std::collections::HashMap;

use tracing::{debug, trace};

pub use edge::{DeliveryMode, Edge};
pub use node::GraphNode;

use crate::capability::Capabilities;
use crate::error::{FlowError, Result};
use crate::packet::Channel;

#[derive(Debug, Default)]
pub struct Graph {
    pub name: String,
    nodes: HashMap<String, GraphNode>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
        }
    }

    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        allows_incoming: bool,
        allows_outgoing: bool,
    ) -> Result<&mut GraphNode> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(FlowError::AlreadyExists(name));
        }
        debug!(node = %name, allows_incoming, allows_outgoing, "creating graph node");
        self.nodes
            .insert(name.clone(), GraphNode::new(name.clone(), allows_incoming, allows_outgoing));
        Ok(self.nodes.get_mut(&name).expect("just inserted"))
    }

    pub fn get_node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub fn get_node_mut(&mut self, name: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(name)
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Removes a node entirely (spec.md §4.3.5 "Graph mutation during
    /// dispatch" via `removeFromGraph`). Any edges other nodes hold into
    /// this one become dangling back-edge references, cleaned up lazily.
    pub fn remove_node(&mut self, name: &str) -> Option<GraphNode> {
        let removed = self.nodes.remove(name);
        if removed.is_some() {
            debug!(node = %name, "removed graph node");
            for (_, node) in self.nodes.iter_mut() {
                for edges in node.forward_edges.values_mut() {
                    edges.retain(|e| e.next != name);
                }
            }
        }
        removed
    }

    /// Connects `from --channel--> to`. Idempotent: an identical edge is
    /// returned rather than duplicated. Topology-only; see module docs for
    /// where capability rules are enforced.
    pub fn connect(&mut self, from: &str, channel: Channel, to: &str) -> Result<Edge> {
        if !self.nodes.contains_key(from) {
            return Err(FlowError::UnknownNode(from.to_string()));
        }
        if !self.nodes.contains_key(to) {
            return Err(FlowError::UnknownNode(to.to_string()));
        }

        {
            let from_node = &self.nodes[from];
            if !from_node.allows_outgoing {
                return Err(FlowError::IncompatibleCapability(format!(
                    "node '{from}' does not allow outgoing connections"
                )));
            }
            let to_node = &self.nodes[to];
            if !to_node.allows_incoming {
                return Err(FlowError::IncompatibleCapability(format!(
                    "node '{to}' does not allow incoming connections"
                )));
            }
        }

        if let Some(existing) = self.nodes[from]
            .forward_edges
            .get(&channel)
            .and_then(|edges| edges.iter().find(|e| e.next == to))
        {
            trace!(from, %channel, to, "connect is a no-op, edge already exists");
            return Ok(existing.clone());
        }

        let edge = Edge::new(channel.clone(), to, DeliveryMode::default());
        self.nodes
            .get_mut(from)
            .expect("checked above")
            .forward_edges
            .entry(channel)
            .or_default()
            .push(edge.clone());

        let to_node = self.nodes.get_mut(to).expect("checked above");
        if !to_node.back_edges.iter().any(|n| n == from) {
            to_node.back_edges.push(from.to_string());
        }
        self.purge_dead_back_edges(to);

        debug!(from, to, channel = %edge.channel, "connected");
        Ok(edge)
    }

    /// Removes the forward edge and corresponding back edge. No-op if
    /// absent.
    pub fn disconnect(&mut self, from: &str, channel: &Channel, to: &str) {
        if let Some(node) = self.nodes.get_mut(from) {
            if let Some(edges) = node.forward_edges.get_mut(channel) {
                edges.retain(|e| e.next != to);
            }
        }
        if let Some(to_node) = self.nodes.get_mut(to) {
            to_node.back_edges.retain(|n| n != from);
        }
        debug!(from, to, %channel, "disconnected");
    }

    fn purge_dead_back_edges(&mut self, node_name: &str) {
        let alive: Vec<String> = {
            let node = match self.nodes.get(node_name) {
                Some(n) => n,
                None => return,
            };
            node.back_edges
                .iter()
                .filter(|n| self.nodes.contains_key(n.as_str()))
                .cloned()
                .collect()
        };
        if let Some(node) = self.nodes.get_mut(node_name) {
            node.back_edges = alive;
        }
    }

    /// Visits every node in unspecified order.
    pub fn visit_nodes(&self, mut visitor: impl FnMut(&GraphNode)) {
        for node in self.nodes.values() {
            visitor(node);
        }
    }

    /// Visits nodes with a non-empty `back_edges` list first, then nodes
    /// with none. Order within each group is unspecified (spec.md's Open
    /// Question on "heads last" is resolved this way; see SPEC_FULL.md).
    pub fn visit_nodes_heads_last(&self, mut visitor: impl FnMut(&GraphNode)) {
        let (with_back_edges, heads): (Vec<_>, Vec<_>) =
            self.nodes.values().partition(|n| !n.back_edges.is_empty());
        for node in with_back_edges {
            visitor(node);
        }
        for node in heads {
            visitor(node);
        }
    }

    /// Drops empty forward-edge channel buckets and expired back edges
    /// across the whole graph (spec.md §4.1 `cleanUpEmptyEdges`).
    pub fn clean_up_empty_edges(&mut self) {
        let names: Vec<String> = self.nodes.keys().cloned().collect();
        for name in &names {
            self.purge_dead_back_edges(name);
        }
        for node in self.nodes.values_mut() {
            node.drop_empty_channel_buckets();
        }
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Records the capability set of the implementation now bound to
    /// `name`, so capability rules can be checked without reaching into
    /// loop-thread-only instance state.
    pub fn set_node_capabilities(&mut self, name: &str, capabilities: Capabilities) {
        if let Some(node) = self.nodes.get_mut(name) {
            node.capabilities = capabilities;
        }
    }

    /// Checks that every edge's endpoints have compatible capabilities
    /// (spec.md §3: source must be {source|pathable}, destination must be
    /// {sink|pathable}). Nodes whose capabilities are still unknown
    /// (`Capabilities::empty()`, i.e. not yet bound to an implementation)
    /// are skipped -- this runs after the builder's "implement" step, but
    /// defensively tolerates partially-bound graphs.
    pub fn validate_connections(&self) -> Result<()> {
        for node in self.nodes.values() {
            if node.capabilities.is_empty() {
                continue;
            }
            if !node.capabilities.can_be_edge_source() && !node.forward_edges.is_empty() {
                return Err(FlowError::IncompatibleCapability(format!(
                    "node '{}' has outgoing edges but is not source- or pathable-capable",
                    node.name
                )));
            }
        }
        for node in self.nodes.values() {
            for edges in node.forward_edges.values() {
                for edge in edges {
                    if let Some(dest) = self.nodes.get(&edge.next) {
                        if !dest.capabilities.is_empty() && !dest.capabilities.can_be_edge_destination()
                        {
                            return Err(FlowError::IncompatibleCapability(format!(
                                "node '{}' is not sink- or pathable-capable but has an incoming edge from '{}'",
                                dest.name, node.name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
