// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The dispatch engine (spec.md §4.3): the core of the runtime. Owns the
//! graph, the instance table, the factory registry, and the MPSC packet
//! queue, and drives delivery on the loop thread.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::capability::Capabilities;
use crate::dispatch::pusher::{PathablePusher, PusherCore, SourcePusher};
use crate::dispatch::queue::{DispatchTarget, PushedPacketInfo};
use crate::error::{FlowError, Result};
use crate::factory::FactoryRegistry;
use crate::graph::{DeliveryMode, Edge, Graph};
use crate::instance::Instance;
use crate::packet::{Channel, Packet, PathablePacket, ERROR_CHANNEL};
use crate::parameters::Parameters;

/// Cap on how many queued records a single drain pass processes before
/// yielding back to the loop (spec.md §4.3 "Drain").
const DRAIN_BATCH_CAP: usize = 100;

pub struct Runtime {
    graph: Arc<RwLock<Graph>>,
    instances: HashMap<String, Instance>,
    instance_nodes: HashMap<String, Vec<String>>,
    factories: FactoryRegistry,
    sender: crossbeam_channel::Sender<PushedPacketInfo>,
    receiver: crossbeam_channel::Receiver<PushedPacketInfo>,
    notify: Arc<Notify>,
}

impl Runtime {
    pub fn new(graph_name: impl Into<String>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            graph: Arc::new(RwLock::new(Graph::new(graph_name))),
            instances: HashMap::new(),
            instance_nodes: HashMap::new(),
            factories: FactoryRegistry::new(),
            sender,
            receiver,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn factories_mut(&mut self) -> &mut FactoryRegistry {
        &mut self.factories
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn graph(&self) -> Arc<RwLock<Graph>> {
        self.graph.clone()
    }

    // ---- topology -------------------------------------------------

    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        allows_incoming: bool,
        allows_outgoing: bool,
    ) -> Result<()> {
        self.graph
            .write()
            .create_node(name, allows_incoming, allows_outgoing)?;
        Ok(())
    }

    pub fn connect(&mut self, from: &str, channel: &str, to: &str) -> Result<Edge> {
        let channel = Channel::new(channel)?;
        self.graph.write().connect(from, channel, to)
    }

    pub fn connect_with_mode(
        &mut self,
        from: &str,
        channel: &str,
        to: &str,
        mode: DeliveryMode,
    ) -> Result<Edge> {
        let edge = self.connect(from, channel, to)?;
        let channel = edge.channel.clone();
        let mut graph = self.graph.write();
        if let Some(node) = graph.get_node_mut(from) {
            if let Some(edges) = node.forward_edges.get_mut(&channel) {
                for e in edges.iter_mut().filter(|e| e.next == to) {
                    e.delivery_mode = mode;
                }
            }
        }
        Ok(Edge::new(channel, to, mode))
    }

    pub fn disconnect(&mut self, from: &str, channel: &str, to: &str) -> Result<()> {
        let channel = Channel::new(channel)?;
        self.graph.write().disconnect(from, &channel, to);
        Ok(())
    }

    /// Removes a node and all edges referencing it (spec.md §4.3.5).
    pub fn remove_node(&mut self, name: &str) {
        self.graph.write().remove_node(name);
    }

    pub fn validate_connections(&self) -> Result<()> {
        self.graph.read().validate_connections()
    }

    // ---- instances --------------------------------------------------

    fn ensure_instance(&mut self, name: &str) -> &mut Instance {
        self.instances.entry(name.to_string()).or_insert_with(Instance::new)
    }

    pub fn set_instance_init_parameters(&mut self, instance_name: &str, params: Parameters) {
        self.ensure_instance(instance_name).set_init_parameters(params);
    }

    pub fn set_instance_thread_group(&mut self, instance_name: &str, group: impl Into<String>) {
        self.ensure_instance(instance_name).set_thread_group_name(group);
    }

    pub fn set_instance_type(&mut self, instance_name: &str, type_name: &str) -> Result<()> {
        {
            let factories = self.factories.clone();
            let instance = self.ensure_instance(instance_name);
            instance.set_type(type_name, &factories)?;
        }
        self.refresh_capabilities(instance_name);
        Ok(())
    }

    pub fn set_instance_implementation(
        &mut self,
        instance_name: &str,
        implementation: crate::capability::ComponentHandle,
    ) {
        self.ensure_instance(instance_name)
            .set_implementation(implementation);
        self.refresh_capabilities(instance_name);
    }

    /// Binds `node_name` to `instance_name`: records the association, and
    /// -- if the instance's implementation is source-capable and has no
    /// pusher yet -- mints a [`SourcePusher`] bound to this node.
    pub fn bind_node_to_instance(&mut self, node_name: &str, instance_name: &str) -> Result<()> {
        if !self.graph.read().contains_node(node_name) {
            return Err(FlowError::UnknownNode(node_name.to_string()));
        }

        {
            let mut graph = self.graph.write();
            let node = graph.get_node_mut(node_name).expect("checked above");
            node.instance_name = Some(instance_name.to_string());
        }
        self.instance_nodes
            .entry(instance_name.to_string())
            .or_default()
            .push(node_name.to_string());

        let needs_pusher = self
            .ensure_instance(instance_name)
            .implementation()
            .map(|h| h.is_source())
            .unwrap_or(false);

        if needs_pusher {
            let pusher = SourcePusher(PusherCore {
                graph: self.graph.clone(),
                sender: self.sender.clone(),
                notify: self.notify.clone(),
                node_name: node_name.to_string(),
            });
            self.ensure_instance(instance_name).set_source_pusher(pusher)?;
        }

        self.refresh_capabilities(instance_name);
        Ok(())
    }

    fn refresh_capabilities(&mut self, instance_name: &str) {
        let caps = self
            .instances
            .get(instance_name)
            .and_then(|i| i.implementation())
            .map(|h| h.capabilities)
            .unwrap_or(Capabilities::empty());
        if let Some(nodes) = self.instance_nodes.get(instance_name) {
            let mut graph = self.graph.write();
            for node_name in nodes {
                graph.set_node_capabilities(node_name, caps);
            }
        }
    }

    pub fn instance_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.instances.get_mut(name)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Extracts a named sub-interface out of an already-`type`-bound group
    /// instance (spec.md §4.6 `implementationFromGroup` / `instanceToInterfaceMap`).
    /// Consumes that sub-interface out of the group's handler: requesting the
    /// same interface name twice returns `MissingFactory` the second time.
    pub fn take_group_interface(
        &mut self,
        group_instance_name: &str,
        interface_name: &str,
    ) -> Result<crate::capability::ComponentHandle> {
        let instance = self
            .instances
            .get_mut(group_instance_name)
            .ok_or_else(|| FlowError::MissingFactory(group_instance_name.to_string()))?;
        let implementation = instance.implementation_mut().ok_or_else(|| {
            FlowError::IncompatibleCapability(format!(
                "instance '{group_instance_name}' has no implementation bound yet"
            ))
        })?;
        let group = implementation.group.as_mut().ok_or_else(|| {
            FlowError::IncompatibleCapability(format!(
                "instance '{group_instance_name}' is not group-capable"
            ))
        })?;
        group.get_interface(interface_name).ok_or_else(|| {
            FlowError::MissingFactory(format!(
                "'{group_instance_name}' has no sub-interface '{interface_name}' (or it was already taken)"
            ))
        })
    }

    // ---- sending ------------------------------------------------------

    /// Enqueues a direct-target record, bypassing channel lookup (spec.md
    /// §4.3.4). Callable from any thread.
    pub fn send_packet(&self, packet: Packet, to_node: &str) -> Result<()> {
        let caps = self.graph.read().get_node(to_node).map(|n| n.capabilities);
        match caps {
            None => Err(FlowError::UnknownNode(to_node.to_string())),
            Some(caps) if !caps.is_empty() && !caps.can_be_edge_destination() => {
                Err(FlowError::IncompatibleCapability(format!(
                    "node '{to_node}' is not sink- or pathable-capable"
                )))
            }
            _ => {
                let info = PushedPacketInfo {
                    packet,
                    target: DispatchTarget::Direct {
                        target: to_node.to_string(),
                    },
                };
                if self.sender.send(info).is_ok() {
                    self.notify.notify_one();
                }
                Ok(())
            }
        }
    }

    pub fn wake_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.receiver.len()
    }

    // ---- dispatch loop --------------------------------------------------

    /// Runs forever, waking on every `notify` signal and draining the
    /// queue. Intended to be spawned as the host's event-loop task.
    pub async fn run(&mut self) {
        loop {
            self.notify.notified().await;
            self.drain_available();
        }
    }

    /// Drains whatever is currently queued, honoring the batch cap
    /// (spec.md §4.3 "Drain"). Returns the number of records processed.
    /// Exposed directly so tests and embedders can tick the engine
    /// synchronously instead of running the async loop.
    pub fn drain_available(&mut self) -> usize {
        let target = self.receiver.len();
        let mut processed = 0;
        while processed < target {
            let batch = DRAIN_BATCH_CAP.min(target - processed);
            for _ in 0..batch {
                match self.receiver.try_recv() {
                    Ok(info) => {
                        self.deliver(info);
                        processed += 1;
                    }
                    Err(_) => return processed,
                }
            }
        }
        processed
    }

    fn deliver(&mut self, info: PushedPacketInfo) {
        match info.target {
            DispatchTarget::Direct { target } => {
                self.deliver_to_node(&target, info.packet);
            }
            DispatchTarget::ByChannel { from, channel } => {
                let edges: Vec<Edge> = {
                    let graph = self.graph.read();
                    graph
                        .get_node(&from)
                        .map(|n| n.edges_for_channel(&channel).to_vec())
                        .unwrap_or_default()
                };
                if edges.is_empty() {
                    if channel.as_str() == ERROR_CHANNEL {
                        warn!(from, %channel, "dropped error packet: no matching edge");
                    } else {
                        trace!(from, %channel, "dropped packet: no matching edge");
                    }
                    return;
                }
                // Every delivery already went through the MPSC queue to get
                // here, so `DirectToTarget` vs `AlwaysQueue` doesn't change
                // behavior at this point -- both bound stack depth the same
                // way. The distinction is preserved on the edge for callers
                // that inspect topology (the dot exporter, `visit_nodes`)
                // and for a future loop-thread tail-call fast path.
                for edge in edges {
                    let _ = edge.delivery_mode;
                    self.deliver_to_node(&edge.next, info.packet.clone());
                }
            }
        }
    }

    fn deliver_to_node(&mut self, node_name: &str, packet: Packet) {
        let dispatch_kind = {
            let mut graph = self.graph.write();
            match graph.get_node_mut(node_name) {
                None => {
                    trace!(node = node_name, "dropped packet: target node no longer exists");
                    return;
                }
                Some(node) => {
                    node.last_received_parameters = Some(packet.parameters.clone());
                    node.capabilities
                }
            }
        };

        let instance_name = {
            let graph = self.graph.read();
            graph
                .get_node(node_name)
                .and_then(|n| n.instance_name.clone())
        };
        let Some(instance_name) = instance_name else {
            trace!(node = node_name, "dropped packet: node has no bound instance");
            return;
        };
        let Some(instance) = self.instances.get_mut(&instance_name) else {
            trace!(node = node_name, instance = %instance_name, "dropped packet: instance missing");
            return;
        };
        let Some(implementation) = instance.implementation_mut() else {
            trace!(node = node_name, "dropped packet: instance has no implementation");
            return;
        };

        if dispatch_kind.contains(Capabilities::PATHABLE) {
            if let Some(pathable) = &mut implementation.pathable {
                let pusher = PathablePusher(PusherCore {
                    graph: self.graph.clone(),
                    sender: self.sender.clone(),
                    notify: self.notify.clone(),
                    node_name: node_name.to_string(),
                });
                pathable.handle_packet(PathablePacket { packet, pusher });
                return;
            }
        }

        if dispatch_kind.contains(Capabilities::SINK) {
            if let Some(sink) = &mut implementation.sink {
                sink.handle_packet(packet);
                return;
            }
        }

        debug!(node = node_name, "dropped packet: destination has no inbound capability");
    }
}
