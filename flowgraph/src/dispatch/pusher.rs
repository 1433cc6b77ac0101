// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pusher adapters (spec.md §4.4): the handles components hold to re-enter
//! the runtime with new packets. Both adapters share the same accumulation
//! and weak-liveness behavior; they exist as distinct types only so the
//! engine's wiring code (and component authors) can tell at a glance
//! whether a pusher came from a bound source or from a pathable's own
//! inbound packet.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::trace;

use crate::dispatch::queue::{DispatchTarget, PushedPacketInfo};
use crate::graph::Graph;
use crate::packet::{Channel, Packet};

#[derive(Clone)]
pub(crate) struct PusherCore {
    pub(crate) graph: Arc<RwLock<Graph>>,
    pub(crate) sender: crossbeam_channel::Sender<PushedPacketInfo>,
    pub(crate) notify: Arc<Notify>,
    pub(crate) node_name: String,
}

impl PusherCore {
    /// Pushing on a node the graph has dropped is a no-op (spec.md §4.4
    /// "Pushers are weakly tied to the node they serve"). Applies §4.3.1
    /// parameter accumulation using the *current* `lastReceivedParameters`
    /// of the issuing node, read at push time, not at delivery time.
    pub(crate) fn push(&self, packet: Packet, channel: Channel) {
        let merged_parameters = {
            let graph = self.graph.read();
            match graph.get_node(&self.node_name) {
                Some(node) => match &node.last_received_parameters {
                    Some(last) => last.merge(&packet.parameters),
                    None => packet.parameters.clone(),
                },
                None => {
                    trace!(node = %self.node_name, "push on dropped node is a no-op");
                    return;
                }
            }
        };

        let info = PushedPacketInfo {
            packet: Packet {
                parameters: merged_parameters,
                buffers: packet.buffers,
            },
            target: DispatchTarget::ByChannel {
                from: self.node_name.clone(),
                channel,
            },
        };

        if self.sender.send(info).is_ok() {
            self.notify.notify_one();
        }
    }
}

/// Issued to a bound source via `Instance::set_source_pusher`.
#[derive(Clone)]
pub struct SourcePusher(pub(crate) PusherCore);

impl SourcePusher {
    pub fn push(&self, packet: Packet, channel: Channel) {
        self.0.push(packet, channel);
    }

    pub fn node_name(&self) -> &str {
        &self.0.node_name
    }
}

/// Issued to a pathable node, embedded in its [`crate::packet::PathablePacket`].
#[derive(Clone)]
pub struct PathablePusher(pub(crate) PusherCore);

impl PathablePusher {
    pub fn push(&self, packet: Packet, channel: Channel) {
        self.0.push(packet, channel);
    }

    pub fn node_name(&self) -> &str {
        &self.0.node_name
    }
}
