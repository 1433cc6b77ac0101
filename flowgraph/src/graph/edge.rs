// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::packet::Channel;

/// How a pushed packet crosses an edge (spec.md §4.3.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeliveryMode {
    /// The runtime may bypass the queue and call the destination's
    /// `handle_packet` directly when the producer is already running on
    /// the loop thread (tail-call semantics).
    DirectToTarget,
    /// Forces a round-trip through the dispatch queue, bounding stack
    /// depth and letting re-entrant pushers interleave.
    AlwaysQueue,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::DirectToTarget
    }
}

/// A directed connection from one node's channel to another node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub channel: Channel,
    pub next: String,
    pub delivery_mode: DeliveryMode,
}

impl Edge {
    pub fn new(channel: Channel, next: impl Into<String>, delivery_mode: DeliveryMode) -> Self {
        Self {
            channel,
            next: next.into(),
            delivery_mode,
        }
    }
}
