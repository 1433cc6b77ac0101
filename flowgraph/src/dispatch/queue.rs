// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::packet::{Channel, Packet};

/// Where a queued record should be delivered.
#[derive(Clone, Debug)]
pub enum DispatchTarget {
    /// Deliver along `from`'s forward edges matching `channel`.
    ByChannel { from: String, channel: Channel },
    /// Deliver straight to `target`, bypassing channel lookup
    /// (`Runtime::send_packet`, spec.md §4.3.4).
    Direct { target: String },
}

/// One record in the MPSC dispatch queue (spec.md §4.3 "PushedPacketInfo").
#[derive(Clone, Debug)]
pub struct PushedPacketInfo {
    pub packet: Packet,
    pub target: DispatchTarget,
}
