// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `ParameterAdd` (orig: `AddParametersNode`, SPEC_FULL.md §10): merges a
//! fixed set of configured parameters into every incoming packet and
//! re-emits it on a configured output channel.

use tracing::warn;

use crate::capability::{ComponentHandle, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{Channel, Packet};
use crate::parameters::Parameters;

struct ParameterAddSink {
    to_add: Parameters,
    output_channel: Channel,
    pusher: PusherCell,
}

impl SinkHandler for ParameterAddSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("ParameterAdd: no pusher bound, dropping packet");
            return;
        };
        let merged = packet.parameters.merge(&self.to_add);
        pusher.push(Packet::new(merged, packet.buffers), self.output_channel.clone());
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let to_add = init
        .get_path("/parameters")
        .cloned()
        .map(Parameters::from_value)
        .unwrap_or_else(Parameters::object);
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;

    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(
        ParameterAddSink {
            to_add,
            output_channel,
            pusher: pusher.clone(),
        },
        BoundSource(pusher),
    )
}
