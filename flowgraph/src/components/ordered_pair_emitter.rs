// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `OrderedPairEmitter` (SPEC_FULL.md §10): a source-only component that,
//! the moment a pusher is bound, emits two configured packets in fixed
//! order on a configured output channel (spec.md §8 Testable Property 2 —
//! FIFO delivery order is preserved end to end).

use crate::capability::{ComponentHandle, SourceHandler};
use crate::dispatch::pusher::SourcePusher;
use crate::error::Result;
use crate::packet::{Channel, Packet};
use crate::parameters::Parameters;

struct OrderedPairSource {
    output_channel: Channel,
    first: Packet,
    second: Packet,
}

impl SourceHandler for OrderedPairSource {
    fn bind_pusher(&mut self, pusher: SourcePusher) {
        pusher.push(self.first.clone(), self.output_channel.clone());
        pusher.push(self.second.clone(), self.output_channel.clone());
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;
    let first = init
        .get_path("/first")
        .cloned()
        .map(|value| Packet::with_parameters(Parameters::from_value(value)))
        .unwrap_or_else(Packet::empty);
    let second = init
        .get_path("/second")
        .cloned()
        .map(|value| Packet::with_parameters(Parameters::from_value(value)))
        .unwrap_or_else(Packet::empty);

    ComponentHandle::source(OrderedPairSource {
        output_channel,
        first,
        second,
    })
}
