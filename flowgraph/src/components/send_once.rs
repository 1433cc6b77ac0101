// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `SendOnce` (SPEC_FULL.md §10): a source-only component that emits exactly
//! one configured packet the first time a pusher is bound, and is a no-op on
//! any subsequent bind (spec.md §8 scenario S2).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::capability::{ComponentHandle, SourceHandler};
use crate::dispatch::pusher::SourcePusher;
use crate::error::Result;
use crate::packet::{Channel, Packet};
use crate::parameters::Parameters;

struct SendOnceSource {
    output_channel: Channel,
    packet: Packet,
    sent: AtomicBool,
}

impl SourceHandler for SendOnceSource {
    fn bind_pusher(&mut self, pusher: SourcePusher) {
        if self.sent.swap(true, Ordering::SeqCst) {
            return;
        }
        pusher.push(self.packet.clone(), self.output_channel.clone());
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;
    let packet = init
        .get_path("/packet")
        .cloned()
        .map(|value| Packet::with_parameters(Parameters::from_value(value)))
        .unwrap_or_else(Packet::empty);

    ComponentHandle::source(SendOnceSource {
        output_channel,
        packet,
        sent: AtomicBool::new(false),
    })
}
