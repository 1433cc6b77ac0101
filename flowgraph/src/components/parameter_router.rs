// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `ParameterRouter` (SPEC_FULL.md §10): reads a configured parameter path
//! from each incoming packet and re-emits the same packet on a channel
//! named after the path's string value (spec.md §8 scenario S4). A
//! missing or non-string value is an error packet.

use tracing::warn;

use crate::capability::{ComponentHandle, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{error_packet, Channel, Packet, ERROR_CHANNEL};
use crate::parameters::Parameters;

struct ParameterRouterSink {
    path: String,
    pusher: PusherCell,
}

impl SinkHandler for ParameterRouterSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("ParameterRouter: no pusher bound, dropping packet");
            return;
        };
        match packet.parameters.get_str(&self.path) {
            Some(route) => match Channel::new(route) {
                Ok(channel) => pusher.push(packet, channel),
                Err(_) => {
                    let err = error_packet("MissingRoutingKey", "route value must be non-empty", None);
                    pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
                }
            },
            None => {
                let err = error_packet(
                    "MissingRoutingKey",
                    &format!("packet has no string value at path '{}'", self.path),
                    None,
                );
                pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
            }
        }
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let path = init.get_str("/path").unwrap_or("").to_string();
    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(
        ParameterRouterSink {
            path,
            pusher: pusher.clone(),
        },
        BoundSource(pusher),
    )
}
