// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `ParameterExtract` (orig: `ParameterExtractor`, SPEC_FULL.md §10): reads
//! a configured path out of incoming parameters and emits a packet whose
//! parameters are `{ <outputKey>: <extracted value> }`.

use tracing::warn;

use crate::capability::{ComponentHandle, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{error_packet, Channel, Packet, ERROR_CHANNEL};
use crate::parameters::Parameters;

struct ParameterExtractSink {
    path: String,
    output_key: String,
    output_channel: Channel,
    pusher: PusherCell,
}

impl SinkHandler for ParameterExtractSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("ParameterExtract: no pusher bound, dropping packet");
            return;
        };
        match packet.parameters.get_path(&self.path) {
            Some(value) => {
                let mut obj = serde_json::Map::new();
                obj.insert(self.output_key.clone(), value.clone());
                let out = Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj)));
                pusher.push(out, self.output_channel.clone());
            }
            None => {
                let err = error_packet(
                    "MissingField",
                    &format!("packet has no value at path '{}'", self.path),
                    None,
                );
                pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
            }
        }
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let path = init.get_str("/path").unwrap_or("").to_string();
    let output_key = init.get_str("/outputKey").unwrap_or("value").to_string();
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;

    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(
        ParameterExtractSink {
            path,
            output_key,
            output_channel,
            pusher: pusher.clone(),
        },
        BoundSource(pusher),
    )
}
