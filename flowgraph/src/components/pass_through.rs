// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `PassThrough` (orig: `PassThroughNode`, SPEC_FULL.md §10): re-emits
//! every incoming packet unchanged on a single configured output channel
//! (spec.md §8 scenario S3).

use tracing::warn;

use crate::capability::{ComponentHandle, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{Channel, Packet};
use crate::parameters::Parameters;

struct PassThroughSink {
    output_channel: Channel,
    pusher: PusherCell,
}

impl SinkHandler for PassThroughSink {
    fn handle_packet(&mut self, packet: Packet) {
        match self.pusher.get() {
            Some(pusher) => pusher.push(packet, self.output_channel.clone()),
            None => warn!("PassThrough: no pusher bound, dropping packet"),
        }
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;
    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(
        PassThroughSink {
            output_channel,
            pusher: pusher.clone(),
        },
        BoundSource(pusher),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::pusher::{PusherCore, SourcePusher};
    use crate::graph::Graph;
    use parking_lot::RwLock;
    use std::sync::Arc;

    #[test]
    fn re_emits_unchanged() {
        let mut handle = create(Parameters::null()).unwrap();
        let graph = Arc::new(RwLock::new(Graph::new("g")));
        graph.write().create_node("n", true, true).unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let notify = Arc::new(tokio::sync::Notify::new());
        handle.source.as_mut().unwrap().bind_pusher(SourcePusher(PusherCore {
            graph,
            sender,
            notify,
            node_name: "n".to_string(),
        }));

        let params = Parameters::from_value(serde_json::json!({"x": 1}));
        handle.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(params.clone()));
        let pushed = receiver.try_recv().unwrap();
        assert_eq!(pushed.packet.parameters, params);
    }
}
