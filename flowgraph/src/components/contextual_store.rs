// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `ContextualStore` (orig: `VolatileKeyValueStore`, SPEC_FULL.md §10): a
//! sink+source keyed ephemeral map. The incoming packet's `/op` selects
//! `put` (stores `/key` -> `/value`), `get` (re-emits the stored value, or
//! an error packet if absent), or `delete` (removes the key, always
//! succeeds). Used as a realistic inner component for context-router
//! scenarios (spec.md §8 S5).

use std::collections::HashMap;

use tracing::warn;

use crate::capability::{ComponentHandle, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{error_packet, Channel, Packet, ERROR_CHANNEL};
use crate::parameters::Parameters;

struct ContextualStoreSink {
    output_channel: Channel,
    store: HashMap<String, serde_json::Value>,
    pusher: PusherCell,
}

impl SinkHandler for ContextualStoreSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("ContextualStore: no pusher bound, dropping packet");
            return;
        };

        let op = packet.parameters.get_str("/op").unwrap_or("");
        let key = packet.parameters.get_str("/key").map(str::to_string);

        match op {
            "put" => {
                let Some(key) = key else {
                    let err = error_packet("MissingField", "put requires /key", None);
                    pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
                    return;
                };
                let value = packet.parameters.get_path("/value").cloned().unwrap_or(serde_json::Value::Null);
                self.store.insert(key.clone(), value);
                let mut obj = serde_json::Map::new();
                obj.insert("key".into(), serde_json::Value::String(key));
                obj.insert("ok".into(), serde_json::Value::Bool(true));
                pusher.push(
                    Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj))),
                    self.output_channel.clone(),
                );
            }
            "get" => {
                let Some(key) = key else {
                    let err = error_packet("MissingField", "get requires /key", None);
                    pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
                    return;
                };
                match self.store.get(&key) {
                    Some(value) => {
                        let mut obj = serde_json::Map::new();
                        obj.insert("key".into(), serde_json::Value::String(key));
                        obj.insert("value".into(), value.clone());
                        pusher.push(
                            Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj))),
                            self.output_channel.clone(),
                        );
                    }
                    None => {
                        let err = error_packet("MissingKey", &format!("no value stored for key '{key}'"), None);
                        pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
                    }
                }
            }
            "delete" => {
                if let Some(key) = key {
                    self.store.remove(&key);
                }
                let mut obj = serde_json::Map::new();
                obj.insert("ok".into(), serde_json::Value::Bool(true));
                pusher.push(
                    Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj))),
                    self.output_channel.clone(),
                );
            }
            other => {
                let err = error_packet("UnknownOp", &format!("unrecognized op '{other}'"), None);
                pusher.push(err, Channel::new(ERROR_CHANNEL).expect("non-empty"));
            }
        }
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;
    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(
        ContextualStoreSink {
            output_channel,
            store: HashMap::new(),
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

    fn bound_handle() -> (ComponentHandle, crossbeam_channel::Receiver<crate::dispatch::queue::PushedPacketInfo>) {
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
        (handle, receiver)
    }

    #[test]
    fn put_then_get_round_trips_value() {
        let (mut handle, receiver) = bound_handle();
        handle.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(Parameters::from_value(
            serde_json::json!({"op": "put", "key": "a", "value": 42}),
        )));
        let _ = receiver.try_recv().unwrap();

        handle.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(Parameters::from_value(
            serde_json::json!({"op": "get", "key": "a"}),
        )));
        let pushed = receiver.try_recv().unwrap();
        assert_eq!(pushed.packet.parameters.get_path("/value"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn get_on_missing_key_emits_error() {
        let (mut handle, receiver) = bound_handle();
        handle.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(Parameters::from_value(
            serde_json::json!({"op": "get", "key": "missing"}),
        )));
        let pushed = receiver.try_recv().unwrap();
        assert_eq!(pushed.packet.parameters.get_str("/errorName"), Some("MissingKey"));
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut handle, receiver) = bound_handle();
        handle.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(Parameters::from_value(
            serde_json::json!({"op": "delete", "key": "never-existed"}),
        )));
        let pushed = receiver.try_recv().unwrap();
        assert_eq!(pushed.packet.parameters.get_path("/ok"), Some(&serde_json::json!(true)));
    }
}
