// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `BufferAccumulator` (orig: `BufferAccumulatorNode`, SPEC_FULL.md §10): a
//! group exposing `append` (sink) and `send` (sink+source). `append` adds
//! incoming buffers to an internal list in order (spec.md §8 scenario S6);
//! `send` flushes the accumulated list as a single outgoing packet and
//! clears the accumulator.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::buffer::Buffer;
use crate::capability::{ComponentHandle, GroupHandler, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{Channel, Packet};
use crate::parameters::Parameters;

#[derive(Clone, Default)]
struct Accumulated(Arc<Mutex<Vec<Buffer>>>);

struct AppendSink(Accumulated);

impl SinkHandler for AppendSink {
    /// Per spec.md §8 S6: a packet's first buffer extends whatever buffer
    /// is currently last in the accumulator (concatenated into one), so a
    /// multi-packet stream reads as continuous text; any further buffers
    /// in the same packet start new, separate entries.
    fn handle_packet(&mut self, packet: Packet) {
        let mut list = self.0 .0.lock();
        let mut incoming = packet.buffers.into_iter();
        if let Some(first) = incoming.next() {
            match list.last_mut() {
                Some(last) => *last = Buffer::concat(&[last.clone(), first]),
                None => list.push(first),
            }
        }
        for buffer in incoming {
            list.push(buffer);
        }
    }
}

struct SendSink {
    accumulated: Accumulated,
    output_channel: Channel,
    pusher: PusherCell,
}

impl SinkHandler for SendSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("BufferAccumulator: no pusher bound on 'send', dropping trigger");
            return;
        };
        let buffers = std::mem::take(&mut *self.accumulated.0.lock());
        pusher.push(Packet::new(packet.parameters, buffers), self.output_channel.clone());
    }
}

struct BufferAccumulatorGroup {
    append: Option<ComponentHandle>,
    send: Option<ComponentHandle>,
}

impl GroupHandler for BufferAccumulatorGroup {
    fn interface_names(&self) -> Vec<String> {
        vec!["append".to_string(), "send".to_string()]
    }

    fn get_interface(&mut self, name: &str) -> Option<ComponentHandle> {
        match name {
            "append" => self.append.take(),
            "send" => self.send.take(),
            _ => None,
        }
    }
}

pub fn create(init: Parameters) -> Result<ComponentHandle> {
    let output_channel = Channel::new(init.get_str("/outputChannel").unwrap_or("out"))?;
    let accumulated = Accumulated::default();

    let append = ComponentHandle::sink(AppendSink(accumulated.clone()))?;
    let send_pusher = PusherCell::default();
    let send = ComponentHandle::sink_and_source(
        SendSink {
            accumulated,
            output_channel,
            pusher: send_pusher.clone(),
        },
        BoundSource(send_pusher),
    )?;

    ComponentHandle::group(BufferAccumulatorGroup {
        append: Some(append),
        send: Some(send),
    })
}
