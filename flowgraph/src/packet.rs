// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Packets, channels, and the pathable reply view.

use std::fmt;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::dispatch::pusher::PathablePusher;
use crate::error::{FlowError, Result};
use crate::parameters::Parameters;

/// Non-empty UTF-8 channel name: the key selecting which forward edges fire
/// for a given push. Cheap to clone (`Arc<str>` backed) since the same
/// channel name is copied into every `PushedPacketInfo`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Channel(Arc<str>);

impl Channel {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FlowError::EmptyChannel);
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({:?})", self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Channel {
    type Error = FlowError;

    fn try_from(value: &str) -> Result<Self> {
        Channel::new(value)
    }
}

impl TryFrom<String> for Channel {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self> {
        Channel::new(value)
    }
}

/// The transport unit flowing along edges: a parameter tree plus an ordered
/// list of opaque byte buffers. Immutable after it is handed to a pusher.
#[derive(Clone, Debug, Default)]
pub struct Packet {
    pub parameters: Parameters,
    pub buffers: Vec<Buffer>,
}

impl Packet {
    pub fn new(parameters: Parameters, buffers: Vec<Buffer>) -> Self {
        Self { parameters, buffers }
    }

    pub fn empty() -> Self {
        Self {
            parameters: Parameters::null(),
            buffers: Vec::new(),
        }
    }

    pub fn with_parameters(parameters: Parameters) -> Self {
        Self {
            parameters,
            buffers: Vec::new(),
        }
    }
}

/// Well-known channel name for error packets (spec.md §6 "Error packet
/// convention").
pub const ERROR_CHANNEL: &str = "error";

/// Builds an error packet: parameters `{errorName, errorMessage, ...extra}`
/// on the conventional `error` channel.
pub fn error_packet(error_name: &str, error_message: &str, extra: Option<serde_json::Value>) -> Packet {
    let mut obj = serde_json::Map::new();
    obj.insert("errorName".into(), serde_json::Value::String(error_name.into()));
    obj.insert(
        "errorMessage".into(),
        serde_json::Value::String(error_message.into()),
    );
    if let Some(serde_json::Value::Object(extra_obj)) = extra {
        for (k, v) in extra_obj {
            obj.entry(k).or_insert(v);
        }
    }
    Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj)))
}

/// The view presented to a *pathable* component: the inbound packet plus a
/// pusher bound to the same node, so replies flow along the node's own
/// outgoing edges using its own `lastReceivedParameters` for accumulation.
#[derive(Clone)]
pub struct PathablePacket {
    pub packet: Packet,
    pub pusher: PathablePusher,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_rejects_empty_name() {
        assert!(matches!(Channel::new(""), Err(FlowError::EmptyChannel)));
        assert!(Channel::new("out").is_ok());
    }

    #[test]
    fn error_packet_has_conventional_shape() {
        let p = error_packet("Boom", "it broke", None);
        assert_eq!(p.parameters.get_str("/errorName"), Some("Boom"));
        assert_eq!(p.parameters.get_str("/errorMessage"), Some("it broke"));
    }
}
