// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `HttpRequestCoder` / `HttpResponseCoder` (orig: `HttpRequestExtractor`,
//! `HttpResponseWriter`, SPEC_FULL.md §10): a pathable/sink+source pair
//! converting between raw buffer packets and structured request/response
//! parameter+buffer packets. Parsing is limited to the request/status line
//! plus a flat header map; the body is carried as the trailing [`Buffer`]
//! unparsed.

use tracing::warn;

use crate::buffer::Buffer;
use crate::capability::{ComponentHandle, PathableHandler, SinkHandler};
use crate::components::util::{BoundSource, PusherCell};
use crate::error::Result;
use crate::packet::{error_packet, Channel, Packet, PathablePacket, ERROR_CHANNEL};
use crate::parameters::Parameters;

fn error_channel() -> Channel {
    Channel::new(ERROR_CHANNEL).expect("non-empty")
}

/// Splits `buf` at the first blank line (`\r\n\r\n` or `\n\n`), returning
/// the head as UTF-8 text and the remainder as a body buffer.
fn split_head_and_body(buf: &Buffer) -> Option<(String, Buffer)> {
    let bytes = buf.as_slice();
    let needle = b"\r\n\r\n";
    if let Some(pos) = bytes.windows(4).position(|w| w == needle) {
        let head = std::str::from_utf8(&bytes[..pos]).ok()?.to_string();
        let body = buf.slice(pos + 4, bytes.len() - pos - 4);
        return Some((head, body));
    }
    let needle = b"\n\n";
    let pos = bytes.windows(2).position(|w| w == needle)?;
    let head = std::str::from_utf8(&bytes[..pos]).ok()?.to_string();
    let body = buf.slice(pos + 2, bytes.len() - pos - 2);
    Some((head, body))
}

fn parse_headers(lines: &[&str]) -> serde_json::Map<String, serde_json::Value> {
    let mut headers = serde_json::Map::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(
                name.trim().to_string(),
                serde_json::Value::String(value.trim().to_string()),
            );
        }
    }
    headers
}

struct HttpRequestDecoder;

impl PathableHandler for HttpRequestDecoder {
    fn handle_packet(&mut self, pathable: PathablePacket) {
        let PathablePacket { packet, pusher } = pathable;
        let Some(raw) = packet.buffers.first() else {
            let err = error_packet("MalformedRequest", "request packet has no buffer", None);
            pusher.push(err, error_channel());
            return;
        };
        let Some((head, body)) = split_head_and_body(raw) else {
            let err = error_packet("MalformedRequest", "no header/body boundary found", None);
            pusher.push(err, error_channel());
            return;
        };
        let mut lines = head.split("\r\n").flat_map(|l| l.split('\n'));
        let Some(request_line) = lines.next() else {
            let err = error_packet("MalformedRequest", "missing request line", None);
            pusher.push(err, error_channel());
            return;
        };
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
            let err = error_packet("MalformedRequest", "malformed request line", None);
            pusher.push(err, error_channel());
            return;
        };
        let header_lines: Vec<&str> = lines.filter(|l| !l.is_empty()).collect();
        let mut obj = parse_headers(&header_lines);
        obj.insert("method".into(), serde_json::Value::String(method.to_string()));
        obj.insert("path".into(), serde_json::Value::String(path.to_string()));

        let out = Packet::new(Parameters::from_value(serde_json::Value::Object(obj)), vec![body]);
        pusher.push(out, Channel::new("out").expect("non-empty"));
    }
}

pub fn request_coder_create(_init: Parameters) -> Result<ComponentHandle> {
    ComponentHandle::pathable(HttpRequestDecoder)
}

struct HttpResponseEncoderSink {
    pusher: PusherCell,
}

impl SinkHandler for HttpResponseEncoderSink {
    fn handle_packet(&mut self, packet: Packet) {
        let Some(pusher) = self.pusher.get() else {
            warn!("HttpResponseCoder: no pusher bound, dropping packet");
            return;
        };
        let status = packet
            .parameters
            .get_path("/status")
            .and_then(|v| v.as_u64())
            .unwrap_or(200);
        let reason = packet.parameters.get_str("/reason").unwrap_or("OK");
        let body = packet.buffers.first().cloned().unwrap_or_default();

        let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
        if let Some(serde_json::Value::Object(headers)) = packet.parameters.get_path("/headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    head.push_str(&format!("{name}: {value}\r\n"));
                }
            }
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));

        let encoded = Buffer::concat(&[Buffer::from(head), body]);
        pusher.push(Packet::new(Parameters::null(), vec![encoded]), Channel::new("out").expect("non-empty"));
    }
}

pub fn response_coder_create(_init: Parameters) -> Result<ComponentHandle> {
    let pusher = PusherCell::default();
    ComponentHandle::sink_and_source(HttpResponseEncoderSink { pusher: pusher.clone() }, BoundSource(pusher))
}
