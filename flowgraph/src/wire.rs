// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The packet wire format (spec.md §6 "Packet wire format"): 8-byte
//! big-endian `totalFollowingLength`; 8-byte big-endian
//! `parameterBytesLength`; that many bytes of MessagePack-encoded
//! parameters; then zero or more `(8-byte big-endian bufferLength,
//! bufferLength bytes)` records filling the remainder.
//!
//! Parameters are encoded with `rmp-serde`, matching streamlib's existing
//! use of the crate for frame payloads.

use std::io::{self, Read, Write};

use crate::buffer::Buffer;
use crate::error::{FlowError, Result};
use crate::packet::Packet;
use crate::parameters::Parameters;

/// Writes `packet` to `out` in the wire format.
pub fn write_packet(packet: &Packet, out: &mut impl Write) -> Result<()> {
    let param_bytes = rmp_serde::to_vec(&packet.parameters)?;

    let mut following_length: u64 = 8 + param_bytes.len() as u64;
    for buffer in &packet.buffers {
        following_length += 8 + buffer.len() as u64;
    }

    out.write_all(&following_length.to_be_bytes())?;
    out.write_all(&(param_bytes.len() as u64).to_be_bytes())?;
    out.write_all(&param_bytes)?;
    for buffer in &packet.buffers {
        out.write_all(&(buffer.len() as u64).to_be_bytes())?;
        out.write_all(buffer.as_slice())?;
    }
    Ok(())
}

/// Parses one complete wire-format record out of `body` (the bytes
/// following `totalFollowingLength`, i.e. exactly `following_length` of
/// them): `parameterBytesLength` + parameters + trailing buffer records.
fn parse_body(body: &[u8]) -> Result<Packet> {
    if body.len() < 8 {
        return Err(FlowError::MalformedPacket(
            "record shorter than the parameterBytesLength field".into(),
        ));
    }
    let param_len = u64::from_be_bytes(body[0..8].try_into().unwrap()) as usize;
    let rest = &body[8..];
    if rest.len() < param_len {
        return Err(FlowError::MalformedPacket(
            "declared parameterBytesLength exceeds the record".into(),
        ));
    }
    let (param_bytes, mut rest) = rest.split_at(param_len);
    let value: serde_json::Value =
        rmp_serde::from_slice(param_bytes).map_err(|e| FlowError::MalformedPacket(e.to_string()))?;
    let parameters = Parameters::from_value(value);

    let mut buffers = Vec::new();
    while !rest.is_empty() {
        if rest.len() < 8 {
            return Err(FlowError::MalformedPacket(
                "trailing bytes too short for a bufferLength field".into(),
            ));
        }
        let buf_len = u64::from_be_bytes(rest[0..8].try_into().unwrap()) as usize;
        rest = &rest[8..];
        if rest.len() < buf_len {
            return Err(FlowError::MalformedPacket(
                "declared bufferLength exceeds the record".into(),
            ));
        }
        let (buf_bytes, remainder) = rest.split_at(buf_len);
        buffers.push(Buffer::copy_from_slice(buf_bytes));
        rest = remainder;
    }

    Ok(Packet { parameters, buffers })
}

/// Attempts to parse one record out of the front of `buf`. Returns `Ok(None)`
/// if `buf` doesn't yet hold a complete record -- callers feeding partial
/// reads (e.g. from a socket) should buffer more data and retry. On success,
/// returns the packet and how many bytes of `buf` it consumed.
pub fn try_read_from(buf: &[u8]) -> Result<Option<(Packet, usize)>> {
    if buf.len() < 8 {
        return Ok(None);
    }
    let following_length = u64::from_be_bytes(buf[0..8].try_into().unwrap()) as usize;
    let total = 8 + following_length;
    if buf.len() < total {
        return Ok(None);
    }
    let packet = parse_body(&buf[8..total])?;
    Ok(Some((packet, total)))
}

/// Incremental reader over any [`Read`], matching the original streaming
/// reader's ability to be fed partial socket reads.
pub struct PacketReader<R> {
    inner: R,
    buffered: Vec<u8>,
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffered: Vec::new(),
        }
    }

    /// Reads and returns the next complete packet, blocking on `inner` as
    /// needed. Returns `Ok(None)` on a clean EOF with no partial record
    /// pending.
    pub fn read_next(&mut self) -> Result<Option<Packet>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some((packet, consumed)) = try_read_from(&self.buffered)? {
                self.buffered.drain(..consumed);
                return Ok(Some(packet));
            }
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                if self.buffered.is_empty() {
                    return Ok(None);
                }
                return Err(FlowError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid-record",
                )));
            }
            self.buffered.extend_from_slice(&chunk[..n]);
        }
    }
}
