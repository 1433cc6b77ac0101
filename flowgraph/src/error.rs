// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Error types for flowgraph.
//!
//! Defines the taxonomy used throughout the crate. Component authors that
//! need to surface a runtime-time failure should not propagate `FlowError`
//! out of `handle_packet` -- there is nowhere for it to go. Instead, build
//! an error packet (see [`crate::packet::error_packet`]) and push it on the
//! `error` channel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("node '{0}' already exists")]
    AlreadyExists(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("incompatible capability: {0}")]
    IncompatibleCapability(String),

    #[error("a source pusher is already bound to instance '{0}'")]
    DuplicatePusher(String),

    #[error("packet missing routing key '{0}'")]
    MissingRoutingKey(String),

    #[error("no factory registered for type '{0}'")]
    MissingFactory(String),

    #[error("malformed graph description: {0}")]
    MalformedGraph(String),

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("channel name must not be empty")]
    EmptyChannel,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
