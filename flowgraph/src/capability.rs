// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The component capability model (spec.md §3 "Component capability set",
//! §4.3, design note on "Multi-role polymorphism").
//!
//! Rather than exposing an object implementations query at runtime
//! ("as-sink / as-source / as-pathable"), a component declares its
//! capabilities once, at construction time, by handing back a
//! [`ComponentHandle`] assembled from whichever handler objects it
//! implements. The engine dispatches purely by inspecting which optional
//! handler slots are populated.

use bitflags::bitflags;

use crate::dispatch::pusher::SourcePusher;
use crate::error::{FlowError, Result};
use crate::packet::{Packet, PathablePacket};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Capabilities: u8 {
        const SINK     = 0b0001;
        const SOURCE   = 0b0010;
        const PATHABLE = 0b0100;
        const GROUP    = 0b1000;
    }
}

impl Capabilities {
    /// Enforces spec.md §3: pathable is mutually exclusive with sink/source,
    /// and at least one of {sink, source, pathable} must be present.
    pub fn validate(self) -> Result<()> {
        if self.contains(Capabilities::PATHABLE)
            && (self.contains(Capabilities::SINK) || self.contains(Capabilities::SOURCE))
        {
            return Err(FlowError::IncompatibleCapability(
                "pathable is mutually exclusive with sink and source".into(),
            ));
        }
        if !self.intersects(Capabilities::SINK | Capabilities::SOURCE | Capabilities::PATHABLE) {
            return Err(FlowError::IncompatibleCapability(
                "a component must declare at least one of {sink, source, pathable}".into(),
            ));
        }
        Ok(())
    }

    pub fn can_be_edge_source(self) -> bool {
        self.intersects(Capabilities::SOURCE | Capabilities::PATHABLE)
    }

    pub fn can_be_edge_destination(self) -> bool {
        self.intersects(Capabilities::SINK | Capabilities::PATHABLE)
    }
}

/// Consumes packets. Runs exclusively on the loop thread.
pub trait SinkHandler: Send {
    fn handle_packet(&mut self, packet: Packet);
}

/// Emits packets via a pusher bound once, at most, for the lifetime of the
/// implementation (spec.md §4.2 "at most one active pusher").
pub trait SourceHandler: Send {
    fn bind_pusher(&mut self, pusher: SourcePusher);
}

/// Consumes a packet and may emit replies through the pusher embedded in
/// the same [`PathablePacket`] it was given.
pub trait PathableHandler: Send {
    fn handle_packet(&mut self, packet: PathablePacket);
}

/// Exposes named sub-components (spec.md §3 GLOSSARY "Group"). Each
/// sub-interface is itself a fully-formed [`ComponentHandle`].
pub trait GroupHandler: Send {
    fn interface_names(&self) -> Vec<String>;
    fn get_interface(&mut self, name: &str) -> Option<ComponentHandle>;
}

/// The capability-tagged bundle a factory hands back for a freshly
/// constructed implementation. Exactly the handler slots matching
/// `capabilities` should be `Some`.
pub struct ComponentHandle {
    pub capabilities: Capabilities,
    pub sink: Option<Box<dyn SinkHandler>>,
    pub source: Option<Box<dyn SourceHandler>>,
    pub pathable: Option<Box<dyn PathableHandler>>,
    pub group: Option<Box<dyn GroupHandler>>,
}

impl ComponentHandle {
    pub fn sink(handler: impl SinkHandler + 'static) -> Result<Self> {
        let handle = Self {
            capabilities: Capabilities::SINK,
            sink: Some(Box::new(handler)),
            source: None,
            pathable: None,
            group: None,
        };
        handle.capabilities.validate()?;
        Ok(handle)
    }

    pub fn source(handler: impl SourceHandler + 'static) -> Result<Self> {
        let handle = Self {
            capabilities: Capabilities::SOURCE,
            sink: None,
            source: Some(Box::new(handler)),
            pathable: None,
            group: None,
        };
        handle.capabilities.validate()?;
        Ok(handle)
    }

    pub fn sink_and_source(
        sink: impl SinkHandler + 'static,
        source: impl SourceHandler + 'static,
    ) -> Result<Self> {
        let handle = Self {
            capabilities: Capabilities::SINK | Capabilities::SOURCE,
            sink: Some(Box::new(sink)),
            source: Some(Box::new(source)),
            pathable: None,
            group: None,
        };
        handle.capabilities.validate()?;
        Ok(handle)
    }

    pub fn pathable(handler: impl PathableHandler + 'static) -> Result<Self> {
        let handle = Self {
            capabilities: Capabilities::PATHABLE,
            sink: None,
            source: None,
            pathable: Some(Box::new(handler)),
            group: None,
        };
        handle.capabilities.validate()?;
        Ok(handle)
    }

    pub fn group(handler: impl GroupHandler + 'static) -> Result<Self> {
        let handle = Self {
            capabilities: Capabilities::GROUP,
            sink: None,
            source: None,
            pathable: None,
            group: Some(Box::new(handler)),
        };
        handle.capabilities.validate()?;
        Ok(handle)
    }

    pub fn is_sink(&self) -> bool {
        self.capabilities.contains(Capabilities::SINK)
    }

    pub fn is_source(&self) -> bool {
        self.capabilities.contains(Capabilities::SOURCE)
    }

    pub fn is_pathable(&self) -> bool {
        self.capabilities.contains(Capabilities::PATHABLE)
    }

    pub fn is_group(&self) -> bool {
        self.capabilities.contains(Capabilities::GROUP)
    }
}
