// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Instances: the named, configured realization of a component
//! implementation used by one or more graph nodes (spec.md §4.2).

use tracing::debug;

use crate::capability::ComponentHandle;
use crate::dispatch::pusher::SourcePusher;
use crate::error::{FlowError, Result};
use crate::factory::FactoryRegistry;
use crate::parameters::Parameters;

#[derive(Default)]
pub struct Instance {
    type_name: Option<String>,
    implementation: Option<ComponentHandle>,
    init_parameters: Parameters,
    thread_group_name: String,
    source_pusher: Option<SourcePusher>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// If `type_name` is unchanged, a no-op. Otherwise clears the current
    /// implementation and, if `type_name` is non-empty, reconstructs it via
    /// `factory` using the currently stored `init_parameters`. Rebinds the
    /// stored source pusher onto the new implementation if it is
    /// source-capable.
    pub fn set_type(&mut self, type_name: &str, factory: &FactoryRegistry) -> Result<()> {
        if self.type_name.as_deref() == Some(type_name) {
            return Ok(());
        }

        self.implementation = None;
        if type_name.is_empty() {
            self.type_name = None;
            return Ok(());
        }

        let mut handle = factory.create(type_name, self.init_parameters.clone())?;
        self.rebind_pusher(&mut handle);
        self.type_name = Some(type_name.to_string());
        self.implementation = Some(handle);
        debug!(type_name, "instance bound to implementation");
        Ok(())
    }

    /// Directly binds an already-constructed implementation, e.g. one
    /// produced by [`crate::router::build_context_router`] or a group's
    /// sub-interface lookup.
    pub fn set_implementation(&mut self, mut implementation: ComponentHandle) {
        self.rebind_pusher(&mut implementation);
        self.implementation = Some(implementation);
    }

    pub fn set_init_parameters(&mut self, params: Parameters) {
        self.init_parameters = params;
    }

    pub fn init_parameters(&self) -> &Parameters {
        &self.init_parameters
    }

    pub fn set_thread_group_name(&mut self, name: impl Into<String>) {
        self.thread_group_name = name.into();
    }

    pub fn thread_group_name(&self) -> &str {
        &self.thread_group_name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn implementation(&self) -> Option<&ComponentHandle> {
        self.implementation.as_ref()
    }

    pub fn implementation_mut(&mut self) -> Option<&mut ComponentHandle> {
        self.implementation.as_mut()
    }

    /// Binds at most one source pusher; a second bind is a programming
    /// error (spec.md §4.2 invariant).
    pub fn set_source_pusher(&mut self, pusher: SourcePusher) -> Result<()> {
        if self.source_pusher.is_some() {
            return Err(FlowError::DuplicatePusher(
                self.type_name.clone().unwrap_or_default(),
            ));
        }
        if let Some(implementation) = &mut self.implementation {
            if let Some(source) = &mut implementation.source {
                source.bind_pusher(pusher.clone());
            }
        }
        self.source_pusher = Some(pusher);
        Ok(())
    }

    fn rebind_pusher(&self, handle: &mut ComponentHandle) {
        if let (Some(pusher), Some(source)) = (&self.source_pusher, &mut handle.source) {
            source.bind_pusher(pusher.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SinkHandler;
    use crate::packet::Packet;

    struct Noop;
    impl SinkHandler for Noop {
        fn handle_packet(&mut self, _packet: Packet) {}
    }

    #[test]
    fn set_type_is_noop_when_unchanged() {
        let mut registry = FactoryRegistry::new();
        registry.register("Noop", |_| ComponentHandle::sink(Noop));
        let mut instance = Instance::new();
        instance.set_type("Noop", &registry).unwrap();
        assert!(instance.implementation().is_some());
        // Setting the same type again must not error or reconstruct.
        instance.set_type("Noop", &registry).unwrap();
        assert!(instance.implementation().is_some());
    }

    #[test]
    fn set_type_empty_clears_implementation() {
        let mut registry = FactoryRegistry::new();
        registry.register("Noop", |_| ComponentHandle::sink(Noop));
        let mut instance = Instance::new();
        instance.set_type("Noop", &registry).unwrap();
        instance.set_type("", &registry).unwrap();
        assert!(instance.implementation().is_none());
        assert!(instance.type_name().is_none());
    }
}
