// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Named constructors for component implementations (spec.md §2 "Factories
//! registry"). An explicit registry value, owned by the runtime and
//! threaded through builder code -- never hidden behind process-global
//! static state (spec.md §9 design note).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::capability::ComponentHandle;
use crate::error::{FlowError, Result};
use crate::parameters::Parameters;

pub type Constructor = dyn Fn(Parameters) -> Result<ComponentHandle> + Send + Sync;

#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<Constructor>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        constructor: impl Fn(Parameters) -> Result<ComponentHandle> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "registered factory");
        self.factories.insert(type_name, Arc::new(constructor));
    }

    pub fn create(&self, type_name: &str, init_parameters: Parameters) -> Result<ComponentHandle> {
        let ctor = self
            .factories
            .get(type_name)
            .ok_or_else(|| FlowError::MissingFactory(type_name.to_string()))?;
        ctor(init_parameters)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }
}
