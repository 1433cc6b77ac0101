// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The "implement" step (spec.md §4.6 / §6 "Implementation binding JSON"):
//! binds concrete component implementations onto the instances a
//! [`super::text`]-parsed graph only named.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::dispatch::Runtime;
use crate::error::{FlowError, Result};
use crate::parameters::Parameters;

#[derive(Deserialize, Default)]
struct ImplementEntry {
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(rename = "initParameters")]
    init_parameters: Option<serde_json::Value>,
    #[serde(rename = "implementationFromGroup")]
    implementation_from_group: Option<FromGroupRef>,
    #[serde(rename = "instanceToInterfaceMap")]
    instance_to_interface_map: Option<HashMap<String, InterfaceRef>>,
}

#[derive(Deserialize)]
struct FromGroupRef {
    #[serde(rename = "groupInstance")]
    group_instance: String,
    #[serde(rename = "groupInterface")]
    group_interface: String,
}

#[derive(Deserialize)]
struct InterfaceRef {
    interface: String,
}

/// Applies the implementation-binding JSON object, binds every pending
/// `(node, instance)` pair recorded by [`super::build_graph`], and runs
/// [`Runtime::validate_connections`] once everything is wired.
pub fn apply_implementation(
    spec: serde_json::Value,
    runtime: &mut Runtime,
    pending_bindings: &[(String, String)],
) -> Result<()> {
    let entries: HashMap<String, ImplementEntry> = serde_json::from_value(spec)?;

    // Pass 1: construct every instance that names a concrete factory type.
    for (instance_name, entry) in &entries {
        if let Some(type_name) = &entry.type_name {
            if let Some(params) = &entry.init_parameters {
                runtime.set_instance_init_parameters(instance_name, Parameters::from_value(params.clone()));
            }
            debug!(instance = %instance_name, %type_name, "implement: constructing instance");
            runtime.set_instance_type(instance_name, type_name)?;
        }
    }

    // Pass 2: resolve every `target instance -> group sub-interface` link,
    // from either direction the JSON allows it to be declared.
    let mut extractions: Vec<(String, String, String)> = Vec::new();
    for (instance_name, entry) in &entries {
        if let Some(from_group) = &entry.implementation_from_group {
            extractions.push((
                instance_name.clone(),
                from_group.group_instance.clone(),
                from_group.group_interface.clone(),
            ));
        }
        if let Some(map) = &entry.instance_to_interface_map {
            for (sub_instance, iface) in map {
                extractions.push((sub_instance.clone(), instance_name.clone(), iface.interface.clone()));
            }
        }
    }
    for (target_instance, group_instance, group_interface) in extractions {
        debug!(
            target = %target_instance,
            group = %group_instance,
            interface = %group_interface,
            "implement: binding group sub-interface"
        );
        let handle = runtime.take_group_interface(&group_instance, &group_interface)?;
        runtime.set_instance_implementation(&target_instance, handle);
    }

    // Finally, associate every graph node with its instance now that every
    // instance's implementation (and therefore its source-capability) is
    // known, so `bind_node_to_instance` can mint source pushers correctly.
    for (node_name, instance_name) in pending_bindings {
        runtime.bind_node_to_instance(node_name, instance_name)?;
    }

    runtime.validate_connections()
}

/// A convenience error for callers that pass a JSON value which isn't an
/// object keyed by instance name.
pub fn parse_implement_json(text: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(FlowError::MalformedGraph(
            "implementation binding must be a JSON object keyed by instance name".into(),
        ));
    }
    Ok(value)
}
