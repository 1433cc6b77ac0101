// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph construction from a textual description, and the separate
//! implementation-binding step (spec.md §4.6).

pub mod implement;
pub mod text;

pub use implement::{apply_implementation, parse_implement_json};
pub use text::{parse, EdgeDecl, GraphDescription, NodeDecl};

use crate::dispatch::Runtime;
use crate::error::Result;
use crate::packet::Channel;

/// Runs spec.md §4.6's build algorithm against `source`: creates a graph
/// node per declared node/cluster, records each instance's `initParameters`,
/// and connects every edge. Returns the `(nodeName, instanceName)` pairs
/// that still need [`Runtime::bind_node_to_instance`] once the subsequent
/// implement step has given every instance a concrete implementation.
pub fn build_graph(source: &str, runtime: &mut Runtime) -> Result<Vec<(String, String)>> {
    let description = text::parse(source)?;
    build_from_description(&description, runtime)
}

pub fn build_from_description(
    description: &GraphDescription,
    runtime: &mut Runtime,
) -> Result<Vec<(String, String)>> {
    let mut pending_bindings = Vec::new();

    for node in &description.nodes {
        runtime.create_node(&node.name, node.allow_incoming, node.allow_outgoing)?;
        if let Some(instance_name) = &node.instance {
            if let Some(params) = &node.init_parameters {
                runtime.set_instance_init_parameters(instance_name, params.clone());
            }
            pending_bindings.push((node.name.clone(), instance_name.clone()));
        }
    }

    for edge in &description.edges {
        let channel = Channel::new(edge.channel.clone())?;
        runtime.connect(&edge.from, channel.as_str(), &edge.to)?;
    }

    Ok(pending_bindings)
}
