// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dot exporter (spec.md §4.7): serializes a [`crate::graph::Graph`]'s
//! current topology back to the same textual format it can be built from.
//! One `->` line per forward edge, labelled with the channel. Order is
//! unspecified by the spec but must be stable for identical input, so
//! output is sorted by `(from, channel, to)` rather than left in whatever
//! order the graph's internal maps happen to iterate.

use std::fmt::Write as _;

use crate::graph::Graph;

/// Renders `graph` as `strict digraph "<name>" { ... }`.
pub fn export(graph: &Graph) -> String {
    let mut lines: Vec<(String, String, String)> = Vec::new();
    graph.visit_nodes(|node| {
        for edges in node.forward_edges.values() {
            for edge in edges {
                lines.push((node.name.clone(), edge.channel.as_str().to_string(), edge.next.clone()));
            }
        }
    });
    lines.sort();

    let mut out = String::new();
    writeln!(out, "strict digraph \"{}\" {{", escape(&graph.name)).unwrap();
    for (from, channel, to) in lines {
        writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            escape(&from),
            escape(&to),
            escape(&channel)
        )
        .unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
