// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The dynamically-typed parameter tree carried by every [`crate::packet::Packet`].
//!
//! `Parameters` wraps a `serde_json::Value` in an `Arc` so that value-copying
//! a packet's parameters into downstream packets (as dispatch does on every
//! delivery) is a pointer clone, not a deep copy. Mutation always goes
//! through `merge`, which allocates a new tree.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A path into a parameter tree, e.g. `/a/b`, following JSON Pointer
/// (RFC 6901) syntax -- the same "/a/b" syntax named in the specification.
pub type Path<'a> = &'a str;

#[derive(Clone, Debug, Default)]
pub struct Parameters(Arc<serde_json::Value>);

impl Parameters {
    pub fn null() -> Self {
        Self(Arc::new(serde_json::Value::Null))
    }

    pub fn object() -> Self {
        Self(Arc::new(serde_json::Value::Object(Default::default())))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        match Arc::try_unwrap(self.0) {
            Ok(v) => v,
            Err(arc) => (*arc).clone(),
        }
    }

    /// Look up a JSON-Pointer path (`/a/b`). An empty path returns the root.
    pub fn get_path(&self, path: Path<'_>) -> Option<&serde_json::Value> {
        if path.is_empty() {
            Some(&self.0)
        } else {
            self.0.pointer(path)
        }
    }

    pub fn get_str(&self, path: Path<'_>) -> Option<&str> {
        self.get_path(path).and_then(|v| v.as_str())
    }

    /// Shallow merge: keys present in `other`'s top-level object override
    /// the same keys in `self`; keys unique to either side are kept. If
    /// either side is not a JSON object, `other` wins outright (matching
    /// the "parameters set on the outgoing packet win" rule in the spec).
    pub fn merge(&self, other: &Parameters) -> Parameters {
        match (self.0.as_object(), other.0.as_object()) {
            (Some(base), Some(overlay)) => {
                let mut merged = base.clone();
                for (k, v) in overlay {
                    merged.insert(k.clone(), v.clone());
                }
                Parameters::from_value(serde_json::Value::Object(merged))
            }
            _ => other.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Serialize for Parameters {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Parameters::from_value(value))
    }
}

impl From<serde_json::Value> for Parameters {
    fn from(value: serde_json::Value) -> Self {
        Parameters::from_value(value)
    }
}
