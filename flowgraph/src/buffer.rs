// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference-counted, immutably shared byte buffers.
//!
//! A [`Buffer`] is cheap to clone and cheap to slice: slicing never copies,
//! it just narrows the view while sharing the same backing allocation. The
//! allocation is freed once the last `Buffer` referencing it is dropped.

use bytes::Bytes;
use std::fmt;
use std::ops::Deref;

#[derive(Clone, PartialEq, Eq, Default)]
pub struct Buffer(Bytes);

impl Buffer {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }

    pub fn from_static(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }

    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns a new `Buffer` sharing this one's storage, narrowed to
    /// `[start, start + len)`. Panics if the range is out of bounds, same
    /// as `bytes::Bytes::slice`.
    pub fn slice(&self, start: usize, len: usize) -> Buffer {
        Buffer(self.0.slice(start..start + len))
    }

    /// Concatenates several buffers into one, copying their contents into a
    /// single fresh allocation. Used by components that coalesce multiple
    /// incoming buffers (e.g. `BufferAccumulator`) into one outgoing buffer.
    pub fn concat(parts: &[Buffer]) -> Buffer {
        let total: usize = parts.iter().map(|b| b.len()).sum();
        let mut out = Vec::with_capacity(total);
        for p in parts {
            out.extend_from_slice(p.as_slice());
        }
        Buffer::from_vec(out)
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Buffer::from_vec(data)
    }
}

impl From<&str> for Buffer {
    fn from(data: &str) -> Self {
        Buffer::copy_from_slice(data.as_bytes())
    }
}

impl From<String> for Buffer {
    fn from(data: String) -> Self {
        Buffer::from_vec(data.into_bytes())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({} bytes)", self.len())
    }
}
