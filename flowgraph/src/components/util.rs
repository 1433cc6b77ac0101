// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared plumbing for the sink+source support components in this module:
//! a single pusher cell two handler halves close over.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::capability::SourceHandler;
use crate::dispatch::pusher::SourcePusher;

#[derive(Clone, Default)]
pub(crate) struct PusherCell(pub(crate) Arc<Mutex<Option<SourcePusher>>>);

impl PusherCell {
    pub(crate) fn get(&self) -> Option<SourcePusher> {
        self.0.lock().clone()
    }
}

pub(crate) struct BoundSource(pub(crate) PusherCell);

impl SourceHandler for BoundSource {
    fn bind_pusher(&mut self, pusher: SourcePusher) {
        *self.0 .0.lock() = Some(pusher);
    }
}
