// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The dispatch engine: MPSC queue, loop-thread drain, per-edge delivery,
//! and parameter accumulation (spec.md §4.3).

pub mod engine;
pub mod pusher;
pub mod queue;

pub use engine::Runtime;
pub use pusher::{PathablePusher, SourcePusher};
pub use queue::{DispatchTarget, PushedPacketInfo};
