// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference support components (SPEC_FULL.md §10). These are example
//! building blocks for graphs, not part of the runtime core; each is a
//! thin factory function registered here under a stable type name.

pub mod buffer_accumulator;
pub mod contextual_store;
pub mod http_coders;
pub mod ordered_pair_emitter;
pub mod parameter_add;
pub mod parameter_extract;
pub mod parameter_router;
pub mod pass_through;
pub mod send_once;
pub mod util;

use crate::factory::FactoryRegistry;

/// Registers every reference component under its conventional type name.
pub fn register_builtins(registry: &mut FactoryRegistry) {
    registry.register("ParameterAdd", parameter_add::create);
    registry.register("ParameterExtract", parameter_extract::create);
    registry.register("ParameterRouter", parameter_router::create);
    registry.register("PassThrough", pass_through::create);
    registry.register("BufferAccumulator", buffer_accumulator::create);
    registry.register("OrderedPairEmitter", ordered_pair_emitter::create);
    registry.register("SendOnce", send_once::create);
    registry.register("HttpRequestCoder", http_coders::request_coder_create);
    registry.register("HttpResponseCoder", http_coders::response_coder_create);
    registry.register("ContextualStore", contextual_store::create);
}
