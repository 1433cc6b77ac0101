// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The context router (spec.md §4.5): a meta-component that lazily
//! instantiates per-key inner instances behind a single graph node,
//! so the same graph fragment can serve many concurrent logical sessions.
//!
//! Grounded in `examples/original_source/src/nodes/ContextualNode.cpp`'s
//! `ContextRouter` / `ContextRemover` pair: the router is always exposed as
//! a *group* with exactly two named interfaces, `"router"` (the routing
//! surface matching the template's own capabilities) and `"remove"` (a
//! pathable that deletes an inner instance by key and echoes `Removed Key`
//! back through the pusher it was invoked with).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::capability::{
    Capabilities, ComponentHandle, GroupHandler, PathableHandler, SinkHandler, SourceHandler,
};
use crate::dispatch::pusher::SourcePusher;
use crate::error::{FlowError, Result};
use crate::factory::FactoryRegistry;
use crate::packet::{error_packet, Channel, Packet, PathablePacket, ERROR_CHANNEL};
use crate::parameters::Parameters;

pub const ROUTER_INTERFACE: &str = "router";
pub const REMOVER_INTERFACE: &str = "remove";
pub const REMOVED_KEY_CHANNEL: &str = "Removed Key";

type InnerCtor = Arc<dyn Fn() -> Result<ComponentHandle> + Send + Sync>;
type RemoveFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Builds the context-router implementation for an `{type: "ContextRouter",
/// initParameters: {templateType, key, ...}}` instance: probes
/// `template_type` to learn its capabilities, then assembles the
/// router/remove group around it.
pub fn build_context_router(
    factories: FactoryRegistry,
    template_type: &str,
    key_path: &str,
    base_init: Parameters,
) -> Result<ComponentHandle> {
    let probe = factories.create(template_type, base_init.clone())?;
    let caps = probe.capabilities;
    if caps.is_empty() {
        return Err(FlowError::IncompatibleCapability(
            "context router template declares no capabilities".into(),
        ));
    }

    let (router_interface, remove_fn): (ComponentHandle, RemoveFn) = if caps.contains(Capabilities::GROUP) {
        build_group_router(factories, template_type, key_path, base_init, probe)?
    } else {
        drop(probe);
        let ctor: InnerCtor = {
            let factories = factories.clone();
            let template_type = template_type.to_string();
            let base_init = base_init.clone();
            Arc::new(move || factories.create(&template_type, base_init.clone()))
        };
        build_single_router(ctor, key_path.to_string(), caps)?
    };

    let remover = ComponentHandle::pathable(RemoverHandler {
        key_path: key_path.to_string(),
        remove_fn,
    })?;

    ComponentHandle::group(ContextRouterGroup {
        router: Some(router_interface),
        remove: Some(remover),
    })
}

/// The GROUP-template case (spec.md §4.5 "Group template"): a single key
/// drives creation and removal of one sub-instance per named sub-interface
/// of the template, coordinated rather than independently keyed -- grounded
/// in `ContextualNode.cpp`'s `CohesiveGroupRouter`.
fn build_group_router(
    factories: FactoryRegistry,
    template_type: &str,
    key_path: &str,
    base_init: Parameters,
    mut probe: ComponentHandle,
) -> Result<(ComponentHandle, RemoveFn)> {
    let mut group = probe
        .group
        .take()
        .expect("caller checked Capabilities::GROUP");
    let names = group.interface_names();

    let mut subs: HashMap<String, Option<ComponentHandle>> = HashMap::new();
    let mut remove_fns: Vec<RemoveFn> = Vec::new();
    for name in names {
        let sub_probe = group.get_interface(&name).ok_or_else(|| {
            FlowError::IncompatibleCapability(format!(
                "'{template_type}' advertised sub-interface '{name}' but would not yield one"
            ))
        })?;
        let sub_caps = sub_probe.capabilities;
        drop(sub_probe);

        let ctor: InnerCtor = {
            let factories = factories.clone();
            let template_type = template_type.to_string();
            let base_init = base_init.clone();
            let name = name.clone();
            Arc::new(move || {
                let mut template = factories.create(&template_type, base_init.clone())?;
                let group = template.group.as_mut().ok_or_else(|| {
                    FlowError::IncompatibleCapability(format!(
                        "'{template_type}' is no longer group-capable"
                    ))
                })?;
                group.get_interface(&name).ok_or_else(|| {
                    FlowError::IncompatibleCapability(format!(
                        "'{template_type}' has no sub-interface '{name}'"
                    ))
                })
            })
        };
        let (sub_handle, sub_remove_fn) = build_single_router(ctor, key_path.to_string(), sub_caps)?;
        remove_fns.push(sub_remove_fn);
        subs.insert(name, Some(sub_handle));
    }

    let remove_fn: RemoveFn = Arc::new(move |key: &str| {
        let mut any = false;
        for f in &remove_fns {
            if f(key) {
                any = true;
            }
        }
        any
    });

    let handle = ComponentHandle::group(GroupedRouterInterfaces { subs })?;
    Ok((handle, remove_fn))
}

/// Shared state behind one keyed routing surface: the map from routing key
/// to lazily-created inner instance, plus the source pusher (if any) newly
/// created instances should be bound to.
struct RouterState {
    ctor: InnerCtor,
    key_path: String,
    inner: HashMap<String, ComponentHandle>,
    outer_source_pusher: Option<SourcePusher>,
}

impl RouterState {
    fn key_of(&self, packet: &Packet) -> Option<String> {
        packet.parameters.get_str(&self.key_path).map(str::to_string)
    }

    fn get_or_create(&mut self, key: &str) -> Result<&mut ComponentHandle> {
        if !self.inner.contains_key(key) {
            let mut handle = (self.ctor)()?;
            if let (Some(pusher), Some(source)) = (&self.outer_source_pusher, &mut handle.source) {
                source.bind_pusher(pusher.clone());
            }
            debug!(key, "context router created inner instance");
            self.inner.insert(key.to_string(), handle);
        }
        Ok(self.inner.get_mut(key).expect("just inserted"))
    }

    fn remove(&mut self, key: &str) -> bool {
        let removed = self.inner.remove(key).is_some();
        if removed {
            debug!(key, "context router removed inner instance");
        }
        removed
    }
}

fn build_single_router(
    ctor: InnerCtor,
    key_path: String,
    caps: Capabilities,
) -> Result<(ComponentHandle, RemoveFn)> {
    let state = Arc::new(Mutex::new(RouterState {
        ctor,
        key_path,
        inner: HashMap::new(),
        outer_source_pusher: None,
    }));

    let mut handle = ComponentHandle {
        capabilities: caps & (Capabilities::SINK | Capabilities::SOURCE | Capabilities::PATHABLE),
        sink: None,
        source: None,
        pathable: None,
        group: None,
    };
    if caps.contains(Capabilities::SINK) {
        handle.sink = Some(Box::new(RouterSink(state.clone())));
    }
    if caps.contains(Capabilities::SOURCE) {
        handle.source = Some(Box::new(RouterSource(state.clone())));
    }
    if caps.contains(Capabilities::PATHABLE) {
        handle.pathable = Some(Box::new(RouterPathable(state.clone())));
    }

    let remove_fn: RemoveFn = Arc::new(move |key: &str| state.lock().remove(key));
    Ok((handle, remove_fn))
}

struct RouterSink(Arc<Mutex<RouterState>>);

impl SinkHandler for RouterSink {
    fn handle_packet(&mut self, packet: Packet) {
        let mut state = self.0.lock();
        let Some(key) = state.key_of(&packet) else {
            let err = FlowError::MissingRoutingKey(state.key_path.clone());
            if let Some(pusher) = state.outer_source_pusher.clone() {
                pusher.push(
                    error_packet("MissingRoutingKey", &err.to_string(), None),
                    Channel::new(ERROR_CHANNEL).expect("non-empty"),
                );
            } else {
                warn!(key_path = %state.key_path, "context router: packet missing routing key, no pusher bound to report it");
            }
            return;
        };
        match state.get_or_create(&key) {
            Ok(handle) => {
                if let Some(sink) = &mut handle.sink {
                    sink.handle_packet(packet);
                } else {
                    warn!(key, "context router: inner instance is not sink-capable");
                }
            }
            Err(err) => warn!(key, error = %err, "context router: failed to create inner instance"),
        }
    }
}

struct RouterSource(Arc<Mutex<RouterState>>);

impl SourceHandler for RouterSource {
    fn bind_pusher(&mut self, pusher: SourcePusher) {
        let mut state = self.0.lock();
        state.outer_source_pusher = Some(pusher.clone());
        for handle in state.inner.values_mut() {
            if let Some(source) = &mut handle.source {
                source.bind_pusher(pusher.clone());
            }
        }
    }
}

struct RouterPathable(Arc<Mutex<RouterState>>);

impl PathableHandler for RouterPathable {
    fn handle_packet(&mut self, packet: PathablePacket) {
        let key = {
            let state = self.0.lock();
            state.key_of(&packet.packet)
        };
        let Some(key) = key else {
            let key_path = self.0.lock().key_path.clone();
            let err = FlowError::MissingRoutingKey(key_path);
            packet.pusher.push(
                error_packet("MissingRoutingKey", &err.to_string(), None),
                Channel::new(ERROR_CHANNEL).expect("non-empty"),
            );
            return;
        };

        let mut state = self.0.lock();
        match state.get_or_create(&key) {
            Ok(handle) => {
                if let Some(pathable) = &mut handle.pathable {
                    pathable.handle_packet(PathablePacket {
                        packet: packet.packet,
                        pusher: packet.pusher,
                    });
                } else {
                    warn!(key, "context router: inner instance is not pathable");
                }
            }
            Err(err) => {
                drop(state);
                packet.pusher.push(
                    error_packet("MissingFactory", &err.to_string(), None),
                    Channel::new(ERROR_CHANNEL).expect("non-empty"),
                );
            }
        }
    }
}

/// The `"remove"` interface: consumes a packet carrying the configured
/// key, removes the matching inner instance(s), and echoes `Removed Key`.
/// Removing an absent key is a silent no-op (spec.md §4.5).
struct RemoverHandler {
    key_path: String,
    remove_fn: RemoveFn,
}

impl PathableHandler for RemoverHandler {
    fn handle_packet(&mut self, packet: PathablePacket) {
        let Some(key) = packet.packet.parameters.get_str(&self.key_path) else {
            let err = FlowError::MissingRoutingKey(self.key_path.clone());
            packet.pusher.push(
                error_packet("MissingRoutingKey", &err.to_string(), None),
                Channel::new(ERROR_CHANNEL).expect("non-empty"),
            );
            return;
        };
        let key = key.to_string();
        if !(self.remove_fn)(&key) {
            return;
        }

        let field = self.key_path.trim_start_matches('/').to_string();
        let mut obj = serde_json::Map::new();
        obj.insert(field, serde_json::Value::String(key));
        let removed = Packet::with_parameters(Parameters::from_value(serde_json::Value::Object(obj)));
        packet
            .pusher
            .push(removed, Channel::new(REMOVED_KEY_CHANNEL).expect("non-empty"));
    }
}

struct ContextRouterGroup {
    router: Option<ComponentHandle>,
    remove: Option<ComponentHandle>,
}

impl GroupHandler for ContextRouterGroup {
    fn interface_names(&self) -> Vec<String> {
        vec![ROUTER_INTERFACE.to_string(), REMOVER_INTERFACE.to_string()]
    }

    fn get_interface(&mut self, name: &str) -> Option<ComponentHandle> {
        match name {
            ROUTER_INTERFACE => self.router.take(),
            REMOVER_INTERFACE => self.remove.take(),
            _ => None,
        }
    }
}

/// Exposes a group template's own named sub-interfaces, each backed by its
/// own independent per-key router (spec.md §4.5 "Group template").
struct GroupedRouterInterfaces {
    subs: HashMap<String, Option<ComponentHandle>>,
}

impl GroupHandler for GroupedRouterInterfaces {
    fn interface_names(&self) -> Vec<String> {
        self.subs.keys().cloned().collect()
    }

    fn get_interface(&mut self, name: &str) -> Option<ComponentHandle> {
        self.subs.get_mut(name).and_then(Option::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::pusher::{PathablePusher, PusherCore, SourcePusher};
    use crate::dispatch::queue::DispatchTarget;
    use crate::graph::Graph;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);
    impl SinkHandler for CountingSink {
        fn handle_packet(&mut self, _packet: Packet) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_pathable_pusher() -> (PathablePusher, crossbeam_channel::Receiver<crate::dispatch::queue::PushedPacketInfo>) {
        let graph = Arc::new(parking_lot::RwLock::new(Graph::new("test")));
        let (sender, receiver) = crossbeam_channel::unbounded();
        let notify = Arc::new(tokio::sync::Notify::new());
        let pusher = PathablePusher(PusherCore {
            graph,
            sender,
            notify,
            node_name: "remover".to_string(),
        });
        (pusher, receiver)
    }

    #[test]
    fn creates_one_inner_instance_per_key_and_routes_counts() {
        let counts: Arc<Mutex<Vec<Arc<AtomicUsize>>>> = Arc::new(Mutex::new(Vec::new()));
        let mut factories = FactoryRegistry::new();
        {
            let counts = counts.clone();
            factories.register("Counter", move |_params| {
                let counter = Arc::new(AtomicUsize::new(0));
                counts.lock().push(counter.clone());
                ComponentHandle::sink(CountingSink(counter))
            });
        }

        let mut handle =
            build_context_router(factories, "Counter", "/sessionId", Parameters::null()).unwrap();
        let group = handle.group.as_mut().unwrap();
        let mut router_iface = group.get_interface(ROUTER_INTERFACE).unwrap();
        let sink = router_iface.sink.as_mut().unwrap();

        let pkt = |session: &str| {
            Packet::with_parameters(Parameters::from_value(serde_json::json!({"sessionId": session})))
        };
        sink.handle_packet(pkt("x"));
        sink.handle_packet(pkt("y"));
        sink.handle_packet(pkt("x"));

        assert_eq!(counts.lock().len(), 2, "one inner instance per distinct key");
        let total: usize = counts.lock().iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn remover_echoes_key_once_and_then_is_a_no_op() {
        let mut factories = FactoryRegistry::new();
        factories.register("Counter", |_params| {
            ComponentHandle::sink(CountingSink(Arc::new(AtomicUsize::new(0))))
        });

        let mut handle =
            build_context_router(factories, "Counter", "/sessionId", Parameters::null()).unwrap();
        let group = handle.group.as_mut().unwrap();
        let mut router_iface = group.get_interface(ROUTER_INTERFACE).unwrap();
        router_iface.sink.as_mut().unwrap().handle_packet(Packet::with_parameters(
            Parameters::from_value(serde_json::json!({"sessionId": "x"})),
        ));
        let mut remove_iface = group.get_interface(REMOVER_INTERFACE).unwrap();

        let (pusher, receiver) = test_pathable_pusher();
        let remove_pkt = || PathablePacket {
            packet: Packet::with_parameters(Parameters::from_value(
                serde_json::json!({"sessionId": "x"}),
            )),
            pusher: pusher.clone(),
        };

        remove_iface.pathable.as_mut().unwrap().handle_packet(remove_pkt());
        let removed = receiver.try_recv().unwrap();
        match removed.target {
            DispatchTarget::ByChannel { channel, .. } => {
                assert_eq!(channel, Channel::new(REMOVED_KEY_CHANNEL).unwrap());
            }
            DispatchTarget::Direct { .. } => panic!("expected a ByChannel dispatch target"),
        }
        assert_eq!(removed.packet.parameters.get_str("/sessionId"), Some("x"));

        remove_iface.pathable.as_mut().unwrap().handle_packet(remove_pkt());
        assert!(receiver.try_recv().is_err(), "removing an absent key is a no-op");
    }

    #[test]
    fn remover_missing_routing_key_yields_an_error_packet() {
        let mut factories = FactoryRegistry::new();
        factories.register("Counter", |_params| {
            ComponentHandle::sink(CountingSink(Arc::new(AtomicUsize::new(0))))
        });
        let mut handle =
            build_context_router(factories, "Counter", "/sessionId", Parameters::null()).unwrap();
        let group = handle.group.as_mut().unwrap();
        let mut remove_iface = group.get_interface(REMOVER_INTERFACE).unwrap();

        let (pusher, receiver) = test_pathable_pusher();
        remove_iface.pathable.as_mut().unwrap().handle_packet(PathablePacket {
            packet: Packet::empty(),
            pusher,
        });
        let err_packet = receiver.try_recv().unwrap();
        match err_packet.target {
            DispatchTarget::ByChannel { channel, .. } => {
                assert_eq!(channel, Channel::new(ERROR_CHANNEL).unwrap());
            }
            DispatchTarget::Direct { .. } => panic!("expected a ByChannel dispatch target"),
        }
        assert_eq!(err_packet.packet.parameters.get_str("/errorName"), Some("MissingRoutingKey"));
    }

    #[test]
    fn router_sink_missing_routing_key_yields_an_error_packet() {
        use crate::components::util::{BoundSource, PusherCell};

        let mut factories = FactoryRegistry::new();
        factories.register("Counter", |_params| {
            let pusher = PusherCell::default();
            ComponentHandle::sink_and_source(
                CountingSink(Arc::new(AtomicUsize::new(0))),
                BoundSource(pusher),
            )
        });
        let mut handle =
            build_context_router(factories, "Counter", "/sessionId", Parameters::null()).unwrap();
        let group = handle.group.as_mut().unwrap();
        let mut router_iface = group.get_interface(ROUTER_INTERFACE).unwrap();

        let graph = Arc::new(parking_lot::RwLock::new(Graph::new("test")));
        graph.write().create_node("n", true, true).unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let notify = Arc::new(tokio::sync::Notify::new());
        router_iface.source.as_mut().unwrap().bind_pusher(SourcePusher(PusherCore {
            graph,
            sender,
            notify,
            node_name: "n".to_string(),
        }));

        router_iface.sink.as_mut().unwrap().handle_packet(Packet::empty());
        let err_packet = receiver.try_recv().unwrap();
        match err_packet.target {
            DispatchTarget::ByChannel { channel, .. } => {
                assert_eq!(channel, Channel::new(ERROR_CHANNEL).unwrap());
            }
            DispatchTarget::Direct { .. } => panic!("expected a ByChannel dispatch target"),
        }
        assert_eq!(err_packet.packet.parameters.get_str("/errorName"), Some("MissingRoutingKey"));
    }
}
