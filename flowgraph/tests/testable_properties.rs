// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Integration tests exercising the concrete scenarios from spec.md §8
//! "Testable properties" end to end, wired entirely through `Runtime`'s
//! public API (no internal pusher plumbing touched directly).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowgraph::capability::{ComponentHandle, SinkHandler};
use flowgraph::packet::Packet;
use flowgraph::parameters::Parameters;
use flowgraph::router::{build_context_router, REMOVED_KEY_CHANNEL, REMOVER_INTERFACE, ROUTER_INTERFACE};
use flowgraph::{wire, Buffer, FlowError, Runtime};

struct CountingSink(Arc<AtomicUsize>);
impl SinkHandler for CountingSink {
    fn handle_packet(&mut self, _packet: Packet) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct CaptureSink(Arc<Mutex<Vec<Packet>>>);
impl SinkHandler for CaptureSink {
    fn handle_packet(&mut self, packet: Packet) {
        self.0.lock().unwrap().push(packet);
    }
}

/// S1: direct send to a bound sink invokes it exactly once, no error
/// packets produced.
#[test]
fn s1_direct_send_invokes_sink_once() {
    let mut runtime = Runtime::new("s1");
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = count.clone();
        runtime
            .factories_mut()
            .register("Counter", move |_| ComponentHandle::sink(CountingSink(count.clone())));
    }
    runtime.create_node("Sink", true, true).unwrap();
    runtime.set_instance_type("SinkInstance", "Counter").unwrap();
    runtime.bind_node_to_instance("Sink", "SinkInstance").unwrap();

    runtime.send_packet(Packet::empty(), "Sink").unwrap();
    let processed = runtime.drain_available();

    assert_eq!(processed, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// S2: a one-shot source pushes its packet as soon as the pusher is bound
/// by `bind_node_to_instance`, and it reaches a connected sink.
#[test]
fn s2_source_to_sink_delivers_exactly_once() {
    let mut runtime = Runtime::new("s2");
    runtime
        .factories_mut()
        .register("SendOnce", flowgraph::components::send_once::create);
    let count = Arc::new(AtomicUsize::new(0));
    {
        let count = count.clone();
        runtime
            .factories_mut()
            .register("Counter", move |_| ComponentHandle::sink(CountingSink(count.clone())));
    }

    runtime.create_node("Source", false, true).unwrap();
    runtime.create_node("Sink", true, false).unwrap();
    runtime.connect("Source", "out", "Sink").unwrap();

    runtime.set_instance_type("SourceInstance", "SendOnce").unwrap();
    runtime.set_instance_type("SinkInstance", "Counter").unwrap();
    runtime.bind_node_to_instance("Sink", "SinkInstance").unwrap();
    // Binding the source mints and immediately uses its pusher.
    runtime.bind_node_to_instance("Source", "SourceInstance").unwrap();

    let processed = runtime.drain_available();
    assert_eq!(processed, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// S3: parameters accumulate across a chain of pass-through hops.
#[test]
fn s3_parameters_accumulate_across_hops() {
    let mut runtime = Runtime::new("s3");
    runtime
        .factories_mut()
        .register("PassThrough", flowgraph::components::pass_through::create);
    let seen: Arc<Mutex<Vec<Packet>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        runtime
            .factories_mut()
            .register("Capture", move |_| ComponentHandle::sink(CaptureSink(seen.clone())));
    }

    runtime.create_node("A", false, true).unwrap();
    runtime.create_node("B", true, true).unwrap();
    runtime.create_node("C", true, false).unwrap();
    runtime.connect("A", "out", "B").unwrap();
    runtime.connect("B", "out2", "C").unwrap();

    runtime.set_instance_type("AInstance", "PassThrough").unwrap();
    runtime.set_instance_init_parameters(
        "BInstance",
        Parameters::from_value(serde_json::json!({"outputChannel": "out2"})),
    );
    runtime.set_instance_type("BInstance", "PassThrough").unwrap();
    runtime.set_instance_type("CInstance", "Capture").unwrap();

    runtime.bind_node_to_instance("C", "CInstance").unwrap();
    runtime.bind_node_to_instance("B", "BInstance").unwrap();
    runtime.bind_node_to_instance("A", "AInstance").unwrap();

    runtime
        .send_packet(
            Packet::with_parameters(Parameters::from_value(serde_json::json!({"k1": "v1"}))),
            "A",
        )
        .unwrap();
    runtime.drain_available();

    runtime
        .send_packet(
            Packet::with_parameters(Parameters::from_value(serde_json::json!({"k2": "v2"}))),
            "B",
        )
        .unwrap();
    runtime.drain_available();

    let final_params = seen.lock().unwrap().last().unwrap().parameters.clone();
    assert_eq!(final_params.into_value(), serde_json::json!({"k1": "v1", "k2": "v2"}));
}

/// S4: `ParameterRouter` routes by a configured path's value, and a
/// missing/wrong field raises an error packet that reaches neither sink
/// (the `error` channel has no edge wired).
#[test]
fn s4_parameter_router_dispatches_by_tag() {
    let mut runtime = Runtime::new("s4");
    runtime
        .factories_mut()
        .register("ParameterRouter", flowgraph::components::parameter_router::create);
    let sa_count = Arc::new(AtomicUsize::new(0));
    let sb_count = Arc::new(AtomicUsize::new(0));
    {
        let sa = sa_count.clone();
        runtime
            .factories_mut()
            .register("CounterA", move |_| ComponentHandle::sink(CountingSink(sa.clone())));
        let sb = sb_count.clone();
        runtime
            .factories_mut()
            .register("CounterB", move |_| ComponentHandle::sink(CountingSink(sb.clone())));
    }

    runtime.create_node("Router", true, true).unwrap();
    runtime.create_node("SA", true, false).unwrap();
    runtime.create_node("SB", true, false).unwrap();
    runtime.connect("Router", "tagA", "SA").unwrap();
    runtime.connect("Router", "tagB", "SB").unwrap();

    runtime.set_instance_init_parameters("RouterInstance", Parameters::from_value(serde_json::json!({"path": "/tag"})));
    runtime.set_instance_type("RouterInstance", "ParameterRouter").unwrap();
    runtime.set_instance_type("SAInstance", "CounterA").unwrap();
    runtime.set_instance_type("SBInstance", "CounterB").unwrap();
    runtime.bind_node_to_instance("SA", "SAInstance").unwrap();
    runtime.bind_node_to_instance("SB", "SBInstance").unwrap();
    runtime.bind_node_to_instance("Router", "RouterInstance").unwrap();

    runtime
        .send_packet(Packet::with_parameters(Parameters::from_value(serde_json::json!({"tag": "tagA"}))), "Router")
        .unwrap();
    runtime.drain_available();
    assert_eq!(sa_count.load(Ordering::SeqCst), 1);
    assert_eq!(sb_count.load(Ordering::SeqCst), 0);

    runtime
        .send_packet(Packet::with_parameters(Parameters::from_value(serde_json::json!({"tag": "tagB"}))), "Router")
        .unwrap();
    runtime.drain_available();
    assert_eq!(sb_count.load(Ordering::SeqCst), 1);

    runtime
        .send_packet(
            Packet::with_parameters(Parameters::from_value(serde_json::json!({"tag_wrong": "tagA"}))),
            "Router",
        )
        .unwrap();
    runtime.drain_available();
    assert_eq!(sa_count.load(Ordering::SeqCst), 1);
    assert_eq!(sb_count.load(Ordering::SeqCst), 1);
}

/// S5: context router creates one inner instance per distinct key, routes
/// counts correctly, and the remover echoes `Removed Key` once then no-ops.
/// Wired the way a real graph would: the router's `"router"` and
/// `"remove"` sub-interfaces are extracted via `take_group_interface` and
/// bound to their own nodes, exactly as `builder::implement` does.
#[test]
fn s5_context_router_create_and_remove_round_trip() {
    let mut runtime = Runtime::new("s5");
    let counts: Arc<Mutex<Vec<Arc<AtomicUsize>>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let counts = counts.clone();
        runtime.factories_mut().register("Counter", move |_params| {
            let counter = Arc::new(AtomicUsize::new(0));
            counts.lock().unwrap().push(counter.clone());
            ComponentHandle::sink(CountingSink(counter))
        });
    }

    let router_handle = build_context_router(
        runtime.factories().clone(),
        "Counter",
        "/sessionId",
        Parameters::null(),
    )
    .unwrap();
    runtime.set_instance_implementation("RouterGroupInstance", router_handle);
    let router_iface = runtime.take_group_interface("RouterGroupInstance", ROUTER_INTERFACE).unwrap();
    let remove_iface = runtime.take_group_interface("RouterGroupInstance", REMOVER_INTERFACE).unwrap();
    runtime.set_instance_implementation("RouterInstance", router_iface);
    runtime.set_instance_implementation("RemoverInstance", remove_iface);

    let removed: Arc<Mutex<Vec<Packet>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let removed = removed.clone();
        runtime
            .factories_mut()
            .register("Capture", move |_| ComponentHandle::sink(CaptureSink(removed.clone())));
    }
    runtime.set_instance_type("CaptureInstance", "Capture").unwrap();

    runtime.create_node("Router", true, false).unwrap();
    runtime.create_node("Remover", true, true).unwrap();
    runtime.create_node("Capture", true, false).unwrap();
    runtime.connect("Remover", REMOVED_KEY_CHANNEL, "Capture").unwrap();

    runtime.bind_node_to_instance("Router", "RouterInstance").unwrap();
    runtime.bind_node_to_instance("Remover", "RemoverInstance").unwrap();
    runtime.bind_node_to_instance("Capture", "CaptureInstance").unwrap();

    let pkt = |session: &str| {
        Packet::with_parameters(Parameters::from_value(serde_json::json!({"sessionId": session})))
    };
    runtime.send_packet(pkt("x"), "Router").unwrap();
    runtime.drain_available();
    runtime.send_packet(pkt("y"), "Router").unwrap();
    runtime.drain_available();
    runtime.send_packet(pkt("x"), "Router").unwrap();
    runtime.drain_available();

    let snapshot = counts.lock().unwrap();
    assert_eq!(snapshot.len(), 2, "two distinct sessionId keys seen");
    assert_eq!(snapshot[0].load(Ordering::SeqCst), 2, "x received 2 packets");
    assert_eq!(snapshot[1].load(Ordering::SeqCst), 1, "y received 1 packet");
    drop(snapshot);

    runtime.send_packet(pkt("x"), "Remover").unwrap();
    runtime.drain_available();
    assert_eq!(removed.lock().unwrap().len(), 1);
    assert_eq!(
        removed.lock().unwrap()[0].parameters.get_str("/sessionId"),
        Some("x")
    );

    runtime.send_packet(pkt("x"), "Remover").unwrap();
    runtime.drain_available();
    assert_eq!(removed.lock().unwrap().len(), 1, "second remove for 'x' is a no-op");
}

/// S6: buffers appended across several packets concatenate at the join,
/// flushing as a single packet that clears the accumulator.
#[test]
fn s6_buffer_accumulator_concatenates_and_flushes() {
    let mut runtime = Runtime::new("s6");
    runtime
        .factories_mut()
        .register("BufferAccumulator", flowgraph::components::buffer_accumulator::create);
    let captured: Arc<Mutex<Vec<Packet>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let captured = captured.clone();
        runtime
            .factories_mut()
            .register("Capture", move |_| ComponentHandle::sink(CaptureSink(captured.clone())));
    }

    runtime.set_instance_type("AccInstance", "BufferAccumulator").unwrap();
    let append_iface = runtime.take_group_interface("AccInstance", "append").unwrap();
    let send_iface = runtime.take_group_interface("AccInstance", "send").unwrap();
    runtime.set_instance_implementation("AppendInstance", append_iface);
    runtime.set_instance_implementation("SendInstance", send_iface);
    runtime.set_instance_type("CaptureInstance", "Capture").unwrap();

    runtime.create_node("Append", true, false).unwrap();
    runtime.create_node("Send", true, true).unwrap();
    runtime.create_node("Capture", true, false).unwrap();
    runtime.connect("Send", "out", "Capture").unwrap();

    runtime.bind_node_to_instance("Capture", "CaptureInstance").unwrap();
    runtime.bind_node_to_instance("Send", "SendInstance").unwrap();
    runtime.bind_node_to_instance("Append", "AppendInstance").unwrap();

    runtime
        .send_packet(Packet::new(Parameters::null(), vec![Buffer::from("test")]), "Append")
        .unwrap();
    runtime.drain_available();
    runtime
        .send_packet(Packet::new(Parameters::null(), vec![Buffer::from(", hello")]), "Append")
        .unwrap();
    runtime.drain_available();
    runtime
        .send_packet(
            Packet::new(Parameters::null(), vec![Buffer::from(", packet3"), Buffer::from("second buffer")]),
            "Append",
        )
        .unwrap();
    runtime.drain_available();

    runtime.send_packet(Packet::empty(), "Send").unwrap();
    runtime.drain_available();

    let snapshot = captured.lock().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].buffers.len(), 2);
    assert_eq!(snapshot[0].buffers[0].as_slice(), b"test, hello, packet3");
    assert_eq!(snapshot[0].buffers[1].as_slice(), b"second buffer");
}

/// S7: wire round-trip preserves parameters and buffer contents/order.
#[test]
fn s7_wire_round_trip_preserves_packet() {
    let original = Packet::new(
        Parameters::from_value(serde_json::json!({"a": 1, "b": "two"})),
        vec![Buffer::from("first"), Buffer::from("second")],
    );

    let mut encoded = Vec::new();
    wire::write_packet(&original, &mut encoded).unwrap();

    let (decoded, consumed) = wire::try_read_from(&encoded).unwrap().expect("one packet present");
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded.parameters, original.parameters);
    assert_eq!(decoded.buffers.len(), original.buffers.len());
    for (a, b) in decoded.buffers.iter().zip(original.buffers.iter()) {
        assert_eq!(a.as_slice(), b.as_slice());
    }
}

#[test]
fn duplicate_pusher_bind_is_rejected() {
    let mut runtime = Runtime::new("dup");
    runtime
        .factories_mut()
        .register("SendOnce", flowgraph::components::send_once::create);
    runtime.create_node("Source", false, true).unwrap();
    runtime.create_node("Other", false, true).unwrap();
    runtime.set_instance_type("SourceInstance", "SendOnce").unwrap();
    runtime.bind_node_to_instance("Source", "SourceInstance").unwrap();

    let err = runtime.bind_node_to_instance("Other", "SourceInstance").unwrap_err();
    assert!(matches!(err, FlowError::DuplicatePusher(_)));
}
