//! End-to-end: controller + axum runtime + global logging.

use std::io::{Read, Write};
use std::net::TcpStream;

use servlite::{
    LogBridge, ServiceLifecycleController, ServiceOptions, ServiceState, WebRuntimeFactory,
};
use servlite_test_utils::{RecordingForwarder, logging};

fn http_get(port: u16, path: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn test_request_logs_reach_consumer_after_boot() {
    let ctx = logging();
    let bridge = LogBridge::new(ctx.pipeline.clone());
    let recorder = RecordingForwarder::new();
    let startup = bridge.register_sink(recorder.clone());

    let controller = ServiceLifecycleController::new(WebRuntimeFactory, bridge.clone());
    let handle = controller
        .start(ServiceOptions::default().with_port(0))
        .unwrap();
    let port = controller.current_port();
    assert_ne!(port, 0);
    assert_eq!(handle.port(), port);
    assert_ne!(bridge.active().unwrap().id(), startup);
    assert!(recorder.contains("Embedded web server listening"));

    let index = http_get(port, "/");
    assert!(index.starts_with("HTTP/1.1 200"));
    assert!(index.contains(&format!("running http port = {}", port)));

    let expected = format!("running http port port={}", port);
    let record = recorder
        .records()
        .into_iter()
        .find(|r| r.message() == expected)
        .expect("request handler record delivered");
    assert_eq!(record.thread().name(), Some("servlite-worker"));
    assert!(recorder.contains("hello"));

    controller.stop(handle).unwrap();
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(controller.current_port(), port);
}

#[test]
fn test_port_endpoint_and_restart() {
    let ctx = logging();
    let bridge = LogBridge::new(ctx.pipeline.clone());
    bridge.register_sink(RecordingForwarder::new());
    let controller = ServiceLifecycleController::new(WebRuntimeFactory, bridge);

    let first = controller
        .start(ServiceOptions::default().with_port(0))
        .unwrap();
    let body = http_get(first.port(), "/api/port");
    assert!(body.ends_with(&format!("{{\"port\":{}}}", first.port())));
    controller.stop(first).unwrap();
    assert!(TcpStream::connect(("127.0.0.1", first.port())).is_err());

    let second = controller
        .start(ServiceOptions::default().with_port(0))
        .unwrap();
    assert_eq!(controller.current_port(), second.port());
    assert!(http_get(second.port(), "/").contains("Hello from servlite"));
    controller.stop(second).unwrap();
}

#[test]
fn test_port_in_use_is_boot_failure() {
    let ctx = logging();
    let bridge = LogBridge::new(ctx.pipeline.clone());
    let recorder = RecordingForwarder::new();
    bridge.register_sink(recorder.clone());
    let controller = ServiceLifecycleController::new(WebRuntimeFactory, bridge.clone());

    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = controller
        .start(ServiceOptions::default().with_port(port))
        .unwrap_err();
    assert!(matches!(err, servlite::ServliteError::BootFailure(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(controller.current_port(), 0);
    assert!(bridge.active().is_some());
    assert!(recorder.contains("Service start failed"));
}
