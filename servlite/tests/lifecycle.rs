//! Lifecycle controller against scripted runtimes.

use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use servlite::{
    BootPhase, LogBridge, LogRecord, LoggingPipeline, ServiceLifecycleController, ServiceOptions,
    ServiceState, ServliteError, UNSET_PORT,
};
use servlite_test_utils::{RecordingForwarder, Script, ScriptedFactory};

fn controller(script: Script) -> (ServiceLifecycleController, ScriptedFactory) {
    let factory = ScriptedFactory::new(script);
    let bridge = LogBridge::new(LoggingPipeline::new());
    (
        ServiceLifecycleController::new(factory.clone(), bridge),
        factory,
    )
}

fn wait_for_state(controller: &ServiceLifecycleController, state: ServiceState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.state() != state {
        assert!(Instant::now() < deadline, "timed out waiting for {}", state);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_start_then_stop() {
    let (controller, factory) = controller(Script::default());
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(controller.current_port(), UNSET_PORT);

    let handle = controller.start(ServiceOptions::default()).unwrap();
    assert_eq!(handle.port(), 8080);
    assert_eq!(controller.state(), ServiceState::Running);
    assert_eq!(controller.current_port(), 8080);

    controller.stop(handle).unwrap();
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn test_port_survives_restart_until_ready() {
    let (controller, factory) = controller(Script::default());
    let handle = controller.start(ServiceOptions::default()).unwrap();
    assert_eq!(controller.current_port(), 8080);
    controller.stop(handle).unwrap();
    assert_eq!(controller.current_port(), 8080);

    factory.set_script(Script {
        port: 9090,
        boot_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let (tx, rx) = mpsc::channel();
    let join = controller
        .spawn_start(ServiceOptions::default(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    wait_for_state(&controller, ServiceState::Starting);
    assert_eq!(controller.current_port(), 8080);

    let handle = rx.recv().unwrap().unwrap();
    join.join().unwrap();
    assert_eq!(handle.port(), 9090);
    assert_eq!(controller.current_port(), 9090);
    controller.stop(handle).unwrap();
}

#[test]
fn test_second_start_is_rejected() {
    let (controller, factory) = controller(Script::default());
    let handle = controller.start(ServiceOptions::default()).unwrap();

    let err = controller.start(ServiceOptions::default()).unwrap_err();
    assert!(matches!(err, ServliteError::AlreadyRunning(_)));
    assert!(err.is_rejection());

    assert_eq!(controller.state(), ServiceState::Running);
    assert_eq!(controller.current_port(), 8080);
    assert_eq!(factory.created(), 1);
    assert_eq!(controller.metrics().rejections_total(), 1);
    controller.stop(handle).unwrap();
}

#[test]
fn test_concurrent_starts_have_one_winner() {
    let (controller, factory) = controller(Script {
        boot_delay: Duration::from_millis(50),
        ..Default::default()
    });
    let barrier = Arc::new(Barrier::new(8));

    let results: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                controller.start(ServiceOptions::default())
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ServliteError::AlreadyRunning(_)))
    );
    assert_eq!(factory.created(), 1);
    controller.stop(*winners[0]).unwrap();
}

#[test]
fn test_stop_when_stopped_is_rejected() {
    let (controller, _factory) = controller(Script::default());
    let handle = controller.start(ServiceOptions::default()).unwrap();
    controller.stop(handle).unwrap();

    let err = controller.stop(handle).unwrap_err();
    assert!(matches!(err, ServliteError::NotRunning(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
}

#[test]
fn test_stop_while_starting_is_rejected() {
    let (controller, factory) = controller(Script::default());
    let old = controller.start(ServiceOptions::default()).unwrap();
    controller.stop(old).unwrap();

    factory.set_script(Script {
        boot_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let (tx, rx) = mpsc::channel();
    controller
        .spawn_start(ServiceOptions::default(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    wait_for_state(&controller, ServiceState::Starting);
    let err = controller.stop(old).unwrap_err();
    assert!(matches!(err, ServliteError::NotRunning(_)));

    let handle = rx.recv().unwrap().unwrap();
    assert_eq!(controller.state(), ServiceState::Running);
    controller.stop(handle).unwrap();
}

#[test]
fn test_stale_handle_leaves_current_run() {
    let (controller, factory) = controller(Script::default());
    let old = controller.start(ServiceOptions::default()).unwrap();
    controller.stop(old).unwrap();
    let current = controller.start(ServiceOptions::default()).unwrap();

    let err = controller.stop(old).unwrap_err();
    assert!(matches!(err, ServliteError::InvalidArgument(_)));
    assert_eq!(controller.state(), ServiceState::Running);
    assert_eq!(factory.shutdowns(), 1);

    controller.stop(current).unwrap();
    assert_eq!(factory.shutdowns(), 2);
}

#[test]
fn test_boot_failure_at_each_phase_rolls_back() {
    for phase in [
        BootPhase::Starting,
        BootPhase::EnvironmentPrepared,
        BootPhase::ContextInitialized,
    ] {
        let (controller, factory) = controller(Script {
            fail_at: Some(phase),
            ..Default::default()
        });

        let err = controller.start(ServiceOptions::default()).unwrap_err();
        assert!(matches!(err, ServliteError::BootFailure(_)), "{}", phase);
        assert_eq!(controller.state(), ServiceState::Stopped);
        assert_eq!(controller.current_port(), UNSET_PORT);
        assert_eq!(controller.metrics().boot_failures_total(), 1);

        factory.set_script(Script::default());
        let handle = controller.start(ServiceOptions::default()).unwrap();
        controller.stop(handle).unwrap();
    }
}

#[test]
fn test_boot_without_readiness_is_failure() {
    let (controller, factory) = controller(Script {
        skip_ready: true,
        ..Default::default()
    });

    let err = controller.start(ServiceOptions::default()).unwrap_err();
    assert!(matches!(err, ServliteError::BootFailure(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn test_failure_after_readiness_rolls_back() {
    let (controller, factory) = controller(Script {
        fail_after_ready: true,
        ..Default::default()
    });

    let err = controller.start(ServiceOptions::default()).unwrap_err();
    assert!(matches!(err, ServliteError::BootFailure(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert!(controller.handle().is_none());
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn test_late_failure_rollback_keeps_next_run_running() {
    let (controller, factory) = controller(Script::default());
    let stale = controller.start(ServiceOptions::default()).unwrap();
    controller.stop(stale).unwrap();

    factory.set_script(Script {
        fail_after_ready: true,
        ready_delay: Duration::from_millis(200),
        shutdown_delay: Duration::from_millis(400),
        ..Default::default()
    });
    let (tx, rx) = mpsc::channel();
    let failing = controller
        .spawn_start(ServiceOptions::default(), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    wait_for_state(&controller, ServiceState::Running);

    // Blocks until the failed run has been rolled back
    let err = controller.stop(stale).unwrap_err();
    assert!(matches!(err, ServliteError::NotRunning(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(factory.shutdowns(), 2);

    factory.set_script(Script {
        boot_delay: Duration::from_millis(100),
        ..Default::default()
    });
    let current = controller.start(ServiceOptions::default()).unwrap();
    assert!(matches!(
        rx.recv().unwrap(),
        Err(ServliteError::BootFailure(_))
    ));
    failing.join().unwrap();

    assert_eq!(controller.state(), ServiceState::Running);
    assert_eq!(controller.handle(), Some(current));
    assert!(matches!(
        controller.start(ServiceOptions::default()),
        Err(ServliteError::AlreadyRunning(_))
    ));
    assert_eq!(factory.created(), 3);

    controller.stop(current).unwrap();
    assert_eq!(controller.state(), ServiceState::Stopped);
}

#[test]
fn test_readiness_with_port_zero_is_boot_failure() {
    let (controller, factory) = controller(Script {
        port: 0,
        ..Default::default()
    });

    let err = controller.start(ServiceOptions::default()).unwrap_err();
    assert!(matches!(err, ServliteError::BootFailure(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(controller.current_port(), UNSET_PORT);
    assert_eq!(controller.metrics().boot_failures_total(), 1);
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn test_duplicate_readiness_is_ignored() {
    let (controller, _factory) = controller(Script {
        duplicate_ready: Some(9999),
        ..Default::default()
    });

    let handle = controller.start(ServiceOptions::default()).unwrap();
    assert_eq!(handle.port(), 8080);
    assert_eq!(controller.current_port(), 8080);
    controller.stop(handle).unwrap();
}

#[test]
fn test_invalid_options_never_reach_runtime() {
    let (controller, factory) = controller(Script::default());
    let options = ServiceOptions {
        worker_threads: 0,
        ..Default::default()
    };
    let err = controller.start(options).unwrap_err();
    assert!(matches!(err, ServliteError::Config(_)));
    assert_eq!(controller.state(), ServiceState::Stopped);
    assert_eq!(factory.created(), 0);
    assert_eq!(controller.metrics().starts_total(), 0);
}

#[test]
fn test_failed_boot_reattaches_log_sink() {
    let pipeline = LoggingPipeline::new();
    let bridge = LogBridge::new(pipeline.clone());
    let recorder = RecordingForwarder::new();
    bridge.register_sink(recorder.clone());

    let factory = ScriptedFactory::new(Script {
        fail_at: Some(BootPhase::ContextInitialized),
        ..Default::default()
    });
    let controller = ServiceLifecycleController::new(factory, bridge.clone());
    controller.start(ServiceOptions::default()).unwrap_err();

    assert!(bridge.active().is_some());
    bridge.emit(LogRecord::new(tracing::Level::INFO, "servlite::test", "after failure"));
    assert_eq!(recorder.messages(), vec!["after failure"]);
}

#[test]
fn test_spawn_stop_reports_outcome() {
    let (controller, _factory) = controller(Script::default());
    let handle = controller.start(ServiceOptions::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    let join = controller
        .spawn_stop(handle, move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    assert_eq!(join.thread().name(), Some("servlite-stop"));

    rx.recv().unwrap().unwrap();
    join.join().unwrap();
    assert_eq!(controller.state(), ServiceState::Stopped);
}

#[test]
fn test_status_and_metrics() {
    let (controller, _factory) = controller(Script::default());
    let idle = controller.status();
    assert_eq!(idle.state, ServiceState::Stopped);
    assert!(idle.run_id.is_none());

    let handle = controller.start(ServiceOptions::default()).unwrap();
    let status = controller.status();
    assert_eq!(status.state, ServiceState::Running);
    assert_eq!(status.port, 8080);
    assert_eq!(status.run_id, Some(handle.run_id()));
    assert_eq!(status.app_name.as_deref(), Some("servlite"));
    assert!(status.started_at.is_some());

    assert!(controller.shutdown().unwrap());
    assert!(!controller.shutdown().unwrap());

    let metrics = controller.metrics();
    assert_eq!(metrics.starts_total(), 1);
    assert_eq!(metrics.stops_total(), 1);
    assert_eq!(metrics.boot_failures_total(), 0);
}

// ============================================================================
// PROPERTY: start/stop exclusivity
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Stop,
    StopStale,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Start), Just(Op::Stop), Just(Op::StopStale)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_start_stop_follow_state_machine(ops in prop::collection::vec(op(), 1..24)) {
        let (controller, _factory) = controller(Script::default());
        let mut current = None;
        let mut stale = None;

        for op in ops {
            match op {
                Op::Start => {
                    let result = controller.start(ServiceOptions::default());
                    if current.is_none() {
                        current = Some(result.unwrap());
                    } else {
                        prop_assert!(matches!(result, Err(ServliteError::AlreadyRunning(_))));
                    }
                }
                Op::Stop => match current.take() {
                    Some(handle) => {
                        controller.stop(handle).unwrap();
                        stale = Some(handle);
                    }
                    None => {
                        if let Some(handle) = stale {
                            let result = controller.stop(handle);
                            prop_assert!(matches!(result, Err(ServliteError::NotRunning(_))));
                        }
                    }
                },
                Op::StopStale => {
                    if let Some(handle) = stale {
                        let result = controller.stop(handle);
                        if current.is_some() {
                            prop_assert!(matches!(result, Err(ServliteError::InvalidArgument(_))));
                        } else {
                            prop_assert!(matches!(result, Err(ServliteError::NotRunning(_))));
                        }
                    }
                }
            }

            let expected = if current.is_some() { ServiceState::Running } else { ServiceState::Stopped };
            prop_assert_eq!(controller.state(), expected);
        }
    }
}
