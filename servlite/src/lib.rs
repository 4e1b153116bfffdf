//! Servlite - embeddable web service with an operator-controlled lifecycle
//!
//! The operator surface (a console, a GUI, a test) drives a
//! [`ServiceLifecycleController`], reads the bound port through the port
//! hand-off, and receives every log record of the service through a
//! [`LogBridge`], including records emitted by the service's own worker
//! threads.

pub mod context;
pub mod logging;
pub mod port;
pub mod runtime;
pub mod service;

pub use context::RunContext;
pub use logging::{LogBridge, LogForwarder, LogRecord, LoggingPipeline, QueueForwarder};
pub use port::{PortHandoff, UNSET_PORT};
pub use runtime::{
    BootEvent, BootHooks, BootPhase, EmbeddedRuntime, PhaseHook, ReadyEvent, ReadyObserver,
    RuntimeFactory, ServiceOptions, WebRuntime, WebRuntimeFactory,
};
pub use service::{
    LifecycleMetrics, ServiceHandle, ServiceLifecycleController, ServiceState, ServiceStatus,
    SinkReattachListener,
};
pub use servlite_shared::errors::{ServliteError, ServliteResult};
