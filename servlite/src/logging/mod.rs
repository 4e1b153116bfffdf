//! Logging pipeline and the bridge that feeds a single log consumer.
//!
//! ## Architecture
//!
//! - `record`: immutable [`LogRecord`] built from each `tracing` event
//! - `pipeline`: process subscriber with a replaceable root sink slot
//! - `bridge`: [`LogBridge`], which owns the consumer's forwarder and
//!   (re)installs it at the root
//!
//! **Known limitation**: between [`LoggingPipeline::reconfigure`] (performed by
//! the embedded runtime while it boots) and the bridge's re-registration, the
//! root slot is empty. Records emitted in that window are dropped and counted
//! by [`LoggingPipeline::dropped`]; they are never corrupted and never crash the
//! emitting thread.

mod bridge;
mod pipeline;
mod record;

pub use bridge::{LogBridge, LogForwarder, QueueForwarder, SinkId, SinkRegistration};
pub use pipeline::{LoggingPipeline, RootSinkLayer, init};
pub use record::{LogRecord, ThreadIdentity};
