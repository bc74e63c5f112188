//! Co-Reduce is a two-input operator for event-time stream processing. It keeps one running
//! reduction per input, emits the mapped reduction after every record, and forwards a combined
//! watermark that is the minimum of the watermarks of both inputs.
//!
//! The operator ([CoStreamReduce]) is synchronous and expects its calls to be serialized. The
//! [CoReduceHandle] runs it on a tokio task fed by two independent input channels.

mod error;
pub use crate::error::{Error, Result};

/// Records, watermarks and input identifiers.
pub mod message;
pub use crate::message::{Input, Record, Watermark};

/// Combination of the watermarks of both inputs.
pub mod watermark;

/// The co-reduce operator and the user-defined functions it calls.
pub mod coreduce;
pub use crate::coreduce::{CoReduceFunction, CoStreamReduce, FnCoReduce, TwoInputOperator};

/// Where the operator writes its records and watermarks.
pub mod output;

/// Task that serializes the two inputs into the operator.
pub mod actor;
pub use crate::actor::{CoReduceHandle, InputMessage, InputSender};

pub mod config;

/// Prometheus metrics.
pub mod metrics;
