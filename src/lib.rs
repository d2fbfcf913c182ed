//! Core library for the `squawk` load generator.
//!
//! Every agent runs tests on a bounded, priority-aware [`pool::WorkerPool`]
//! and is driven over a best-effort multicast control group: controllers
//! squawk Start, Update and Finish frames, agents answer with heartbeats and
//! periodic metrics. The `squawk` binary wires these pieces to a CLI; the
//! library APIs are what the integration tests drive.
pub mod args;
pub mod config;
pub mod controller;
pub mod entry;
pub mod error;
pub mod feeder;
pub mod logger;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod protocol;
pub mod request;
pub mod router;
pub mod settings;
pub mod shutdown;
pub mod stop;
pub mod transport;

pub(crate) mod sync;
