//! Get/Set counters shared by every worker of a test and the samples the
//! runner derives from them.
mod counters;
mod snapshot;


pub use counters::{GetSetMetrics, Operation, OperationCounter};
pub use snapshot::{MetricsSnapshot, OperationRates, TICKS_PER_MS};

/// Wire names of the sampled values, in broadcast order.
pub mod names {
    pub const GET_ITERATIONS: &str = "GetIterations";
    pub const SET_ITERATIONS: &str = "SetIterations";
    pub const GET_TICKS: &str = "GetTicks";
    pub const SET_TICKS: &str = "SetTicks";
    pub const AVERAGE_GET_TIME: &str = "AverageGetTime";
    pub const AVERAGE_SET_TIME: &str = "AverageSetTime";
    pub const GETS_PER_SECOND: &str = "GetsPerSecond";
    pub const SETS_PER_SECOND: &str = "SetsPerSecond";
    pub const AVERAGE_GETS_PER_SECOND: &str = "AverageGetsPerSecond";
    pub const AVERAGE_SETS_PER_SECOND: &str = "AverageSetsPerSecond";
}
