use std::net::SocketAddrV4;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::feeder::RunReporter;
use crate::protocol::{AgentStatus, HEARTBEAT_COMPARTMENT, MetricsReport};
use crate::sync::lock;
use crate::transport::ControlPlane;

/// Where an agent's outbound payloads go.
pub trait FrameSink: Send + Sync + 'static {
    /// Replaces the repeating heartbeat and sends it once right away.
    fn heartbeat(&self, payload: &str);
    /// Sends a payload once.
    fn broadcast(&self, payload: &str);
}

/// Sends through a [`ControlPlane`] channel.
pub struct ControlPlaneSink {
    plane: Arc<ControlPlane>,
    group: SocketAddrV4,
}

impl ControlPlaneSink {
    #[must_use]
    pub const fn new(plane: Arc<ControlPlane>, group: SocketAddrV4) -> Self {
        Self { plane, group }
    }
}

impl FrameSink for ControlPlaneSink {
    fn heartbeat(&self, payload: &str) {
        if let Err(err) = self
            .plane
            .set_multicast_packet(self.group, HEARTBEAT_COMPARTMENT, payload)
        {
            warn!("Heartbeat send failed: {}", err);
        }
    }

    fn broadcast(&self, payload: &str) {
        if let Err(err) = self.plane.squawk_multicast_packet(self.group, payload) {
            warn!("Broadcast failed: {}", err);
        }
    }
}

/// Keeps payloads in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    heartbeats: Mutex<Vec<String>>,
    broadcasts: Mutex<Vec<String>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn heartbeats(&self) -> Vec<String> {
        lock(&self.heartbeats).clone()
    }

    #[must_use]
    pub fn broadcasts(&self) -> Vec<String> {
        lock(&self.broadcasts).clone()
    }
}

impl FrameSink for RecordingSink {
    fn heartbeat(&self, payload: &str) {
        lock(&self.heartbeats).push(payload.to_owned());
    }

    fn broadcast(&self, payload: &str) {
        lock(&self.broadcasts).push(payload.to_owned());
    }
}

/// Turns run progress into heartbeat and metrics frames.
pub(crate) struct AgentReporter {
    sink: Arc<dyn FrameSink>,
}

impl AgentReporter {
    pub(crate) const fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }
}

impl RunReporter for AgentReporter {
    fn status(&self, status: AgentStatus) {
        debug!("Announcing {}", status);
        self.sink.heartbeat(&status.to_payload());
    }

    fn metrics(&self, report: &MetricsReport) {
        self.sink.broadcast(&report.to_payload());
    }
}
