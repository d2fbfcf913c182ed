use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::TransportError;
use crate::feeder::RunnerOptions;
use crate::protocol::{AgentStatus, FINISH_TAG, HEARTBEAT_COMPARTMENT, START_TAG, UPDATE_TAG};
use crate::request::RequestRegistry;
use crate::router::CommandRouter;
use crate::settings::TestSettings;
use crate::transport::{ControlPlane, DEFAULT_SQUAWK_INTERVAL};

use super::{ControlPlaneSink, Orchestrator};

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub group: SocketAddrV4,
    /// Heartbeat repeat interval.
    pub squawk_interval: Duration,
    pub settings: TestSettings,
    pub runner: RunnerOptions,
}

impl AgentOptions {
    #[must_use]
    pub fn new(group: SocketAddrV4) -> Self {
        Self {
            group,
            squawk_interval: DEFAULT_SQUAWK_INTERVAL,
            settings: TestSettings::default(),
            runner: RunnerOptions::default(),
        }
    }
}

/// An agent joined to a control group.
pub struct Agent {
    plane: Arc<ControlPlane>,
    router: Arc<CommandRouter>,
    orchestrator: Arc<Orchestrator>,
    group: SocketAddrV4,
}

impl Agent {
    /// Registers the command handlers on `router`, starts listening on the
    /// group and starts an idle heartbeat.
    ///
    /// # Errors
    ///
    /// Returns an error when the group is not multicast or a transport
    /// thread cannot be started.
    pub fn start(
        plane: Arc<ControlPlane>,
        router: Arc<CommandRouter>,
        registry: Arc<RequestRegistry>,
        options: AgentOptions,
    ) -> Result<Self, TransportError> {
        let AgentOptions {
            group,
            squawk_interval,
            settings,
            runner,
        } = options;
        let sink = Arc::new(ControlPlaneSink::new(Arc::clone(&plane), group));
        let orchestrator = Arc::new(Orchestrator::new(
            plane.local_ip(),
            registry,
            settings,
            runner,
            sink,
        ));
        orchestrator.register_with(&router);
        plane.start_listener(group, router.frame_handler())?;
        plane.set_squawk_interval(group, squawk_interval)?;
        plane.start_squawker(group, HEARTBEAT_COMPARTMENT, &AgentStatus::Idle.to_payload())?;
        info!(
            "Agent {} listening on {} (heartbeat every {:?})",
            plane.local_ip(),
            group,
            squawk_interval
        );
        Ok(Self {
            plane,
            router,
            orchestrator,
            group,
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    #[must_use]
    pub const fn group(&self) -> SocketAddrV4 {
        self.group
    }

    /// Stops dispatch, every running test and the group's channel.
    pub fn shutdown(self) {
        self.router.set_enabled(false);
        self.orchestrator.stop_all();
        for tag in [START_TAG, FINISH_TAG, UPDATE_TAG] {
            let _removed = self.router.unregister(tag);
        }
        self.router.set_enabled(true);
        if let Err(err) = self.plane.stop(self.group) {
            warn!("Stopping {} failed: {}", self.group, err);
        }
        info!("Agent stopped");
    }
}
