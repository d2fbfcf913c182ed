use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use tracing::info;

use crate::error::TransportError;
use crate::protocol::{FinishCommand, StartCommand, UpdateCommand};
use crate::settings::{SettingsPatch, TestSettings};
use crate::transport::ControlPlane;

/// Sends one-shot commands to a control group.
pub struct Controller {
    plane: Arc<ControlPlane>,
    group: SocketAddrV4,
}

impl Controller {
    #[must_use]
    pub const fn new(plane: Arc<ControlPlane>, group: SocketAddrV4) -> Self {
        Self { plane, group }
    }

    #[must_use]
    pub const fn group(&self) -> SocketAddrV4 {
        self.group
    }

    /// Starts `class` with every field of `settings` on the addressed
    /// agents, or on all of them when `target` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame cannot be sent.
    pub fn start(
        &self,
        class: &str,
        settings: &TestSettings,
        target: Option<Ipv4Addr>,
    ) -> Result<StartCommand, TransportError> {
        let command = StartCommand::new(class, settings).targeted(target);
        self.send(&command.to_payload())?;
        info!("Sent Start for {} to {}", class, command.target_ip);
        Ok(command)
    }

    /// Fields of `patch` that cannot change mid-run are not sent.
    ///
    /// # Errors
    ///
    /// Returns an error when the frame cannot be sent.
    pub fn update(
        &self,
        class: &str,
        patch: &SettingsPatch,
        target: Option<Ipv4Addr>,
    ) -> Result<UpdateCommand, TransportError> {
        let command = UpdateCommand::new(class, patch).targeted(target);
        self.send(&command.to_payload())?;
        info!("Sent Update for {} to {}", class, command.target_ip);
        Ok(command)
    }

    /// # Errors
    ///
    /// Returns an error when the frame cannot be sent.
    pub fn finish(
        &self,
        class: &str,
        target: Option<Ipv4Addr>,
    ) -> Result<FinishCommand, TransportError> {
        let command = FinishCommand::new(class).targeted(target);
        self.send(&command.to_payload())?;
        info!("Sent Finish for {} to {}", class, command.target_ip);
        Ok(command)
    }

    fn send(&self, payload: &str) -> Result<(), TransportError> {
        self.plane.squawk_multicast_packet(self.group, payload)
    }
}
