//! Best-effort multicast control plane.
//!
//! Every address gets one [`ControlPlane`] channel holding an optional
//! listener, an optional squawker that re-broadcasts named compartments on
//! an interval, and a shared sender for one-shot frames. Both loops restart
//! after a backoff on any socket error until the channel is stopped.
mod channel;
mod frame;
mod local_addr;
mod retry;
mod socket;


use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::TransportError;
use crate::sync::lock;

use channel::ControlChannel;

pub use frame::{DELIMITER, Frame, MAX_FRAME_BYTES, decode_frame, encode_frame};
pub use local_addr::{local_ipv4, probe_route};
pub use socket::SocketOptions;

/// Callback for every well-formed inbound frame; runs on the listener thread.
pub type FrameHandler = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Default control group endpoint.
pub const DEFAULT_GROUP: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 77, 77), 47077);
pub const DEFAULT_SQUAWK_INTERVAL: Duration = Duration::from_millis(10_000);
const RETRY_BACKOFF: Duration = Duration::from_secs(5);
const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Sender tag for outbound frames; resolved from the routing table when
    /// unset.
    pub local_ip: Option<Ipv4Addr>,
    pub socket: SocketOptions,
    pub squawk_interval: Duration,
    pub retry_backoff: Duration,
    pub join_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            local_ip: None,
            socket: SocketOptions::default(),
            squawk_interval: DEFAULT_SQUAWK_INTERVAL,
            retry_backoff: RETRY_BACKOFF,
            join_timeout: JOIN_TIMEOUT,
        }
    }
}

pub struct ControlPlane {
    options: TransportOptions,
    local_ip: Ipv4Addr,
    channels: Mutex<HashMap<SocketAddrV4, ControlChannel>>,
}

impl ControlPlane {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        let local_ip = options.local_ip.unwrap_or_else(local_ipv4);
        Self {
            options,
            local_ip,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Address stamped on every outbound frame.
    #[must_use]
    pub const fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    fn with_channel<R>(
        &self,
        group: SocketAddrV4,
        action: impl FnOnce(&mut ControlChannel) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        if !group.ip().is_multicast() {
            return Err(TransportError::NotMulticast { addr: group });
        }
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(group)
            .or_insert_with(|| ControlChannel::new(group, self.local_ip, &self.options));
        action(channel)
    }

    fn existing<R>(
        &self,
        group: SocketAddrV4,
        action: impl FnOnce(&ControlChannel) -> R,
    ) -> Result<R, TransportError> {
        let channels = lock(&self.channels);
        channels
            .get(&group)
            .map(action)
            .ok_or(TransportError::UnknownChannel { addr: group })
    }

    /// Starts receiving on `group`. Does nothing if already listening.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not multicast or the thread cannot be
    /// spawned. Socket failures are retried in the background.
    pub fn start_listener(
        &self,
        group: SocketAddrV4,
        handler: FrameHandler,
    ) -> Result<(), TransportError> {
        self.with_channel(group, |channel| channel.start_listener(handler))
    }

    /// Stores `payload` under `compartment` and starts the periodic sender.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not multicast or the thread cannot be
    /// spawned.
    pub fn start_squawker(
        &self,
        group: SocketAddrV4,
        compartment: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        self.with_channel(group, |channel| {
            channel.compartments.set(compartment, payload);
            channel.start_squawker()
        })
    }

    /// Replaces the payload of `compartment` and sends it once right away.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not multicast or the immediate send
    /// fails. The stored payload is kept either way.
    pub fn set_multicast_packet(
        &self,
        group: SocketAddrV4,
        compartment: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        let outbound = self.with_channel(group, |channel| {
            channel.compartments.set(compartment, payload);
            Ok(Arc::clone(&channel.outbound))
        })?;
        outbound.send(payload)
    }

    /// Sends `payload` once without storing it.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not multicast, the frame is oversized,
    /// or the send fails.
    pub fn squawk_multicast_packet(
        &self,
        group: SocketAddrV4,
        payload: &str,
    ) -> Result<(), TransportError> {
        let outbound = self.with_channel(group, |channel| Ok(Arc::clone(&channel.outbound)))?;
        outbound.send(payload)
    }

    /// Current payload of `compartment`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel exists for `group`.
    pub fn multicast_packet(
        &self,
        group: SocketAddrV4,
        compartment: &str,
    ) -> Result<Option<String>, TransportError> {
        self.existing(group, |channel| channel.compartments.get(compartment))
    }

    /// # Errors
    ///
    /// Returns an error if no channel exists for `group`.
    pub fn squawk_interval(&self, group: SocketAddrV4) -> Result<Duration, TransportError> {
        self.existing(group, ControlChannel::squawk_interval)
    }

    /// Takes effect after the squawker's current wait.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel exists for `group`.
    pub fn set_squawk_interval(
        &self,
        group: SocketAddrV4,
        interval: Duration,
    ) -> Result<(), TransportError> {
        self.existing(group, |channel| channel.set_squawk_interval(interval))
    }

    #[must_use]
    pub fn is_listening(&self, group: SocketAddrV4) -> bool {
        self.existing(group, ControlChannel::has_listener)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_squawking(&self, group: SocketAddrV4) -> bool {
        self.existing(group, ControlChannel::has_squawker)
            .unwrap_or(false)
    }

    /// Stops and discards the channel for `group`.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel exists for `group`.
    pub fn stop(&self, group: SocketAddrV4) -> Result<(), TransportError> {
        let channel = lock(&self.channels)
            .remove(&group)
            .ok_or(TransportError::UnknownChannel { addr: group })?;
        channel.shutdown();
        Ok(())
    }

    pub fn stop_all(&self) {
        let channels: Vec<ControlChannel> = lock(&self.channels).drain().map(|(_, channel)| channel).collect();
        for channel in channels {
            channel.shutdown();
        }
    }
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        self.stop_all();
    }
}
