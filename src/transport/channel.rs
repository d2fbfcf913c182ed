use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::TransportError;
use crate::stop::{StopHandle, StopSignal, stop_channel};
use crate::sync::{join_with_timeout, lock};

use super::frame::{Frame, decode_frame, encode_frame};
use super::retry::run_with_retry;
use super::socket::{open_receiver, open_sender};
use super::{FrameHandler, TransportOptions};

const RECV_BUFFER: usize = 64 * 1024;

/// Sending half of a channel, shared by the squawker thread and callers.
pub(crate) struct Outbound {
    group: SocketAddrV4,
    local_ip: Ipv4Addr,
    options: TransportOptions,
    socket: Mutex<Option<UdpSocket>>,
}

impl Outbound {
    /// Sends one frame. A failed socket is discarded and reopened on the
    /// next send.
    pub(crate) fn send(&self, payload: &str) -> Result<(), TransportError> {
        let frame = match encode_frame(self.local_ip, payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("Not sending to {}: {}", self.group, err);
                return Err(err);
            }
        };
        let mut socket = lock(&self.socket);
        if socket.is_none() {
            *socket = Some(open_sender(self.group, &self.options.socket)?);
        }
        let result = socket
            .as_ref()
            .map_or(Ok(0), |open| open.send_to(frame.as_bytes(), self.group));
        match result {
            Ok(_) => Ok(()),
            Err(source) => {
                *socket = None;
                Err(TransportError::Send {
                    addr: self.group,
                    source,
                })
            }
        }
    }
}

/// Repeating payloads keyed by compartment name, case-insensitively.
#[derive(Default)]
pub(crate) struct Compartments {
    payloads: Mutex<HashMap<String, String>>,
}

impl Compartments {
    pub(crate) fn set(&self, compartment: &str, payload: &str) {
        lock(&self.payloads).insert(compartment.to_lowercase(), payload.to_owned());
    }

    pub(crate) fn get(&self, compartment: &str) -> Option<String> {
        lock(&self.payloads).get(&compartment.to_lowercase()).cloned()
    }

    fn snapshot(&self) -> Vec<String> {
        lock(&self.payloads).values().cloned().collect()
    }
}

/// All transport state for one multicast address.
pub(crate) struct ControlChannel {
    pub(crate) group: SocketAddrV4,
    options: TransportOptions,
    pub(crate) outbound: Arc<Outbound>,
    pub(crate) compartments: Arc<Compartments>,
    interval_ms: Arc<AtomicU64>,
    listener: Option<JoinHandle<()>>,
    squawker: Option<JoinHandle<()>>,
    stop: StopHandle,
    signal: StopSignal,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ControlChannel {
    pub(crate) fn new(group: SocketAddrV4, local_ip: Ipv4Addr, options: &TransportOptions) -> Self {
        let (stop, signal) = stop_channel();
        Self {
            group,
            options: options.clone(),
            outbound: Arc::new(Outbound {
                group,
                local_ip,
                options: options.clone(),
                socket: Mutex::new(None),
            }),
            compartments: Arc::new(Compartments::default()),
            interval_ms: Arc::new(AtomicU64::new(duration_ms(options.squawk_interval))),
            listener: None,
            squawker: None,
            stop,
            signal,
        }
    }

    pub(crate) fn squawk_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Acquire))
    }

    pub(crate) fn set_squawk_interval(&self, interval: Duration) {
        self.interval_ms
            .store(duration_ms(interval), Ordering::Release);
    }

    pub(crate) const fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) const fn has_squawker(&self) -> bool {
        self.squawker.is_some()
    }

    pub(crate) fn start_listener(&mut self, handler: FrameHandler) -> Result<(), TransportError> {
        if self.listener.is_some() {
            return Ok(());
        }
        let group = self.group;
        let options = self.options.clone();
        let signal = self.signal.clone();
        let name = format!("listen-{}", group);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let role = format!("Listener on {}", group);
                run_with_retry(&role, options.retry_backoff, &signal, || {
                    listen(group, &options, &handler, &signal)
                });
            })
            .map_err(|source| TransportError::ThreadSpawn { name, source })?;
        self.listener = Some(handle);
        tracing::debug!("Listening on {}", group);
        Ok(())
    }

    pub(crate) fn start_squawker(&mut self) -> Result<(), TransportError> {
        if self.squawker.is_some() {
            return Ok(());
        }
        let group = self.group;
        let backoff = self.options.retry_backoff;
        let outbound = Arc::clone(&self.outbound);
        let compartments = Arc::clone(&self.compartments);
        let interval_ms = Arc::clone(&self.interval_ms);
        let signal = self.signal.clone();
        let name = format!("squawk-{}", group);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let role = format!("Squawker on {}", group);
                run_with_retry(&role, backoff, &signal, || {
                    squawk(&outbound, &compartments, &interval_ms, &signal)
                });
            })
            .map_err(|source| TransportError::ThreadSpawn { name, source })?;
        self.squawker = Some(handle);
        tracing::debug!("Squawking on {}", group);
        Ok(())
    }

    /// Signals both loops and waits up to the join timeout for them.
    pub(crate) fn shutdown(mut self) {
        self.stop.trigger();
        let handles: Vec<JoinHandle<()>> =
            self.listener.take().into_iter().chain(self.squawker.take()).collect();
        let abandoned = join_with_timeout(handles, self.options.join_timeout);
        if abandoned > 0 {
            tracing::warn!(
                "Abandoned {} transport threads for {} after {:?}",
                abandoned,
                self.group,
                self.options.join_timeout
            );
        }
        tracing::debug!("Stopped control channel {}", self.group);
    }
}

fn listen(
    group: SocketAddrV4,
    options: &TransportOptions,
    handler: &FrameHandler,
    signal: &StopSignal,
) -> Result<(), TransportError> {
    let socket = open_receiver(group, &options.socket)?;
    let mut buffer = vec![0_u8; RECV_BUFFER];
    while !signal.is_stopped() {
        match socket.recv_from(&mut buffer) {
            Ok((len, source)) => {
                let Some(bytes) = buffer.get(..len) else {
                    continue;
                };
                match decode_frame(bytes) {
                    Ok(frame) => deliver(handler, &frame),
                    Err(err) => {
                        tracing::debug!("Dropping frame from {} on {}: {}", source, group, err);
                    }
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                ) => {}
            Err(source) => return Err(TransportError::Receive { addr: group, source }),
        }
    }
    Ok(())
}

fn deliver(handler: &FrameHandler, frame: &Frame) {
    if panic::catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err() {
        tracing::warn!("Frame handler panicked on frame from {}", frame.sender);
    }
}

fn squawk(
    outbound: &Outbound,
    compartments: &Compartments,
    interval_ms: &AtomicU64,
    signal: &StopSignal,
) -> Result<(), TransportError> {
    loop {
        for payload in compartments.snapshot() {
            match outbound.send(&payload) {
                Ok(()) | Err(TransportError::Oversized { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        let interval = Duration::from_millis(interval_ms.load(Ordering::Acquire));
        if signal.sleep(interval) {
            return Ok(());
        }
    }
}
