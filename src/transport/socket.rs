use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::TransportError;

const RECV_BUFFER_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// Interface to send on and join with; unspecified lets the OS choose.
    pub interface: Ipv4Addr,
    pub ttl: u32,
    /// Deliver our own datagrams back to local listeners.
    pub loopback: bool,
    /// Bounds how long a receive blocks before the stop flag is rechecked.
    pub read_timeout: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            loopback: true,
            read_timeout: Duration::from_millis(200),
        }
    }
}

fn ensure_multicast(addr: SocketAddrV4) -> Result<(), TransportError> {
    if addr.ip().is_multicast() {
        Ok(())
    } else {
        Err(TransportError::NotMulticast { addr })
    }
}

pub(crate) fn open_sender(
    group: SocketAddrV4,
    options: &SocketOptions,
) -> Result<UdpSocket, TransportError> {
    ensure_multicast(group)?;
    let socket_error = |source| TransportError::Socket { addr: group, source };
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(socket_error)?;
    socket.set_reuse_address(true).map_err(socket_error)?;
    if !options.interface.is_unspecified() {
        socket
            .set_multicast_if_v4(&options.interface)
            .map_err(socket_error)?;
    }
    socket
        .set_multicast_ttl_v4(options.ttl)
        .map_err(socket_error)?;
    socket
        .set_multicast_loop_v4(options.loopback)
        .map_err(socket_error)?;
    let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    socket.bind(&local.into()).map_err(socket_error)?;
    Ok(socket.into())
}

pub(crate) fn open_receiver(
    group: SocketAddrV4,
    options: &SocketOptions,
) -> Result<UdpSocket, TransportError> {
    ensure_multicast(group)?;
    let socket_error = |source| TransportError::Socket { addr: group, source };
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(socket_error)?;
    socket.set_reuse_address(true).map_err(socket_error)?;
    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuse_port(true).map_err(socket_error)?;

    // Binding the group itself filters out traffic for other groups on the
    // same port; Windows only accepts the wildcard address.
    #[cfg(unix)]
    let bind_addr = group;
    #[cfg(not(unix))]
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port());
    socket.bind(&bind_addr.into()).map_err(socket_error)?;

    socket
        .join_multicast_v4(group.ip(), &options.interface)
        .map_err(|source| TransportError::JoinGroup { addr: group, source })?;
    socket
        .set_multicast_loop_v4(options.loopback)
        .map_err(socket_error)?;
    socket
        .set_read_timeout(Some(options.read_timeout))
        .map_err(socket_error)?;
    if let Err(err) = socket.set_recv_buffer_size(RECV_BUFFER_BYTES) {
        tracing::debug!("Could not raise receive buffer on {}: {}", group, err);
    }
    Ok(socket.into())
}
