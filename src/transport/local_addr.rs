use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::OnceLock;

use crate::error::TransportError;

/// Public address used only to select a route; nothing is sent.
const ROUTE_PROBE: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 53);

/// Returns the IPv4 address the OS would use to reach `target`.
///
/// # Errors
///
/// Returns an error when no route to `target` exists.
pub fn probe_route(target: SocketAddrV4) -> Result<Ipv4Addr, TransportError> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
        .map_err(|source| TransportError::LocalAddress { source })?;
    socket
        .connect(target)
        .map_err(|source| TransportError::LocalAddress { source })?;
    match socket
        .local_addr()
        .map_err(|source| TransportError::LocalAddress { source })?
    {
        std::net::SocketAddr::V4(addr) => Ok(*addr.ip()),
        std::net::SocketAddr::V6(_) => Err(TransportError::LocalAddress {
            source: std::io::Error::new(std::io::ErrorKind::Unsupported, "IPv6 route selected"),
        }),
    }
}

/// This host's primary IPv4 address, resolved once per process.
///
/// Falls back to `0.0.0.0` when no route exists.
pub fn local_ipv4() -> Ipv4Addr {
    static LOCAL: OnceLock<Ipv4Addr> = OnceLock::new();
    *LOCAL.get_or_init(|| match probe_route(ROUTE_PROBE) {
        Ok(ip) => ip,
        Err(err) => {
            tracing::warn!("{}; using {}", err, Ipv4Addr::UNSPECIFIED);
            Ipv4Addr::UNSPECIFIED
        }
    })
}
