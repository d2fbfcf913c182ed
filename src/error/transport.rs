use std::net::SocketAddrV4;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open socket for {addr}: {source}")]
    Socket {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to join multicast group {addr}: {source}")]
    JoinGroup {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to send to {addr}: {source}")]
    Send {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to receive on {addr}: {source}")]
    Receive {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
    #[error("Address {addr} is not an IPv4 multicast group.")]
    NotMulticast { addr: SocketAddrV4 },
    #[error("No control channel running for {addr}.")]
    UnknownChannel { addr: SocketAddrV4 },
    #[error("Frame of {len} bytes exceeds the {max} byte limit.")]
    Oversized { len: usize, max: usize },
    #[error("Failed to spawn transport thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to resolve local address: {source}")]
    LocalAddress {
        #[source]
        source: std::io::Error,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
