//! Network utilities
//!
//! Address resolution and socket creation for the dispatcher.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Resolve a `host:port` string to its first socket address
pub async fn resolve_listen_address(listen: &str) -> Option<SocketAddr> {
    tokio::net::lookup_host(listen).await.ok()?.next()
}

/// Bind a UDP socket with address (and, on Unix, port) reuse enabled.
///
/// Must be called from within a tokio runtime.
pub fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
