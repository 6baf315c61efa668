use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

/// Creates and configures a UDP socket for TS packet reception.
/// Joins the group on the default interface when `addr` is multicast.
pub fn create_udp_socket(addr: SocketAddr) -> anyhow::Result<Socket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => anyhow::bail!("only IPv4 is supported"),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding {addr}"))?;

    if ip.is_multicast() {
        socket
            .join_multicast_v4(&ip, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("joining multicast group {ip}"))?;
        info!(group = %ip, port = addr.port(), "joined multicast group");
    } else {
        info!(%addr, "listening for unicast TS");
    }

    socket.set_nonblocking(true)?;
    Ok(socket)
}
