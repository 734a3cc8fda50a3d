//! Local outbound address, used as the default `NewInternalClient`.
//!
//! A UDP socket is connected toward an arbitrary unreachable address: the OS
//! picks the route and the source address, and reports it through
//! `local_addr()`. Nothing is ever read or written on the socket, so no
//! packet leaves the host.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::errors::IgdError;

/// Arbitrary, unreachable target; only its route matters.
pub const PROBE_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(6, 9, 6, 9)), 6969);

pub trait LocalAddrProbe {
    fn local_ip(&self) -> Result<IpAddr, IgdError>;
}

/// [`LocalAddrProbe`] asking the routing table through a connected UDP socket.
#[derive(Debug, Clone, Copy)]
pub struct UdpRouteProbe {
    target: SocketAddr,
}

impl UdpRouteProbe {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Default for UdpRouteProbe {
    fn default() -> Self {
        Self::new(PROBE_TARGET)
    }
}

impl LocalAddrProbe for UdpRouteProbe {
    fn local_ip(&self) -> Result<IpAddr, IgdError> {
        let bind_addr: SocketAddr = if self.target.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0, 0, 0, 0], 0))
        };

        let socket =
            UdpSocket::bind(bind_addr).map_err(|e| IgdError::transport("local ip bind", e))?;
        // Nothing may block on this socket.
        socket
            .set_nonblocking(true)
            .map_err(|e| IgdError::transport("local ip socket", e))?;
        socket
            .connect(self.target)
            .map_err(|e| IgdError::transport(format!("local ip route to {}", self.target), e))?;

        let local = socket
            .local_addr()
            .map_err(|e| IgdError::transport("local ip address", e))?;
        debug!("Local outbound address toward {}: {}", self.target, local.ip());
        Ok(local.ip())
    }
}

/// Local address the OS would use for outbound traffic.
pub fn local_ip_address() -> Result<IpAddr, IgdError> {
    UdpRouteProbe::default().local_ip()
}
