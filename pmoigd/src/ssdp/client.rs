/*!
The IGD SSDP client is a *control point*: it never binds UDP port 1900.

It binds an ephemeral port (`0.0.0.0:0`), sends one M-SEARCH to the multicast
group and reads the unicast `HTTP/1.1 200` replies that come back to that port.
Reading stops at the first read that hits the rolling deadline (or fails), so
the call blocks for roughly the time the last gateway takes to answer plus one
deadline.
*/

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace, warn};

use super::SsdpReply;
use crate::config::SsdpConfig;
use crate::errors::{ErrorList, IgdError};

const RECV_BUFFER_SIZE: usize = 8192;

/// Client SSDP: one socket, one probe, one collection window.
pub struct SsdpClient {
    socket: UdpSocket,
    config: SsdpConfig,
}

impl SsdpClient {
    /// Binds an ephemeral UDP socket. A bind failure is fatal.
    pub fn new(config: &SsdpConfig) -> Result<Self, IgdError> {
        let domain = if config.multicast_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| IgdError::transport("ssdp socket", e))?;
        socket2
            .set_reuse_address(true)
            .map_err(|e| IgdError::transport("ssdp socket", e))?;

        let bind_addr: SocketAddr = if config.multicast_addr.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0, 0, 0, 0], 0))
        };
        socket2
            .bind(&bind_addr.into())
            .map_err(|e| IgdError::transport(format!("ssdp bind {}", bind_addr), e))?;

        let socket: UdpSocket = socket2.into();
        socket
            .set_read_timeout(Some(config.read_timeout()))
            .map_err(|e| IgdError::transport("ssdp read timeout", e))?;

        if let Ok(local) = socket.local_addr() {
            debug!("SSDP client bound on {}", local);
        }

        Ok(Self {
            socket,
            config: config.clone(),
        })
    }

    /// Sends the M-SEARCH probe. A send failure is fatal.
    pub fn send_msearch(&self) -> Result<(), IgdError> {
        let msg = build_msearch(&self.config);
        let target = self.config.multicast_addr;

        self.socket
            .send_to(msg.as_bytes(), target)
            .map_err(|e| IgdError::transport(format!("ssdp send to {}", target), e))?;

        debug!(
            "M-SEARCH sent to {} (ST={}, MX={})",
            target, self.config.search_target, self.config.mx
        );
        trace!("M-SEARCH payload:\n{}", msg);
        Ok(())
    }

    /// Reads replies until one read times out or fails.
    ///
    /// Malformed or non-200 datagrams are dropped and their parse errors kept;
    /// they are only surfaced when no reply at all was accepted.
    pub fn collect(&self) -> Result<Vec<SsdpReply>, IgdError> {
        let mut replies = Vec::new();
        let mut errors = ErrorList::new();
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => match parse_reply(&buf[..n], Some(from)) {
                    Ok(reply) => {
                        debug!(
                            "SSDP reply from {}: LOCATION={}",
                            from,
                            reply.location().unwrap_or_default()
                        );
                        replies.push(reply);
                    }
                    Err(err) => {
                        debug!("Dropping SSDP datagram from {}: {}", from, err);
                        errors.push(err);
                    }
                },
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    trace!("SSDP collection window closed");
                    break;
                }
                Err(e) => {
                    warn!("SSDP receive error: {}", e);
                    errors.push(IgdError::transport("ssdp receive", e));
                    break;
                }
            }
        }

        if replies.is_empty() {
            return Err(IgdError::NoGatewayFound(errors));
        }

        debug!(
            "SSDP collected {} replies ({} datagrams dropped)",
            replies.len(),
            errors.len()
        );
        Ok(replies)
    }

    /// Probe then collect; the socket is released when `self` is dropped.
    pub fn search(self) -> Result<Vec<SsdpReply>, IgdError> {
        self.send_msearch()?;
        self.collect()
    }
}

/// Builds the M-SEARCH request: request line, headers, empty line, no body.
pub fn build_msearch(config: &SsdpConfig) -> String {
    let mx = config.mx.max(1);
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         ST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         USER-AGENT: {}\r\n\
         \r\n",
        config.multicast_addr, config.search_target, mx, config.user_agent
    )
}

/// Parses one datagram as a status line followed by MIME-style headers.
///
/// Rejected: no line break, a status line with fewer than three tokens, a
/// status code other than 200, a header line without `:`, a missing LOCATION.
pub fn parse_reply(data: &[u8], from: Option<SocketAddr>) -> Result<SsdpReply, IgdError> {
    let origin = from
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "ssdp".to_string());
    let text = String::from_utf8_lossy(data);

    let (status_line, header_block) = text
        .split_once('\n')
        .ok_or_else(|| IgdError::malformed(&origin, "no header section"))?;
    let status_line = status_line.trim();

    let tokens: Vec<&str> = status_line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(IgdError::malformed(
            &origin,
            format!("invalid status line '{}'", status_line),
        ));
    }
    if tokens[1] != "200" {
        return Err(IgdError::malformed(
            &origin,
            format!("not ok: '{}'", status_line),
        ));
    }

    let headers = parse_headers(header_block.lines(), &origin)?;
    if !headers.contains_key("LOCATION") {
        return Err(IgdError::malformed(&origin, "missing LOCATION header"));
    }

    Ok(SsdpReply {
        status_line: status_line.to_string(),
        headers,
        from,
    })
}

fn parse_headers<'a, I>(lines: I, origin: &str) -> Result<HashMap<String, String>, IgdError>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();

        // Empty line marks end of headers
        if line.is_empty() {
            break;
        }

        // Split on first ':' only (values may contain ':')
        let (name, value) = line.split_once(':').ok_or_else(|| {
            IgdError::malformed(origin, format!("invalid header line '{}'", line))
        })?;

        let name = name.trim().to_ascii_uppercase();
        if name.is_empty() {
            return Err(IgdError::malformed(
                origin,
                format!("empty header name in '{}'", line),
            ));
        }

        // First occurrence wins
        headers
            .entry(name)
            .or_insert_with(|| value.trim().to_string());
    }
    Ok(headers)
}
