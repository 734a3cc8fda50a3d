//! # SSDP discovery
//!
//! A control point looking for an Internet Gateway Device sends a single
//! `M-SEARCH` datagram to the SSDP multicast group and then collects the
//! unicast `HTTP/1.1 200 OK` replies until the network goes silent.
//!
//! - [`SsdpClient`] : ephemeral socket, probe and collection loop
//! - [`SsdpReply`] : one accepted reply (status line + headers)
//! - [`parse_reply`] : datagram parser used by the collection loop
//!
//! ## Constants SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Search target**: `ssdp:all` (vendors are too inconsistent to filter on ST)

mod client;

pub use client::{SsdpClient, build_msearch, parse_reply};

use std::collections::HashMap;
use std::net::SocketAddr;

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// A well-formed `200 OK` answer to an M-SEARCH.
#[derive(Debug, Clone)]
pub struct SsdpReply {
    pub status_line: String,
    /// Header names are stored upper-cased; lookups go through [`SsdpReply::header`].
    pub headers: HashMap<String, String>,
    pub from: Option<SocketAddr>,
}

impl SsdpReply {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Device description URL announced by the gateway.
    pub fn location(&self) -> Option<&str> {
        self.header("LOCATION")
    }

    pub fn server(&self) -> Option<&str> {
        self.header("SERVER")
    }

    pub fn usn(&self) -> Option<&str> {
        self.header("USN")
    }
}
