//! # pmoigd
//!
//! Client for UPnP Internet Gateway Devices: finds the home router, locates
//! its `WANIPConnection` / `WANPPPConnection` service and drives port
//! forwarding through SOAP.
//!
//! ## Flow
//!
//! 1. [`ssdp`] : M-SEARCH on the multicast group, collect the replies
//! 2. [`description`] : fetch each `LOCATION` device description
//! 3. [`resolver`] : walk the device tree, probe every service's SCPD,
//!    keep the first one exposing the three port-mapping actions
//! 4. [`soap`] / [`actions`] : typed `AddPortMapping`,
//!    `DeletePortMapping` and `GetExternalIPAddress`
//!
//! ## Example
//!
//! ```no_run
//! use pmoigd::{AddPortMappingRequest, IgdClient, PortMappingProtocol};
//!
//! let client = IgdClient::discover()?;
//! let external = client.get_external_ip_address()?;
//! println!("external address: {}", external.external_ip_address);
//!
//! client.add_port_mapping(AddPortMappingRequest::new(
//!     8080,
//!     PortMappingProtocol::Tcp,
//!     8080,
//!     "pmoigd",
//! ))?;
//! # Ok::<(), pmoigd::IgdError>(())
//! ```

pub mod actions;
pub mod client;
pub mod config;
pub mod description;
pub mod errors;
pub mod http;
pub mod local_ip;
pub mod resolver;
pub mod scpd;
pub mod soap;
pub mod ssdp;

pub use actions::{
    AddPortMappingRequest, AddPortMappingResponse, DeletePortMappingRequest,
    DeletePortMappingResponse, GetExternalIPAddressRequest, GetExternalIPAddressResponse,
    PortMappingProtocol,
};
pub use client::IgdClient;
pub use config::{HttpConfig, IgdConfig, ResolverConfig, SsdpConfig};
pub use description::{BoundService, DeviceDescription, DeviceNode, ServiceRef};
pub use errors::{ErrorKind, ErrorList, IgdError, UpnpError};
pub use http::{HttpResponse, HttpTransport, UreqTransport};
pub use local_ip::{LocalAddrProbe, UdpRouteProbe, local_ip_address};
pub use resolver::ServiceResolver;
pub use scpd::ServiceDescription;
pub use ssdp::{SsdpClient, SsdpReply};
