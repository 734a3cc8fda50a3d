//! Typed payloads of the three WANIPConnection / WANPPPConnection actions
//! used for port mapping.

use std::fmt;
use std::str::FromStr;

use xmltree::Element;

use crate::errors::IgdError;
use crate::scpd::{ADD_PORT_MAPPING, DELETE_PORT_MAPPING, GET_EXTERNAL_IP_ADDRESS};
use crate::soap::{SoapRequest, SoapResponse, child_text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PortMappingProtocol {
    #[default]
    Tcp,
    Udp,
}

impl PortMappingProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortMappingProtocol::Tcp => "TCP",
            PortMappingProtocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for PortMappingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortMappingProtocol {
    type Err = IgdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(PortMappingProtocol::Tcp),
            "UDP" => Ok(PortMappingProtocol::Udp),
            other => Err(IgdError::decode(
                "port mapping protocol",
                format!("'{}' is neither TCP nor UDP", other),
            )),
        }
    }
}

/// `AddPortMapping` in-arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPortMappingRequest {
    /// Empty means any remote host.
    pub remote_host: String,
    pub external_port: u16,
    pub protocol: PortMappingProtocol,
    pub internal_port: u16,
    /// LAN address the port is forwarded to. Empty means this host.
    pub internal_client: String,
    pub enabled: bool,
    pub description: String,
    /// Seconds; 0 asks for a permanent mapping.
    pub lease_duration: u32,
}

impl AddPortMappingRequest {
    /// An enabled, permanent mapping to this host.
    pub fn new(
        external_port: u16,
        protocol: PortMappingProtocol,
        internal_port: u16,
        description: impl Into<String>,
    ) -> Self {
        Self {
            external_port,
            protocol,
            internal_port,
            enabled: true,
            description: description.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPortMappingResponse;

impl SoapRequest for AddPortMappingRequest {
    const ACTION: &'static str = ADD_PORT_MAPPING;
    type Response = AddPortMappingResponse;

    fn arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("NewRemoteHost", self.remote_host.clone()),
            ("NewExternalPort", self.external_port.to_string()),
            ("NewProtocol", self.protocol.to_string()),
            ("NewInternalPort", self.internal_port.to_string()),
            ("NewInternalClient", self.internal_client.clone()),
            ("NewEnabled", if self.enabled { "1" } else { "0" }.to_string()),
            ("NewPortMappingDescription", self.description.clone()),
            ("NewLeaseDuration", self.lease_duration.to_string()),
        ]
    }
}

impl SoapResponse for AddPortMappingResponse {
    fn from_element(_element: &Element) -> Result<Self, IgdError> {
        Ok(Self)
    }
}

/// `DeletePortMapping` in-arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePortMappingRequest {
    pub remote_host: String,
    pub external_port: u16,
    pub protocol: PortMappingProtocol,
}

impl DeletePortMappingRequest {
    pub fn new(external_port: u16, protocol: PortMappingProtocol) -> Self {
        Self {
            external_port,
            protocol,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePortMappingResponse;

impl SoapRequest for DeletePortMappingRequest {
    const ACTION: &'static str = DELETE_PORT_MAPPING;
    type Response = DeletePortMappingResponse;

    fn arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("NewRemoteHost", self.remote_host.clone()),
            ("NewExternalPort", self.external_port.to_string()),
            ("NewProtocol", self.protocol.to_string()),
        ]
    }
}

impl SoapResponse for DeletePortMappingResponse {
    fn from_element(_element: &Element) -> Result<Self, IgdError> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetExternalIPAddressRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetExternalIPAddressResponse {
    /// Empty when the gateway did not report an address.
    pub external_ip_address: String,
}

impl SoapRequest for GetExternalIPAddressRequest {
    const ACTION: &'static str = GET_EXTERNAL_IP_ADDRESS;
    type Response = GetExternalIPAddressResponse;

    fn arguments(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

impl SoapResponse for GetExternalIPAddressResponse {
    fn from_element(element: &Element) -> Result<Self, IgdError> {
        Ok(Self {
            external_ip_address: child_text(element, "NewExternalIPAddress").unwrap_or_default(),
        })
    }
}
