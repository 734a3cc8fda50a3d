//! Device description (`LOCATION`) retrieval and parsing.
//!
//! The device document is decoded on a best-effort basis: unknown vendor
//! elements are skipped and an XML error part-way through keeps everything
//! decoded before it. Only the HTTP exchange itself can fail.

use std::mem;

use quick_xml::{
    Reader,
    escape::resolve_xml_entity,
    events::{BytesRef, Event},
};
use tracing::{debug, warn};
use url::Url;

use crate::errors::IgdError;
use crate::http::HttpTransport;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecVersion {
    pub major: u32,
    pub minor: u32,
}

/// `<root>` of a device description document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub spec_version: SpecVersion,
    /// `<URLBase>`, when the gateway bothers to send it.
    pub url_base: Option<String>,
    pub root_device: DeviceNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceNode {
    pub device_type: String,
    pub friendly_name: String,
    pub serial_number: String,
    pub udn: String,
    pub services: Vec<ServiceRef>,
    pub devices: Vec<DeviceNode>,
}

/// One `<service>` entry of a device's `<serviceList>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRef {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
}

/// A validated service together with the base every relative URL is joined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundService {
    pub service: ServiceRef,
    pub base_location: String,
}

impl BoundService {
    pub fn new(service: ServiceRef, base_location: impl Into<String>) -> Self {
        Self {
            service,
            base_location: base_location.into(),
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service.service_type
    }

    pub fn control_url(&self) -> String {
        resolve_url(&self.base_location, &self.service.control_url)
    }

    pub fn scpd_url(&self) -> String {
        resolve_url(&self.base_location, &self.service.scpd_url)
    }

    pub fn event_sub_url(&self) -> String {
        resolve_url(&self.base_location, &self.service.event_sub_url)
    }
}

impl DeviceDescription {
    /// Base for relative URLs: `<URLBase>` if present, otherwise the
    /// scheme, host and port of the LOCATION the document came from.
    pub fn base_location(&self, location: &str) -> Result<String, IgdError> {
        match self.url_base.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => Ok(base.to_string()),
            _ => location_origin(location),
        }
    }
}

/// `scheme://host[:port]` of an absolute http(s) URL.
pub fn location_origin(location: &str) -> Result<String, IgdError> {
    let url = Url::parse(location.trim())
        .map_err(|e| IgdError::malformed(location, format!("invalid LOCATION: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(IgdError::malformed(
            location,
            format!("unsupported LOCATION scheme '{}'", url.scheme()),
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| IgdError::malformed(location, "LOCATION has no host"))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Joins two URL parts with exactly one `/`, whatever slashes they carry.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim().trim_matches('/');
    let path = path.trim().trim_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path)
}

/// Like [`join_path`], but keeps an already absolute `http(s)://` URL.
pub fn resolve_url(base: &str, url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    join_path(base, url)
}

/// GETs the device description at `location`.
pub fn fetch_description<T>(transport: &T, location: &str) -> Result<DeviceDescription, IgdError>
where
    T: HttpTransport + ?Sized,
{
    debug!("Fetching device description at {}", location);
    let response = transport.get(location)?;
    if !response.is_ok() {
        return Err(IgdError::RemoteFault {
            url: location.to_string(),
            status: response.status,
            body: response.body,
            upnp_error: None,
        });
    }
    Ok(parse_description(&response.body, location))
}

/// Best-effort decode of a device description document.
pub fn parse_description(xml: &str, origin: &str) -> DeviceDescription {
    let mut reader = Reader::from_str(xml);

    let mut description = DeviceDescription::default();
    let mut root: Option<DeviceNode> = None;
    let mut devices: Vec<DeviceNode> = Vec::new();
    let mut service: Option<ServiceRef> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "device" => devices.push(DeviceNode::default()),
                    "service" if path.last().is_some_and(|p| p == "serviceList") => {
                        service = Some(ServiceRef::default());
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"device" {
                    attach_device(DeviceNode::default(), &mut devices, &mut root);
                }
            }
            Ok(Event::Text(e)) => {
                if let Ok(t) = e.decode() {
                    text.push_str(&t);
                }
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(resolved) = resolve_reference(&e) {
                    text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let value = mem::take(&mut text).trim().to_string();
                let parent = path.len().checked_sub(2).and_then(|i| path.get(i));

                match (parent.map(String::as_str), name.as_str()) {
                    (_, "device") => {
                        if let Some(node) = devices.pop() {
                            attach_device(node, &mut devices, &mut root);
                        }
                    }
                    (_, "service") => {
                        if let (Some(s), Some(device)) = (service.take(), devices.last_mut()) {
                            device.services.push(s);
                        }
                    }
                    (Some("service"), field) => {
                        if let Some(s) = service.as_mut() {
                            set_service_field(s, field, value);
                        }
                    }
                    (Some("device"), field) => {
                        if let Some(device) = devices.last_mut() {
                            set_device_field(device, field, value);
                        }
                    }
                    (Some("specVersion"), "major") => {
                        description.spec_version.major = value.parse().unwrap_or_default();
                    }
                    (Some("specVersion"), "minor") => {
                        description.spec_version.minor = value.parse().unwrap_or_default();
                    }
                    (Some("root"), "URLBase") if !value.is_empty() => {
                        description.url_base = Some(value);
                    }
                    _ => {}
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "Device description from {} is not well formed, keeping what was decoded: {}",
                    origin, e
                );
                break;
            }
        }
    }

    // Close devices left open by a truncated or broken document.
    while let Some(node) = devices.pop() {
        attach_device(node, &mut devices, &mut root);
    }

    match root {
        Some(device) => description.root_device = device,
        None => warn!("Device description from {} has no <device>", origin),
    }
    description
}

fn attach_device(node: DeviceNode, open: &mut [DeviceNode], root: &mut Option<DeviceNode>) {
    match open.last_mut() {
        Some(parent) => parent.devices.push(node),
        None if root.is_none() => *root = Some(node),
        None => debug!("Ignoring extra top-level device {}", node.udn),
    }
}

fn set_device_field(device: &mut DeviceNode, field: &str, value: String) {
    match field {
        "deviceType" => device.device_type = value,
        "friendlyName" => device.friendly_name = value,
        "serialNumber" => device.serial_number = value,
        "UDN" => device.udn = value,
        _ => {}
    }
}

fn set_service_field(service: &mut ServiceRef, field: &str, value: String) {
    match field {
        "serviceType" => service.service_type = value,
        "serviceId" => service.service_id = value,
        "controlURL" => service.control_url = value,
        "eventSubURL" => service.event_sub_url = value,
        "SCPDURL" => service.scpd_url = value,
        _ => {}
    }
}

pub(crate) fn resolve_reference(reference: &BytesRef<'_>) -> Option<String> {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        return Some(ch.to_string());
    }
    let name = reference.decode().ok()?;
    resolve_xml_entity(&name).map(str::to_string)
}
