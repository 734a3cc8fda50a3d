//! Locates the port-mapping service inside a gateway's device tree.
//!
//! Device and service type strings are not trusted. Every candidate is
//! validated by fetching its SCPD and looking for a required action. The walk
//! is depth-first and pre-order: the services of a device are tried in list
//! order before its child devices. The first accepted service ends the walk.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::description::{
    BoundService, DeviceDescription, DeviceNode, ServiceRef, fetch_description, resolve_url,
};
use crate::errors::{ErrorList, IgdError};
use crate::http::HttpTransport;
use crate::scpd::parse_scpd;
use crate::ssdp::SsdpReply;

pub const DEFAULT_MAX_DEPTH: usize = 16;

pub struct ServiceResolver<'a, T: HttpTransport + ?Sized> {
    transport: &'a T,
    max_depth: usize,
}

struct Walk<'d> {
    base_location: &'d str,
    visited: HashSet<String>,
    errors: ErrorList,
}

impl<'a, T: HttpTransport + ?Sized> ServiceResolver<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Searches one device tree.
    ///
    /// Fails with the soft errors gathered along the way once the whole tree
    /// has been visited without success.
    pub fn resolve(
        &self,
        description: &DeviceDescription,
        base_location: &str,
    ) -> Result<BoundService, ErrorList> {
        let mut walk = Walk {
            base_location,
            visited: HashSet::new(),
            errors: ErrorList::new(),
        };

        match self.visit(&description.root_device, 0, &mut walk) {
            Some(service) => Ok(BoundService::new(service.clone(), base_location)),
            None => Err(walk.errors),
        }
    }

    /// Fetches the description behind one LOCATION, then searches it.
    pub fn resolve_location(&self, location: &str) -> Result<BoundService, ErrorList> {
        let description = fetch_description(self.transport, location)
            .map_err(|e| ErrorList::from(vec![e]))?;
        let base_location = description
            .base_location(location)
            .map_err(|e| ErrorList::from(vec![e]))?;
        debug!("Resolving {} against base {}", location, base_location);
        self.resolve(&description, &base_location)
    }

    /// Tries every reply in arrival order; the first one that yields a
    /// service wins. On total failure every reply's errors are returned.
    pub fn resolve_replies(&self, replies: &[SsdpReply]) -> Result<BoundService, IgdError> {
        let mut errors = ErrorList::new();

        for reply in replies {
            let Some(location) = reply.location() else {
                errors.push(IgdError::malformed(
                    reply.status_line.as_str(),
                    "missing LOCATION header",
                ));
                continue;
            };

            match self.resolve_location(location) {
                Ok(bound) => {
                    info!(
                        "Port-mapping service {} found behind {} (control {})",
                        bound.service_type(),
                        location,
                        bound.control_url()
                    );
                    return Ok(bound);
                }
                Err(reply_errors) => {
                    debug!(
                        "No port-mapping service behind {} ({} errors)",
                        location,
                        reply_errors.len()
                    );
                    errors.extend(reply_errors);
                }
            }
        }

        Err(IgdError::ServiceNotFound(errors))
    }

    fn visit<'d>(
        &self,
        device: &'d DeviceNode,
        depth: usize,
        walk: &mut Walk<'_>,
    ) -> Option<&'d ServiceRef> {
        if depth > self.max_depth {
            warn!(
                "Device tree deeper than {} levels, not descending into {}",
                self.max_depth, device.udn
            );
            walk.errors.push(IgdError::malformed(
                walk.base_location,
                format!(
                    "device {} is nested deeper than {} levels",
                    device.udn, self.max_depth
                ),
            ));
            return None;
        }

        if !device.udn.is_empty() && !walk.visited.insert(device.udn.clone()) {
            warn!("Device {} listed twice, skipping", device.udn);
            walk.errors.push(IgdError::malformed(
                walk.base_location,
                format!("device {} appears more than once", device.udn),
            ));
            return None;
        }

        for service in &device.services {
            match self.validate(service, walk.base_location) {
                Ok(true) => return Some(service),
                Ok(false) => {
                    debug!("Service {} has no port-mapping action", service.service_type);
                }
                Err(err) => {
                    warn!("Skipping service {}: {}", service.service_type, err);
                    walk.errors.push(err);
                }
            }
        }

        device
            .devices
            .iter()
            .find_map(|child| self.visit(child, depth + 1, walk))
    }

    /// Live probe: GET the SCPD and look for a required action.
    fn validate(&self, service: &ServiceRef, base_location: &str) -> Result<bool, IgdError> {
        if service.scpd_url.trim().is_empty() {
            return Err(IgdError::malformed(
                base_location,
                format!("service {} has no SCPDURL", service.service_type),
            ));
        }

        let url = resolve_url(base_location, &service.scpd_url);
        debug!("Probing SCPD {}", url);

        let response = self.transport.get(&url)?;
        if !response.is_ok() {
            return Err(IgdError::RemoteFault {
                url,
                status: response.status,
                body: response.body,
                upnp_error: None,
            });
        }

        let description = parse_scpd(&response.body, &url)?;
        Ok(description.supports_port_mapping())
    }
}
