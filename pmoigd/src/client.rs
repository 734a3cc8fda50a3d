//! `IgdClient`: one resolved port-mapping service plus the local address.

use std::net::{IpAddr, SocketAddr};

use tracing::{debug, info, warn};
use url::Url;

use crate::actions::{
    AddPortMappingRequest, AddPortMappingResponse, DeletePortMappingRequest,
    DeletePortMappingResponse, GetExternalIPAddressRequest, GetExternalIPAddressResponse,
};
use crate::config::IgdConfig;
use crate::description::BoundService;
use crate::errors::IgdError;
use crate::http::{HttpTransport, UreqTransport};
use crate::local_ip::{LocalAddrProbe, UdpRouteProbe};
use crate::resolver::ServiceResolver;
use crate::soap::ActionInvoker;
use crate::ssdp::SsdpClient;

/// Client bound to a gateway's port-mapping service.
///
/// The service is resolved once, at construction, and never re-resolved.
/// Failed calls are returned as-is; nothing is retried.
pub struct IgdClient<T: HttpTransport = UreqTransport> {
    service: BoundService,
    local_ip: IpAddr,
    transport: T,
}

impl IgdClient<UreqTransport> {
    /// Discovers a gateway with the default configuration.
    pub fn discover() -> Result<Self, IgdError> {
        Self::discover_with(&IgdConfig::default())
    }

    /// SSDP search, then resolution against every reply in arrival order.
    pub fn discover_with(config: &IgdConfig) -> Result<Self, IgdError> {
        config.validate()?;

        let replies = SsdpClient::new(&config.ssdp)?.search()?;
        debug!("{} SSDP replies to resolve", replies.len());

        let transport = UreqTransport::new(config.http.timeout());
        let service = ServiceResolver::new(&transport)
            .with_max_depth(config.resolver.max_depth)
            .resolve_replies(&replies)?;

        Self::bind(service, transport)
    }

    /// Skips SSDP and resolves against a known device description URL.
    pub fn from_location(location: &str, config: &IgdConfig) -> Result<Self, IgdError> {
        config.validate()?;

        let transport = UreqTransport::new(config.http.timeout());
        let service = ServiceResolver::new(&transport)
            .with_max_depth(config.resolver.max_depth)
            .resolve_location(location)
            .map_err(IgdError::ServiceNotFound)?;

        Self::bind(service, transport)
    }

    fn bind(service: BoundService, transport: UreqTransport) -> Result<Self, IgdError> {
        let local_ip = probe_local_ip(&UdpRouteProbe::default(), UdpRouteProbe::new, &service)?;
        info!(
            "IGD client bound to {} at {} (local address {})",
            service.service_type(),
            service.control_url(),
            local_ip
        );
        Ok(Self::with_service(service, local_ip, transport))
    }
}

impl<T: HttpTransport> IgdClient<T> {
    /// Binds an already resolved service.
    pub fn with_service(service: BoundService, local_ip: IpAddr, transport: T) -> Self {
        Self {
            service,
            local_ip,
            transport,
        }
    }

    pub fn service(&self) -> &BoundService {
        &self.service
    }

    pub fn local_ip(&self) -> IpAddr {
        self.local_ip
    }

    /// Opens a port forward. An empty `internal_client` means this host.
    pub fn add_port_mapping(
        &self,
        mut request: AddPortMappingRequest,
    ) -> Result<AddPortMappingResponse, IgdError> {
        if request.internal_client.trim().is_empty() {
            request.internal_client = self.local_ip.to_string();
        }
        debug!(
            "AddPortMapping {} {} -> {}:{}",
            request.protocol, request.external_port, request.internal_client, request.internal_port
        );
        self.invoker().invoke(&request)
    }

    pub fn delete_port_mapping(
        &self,
        request: &DeletePortMappingRequest,
    ) -> Result<DeletePortMappingResponse, IgdError> {
        debug!(
            "DeletePortMapping {} {}",
            request.protocol, request.external_port
        );
        self.invoker().invoke(request)
    }

    pub fn get_external_ip_address(&self) -> Result<GetExternalIPAddressResponse, IgdError> {
        self.invoker().invoke(&GetExternalIPAddressRequest)
    }

    fn invoker(&self) -> ActionInvoker<'_, T> {
        ActionInvoker::new(&self.transport, &self.service)
    }
}

/// `primary` first; on hosts without a default route, the probe built by
/// `toward` for the gateway's own address.
fn probe_local_ip<P, F>(
    primary: &dyn LocalAddrProbe,
    toward: F,
    service: &BoundService,
) -> Result<IpAddr, IgdError>
where
    P: LocalAddrProbe,
    F: FnOnce(SocketAddr) -> P,
{
    let default_err = match primary.local_ip() {
        Ok(ip) => return Ok(ip),
        Err(err) => err,
    };

    let Some(gateway) = gateway_socket_addr(&service.base_location) else {
        return Err(default_err);
    };
    warn!(
        "No default route ({}), using the route toward {}",
        default_err, gateway
    );
    toward(gateway).local_ip()
}

fn gateway_socket_addr(base_location: &str) -> Option<SocketAddr> {
    let url = Url::parse(base_location).ok()?;
    let ip: IpAddr = url
        .host_str()?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()?;
    Some(SocketAddr::new(ip, url.port_or_known_default()?))
}
