//! # Module SOAP
//!
//! UPnP control calls are SOAP 1.1 over HTTP POST:
//!
//! - the body element is the action, namespaced under the service type
//! - the `SOAPAction` header is `"<serviceType>#<action>"`
//! - a `200 OK` carries `<{action}Response>`, anything else is a fault
//!
//! ## Architecture
//!
//! - [`ActionInvoker`] : sends a typed [`SoapRequest`] to a [`BoundService`]
//! - [`SoapEnvelope`] : parsed envelope
//! - [`build_soap_request`] / [`parse_soap_envelope`] : wire encoding

mod builder;
mod envelope;
mod parser;

pub use builder::{build_soap_request, build_soap_response};
pub use envelope::{SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS, SoapBody, SoapEnvelope, SoapHeader};
pub use parser::{
    SoapParseError, child_text, find_action_response, find_child_with_suffix, parse_soap_envelope,
    parse_upnp_error,
};

use tracing::{debug, trace};
use xmltree::Element;

use crate::description::BoundService;
use crate::errors::IgdError;
use crate::http::HttpTransport;

pub const SOAP_CONTENT_TYPE: &str = r#"text/xml; charset="utf-8""#;

/// A typed action request.
pub trait SoapRequest {
    /// Action name, e.g. `"AddPortMapping"`.
    const ACTION: &'static str;

    type Response: SoapResponse;

    /// In-arguments, in the order the SCPD declares them.
    fn arguments(&self) -> Vec<(&'static str, String)>;
}

/// A typed action response. `Default` is the empty acknowledgment returned
/// when the gateway omits the response element.
pub trait SoapResponse: Default + Sized {
    fn from_element(element: &Element) -> Result<Self, IgdError>;
}

/// Executes actions against one bound service.
pub struct ActionInvoker<'a, T: HttpTransport + ?Sized> {
    transport: &'a T,
    service: &'a BoundService,
}

impl<'a, T: HttpTransport + ?Sized> ActionInvoker<'a, T> {
    pub fn new(transport: &'a T, service: &'a BoundService) -> Self {
        Self { transport, service }
    }

    pub fn invoke<R: SoapRequest>(&self, request: &R) -> Result<R::Response, IgdError> {
        let service_type = self.service.service_type();
        let arguments = request.arguments();
        let args: Vec<(&str, &str)> = arguments
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();

        let body = build_soap_request(service_type, R::ACTION, &args)?;
        let url = self.service.control_url();
        let soap_action = format!(r#""{}#{}""#, service_type, R::ACTION);

        debug!("{} -> {}", R::ACTION, url);
        trace!("{} request body:\n{}", R::ACTION, body);

        let response = self.transport.post(
            &url,
            &[
                ("Content-Type", SOAP_CONTENT_TYPE),
                ("SOAPAction", soap_action.as_str()),
            ],
            body,
        )?;

        trace!(
            "{} answered HTTP {}:\n{}",
            R::ACTION,
            response.status,
            response.body
        );

        if !response.is_ok() {
            let upnp_error = parse_soap_envelope(response.body.as_bytes())
                .ok()
                .and_then(|env| parse_upnp_error(&env));
            return Err(IgdError::RemoteFault {
                url,
                status: response.status,
                body: response.body,
                upnp_error,
            });
        }

        if response.body.trim().is_empty() {
            debug!("{} acknowledged with an empty body", R::ACTION);
            return Ok(R::Response::default());
        }

        let envelope = parse_soap_envelope(response.body.as_bytes())
            .map_err(|e| IgdError::decode(format!("{} response", R::ACTION), e.to_string()))?;

        match find_action_response(&envelope, R::ACTION) {
            Some(element) => R::Response::from_element(element),
            None => {
                debug!("{} response element missing, treating as acknowledgment", R::ACTION);
                Ok(R::Response::default())
            }
        }
    }
}
