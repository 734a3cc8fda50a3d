//! Blocking HTTP seam used for description, SCPD and control requests.
//!
//! Every request is self-contained: the response body is read to the end and
//! released before the call returns.

use std::time::Duration;

use tracing::trace;
use ureq::http::Response;
use ureq::{Agent, Body};

use crate::errors::IgdError;

/// Status code and fully read body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait HttpTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, IgdError>;

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, IgdError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, IgdError> {
        (**self).get(url)
    }

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, IgdError> {
        (**self).post(url, headers, body)
    }
}

/// [`HttpTransport`] backed by a ureq agent.
///
/// 4xx/5xx are *not* turned into errors by the agent: the caller needs the
/// body of a failed control call to report it. The agent keeps no idle
/// connection, so every call opens and closes its own socket.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_idle_connections(0)
            .max_idle_connections_per_host(0)
            .build();

        Self {
            agent: config.into(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, IgdError> {
        trace!("GET {}", url);
        let response = self.agent.get(url).call();
        read_response(url, response)
    }

    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, IgdError> {
        trace!("POST {}", url);
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        read_response(url, request.send(body))
    }
}

/// Reads the whole body so the connection is released before returning.
fn read_response(
    url: &str,
    response: Result<Response<Body>, ureq::Error>,
) -> Result<HttpResponse, IgdError> {
    let http_error = |source| IgdError::Http {
        url: url.to_string(),
        source,
    };

    let mut response = response.map_err(http_error)?;
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().map_err(http_error)?;

    Ok(HttpResponse { status, body })
}
