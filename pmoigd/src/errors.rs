use std::fmt;

use thiserror::Error;

/// Error code and description carried by a `<UPnPError>` fault detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    pub error_code: u32,
    pub error_description: String,
}

/// Coarse classification of an [`IgdError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    MalformedResponse,
    RemoteFault,
    ProtocolDecode,
    ServiceNotFound,
    Config,
}

#[derive(Error, Debug)]
pub enum IgdError {
    #[error("transport error ({context}): {source}")]
    Transport {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },
    #[error("malformed response from {origin}: {reason}")]
    MalformedResponse { origin: String, reason: String },
    #[error("{url} failed with HTTP status {status} and body: {body}")]
    RemoteFault {
        url: String,
        status: u16,
        body: String,
        upnp_error: Option<UpnpError>,
    },
    #[error("cannot decode {what}: {reason}")]
    ProtocolDecode { what: String, reason: String },
    #[error("cannot encode SOAP request: {0}")]
    Encode(#[from] xmltree::Error),
    #[error("no gateway answered the SSDP search ({0})")]
    NoGatewayFound(ErrorList),
    #[error("no port-mapping service found ({0})")]
    ServiceNotFound(ErrorList),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IgdError {
    pub fn transport(context: impl Into<String>, source: std::io::Error) -> Self {
        IgdError::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        IgdError::MalformedResponse {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        IgdError::ProtocolDecode {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IgdError::Transport { .. } | IgdError::Http { .. } => ErrorKind::Transport,
            IgdError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            IgdError::RemoteFault { .. } => ErrorKind::RemoteFault,
            IgdError::ProtocolDecode { .. } | IgdError::Encode(_) => ErrorKind::ProtocolDecode,
            IgdError::NoGatewayFound(_) | IgdError::ServiceNotFound(_) => {
                ErrorKind::ServiceNotFound
            }
            IgdError::Config(_) => ErrorKind::Config,
        }
    }

    /// Soft errors collected while the operation was fanned out, if any.
    pub fn aggregated(&self) -> Option<&ErrorList> {
        match self {
            IgdError::NoGatewayFound(list) | IgdError::ServiceNotFound(list) => Some(list),
            _ => None,
        }
    }
}

/// Ordered collection of per-candidate failures.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<IgdError>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: IgdError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IgdError> {
        self.0.iter()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.0.iter().map(IgdError::kind).collect()
    }

    pub fn into_inner(self) -> Vec<IgdError> {
        self.0
    }
}

impl From<Vec<IgdError>> for ErrorList {
    fn from(errors: Vec<IgdError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ErrorList {
    type Item = IgdError;
    type IntoIter = std::vec::IntoIter<IgdError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no error recorded");
        }
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
