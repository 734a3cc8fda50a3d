//! Parser SOAP pour les réponses des passerelles

use std::io::BufReader;

use xmltree::{Element, XMLNode};

use super::{SoapBody, SoapEnvelope, SoapHeader};
use crate::errors::UpnpError;

/// Erreur de parsing SOAP
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,
}

/// Parse une enveloppe SOAP complète
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let root = Element::parse(BufReader::new(xml))?;

    if !root.name.ends_with("Envelope") {
        return Err(SoapParseError::MissingEnvelope);
    }

    let header = find_child_with_suffix(&root, "Header").map(|e| SoapHeader { content: e.clone() });

    let body = find_child_with_suffix(&root, "Body")
        .map(|e| SoapBody { content: e.clone() })
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope { header, body })
}

/// The `<{action}Response>` element of the body, if the gateway sent one.
pub fn find_action_response<'a>(envelope: &'a SoapEnvelope, action: &str) -> Option<&'a Element> {
    find_child_with_suffix(&envelope.body.content, &format!("{}Response", action))
}

/// Extracts `<UPnPError>` from a `<Fault>` body, when present.
pub fn parse_upnp_error(envelope: &SoapEnvelope) -> Option<UpnpError> {
    let fault = find_child_with_suffix(&envelope.body.content, "Fault")?;
    let detail = find_child_with_suffix(fault, "detail")?;
    let upnp_error = find_child_with_suffix(detail, "UPnPError")?;

    let error_code = child_text(upnp_error, "errorCode")?.parse::<u32>().ok()?;
    let error_description = child_text(upnp_error, "errorDescription").unwrap_or_default();

    Some(UpnpError {
        error_code,
        error_description,
    })
}

pub fn find_child_with_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}

/// Trimmed text of a child element; `None` if the child is absent.
pub fn child_text(parent: &Element, suffix: &str) -> Option<String> {
    let child = find_child_with_suffix(parent, suffix)?;
    Some(
        child
            .get_text()
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
    )
}
