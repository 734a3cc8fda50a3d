//! Construction des enveloppes SOAP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::envelope::{SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS};

fn build_soap_envelope_with_body(body_child: Element) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(body_child));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING_STYLE.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn action_element(name: &str, service_urn: &str, values: &[(&str, &str)]) -> Element {
    let mut elem = Element::new(name);
    elem.attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (key, value) in values {
        let mut child = Element::new(key);
        if !value.is_empty() {
            child.children.push(XMLNode::Text((*value).to_string()));
        }
        elem.children.push(XMLNode::Element(child));
    }
    elem
}

/// Builds the SOAP request for `action`, its element namespaced under
/// `service_urn` (ex: "urn:schemas-upnp-org:service:WANIPConnection:1").
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let request = action_element(&format!("u:{}", action), service_urn, args);
    build_soap_envelope_with_body(request)
}

/// Builds a `<u:{action}Response>` envelope, as a gateway would answer.
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let response = action_element(&format!("u:{}Response", action), service_urn, values);
    build_soap_envelope_with_body(response)
}
