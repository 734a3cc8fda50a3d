//! Service Control Protocol Description (SCPD) parsing.
//!
//! Only the action list matters to us: a service is accepted as a
//! port-mapping service when it advertises at least one of
//! [`REQUIRED_ACTIONS`].

use std::mem;

use quick_xml::{Reader, events::Event};

use crate::description::resolve_reference;
use crate::errors::IgdError;

pub const ADD_PORT_MAPPING: &str = "AddPortMapping";
pub const DELETE_PORT_MAPPING: &str = "DeletePortMapping";
pub const GET_EXTERNAL_IP_ADDRESS: &str = "GetExternalIPAddress";

pub const REQUIRED_ACTIONS: [&str; 3] =
    [ADD_PORT_MAPPING, DELETE_PORT_MAPPING, GET_EXTERNAL_IP_ADDRESS];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescription {
    pub actions: Vec<ActionDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionDescription {
    pub name: String,
    pub arguments: Vec<ArgumentDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentDescription {
    pub name: String,
    pub direction: String,
    pub related_state_variable: String,
}

impl ServiceDescription {
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a.name == name)
    }

    /// True when at least one required port-mapping action is advertised.
    pub fn supports_port_mapping(&self) -> bool {
        REQUIRED_ACTIONS.iter().any(|name| self.has_action(name))
    }
}

/// Parses an `<scpd>` document. XML errors and a foreign root element are
/// reported, unlike the device description which is decoded best-effort.
pub fn parse_scpd(xml: &str, origin: &str) -> Result<ServiceDescription, IgdError> {
    let mut reader = Reader::from_str(xml);

    let mut description = ServiceDescription::default();
    let mut action: Option<ActionDescription> = None;
    let mut argument: Option<ArgumentDescription> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            IgdError::malformed(origin, format!("invalid SCPD XML: {}", e))
        })?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if !seen_root {
                    check_root(&name, origin)?;
                    seen_root = true;
                }
                let parent = path.last().map(String::as_str);
                match (parent, name.as_str()) {
                    (Some("actionList"), "action") => action = Some(ActionDescription::default()),
                    (Some("argumentList"), "argument") => {
                        argument = Some(ArgumentDescription::default())
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if !seen_root {
                    check_root(&name, origin)?;
                    seen_root = true;
                }
            }
            Event::Text(e) => {
                if let Ok(t) = e.decode() {
                    text.push_str(&t);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(resolved) = resolve_reference(&e) {
                    text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let value = mem::take(&mut text).trim().to_string();
                let parent = path.len().checked_sub(2).and_then(|i| path.get(i));

                match (parent.map(String::as_str), name.as_str()) {
                    (Some("actionList"), "action") => {
                        if let Some(a) = action.take() {
                            description.actions.push(a);
                        }
                    }
                    (Some("argumentList"), "argument") => {
                        if let (Some(arg), Some(a)) = (argument.take(), action.as_mut()) {
                            a.arguments.push(arg);
                        }
                    }
                    (Some("action"), "name") => {
                        if let Some(a) = action.as_mut() {
                            a.name = value;
                        }
                    }
                    (Some("argument"), field) => {
                        if let Some(arg) = argument.as_mut() {
                            match field {
                                "name" => arg.name = value,
                                "direction" => arg.direction = value,
                                "relatedStateVariable" => arg.related_state_variable = value,
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(IgdError::decode(
            format!("service description from {}", origin),
            "empty document",
        ));
    }
    Ok(description)
}

fn check_root(name: &str, origin: &str) -> Result<(), IgdError> {
    if name == "scpd" {
        return Ok(());
    }
    Err(IgdError::decode(
        format!("service description from {}", origin),
        format!("expected <scpd>, found <{}>", name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const WANIP_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>AddPortMapping</name>
      <argumentList>
        <argument>
          <name>NewRemoteHost</name>
          <direction>in</direction>
          <relatedStateVariable>RemoteHost</relatedStateVariable>
        </argument>
        <argument>
          <name>NewExternalPort</name>
          <direction>in</direction>
          <relatedStateVariable>ExternalPort</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>GetExternalIPAddress</name>
      <argumentList>
        <argument>
          <name>NewExternalIPAddress</name>
          <direction>out</direction>
          <relatedStateVariable>ExternalIPAddress</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable><name>RemoteHost</name></stateVariable>
  </serviceStateTable>
</scpd>"#;

    #[test]
    fn parses_actions_and_arguments() {
        let desc = parse_scpd(WANIP_SCPD, "test").unwrap();
        let names: Vec<&str> = desc.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["AddPortMapping", "GetExternalIPAddress"]);

        let add = &desc.actions[0];
        assert_eq!(add.arguments.len(), 2);
        assert_eq!(add.arguments[1].name, "NewExternalPort");
        assert_eq!(add.arguments[1].direction, "in");
        assert_eq!(add.arguments[1].related_state_variable, "ExternalPort");

        assert!(desc.supports_port_mapping());
        assert!(!desc.has_action("RemoteHost"));
    }

    #[test]
    fn one_required_action_is_enough() {
        let xml = "<scpd><actionList><action><name>DeletePortMapping</name></action></actionList></scpd>";
        assert!(parse_scpd(xml, "test").unwrap().supports_port_mapping());
    }

    #[test]
    fn unrelated_service_is_not_port_mapping() {
        let xml = "<scpd><actionList><action><name>GetCommonLinkProperties</name></action></actionList></scpd>";
        let desc = parse_scpd(xml, "test").unwrap();
        assert_eq!(desc.actions.len(), 1);
        assert!(!desc.supports_port_mapping());
    }

    #[test]
    fn foreign_root_is_a_decode_error() {
        let err = parse_scpd("<html><body>login</body></html>", "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolDecode);
    }

    #[test]
    fn broken_xml_is_malformed() {
        let err = parse_scpd("<scpd><actionList></scpd>", "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn empty_body_is_a_decode_error() {
        let err = parse_scpd("", "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolDecode);
    }
}
