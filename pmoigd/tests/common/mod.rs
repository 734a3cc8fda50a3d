#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const WANIP: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    method: &'static str,
    path: String,
    action: Option<String>,
    status: u16,
    body: String,
}

impl Route {
    pub fn get(path: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: "GET",
            path: path.to_string(),
            action: None,
            status,
            body: body.into(),
        }
    }

    /// A POST to `path` whose SOAPAction names `action`.
    pub fn action(path: &str, action: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: "POST",
            path: path.to_string(),
            action: Some(action.to_string()),
            status,
            body: body.into(),
        }
    }

    fn matches(&self, request: &Recorded) -> bool {
        if self.method != request.method || self.path != request.path {
            return false;
        }
        match &self.action {
            Some(action) => request
                .header("soapaction")
                .is_some_and(|v| v.trim_matches('"').ends_with(&format!("#{}", action))),
            None => true,
        }
    }
}

/// Minimal HTTP/1.1 server answering canned responses, one request per
/// connection.
pub struct FakeGateway {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeGateway {
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake gateway");
        let addr = listener.local_addr().expect("fake gateway address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = serve(stream, &routes, &log);
            }
        });

        Self { addr, requests }
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

fn serve(
    stream: TcpStream,
    routes: &[Route],
    log: &Mutex<Vec<Recorded>>,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let Some(request) = read_request(&mut reader)? else {
        return Ok(());
    };

    let (status, body) = routes
        .iter()
        .find(|route| route.matches(&request))
        .map(|route| (route.status, route.body.clone()))
        .unwrap_or((404, "not found".to_string()));

    log.lock().expect("request log").push(request);
    write_response(stream, status, &body, "close")
}

/// Reads one request; `None` once the peer closed the connection.
fn read_request(reader: &mut impl BufRead) -> std::io::Result<Option<Recorded>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let body = if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        read_chunked(reader)?
    } else {
        let len = header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        String::from_utf8_lossy(&buf).into_owned()
    };

    Ok(Some(Recorded {
        method,
        path,
        headers,
        body,
    }))
}

fn write_response(
    mut stream: impl Write,
    status: u16,
    body: &str,
    connection: &str,
) -> std::io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: text/xml; charset=\"utf-8\"\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        connection,
        body
    )?;
    stream.flush()
}

/// HTTP/1.1 server that leaves every connection open and answers any number
/// of requests on it with the same `200` body. Counts accepted connections.
pub struct KeepAliveGateway {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl KeepAliveGateway {
    pub fn start(body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind keep-alive gateway");
        let addr = listener.local_addr().expect("keep-alive gateway address");
        let connections = Arc::new(AtomicUsize::new(0));
        let body = body.into();

        let counter = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let body = body.clone();
                thread::spawn(move || {
                    let _ = serve_keep_alive(stream, &body);
                });
            }
        });

        Self { addr, connections }
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve_keep_alive(stream: TcpStream, body: &str) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    while read_request(&mut reader)?.is_some() {
        write_response(&stream, 200, body, "keep-alive")?;
    }
    Ok(())
}

fn read_chunked(reader: &mut impl BufRead) -> std::io::Result<String> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line)?;
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
        if size == 0 {
            let mut trailer = String::new();
            reader.read_line(&mut trailer)?;
            break;
        }
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk)?;
        chunk.truncate(size);
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Loopback stand-in for the multicast group: waits for one M-SEARCH and
/// answers it with `datagrams`, in order. Joins to the probe text.
pub fn ssdp_responder(datagrams: Vec<String>) -> (SocketAddr, JoinHandle<String>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind ssdp responder");
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("responder timeout");
    let addr = socket.local_addr().expect("responder address");

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let Ok((n, from)) = socket.recv_from(&mut buf) else {
            return String::new();
        };
        for datagram in &datagrams {
            let _ = socket.send_to(datagram.as_bytes(), from);
        }
        String::from_utf8_lossy(&buf[..n]).into_owned()
    });

    (addr, handle)
}

pub fn ssdp_ok(location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=120\r\n\
         ST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
         USN: uuid:igd-root::urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
         EXT:\r\n\
         SERVER: Linux/5.4 UPnP/1.1 MiniUPnPd/2.2\r\n\
         LOCATION: {}\r\n\
         \r\n",
        location
    )
}

/// IGD root device offering Layer3Forwarding, with WANIPConnection two levels
/// down (WANDevice > WANConnectionDevice).
pub fn root_description(url_base: Option<&str>) -> String {
    let url_base = url_base
        .map(|base| format!("<URLBase>{}</URLBase>", base))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  {url_base}
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <friendlyName>Fake Router</friendlyName>
    <UDN>uuid:igd-root</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:L3Forwarding1</serviceId>
        <controlURL>/ctl/L3F</controlURL>
        <eventSubURL>/evt/L3F</eventSubURL>
        <SCPDURL>/L3F.xml</SCPDURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:WANDevice:1</deviceType>
        <UDN>uuid:wan-device</UDN>
        <deviceList>
          <device>
            <deviceType>urn:schemas-upnp-org:device:WANConnectionDevice:1</deviceType>
            <UDN>uuid:wan-connection</UDN>
            <serviceList>
              <service>
                <serviceType>{wanip}</serviceType>
                <serviceId>urn:upnp-org:serviceId:WANIPConn1</serviceId>
                <controlURL>/ctl/IPConn</controlURL>
                <eventSubURL>/evt/IPConn</eventSubURL>
                <SCPDURL>/WANIPCn.xml</SCPDURL>
              </service>
            </serviceList>
          </device>
        </deviceList>
      </device>
    </deviceList>
  </device>
</root>"#,
        url_base = url_base,
        wanip = WANIP,
    )
}

pub const L3F_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>SetDefaultConnectionService</name></action>
    <action><name>GetDefaultConnectionService</name></action>
  </actionList>
</scpd>"#;

pub const WANIP_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>AddPortMapping</name>
      <argumentList>
        <argument>
          <name>NewExternalPort</name>
          <direction>in</direction>
          <relatedStateVariable>ExternalPort</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action><name>DeletePortMapping</name></action>
    <action><name>GetExternalIPAddress</name></action>
  </actionList>
</scpd>"#;

/// Routes of a complete gateway serving its description at `/rootDesc.xml`.
pub fn gateway_routes(url_base: Option<&str>) -> Vec<Route> {
    vec![
        Route::get("/rootDesc.xml", 200, root_description(url_base)),
        Route::get("/L3F.xml", 200, L3F_SCPD),
        Route::get("/WANIPCn.xml", 200, WANIP_SCPD),
    ]
}
