//! RTSP 1.0 request/response framing for the WFD dialect.
//!
//! The WFD control channel is bidirectional: the source sends requests to
//! the sink and the sink sends requests back on the same connection, so
//! both shapes must parse from either direction. Header order is
//! preserved; the M1 OPTIONS request in particular must serialize
//! byte-for-byte as `OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nRequire:
//! org.wfa.wfd1.0\r\n\r\n`.

use bytes::Bytes;

use crate::error::{Result, WfdError};

/// The RTSP version token used on every request and status line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// The WFD feature token carried in Require/Public headers.
pub const WFD_FEATURE: &str = "org.wfa.wfd1.0";

/// RTSP methods used by the WFD negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Capability probe / liveness
    Options,
    /// Transport setup, sink-initiated
    Setup,
    /// Start streaming, sink-initiated
    Play,
    /// Pause streaming, sink-initiated
    Pause,
    /// End the session, sink-initiated
    Teardown,
    /// Parameter query (M3, M16)
    GetParameter,
    /// Parameter commit / trigger (M4, M5)
    SetParameter,
}

impl Method {
    /// The method token as it appears on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
            Method::GetParameter => "GET_PARAMETER",
            Method::SetParameter => "SET_PARAMETER",
        }
    }

    /// Parses a method token.
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "OPTIONS" => Some(Method::Options),
            "SETUP" => Some(Method::Setup),
            "PLAY" => Some(Method::Play),
            "PAUSE" => Some(Method::Pause),
            "TEARDOWN" => Some(Method::Teardown),
            "GET_PARAMETER" => Some(Method::GetParameter),
            "SET_PARAMETER" => Some(Method::SetParameter),
            _ => None,
        }
    }
}

/// Reason phrase for the status codes this server emits.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        455 => "Method Not Valid in This State",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// An RTSP request with ordered headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The request method
    pub method: Method,
    /// The request URI (`*` for OPTIONS)
    pub uri: String,
    /// Headers in emission order
    pub headers: Vec<(String, String)>,
    /// The message body, empty unless Content-Length was set
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Appends a header, preserving insertion order.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the body and the matching Content-Length header.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.headers
            .push(("Content-Length".to_string(), self.body.len().to_string()));
        self
    }

    /// Looks up the first header with the given name, case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// The CSeq header value, when present and numeric.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.trim().parse().ok())
    }

    /// Serializes the request for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method.as_str(), self.uri, RTSP_VERSION)
            .into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// An RTSP response with ordered headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Numeric status code
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Headers in emission order
    pub headers: Vec<(String, String)>,
    /// The message body, empty unless Content-Length was set
    pub body: Bytes,
}

impl Response {
    /// Creates a response with the canonical reason phrase, echoing the
    /// request's CSeq when present.
    pub fn for_request(status: u16, request: &Request) -> Self {
        let mut resp = Self {
            status,
            reason: status_text(status).to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        };
        if let Some(cseq) = request.get_header("CSeq") {
            resp.headers.push(("CSeq".to_string(), cseq.to_string()));
        }
        resp
    }

    /// Appends a header, preserving insertion order.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the body and the matching Content-Length header.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.headers
            .push(("Content-Length".to_string(), self.body.len().to_string()));
        self
    }

    /// Looks up the first header with the given name, case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// The CSeq header value, when present and numeric.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.trim().parse().ok())
    }

    /// Whether the status is in the 2xx class.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Serializes the response for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", RTSP_VERSION, self.status, self.reason).into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Either shape of RTSP traffic on a WFD connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RtspMessage {
    /// A request, from either end
    Request(Request),
    /// A response, from either end
    Response(Response),
}

fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parses one complete RTSP message (head plus body).
///
/// The caller is responsible for framing: `data` must contain the full
/// head and exactly `Content-Length` body bytes after the blank line.
pub fn parse_message(data: &[u8]) -> Result<RtspMessage> {
    let head_end = find_head_end(data)
        .ok_or_else(|| WfdError::Transport("no header/body boundary found".into()))?;

    let head = std::str::from_utf8(&data[..head_end])
        .map_err(|_| WfdError::Transport("non-ASCII message head".into()))?;
    let body = Bytes::copy_from_slice(&data[head_end + 4..]);

    let mut lines = head.split("\r\n");
    let start_line = lines
        .next()
        .ok_or_else(|| WfdError::Transport("empty message".into()))?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WfdError::Transport(format!("bad header line {:?}", line)))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    if let Some(rest) = start_line.strip_prefix(RTSP_VERSION) {
        let mut parts = rest.trim_start().splitn(2, ' ');
        let status = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| WfdError::Transport("bad status line".into()))?;
        let reason = parts.next().unwrap_or("").to_string();
        return Ok(RtspMessage::Response(Response {
            status,
            reason,
            headers,
            body,
        }));
    }

    let mut parts = start_line.split_whitespace();
    let method = parts
        .next()
        .and_then(Method::from_token)
        .ok_or_else(|| WfdError::Transport(format!("bad request line {:?}", start_line)))?;
    let uri = parts
        .next()
        .ok_or_else(|| WfdError::Transport("request line missing URI".into()))?
        .to_string();

    Ok(RtspMessage::Request(Request {
        method,
        uri,
        headers,
        body,
    }))
}

/// Offset of the `\r\n\r\n` separating head from body, if present.
pub fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Content-Length of a buffered head, defaulting to 0 when absent.
pub fn content_length(head: &[u8]) -> usize {
    let text = String::from_utf8_lossy(head);
    for line in text.lines() {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().unwrap_or(0);
            }
        }
    }
    0
}
