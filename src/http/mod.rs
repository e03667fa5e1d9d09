//! Just enough HTTP/1.1 for the control API: one request per connection,
//! bodies framed by Content-Length.

mod routes;
mod server;

use serde::Serialize;
use std::io::{self, BufRead, Read, Write};

pub use routes::handle;
pub use server::HttpServer;

/// Largest request body accepted (1 MiB)
pub const MAX_BODY_SIZE: usize = 1 << 20;
const MAX_HEAD_SIZE: usize = 8 * 1024;

pub type StatusCode = u16;

pub const OK: StatusCode = 200;
pub const BAD_REQUEST: StatusCode = 400;
pub const NOT_FOUND: StatusCode = 404;
pub const METHOD_NOT_ALLOWED: StatusCode = 405;
pub const LENGTH_REQUIRED: StatusCode = 411;
pub const PAYLOAD_TOO_LARGE: StatusCode = 413;
pub const UNPROCESSABLE_ENTITY: StatusCode = 422;
pub const INTERNAL_SERVER_ERROR: StatusCode = 500;
pub const SERVICE_UNAVAILABLE: StatusCode = 503;

fn reason_phrase(code: StatusCode) -> &'static str {
    match code {
        OK => "OK",
        BAD_REQUEST => "Bad Request",
        NOT_FOUND => "Not Found",
        METHOD_NOT_ALLOWED => "Method Not Allowed",
        LENGTH_REQUIRED => "Length Required",
        PAYLOAD_TOO_LARGE => "Payload Too Large",
        UNPROCESSABLE_ENTITY => "Unprocessable Entity",
        INTERNAL_SERVER_ERROR => "Internal Server Error",
        SERVICE_UNAVAILABLE => "Service Unavailable",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("connection closed before a request arrived")]
    Closed,

    #[error("malformed request: {0}")]
    Malformed(&'static str),

    #[error("request head exceeds {limit} bytes", limit = MAX_HEAD_SIZE)]
    HeadTooLarge,

    #[error("request body of {0} bytes exceeds {limit} bytes", limit = MAX_BODY_SIZE)]
    BodyTooLarge(usize),

    #[error("request body needs a Content-Length")]
    LengthRequired,

    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

impl HttpError {
    /// Status to answer with, if the client is still worth answering
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Closed | HttpError::Io(_) => None,
            HttpError::Malformed(_) | HttpError::HeadTooLarge => Some(BAD_REQUEST),
            HttpError::BodyTooLarge(_) => Some(PAYLOAD_TOO_LARGE),
            HttpError::LengthRequired => Some(LENGTH_REQUIRED),
        }
    }
}

/// Read one request: request line, headers, and a Content-Length body. A
/// client that sent `Expect: 100-continue` is told to go ahead on `interim`
/// once the body is known to fit.
pub fn read_request<R: BufRead, W: Write>(reader: &mut R, interim: &mut W) -> Result<Request, HttpError> {
    let mut head_size = 0;
    let mut line = String::new();

    let request_line = match read_line(reader, &mut line, &mut head_size)? {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => return Err(HttpError::Closed),
    };

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => return Err(HttpError::Malformed("bad request line")),
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed("unsupported HTTP version"));
    }
    let method = Method::parse(method);
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut content_length = None;
    let mut chunked = false;
    let mut expect_continue = false;
    loop {
        let header = match read_line(reader, &mut line, &mut head_size)? {
            Some(h) => h,
            None => return Err(HttpError::Malformed("headers cut short")),
        };
        if header.is_empty() {
            break;
        }

        let (name, value) = header
            .split_once(':')
            .ok_or(HttpError::Malformed("bad header line"))?;
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            let len = value
                .parse::<usize>()
                .map_err(|_| HttpError::Malformed("bad Content-Length"))?;
            content_length = Some(len);
        } else if name.eq_ignore_ascii_case("transfer-encoding") && value.eq_ignore_ascii_case("chunked") {
            chunked = true;
        } else if name.eq_ignore_ascii_case("expect") && value.eq_ignore_ascii_case("100-continue") {
            expect_continue = true;
        }
    }

    let body = match content_length {
        Some(len) if len > MAX_BODY_SIZE => return Err(HttpError::BodyTooLarge(len)),
        Some(len) => {
            if expect_continue {
                interim.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
                interim.flush()?;
            }
            let mut body = vec![0; len];
            reader.read_exact(&mut body)?;
            body
        }
        None if chunked || method == Method::Post => return Err(HttpError::LengthRequired),
        None => Vec::new(),
    };

    Ok(Request { method, path, body })
}

/// Next CRLF (or LF) terminated line with the terminator stripped, `None` at
/// end of stream
fn read_line<'a, R: BufRead>(
    reader: &mut R,
    line: &'a mut String,
    head_size: &mut usize,
) -> Result<Option<&'a str>, HttpError> {
    line.clear();

    let remaining = (MAX_HEAD_SIZE - *head_size) as u64;
    let n = reader.by_ref().take(remaining + 1).read_line(line).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => HttpError::Malformed("request head is not UTF-8"),
        _ => HttpError::Io(e),
    })?;
    if n == 0 {
        return Ok(None);
    }

    *head_size += n;
    if *head_size > MAX_HEAD_SIZE {
        return Err(HttpError::HeadTooLarge);
    }
    if !line.ends_with('\n') {
        return Ok(None);
    }

    Ok(Some(line.trim_end_matches(['\r', '\n'])))
}

#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl Response {
    pub fn empty(status: StatusCode) -> Self {
        Response { status, body: Vec::new() }
    }

    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Response { status, body },
            Err(e) => {
                log::error!("Failed to encode response: {}", e);
                Response::empty(INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// `{"error": message}`
    pub fn error(status: StatusCode, message: &str) -> Self {
        Response::json(status, &ErrorBody { error: message })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        if !self.body.is_empty() {
            head.push_str("Content-Type: application/json; charset=UTF-8\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", self.body.len()));

        out.write_all(head.as_bytes())?;
        out.write_all(&self.body)?;
        out.flush()
    }
}
