//! Field emitters for access-log lines.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::capture::Capture;
use crate::http::RequestSnapshot;

const APACHE_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Placeholder for a request header the client did not send.
pub const MISSING_HEADER: &str = "-";

/// A built-in log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Begin,
    BeginEpoch,
    BeginIso8601,
    End,
    EndEpoch,
    EndIso8601,
    Duration,
    Bytes,
    Status,
    StatusText,
    Client,
    ClientIp,
    ClientPort,
    Method,
    Uri,
    Proto,
    Error,
}

impl Field {
    /// Look up a built-in token name.
    pub fn from_token(token: &str) -> Option<Self> {
        let field = match token {
            "begin" => Field::Begin,
            "begin-epoch" => Field::BeginEpoch,
            "begin-iso8601" => Field::BeginIso8601,
            "end" => Field::End,
            "end-epoch" => Field::EndEpoch,
            "end-iso8601" => Field::EndIso8601,
            "duration" => Field::Duration,
            "bytes" => Field::Bytes,
            "status" => Field::Status,
            "status-text" => Field::StatusText,
            "client" => Field::Client,
            "client-ip" => Field::ClientIp,
            "client-port" => Field::ClientPort,
            "method" => Field::Method,
            "uri" => Field::Uri,
            "proto" => Field::Proto,
            "error" => Field::Error,
            _ => return None,
        };
        Some(field)
    }

    fn emit(self, capture: &Capture, request: &RequestSnapshot, out: &mut Vec<u8>) {
        match self {
            Field::Begin => push_apache_time(capture.begin(), out),
            Field::BeginEpoch => push_display(capture.begin().timestamp(), out),
            Field::BeginIso8601 => push_iso8601(capture.begin(), out),
            Field::End => push_apache_time(capture.end(), out),
            Field::EndEpoch => push_display(capture.end().timestamp(), out),
            Field::EndIso8601 => push_iso8601(capture.end(), out),
            Field::Duration => {
                // microsecond precision
                let seconds = capture.elapsed().as_secs_f64();
                out.extend_from_slice(format!("{:.6}", seconds).as_bytes());
            }
            Field::Bytes => push_display(capture.bytes_written(), out),
            Field::Status => push_display(capture.resolved_status(), out),
            Field::StatusText => {
                let reason = axum::http::StatusCode::from_u16(capture.resolved_status())
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("");
                out.extend_from_slice(reason.as_bytes());
            }
            Field::Client => out.extend_from_slice(request.remote_addr().as_bytes()),
            Field::ClientIp => out.extend_from_slice(client_ip(request.remote_addr()).as_bytes()),
            Field::ClientPort => {
                out.extend_from_slice(client_port(request.remote_addr()).as_bytes())
            }
            Field::Method => out.extend_from_slice(request.method().as_bytes()),
            Field::Uri => out.extend_from_slice(request.uri().as_bytes()),
            Field::Proto => out.extend_from_slice(request.proto().as_bytes()),
            Field::Error => out.extend_from_slice(capture.error_message().as_bytes()),
        }
    }
}

/// One step of a compiled log format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitter {
    Literal(String),
    Field(Field),
    /// Value of the named request header, taken from the admission snapshot.
    Header(String),
}

impl Emitter {
    pub fn emit(&self, capture: &Capture, request: &RequestSnapshot, out: &mut Vec<u8>) {
        match self {
            Emitter::Literal(text) => out.extend_from_slice(text.as_bytes()),
            Emitter::Field(field) => field.emit(capture, request, out),
            Emitter::Header(name) => {
                let value = request.header(name).unwrap_or(MISSING_HEADER);
                out.extend_from_slice(value.as_bytes());
            }
        }
    }
}

fn push_display(value: impl std::fmt::Display, out: &mut Vec<u8>) {
    out.extend_from_slice(value.to_string().as_bytes());
}

fn push_apache_time(at: DateTime<Utc>, out: &mut Vec<u8>) {
    push_display(at.format(APACHE_TIME_FORMAT), out);
}

fn push_iso8601(at: DateTime<Utc>, out: &mut Vec<u8>) {
    out.extend_from_slice(at.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes());
}

/// `"1.2.3.4:80"` → `"1.2.3.4"`, `"[::1]:80"` → `"::1"`.
fn client_ip(remote: &str) -> &str {
    let host = match remote.rfind(':') {
        Some(colon) => &remote[..colon],
        None => remote,
    };
    if host.len() > 2 && host.starts_with('[') && host.ends_with(']') {
        &host[1..host.len() - 1]
    } else {
        host
    }
}

fn client_port(remote: &str) -> &str {
    match remote.rfind(':') {
        Some(colon) => &remote[colon + 1..],
        None => remote,
    }
}
