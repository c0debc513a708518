//! The real response sink a capture is flushed into.

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::BytesMut;
use std::io;

/// Destination for a flushed response: headers, then one status, then body.
pub trait ResponseSink: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_status(&mut self, status: StatusCode);

    /// Append body bytes, returning how many were accepted.
    fn write_body(&mut self, body: &[u8]) -> io::Result<usize>;
}

/// In-memory sink. The tower service turns it into the axum response; tests
/// use it to see exactly what a client would have received.
///
/// Writes into it cannot fail. Behind the tower service, `bytes` counts what
/// was handed to the server, and a transmission failure after that point is
/// seen by the server, not by the supervisor. Sinks that write to the
/// network directly get the flush-error handling: 500 and the I/O error in
/// the log line.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: BytesMut,
    status_writes: usize,
    body_writes: usize,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written, or 200 when the response was never started.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Number of times a status line was written. More than one means the
    /// response was started twice.
    pub fn status_writes(&self) -> usize {
        self.status_writes
    }

    pub fn body_writes(&self) -> usize {
        self.body_writes
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status_writes += 1;
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<usize> {
        self.body_writes += 1;
        self.body.extend_from_slice(body);
        Ok(body.len())
    }
}
