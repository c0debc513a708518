//! Buffered response capture.
//!
//! The downstream handler gets a [`ResponseWriter`] instead of the real
//! sink. Everything it does lands in a [`Capture`]; nothing reaches the
//! client until the supervisor flushes.

use axum::http::header::{self, HeaderName, HeaderValue, IntoHeaderName};
use axum::http::{HeaderMap, StatusCode};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::capture::sink::ResponseSink;

/// Buffered state of one response.
#[derive(Debug)]
pub struct Capture {
    headers: HeaderMap,
    body: BytesMut,
    status: Option<StatusCode>,
    bytes_written: u64,
    error_message: String,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    started: Instant,
    elapsed: Duration,
    flushed: bool,
}

impl Capture {
    pub fn new(begin: DateTime<Utc>) -> Self {
        Self::admitted(begin, Instant::now())
    }

    /// Capture for a request admitted at wall time `begin` and monotonic
    /// time `started`. Durations are measured from `started`.
    pub fn admitted(begin: DateTime<Utc>, started: Instant) -> Self {
        Self {
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            status: None,
            bytes_written: 0,
            error_message: String::new(),
            begin,
            end: begin,
            started,
            elapsed: Duration::ZERO,
            flushed: false,
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Buffer body bytes. The first write without a status commits 200.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Set the status. Only the first status sticks, whether it came from
    /// here or from an implicit 200 on first write.
    pub fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(current) => {
                tracing::debug!(
                    current = current.as_u16(),
                    ignored = status.as_u16(),
                    "Superfluous status write ignored"
                );
            }
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Status as it will be (or was) sent: 200 when never set.
    pub fn resolved_status(&self) -> u16 {
        self.status.map_or(200, |s| s.as_u16())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Time from admission to resolution, on the monotonic clock.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Mark the request resolved at wall time `end`. The elapsed time comes
    /// from the monotonic clock, so wall-clock steps cannot make it negative.
    pub fn finish(&mut self, end: DateTime<Utc>) {
        self.end = end;
        self.elapsed = self.started.elapsed();
    }

    /// Set the end time explicitly. Elapsed is the wall-clock difference,
    /// clamped at zero.
    pub fn set_end(&mut self, end: DateTime<Utc>) {
        self.end = end;
        self.elapsed = (end - self.begin).to_std().unwrap_or_default();
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Copy headers, status and body into the real sink, once.
    ///
    /// A failed body write replaces the terminal status with 500 and records
    /// the I/O error as the message, since the client never got the response
    /// the handler intended. A second call is a no-op.
    pub fn flush<S: ResponseSink + ?Sized>(&mut self, sink: &mut S) -> io::Result<u64> {
        if self.flushed {
            return Ok(self.bytes_written);
        }
        self.flushed = true;

        let target = sink.headers_mut();
        for (name, value) in self.headers.iter() {
            target.append(name.clone(), value.clone());
        }

        let status = self.status.unwrap_or(StatusCode::OK);
        self.status = Some(status);
        sink.write_status(status);

        match sink.write_body(&self.body) {
            Ok(n) => {
                self.bytes_written = n as u64;
                Ok(self.bytes_written)
            }
            Err(err) => {
                self.error_message = err.to_string();
                self.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
                Err(err)
            }
        }
    }

    /// Write an error response straight to the sink, skipping the buffer,
    /// and record the status and message for logging. Counts as the flush.
    pub fn error_through<S: ResponseSink + ?Sized>(
        &mut self,
        sink: &mut S,
        message: &str,
        status: StatusCode,
    ) -> io::Result<u64> {
        if self.flushed {
            return Ok(self.bytes_written);
        }
        self.flushed = true;
        self.error_message = message.to_string();
        self.status = Some(status);

        set_error_headers(sink.headers_mut());
        sink.write_status(status);

        match sink.write_body(error_body(message, status).as_bytes()) {
            Ok(n) => {
                self.bytes_written = n as u64;
                Ok(self.bytes_written)
            }
            Err(err) => {
                self.error_message = err.to_string();
                self.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
                Err(err)
            }
        }
    }

    /// Record a terminal error without touching any sink. Used when a panic
    /// is about to be re-raised and the client gets nothing from us.
    pub fn fail(&mut self, message: &str, status: StatusCode) {
        self.flushed = true;
        self.error_message = message.to_string();
        self.status = Some(status);
    }
}

/// Handle the downstream handler writes its response through.
///
/// Clones share one [`Capture`]. The supervisor keeps its own reference; if
/// it abandons the request it stops looking at this capture, and whatever
/// the handler writes afterwards is dropped with the last clone.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    capture: Arc<Mutex<Capture>>,
}

impl ResponseWriter {
    pub fn new(capture: Capture) -> Self {
        Self {
            capture: Arc::new(Mutex::new(capture)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Capture> {
        // A panic while holding this lock can only come from the handler's
        // own task, and the capture is still structurally valid.
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the pending header map.
    pub fn with_headers<R>(&self, f: impl FnOnce(&mut HeaderMap) -> R) -> R {
        f(self.lock().headers_mut())
    }

    pub fn insert_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.lock().headers_mut().insert(name, value);
    }

    pub fn append_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.lock().headers_mut().append(name, value);
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.lock().headers().get(name).cloned()
    }

    /// Buffer body bytes; commits status 200 if none was set.
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.lock().write(bytes)
    }

    pub fn write_status(&self, status: StatusCode) {
        self.lock().write_status(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status()
    }

    /// Move the capture out, leaving an empty one behind for any clone the
    /// handler still holds.
    pub(crate) fn take(&self) -> Capture {
        let mut capture = self.lock();
        let fresh = Capture::admitted(capture.begin(), capture.started());
        std::mem::replace(&mut *capture, fresh)
    }
}

/// Body text of an error response: `"<code> <reason>[: <text>]\n"`.
pub fn error_body(text: &str, status: StatusCode) -> String {
    let mut body = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    if !text.is_empty() {
        body.push_str(": ");
        body.push_str(text);
    }
    body.push('\n');
    body
}

fn set_error_headers(headers: &mut HeaderMap) {
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
}

/// Emit an error response through a handler's writer.
///
/// Handlers call this for expected failures; the supervisor treats the
/// result as ordinary output and logs it at the given status.
///
/// ```
/// use axum::http::StatusCode;
/// use chrono::Utc;
/// use request_supervisor::capture::{write_error, Capture, ResponseWriter};
///
/// let writer = ResponseWriter::new(Capture::new(Utc::now()));
/// write_error(&writer, "GET", StatusCode::METHOD_NOT_ALLOWED);
/// assert_eq!(writer.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
/// ```
pub fn write_error(writer: &ResponseWriter, text: &str, status: StatusCode) {
    let mut capture = writer.lock();
    set_error_headers(capture.headers_mut());
    capture.write_status(status);
    capture.write(error_body(text, status).as_bytes());
}
