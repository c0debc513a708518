//! Request lifecycle supervisor.
//!
//! # Data Flow
//! ```text
//! Admitted: begin time, request snapshot, escrow, cancel signal
//!     → Racing: handler spawned on its own task, writing into a Capture
//!     → race.rs: completion | panic | deadline/disconnect (first wins)
//!     → Resolved:
//!         Completed → flush capture
//!         Panicked  → 500 error response, or re-raise after bookkeeping
//!         Cancelled → fresh capture, 503 error response
//!     → Flushed: counters, metrics, callback, access log
//! ```
//!
//! # Design Decisions
//! - The capture is shared with the handler through an `Arc`. On
//!   cancellation the supervisor switches to a new capture the handler has
//!   never seen, so late writes from an abandoned handler are inert
//! - The real sink is touched exactly once, by flush or by the error path
//! - Bookkeeping runs for every outcome, including re-raised panics

pub mod access_log;
pub mod race;
pub mod service;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{Capture, ResponseSink, ResponseWriter};
use crate::config::SupervisorConfig;
use crate::format::{CompiledFormat, DEFAULT_LOG_FORMAT};
use crate::http::{escrow, Handler, RequestSnapshot};
use crate::observability::metrics;
use crate::stats::{Bucket, Callback, Counters, LogBitmask, Statistics};

pub use access_log::{non_blocking, open_destination, AccessLog, LogWriter};
pub use race::{panic_message, CancelSignal, Cancellation, Resolution};

use race::Outcome;

/// Wraps a [`Handler`] and guarantees one outcome per request.
///
/// Cloning is cheap; clones share counters, format and writer.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    handler: Arc<dyn Handler>,
    allow_panics: bool,
    timeout: Option<Duration>,
    escrow_reader: bool,
    counters: Option<Arc<Counters>>,
    callback: Option<Callback>,
    access_log: Option<AccessLog>,
}

impl Supervisor {
    pub fn builder<H: Handler>(handler: H) -> SupervisorBuilder {
        SupervisorBuilder::new(handler)
    }

    pub fn counters(&self) -> Option<&Arc<Counters>> {
        self.inner.counters.as_ref()
    }

    pub fn access_log(&self) -> Option<&AccessLog> {
        self.inner.access_log.as_ref()
    }

    fn logged_headers(&self) -> &[String] {
        self.inner
            .access_log
            .as_ref()
            .map_or(&[], |log| log.format.header_names())
    }

    /// Serve one request, writing the single response into `sink`.
    ///
    /// `disconnected` resolves when the client goes away. With
    /// `allow_panics`, a handler panic is re-raised from here after the
    /// request has been counted and logged, and `sink` is left untouched.
    pub async fn serve<S, D>(
        &self,
        mut request: Request<Body>,
        sink: &mut S,
        disconnected: D,
    ) -> Resolution
    where
        S: ResponseSink + ?Sized,
        D: Future<Output = ()>,
    {
        let inner = &*self.inner;
        let begin = Utc::now();
        let started = Instant::now();

        // Frozen before the handler can touch the request.
        let snapshot = RequestSnapshot::capture(&request, self.logged_headers());

        let escrowed = if inner.escrow_reader {
            let (wrapped, escrow) = escrow::wrap(request);
            request = wrapped;
            Some(escrow)
        } else {
            None
        };

        let (cancel_tx, signal) = CancelSignal::channel();
        request.extensions_mut().insert(signal);

        let writer = ResponseWriter::new(Capture::admitted(begin, started));
        let worker = tokio::spawn(inner.handler.call(writer.clone(), request));

        let outcome = race::race(worker, inner.timeout, disconnected).await;
        let resolution = outcome.resolution();

        let mut repanic = None;
        let mut capture = match outcome {
            Outcome::Completed => {
                let mut capture = writer.take();
                if let Err(err) = capture.flush(sink) {
                    tracing::warn!(error = %err, "Failed to flush response to client");
                }
                capture
            }
            Outcome::Panicked { message, payload } => {
                tracing::error!(panic = %message, "Downstream handler panicked");
                let mut capture = Capture::admitted(begin, started);
                if inner.allow_panics {
                    capture.fail(&message, StatusCode::INTERNAL_SERVER_ERROR);
                    repanic = Some(payload);
                } else {
                    report_error_path(capture.error_through(
                        sink,
                        &message,
                        StatusCode::INTERNAL_SERVER_ERROR,
                    ));
                }
                capture
            }
            Outcome::Cancelled(reason) => {
                // Stored even when the handler already dropped its receiver.
                cancel_tx.send_replace(Some(reason));
                tracing::debug!(reason = %reason, "Request cancelled before handler finished");
                drop(writer);
                let mut capture = Capture::admitted(begin, started);
                report_error_path(capture.error_through(
                    sink,
                    reason.as_str(),
                    StatusCode::SERVICE_UNAVAILABLE,
                ));
                capture
            }
        };

        capture.finish(Utc::now());
        let status = capture.resolved_status();

        if let Some(counters) = &inner.counters {
            counters.increment(status);
        }
        metrics::record_request(
            Bucket::for_status(status),
            resolution,
            capture.elapsed(),
        );

        let mut force_log = false;
        if let Some(callback) = &inner.callback {
            let mut stats = Statistics::new(
                capture.begin(),
                escrowed.as_ref().map(|escrow| escrow.bytes()),
                status,
                capture.end(),
                capture.elapsed(),
            );
            callback(&mut stats);
            force_log = stats.log_forced();
        }

        if let Some(log) = &inner.access_log {
            if force_log || log.bitmask.allows(status) {
                let line = log.format.render(&capture, &snapshot);
                log.write(&line);
            }
        }

        tracing::debug!(
            status,
            outcome = resolution.label(),
            bytes = capture.bytes_written(),
            "Request resolved"
        );

        if let Some(payload) = repanic {
            std::panic::resume_unwind(payload);
        }
        resolution
    }
}

fn report_error_path(result: io::Result<u64>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "Failed to write error response to client");
    }
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    handler: Arc<dyn Handler>,
    allow_panics: bool,
    timeout: Option<Duration>,
    escrow_reader: bool,
    counters: Option<Arc<Counters>>,
    callback: Option<Callback>,
    log_writer: Option<Arc<dyn LogWriter>>,
    log_format: Option<String>,
    log_bitmask: Option<LogBitmask>,
}

impl SupervisorBuilder {
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            allow_panics: false,
            timeout: None,
            escrow_reader: false,
            counters: None,
            callback: None,
            log_writer: None,
            log_format: None,
            log_bitmask: None,
        }
    }

    /// Apply file-based settings. Opens the access-log destination when
    /// logging is enabled.
    pub fn with_config(mut self, config: &SupervisorConfig) -> io::Result<Self> {
        self.allow_panics = config.supervision.allow_panics;
        self.escrow_reader = config.supervision.escrow_reader;
        self = self.timeout(Duration::from_millis(config.supervision.timeout_ms));

        if config.access_log.enabled {
            self.log_writer = Some(open_destination(&config.access_log.destination)?);
            self.log_format = Some(config.access_log.format.clone());
            self.log_bitmask = Some(LogBitmask::new(config.access_log.bitmask()));
        }
        Ok(self)
    }

    /// Re-raise handler panics instead of answering 500.
    pub fn allow_panics(mut self, allow: bool) -> Self {
        self.allow_panics = allow;
        self
    }

    /// Deadline for the handler. Zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn escrow_reader(mut self, enabled: bool) -> Self {
        self.escrow_reader = enabled;
        self
    }

    pub fn counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Statistics) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn log_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.log_writer = Some(writer);
        self
    }

    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.log_format = Some(format.into());
        self
    }

    pub fn log_bitmask(mut self, bitmask: LogBitmask) -> Self {
        self.log_bitmask = Some(bitmask);
        self
    }

    /// Finish. The log format is compiled here, once; without a log writer
    /// no access log is kept.
    pub fn build(self) -> Supervisor {
        let access_log = self.log_writer.map(|writer| {
            let template = self
                .log_format
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());
            AccessLog::new(
                CompiledFormat::compile(&template),
                self.log_bitmask.unwrap_or_default(),
                writer,
            )
        });

        Supervisor {
            inner: Arc::new(Inner {
                handler: self.handler,
                allow_panics: self.allow_panics,
                timeout: self.timeout,
                escrow_reader: self.escrow_reader,
                counters: self.counters,
                callback: self.callback,
                access_log,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{write_error, ResponseRecorder};
    use crate::stats::LOG_STATUS_ERRORS;
    use axum::extract::ConnectInfo;
    use bytes::Bytes;
    use futures_util::FutureExt;
    use std::net::SocketAddr;
    use std::panic::AssertUnwindSafe;
    use std::sync::Mutex;
    use std::time::Instant;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn buffer_log() -> (Arc<Mutex<Vec<u8>>>, Arc<dyn LogWriter>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer: Arc<dyn LogWriter> = buffer.clone();
        (buffer, writer)
    }

    fn logged(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    async fn serve(supervisor: &Supervisor, request: Request<Body>) -> (ResponseRecorder, Resolution) {
        let mut recorder = ResponseRecorder::new();
        let resolution = supervisor
            .serve(request, &mut recorder, std::future::pending())
            .await;
        (recorder, resolution)
    }

    async fn status_handler(w: ResponseWriter, req: Request<Body>) {
        let code = req.uri().path().trim_start_matches('/').parse().unwrap_or(200);
        match StatusCode::from_u16(code) {
            Ok(status) => w.write_status(status),
            Err(_) => panic!("bad status {}", code),
        }
        w.write(b"ok");
    }

    #[tokio::test]
    async fn completed_handler_is_flushed() {
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            w.insert_header("x-handler", axum::http::HeaderValue::from_static("yes"));
            w.write_status(StatusCode::CREATED);
            w.write(b"made");
        })
        .build();

        let (recorder, resolution) = serve(&supervisor, get("/")).await;
        assert_eq!(resolution, Resolution::Completed);
        assert_eq!(recorder.status(), StatusCode::CREATED);
        assert_eq!(recorder.headers()["x-handler"], "yes");
        assert_eq!(recorder.body(), b"made");
        assert_eq!(recorder.status_writes(), 1);
    }

    #[tokio::test]
    async fn handler_that_writes_nothing_is_200() {
        let counters = Arc::new(Counters::new());
        let supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {})
            .counters(counters.clone())
            .build();

        let (recorder, _) = serve(&supervisor, get("/")).await;
        assert_eq!(recorder.status(), StatusCode::OK);
        assert!(recorder.body().is_empty());
        assert_eq!(counters.get_2xx(), 1);
    }

    #[tokio::test]
    async fn deadline_answers_503_and_ignores_late_writes() {
        let counters = Arc::new(Counters::new());
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            w.write_status(StatusCode::OK);
            w.write(b"too late");
        })
        .timeout(Duration::from_millis(20))
        .counters(counters.clone())
        .build();

        let started = Instant::now();
        let (recorder, resolution) = serve(&supervisor, get("/slow")).await;
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(
            resolution,
            Resolution::Cancelled(Cancellation::DeadlineExceeded)
        );
        assert_eq!(recorder.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            recorder.body_text(),
            "503 Service Unavailable: deadline exceeded\n"
        );

        // Let the abandoned handler finish its writes.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(recorder.status_writes(), 1);
        assert_eq!(recorder.body_writes(), 1);
        assert_eq!(counters.get_5xx(), 1);
        assert_eq!(counters.get_2xx(), 0);
    }

    #[tokio::test]
    async fn disconnect_answers_503_with_reason() {
        let supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {
            std::future::pending::<()>().await
        })
        .build();

        let mut recorder = ResponseRecorder::new();
        let resolution = supervisor
            .serve(get("/"), &mut recorder, std::future::ready(()))
            .await;
        assert_eq!(
            resolution,
            Resolution::Cancelled(Cancellation::ClientDisconnected)
        );
        assert_eq!(
            recorder.body_text(),
            "503 Service Unavailable: client disconnected\n"
        );
    }

    #[tokio::test]
    async fn panic_answers_500_with_message() {
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            w.write(b"partial");
            panic!("boom");
        })
        .log_writer(writer)
        .log_format("{status} {error}")
        .build();

        let (recorder, resolution) = serve(&supervisor, get("/")).await;
        assert_eq!(resolution, Resolution::Panicked);
        assert_eq!(recorder.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(recorder.body_text(), "500 Internal Server Error: boom\n");
        assert_eq!(
            recorder.headers()[axum::http::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(logged(&buffer), "500 boom\n");
    }

    #[tokio::test]
    async fn allowed_panic_is_reraised_after_bookkeeping() {
        let counters = Arc::new(Counters::new());
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {
            panic!("let it crash");
        })
        .allow_panics(true)
        .counters(counters.clone())
        .log_writer(writer)
        .log_format("{status} {error}")
        .build();

        let mut recorder = ResponseRecorder::new();
        let result = AssertUnwindSafe(supervisor.serve(
            get("/"),
            &mut recorder,
            std::future::pending(),
        ))
        .catch_unwind()
        .await;

        let payload = result.expect_err("panic should propagate");
        assert_eq!(panic_message(payload.as_ref()), "let it crash");
        assert_eq!(recorder.status_writes(), 0);
        assert!(recorder.body().is_empty());
        assert_eq!(counters.get_5xx(), 1);
        assert_eq!(logged(&buffer), "500 let it crash\n");
    }

    #[tokio::test]
    async fn counters_bucket_every_outcome() {
        let counters = Arc::new(Counters::new());
        let supervisor = Supervisor::builder(status_handler)
            .counters(counters.clone())
            .timeout(Duration::from_secs(5))
            .build();

        for path in ["/200", "/204", "/302", "/404", "/410", "/500", "/99"] {
            serve(&supervisor, get(path)).await;
        }

        assert_eq!(counters.get_all(), 7);
        assert_eq!(counters.get_1xx(), 0);
        assert_eq!(counters.get_2xx(), 2);
        assert_eq!(counters.get_3xx(), 1);
        assert_eq!(counters.get_4xx(), 2);
        // "/99" is not a valid status, so the handler panics into a 500.
        assert_eq!(counters.get_5xx(), 2);
        assert_eq!(
            counters.get_1xx()
                + counters.get_2xx()
                + counters.get_3xx()
                + counters.get_4xx()
                + counters.get_5xx(),
            counters.get_all()
        );
    }

    #[tokio::test]
    async fn bitmask_filters_log_lines() {
        let (buffer, writer) = buffer_log();
        let bitmask = LogBitmask::new(LOG_STATUS_ERRORS);
        let supervisor = Supervisor::builder(status_handler)
            .log_writer(writer)
            .log_format("{uri} {status}")
            .log_bitmask(bitmask.clone())
            .build();

        serve(&supervisor, get("/200")).await;
        serve(&supervisor, get("/404")).await;
        assert_eq!(logged(&buffer), "/404 404\n");

        bitmask.store(0);
        serve(&supervisor, get("/500")).await;
        assert_eq!(logged(&buffer), "/404 404\n");
    }

    #[tokio::test]
    async fn callback_can_force_log_line() {
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(status_handler)
            .log_writer(writer)
            .log_format("{uri} {status}")
            .log_bitmask(LogBitmask::new(LOG_STATUS_ERRORS))
            .callback(|stats: &mut Statistics| {
                if stats.response_status == 201 {
                    stats.log();
                }
            })
            .build();

        serve(&supervisor, get("/200")).await;
        serve(&supervisor, get("/201")).await;
        assert_eq!(logged(&buffer), "/201 201\n");
    }

    #[tokio::test]
    async fn callback_sees_escrowed_body_and_times() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let supervisor = Supervisor::builder(|w: ResponseWriter, req: Request<Body>| async move {
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .unwrap_or_default();
            w.write(&body);
        })
        .escrow_reader(true)
        .callback(move |stats: &mut Statistics| {
            *sink.lock().unwrap() = Some(stats.clone());
        })
        .build();

        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from("payload"))
            .unwrap();
        let (recorder, _) = serve(&supervisor, request).await;
        assert_eq!(recorder.body(), b"payload");

        let stats = seen.lock().unwrap().take().unwrap();
        assert_eq!(stats.request_body, Some(Bytes::from_static(b"payload")));
        assert_eq!(stats.response_status, 200);
        assert!(stats.response_end >= stats.request_begin);
        assert!(stats.duration() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn duration_tracks_handler_time() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            w.write(b"done");
        })
        .log_writer(writer)
        .log_format("{duration}")
        .callback(move |stats: &mut Statistics| {
            *sink.lock().unwrap() = Some(stats.duration());
        })
        .build();

        serve(&supervisor, get("/")).await;

        let elapsed = seen.lock().unwrap().take().unwrap();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5));
        let logged: f64 = logged(&buffer).trim().parse().unwrap();
        assert!(logged >= 0.05);
    }

    #[tokio::test]
    async fn escrow_disabled_leaves_body_unset() {
        let seen = Arc::new(Mutex::new(Some(Bytes::new())));
        let sink = Arc::clone(&seen);
        let supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {})
            .callback(move |stats: &mut Statistics| {
                *sink.lock().unwrap() = stats.request_body.clone();
            })
            .build();

        serve(&supervisor, get("/")).await;
        assert!(seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_observes_cancellation() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let supervisor = Supervisor::builder(move |_w: ResponseWriter, req: Request<Body>| {
            let tx = tx.lock().unwrap().take();
            async move {
                let Some(signal) = req.extensions().get::<CancelSignal>().cloned() else {
                    return;
                };
                let reason = signal.cancelled().await;
                if let Some(tx) = tx {
                    let _ = tx.send(reason);
                }
            }
        })
        .timeout(Duration::from_millis(20))
        .build();

        serve(&supervisor, get("/")).await;
        let reason = tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, Cancellation::DeadlineExceeded);
    }

    #[tokio::test]
    async fn cancellation_reason_is_readable_without_waiting() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let supervisor = Supervisor::builder(move |_w: ResponseWriter, req: Request<Body>| {
            let tx = tx.lock().unwrap().take();
            let signal = req.extensions().get::<CancelSignal>().cloned();
            drop(req);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if let (Some(tx), Some(signal)) = (tx, signal) {
                    let _ = tx.send(signal.reason());
                }
            }
        })
        .timeout(Duration::from_millis(20))
        .build();

        let (recorder, resolution) = serve(&supervisor, get("/")).await;
        assert_eq!(recorder.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resolution, Resolution::Cancelled(Cancellation::DeadlineExceeded));
        let reason = tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test]
    async fn slow_log_destination_does_not_stall_runtime() {
        struct SlowWrite;

        impl std::io::Write for SlowWrite {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            w.write(b"ok");
        })
        .log_writer(access_log::non_blocking(SlowWrite))
        .log_format("{status}")
        .build();

        // Single-threaded runtime: a blocking log write would hold this timer back.
        let ticker = tokio::spawn(async {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(10)).await;
            start.elapsed()
        });
        let (recorder, _) = serve(&supervisor, get("/")).await;
        assert_eq!(recorder.body(), b"ok");

        let waited = ticker.await.unwrap();
        assert!(waited < Duration::from_millis(150), "timer delayed {:?}", waited);
    }

    #[tokio::test]
    async fn failed_flush_is_logged_as_server_error() {
        struct ResetSink {
            headers: axum::http::HeaderMap,
            status: Option<StatusCode>,
        }

        impl ResponseSink for ResetSink {
            fn headers_mut(&mut self) -> &mut axum::http::HeaderMap {
                &mut self.headers
            }

            fn write_status(&mut self, status: StatusCode) {
                self.status.get_or_insert(status);
            }

            fn write_body(&mut self, _body: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
            }
        }

        let counters = Arc::new(Counters::new());
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            w.write(b"never arrives");
        })
        .counters(counters.clone())
        .log_writer(writer)
        .log_format("{status} {bytes} {error}")
        .build();

        let mut sink = ResetSink {
            headers: axum::http::HeaderMap::new(),
            status: None,
        };
        let resolution = supervisor
            .serve(get("/"), &mut sink, std::future::pending())
            .await;

        assert_eq!(resolution, Resolution::Completed);
        assert_eq!(sink.status, Some(StatusCode::OK));
        assert_eq!(logged(&buffer), "500 0 connection reset\n");
        assert_eq!(counters.get_5xx(), 1);
        assert_eq!(counters.get_2xx(), 0);
    }

    #[tokio::test]
    async fn forbidden_request_log_line() {
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            write_error(&w, "some error", StatusCode::FORBIDDEN);
        })
        .log_writer(writer)
        .log_format("{client} {client-ip} {client-port} - \"{method} {uri} {proto}\" {status} {bytes}")
        .build();

        let mut request = get("/some/url");
        let remote: SocketAddr = "1.2.3.4:1234".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(remote));

        let (recorder, _) = serve(&supervisor, request).await;
        assert_eq!(recorder.body_text(), "403 Forbidden: some error\n");
        assert_eq!(
            logged(&buffer),
            "1.2.3.4:1234 1.2.3.4 1234 - \"GET /some/url HTTP/1.1\" 403 26\n"
        );
    }

    #[tokio::test]
    async fn snapshot_ignores_handler_mutation() {
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|_w: ResponseWriter, mut req: Request<Body>| async move {
            *req.uri_mut() = "/rewritten".parse().unwrap();
            req.headers_mut().remove("x-request-id");
        })
        .log_writer(writer)
        .log_format("{uri} {http-X-Request-Id} {http-Referer}")
        .build();

        let request = Request::builder()
            .uri("/original")
            .header("x-request-id", "abc123")
            .body(Body::empty())
            .unwrap();
        serve(&supervisor, request).await;
        assert_eq!(logged(&buffer), "/original abc123 -\n");
    }

    #[tokio::test]
    async fn empty_format_falls_back_to_default() {
        let (buffer, writer) = buffer_log();
        let supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {})
            .log_writer(writer)
            .log_format("")
            .build();

        serve(&supervisor, get("/default")).await;
        let line = logged(&buffer);
        assert!(line.starts_with("- ["), "line was {line:?}");
        assert!(line.contains("\"GET /default HTTP/1.1\" 200 0 "));
        assert!(line.ends_with('\n'));
    }
}
