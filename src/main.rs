//! Demo server for the request supervisor.
//!
//! Reads a TOML config from the path in `SUPERVISOR_CONFIG` (defaults when
//! unset) and serves a small set of routes that exercise each outcome:
//!
//! - `/`       hello text
//! - `/slow`   sleeps past a typical deadline
//! - `/panic`  panics inside the handler
//! - `/error`  handler-written 400 error
//! - `/echo`   echoes the request body
//! - `/stats`  per-class response counters

use axum::body::Body;
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use request_supervisor::config::{load_config, SupervisorConfig};
use request_supervisor::http::SupervisedServer;
use request_supervisor::observability::{logging, metrics};
use request_supervisor::{write_error, Counters, Handler, ResponseWriter, Statistics, Supervisor};

const CONFIG_ENV: &str = "SUPERVISOR_CONFIG";
const MAX_ECHO_BYTES: usize = 1 << 20;

struct DemoRoutes {
    counters: Arc<Counters>,
}

impl Handler for DemoRoutes {
    fn call(&self, w: ResponseWriter, req: Request<Body>) -> BoxFuture<'static, ()> {
        let counters = Arc::clone(&self.counters);
        Box::pin(async move {
            let path = req.uri().path().to_string();
            match path.as_str() {
                "/" => {
                    w.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                    w.write(b"hello from a supervised handler\n");
                }
                "/slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    w.write(b"finally\n");
                }
                "/panic" => panic!("demo handler panicked"),
                "/error" => write_error(&w, "demo failure", StatusCode::BAD_REQUEST),
                "/echo" => match axum::body::to_bytes(req.into_body(), MAX_ECHO_BYTES).await {
                    Ok(body) => {
                        w.write(&body);
                    }
                    Err(err) => write_error(&w, &err.to_string(), StatusCode::PAYLOAD_TOO_LARGE),
                },
                "/stats" => {
                    let report = format!(
                        "all={} 1xx={} 2xx={} 3xx={} 4xx={} 5xx={}\n",
                        counters.get_all(),
                        counters.get_1xx(),
                        counters.get_2xx(),
                        counters.get_3xx(),
                        counters.get_4xx(),
                        counters.get_5xx(),
                    );
                    w.write(report.as_bytes());
                }
                _ => write_error(&w, &path, StatusCode::NOT_FOUND),
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config(Path::new(&path))?,
        None => SupervisorConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!("request-supervisor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_ms = config.supervision.timeout_ms,
        allow_panics = config.supervision.allow_panics,
        escrow_reader = config.supervision.escrow_reader,
        access_log = %config.access_log.destination,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(err) = metrics::init_metrics(addr) {
                    tracing::error!(error = %err, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let counters = Arc::new(Counters::new());
    let supervisor = Supervisor::builder(DemoRoutes {
        counters: Arc::clone(&counters),
    })
    .with_config(&config)?
    .counters(Arc::clone(&counters))
    .callback(|stats: &mut Statistics| {
        // Slow requests are always worth a log line.
        if stats.duration() > Duration::from_secs(1) {
            stats.log();
        }
    })
    .build();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    SupervisedServer::new(supervisor).run(listener).await?;

    tracing::info!(
        total = counters.get_all(),
        errors = counters.get_4xx() + counters.get_5xx(),
        "Shutdown complete"
    );
    Ok(())
}
