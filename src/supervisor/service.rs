//! Tower integration.
//!
//! # Design Decisions
//! - Each request is supervised on its own spawned task, so the supervisor
//!   keeps running when hyper drops the response future
//! - The response future owns a oneshot sender. Dropping the future (client
//!   went away) closes the channel, which the supervisor sees as a disconnect
//! - A re-raised handler panic crosses the task boundary and is resumed in
//!   the response future, where the server's own panic handling applies

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tower::Service;

use crate::capture::ResponseRecorder;
use crate::supervisor::Supervisor;

impl Service<Request<Body>> for Supervisor {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let supervisor = self.clone();
        let (guard, closed) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut recorder = ResponseRecorder::new();
            let disconnected = async move {
                let _ = closed.await;
            };
            supervisor.serve(request, &mut recorder, disconnected).await;
            recorder.into_response()
        });

        Box::pin(async move {
            let _guard = guard;
            match task.await {
                Ok(response) => Ok(response),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    tracing::error!(error = %err, "Supervising task failed");
                    let mut response = Response::new(Body::empty());
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    Ok(response)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ResponseWriter;
    use crate::stats::Counters;
    use crate::supervisor::LogWriter;
    use futures_util::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn responds_with_handler_output() {
        let mut supervisor = Supervisor::builder(|w: ResponseWriter, _req: Request<Body>| async move {
            w.write_status(StatusCode::ACCEPTED);
            w.write(b"queued");
        })
        .build();

        let response = supervisor.call(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"queued");
    }

    #[tokio::test]
    async fn dropped_response_future_counts_as_disconnect() {
        let counters = Arc::new(Counters::new());
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer: Arc<dyn LogWriter> = buffer.clone();
        let mut supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .counters(counters.clone())
        .log_writer(writer)
        .log_format("{status} {error}")
        .build();

        let pending = supervisor.call(get("/"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(pending);

        for _ in 0..50 {
            if counters.get_all() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(counters.get_5xx(), 1);
        assert_eq!(
            String::from_utf8(buffer.lock().unwrap().clone()).unwrap(),
            "503 client disconnected\n"
        );
    }

    #[tokio::test]
    async fn allowed_panic_resumes_in_response_future() {
        let mut supervisor = Supervisor::builder(|_w: ResponseWriter, _req: Request<Body>| async {
            panic!("surface me");
        })
        .allow_panics(true)
        .build();

        let result = AssertUnwindSafe(supervisor.call(get("/")))
            .catch_unwind()
            .await;
        let Err(payload) = result else {
            panic!("panic should reach the caller");
        };
        assert_eq!(
            crate::supervisor::panic_message(payload.as_ref()),
            "surface me"
        );
    }
}
