//! Downstream handler contract.

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use std::future::Future;

use crate::capture::ResponseWriter;

/// A request handler the supervisor can run.
///
/// The handler writes its response through the [`ResponseWriter`] instead of
/// returning one. Any `async fn(ResponseWriter, Request<Body>)` qualifies:
///
/// ```
/// use axum::{body::Body, http::{Request, StatusCode}};
/// use request_supervisor::capture::ResponseWriter;
/// use request_supervisor::Supervisor;
///
/// async fn hello(w: ResponseWriter, _req: Request<Body>) {
///     w.write_status(StatusCode::OK);
///     w.write(b"hello");
/// }
///
/// let supervisor = Supervisor::builder(hello).build();
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, writer: ResponseWriter, request: Request<Body>) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ResponseWriter, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, writer: ResponseWriter, request: Request<Body>) -> BoxFuture<'static, ()> {
        Box::pin(self(writer, request))
    }
}
