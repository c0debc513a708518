//! Escrow reader for request bodies.
//!
//! Wraps the request body so every data frame the handler reads is also
//! copied into a side buffer. After the handler is done, the completion
//! callback can look at the payload without the handler having to cooperate.

use axum::body::Body;
use axum::http::{header, Request};
use bytes::{Bytes, BytesMut};
use http_body::{Body as _, Frame, SizeHint};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

/// Upper bound on the up-front escrow allocation. `Content-Length` is client
/// input; larger bodies still escrow fully, the buffer just grows as read.
pub const MAX_ESCROW_PREALLOC: usize = 64 * 1024;

/// Bytes read so far through an [`EscrowBody`].
#[derive(Debug, Clone, Default)]
pub struct Escrow {
    buf: Arc<Mutex<BytesMut>>,
}

impl Escrow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Arc::new(Mutex::new(BytesMut::with_capacity(capacity))),
        }
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).capacity()
    }

    fn push(&self, data: &[u8]) {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
    }

    /// Copy of everything consumed so far.
    pub fn bytes(&self) -> Bytes {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        Bytes::copy_from_slice(&buf)
    }
}

/// Body decorator that tees data frames into an [`Escrow`].
pub struct EscrowBody {
    inner: Body,
    escrow: Escrow,
}

impl http_body::Body for EscrowBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &polled {
            if let Some(data) = frame.data_ref() {
                self.escrow.push(data);
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Replace the request body with an escrowed one.
///
/// When `Content-Length` parses, the escrow buffer is sized for it up front,
/// up to [`MAX_ESCROW_PREALLOC`].
pub fn wrap(request: Request<Body>) -> (Request<Body>, Escrow) {
    let capacity = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .map_or(0, |n| n.min(MAX_ESCROW_PREALLOC));
    let escrow = Escrow::with_capacity(capacity);

    let (parts, body) = request.into_parts();
    let body = Body::new(EscrowBody {
        inner: body,
        escrow: escrow.clone(),
    });
    (Request::from_parts(parts, body), escrow)
}
