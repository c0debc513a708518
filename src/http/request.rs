//! Request snapshot taken at admission.
//!
//! # Responsibilities
//! - Copy the request-line fields and remote address the access log needs
//! - Copy the request headers named by `http-` log tokens
//!
//! # Design Decisions
//! - The snapshot is frozen before the handler starts. The handler owns the
//!   request from then on and may mutate it; the log line never reads the
//!   live request
//! - Only the first value of a header is kept, since that is all that is logged
//! - `uri` is the request target as the client wrote it. HTTP/2 and HTTP/3
//!   carry scheme and authority in separate pseudo-headers that the server
//!   folds into the `Uri`, so for those only path and query are kept.
//!   HTTP/1.1 absolute-form targets (proxy requests) are kept whole

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, Uri, Version};
use std::net::SocketAddr;

use crate::format::emitters::MISSING_HEADER;

/// Frozen copy of the request fields used for logging.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: String,
    uri: String,
    proto: String,
    remote_addr: String,
    headers: Vec<(String, String)>,
}

impl RequestSnapshot {
    /// Snapshot `request`, reading the remote address from axum's
    /// `ConnectInfo<SocketAddr>` extension when present.
    pub fn capture<B>(request: &Request<B>, header_names: &[String]) -> Self {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::from_parts(
            request.method(),
            request.uri(),
            request.version(),
            request.headers(),
            remote,
            header_names,
        )
    }

    pub fn from_parts(
        method: &Method,
        uri: &Uri,
        version: Version,
        headers: &HeaderMap,
        remote: Option<SocketAddr>,
        header_names: &[String],
    ) -> Self {
        let headers = header_names
            .iter()
            .map(|name| {
                let value = headers
                    .get(name.as_str())
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| MISSING_HEADER.to_string());
                (name.clone(), value)
            })
            .collect();

        Self {
            method: method.as_str().to_string(),
            uri: request_target(uri, version),
            proto: format!("{:?}", version),
            remote_addr: remote.map_or_else(|| "-".to_string(), |addr| addr.to_string()),
            headers,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Protocol, e.g. `HTTP/1.1`.
    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// `ip:port`, with IPv6 addresses in brackets.
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn request_target(uri: &Uri, version: Version) -> String {
    if version >= Version::HTTP_2 {
        uri.path_and_query()
            .map_or_else(|| uri.path(), |pq| pq.as_str())
            .to_string()
    } else {
        uri.to_string()
    }
}
