//! Upstream forwarding.
//!
//! # Responsibilities
//! - Own the shared outbound HTTP client
//! - Rewrite the request target to the chosen upstream
//! - Perform the roundtrip and hand back the upstream response untouched
//!
//! # Design Decisions
//! - One pooled client per process, shared by every routing table generation
//! - Path and query are preserved; only scheme and authority change
//! - Bodies stream in both directions, nothing is buffered

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Why a request could not be forwarded.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream address {address:?}: {source}")]
    InvalidUpstream {
        address: String,
        #[source]
        source: axum::http::Error,
    },

    #[error("upstream {address} request failed: {source}")]
    Transport {
        address: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
}

/// Shared outbound transport.
#[derive(Clone)]
pub struct Transport {
    client: Client<HttpConnector, Body>,
}

impl Transport {
    /// Build a transport whose TCP connects give up after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Forward `req` to `upstream` (`host:port`) and return its response.
    pub async fn forward(
        &self,
        req: Request<Body>,
        upstream: &str,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = req.into_parts();

        parts.uri = rewrite_uri(&parts.uri, upstream).map_err(|source| {
            ProxyError::InvalidUpstream {
                address: upstream.to_string(),
                source,
            }
        })?;
        // Let the client derive Host from the new authority.
        parts.headers.remove(header::HOST);

        let response: Response<hyper::body::Incoming> = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|source| ProxyError::Transport {
                address: upstream.to_string(),
                source,
            })?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Point `uri` at `upstream` over plain HTTP, keeping path and query.
pub fn rewrite_uri(uri: &Uri, upstream: &str) -> Result<Uri, axum::http::Error> {
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(Authority::from_str(upstream)?);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some("/".parse()?);
    }
    Ok(Uri::from_parts(parts)?)
}
