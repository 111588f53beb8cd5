//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the first route matching a request
//! - Forward matched requests to an upstream chosen by the route's strategy
//! - Answer unmatched requests with the 404 fallback
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order, first match wins
//! - Upstream failures only affect the request that hit them (502)

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::http::proxy::Transport;
use crate::http::request::request_id;
use crate::http::response;
use crate::load_balancer::Strategy;
use crate::routing::matcher::{Matcher, MatcherChain};

/// Label used for requests that matched no route.
pub const NO_ROUTE: &str = "none";

/// One compiled route: its matchers and the strategy of the sink it serves.
#[derive(Debug)]
pub struct CompiledRoute {
    path: String,
    sink: String,
    matchers: MatcherChain,
    strategy: Arc<Strategy>,
}

impl CompiledRoute {
    pub fn new(
        path: impl Into<String>,
        sink: impl Into<String>,
        matchers: MatcherChain,
        strategy: Arc<Strategy>,
    ) -> Self {
        Self {
            path: path.into(),
            sink: sink.into(),
            matchers,
            strategy,
        }
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.matches(req)
    }

    /// The configured path, used as the route label in logs and metrics.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn matchers(&self) -> &MatcherChain {
        &self.matchers
    }
}

/// An immutable routing table built from one admitted application.
#[derive(Debug)]
pub struct CompiledChain {
    app_name: String,
    listeners: Vec<u16>,
    routes: Vec<CompiledRoute>,
    transport: Transport,
    generation: u64,
}

impl CompiledChain {
    pub fn new(
        app_name: impl Into<String>,
        listeners: Vec<u16>,
        routes: Vec<CompiledRoute>,
        transport: Transport,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            listeners,
            routes,
            transport,
            generation: 0,
        }
    }

    /// A chain with no routes: every request gets the fallback.
    pub fn empty(transport: Transport) -> Self {
        Self::new(String::new(), Vec::new(), Vec::new(), transport)
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Listener ports the application declared.
    pub fn listeners(&self) -> &[u16] {
        &self.listeners
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Generation stamped when this chain was published. Zero if never published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// First route matching the request, in declaration order.
    pub fn route_for(&self, req: &Request<Body>) -> Option<&CompiledRoute> {
        self.routes.iter().find(|route| route.matches(req))
    }

    /// Serve one request against this chain.
    ///
    /// The response carries a [`MatchedRoute`] extension naming the route
    /// that served it; the access log picks it up from there.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let request_id = request_id(&req).unwrap_or("unknown").to_string();

        let Some(route) = self.route_for(&req) else {
            tracing::debug!(request_id = %request_id, path = %req.uri().path(), "No route matched");
            let mut response = response::not_found();
            response.extensions_mut().insert(MatchedRoute::none());
            return response;
        };

        let upstream = route.strategy().pick();
        tracing::debug!(
            request_id = %request_id,
            route = %route.path(),
            upstream = %upstream,
            generation = self.generation,
            "Forwarding request"
        );

        let mut response = match self.transport.forward(req, upstream).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    route = %route.path(),
                    upstream = %upstream,
                    error = %e,
                    "Upstream error"
                );
                response::bad_gateway()
            }
        };
        response
            .extensions_mut()
            .insert(MatchedRoute(Arc::from(route.path())));
        response
    }
}

/// Response extension naming the route that produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub Arc<str>);

impl MatchedRoute {
    /// Marker for requests that matched no route.
    pub fn none() -> Self {
        Self(Arc::from(NO_ROUTE))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
