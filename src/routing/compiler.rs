//! Route compilation.
//!
//! Turns an admitted application into an immutable [`CompiledChain`]. Either
//! every route compiles or nothing is produced.

use std::collections::HashMap;
use std::sync::Arc;

use crate::admission::default_strategy;
use crate::config::schema::{App, MatchKind, Route, Sink, StrategyKind};
use crate::http::proxy::Transport;
use crate::load_balancer::Strategy;
use crate::routing::matcher::{
    Matcher, MatcherChain, MethodMatcher, PathExactMatcher, PathPrefixMatcher, PathRegexMatcher,
};
use crate::routing::router::{CompiledChain, CompiledRoute};

/// Why an application could not be turned into a routing table.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("route {path:?} references sink {sink:?} which does not exist")]
    SinkNotFound { path: String, sink: String },

    #[error("sink {sink:?} has no upstreams")]
    EmptySink { sink: String },

    #[error("sink {sink:?} has unknown strategy {strategy:?}")]
    UnknownStrategy { sink: String, strategy: String },

    #[error("route {path:?} has unknown match {kind:?}")]
    UnknownMatch { path: String, kind: String },

    #[error("route {path:?} has an invalid pattern: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile every route of `app`, in declaration order.
///
/// Routes that share a sink share one strategy, so a round-robin cursor
/// advances across all of them.
pub fn compile(app: &App, transport: &Transport) -> Result<CompiledChain, CompileError> {
    let mut strategies: HashMap<&str, Arc<Strategy>> = HashMap::new();
    let mut routes = Vec::with_capacity(app.routes.len());

    for route in &app.routes {
        let sink = app.sink(&route.sink).ok_or_else(|| CompileError::SinkNotFound {
            path: route.path.clone(),
            sink: route.sink.clone(),
        })?;

        let strategy = match strategies.get(sink.name.as_str()) {
            Some(strategy) => Arc::clone(strategy),
            None => {
                let strategy = Arc::new(build_strategy(sink)?);
                strategies.insert(sink.name.as_str(), Arc::clone(&strategy));
                strategy
            }
        };

        routes.push(CompiledRoute::new(
            route.path.clone(),
            sink.name.clone(),
            build_matchers(route)?,
            strategy,
        ));
    }

    tracing::debug!(app = %app.name, routes = routes.len(), sinks = strategies.len(), "Routes compiled");

    Ok(CompiledChain::new(
        app.name.clone(),
        app.listener_ports(),
        routes,
        transport.clone(),
    ))
}

fn build_strategy(sink: &Sink) -> Result<Strategy, CompileError> {
    let kind = match sink.strategy.as_deref() {
        None | Some("") => default_strategy(sink),
        Some(token) => {
            token
                .parse::<StrategyKind>()
                .map_err(|_| CompileError::UnknownStrategy {
                    sink: sink.name.clone(),
                    strategy: token.to_string(),
                })?
        }
    };

    Strategy::build(kind, &sink.upstreams).ok_or_else(|| CompileError::EmptySink {
        sink: sink.name.clone(),
    })
}

fn build_matchers(route: &Route) -> Result<MatcherChain, CompileError> {
    let kind = match route.match_kind.as_deref() {
        None | Some("") => MatchKind::Exact,
        Some(token) => token
            .parse::<MatchKind>()
            .map_err(|_| CompileError::UnknownMatch {
                path: route.path.clone(),
                kind: token.to_string(),
            })?,
    };

    let path_matcher: Box<dyn Matcher> = match kind {
        MatchKind::Exact => Box::new(PathExactMatcher::new(route.path.clone())),
        MatchKind::Prefix => Box::new(PathPrefixMatcher::new(route.path.clone())),
        MatchKind::Regex => Box::new(PathRegexMatcher::new(&route.path).map_err(|source| {
            CompileError::InvalidPattern {
                path: route.path.clone(),
                source,
            }
        })?),
    };

    let mut matchers = vec![path_matcher];
    if let Some(method_matcher) = route.methods.as_deref().and_then(MethodMatcher::new) {
        matchers.push(Box::new(method_matcher));
    }

    Ok(MatcherChain::new(matchers))
}
