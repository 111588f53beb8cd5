//! Deterministic defaulting of unset fields.
//!
//! Defaulting never overwrites a value that is already set, including values
//! validation will later reject. Running it twice is a no-op.

use crate::config::schema::{App, MatchKind, Sink, StrategyKind};

/// Fill unset strategies and matches in place.
pub fn apply_defaults(app: &mut App) {
    for sink in app.sinks.iter_mut().filter(|sink| sink.strategy.is_none()) {
        sink.strategy = Some(default_strategy(sink).as_str().to_string());
    }

    for route in &mut app.routes {
        if route.match_kind.as_deref().map_or(true, str::is_empty) {
            route.match_kind = Some(MatchKind::Exact.as_str().to_string());
        }
    }
}

/// Strategy a sink gets when none is configured: weighted only when every
/// upstream carries a positive weight.
pub fn default_strategy(sink: &Sink) -> StrategyKind {
    let all_weighted =
        !sink.upstreams.is_empty() && sink.upstreams.iter().all(|upstream| upstream.is_weighted());
    if all_weighted {
        StrategyKind::Weighted
    } else {
        StrategyKind::Random
    }
}
