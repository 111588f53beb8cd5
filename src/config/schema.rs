//! Configuration schema definitions.
//!
//! This module defines the declarative description of a gateway application.
//! All types derive Serde traits for deserialization from config files and
//! control-plane request bodies.
//!
//! Token-valued fields (`match`, `strategy`) are kept as raw strings so that an
//! unrecognized value survives defaulting and is rejected by admission with a
//! descriptive error. Ports are signed for the same reason.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration: one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub app: App,
}

/// A gateway application: listeners, routes and the sinks they forward to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct App {
    /// Informational name, used in logs.
    pub name: String,

    /// Ports to serve proxied traffic on, one listener each.
    pub listeners: Vec<i64>,

    /// Routes in evaluation order (first match wins).
    pub routes: Vec<Route>,

    /// Named upstream groups.
    pub sinks: Vec<Sink>,
}

impl App {
    /// Listener ports narrowed to `u16`. Out-of-range entries are skipped;
    /// admission rejects them before this is ever consulted.
    pub fn listener_ports(&self) -> Vec<u16> {
        self.listeners
            .iter()
            .filter_map(|port| u16::try_from(*port).ok())
            .collect()
    }

    /// Look up a sink by name. The first sink with a matching name wins.
    pub fn sink(&self, name: &str) -> Option<&Sink> {
        self.sinks.iter().find(|sink| sink.name == name)
    }
}

/// A path/method matching rule bound to one sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Route {
    /// Path, interpreted according to `match_kind`.
    pub path: String,

    /// How `path` is compared: exact, prefix or regex.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,

    /// Allowed HTTP methods. `None` or empty matches any method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,

    /// Name of the sink that serves this route.
    pub sink: String,
}

/// A named group of upstreams and the policy used to pick among them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Sink {
    pub name: String,

    /// Load-balancing strategy: random, weighted or round-robin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    pub upstreams: Vec<Upstream>,
}

/// One backend target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Upstream {
    /// IP literal or `localhost`.
    pub address: String,

    pub port: i64,

    /// Relative weight for the weighted strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl Upstream {
    /// True when an explicit, non-zero weight is set.
    pub fn is_weighted(&self) -> bool {
        matches!(self.weight, Some(weight) if weight > 0)
    }

    /// Weight used when building a weighted strategy (unset or zero is 1).
    pub fn effective_weight(&self) -> u64 {
        match self.weight {
            Some(weight) if weight > 0 => u64::from(weight),
            _ => 1,
        }
    }

    /// `host:port` authority for outbound requests. IPv6 literals are bracketed.
    pub fn authority(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }
}

/// Returned when a token does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownToken {
    pub kind: &'static str,
    pub value: String,
}

/// Load-balancing strategy vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Random,
    Weighted,
    RoundRobin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Random,
        StrategyKind::Weighted,
        StrategyKind::RoundRobin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::Weighted => "weighted",
            StrategyKind::RoundRobin => "round-robin",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownToken {
                kind: "strategy",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path matching vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Exact,
    Prefix,
    Regex,
}

impl MatchKind {
    pub const ALL: [MatchKind; 3] = [MatchKind::Exact, MatchKind::Prefix, MatchKind::Regex];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Prefix => "prefix",
            MatchKind::Regex => "regex",
        }
    }
}

impl FromStr for MatchKind {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownToken {
                kind: "match",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
