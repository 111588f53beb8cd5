//! Route matching logic.
//!
//! # Responsibilities
//! - Match request path (exact, prefix or regex; case-sensitive)
//! - Match request method (case-insensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Regex patterns are compiled once, when the routing table is built
//! - Regex matching is unanchored: a match anywhere in the path counts
//! - An empty method list is no condition at all

use axum::body::Body;
use axum::http::Request;
use regex::Regex;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches when the path equals the configured path.
#[derive(Debug, Clone)]
pub struct PathExactMatcher {
    path: String,
}

impl PathExactMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathExactMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path() == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches when the compiled pattern finds a match in the path.
#[derive(Debug, Clone)]
pub struct PathRegexMatcher {
    pattern: Regex,
}

impl PathRegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Matcher for PathRegexMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.pattern.is_match(req.uri().path())
    }
}

/// Matches when the request method is one of the allowed methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<String>,
}

impl MethodMatcher {
    /// Returns `None` for an empty list, which places no restriction.
    pub fn new(methods: &[String]) -> Option<Self> {
        if methods.is_empty() {
            return None;
        }
        Some(Self {
            methods: methods.to_vec(),
        })
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let method = req.method().as_str();
        self.methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct MatcherChain {
    matchers: Vec<Box<dyn Matcher>>,
}

impl MatcherChain {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for MatcherChain {
    fn matches(&self, req: &Request<Body>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}
