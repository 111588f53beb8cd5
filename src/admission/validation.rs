//! Structural validation of a defaulted application.
//!
//! # Responsibilities
//! - Check value ranges (upstream and listener ports)
//! - Check tokens against the known vocabularies
//! - Check referential integrity (routes reference existing sinks)
//!
//! # Design Decisions
//! - Checks run in a fixed order and the first failure is returned
//! - Each failure names the offending field and value

use std::collections::HashSet;
use std::net::IpAddr;

use crate::config::schema::{App, MatchKind, StrategyKind};

/// Method tokens a route may restrict itself to.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Why an application was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("port validation failed: invalid port value {port} in sink {sink:?}")]
    UpstreamPort { sink: String, port: i64 },

    #[error("sink strategy validation failed: strategy for sink {sink:?} was null or blank")]
    MissingStrategy { sink: String },

    #[error("sink strategy validation failed: invalid strategy {strategy:?} in sink {sink:?}")]
    UnknownStrategy { sink: String, strategy: String },

    #[error("route match validation failed: match for route {path:?} was null or blank")]
    MissingMatch { path: String },

    #[error("route match validation failed: invalid route path matcher {kind:?} in route {path:?}")]
    UnknownMatch { path: String, kind: String },

    #[error("upstream address validation failed: upstream address cannot be empty in sink {sink:?}")]
    EmptyAddress { sink: String },

    #[error("upstream address validation failed: invalid IP address {address:?} in sink {sink:?}")]
    InvalidAddress { sink: String, address: String },

    #[error("route methods validation failed: invalid HTTP method {method:?} in route {path:?}")]
    InvalidMethod { path: String, method: String },

    #[error("listener ports validation failed: invalid listener port {port}")]
    ListenerPort { port: i64 },

    #[error("route sink validation failed: route {path:?} has no sink specified")]
    MissingSink { path: String },

    #[error("route sink validation failed: route {path:?} references unknown sink {sink:?}")]
    UnknownSink { path: String, sink: String },

    #[error("route path validation failed: route path cannot be empty")]
    EmptyPath,

    #[error("route path validation failed: route path {path:?} must start with /")]
    RelativePath { path: String },

    #[error("sink name validation failed: sink name {sink:?} is declared more than once")]
    DuplicateSink { sink: String },
}

/// Validate a defaulted application, returning the first failing check.
pub fn validate(app: &App) -> Result<(), AdmissionError> {
    let v = Validator { app };
    v.upstream_ports()?;
    v.strategies()?;
    v.matches()?;
    v.addresses()?;
    v.methods()?;
    v.listener_ports()?;
    v.route_sinks()?;
    v.route_paths()?;
    v.sink_names()?;
    Ok(())
}

struct Validator<'a> {
    app: &'a App,
}

impl Validator<'_> {
    fn upstream_ports(&self) -> Result<(), AdmissionError> {
        for sink in &self.app.sinks {
            for upstream in &sink.upstreams {
                if !(0..=65535).contains(&upstream.port) {
                    return Err(AdmissionError::UpstreamPort {
                        sink: sink.name.clone(),
                        port: upstream.port,
                    });
                }
            }
        }
        Ok(())
    }

    fn strategies(&self) -> Result<(), AdmissionError> {
        for sink in &self.app.sinks {
            let strategy = match sink.strategy.as_deref() {
                None | Some("") => {
                    return Err(AdmissionError::MissingStrategy {
                        sink: sink.name.clone(),
                    })
                }
                Some(strategy) => strategy,
            };
            if strategy.parse::<StrategyKind>().is_err() {
                return Err(AdmissionError::UnknownStrategy {
                    sink: sink.name.clone(),
                    strategy: strategy.to_string(),
                });
            }
        }
        Ok(())
    }

    fn matches(&self) -> Result<(), AdmissionError> {
        for route in &self.app.routes {
            let kind = match route.match_kind.as_deref() {
                None | Some("") => {
                    return Err(AdmissionError::MissingMatch {
                        path: route.path.clone(),
                    })
                }
                Some(kind) => kind,
            };
            if kind.parse::<MatchKind>().is_err() {
                return Err(AdmissionError::UnknownMatch {
                    path: route.path.clone(),
                    kind: kind.to_string(),
                });
            }
        }
        Ok(())
    }

    fn addresses(&self) -> Result<(), AdmissionError> {
        for sink in &self.app.sinks {
            for upstream in &sink.upstreams {
                if upstream.address.is_empty() {
                    return Err(AdmissionError::EmptyAddress {
                        sink: sink.name.clone(),
                    });
                }
                if upstream.address == "localhost" {
                    continue;
                }
                if upstream.address.parse::<IpAddr>().is_err() {
                    return Err(AdmissionError::InvalidAddress {
                        sink: sink.name.clone(),
                        address: upstream.address.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn methods(&self) -> Result<(), AdmissionError> {
        for route in &self.app.routes {
            for method in route.methods.iter().flatten() {
                if !HTTP_METHODS.contains(&method.as_str()) {
                    return Err(AdmissionError::InvalidMethod {
                        path: route.path.clone(),
                        method: method.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn listener_ports(&self) -> Result<(), AdmissionError> {
        match self
            .app
            .listeners
            .iter()
            .find(|port| !(1..=65535).contains(*port))
        {
            Some(port) => Err(AdmissionError::ListenerPort { port: *port }),
            None => Ok(()),
        }
    }

    fn route_sinks(&self) -> Result<(), AdmissionError> {
        let names: HashSet<&str> = self.app.sinks.iter().map(|s| s.name.as_str()).collect();
        for route in &self.app.routes {
            if route.sink.is_empty() {
                return Err(AdmissionError::MissingSink {
                    path: route.path.clone(),
                });
            }
            if !names.contains(route.sink.as_str()) {
                return Err(AdmissionError::UnknownSink {
                    path: route.path.clone(),
                    sink: route.sink.clone(),
                });
            }
        }
        Ok(())
    }

    fn route_paths(&self) -> Result<(), AdmissionError> {
        for route in &self.app.routes {
            if route.path.is_empty() {
                return Err(AdmissionError::EmptyPath);
            }
            if !route.path.starts_with('/') {
                return Err(AdmissionError::RelativePath {
                    path: route.path.clone(),
                });
            }
        }
        Ok(())
    }

    fn sink_names(&self) -> Result<(), AdmissionError> {
        let mut seen = HashSet::new();
        for sink in &self.app.sinks {
            if !seen.insert(sink.name.as_str()) {
                return Err(AdmissionError::DuplicateSink {
                    sink: sink.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Route, Sink, Upstream};

    fn valid_app() -> App {
        App {
            name: "demo".into(),
            listeners: vec![8080],
            routes: vec![Route {
                path: "/svc".into(),
                match_kind: Some("exact".into()),
                methods: Some(vec!["GET".into()]),
                sink: "backend".into(),
            }],
            sinks: vec![Sink {
                name: "backend".into(),
                strategy: Some("random".into()),
                upstreams: vec![
                    Upstream {
                        address: "127.0.0.1".into(),
                        port: 9000,
                        weight: None,
                    },
                    Upstream {
                        address: "::1".into(),
                        port: 0,
                        weight: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn accepts_valid_app() {
        assert_eq!(validate(&valid_app()), Ok(()));
    }

    #[test]
    fn accepts_localhost_and_port_bounds() {
        let mut app = valid_app();
        app.sinks[0].upstreams[0].address = "localhost".into();
        app.sinks[0].upstreams[0].port = 65535;
        app.listeners = vec![1, 65535];
        assert_eq!(validate(&app), Ok(()));
    }

    #[test]
    fn rejects_negative_upstream_port() {
        let mut app = valid_app();
        app.sinks[0].upstreams[0].port = -1;
        assert_eq!(
            validate(&app),
            Err(AdmissionError::UpstreamPort {
                sink: "backend".into(),
                port: -1
            })
        );
    }

    #[test]
    fn rejects_upstream_port_above_range() {
        let mut app = valid_app();
        app.sinks[0].upstreams[1].port = 65536;
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::UpstreamPort { port: 65536, .. })
        ));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let mut app = valid_app();
        app.sinks[0].strategy = Some("foo".into());
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::UnknownStrategy { strategy, .. }) if strategy == "foo"
        ));
    }

    #[test]
    fn rejects_missing_strategy() {
        let mut app = valid_app();
        app.sinks[0].strategy = None;
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::MissingStrategy { .. })
        ));
    }

    #[test]
    fn rejects_unknown_match() {
        let mut app = valid_app();
        app.routes[0].match_kind = Some("substring".into());
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::UnknownMatch { kind, .. }) if kind == "substring"
        ));
    }

    #[test]
    fn rejects_blank_match() {
        let mut app = valid_app();
        app.routes[0].match_kind = Some(String::new());
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::MissingMatch { .. })
        ));
    }

    #[test]
    fn rejects_empty_address() {
        let mut app = valid_app();
        app.sinks[0].upstreams[0].address = String::new();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::EmptyAddress { .. })
        ));
    }

    #[test]
    fn rejects_malformed_ip() {
        let mut app = valid_app();
        app.sinks[0].upstreams[0].address = "999.999.999.999".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::InvalidAddress { address, .. }) if address == "999.999.999.999"
        ));
    }

    #[test]
    fn rejects_hostnames_other_than_localhost() {
        let mut app = valid_app();
        app.sinks[0].upstreams[0].address = "example.com".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn rejects_trace_method() {
        let mut app = valid_app();
        app.routes[0].methods = Some(vec!["GET".into(), "TRACE".into()]);
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::InvalidMethod { method, .. }) if method == "TRACE"
        ));
    }

    #[test]
    fn rejects_listener_port_zero() {
        let mut app = valid_app();
        app.listeners = vec![8080, 0];
        assert_eq!(
            validate(&app),
            Err(AdmissionError::ListenerPort { port: 0 })
        );
    }

    #[test]
    fn rejects_missing_sink_reference() {
        let mut app = valid_app();
        app.routes[0].sink = "missing".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::UnknownSink { sink, .. }) if sink == "missing"
        ));
    }

    #[test]
    fn rejects_route_without_sink() {
        let mut app = valid_app();
        app.routes[0].sink = String::new();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::MissingSink { .. })
        ));
    }

    #[test]
    fn rejects_relative_path() {
        let mut app = valid_app();
        app.routes[0].path = "no-leading-slash".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::RelativePath { path }) if path == "no-leading-slash"
        ));
    }

    #[test]
    fn rejects_empty_path() {
        let mut app = valid_app();
        app.routes[0].path = String::new();
        assert_eq!(validate(&app), Err(AdmissionError::EmptyPath));
    }

    #[test]
    fn rejects_duplicate_sink_names() {
        let mut app = valid_app();
        let duplicate = app.sinks[0].clone();
        app.sinks.push(duplicate);
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::DuplicateSink { sink }) if sink == "backend"
        ));
    }

    #[test]
    fn reports_first_failing_check_only() {
        let mut app = valid_app();
        // Both the strategy and the path are wrong; strategy is checked first.
        app.sinks[0].strategy = Some("foo".into());
        app.routes[0].path = "relative".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::UnknownStrategy { .. })
        ));

        let mut app = valid_app();
        app.listeners = vec![0];
        app.routes[0].sink = "missing".into();
        assert!(matches!(
            validate(&app),
            Err(AdmissionError::ListenerPort { .. })
        ));
    }

    #[test]
    fn errors_are_distinct_and_descriptive() {
        let errors = [
            AdmissionError::UpstreamPort { sink: "s".into(), port: -1 },
            AdmissionError::UnknownStrategy { sink: "s".into(), strategy: "foo".into() },
            AdmissionError::UnknownMatch { path: "/".into(), kind: "substring".into() },
            AdmissionError::EmptyAddress { sink: "s".into() },
            AdmissionError::InvalidAddress { sink: "s".into(), address: "999.999.999.999".into() },
            AdmissionError::InvalidMethod { path: "/".into(), method: "TRACE".into() },
            AdmissionError::ListenerPort { port: 0 },
            AdmissionError::UnknownSink { path: "/".into(), sink: "missing".into() },
            AdmissionError::RelativePath { path: "no-leading-slash".into() },
        ];
        let messages: HashSet<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), errors.len());
        assert!(errors[1].to_string().contains("\"foo\""));
        assert!(errors[7].to_string().contains("\"missing\""));
    }
}
