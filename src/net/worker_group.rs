//! A fixed set of worker listeners sharing one dynamic handler.
//!
//! # Responsibilities
//! - Bind every configured port, all-or-nothing
//! - Serve each listener concurrently and collect every failure
//! - Stop accepting on shutdown and drain within a deadline
//!
//! # Design Decisions
//! - The listener set is fixed for the lifetime of the group; routing
//!   changes go through the shared handler only
//! - Errors are joined rather than first-wins, so an operator sees every
//!   port that failed

use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::{AbortHandle, JoinSet};

use crate::http::server::worker_router;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::listener::{self, ListenerError};
use crate::net::tracker::ServeTracker;
use crate::observability::metrics;
use crate::routing::DynamicHandler;

/// Failure of a single worker listener.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("listener on port {port} failed to bind: {source}")]
    Bind {
        port: u16,
        #[source]
        source: ListenerError,
    },

    #[error("listener on port {port} failed: {source}")]
    Serve {
        port: u16,
        #[source]
        source: ListenerError,
    },

    #[error("listener on port {port} did not drain within {deadline:?}")]
    DrainTimeout { port: u16, deadline: Duration },

    #[error("listener task panicked: {0}")]
    Panicked(String),
}

/// Every failure reported by a group operation.
#[derive(Debug)]
pub struct WorkerGroupError(pub Vec<WorkerError>);

impl WorkerGroupError {
    pub fn errors(&self) -> &[WorkerError] {
        &self.0
    }
}

impl fmt::Display for WorkerGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkerGroupError {}

fn joined(errors: Vec<WorkerError>) -> Result<(), WorkerGroupError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkerGroupError(errors))
    }
}

#[derive(Debug)]
struct Worker {
    port: u16,
    abort: AbortHandle,
}

/// N listeners serving one [`DynamicHandler`].
#[derive(Debug)]
pub struct WorkerGroup {
    handler: Arc<DynamicHandler>,
    bind_host: IpAddr,
    request_timeout: Duration,
    started: AtomicBool,
    shutdown: Shutdown,
    tracker: ServeTracker,
    workers: Mutex<Vec<Worker>>,
}

impl WorkerGroup {
    pub fn new(handler: Arc<DynamicHandler>, bind_host: IpAddr, request_timeout: Duration) -> Self {
        Self {
            handler,
            bind_host,
            request_timeout,
            started: AtomicBool::new(false),
            shutdown: Shutdown::new(),
            tracker: ServeTracker::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Bind and serve every port. Returns once all listeners have stopped.
    ///
    /// If any port fails to bind, nothing is served and every bind error is
    /// returned. Calling `start` again is a no-op.
    pub async fn start(&self, ports: &[u16]) -> Result<(), WorkerGroupError> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Worker group already started, ignoring start");
            return Ok(());
        }

        // Keeps a concurrent shutdown waiting until the listeners are either
        // serving or released.
        let startup = self.tracker.track();

        let binds = join_all(
            ports
                .iter()
                .map(|&port| listener::bind(self.bind_host, port)),
        )
        .await;

        let mut bound = Vec::with_capacity(ports.len());
        let mut errors = Vec::new();
        for (&port, result) in ports.iter().zip(binds) {
            match result {
                Ok(listener) => bound.push((port, listener)),
                Err(source) => errors.push(WorkerError::Bind { port, source }),
            }
        }
        if !errors.is_empty() {
            tracing::error!(failed = errors.len(), "Worker bind failed, releasing bound listeners");
            drop(bound);
            return joined(errors);
        }

        if self.shutdown.is_triggered() {
            tracing::info!("Shutdown requested while binding, releasing listeners");
            return Ok(());
        }

        let router = worker_router(Arc::clone(&self.handler), self.request_timeout);
        let mut set = JoinSet::new();
        {
            let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            for (port, tcp) in bound {
                let guard = self.tracker.track();
                let signal = self.shutdown.subscribe();
                let router = router.clone();
                let abort = set.spawn(async move {
                    let _guard = guard;
                    (port, listener::serve(tcp, router, signal).await)
                });
                workers.push(Worker { port, abort });
            }
        }

        drop(startup);

        metrics::set_active_listeners(set.len());
        tracing::info!(listeners = set.len(), "Worker group serving");

        let mut errors = Vec::new();
        while let Some(result) = set.join_next().await {
            match result {
                Ok((_, Ok(()))) => {}
                Ok((port, Err(source))) => errors.push(WorkerError::Serve { port, source }),
                // Aborted after a drain timeout; shutdown reports it.
                Err(e) if e.is_cancelled() => {}
                Err(e) => errors.push(WorkerError::Panicked(e.to_string())),
            }
        }

        metrics::set_active_listeners(0);
        joined(errors)
    }

    /// Stop accepting on every listener and wait up to `deadline` for
    /// in-flight requests. Listeners still draining are aborted and reported.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), WorkerGroupError> {
        self.shutdown.trigger();

        if tokio::time::timeout(deadline, self.tracker.wait_idle())
            .await
            .is_ok()
        {
            tracing::info!("Worker group drained");
            return Ok(());
        }

        let workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
        let errors: Vec<_> = workers
            .iter()
            .filter(|worker| !worker.abort.is_finished())
            .map(|worker| {
                tracing::warn!(port = worker.port, ?deadline, "Listener did not drain, aborting");
                worker.abort.abort();
                WorkerError::DrainTimeout {
                    port: worker.port,
                    deadline,
                }
            })
            .collect();

        joined(errors)
    }

    /// Number of listeners that have not finished draining.
    pub fn active_listeners(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|worker| !worker.abort.is_finished())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::proxy::Transport;
    use crate::routing::CompiledChain;
    use std::net::Ipv4Addr;

    fn group() -> Arc<WorkerGroup> {
        let handler = Arc::new(DynamicHandler::new(CompiledChain::empty(Transport::default())));
        Arc::new(WorkerGroup::new(
            handler,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Duration::from_secs(5),
        ))
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tokio::test]
    async fn duplicate_ports_report_bind_failure() {
        let port = free_port();
        let err = group().start(&[port, port]).await.unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert!(matches!(err.errors()[0], WorkerError::Bind { port: p, .. } if p == port));
    }

    #[tokio::test]
    async fn bind_failure_releases_other_ports() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let free = free_port();

        let err = group().start(&[free, taken_port]).await.unwrap_err();
        assert!(matches!(err.errors()[0], WorkerError::Bind { port, .. } if port == taken_port));

        // The port that did bind was released again.
        assert!(std::net::TcpListener::bind(("127.0.0.1", free)).is_ok());
    }

    #[tokio::test]
    async fn start_serves_until_shutdown() {
        let group = group();
        let port = free_port();
        let task = {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.start(&[port]).await })
        };

        let mut connected = false;
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                connected = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(connected, "listener never came up");
        assert_eq!(group.active_listeners(), 1);

        // A second start is a no-op, not a double bind.
        assert!(group.start(&[port]).await.is_ok());

        group.shutdown(Duration::from_secs(2)).await.unwrap();
        let served = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(served.is_ok());
        assert_eq!(group.active_listeners(), 0);
    }

    #[tokio::test]
    async fn shutdown_before_start_is_clean() {
        assert!(group().shutdown(Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn start_racing_shutdown_never_serves() {
        let group = group();
        let port = free_port();
        let task = {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.start(&[port]).await })
        };

        // Shutdown lands before the spawned start has bound anything.
        assert!(group.shutdown(Duration::from_millis(200)).await.is_ok());

        let started = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(started.is_ok());
        assert_eq!(group.active_listeners(), 0);
        assert!(std::net::TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn group_error_joins_messages() {
        let err = WorkerGroupError(vec![
            WorkerError::DrainTimeout {
                port: 8080,
                deadline: Duration::from_secs(1),
            },
            WorkerError::Panicked("boom".into()),
        ]);
        let text = err.to_string();
        assert!(text.contains("8080"));
        assert!(text.contains("; "));
        assert!(text.contains("boom"));
    }
}
