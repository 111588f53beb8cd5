//! Top-level orchestration.
//!
//! # Responsibilities
//! - Install the boot configuration before any listener accepts traffic
//! - Run the control endpoint and the worker group side by side
//! - Run the bounded shutdown sequence exactly once
//!
//! # Design Decisions
//! - States only move forward: Idle → Running → ShuttingDown → Stopped
//! - Every routing change goes through the reloader; the manager never
//!   touches a listener's routing directly
//! - Shutdown errors are joined, never first-wins, and every caller of
//!   `stop` sees the same outcome

use std::error::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::schema::Config;
use crate::control::{ControlError, ControlServer};
use crate::http::proxy::Transport;
use crate::lifecycle::reload::{ReloadError, Reloader};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::worker_group::{WorkerError, WorkerGroup, WorkerGroupError};
use crate::routing::{CompiledChain, DynamicHandler};

pub const DEFAULT_CONTROL_PORT: u16 = 8443;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime knobs that are not part of the routed configuration.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Host every worker listener binds on.
    pub bind_host: IpAddr,
    pub control_address: SocketAddr,
    /// Applied separately to the control endpoint and the worker group.
    pub shutdown_timeout: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_CONTROL_PORT)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

/// Every failure of one shutdown sequence.
#[derive(Debug, Clone)]
pub struct ShutdownError(pub Vec<Arc<dyn Error + Send + Sync>>);

impl ShutdownError {
    fn push(&mut self, error: impl Error + Send + Sync + 'static) {
        self.0.push(Arc::new(error));
    }

    fn into_result(self) -> Result<(), ShutdownError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ShutdownError {
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

impl Error for ShutdownError {}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("manager cannot start from state {0:?}")]
    InvalidState(ManagerState),

    #[error("initial configuration refused: {0}")]
    InitialConfig(#[source] ReloadError),

    #[error(transparent)]
    ControlBind(ControlError),

    #[error("worker listeners failed: {source}{}", shutdown_suffix(.shutdown))]
    Workers {
        #[source]
        source: WorkerGroupError,
        /// Failures of the shutdown that followed, if any.
        shutdown: Option<ShutdownError>,
    },

    #[error("shutdown incomplete: {0}")]
    Shutdown(#[source] ShutdownError),
}

fn shutdown_suffix(shutdown: &Option<ShutdownError>) -> String {
    match shutdown {
        Some(error) => format!("; shutdown incomplete: {error}"),
        None => String::new(),
    }
}

pub struct Manager {
    options: ManagerOptions,
    handler: Arc<DynamicHandler>,
    reloader: Reloader,
    workers: Arc<WorkerGroup>,
    cancel: Shutdown,
    control_shutdown: Shutdown,
    state: watch::Sender<ManagerState>,
    control_task: Mutex<Option<JoinHandle<Result<(), ControlError>>>>,
    control_addr: OnceLock<SocketAddr>,
    outcome: OnceLock<Result<(), ShutdownError>>,
}

impl Manager {
    pub fn new(options: ManagerOptions) -> Self {
        let transport = Transport::new(options.connect_timeout);
        let handler = Arc::new(DynamicHandler::new(CompiledChain::empty(transport.clone())));
        let reloader = Reloader::new(Arc::clone(&handler), transport);
        let workers = Arc::new(WorkerGroup::new(
            Arc::clone(&handler),
            options.bind_host,
            options.request_timeout,
        ));
        let (state, _) = watch::channel(ManagerState::Idle);

        Self {
            options,
            handler,
            reloader,
            workers,
            cancel: Shutdown::new(),
            control_shutdown: Shutdown::new(),
            state,
            control_task: Mutex::new(None),
            control_addr: OnceLock::new(),
            outcome: OnceLock::new(),
        }
    }

    /// Install `config`, start serving, and block until shutdown completes.
    pub async fn start(&self, config: Config) -> Result<(), ManagerError> {
        let began = self.state.send_if_modified(|state| {
            if *state == ManagerState::Idle {
                *state = ManagerState::Running;
                true
            } else {
                false
            }
        });
        if !began {
            return Err(ManagerError::InvalidState(self.state()));
        }

        if let Err(e) = self.reloader.install(config) {
            self.state.send_replace(ManagerState::Stopped);
            return Err(ManagerError::InitialConfig(e));
        }

        let control = match ControlServer::bind(self.options.control_address, self.reloader.clone()).await {
            Ok(control) => control,
            Err(e) => {
                self.state.send_replace(ManagerState::Stopped);
                return Err(ManagerError::ControlBind(e));
            }
        };
        let control_addr = control.local_addr().ok();
        let ports = self.handler.snapshot().listeners().to_vec();
        tracing::info!(control = ?control_addr, listeners = ?ports, "Manager starting");

        {
            let task = tokio::spawn(control.serve(self.control_shutdown.subscribe()));
            let mut slot = self.control_task.lock().unwrap_or_else(|p| p.into_inner());
            *slot = Some(task);
        }
        if let Some(addr) = control_addr {
            let _ = self.control_addr.set(addr);
        }

        let mut worker_task = {
            let workers = Arc::clone(&self.workers);
            tokio::spawn(async move { workers.start(&ports).await })
        };

        let cancelled = self.cancel.subscribe().wait();
        tokio::pin!(cancelled);

        let early_exit = tokio::select! {
            _ = &mut cancelled => None,
            result = &mut worker_task => Some(result),
        };

        match early_exit {
            None => {
                let mut errors = match self.stop().await {
                    Ok(()) => ShutdownError(Vec::new()),
                    Err(e) => e,
                };
                match tokio::time::timeout(self.options.shutdown_timeout, worker_task).await {
                    Ok(Ok(Err(e))) => {
                        for error in e.0 {
                            errors.push(error);
                        }
                    }
                    Ok(Err(join_error)) => errors.push(WorkerError::Panicked(join_error.to_string())),
                    // Listeners past the deadline were aborted; stop reported them.
                    Ok(Ok(Ok(()))) | Err(_) => {}
                }
                errors.into_result().map_err(ManagerError::Shutdown)
            }
            Some(Ok(Ok(()))) => {
                // No listeners to serve; the control endpoint keeps running.
                cancelled.await;
                self.stop().await.map_err(ManagerError::Shutdown)
            }
            Some(Ok(Err(source))) => {
                tracing::error!(error = %source, "Worker group failed");
                Err(ManagerError::Workers {
                    source,
                    shutdown: self.stop().await.err(),
                })
            }
            Some(Err(join_error)) => Err(ManagerError::Workers {
                source: WorkerGroupError(vec![WorkerError::Panicked(join_error.to_string())]),
                shutdown: self.stop().await.err(),
            }),
        }
    }

    /// Run the shutdown sequence. Only the first caller does the work; every
    /// other caller waits until the manager is stopped and gets the same
    /// outcome.
    pub async fn stop(&self) -> Result<(), ShutdownError> {
        let mut won = false;
        self.state.send_if_modified(|state| match *state {
            ManagerState::Running => {
                *state = ManagerState::ShuttingDown;
                won = true;
                true
            }
            ManagerState::Idle => {
                *state = ManagerState::Stopped;
                true
            }
            _ => false,
        });

        if !won {
            let mut rx = self.state.subscribe();
            let _ = rx.wait_for(|state| *state == ManagerState::Stopped).await;
            return self.outcome.get().cloned().unwrap_or(Ok(()));
        }

        tracing::info!(deadline = ?self.options.shutdown_timeout, "Shutting down");
        self.cancel.trigger();

        let deadline = self.options.shutdown_timeout;
        let (control, workers) = tokio::join!(
            self.shutdown_control(deadline),
            self.workers.shutdown(deadline)
        );

        let mut errors = ShutdownError(Vec::new());
        if let Err(e) = control {
            errors.push(e);
        }
        if let Err(e) = workers {
            for error in e.0 {
                errors.push(error);
            }
        }

        let outcome = errors.into_result();
        match &outcome {
            Ok(()) => tracing::info!("Shutdown complete"),
            Err(error) => tracing::warn!(error = %error, "Shutdown incomplete"),
        }
        let _ = self.outcome.set(outcome.clone());
        self.state.send_replace(ManagerState::Stopped);
        outcome
    }

    async fn shutdown_control(&self, deadline: Duration) -> Result<(), ControlError> {
        self.control_shutdown.trigger();

        let task = self
            .control_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        let Some(mut task) = task else {
            return Ok(());
        };

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ControlError::Panicked(e.to_string())),
            Err(_) => {
                task.abort();
                Err(ControlError::DrainTimeout(deadline))
            }
        }
    }

    pub fn handler(&self) -> &Arc<DynamicHandler> {
        &self.handler
    }

    pub fn reloader(&self) -> &Reloader {
        &self.reloader
    }

    /// Triggering the returned handle makes a running `start` shut down.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.cancel.clone()
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Address the control endpoint is bound to, once started.
    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control_addr.get().copied()
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{App, Route, Sink, Upstream};

    fn options() -> ManagerOptions {
        ManagerOptions {
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            shutdown_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn config(listeners: Vec<i64>) -> Config {
        Config {
            app: App {
                name: "demo".into(),
                listeners,
                routes: vec![Route {
                    path: "/svc".into(),
                    sink: "backend".into(),
                    ..Default::default()
                }],
                sinks: vec![Sink {
                    name: "backend".into(),
                    strategy: None,
                    upstreams: vec![Upstream {
                        address: "127.0.0.1".into(),
                        port: 9000,
                        weight: None,
                    }],
                }],
            },
        }
    }

    #[test]
    fn default_options() {
        let options = ManagerOptions::default();
        assert_eq!(options.control_address.port(), DEFAULT_CONTROL_PORT);
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_initial_config_is_fatal() {
        let manager = Manager::new(options());
        let mut bad = config(vec![]);
        bad.app.routes[0].sink = "missing".into();

        let err = manager.start(bad).await.unwrap_err();
        assert!(matches!(err, ManagerError::InitialConfig(_)));
        assert_eq!(manager.state(), ManagerState::Stopped);
    }

    #[tokio::test]
    async fn start_runs_until_cancelled() {
        let manager = Arc::new(Manager::new(options()));
        let task = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.start(config(vec![])).await })
        };

        for _ in 0..50 {
            if manager.control_addr().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.state(), ManagerState::Running);
        assert_eq!(manager.handler().generation(), 1);

        manager.shutdown_handle().trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(manager.state(), ManagerState::Stopped);

        // Starting again is refused.
        assert!(matches!(
            manager.start(config(vec![])).await,
            Err(ManagerError::InvalidState(ManagerState::Stopped))
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let manager = Arc::new(Manager::new(options()));
        let task = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.start(config(vec![])).await })
        };
        for _ in 0..50 {
            if manager.control_addr().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let (a, b) = tokio::join!(manager.stop(), manager.stop());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stop_before_start_stops() {
        let manager = Manager::new(options());
        assert!(manager.stop().await.is_ok());
        assert_eq!(manager.state(), ManagerState::Stopped);
    }

    #[test]
    fn shutdown_error_joins_messages() {
        let err = ShutdownError(vec![
            Arc::new(ControlError::DrainTimeout(Duration::from_secs(5))),
            Arc::new(WorkerError::DrainTimeout {
                port: 8080,
                deadline: Duration::from_secs(5),
            }),
        ]);
        let text = err.to_string();
        assert!(text.contains("control endpoint"));
        assert!(text.contains("8080"));
    }
}
