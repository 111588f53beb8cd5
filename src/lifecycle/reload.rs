//! Configuration installation.
//!
//! Every path that changes routing (boot, control endpoint, file watcher)
//! goes through [`Reloader::install`]: admit, compile, publish. A refused
//! configuration leaves the live chain untouched.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::admission::{admit, AdmissionError};
use crate::config::schema::Config;
use crate::http::proxy::Transport;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::routing::{compile, CompileError, CompiledChain, DynamicHandler};

/// Why a configuration was not installed.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("route compilation failed: {0}")]
    Compile(#[from] CompileError),
}

impl ReloadError {
    fn stage(&self) -> &'static str {
        match self {
            ReloadError::Admission(_) => "admission_failed",
            ReloadError::Compile(_) => "compile_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reloader {
    handler: Arc<DynamicHandler>,
    transport: Transport,
}

impl Reloader {
    pub fn new(handler: Arc<DynamicHandler>, transport: Transport) -> Self {
        Self { handler, transport }
    }

    pub fn handler(&self) -> &Arc<DynamicHandler> {
        &self.handler
    }

    /// Admit and compile without publishing.
    pub fn prepare(&self, config: Config) -> Result<CompiledChain, ReloadError> {
        let app = admit(config.app)?;
        Ok(compile(&app, &self.transport)?)
    }

    /// Admit, compile and publish `config`. Returns the new generation.
    pub fn install(&self, config: Config) -> Result<u64, ReloadError> {
        let chain = match self.prepare(config) {
            Ok(chain) => chain,
            Err(e) => {
                metrics::record_reload(e.stage());
                tracing::warn!(error = %e, "Configuration refused, keeping current routing table");
                return Err(e);
            }
        };

        let previous = self.handler.snapshot();
        if previous.generation() > 0 && previous.listeners() != chain.listeners() {
            tracing::warn!(
                current = ?previous.listeners(),
                requested = ?chain.listeners(),
                "Listener set changed; new ports take effect on restart"
            );
        }

        let app = chain.app_name().to_string();
        let routes = chain.routes().len();
        let generation = self.handler.replace(chain);

        metrics::record_reload("success");
        tracing::info!(generation, app = %app, routes, "routing table installed");
        Ok(generation)
    }

    /// Install every configuration received on `updates` until `signal` fires
    /// or the sender goes away.
    pub async fn apply_updates(
        &self,
        mut updates: mpsc::UnboundedReceiver<Config>,
        signal: ShutdownSignal,
    ) {
        let stop = signal.wait();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                update = updates.recv() => match update {
                    Some(config) => {
                        // Failures are logged by install.
                        let _ = self.install(config);
                    }
                    None => break,
                },
            }
        }
    }
}
