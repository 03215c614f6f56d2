//! Signal handling for graceful shutdown

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("failed to register {signal} handler")]
    Register {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Handles shutdown signals (SIGTERM, SIGINT)
///
/// Handlers are registered up front so a signal arriving during startup is
/// not lost.
pub struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignal {
    /// Register the signal handlers
    pub fn new() -> Result<Self, ShutdownError> {
        Ok(Self {
            sigterm: register(SignalKind::terminate(), "SIGTERM")?,
            sigint: register(SignalKind::interrupt(), "SIGINT")?,
        })
    }

    /// Wait for a shutdown signal
    pub async fn wait(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }
}

fn register(kind: SignalKind, name: &'static str) -> Result<Signal, ShutdownError> {
    signal(kind).map_err(|source| ShutdownError::Register {
        signal: name,
        source,
    })
}
