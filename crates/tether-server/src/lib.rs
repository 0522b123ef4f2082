//! Tether relay server.
//!
//! Production server relaying controller messages to the targets of a room
//! over WebSockets, using axum for HTTP/WebSocket transport, Tokio for the
//! async runtime, and system time with cryptographic RNG.
//!
//! # Architecture
//!
//! The [`RelayDriver`] is a synchronous, action-based state machine: the
//! runtime feeds it [`ServerEvent`]s and executes the [`ServerAction`]s it
//! returns. [`Server`] is the production runtime around it. Tests and the
//! simulation harness drive the same driver with in-memory handles.
//!
//! # Components
//!
//! - [`RelayDriver`]: joins, relays and disconnect handling (no I/O)
//! - [`RoomRegistry`]: room ID to controller and targets
//! - [`presence`]: target-count notifications for controllers
//! - [`reconciler`]: registry cleanup when a connection closes
//! - [`Server`]: production runtime that executes driver actions
//! - [`SystemEnv`]: production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connections;
mod driver;
mod driver_error;
mod error;
pub mod presence;
pub mod reconciler;
mod registry;
mod system_env;
pub mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

pub use connections::{ConnectionEntry, ConnectionTable, Delivery, tally_deliveries};
pub use driver::{LogLevel, RelayConfig, RelayDriver, ServerAction, ServerEvent, StatusReport};
pub use driver_error::DriverError;
pub use error::ServerError;
pub use registry::{Room, RoomRegistry};
pub use system_env::SystemEnv;
use tokio::{net::TcpListener, sync::Mutex};
pub use transport::{AppState, ChannelHandle, Outbound, SharedDriver, SharedState};

/// Time given to writer tasks to flush close frames on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3000")
    pub bind_address: String,
    /// Driver configuration (secret, limits)
    pub driver: RelayConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:3000".to_string(), driver: RelayConfig::default() }
    }
}

/// Production Tether server.
///
/// Wraps `RelayDriver` with axum WebSocket transport and system environment.
pub struct Server {
    /// The action-based relay driver
    driver: SharedDriver,
    /// Outbound queues of live sockets
    shared: Arc<SharedState>,
    /// Bound TCP listener
    listener: TcpListener,
}

impl Server {
    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Config`] if the room secret is empty or the bind
    ///   address does not parse
    /// - [`ServerError::Transport`] if the address cannot be bound
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.driver.room_secret.is_empty() {
            return Err(ServerError::Config("room secret must not be empty".to_string()));
        }

        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ServerError::Config(format!("invalid bind address '{}': {e}", config.bind_address))
        })?;

        let listener = TcpListener::bind(addr).await?;
        let driver = RelayDriver::new(SystemEnv::new(), config.driver);

        Ok(Self {
            driver: Arc::new(Mutex::new(driver)),
            shared: Arc::new(SharedState::new()),
            listener,
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// On shutdown the listener stops accepting, every live socket is sent a
    /// close frame, and writers get a short grace period to flush.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Server starting on {}", self.local_addr()?);

        let shared = Arc::clone(&self.shared);
        let signal = async move {
            shutdown.await;
            let closed = transport::close_all(&shared, "server shutting down").await;
            tracing::info!("Shutting down, closing {} connections", closed);
        };

        let app = transport::router(AppState::new(self.driver, Arc::clone(&self.shared)));
        axum::serve(self.listener, app).with_graceful_shutdown(signal).await?;

        tokio::time::sleep(SHUTDOWN_GRACE).await;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// A signal that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
