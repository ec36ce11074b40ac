//! `PighouseServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → gateway. A single
//! maintenance task shares the gateway lock with the connection tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pighouse_protocol::{Codec, JsonCodec};
use pighouse_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::gateway::Gateway;
use crate::handler::handle_connection;
use crate::PighouseError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) gateway: Mutex<Gateway>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Pighouse server.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), pighouse::PighouseError> {
/// let server = pighouse::PighouseServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PighouseServerBuilder {
    config: ServerConfig,
    seed: Option<u64>,
}

impl PighouseServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            seed: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Seeds room codes and deals, for reproducible test runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<PighouseServer, PighouseError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let game = self.config.game.clone();
        let session = self.config.session.clone();
        let gateway = match self.seed {
            Some(seed) => Gateway::with_seed(game, session, seed),
            None => Gateway::new(game, session),
        };

        let state = Arc::new(ServerState {
            gateway: Mutex::new(gateway),
            codec: JsonCodec,
        });

        Ok(PighouseServer {
            transport,
            state,
            config: self.config,
        })
    }
}

impl Default for PighouseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pighouse server. Call [`run()`](Self::run) to start serving.
pub struct PighouseServer {
    transport: WebSocketTransport,
    state: Arc<ServerState<JsonCodec>>,
    config: ServerConfig,
}

impl PighouseServer {
    pub fn builder() -> PighouseServerBuilder {
        PighouseServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections and runs maintenance until the process is
    /// terminated.
    ///
    /// # Errors
    /// [`PighouseError::TaskFailed`] if the maintenance task stops.
    pub async fn run(mut self) -> Result<(), PighouseError> {
        tracing::info!(bind = %self.config.bind_addr, "pighouse server running");

        let mut maintenance = spawn_maintenance(
            Arc::clone(&self.state),
            self.config.sweep_interval().max(Duration::from_secs(1)),
            self.config.room_idle(),
        );

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                joined = &mut maintenance => {
                    let reason = match joined {
                        Ok(()) => "exited".to_string(),
                        Err(e) => e.to_string(),
                    };
                    tracing::error!(%reason, "maintenance task stopped");
                    return Err(PighouseError::TaskFailed("maintenance", reason));
                }
            }
        }
    }
}

fn spawn_maintenance(
    state: Arc<ServerState<JsonCodec>>,
    every: Duration,
    room_idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = state.gateway.lock().await.sweep(Instant::now(), room_idle);
            if !report.is_empty() {
                tracing::info!(
                    idle_connections = report.idle_connections,
                    expired_seats = report.expired_seats,
                    closed_rooms = report.closed_rooms,
                    "maintenance sweep"
                );
            }
        }
    })
}
