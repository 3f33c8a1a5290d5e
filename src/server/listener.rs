//! Relay server listener
//!
//! Binds the HTTP listener, runs the status ticker and hands upgraded sockets
//! to sessions.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::{ServerConfig, MIN_STATUS_INTERVAL};
use super::routes;
use crate::error::Result;
use crate::registry::Scope;
use crate::relay::Relay;
use crate::session::{Session, SessionContext};

/// Slot in the session limit, released on drop
pub(crate) struct SessionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Relay HTTP/WebSocket server
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a new server serving `relay`
    pub fn new(config: ServerConfig, relay: Arc<Relay>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            relay,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
        }
    }

    /// Relay served by this server
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind the configured address and serve until `shutdown` resolves
    ///
    /// A bind failure is returned; nothing after startup is fatal.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let status_handle = self.spawn_status_task();

        let token = self.shutdown.clone();
        let app = routes::router(Arc::clone(&self));
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            // Upgraded sockets are not tracked by axum; end their sessions here
            token.cancel();
        })
        .await;

        status_handle.abort();
        self.shutdown.cancel();
        tracing::info!("Relay server stopped");

        result.map_err(Into::into)
    }

    /// Log relay status every `status_interval`
    pub fn spawn_status_task(&self) -> JoinHandle<()> {
        let relay = Arc::clone(&self.relay);
        let every = self.config.status_interval;

        tokio::spawn(async move {
            let every = every.max(MIN_STATUS_INTERVAL);
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let status = relay.status().await;
                tracing::info!(
                    bus_connected = status.stats.bus_connected,
                    devices = status.devices,
                    specific_subscribers = status.specific_subscribers,
                    all_subscribers = status.all_subscribers,
                    watched_devices = status.watched_devices,
                    active_sessions = status.stats.active_sessions(),
                    "Relay status"
                );

                for (device, subscribers) in relay.registry().device_counts().await {
                    tracing::debug!(device = %device, subscribers = subscribers, "Device watchers");
                }
            }
        })
    }

    /// Take a session slot; `None` when the limit is reached
    pub(crate) fn try_acquire_session(&self) -> Option<SessionPermit> {
        match self.connection_semaphore {
            Some(ref sem) => sem
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| SessionPermit {
                    _permit: Some(permit),
                }),
            None => Some(SessionPermit { _permit: None }),
        }
    }

    /// Context for a new session
    pub(crate) fn session_context(&self, scope: Scope, peer: Option<SocketAddr>) -> SessionContext {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let ctx = SessionContext::new(session_id, scope);
        match peer {
            Some(addr) => ctx.with_peer(addr),
            None => ctx,
        }
    }

    /// Drive an upgraded socket until the session ends
    pub(crate) async fn serve_socket(
        self: Arc<Self>,
        socket: WebSocket,
        ctx: SessionContext,
        permit: SessionPermit,
    ) {
        let session_id = ctx.session_id;
        tracing::debug!(session_id = session_id, scope = %ctx.scope, "New connection");

        let (sink, stream) = socket.split();
        let session = Session::new(ctx, Arc::clone(&self.relay), self.config.session)
            .with_shutdown(self.shutdown.child_token());

        match session.run(sink, stream).await {
            Ok(state) => {
                tracing::debug!(
                    session_id = session_id,
                    reason = ?state.close_reason,
                    "Connection closed"
                );
            }
            Err(e) => {
                tracing::debug!(session_id = session_id, error = %e, "Connection error");
            }
        }

        drop(permit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_limit() {
        let server = RelayServer::new(
            ServerConfig::default().max_connections(1),
            Arc::new(Relay::default()),
        );

        let first = server.try_acquire_session();
        assert!(first.is_some());
        assert!(server.try_acquire_session().is_none());

        drop(first);
        assert!(server.try_acquire_session().is_some());
    }

    #[test]
    fn test_unlimited_sessions() {
        let server = RelayServer::new(ServerConfig::default(), Arc::new(Relay::default()));
        let permits: Vec<_> = (0..100).filter_map(|_| server.try_acquire_session()).collect();

        assert_eq!(permits.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_task_survives_zero_interval() {
        let mut config = ServerConfig::default();
        config.status_interval = std::time::Duration::ZERO;
        let server = RelayServer::new(config, Arc::new(Relay::default()));

        let handle = server.spawn_status_task();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn test_session_ids_increase() {
        let server = RelayServer::new(ServerConfig::default(), Arc::new(Relay::default()));

        let a = server.session_context(Scope::AllDevices, None);
        let b = server.session_context(Scope::device("AA:BB"), None);

        assert_eq!(a.session_id, 1);
        assert_eq!(b.session_id, 2);
        assert_eq!(b.scope, Scope::device("AA:BB"));
    }

    #[tokio::test]
    async fn test_bind_failure_is_returned() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = Arc::new(RelayServer::new(
            ServerConfig::with_addr(addr),
            Arc::new(Relay::default()),
        ));

        assert!(server.run_until(async {}).await.is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Arc::new(RelayServer::new(
            ServerConfig::default(),
            Arc::new(Relay::default()),
        ));

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            server.serve(listener, async {}),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }
}
