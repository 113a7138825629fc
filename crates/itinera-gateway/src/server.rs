use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, Router};
use itinera_config::GatewaySettings;
use itinera_planner::{Planner, SessionStore};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::connection::{handle_socket, GatewayContext};
use crate::error::GatewayError;
use crate::registry::ConnectionRegistry;

struct AppState {
    context: GatewayContext,
    start_time: Instant,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_connections: usize,
    active_sessions: usize,
    version: &'static str,
}

pub struct GatewayServer {
    planner: Arc<Planner>,
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    heartbeat_interval: Duration,
    idle_timeout: Option<Duration>,
    sweep_interval: Duration,
}

impl GatewayServer {
    pub fn new(planner: Arc<Planner>) -> Self {
        Self::from_settings(planner, &GatewaySettings::default())
    }

    pub fn from_settings(planner: Arc<Planner>, settings: &GatewaySettings) -> Self {
        Self {
            planner,
            store: Arc::new(SessionStore::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs),
            idle_timeout: settings.session_idle_timeout_secs.map(Duration::from_secs),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Drop sessions idle for longer than `timeout`, checking every
    /// `sweep_interval`. Only takes effect through [`GatewayServer::start`].
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>, sweep_interval: Duration) -> Self {
        self.idle_timeout = timeout;
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            context: GatewayContext {
                planner: Arc::clone(&self.planner),
                store: Arc::clone(&self.store),
                registry: Arc::clone(&self.registry),
                heartbeat_interval: self.heartbeat_interval,
            },
            start_time: Instant::now(),
        });
        Router::new()
            .route("/ws", axum::routing::any(ws_handler))
            .route("/health", axum::routing::get(health_handler))
            .with_state(state)
    }

    pub async fn start(&self, host: &str, port: u16) -> Result<(), GatewayError> {
        let app = self.router();
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        let sweeper = self
            .idle_timeout
            .map(|ttl| spawn_idle_sweeper(Arc::clone(&self.store), ttl, self.sweep_interval));

        tracing::info!("Gateway started on ws://{}/ws", addr);

        let served = axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()));

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        served
    }
}

fn spawn_idle_sweeper(
    store: Arc<SessionStore>,
    ttl: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tracing::info!(
        idle_timeout_secs = ttl.as_secs(),
        sweep_interval_secs = every.as_secs(),
        "idle session sweeper enabled"
    );
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(ttl);
            if evicted > 0 {
                tracing::info!(evicted, remaining = store.len(), "evicted idle sessions");
            }
        }
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok",
        uptime_secs,
        active_connections: state.context.registry.connection_count(),
        active_sessions: state.context.store.len(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let context = state.context.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}
