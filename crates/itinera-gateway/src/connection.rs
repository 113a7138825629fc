//! One WebSocket connection: a reader loop, a writer task that owns the
//! socket sink, and a heartbeat.
//!
//! Everything bound for the client (heartbeats, progress, replies, errors)
//! goes through the connection's [`Outbox`], so frames are written in the
//! order they were enqueued. Turns run on their own task and reach the
//! client through the [`ConnectionRegistry`], which keeps the reader free to
//! accept the next frame while a turn is still searching or writing.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use itinera_planner::{
    Planner, ProgressEvent, SessionState, SessionStore, TurnInput, TurnObserver,
};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::protocol::{InboundFrame, OutboundFrame};
use crate::registry::{ConnectionRegistry, Outbox};

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

/// Shared by every connection of one gateway.
#[derive(Clone)]
pub struct GatewayContext {
    pub planner: Arc<Planner>,
    pub store: Arc<SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Connection {
    id: String,
    state: ConnectionState,
    outbox: Outbox,
    session_keys: HashSet<String>,
    context: GatewayContext,
}

impl Connection {
    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(
            connection_id = %self.id,
            from = %self.state,
            to = %next,
            "connection state changed"
        );
        self.state = next;
    }

    fn handle_text(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(connection_id = %self.id, error = %err, "rejected frame");
                self.outbox.send(OutboundFrame::Error(err.to_string()));
                return;
            }
        };

        let session_key = frame.session_key.clone();
        self.context
            .registry
            .register(&session_key, self.outbox.clone());
        self.session_keys.insert(session_key.clone());

        let session = self.context.store.get_or_create(&session_key);
        let guard = match session.try_begin_turn() {
            Ok(guard) => guard,
            Err(err) => {
                tracing::info!(
                    connection_id = %self.id,
                    session_key = %session_key,
                    "turn rejected, session busy"
                );
                self.outbox.send(OutboundFrame::Error(err.to_string()));
                return;
            }
        };

        tokio::spawn(run_turn(
            Arc::clone(&self.context.planner),
            Arc::clone(&self.context.registry),
            session_key,
            guard,
            frame.into_turn_input(),
        ));
    }

    fn release(&mut self) {
        for key in self.session_keys.drain() {
            self.context.registry.deregister_connection(&key, &self.id);
        }
    }
}

/// Serve one upgraded socket until the client goes away.
pub async fn handle_socket(socket: WebSocket, context: GatewayContext) {
    let id = format!("conn_{}", Uuid::new_v4().simple());
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let outbox = Outbox::new(id.clone(), tx);

    let mut connection = Connection {
        id,
        state: ConnectionState::Connecting,
        outbox,
        session_keys: HashSet::new(),
        context,
    };

    tokio::spawn(write_frames(sink, rx, connection.id.clone()));
    let heartbeat = spawn_heartbeat(
        connection.outbox.clone(),
        connection.context.heartbeat_interval,
    );
    connection.transition(ConnectionState::Open);
    tracing::info!(connection_id = %connection.id, "client connected");

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => connection.handle_text(text.as_str()),
            Ok(Message::Binary(_)) => {
                connection.outbox.send(OutboundFrame::Error(
                    "Binary frames are not supported".to_string(),
                ));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(connection_id = %connection.id, error = %e, "websocket error");
                break;
            }
        }
    }

    connection.transition(ConnectionState::Closing);
    heartbeat.abort();
    connection.release();
    connection.transition(ConnectionState::Closed);
    tracing::info!(connection_id = %connection.id, "client disconnected");
}

/// The only writer to the socket. Exits once every [`Outbox`] clone is
/// dropped or the client stops accepting frames.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    connection_id: String,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(Message::text(frame.to_json())).await {
            tracing::debug!(connection_id = %connection_id, error = %e, "write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

fn spawn_heartbeat(outbox: Outbox, interval: Duration) -> JoinHandle<()> {
    let period = interval.max(MIN_HEARTBEAT_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !outbox.send(OutboundFrame::Ping) {
                break;
            }
        }
    })
}

/// Forwards progress to whichever connection currently owns the session.
struct RegistryObserver<'a> {
    registry: &'a ConnectionRegistry,
    session_key: &'a str,
}

impl TurnObserver for RegistryObserver<'_> {
    fn notify(&self, event: ProgressEvent) {
        self.registry
            .send(self.session_key, OutboundFrame::Update(event.message().to_string()));
    }
}

async fn run_turn(
    planner: Arc<Planner>,
    registry: Arc<ConnectionRegistry>,
    session_key: String,
    mut session: OwnedMutexGuard<SessionState>,
    input: TurnInput,
) {
    let observer = RegistryObserver {
        registry: &registry,
        session_key: &session_key,
    };
    let result = planner.run_turn(&mut session, input, &observer).await;
    // Unlock before the final frames so a client reacting to DONE is not
    // turned away as busy.
    drop(session);

    match result {
        Ok(outcome) => {
            registry.send(&session_key, OutboundFrame::Response(outcome.reply));
            registry.send(&session_key, OutboundFrame::Done);
        }
        Err(err) => {
            tracing::warn!(session_key = %session_key, error = %err, "turn failed");
            registry.send(&session_key, OutboundFrame::Error(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_planner::{NoopObserver, Stage};

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_registry_observer_forwards_updates() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("alice", Outbox::new("c1", tx));

        let observer = RegistryObserver {
            registry: &registry,
            session_key: "alice",
        };
        observer.notify(ProgressEvent::Stage(Stage::GatherInfo));
        observer.notify(ProgressEvent::PlanningStarted);
        NoopObserver.notify(ProgressEvent::PlanningStarted);

        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Update("Analyzing your request...".into())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Update("All_Details_Fetched".into())
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_pings_until_receiver_closes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let heartbeat = spawn_heartbeat(Outbox::new("c1", tx), Duration::from_millis(20));

        assert_eq!(rx.recv().await, Some(OutboundFrame::Ping));
        assert_eq!(rx.recv().await, Some(OutboundFrame::Ping));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), heartbeat)
            .await
            .expect("heartbeat should stop once the mailbox is gone")
            .unwrap();
    }
}
