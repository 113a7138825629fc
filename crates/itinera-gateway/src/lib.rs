//! WebSocket gateway for the Itinera trip planner.
//!
//! Each connection sends `{sessionKey, text}` frames and receives a stream of
//! `UPDATE` progress frames followed by a `RESPONSE` and `DONE` per turn,
//! with `PING` heartbeats in between.

pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use connection::ConnectionState;
pub use error::GatewayError;
pub use protocol::{InboundFrame, OutboundFrame};
pub use registry::{ConnectionRegistry, Outbox};
pub use server::GatewayServer;
