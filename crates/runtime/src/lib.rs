//! Transport layer for chatlink sessions.
//!
//! The session core never touches sockets directly. It asks a [`Connector`]
//! to open a transport and receives a [`TransportHandle`] for writing plus an
//! ordered stream of [`TransportEvent`]s (open, message, error, close).
//!
//! Two connectors ship here:
//! * [`WebSocketConnector`] - tokio-tungstenite client used in production
//! * [`FakeConnector`] - in-memory transport for tests

pub mod error;
pub mod fake_transport;
pub mod transport;
pub mod websocket;

pub use error::{Result, TransportError};
pub use fake_transport::{FakeConnector, FakeConnectorBuilder, FakeConnectorController, FakeServer};
pub use transport::{Connector, ReadyState, TransportEvent, TransportHandle, TransportParts, close_code, truncate_close_reason};
pub use websocket::WebSocketConnector;
