//! Client session manager for the chatlink JSON-RPC-over-WebSocket messaging
//! protocol.
//!
//! A [`Session`] owns one logical connection: it opens a transport,
//! authenticates with the `connect` handshake, correlates requests with their
//! responses, probes liveness with a keepalive loop, reconnects with
//! exponential backoff after unexpected closes, and routes server
//! notifications to registered listeners.
//!
//! ```ignore
//! use chatlink::{Credentials, EventKind, SessionEvent, SessionOptions};
//!
//! let session = chatlink::init("wss://im.example.com/ws", Credentials::new("u1", "token"), SessionOptions::default())?;
//! session.on(EventKind::Message, |event| {
//!     if let SessionEvent::Message(message) = event {
//!         println!("{} says {}", message.from_uid.as_deref().unwrap_or("?"), message.payload);
//!     }
//! });
//! session.connect().await?;
//! session.send("general", 2, serde_json::json!({"text": "hi"}), Default::default()).await?;
//! ```

mod correlator;
pub mod error;
pub mod events;
pub mod identity;
mod keepalive;
pub mod options;
pub mod reconnect;
pub mod registry;
mod router;
pub mod session;

pub use chatlink_protocol as protocol;
pub use chatlink_protocol::{ConnectResult, DeviceFlag, Header, ReasonCode, RecvMessage, SendResult};
pub use chatlink_runtime as runtime;
pub use chatlink_runtime::{Connector, WebSocketConnector};
pub use error::{Error, Result};
pub use events::{CustomEvent, DisconnectInitiator, DisconnectReason, EventKind, ListenerId, SendAck, SessionEvent};
pub use identity::Credentials;
pub use options::SessionOptions;
pub use registry::SessionRegistry;
pub use session::{ConnectionState, SendOptions, Session};

/// Creates a session on the process-wide registry using WebSocket transports.
///
/// With `options.singleton` set, any previously registered session is
/// destroyed first.
pub fn init(url: impl Into<String>, credentials: Credentials, options: SessionOptions) -> Result<Session> {
	SessionRegistry::global().init(url, credentials, options, WebSocketConnector::new())
}
