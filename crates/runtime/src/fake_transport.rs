//! Fake connector for unit testing session logic without a server.
//!
//! Every transport the session opens is surfaced to the test as a
//! [`FakeServer`], which can open it, inject frames, inspect what the client
//! wrote, and close it from the server side.
//!
//! # Example
//!
//! ```ignore
//! let (connector, controller) = FakeConnectorBuilder::new().build();
//! let session = Session::new(url, credentials, options, connector)?;
//!
//! let connecting = tokio::spawn({
//!     let session = session.clone();
//!     async move { session.connect().await }
//! });
//!
//! let server = controller.next_server().await;
//! let handshake = server.next_sent().await;
//! server.inject_response(handshake["id"].as_str().unwrap(), json!({"reasonCode": 1}));
//! connecting.await??;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::transport::{Connector, ReadyState, TransportEvent, TransportHandle, TransportParts, close_code, truncate_close_reason};

/// Builder for creating fake connector instances.
pub struct FakeConnectorBuilder {
	auto_open: bool,
}

impl FakeConnectorBuilder {
	pub fn new() -> Self {
		Self { auto_open: true }
	}

	/// Emit `Open` as soon as a transport is created (default: true).
	///
	/// With auto-open disabled the transport stays in
	/// [`ReadyState::Connecting`] until [`FakeServer::open`] is called.
	pub fn auto_open(mut self, auto_open: bool) -> Self {
		self.auto_open = auto_open;
		self
	}

	/// Build the connector and the controller that observes it.
	pub fn build(self) -> (FakeConnector, FakeConnectorController) {
		let (server_tx, server_rx) = mpsc::unbounded_channel();
		let shared = Arc::new(ConnectorShared {
			auto_open: self.auto_open,
			refusing: AtomicBool::new(false),
			attempts: AtomicUsize::new(0),
		});

		let connector = FakeConnector {
			shared: Arc::clone(&shared),
			servers: server_tx,
		};
		let controller = FakeConnectorController {
			shared,
			servers: tokio::sync::Mutex::new(server_rx),
		};
		(connector, controller)
	}
}

impl Default for FakeConnectorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ConnectorShared {
	auto_open: bool,
	refusing: AtomicBool,
	attempts: AtomicUsize,
}

/// In-memory [`Connector`].
#[derive(Clone)]
pub struct FakeConnector {
	shared: Arc<ConnectorShared>,
	servers: mpsc::UnboundedSender<FakeServer>,
}

impl Connector for FakeConnector {
	fn open(&self, _url: &str) -> Result<TransportParts> {
		self.shared.attempts.fetch_add(1, Ordering::SeqCst);
		let (event_tx, event_rx) = mpsc::unbounded_channel();

		if self.shared.refusing.load(Ordering::SeqCst) {
			let state = Arc::new(Mutex::new(ReadyState::Closed));
			let _ = event_tx.send(TransportEvent::Error("connection refused".to_string()));
			let _ = event_tx.send(TransportEvent::Close {
				code: close_code::ABNORMAL,
				reason: "connection refused".to_string(),
			});
			let (sent_tx, _) = mpsc::unbounded_channel();
			let handle = FakeHandle {
				state,
				events: event_tx,
				sent: sent_tx,
				client_close: Arc::new(Mutex::new(None)),
			};
			return Ok(TransportParts {
				handle: Arc::new(handle),
				events: event_rx,
			});
		}

		let state = Arc::new(Mutex::new(ReadyState::Connecting));
		let client_close = Arc::new(Mutex::new(None));
		let (sent_tx, sent_rx) = mpsc::unbounded_channel();

		let handle = FakeHandle {
			state: Arc::clone(&state),
			events: event_tx.clone(),
			sent: sent_tx,
			client_close: Arc::clone(&client_close),
		};
		let server = FakeServer {
			state,
			events: event_tx,
			sent: tokio::sync::Mutex::new(sent_rx),
			client_close,
		};

		if self.shared.auto_open {
			server.open();
		}
		let _ = self.servers.send(server);

		Ok(TransportParts {
			handle: Arc::new(handle),
			events: event_rx,
		})
	}
}

/// Test-side view of a [`FakeConnector`].
pub struct FakeConnectorController {
	shared: Arc<ConnectorShared>,
	servers: tokio::sync::Mutex<mpsc::UnboundedReceiver<FakeServer>>,
}

impl FakeConnectorController {
	/// Wait for the next transport the client opens.
	///
	/// Refused attempts never produce a server.
	pub async fn next_server(&self) -> FakeServer {
		self.servers.lock().await.recv().await.expect("fake connector dropped")
	}

	/// Returns the next opened transport if one is already waiting.
	pub fn try_next_server(&self) -> Option<FakeServer> {
		self.servers.try_lock().ok()?.try_recv().ok()
	}

	/// Make every subsequent `open` fail with an error and an abnormal close.
	pub fn set_refusing(&self, refusing: bool) {
		self.shared.refusing.store(refusing, Ordering::SeqCst);
	}

	/// Number of `open` calls, refused ones included.
	pub fn open_attempts(&self) -> usize {
		self.shared.attempts.load(Ordering::SeqCst)
	}
}

/// Server end of one fake transport.
pub struct FakeServer {
	state: Arc<Mutex<ReadyState>>,
	events: mpsc::UnboundedSender<TransportEvent>,
	sent: tokio::sync::Mutex<mpsc::UnboundedReceiver<JsonValue>>,
	client_close: Arc<Mutex<Option<(u16, String)>>>,
}

impl FakeServer {
	/// Complete the connection: the client observes `Open`.
	pub fn open(&self) {
		{
			let mut state = self.state.lock();
			if *state != ReadyState::Connecting {
				return;
			}
			*state = ReadyState::Open;
		}
		let _ = self.events.send(TransportEvent::Open);
	}

	pub fn ready_state(&self) -> ReadyState {
		*self.state.lock()
	}

	/// Inject a raw text frame.
	pub fn inject_text(&self, text: impl Into<String>) {
		let _ = self.events.send(TransportEvent::Message(text.into()));
	}

	/// Inject a JSON frame.
	pub fn inject(&self, message: JsonValue) {
		self.inject_text(message.to_string());
	}

	/// Inject a response message with the given ID and result.
	pub fn inject_response(&self, id: &str, result: JsonValue) {
		self.inject(serde_json::json!({
			"id": id,
			"result": result
		}));
	}

	/// Inject an error response message.
	pub fn inject_error(&self, id: &str, code: i64, message: &str) {
		self.inject(serde_json::json!({
			"id": id,
			"error": {
				"code": code,
				"message": message
			}
		}));
	}

	/// Inject a notification frame.
	pub fn inject_notification(&self, method: &str, params: JsonValue) {
		self.inject(serde_json::json!({
			"method": method,
			"params": params
		}));
	}

	/// Report a transport error without closing.
	pub fn inject_transport_error(&self, message: &str) {
		let _ = self.events.send(TransportEvent::Error(message.to_string()));
	}

	/// Close the transport from the server side.
	pub fn close(&self, code: u16, reason: &str) {
		{
			let mut state = self.state.lock();
			if *state == ReadyState::Closed {
				return;
			}
			*state = ReadyState::Closed;
		}
		let _ = self.events.send(TransportEvent::Close {
			code,
			reason: reason.to_string(),
		});
	}

	/// Wait for the next frame the client wrote, parsed as JSON.
	pub async fn next_sent(&self) -> JsonValue {
		self.sent.lock().await.recv().await.expect("fake transport dropped")
	}

	/// Returns the next written frame if one is already queued.
	pub fn try_next_sent(&self) -> Option<JsonValue> {
		self.sent.try_lock().ok()?.try_recv().ok()
	}

	/// Drain every frame written so far.
	pub fn take_sent(&self) -> Vec<JsonValue> {
		let mut frames = Vec::new();
		while let Some(frame) = self.try_next_sent() {
			frames.push(frame);
		}
		frames
	}

	/// Code and reason of the client's `close` call, if it made one.
	pub fn client_close(&self) -> Option<(u16, String)> {
		self.client_close.lock().clone()
	}
}

struct FakeHandle {
	state: Arc<Mutex<ReadyState>>,
	events: mpsc::UnboundedSender<TransportEvent>,
	sent: mpsc::UnboundedSender<JsonValue>,
	client_close: Arc<Mutex<Option<(u16, String)>>>,
}

impl TransportHandle for FakeHandle {
	fn send(&self, text: String) -> Result<()> {
		let state = *self.state.lock();
		if state != ReadyState::Open {
			return Err(TransportError::NotOpen(state));
		}
		let frame = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
		let _ = self.sent.send(frame);
		Ok(())
	}

	fn ready_state(&self) -> ReadyState {
		*self.state.lock()
	}

	fn close(&self, code: u16, reason: &str) {
		{
			let mut state = self.state.lock();
			if matches!(*state, ReadyState::Closing | ReadyState::Closed) {
				return;
			}
			*state = ReadyState::Closed;
		}
		let reason = truncate_close_reason(reason).to_string();
		*self.client_close.lock() = Some((code, reason.clone()));
		let _ = self.events.send(TransportEvent::Close { code, reason });
	}
}
