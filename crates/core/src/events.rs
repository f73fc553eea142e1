//! Session events and listener registry.
//!
//! Listeners are registered per [`EventKind`] with [`Session::on`] and removed
//! with [`Session::off`]:
//!
//! ```ignore
//! let id = session.on(EventKind::Message, |event| {
//!     if let SessionEvent::Message(message) = event {
//!         println!("{}: {}", message.channel_id, message.payload);
//!     }
//! });
//! session.off(EventKind::Message, id);
//! ```
//!
//! Listeners run synchronously on the dispatch path, without any session lock
//! held, so they may call back into the session. A panicking listener is
//! logged and skipped; later listeners still run.
//!
//! [`Session::on`]: crate::Session::on
//! [`Session::off`]: crate::Session::off

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chatlink_protocol::{ConnectResult, DisconnectNotice, ReasonCode, RecvMessage, SendResult};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;

use crate::error::Error;

/// Event categories listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	Connect,
	Disconnect,
	Message,
	Error,
	SendAck,
	Reconnecting,
	CustomEvent,
}

/// Who ended a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectInitiator {
	/// `disconnect()`, `destroy()`, a failed handshake, a keepalive timeout, or the teardown signal.
	Client,
	/// A `disconnect` notification from the server.
	Server,
	/// The transport closed on its own.
	Transport,
}

/// Reason for a disconnect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
	pub initiator: DisconnectInitiator,
	/// WebSocket close code (e.g. 1000 = normal, 1006 = abnormal).
	pub code: u16,
	pub message: String,
	/// Server-supplied classification, for server-initiated disconnects.
	pub reason_code: Option<ReasonCode>,
}

impl DisconnectReason {
	pub fn client(code: u16, message: impl Into<String>) -> Self {
		Self {
			initiator: DisconnectInitiator::Client,
			code,
			message: message.into(),
			reason_code: None,
		}
	}

	pub fn transport(code: u16, message: impl Into<String>) -> Self {
		Self {
			initiator: DisconnectInitiator::Transport,
			code,
			message: message.into(),
			reason_code: None,
		}
	}

	pub fn server(code: u16, notice: DisconnectNotice) -> Self {
		Self {
			initiator: DisconnectInitiator::Server,
			code,
			message: notice.reason,
			reason_code: Some(notice.reason_code),
		}
	}
}

impl fmt::Display for DisconnectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.message.is_empty() {
			write!(f, "closed (code: {})", self.code)
		} else {
			write!(f, "{} (code: {})", self.message, self.code)
		}
	}
}

/// Result of a `send`, delivered to `SendAck` listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct SendAck {
	pub client_msg_no: String,
	pub channel_id: String,
	pub channel_type: u8,
	pub result: SendResult,
}

/// Validated `event` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
	pub id: String,
	pub kind: String,
	pub timestamp: Option<i64>,
	/// Event data; JSON-encoded strings are decoded when possible.
	pub data: Value,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
	Connect(ConnectResult),
	Disconnect(DisconnectReason),
	Message(RecvMessage),
	Error(Error),
	SendAck(SendAck),
	Reconnecting { attempt: u32, delay: Duration },
	CustomEvent(CustomEvent),
}

impl SessionEvent {
	pub fn kind(&self) -> EventKind {
		match self {
			SessionEvent::Connect(_) => EventKind::Connect,
			SessionEvent::Disconnect(_) => EventKind::Disconnect,
			SessionEvent::Message(_) => EventKind::Message,
			SessionEvent::Error(_) => EventKind::Error,
			SessionEvent::SendAck(_) => EventKind::SendAck,
			SessionEvent::Reconnecting { .. } => EventKind::Reconnecting,
			SessionEvent::CustomEvent(_) => EventKind::CustomEvent,
		}
	}
}

/// Handle returned by `on`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventBus {
	next_id: AtomicU64,
	listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

impl EventBus {
	pub(crate) fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.listeners.lock().entry(kind).or_default().push((id, listener));
		id
	}

	pub(crate) fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
		let mut listeners = self.listeners.lock();
		let Some(entries) = listeners.get_mut(&kind) else {
			return false;
		};
		let before = entries.len();
		entries.retain(|(entry_id, _)| *entry_id != id);
		entries.len() != before
	}

	pub(crate) fn clear(&self) {
		self.listeners.lock().clear();
	}

	pub(crate) fn emit(&self, event: &SessionEvent) {
		let kind = event.kind();
		let snapshot: Vec<Listener> = self
			.listeners
			.lock()
			.get(&kind)
			.map(|entries| entries.iter().map(|(_, listener)| Arc::clone(listener)).collect())
			.unwrap_or_default();

		for listener in snapshot {
			if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
				let message = panic
					.downcast_ref::<&str>()
					.map(|s| s.to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "non-string panic payload".to_string());
				error!(target = "chatlink.session", ?kind, panic = %message, "event listener panicked");
			}
		}
	}
}
