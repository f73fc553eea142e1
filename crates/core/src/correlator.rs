//! Request/response correlation.
//!
//! Every outbound request carries a fresh UUID `id`. The matching response is
//! routed back through a oneshot channel stored in the pending table. An entry
//! leaves the table exactly once: on its response, on its timeout, on a
//! teardown sweep, or when the caller drops the reply future.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatlink_protocol::{Notification, Request, Response};
use chatlink_runtime::{ReadyState, TransportHandle};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identity::new_request_id;

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;

#[derive(Default)]
pub(crate) struct Correlator {
	pending: PendingTable,
}

impl Correlator {
	/// Registers a request and writes it to `transport`.
	///
	/// Fails without registering anything when the transport is not open.
	pub(crate) fn begin(&self, transport: &dyn TransportHandle, method: &str, params: Value, timeout: Duration) -> Result<PendingReply> {
		let state = transport.ready_state();
		if state != ReadyState::Open {
			return Err(Error::NotConnected);
		}

		let id = new_request_id();
		let text = serde_json::to_string(&Request {
			method: method.to_string(),
			params,
			id: id.clone(),
		})?;

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id.clone(), tx);

		if let Err(err) = transport.send(text) {
			self.pending.lock().remove(&id);
			return Err(err.into());
		}

		trace!(target = "chatlink.correlator", %id, method, "request sent");
		Ok(PendingReply {
			id,
			method: method.to_string(),
			timeout,
			rx,
			pending: Arc::clone(&self.pending),
		})
	}

	/// Settles the entry matching `response.id`. Returns false for unknown ids.
	pub(crate) fn resolve(&self, response: Response) -> bool {
		let Some(tx) = self.pending.lock().remove(&response.id) else {
			debug!(target = "chatlink.correlator", id = %response.id, "dropping response with no pending request");
			return false;
		};

		let _ = tx.send(outcome(response));
		true
	}

	/// Removes the entry for `id` without settling it. The reply future then
	/// resolves to [`Error::ConnectionClosed`]. Returns false when the entry
	/// already left the table.
	pub(crate) fn claim(&self, id: &str) -> bool {
		self.pending.lock().remove(id).is_some()
	}

	/// Rejects every pending entry with [`Error::ConnectionClosed`].
	pub(crate) fn fail_all(&self) -> usize {
		let drained: Vec<_> = self.pending.lock().drain().collect();
		let count = drained.len();
		for (_, tx) in drained {
			let _ = tx.send(Err(Error::ConnectionClosed));
		}
		if count > 0 {
			debug!(target = "chatlink.correlator", count, "failed pending requests on teardown");
		}
		count
	}

	pub(crate) fn pending_count(&self) -> usize {
		self.pending.lock().len()
	}
}

pub(crate) fn outcome(response: Response) -> Result<Value> {
	match response.error {
		Some(error) => Err(Error::Rpc(error)),
		None => Ok(response.result.unwrap_or(Value::Null)),
	}
}

/// Writes a fire-and-forget notification frame.
pub(crate) fn notify(transport: &dyn TransportHandle, method: &str, params: Value) -> Result<()> {
	let state = transport.ready_state();
	if state != ReadyState::Open {
		return Err(Error::NotConnected);
	}
	let text = serde_json::to_string(&Notification {
		method: method.to_string(),
		params,
	})?;
	transport.send(text)?;
	Ok(())
}

/// Reply future for a registered request.
pub(crate) struct PendingReply {
	id: String,
	method: String,
	timeout: Duration,
	rx: oneshot::Receiver<Result<Value>>,
	pending: PendingTable,
}

impl PendingReply {
	pub(crate) fn id(&self) -> &str {
		&self.id
	}

	pub(crate) async fn response(mut self) -> Result<Value> {
		match tokio::time::timeout(self.timeout, &mut self.rx).await {
			Ok(Ok(outcome)) => outcome,
			Ok(Err(_)) => Err(Error::ConnectionClosed),
			Err(_) => {
				if self.pending.lock().remove(&self.id).is_some() {
					debug!(target = "chatlink.correlator", id = %self.id, method = %self.method, "request timed out");
					return Err(Error::Timeout {
						method: self.method.clone(),
						timeout: self.timeout,
					});
				}
				// Settled in the same instant the timer fired.
				match self.rx.try_recv() {
					Ok(outcome) => outcome,
					Err(_) => Err(Error::ConnectionClosed),
				}
			}
		}
	}
}

impl Drop for PendingReply {
	fn drop(&mut self) {
		self.pending.lock().remove(&self.id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chatlink_protocol::RpcError;
	use chatlink_runtime::{Connector, FakeConnectorBuilder, TransportEvent, TransportParts};
	use serde_json::json;

	async fn open_transport() -> (TransportParts, chatlink_runtime::FakeServer) {
		let (connector, controller) = FakeConnectorBuilder::new().build();
		let mut parts = connector.open("ws://fake").unwrap();
		let server = controller.next_server().await;
		assert_eq!(parts.events.recv().await, Some(TransportEvent::Open));
		(parts, server)
	}

	#[tokio::test]
	async fn response_resolves_matching_request() {
		let (parts, server) = open_transport().await;
		let correlator = Correlator::default();

		let reply = correlator.begin(parts.handle.as_ref(), "send", json!({"x": 1}), Duration::from_secs(5)).unwrap();
		let sent = server.next_sent().await;
		assert_eq!(sent["method"], "send");
		assert_eq!(sent["id"], reply.id());

		assert!(correlator.resolve(Response {
			id: reply.id().to_string(),
			result: Some(json!({"ok": true})),
			error: None,
		}));
		assert_eq!(reply.response().await.unwrap(), json!({"ok": true}));
		assert_eq!(correlator.pending_count(), 0);
	}

	#[tokio::test]
	async fn error_response_rejects() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let reply = correlator.begin(parts.handle.as_ref(), "send", json!({}), Duration::from_secs(5)).unwrap();

		correlator.resolve(Response {
			id: reply.id().to_string(),
			result: None,
			error: Some(RpcError {
				code: 3,
				message: "rate limited".to_string(),
				data: None,
			}),
		});
		assert!(matches!(reply.response().await, Err(Error::Rpc(e)) if e.code == 3));
	}

	#[tokio::test]
	async fn second_response_for_same_id_is_ignored() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let reply = correlator.begin(parts.handle.as_ref(), "ping", json!({}), Duration::from_secs(5)).unwrap();
		let id = reply.id().to_string();

		let response = Response {
			id,
			result: None,
			error: None,
		};
		assert!(correlator.resolve(response.clone()));
		assert!(!correlator.resolve(response));
		assert_eq!(reply.response().await.unwrap(), Value::Null);
	}

	#[tokio::test]
	async fn claimed_entry_is_not_resolved_again() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let reply = correlator.begin(parts.handle.as_ref(), "connect", json!({}), Duration::from_secs(5)).unwrap();
		let id = reply.id().to_string();

		assert!(correlator.claim(&id));
		assert!(!correlator.claim(&id));
		assert!(!correlator.resolve(Response {
			id,
			result: Some(json!({})),
			error: None,
		}));
		assert!(matches!(reply.response().await, Err(Error::ConnectionClosed)));
	}

	#[tokio::test]
	async fn not_open_fails_without_registering() {
		let (connector, _controller) = FakeConnectorBuilder::new().auto_open(false).build();
		let parts = connector.open("ws://fake").unwrap();
		let correlator = Correlator::default();

		let result = correlator.begin(parts.handle.as_ref(), "ping", json!({}), Duration::from_secs(1));
		assert!(matches!(result, Err(Error::NotConnected)));
		assert_eq!(correlator.pending_count(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_frees_the_slot() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let reply = correlator.begin(parts.handle.as_ref(), "ping", json!({}), Duration::from_millis(100)).unwrap();
		let id = reply.id().to_string();

		let err = reply.response().await.unwrap_err();
		assert!(matches!(err, Error::Timeout { ref method, .. } if method == "ping"));
		assert_eq!(correlator.pending_count(), 0);
		assert!(!correlator.resolve(Response {
			id,
			result: None,
			error: None,
		}));
	}

	#[tokio::test]
	async fn fail_all_rejects_every_pending_request() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let replies: Vec<_> = (0..3)
			.map(|_| correlator.begin(parts.handle.as_ref(), "send", json!({}), Duration::from_secs(5)).unwrap())
			.collect();

		assert_eq!(correlator.fail_all(), 3);
		assert_eq!(correlator.pending_count(), 0);
		for reply in replies {
			assert!(matches!(reply.response().await, Err(Error::ConnectionClosed)));
		}
	}

	#[tokio::test]
	async fn dropped_reply_removes_entry() {
		let (parts, _server) = open_transport().await;
		let correlator = Correlator::default();
		let reply = correlator.begin(parts.handle.as_ref(), "send", json!({}), Duration::from_secs(5)).unwrap();
		assert_eq!(correlator.pending_count(), 1);
		drop(reply);
		assert_eq!(correlator.pending_count(), 0);
	}

	#[tokio::test]
	async fn notify_writes_frame_without_id() {
		let (parts, server) = open_transport().await;
		notify(parts.handle.as_ref(), "recvack", json!({"messageId": "m1"})).unwrap();
		let sent = server.next_sent().await;
		assert_eq!(sent["method"], "recvack");
		assert!(sent.get("id").is_none());
	}
}
