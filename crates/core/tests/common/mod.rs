#![allow(dead_code)]

use std::time::Duration;

use chatlink::{Credentials, EventKind, Session, SessionEvent, SessionOptions};
use chatlink_runtime::{FakeConnectorBuilder, FakeConnectorController, FakeServer};
use serde_json::{Value, json};
use tokio::sync::mpsc;

pub const URL: &str = "ws://im.test/ws";

pub fn credentials() -> Credentials {
	Credentials::new("u1", "secret").with_device_id("device-1")
}

pub fn new_session(options: SessionOptions) -> (Session, FakeConnectorController) {
	let (connector, controller) = FakeConnectorBuilder::new().build();
	let session = Session::new(URL, credentials(), options, connector).unwrap();
	(session, controller)
}

pub fn handshake_result() -> Value {
	json!({
		"serverKey": "server-key",
		"salt": "salt",
		"timeDiff": -12,
		"reasonCode": 1,
		"serverVersion": 4
	})
}

/// Answers the handshake on `server` and returns the request the client sent.
pub async fn accept_handshake(server: &FakeServer) -> Value {
	let request = server.next_sent().await;
	assert_eq!(request["method"], "connect");
	server.inject_response(request["id"].as_str().unwrap(), handshake_result());
	request
}

/// Drives `session` to `Connected` and returns the server end.
pub async fn connect(session: &Session, controller: &FakeConnectorController) -> FakeServer {
	let connecting = tokio::spawn({
		let session = session.clone();
		async move { session.connect().await }
	});
	let server = controller.next_server().await;
	accept_handshake(&server).await;
	connecting.await.unwrap().unwrap();
	server
}

/// Collects events of one kind.
pub struct Probe {
	rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Probe {
	pub fn new(session: &Session, kind: EventKind) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		session.on(kind, move |event| {
			let _ = tx.send(event.clone());
		});
		Self { rx }
	}

	pub async fn next(&mut self) -> SessionEvent {
		tokio::time::timeout(Duration::from_secs(600), self.rx.recv())
			.await
			.expect("timed out waiting for event")
			.expect("event channel closed")
	}

	pub fn try_next(&mut self) -> Option<SessionEvent> {
		self.rx.try_recv().ok()
	}

	pub fn drain(&mut self) -> Vec<SessionEvent> {
		let mut events = Vec::new();
		while let Some(event) = self.try_next() {
			events.push(event);
		}
		events
	}
}

/// Lets spawned tasks run without advancing time.
pub async fn settle() {
	for _ in 0..20 {
		tokio::task::yield_now().await;
	}
}
