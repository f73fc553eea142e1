use anyhow::Result;
use chatlink::runtime::close_code;
use chatlink::{DisconnectInitiator, Error, EventKind, Session, SessionEvent};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

const KINDS: [EventKind; 6] = [
	EventKind::Connect,
	EventKind::Disconnect,
	EventKind::Message,
	EventKind::Error,
	EventKind::Reconnecting,
	EventKind::CustomEvent,
];

/// Prints messages and custom events as JSON lines until Ctrl-C, a fatal
/// error, or `count` messages.
pub async fn execute(session: &Session, count: Option<usize>) -> Result<()> {
	let (tx, mut rx) = mpsc::unbounded_channel();
	for kind in KINDS {
		let tx = tx.clone();
		session.on(kind, move |event| {
			let _ = tx.send(event.clone());
		});
	}
	drop(tx);

	let mut received = 0usize;
	while let Some(event) = rx.recv().await {
		match event {
			SessionEvent::Message(message) => {
				println!("{}", json!({ "type": "message", "message": message }));
				received += 1;
				if count.is_some_and(|limit| received >= limit) {
					break;
				}
			}
			SessionEvent::CustomEvent(event) => {
				println!(
					"{}",
					json!({
						"type": "event",
						"id": event.id,
						"eventType": event.kind,
						"timestamp": event.timestamp,
						"data": event.data,
					})
				);
			}
			SessionEvent::Connect(_) => info!(target = "chatlink.cli", "reconnected"),
			SessionEvent::Reconnecting { attempt, delay } => {
				warn!(target = "chatlink.cli", attempt, delay_ms = delay.as_millis() as u64, "connection lost, retrying");
			}
			SessionEvent::Disconnect(reason) => {
				if reason.initiator == DisconnectInitiator::Client && reason.code != close_code::KEEPALIVE_TIMEOUT {
					info!(target = "chatlink.cli", %reason, "stopped");
					break;
				}
				warn!(target = "chatlink.cli", %reason, "disconnected");
			}
			SessionEvent::Error(err @ (Error::AuthFailed(_) | Error::ReconnectExhausted { .. })) => return Err(err.into()),
			SessionEvent::Error(err) => warn!(target = "chatlink.cli", error = %err, "session error"),
			SessionEvent::SendAck(_) => {}
		}
	}

	info!(target = "chatlink.cli", received, "listen finished");
	Ok(())
}
