//! Inbound frame dispatch.
//!
//! Responses go to the correlator; notifications are routed by method name.
//! Malformed frames become `Error` events and are dropped without touching
//! session state.

use chatlink_protocol::{DisconnectNotice, EventNotice, Frame, Notification, RecvAck, RecvMessage, method};
use chatlink_runtime::close_code;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::events::{CustomEvent, DisconnectReason, SessionEvent};
use crate::session::Session;

pub(crate) fn handle_frame(session: &Session, generation: u64, text: &str) {
	if !session.is_current(generation) {
		trace!(target = "chatlink.router", generation, "dropping frame from superseded transport");
		return;
	}

	match Frame::parse(text) {
		Ok(Frame::Response(response)) => {
			if let Some(response) = session.take_handshake_response(generation, response) {
				session.inner.correlator.resolve(response);
			}
		}
		Ok(Frame::Notification(notification)) => route(session, generation, notification),
		Err(err) => {
			warn!(target = "chatlink.router", error = %err, len = text.len(), "malformed frame");
			session.emit(SessionEvent::Error(Error::MalformedFrame(err.to_string())));
		}
	}
}

fn route(session: &Session, generation: u64, notification: Notification) {
	trace!(target = "chatlink.router", method = %notification.method, "notification");
	match notification.method.as_str() {
		method::RECV => on_recv(session, notification.params),
		method::PONG => session.mark_alive(),
		method::DISCONNECT => on_disconnect(session, generation, notification.params),
		method::EVENT => on_event(session, notification.params),
		other => debug!(target = "chatlink.router", method = other, "unhandled notification"),
	}
}

fn on_recv(session: &Session, params: Value) {
	let message: RecvMessage = match serde_json::from_value(params) {
		Ok(message) => message,
		Err(err) => {
			warn!(target = "chatlink.router", error = %err, "malformed recv notification");
			session.emit(SessionEvent::Error(Error::MalformedFrame(format!("recv: {err}"))));
			return;
		}
	};

	let ack = RecvAck::from(&message);
	session.emit(SessionEvent::Message(message));

	match serde_json::to_value(&ack) {
		Ok(params) => session.notify(method::RECVACK, params),
		Err(err) => session.emit(SessionEvent::Error(err.into())),
	}
}

fn on_disconnect(session: &Session, generation: u64, params: Value) {
	let notice: DisconnectNotice = serde_json::from_value(params).unwrap_or_default();
	warn!(
		target = "chatlink.router",
		reason_code = ?notice.reason_code,
		reason = %notice.reason,
		"server requested disconnect"
	);
	session.teardown(generation, DisconnectReason::server(close_code::SERVER_DISCONNECT, notice));
}

fn on_event(session: &Session, params: Value) {
	let notice: EventNotice = match serde_json::from_value(params) {
		Ok(notice) => notice,
		Err(err) => {
			session.emit(SessionEvent::Error(Error::InvalidEvent(err.to_string())));
			return;
		}
	};

	let id = notice.id.filter(|id| !id.is_empty());
	let kind = notice.kind.filter(|kind| !kind.is_empty());
	let (Some(id), Some(kind)) = (id, kind) else {
		warn!(target = "chatlink.router", "event notification without id or type");
		session.emit(SessionEvent::Error(Error::InvalidEvent("event is missing id or type".to_string())));
		return;
	};

	session.emit(SessionEvent::CustomEvent(CustomEvent {
		id,
		kind,
		timestamp: notice.timestamp,
		data: decode_event_data(notice.data),
	}));
}

/// Decodes JSON-encoded string data, leaving undecodable strings as they are.
pub(crate) fn decode_event_data(data: Value) -> Value {
	match data {
		Value::String(text) => match serde_json::from_str(&text) {
			Ok(decoded) => decoded,
			Err(_) => Value::String(text),
		},
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn json_string_data_is_decoded() {
		assert_eq!(decode_event_data(json!("{\"a\":1}")), json!({"a": 1}));
	}

	#[test]
	fn non_json_string_is_kept() {
		assert_eq!(decode_event_data(json!("not json")), json!("not json"));
	}

	#[test]
	fn structured_data_passes_through() {
		assert_eq!(decode_event_data(json!({"b": [1, 2]})), json!({"b": [1, 2]}));
		assert_eq!(decode_event_data(Value::Null), Value::Null);
	}
}
