//! JSON-RPC frame shapes.
//!
//! Every text frame carries exactly one JSON object. Requests and responses
//! carry a string `id`; notifications never do.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlated request sent by the client.
///
/// ```json
/// { "method": "send", "params": { "channelId": "c1" }, "id": "6f1c..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Method name to invoke
	pub method: String,
	/// Method parameters as JSON object
	pub params: Value,
	/// Correlation identifier echoed by the matching response
	pub id: String,
}

/// Reply to a [`Request`].
///
/// `result` and `error` are mutually exclusive; a response carrying neither
/// resolves to `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Request ID this response correlates to
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
}

/// Error object carried by a failed [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Uncorrelated frame, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Discriminated union of inbound frames.
///
/// Uses serde's `untagged` to distinguish based on presence of `id` field:
/// - Frames with `id` are responses
/// - Frames with `method` and no `id` are notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
	Response(Response),
	Notification(Notification),
}

impl Frame {
	/// Parses a text frame, rejecting anything that is not a response or a notification.
	pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(text)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn request_serializes_with_all_fields() {
		let request = Request {
			method: "ping".to_string(),
			params: json!({}),
			id: "r1".to_string(),
		};

		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value, json!({"method": "ping", "params": {}, "id": "r1"}));
	}

	#[test]
	fn frame_with_id_is_response() {
		let frame = Frame::parse(r#"{"id": "r1", "result": {"ok": true}}"#).unwrap();
		match frame {
			Frame::Response(response) => {
				assert_eq!(response.id, "r1");
				assert_eq!(response.result, Some(json!({"ok": true})));
				assert!(response.error.is_none());
			}
			_ => panic!("Expected Response"),
		}
	}

	#[test]
	fn frame_with_error_object() {
		let frame = Frame::parse(r#"{"id": "r2", "error": {"code": 401, "message": "bad token"}}"#).unwrap();
		let Frame::Response(response) = frame else {
			panic!("Expected Response");
		};
		let error = response.error.unwrap();
		assert_eq!(error.code, 401);
		assert_eq!(error.message, "bad token");
		assert!(error.data.is_none());
	}

	#[test]
	fn frame_without_id_is_notification() {
		let frame = Frame::parse(r#"{"method": "recv", "params": {"messageId": "m1"}}"#).unwrap();
		match frame {
			Frame::Notification(notification) => {
				assert_eq!(notification.method, "recv");
				assert_eq!(notification.params["messageId"], "m1");
			}
			_ => panic!("Expected Notification"),
		}
	}

	#[test]
	fn notification_params_default_to_null() {
		let Frame::Notification(notification) = Frame::parse(r#"{"method": "pong"}"#).unwrap() else {
			panic!("Expected Notification");
		};
		assert!(notification.params.is_null());
	}

	#[test]
	fn frame_without_id_or_method_is_rejected() {
		assert!(Frame::parse(r#"{"foo": 1}"#).is_err());
		assert!(Frame::parse("not json").is_err());
		assert!(Frame::parse("[1, 2]").is_err());
	}
}
