mod common;

use std::time::Duration;

use chatlink::{Error, EventKind, ReasonCode, SendOptions, SessionEvent, SessionOptions};
use common::{Probe, connect, new_session, settle};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn send_resolves_and_emits_send_ack() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;
	let mut acks = Probe::new(&session, EventKind::SendAck);

	let sending = tokio::spawn({
		let session = session.clone();
		async move {
			session
				.send(
					"general",
					2,
					json!({"type": 1, "content": "hello"}),
					SendOptions {
						client_msg_no: Some("cmn-1".to_string()),
						topic: Some("news".to_string()),
						..SendOptions::default()
					},
				)
				.await
		}
	});

	let request = server.next_sent().await;
	assert_eq!(request["method"], "send");
	assert_eq!(request["params"]["channelId"], "general");
	assert_eq!(request["params"]["channelType"], 2);
	assert_eq!(request["params"]["clientMsgNo"], "cmn-1");
	assert_eq!(request["params"]["topic"], "news");
	assert_eq!(request["params"]["payload"]["content"], "hello");
	assert!(request["params"].get("header").is_none());

	server.inject_response(
		request["id"].as_str().unwrap(),
		json!({"messageId": "900", "messageSeq": 12, "reasonCode": 1}),
	);

	let result = sending.await.unwrap().unwrap();
	assert_eq!(result.message_id, "900");
	assert_eq!(result.message_seq, 12);
	assert_eq!(result.reason_code, ReasonCode::Success);

	let SessionEvent::SendAck(ack) = acks.next().await else {
		panic!("expected send ack");
	};
	assert_eq!(ack.client_msg_no, "cmn-1");
	assert_eq!(ack.channel_id, "general");
	assert_eq!(ack.result, result);
}

#[tokio::test(start_paused = true)]
async fn send_generates_client_msg_no() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;

	let sending = tokio::spawn({
		let session = session.clone();
		async move { session.send("c1", 1, json!("hi"), SendOptions::default()).await }
	});
	let request = server.next_sent().await;
	let client_msg_no = request["params"]["clientMsgNo"].as_str().unwrap();
	assert_eq!(client_msg_no.len(), 32);

	server.inject_response(request["id"].as_str().unwrap(), json!({"messageId": "1", "messageSeq": 1, "reasonCode": 1}));
	assert!(sending.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_frees_its_slot() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;
	let mut errors = Probe::new(&session, EventKind::Error);

	let requesting = tokio::spawn({
		let session = session.clone();
		async move { session.request_with_timeout("history", json!({}), Duration::from_millis(500)).await }
	});
	let request = server.next_sent().await;
	assert_eq!(session.pending_requests(), 1);

	let err = requesting.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::Timeout { ref method, timeout } if method == "history" && timeout == Duration::from_millis(500)));
	assert_eq!(session.pending_requests(), 0);

	// A late reply is dropped quietly.
	server.inject_response(request["id"].as_str().unwrap(), json!({}));
	settle().await;
	assert!(errors.try_next().is_none());
	assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn duplicate_responses_settle_once() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;

	let requesting = tokio::spawn({
		let session = session.clone();
		async move { session.request("history", json!({})).await }
	});
	let request = server.next_sent().await;
	let id = request["id"].as_str().unwrap();
	server.inject_response(id, json!({"page": 1}));
	server.inject_error(id, 500, "late failure");

	assert_eq!(requesting.await.unwrap().unwrap(), json!({"page": 1}));
	settle().await;
	assert_eq!(session.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn server_error_rejects_request() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;

	let requesting = tokio::spawn({
		let session = session.clone();
		async move { session.request("history", json!({})).await }
	});
	let request = server.next_sent().await;
	server.inject_error(request["id"].as_str().unwrap(), 403, "forbidden");

	let err = requesting.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::Rpc(ref rpc) if rpc.code == 403 && rpc.message == "forbidden"));
}

#[tokio::test(start_paused = true)]
async fn close_rejects_every_pending_request() {
	let (session, controller) = new_session(SessionOptions::default());
	let server = connect(&session, &controller).await;

	let requests: Vec<_> = (0..3)
		.map(|n| {
			let session = session.clone();
			tokio::spawn(async move { session.request("history", json!({ "page": n })).await })
		})
		.collect();
	for _ in 0..3 {
		server.next_sent().await;
	}
	assert_eq!(session.pending_requests(), 3);

	server.close(1006, "network lost");

	for request in requests {
		assert!(matches!(request.await.unwrap(), Err(Error::ConnectionClosed)));
	}
	assert_eq!(session.pending_requests(), 0);
}
