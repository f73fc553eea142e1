use std::process::Output;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio_tungstenite::tungstenite::Message;

async fn run_chatlink(args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_chatlink"))
		.args(args)
		.env_remove("CHATLINK_URL")
		.env_remove("CHATLINK_UID")
		.env_remove("CHATLINK_TOKEN")
		.env_remove("RUST_LOG")
		.output()
		.await
		.expect("failed to execute chatlink")
}

/// Accepts one client, answers the handshake and one `send`, returns the send params.
async fn serve_one_send(listener: TcpListener) -> Value {
	let (stream, _) = listener.accept().await.unwrap();
	let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

	let mut send_params = Value::Null;
	while let Some(Ok(message)) = ws.next().await {
		let Message::Text(text) = message else {
			continue;
		};
		let request: Value = serde_json::from_str(&text).unwrap();
		let reply = match request["method"].as_str() {
			Some("connect") => json!({
				"id": request["id"],
				"result": {"serverKey": "k", "salt": "s", "timeDiff": 0, "reasonCode": 1}
			}),
			Some("send") => {
				send_params = request["params"].clone();
				json!({
					"id": request["id"],
					"result": {"messageId": "42", "messageSeq": 3, "reasonCode": 1}
				})
			}
			_ => continue,
		};
		ws.send(Message::Text(reply.to_string())).await.unwrap();
	}
	send_params
}

#[tokio::test]
async fn help_lists_subcommands() {
	let output = run_chatlink(&["--help"]).await;
	assert!(output.status.success());
	let stdout = String::from_utf8_lossy(&output.stdout);
	for command in ["listen", "send", "ping"] {
		assert!(stdout.contains(command), "help should mention {command}");
	}
}

#[tokio::test]
async fn missing_url_fails_with_hint() {
	let output = run_chatlink(&["--uid", "u1", "--token", "t", "ping"]).await;
	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("--url"), "stderr: {stderr}");
}

#[tokio::test]
async fn unreachable_server_fails() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let url = format!("ws://{addr}");
	let output = run_chatlink(&["--url", &url, "--uid", "u1", "--token", "t", "ping"]).await;
	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("failed to connect"), "stderr: {stderr}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_round_trip_against_loopback_server() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let server = tokio::spawn(serve_one_send(listener));

	let url = format!("ws://{addr}");
	let output = run_chatlink(&[
		"--url",
		&url,
		"--uid",
		"u1",
		"--token",
		"t",
		"send",
		"general",
		r#"{"content":"hi"}"#,
		"--channel-type",
		"2",
		"--no-persist",
	])
	.await;

	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(output.status.success(), "stderr: {stderr}");
	let result: Value = serde_json::from_slice(&output.stdout).unwrap();
	assert_eq!(result["messageId"], "42");
	assert_eq!(result["messageSeq"], 3);

	let params = server.await.unwrap();
	assert_eq!(params["channelId"], "general");
	assert_eq!(params["channelType"], 2);
	assert_eq!(params["payload"]["content"], "hi");
	assert_eq!(params["header"]["noPersist"], true);
}
