//! WebSocket transport backed by tokio-tungstenite.
//!
//! Each opened transport owns one background task that connects, then pumps
//! outbound frames from an unbounded queue and inbound frames into the event
//! channel. The handle only touches the queue and the shared ready state, so
//! it never blocks.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::transport::{Connector, ReadyState, TransportEvent, TransportHandle, TransportParts, close_code, truncate_close_reason};

/// Opens WebSocket transports with `tokio_tungstenite::connect_async`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
	pub fn new() -> Self {
		Self
	}
}

impl Connector for WebSocketConnector {
	fn open(&self, url: &str) -> Result<TransportParts> {
		let runtime = tokio::runtime::Handle::try_current().map_err(|err| TransportError::Open(format!("no tokio runtime: {err}")))?;

		let (event_tx, event_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let state = Arc::new(Mutex::new(ReadyState::Connecting));

		runtime.spawn(run_socket(url.to_string(), Arc::clone(&state), event_tx, outbound_rx));

		let handle = WebSocketHandle { state, outbound: outbound_tx };
		Ok(TransportParts {
			handle: Arc::new(handle),
			events: event_rx,
		})
	}
}

enum Outbound {
	Text(String),
	Close { code: u16, reason: String },
}

struct WebSocketHandle {
	state: Arc<Mutex<ReadyState>>,
	outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle for WebSocketHandle {
	fn send(&self, text: String) -> Result<()> {
		let state = *self.state.lock();
		if state != ReadyState::Open {
			return Err(TransportError::NotOpen(state));
		}
		self.outbound.send(Outbound::Text(text)).map_err(|_| TransportError::Closed)
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
			*state = ReadyState::Closing;
		}
		let reason = truncate_close_reason(reason).to_string();
		let _ = self.outbound.send(Outbound::Close { code, reason });
	}
}

async fn run_socket(url: String, state: Arc<Mutex<ReadyState>>, events: mpsc::UnboundedSender<TransportEvent>, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
	let connect = tokio_tungstenite::connect_async(url.as_str());
	tokio::pin!(connect);

	// A close requested while connecting wins over the pending connect.
	let stream = loop {
		tokio::select! {
			result = &mut connect => match result {
				Ok((stream, _)) => break stream,
				Err(err) => {
					warn!(target = "chatlink.transport", %url, error = %err, "websocket connect failed");
					*state.lock() = ReadyState::Closed;
					let _ = events.send(TransportEvent::Error(err.to_string()));
					let _ = events.send(TransportEvent::Close {
						code: close_code::ABNORMAL,
						reason: truncate_close_reason(&err.to_string()).to_string(),
					});
					return;
				}
			},
			command = outbound.recv() => match command {
				Some(Outbound::Close { code, reason }) => {
					*state.lock() = ReadyState::Closed;
					let _ = events.send(TransportEvent::Close { code, reason });
					return;
				}
				Some(Outbound::Text(_)) => continue,
				None => {
					*state.lock() = ReadyState::Closed;
					return;
				}
			},
		}
	};

	*state.lock() = ReadyState::Open;
	debug!(target = "chatlink.transport", %url, "websocket open");
	let _ = events.send(TransportEvent::Open);

	let (mut sink, mut source) = stream.split();
	let (code, reason) = loop {
		tokio::select! {
			command = outbound.recv() => match command {
				Some(Outbound::Text(text)) => {
					if let Err(err) = sink.send(Message::Text(text)).await {
						let _ = events.send(TransportEvent::Error(err.to_string()));
						break (close_code::ABNORMAL, err.to_string());
					}
				}
				Some(Outbound::Close { code, reason }) => {
					let frame = CloseFrame {
						code: CloseCode::from(code),
						reason: reason.clone().into(),
					};
					let _ = sink.send(Message::Close(Some(frame))).await;
					break (code, reason);
				}
				None => {
					let _ = sink.close().await;
					break (close_code::NORMAL, "handle dropped".to_string());
				}
			},
			frame = source.next() => match frame {
				Some(Ok(Message::Text(text))) => {
					let _ = events.send(TransportEvent::Message(text));
				}
				Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
					Ok(text) => {
						let _ = events.send(TransportEvent::Message(text));
					}
					Err(_) => {
						let _ = events.send(TransportEvent::Error("binary frame is not valid UTF-8".to_string()));
					}
				},
				Some(Ok(Message::Close(frame))) => {
					break frame
						.map(|frame| (u16::from(frame.code), frame.reason.to_string()))
						.unwrap_or((close_code::NO_STATUS, String::new()));
				}
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					let _ = events.send(TransportEvent::Error(err.to_string()));
					break (close_code::ABNORMAL, err.to_string());
				}
				None => break (close_code::ABNORMAL, "stream ended".to_string()),
			},
		}
	};

	*state.lock() = ReadyState::Closed;
	debug!(target = "chatlink.transport", %url, code, %reason, "websocket closed");
	let _ = events.send(TransportEvent::Close {
		code,
		reason: truncate_close_reason(&reason).to_string(),
	});
}
