//! The session object: connection state machine and public API.
//!
//! All mutable state sits behind one `parking_lot` mutex. Every transition
//! happens in a short synchronous section; the lock is never held across an
//! `.await` or while listeners run. Each transport gets a generation number,
//! and events from a superseded transport are dropped.

use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chatlink_protocol::{ConnectParams, ConnectResult, Header, Response, SendParams, SendResult, method};
use chatlink_runtime::{Connector, ReadyState, TransportError, TransportEvent, TransportHandle, close_code};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::correlator::{self, Correlator, PendingReply};
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, EventBus, EventKind, ListenerId, SendAck, SessionEvent};
use crate::identity::{Credentials, new_client_msg_no, new_session_id, now_ms};
use crate::options::SessionOptions;
use crate::registry::RegistrySlot;
use crate::{keepalive, reconnect, router};

/// Connection lifecycle.
///
/// `Idle → Connecting → Authenticating → Connected`, with `Closed` reachable
/// from anywhere and `Reconnecting` observable while a retry delay runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Idle,
	Connecting,
	Authenticating,
	Connected,
	Reconnecting,
	Closed,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ConnectionState::Idle => "idle",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Authenticating => "authenticating",
			ConnectionState::Connected => "connected",
			ConnectionState::Reconnecting => "reconnecting",
			ConnectionState::Closed => "closed",
		};
		f.write_str(name)
	}
}

/// Optional fields of an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
	pub header: Option<Header>,
	pub setting: Option<u8>,
	pub topic: Option<String>,
	/// Seconds until the server may drop the message.
	pub expire: Option<u32>,
	/// Client message number; a fresh one is generated when absent.
	pub client_msg_no: Option<String>,
}

pub(crate) struct ActiveTransport {
	pub(crate) generation: u64,
	pub(crate) handle: Arc<dyn TransportHandle>,
}

pub(crate) struct SessionState {
	pub(crate) phase: ConnectionState,
	pub(crate) transport: Option<ActiveTransport>,
	pub(crate) generation: u64,
	pub(crate) reconnect_attempts: u32,
	pub(crate) manual_disconnect: bool,
	pub(crate) reconnecting: bool,
	pub(crate) destroyed: bool,
	pub(crate) handshake: Option<ConnectResult>,
	/// Request id of the in-flight `connect` handshake.
	pub(crate) handshake_request: Option<String>,
	pub(crate) waiters: Vec<oneshot::Sender<Result<ConnectResult>>>,
	pub(crate) pump: Option<JoinHandle<()>>,
	pub(crate) keepalive: Option<JoinHandle<()>>,
	pub(crate) reconnect_task: Option<JoinHandle<()>>,
	pub(crate) teardown_hook: Option<JoinHandle<()>>,
}

impl SessionState {
	fn new() -> Self {
		Self {
			phase: ConnectionState::Idle,
			transport: None,
			generation: 0,
			reconnect_attempts: 0,
			manual_disconnect: false,
			reconnecting: false,
			destroyed: false,
			handshake: None,
			handshake_request: None,
			waiters: Vec::new(),
			pump: None,
			keepalive: None,
			reconnect_task: None,
			teardown_hook: None,
		}
	}

	fn current(&self, generation: u64) -> Option<&ActiveTransport> {
		self.transport.as_ref().filter(|active| active.generation == generation)
	}
}

pub(crate) struct SessionInner {
	url: String,
	credentials: Credentials,
	session_id: String,
	pub(crate) options: SessionOptions,
	connector: Box<dyn Connector>,
	pub(crate) correlator: Correlator,
	events: EventBus,
	pub(crate) state: Mutex<SessionState>,
	last_pong: Mutex<Option<Instant>>,
	registry: Mutex<Option<Weak<RegistrySlot>>>,
}

impl Drop for SessionInner {
	fn drop(&mut self) {
		let state = self.state.get_mut();
		for task in [state.pump.take(), state.keepalive.take(), state.reconnect_task.take(), state.teardown_hook.take()]
			.into_iter()
			.flatten()
		{
			task.abort();
		}
		if let Some(active) = state.transport.take() {
			active.handle.close(close_code::NORMAL, "session dropped");
		}
	}
}

enum ConnectStep {
	Ready(ConnectResult),
	Wait(oneshot::Receiver<Result<ConnectResult>>),
	Failed(Error),
}

/// A client session against one messaging server.
///
/// `Session` is a cheap handle; clones share the same connection. Methods
/// that spawn work (`connect`, `bind_teardown_signal`) must be called from
/// within a tokio runtime.
#[derive(Clone)]
pub struct Session {
	pub(crate) inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("session_id", &self.inner.session_id)
			.field("url", &self.inner.url)
			.field("state", &self.state())
			.finish()
	}
}

impl Session {
	/// Creates an idle session. Nothing is opened until [`connect`](Self::connect).
	///
	/// No process teardown hook is installed here; call
	/// [`bind_teardown_signal`](Self::bind_teardown_signal) to close the
	/// session when the process shuts down.
	pub fn new(url: impl Into<String>, credentials: Credentials, options: SessionOptions, connector: impl Connector + 'static) -> Result<Self> {
		options.validate()?;
		let session_id = new_session_id();
		let credentials = credentials.backfill_device_id(&session_id);
		let url = url.into();
		debug!(target = "chatlink.session", %session_id, %url, uid = %credentials.uid, "session created");

		Ok(Self {
			inner: Arc::new(SessionInner {
				url,
				credentials,
				session_id,
				options,
				connector: Box::new(connector),
				correlator: Correlator::default(),
				events: EventBus::default(),
				state: Mutex::new(SessionState::new()),
				last_pong: Mutex::new(None),
				registry: Mutex::new(None),
			}),
		})
	}

	pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
		Arc::downgrade(&self.inner)
	}

	pub(crate) fn from_weak(weak: &Weak<SessionInner>) -> Option<Self> {
		weak.upgrade().map(|inner| Self { inner })
	}

	pub fn session_id(&self) -> &str {
		&self.inner.session_id
	}

	pub fn url(&self) -> &str {
		&self.inner.url
	}

	pub fn credentials(&self) -> &Credentials {
		&self.inner.credentials
	}

	pub fn options(&self) -> &SessionOptions {
		&self.inner.options
	}

	pub fn state(&self) -> ConnectionState {
		self.inner.state.lock().phase
	}

	pub fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	pub fn is_destroyed(&self) -> bool {
		self.inner.state.lock().destroyed
	}

	/// Retries scheduled since the last successful handshake.
	pub fn reconnect_attempts(&self) -> u32 {
		self.inner.state.lock().reconnect_attempts
	}

	/// Number of requests awaiting a response.
	pub fn pending_requests(&self) -> usize {
		self.inner.correlator.pending_count()
	}

	/// Last time the server proved liveness, by `pong` or an answered keepalive probe.
	pub fn last_pong(&self) -> Option<Instant> {
		*self.inner.last_pong.lock()
	}

	pub(crate) fn mark_alive(&self) {
		*self.inner.last_pong.lock() = Some(Instant::now());
	}

	pub fn ptr_eq(&self, other: &Session) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Registers a listener for one event kind.
	pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
	where
		F: Fn(&SessionEvent) + Send + Sync + 'static,
	{
		self.inner.events.add(kind, Arc::new(listener))
	}

	/// Removes a listener. Returns false if it was not registered.
	pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
		self.inner.events.remove(kind, id)
	}

	pub(crate) fn emit(&self, event: SessionEvent) {
		self.inner.events.emit(&event);
	}

	/// Connects and authenticates.
	///
	/// Resolves immediately when already connected and joins an attempt that
	/// is already in flight. Settles on handshake success or on definitive
	/// failure of this attempt; retries scheduled afterwards are reported
	/// through [`SessionEvent::Reconnecting`] instead.
	pub async fn connect(&self) -> Result<ConnectResult> {
		let step = self.begin_connect();
		match step {
			ConnectStep::Ready(result) => Ok(result),
			ConnectStep::Failed(err) => Err(err),
			ConnectStep::Wait(rx) => rx.await.unwrap_or(Err(Error::ConnectionClosed)),
		}
	}

	fn begin_connect(&self) -> ConnectStep {
		let mut state = self.inner.state.lock();
		if state.destroyed {
			return ConnectStep::Failed(Error::Destroyed);
		}

		if state.phase == ConnectionState::Connected {
			if let Some(result) = &state.handshake {
				return ConnectStep::Ready(result.clone());
			}
		}
		if matches!(state.phase, ConnectionState::Connecting | ConnectionState::Authenticating) {
			let (tx, rx) = oneshot::channel();
			state.waiters.push(tx);
			trace!(target = "chatlink.session", waiters = state.waiters.len(), "joining in-flight connect");
			return ConnectStep::Wait(rx);
		}

		state.manual_disconnect = false;
		let parts = match self.inner.connector.open(&self.inner.url) {
			Ok(parts) => parts,
			Err(err) => {
				state.phase = ConnectionState::Closed;
				drop(state);
				warn!(target = "chatlink.session", url = %self.inner.url, error = %err, "failed to open transport");
				let err = Error::from(err);
				self.emit(SessionEvent::Error(err.clone()));
				return ConnectStep::Failed(err);
			}
		};

		state.generation += 1;
		let generation = state.generation;
		state.transport = Some(ActiveTransport {
			generation,
			handle: parts.handle,
		});
		state.phase = ConnectionState::Connecting;
		state.handshake = None;
		state.pump = Some(spawn_pump(self.downgrade(), generation, parts.events));

		let (tx, rx) = oneshot::channel();
		state.waiters.push(tx);
		info!(target = "chatlink.session", url = %self.inner.url, generation, "opening transport");
		ConnectStep::Wait(rx)
	}

	pub(crate) fn is_current(&self, generation: u64) -> bool {
		self.inner.state.lock().current(generation).is_some()
	}

	fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
		match event {
			TransportEvent::Open => self.on_open(generation),
			TransportEvent::Message(text) => router::handle_frame(self, generation, &text),
			TransportEvent::Error(message) => {
				if !self.is_current(generation) {
					return;
				}
				warn!(target = "chatlink.transport", generation, error = %message, "transport error");
				self.emit(SessionEvent::Error(Error::Transport(TransportError::Failed(message))));
			}
			TransportEvent::Close { code, reason } => {
				debug!(target = "chatlink.transport", generation, code, %reason, "transport closed");
				self.teardown(generation, DisconnectReason::transport(code, reason));
			}
		}
	}

	fn on_open(&self, generation: u64) {
		let handle = {
			let mut state = self.inner.state.lock();
			let Some(active) = state.current(generation) else {
				return;
			};
			let handle = Arc::clone(&active.handle);
			state.phase = ConnectionState::Authenticating;
			handle
		};

		let credentials = &self.inner.credentials;
		let params = ConnectParams {
			uid: credentials.uid.clone(),
			token: credentials.token.clone(),
			device_id: credentials.device_id().to_string(),
			device_flag: credentials.device_flag,
			client_timestamp: now_ms(),
		};
		debug!(target = "chatlink.session", generation, uid = %params.uid, "transport open, authenticating");

		let reply = serde_json::to_value(&params)
			.map_err(Error::from)
			.and_then(|params| self.inner.correlator.begin(handle.as_ref(), method::CONNECT, params, self.inner.options.handshake_timeout));

		match reply {
			Ok(reply) => {
				self.inner.state.lock().handshake_request = Some(reply.id().to_string());
				let weak = self.downgrade();
				tokio::spawn(async move {
					let outcome = reply.response().await;
					if let Some(session) = Session::from_weak(&weak) {
						session.finish_handshake(generation, outcome);
					}
				});
			}
			Err(err) => self.fail_handshake(generation, err),
		}
	}

	/// Settles the handshake inline when `response` answers it, so frames
	/// queued behind the reply already see `Connected`. Returns the response
	/// untouched otherwise.
	pub(crate) fn take_handshake_response(&self, generation: u64, response: Response) -> Option<Response> {
		{
			let mut state = self.inner.state.lock();
			if state.current(generation).is_none() || state.handshake_request.as_deref() != Some(response.id.as_str()) {
				return Some(response);
			}
			state.handshake_request = None;
		}
		// Losing the claim means the handshake timer already fired.
		if self.inner.correlator.claim(&response.id) {
			self.finish_handshake(generation, correlator::outcome(response));
		}
		None
	}

	fn finish_handshake(&self, generation: u64, outcome: Result<Value>) {
		let result = match outcome.and_then(|value| serde_json::from_value::<ConnectResult>(value).map_err(Error::from)) {
			Ok(result) => result,
			// Settled already, by teardown or inline on dispatch.
			Err(Error::ConnectionClosed) => return,
			Err(err) => return self.fail_handshake(generation, err),
		};

		let waiters = {
			let mut state = self.inner.state.lock();
			if state.current(generation).is_none() || state.phase != ConnectionState::Authenticating {
				return;
			}
			state.phase = ConnectionState::Connected;
			state.reconnect_attempts = 0;
			state.manual_disconnect = false;
			state.reconnecting = false;
			if let Some(task) = state.reconnect_task.take() {
				task.abort();
			}
			state.handshake = Some(result.clone());
			if let Some(task) = state.keepalive.replace(keepalive::spawn(self, generation)) {
				task.abort();
			}
			mem::take(&mut state.waiters)
		};

		info!(
			target = "chatlink.session",
			generation,
			reason_code = ?result.reason_code,
			time_diff = result.time_diff,
			"session connected"
		);
		for waiter in waiters {
			let _ = waiter.send(Ok(result.clone()));
		}
		self.emit(SessionEvent::Connect(result));
	}

	fn fail_handshake(&self, generation: u64, err: Error) {
		let waiters = {
			let mut state = self.inner.state.lock();
			if state.current(generation).is_none() || state.phase != ConnectionState::Authenticating {
				return;
			}
			state.handshake_request = None;
			mem::take(&mut state.waiters)
		};

		let err = Error::AuthFailed(err.to_string());
		warn!(target = "chatlink.session", generation, error = %err, "handshake failed");
		for waiter in waiters {
			let _ = waiter.send(Err(err.clone()));
		}
		self.emit(SessionEvent::Error(err.clone()));
		self.teardown(generation, DisconnectReason::client(close_code::AUTH_FAILED, err.to_string()));
	}

	pub(crate) fn keepalive_failed(&self, generation: u64) {
		{
			let mut state = self.inner.state.lock();
			if state.current(generation).is_none() {
				return;
			}
			// Called from the keepalive task itself.
			drop(state.keepalive.take());
		}

		let err = Error::KeepaliveTimeout(self.inner.options.ping_timeout);
		warn!(target = "chatlink.keepalive", generation, error = %err, "server stopped answering");
		self.emit(SessionEvent::Error(err));
		self.teardown(generation, DisconnectReason::client(close_code::KEEPALIVE_TIMEOUT, "keepalive timeout"));
	}

	/// Ends the connection identified by `generation`.
	///
	/// Closes the transport with the reason's code (a no-op when it is
	/// already closed), fails every pending request, rejects in-flight
	/// `connect` callers, and emits `Disconnect`. Reconnection is scheduled
	/// only when the session had reached `Connected` and was not closed
	/// manually.
	pub(crate) fn teardown(&self, generation: u64, reason: DisconnectReason) {
		let (transport, waiters, should_reconnect) = {
			let mut state = self.inner.state.lock();
			if state.current(generation).is_none() {
				return;
			}
			let transport = state.transport.take();
			if let Some(task) = state.keepalive.take() {
				task.abort();
			}
			let was_connected = state.phase == ConnectionState::Connected;
			state.phase = ConnectionState::Closed;
			state.handshake = None;
			state.handshake_request = None;
			let waiters = mem::take(&mut state.waiters);
			let should_reconnect = was_connected && !state.manual_disconnect && !state.destroyed;
			(transport, waiters, should_reconnect)
		};

		if let Some(active) = transport {
			active.handle.close(reason.code, &reason.message);
		}
		let failed = self.inner.correlator.fail_all();
		for waiter in waiters {
			let _ = waiter.send(Err(Error::ConnectionClosed));
		}

		info!(
			target = "chatlink.session",
			generation,
			code = reason.code,
			initiator = ?reason.initiator,
			failed_requests = failed,
			reconnect = should_reconnect,
			"session disconnected"
		);
		self.emit(SessionEvent::Disconnect(reason));

		if should_reconnect {
			reconnect::schedule(self);
		}
	}

	/// Closes the connection and suppresses automatic reconnection.
	///
	/// The transport is closed with 1000 when open and 4000 otherwise. Any
	/// pending retry is cancelled and the teardown signal hook is removed.
	pub fn disconnect(&self) {
		self.close_manually(None, "client disconnect");
	}

	fn close_manually(&self, forced_code: Option<u16>, message: &str) {
		let active = {
			let mut state = self.inner.state.lock();
			state.manual_disconnect = true;
			state.reconnecting = false;
			for task in [state.reconnect_task.take(), state.keepalive.take(), state.teardown_hook.take()]
				.into_iter()
				.flatten()
			{
				task.abort();
			}
			match &state.transport {
				Some(active) => Some((active.generation, active.handle.ready_state())),
				None => {
					if state.phase == ConnectionState::Reconnecting {
						state.phase = ConnectionState::Closed;
					}
					None
				}
			}
		};

		let Some((generation, ready_state)) = active else {
			debug!(target = "chatlink.session", "disconnect with no active transport");
			return;
		};
		let code = forced_code.unwrap_or(if ready_state == ReadyState::Open {
			close_code::NORMAL
		} else {
			close_code::FORCED
		});
		self.teardown(generation, DisconnectReason::client(code, message));
	}

	/// Disconnects, drops every listener, and unregisters the session.
	///
	/// A destroyed session rejects further `connect` calls.
	pub fn destroy(&self) {
		{
			let mut state = self.inner.state.lock();
			if state.destroyed {
				return;
			}
			state.destroyed = true;
		}
		self.close_manually(None, "session destroyed");
		self.inner.events.clear();

		let slot = self.inner.registry.lock().take().and_then(|weak| weak.upgrade());
		if let Some(slot) = slot {
			let removed = {
				let mut registered = slot.lock();
				match registered.as_ref() {
					Some(current) if current.ptr_eq(self) => registered.take(),
					_ => None,
				}
			};
			drop(removed);
		}
		info!(target = "chatlink.session", session_id = %self.inner.session_id, "session destroyed");
	}

	pub(crate) fn attach_registry(&self, slot: Weak<RegistrySlot>) {
		*self.inner.registry.lock() = Some(slot);
	}

	/// Force-closes the session when `signal` completes, without reconnecting.
	///
	/// Replaces any previously bound signal. The watcher is removed by
	/// [`disconnect`](Self::disconnect).
	pub fn bind_teardown_signal<F>(&self, signal: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let weak = self.downgrade();
		let task = tokio::spawn(async move {
			signal.await;
			let Some(session) = Session::from_weak(&weak) else {
				return;
			};
			drop(session.inner.state.lock().teardown_hook.take());
			info!(target = "chatlink.session", "teardown signal received");
			session.close_manually(Some(close_code::FORCED), "process teardown");
		});
		if let Some(previous) = self.inner.state.lock().teardown_hook.replace(task) {
			previous.abort();
		}
	}

	fn connected_transport(&self) -> Result<Arc<dyn TransportHandle>> {
		let state = self.inner.state.lock();
		if state.destroyed {
			return Err(Error::Destroyed);
		}
		match (&state.transport, state.phase) {
			(Some(active), ConnectionState::Connected) => Ok(Arc::clone(&active.handle)),
			_ => Err(Error::NotConnected),
		}
	}

	/// Registers a request on the transport of `generation`.
	pub(crate) fn start_request_on(&self, generation: u64, method: &str, params: Value, timeout: Duration) -> Result<PendingReply> {
		let handle = {
			let state = self.inner.state.lock();
			let active = state.current(generation).ok_or(Error::NotConnected)?;
			Arc::clone(&active.handle)
		};
		self.inner.correlator.begin(handle.as_ref(), method, params, timeout)
	}

	/// Sends a correlated request with the default request timeout.
	pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
		self.request_with_timeout(method, params, self.inner.options.request_timeout).await
	}

	/// Sends a correlated request.
	///
	/// Fails with [`Error::NotConnected`] before anything is written when the
	/// session is not connected.
	pub async fn request_with_timeout(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
		let handle = self.connected_transport()?;
		let reply = self.inner.correlator.begin(handle.as_ref(), method, params, timeout)?;
		reply.response().await
	}

	/// Writes a notification frame. Failures surface as an `Error` event.
	pub fn notify(&self, method: &str, params: Value) {
		let result = self.connected_transport().and_then(|handle| correlator::notify(handle.as_ref(), method, params));
		if let Err(err) = result {
			warn!(target = "chatlink.session", method, error = %err, "notification not sent");
			self.emit(SessionEvent::Error(err));
		}
	}

	/// Sends a message to a channel.
	///
	/// On success a `SendAck` event carrying the client message number is
	/// emitted as well.
	pub async fn send(&self, channel_id: impl Into<String>, channel_type: u8, payload: Value, options: SendOptions) -> Result<SendResult> {
		let params = SendParams {
			client_msg_no: options.client_msg_no.unwrap_or_else(new_client_msg_no),
			channel_id: channel_id.into(),
			channel_type,
			payload,
			header: options.header,
			setting: options.setting,
			topic: options.topic,
			expire: options.expire,
		};
		let client_msg_no = params.client_msg_no.clone();
		let channel_id = params.channel_id.clone();

		let value = self.request(method::SEND, serde_json::to_value(&params)?).await?;
		let result: SendResult = serde_json::from_value(value)?;
		debug!(
			target = "chatlink.session",
			%client_msg_no,
			message_id = %result.message_id,
			message_seq = result.message_seq,
			"message sent"
		);

		self.emit(SessionEvent::SendAck(SendAck {
			client_msg_no,
			channel_id,
			channel_type,
			result: result.clone(),
		}));
		Ok(result)
	}
}

fn spawn_pump(weak: Weak<SessionInner>, generation: u64, mut events: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			let Some(session) = Session::from_weak(&weak) else {
				return;
			};
			let closed = matches!(event, TransportEvent::Close { .. });
			session.handle_transport_event(generation, event);
			if closed {
				return;
			}
		}
		if let Some(session) = Session::from_weak(&weak) {
			session.handle_transport_event(
				generation,
				TransportEvent::Close {
					code: close_code::ABNORMAL,
					reason: "transport dropped".to_string(),
				},
			);
		}
	})
}
