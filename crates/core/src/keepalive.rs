//! Periodic liveness probe.
//!
//! While connected, a correlated `ping` goes out every keepalive interval.
//! An unanswered probe is handled like a dead transport: the session closes
//! with 4002 and the reconnection policy takes over. The task belongs to one
//! transport generation and is aborted on teardown.

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use chatlink_protocol::method;

use crate::error::Error;
use crate::session::Session;

pub(crate) fn spawn(session: &Session, generation: u64) -> JoinHandle<()> {
	let weak = session.downgrade();
	let interval = session.inner.options.keepalive_interval;
	let timeout = session.inner.options.ping_timeout;

	tokio::spawn(async move {
		let mut ticker = interval_at(Instant::now() + interval, interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			ticker.tick().await;
			let Some(session) = Session::from_weak(&weak) else {
				return;
			};
			let reply = match session.start_request_on(generation, method::PING, json!({}), timeout) {
				Ok(reply) => reply,
				Err(err) => {
					debug!(target = "chatlink.keepalive", generation, error = %err, "keepalive stopped");
					return;
				}
			};
			drop(session);

			let outcome = reply.response().await;
			let Some(session) = Session::from_weak(&weak) else {
				return;
			};
			match outcome {
				// Any answer, error or not, proves the server is alive.
				Ok(_) | Err(Error::Rpc(_)) => {
					trace!(target = "chatlink.keepalive", generation, "ping answered");
					session.mark_alive();
				}
				Err(Error::Timeout { .. }) => {
					session.keepalive_failed(generation);
					return;
				}
				Err(err) => {
					debug!(target = "chatlink.keepalive", generation, error = %err, "keepalive stopped");
					return;
				}
			}
		}
	})
}
