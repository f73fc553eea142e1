//! Exponential-backoff reconnection.
//!
//! Scheduled by teardown after an unexpected close of a connected session.
//! Each step bumps the attempt counter, emits `Reconnecting`, sleeps
//! `base * 2^attempt`, then runs the full `connect` path. The sequence ends on
//! success, on an authentication failure, on manual disconnect, or when the
//! attempt budget is spent.

use std::sync::Weak;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::SessionEvent;
use crate::session::{ConnectionState, Session, SessionInner};

/// Delay before retry number `attempt + 1` (zero-based `attempt`).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
	base.saturating_mul(2u32.saturating_pow(attempt))
}

pub(crate) fn schedule(session: &Session) {
	let mut state = session.inner.state.lock();
	if state.reconnecting || state.manual_disconnect || state.destroyed {
		return;
	}
	state.reconnecting = true;
	state.reconnect_task = Some(tokio::spawn(run(session.downgrade())));
}

enum Step {
	Retry { attempt: u32, delay: Duration },
	Exhausted { attempts: u32 },
	Stop,
}

fn next_step(session: &Session) -> Step {
	let options = &session.inner.options;
	let mut state = session.inner.state.lock();
	if state.manual_disconnect || state.destroyed {
		state.reconnecting = false;
		return Step::Stop;
	}
	if state.reconnect_attempts >= options.max_reconnect_attempts {
		state.reconnect_attempts = 0;
		state.reconnecting = false;
		// The handle belongs to this task; dropping it detaches.
		drop(state.reconnect_task.take());
		return Step::Exhausted {
			attempts: options.max_reconnect_attempts,
		};
	}

	let delay = backoff_delay(options.reconnect_base_delay, state.reconnect_attempts);
	state.reconnect_attempts += 1;
	state.phase = ConnectionState::Reconnecting;
	Step::Retry {
		attempt: state.reconnect_attempts,
		delay,
	}
}

fn stop(session: &Session) {
	let mut state = session.inner.state.lock();
	state.reconnecting = false;
	drop(state.reconnect_task.take());
}

async fn run(weak: Weak<SessionInner>) {
	loop {
		let Some(session) = Session::from_weak(&weak) else {
			return;
		};

		let (attempt, delay) = match next_step(&session) {
			Step::Retry { attempt, delay } => (attempt, delay),
			Step::Exhausted { attempts } => {
				warn!(target = "chatlink.reconnect", attempts, "giving up on reconnection");
				session.emit(SessionEvent::Error(Error::ReconnectExhausted { attempts }));
				return;
			}
			Step::Stop => return,
		};

		info!(target = "chatlink.reconnect", attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
		session.emit(SessionEvent::Reconnecting { attempt, delay });
		drop(session);

		tokio::time::sleep(delay).await;

		let Some(session) = Session::from_weak(&weak) else {
			return;
		};
		let cancelled = {
			let state = session.inner.state.lock();
			state.manual_disconnect || state.destroyed
		};
		if cancelled {
			stop(&session);
			return;
		}

		match session.connect().await {
			Ok(_) => {
				debug!(target = "chatlink.reconnect", attempt, "reconnected");
				return;
			}
			Err(err @ (Error::AuthFailed(_) | Error::Destroyed)) => {
				warn!(target = "chatlink.reconnect", attempt, error = %err, "reconnection abandoned");
				stop(&session);
				return;
			}
			Err(err) => {
				debug!(target = "chatlink.reconnect", attempt, error = %err, "reconnect attempt failed");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delay_doubles_per_attempt() {
		let base = Duration::from_secs(1);
		assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
		assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
		assert_eq!(backoff_delay(base, 4), Duration::from_secs(16));
	}

	#[test]
	fn delay_saturates_instead_of_overflowing() {
		assert_eq!(backoff_delay(Duration::from_secs(1), 64), Duration::from_secs(u64::from(u32::MAX)));
		assert_eq!(backoff_delay(Duration::MAX, 3), Duration::MAX);
		assert_eq!(backoff_delay(Duration::from_millis(250), 2), Duration::from_secs(1));
	}
}
