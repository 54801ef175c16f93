// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The session lifecycle state machine.
//!
//! Sessions are identified by a numeric id and tracked either manually,
//! through explicit start and end calls, or automatically, where activity
//! gaps longer than the configured timeout roll the session over. Timeout
//! arithmetic runs on a monotonic clock and uses wrapping subtraction, so
//! a reading from before the stored activity time reads as an enormous
//! gap and forces a fresh session rather than extending a stale one.

use std::sync::Arc;
use std::time::Instant;

use beacon_analytics_core::constants::session;
use beacon_analytics_core::{
	EndSessionAction, KeyValueStore, SessionInfo, SessionType, StateContainer,
	UpdateIsSessionStartAction, UpdateSessionIdAction, UpdateSessionLastActivityAction,
	UpdateSessionTypeAction,
};

/// Millisecond readings from a clock that never goes backwards.
pub trait MonotonicClock: Send + Sync {
	fn now_ms(&self) -> u64;
}

/// Instant-backed clock anchored at construction.
pub struct SystemMonotonicClock {
	anchor: Instant,
}

impl SystemMonotonicClock {
	pub fn new() -> Self {
		Self {
			anchor: Instant::now(),
		}
	}
}

impl Default for SystemMonotonicClock {
	fn default() -> Self {
		Self::new()
	}
}

impl MonotonicClock for SystemMonotonicClock {
	fn now_ms(&self) -> u64 {
		self.anchor.elapsed().as_millis() as u64
	}
}

/// Session tracking configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
	/// When true, sessions start and roll over automatically on activity.
	pub automatic_tracking: bool,
	/// Inactivity gap after which an automatic session ends.
	pub session_timeout_ms: u64,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			automatic_tracking: true,
			session_timeout_ms: session::DEFAULT_SESSION_TIMEOUT_MS,
		}
	}
}

/// Session fields stamped onto one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStamp {
	pub session_id: u64,
	pub session_start: bool,
}

pub struct SessionHandler {
	store: Arc<dyn KeyValueStore>,
	state: Arc<StateContainer<SessionInfo>>,
	config: SessionConfig,
	clock: Arc<dyn MonotonicClock>,
}

impl SessionHandler {
	/// Restores the persisted session and reconciles it with the tracking
	/// mode: automatic tracking replaces a missing, manual, or timed-out
	/// session with a fresh automatic one; manual tracking ends a leftover
	/// automatic session and keeps a manual one running.
	pub fn new(
		store: Arc<dyn KeyValueStore>,
		config: SessionConfig,
		clock: Arc<dyn MonotonicClock>,
	) -> Self {
		let restored = SessionInfo::initialize(store.as_ref());
		let handler = Self {
			store,
			state: Arc::new(StateContainer::new(restored)),
			config,
			clock,
		};

		if config.automatic_tracking {
			let needs_new = restored.id == session::DEFAULT_SESSION_ID
				|| restored.session_type == SessionType::Manual
				|| handler.is_timed_out(&restored);
			if needs_new {
				handler.start(handler.next_session_id(), SessionType::Automatic);
			}
		} else if restored.session_type == SessionType::Automatic
			&& restored.id != session::DEFAULT_SESSION_ID
		{
			handler.end_session();
		}

		handler
	}

	/// Seconds-resolution wall clock id, the convention for generated ids.
	/// Rolling over within the same second bumps past the current id so a
	/// new session never reuses the id it replaces.
	fn next_session_id(&self) -> u64 {
		let candidate = chrono::Utc::now().timestamp().max(0) as u64;
		let current = self.current().id;
		if candidate > current {
			candidate
		} else {
			current + 1
		}
	}

	pub fn state(&self) -> Arc<StateContainer<SessionInfo>> {
		Arc::clone(&self.state)
	}

	pub fn current(&self) -> SessionInfo {
		self.state.value()
	}

	fn is_timed_out(&self, info: &SessionInfo) -> bool {
		self.clock.now_ms().wrapping_sub(info.last_activity_time) > self.config.session_timeout_ms
	}

	fn start(&self, id: u64, session_type: SessionType) {
		let now = self.clock.now_ms();
		self.state.dispatch(&UpdateSessionIdAction { session_id: id });
		self.state.dispatch(&UpdateSessionTypeAction { session_type });
		self.state.dispatch(&UpdateIsSessionStartAction { is_start: true });
		self.state
			.dispatch(&UpdateSessionLastActivityAction { last_activity_time: now });

		SessionInfo::store_session_id(id, self.store.as_ref());
		SessionInfo::store_session_type(session_type, self.store.as_ref());
		SessionInfo::store_is_session_start(true, self.store.as_ref());
		SessionInfo::store_last_activity_time(now, self.store.as_ref());
		tracing::debug!(session_id = id, ?session_type, "session started");
	}

	/// Starts a manual session. Invalid ids (zero, or fewer decimal digits
	/// than the minimum) are logged and ignored.
	pub fn start_session(&self, session_id: u64) {
		if session_id == session::DEFAULT_SESSION_ID {
			tracing::warn!("ignoring manual session start with reserved id 0");
			return;
		}
		if session_id.to_string().len() < session::MIN_SESSION_ID_LENGTH {
			tracing::warn!(
				session_id,
				min_digits = session::MIN_SESSION_ID_LENGTH,
				"ignoring manual session id with too few digits"
			);
			return;
		}
		self.start(session_id, SessionType::Manual);
	}

	/// Starts a manual session with a generated id.
	pub fn start_generated_session(&self) {
		self.start(self.next_session_id(), SessionType::Manual);
	}

	/// Ends the current session and clears its persisted fields.
	pub fn end_session(&self) {
		self.state.dispatch(&EndSessionAction);
		SessionInfo::clear_stored_state(self.store.as_ref());
		tracing::debug!("session ended");
	}

	/// Starts a new session of the same type as the current one, e.g.
	/// during a reset. A no-op without an active session.
	pub fn refresh_session(&self) {
		let current = self.current();
		if current.id == session::DEFAULT_SESSION_ID {
			return;
		}
		self.start(self.next_session_id(), current.session_type);
	}

	/// Session fields for an event about to be captured. Rolls a timed-out
	/// automatic session over first, records the activity, and consumes
	/// the session-start flag so only the first event carries it.
	pub fn stamp_for_event(&self) -> Option<SessionStamp> {
		let mut current = self.current();
		if current.id == session::DEFAULT_SESSION_ID {
			return None;
		}

		if current.session_type == SessionType::Automatic && self.is_timed_out(&current) {
			self.start(self.next_session_id(), SessionType::Automatic);
			current = self.current();
		} else {
			let now = self.clock.now_ms();
			self.state
				.dispatch(&UpdateSessionLastActivityAction { last_activity_time: now });
			SessionInfo::store_last_activity_time(now, self.store.as_ref());
		}

		let stamp = SessionStamp {
			session_id: current.id,
			session_start: current.is_start,
		};
		if current.is_start {
			self.state.dispatch(&UpdateIsSessionStartAction { is_start: false });
			SessionInfo::store_is_session_start(false, self.store.as_ref());
		}
		Some(stamp)
	}

	/// Records activity when the host app leaves the foreground, anchoring
	/// the timeout window for the return.
	pub fn on_background(&self) {
		let current = self.current();
		if current.id == session::DEFAULT_SESSION_ID {
			return;
		}
		let now = self.clock.now_ms();
		self.state
			.dispatch(&UpdateSessionLastActivityAction { last_activity_time: now });
		SessionInfo::store_last_activity_time(now, self.store.as_ref());
	}

	/// Rolls the automatic session over when the app returns after a gap
	/// longer than the timeout.
	pub fn on_foreground(&self) {
		let current = self.current();
		if !self.config.automatic_tracking
			|| current.session_type != SessionType::Automatic
			|| current.id == session::DEFAULT_SESSION_ID
		{
			return;
		}
		if self.is_timed_out(&current) {
			self.start(self.next_session_id(), SessionType::Automatic);
		}
	}
}
