// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Session state: the `SessionInfo` record, its reducer actions, and the
//! storage load/store helpers. The lifecycle state machine that drives these
//! lives in the SDK crate.

use crate::constants::{session, storage_keys};
use crate::kv::KeyValueStore;
use crate::state::StateAction;

/// How a session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
	Manual,
	Automatic,
}

/// The current session, one per process. A `session_id` of zero means no
/// session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
	pub id: u64,
	pub session_type: SessionType,
	pub is_start: bool,
	/// Monotonic clock reading (milliseconds) of the last recorded activity.
	pub last_activity_time: u64,
}

impl Default for SessionInfo {
	fn default() -> Self {
		Self {
			id: session::DEFAULT_SESSION_ID,
			session_type: SessionType::Automatic,
			is_start: false,
			last_activity_time: 0,
		}
	}
}

impl SessionInfo {
	/// Loads persisted session fields; malformed values fall back to
	/// defaults.
	pub fn initialize(store: &dyn KeyValueStore) -> Self {
		let mut info = SessionInfo::default();

		if let Some(id) = store
			.read(storage_keys::SESSION_ID)
			.and_then(|value| value.parse::<u64>().ok())
		{
			info.id = id;
		}
		if let Some(is_manual) = store
			.read(storage_keys::IS_MANUAL_SESSION)
			.and_then(|value| value.parse::<bool>().ok())
		{
			info.session_type = if is_manual {
				SessionType::Manual
			} else {
				SessionType::Automatic
			};
		}
		if let Some(is_start) = store
			.read(storage_keys::IS_SESSION_START)
			.and_then(|value| value.parse::<bool>().ok())
		{
			info.is_start = is_start;
		}
		if let Some(last_activity) = store
			.read(storage_keys::SESSION_LAST_ACTIVITY_TIME)
			.and_then(|value| value.parse::<u64>().ok())
		{
			info.last_activity_time = last_activity;
		}

		info
	}

	pub fn store_session_id(id: u64, store: &dyn KeyValueStore) {
		store.write(storage_keys::SESSION_ID, &id.to_string());
	}

	pub fn store_session_type(session_type: SessionType, store: &dyn KeyValueStore) {
		let is_manual = session_type == SessionType::Manual;
		store.write(storage_keys::IS_MANUAL_SESSION, &is_manual.to_string());
	}

	pub fn store_is_session_start(is_start: bool, store: &dyn KeyValueStore) {
		store.write(storage_keys::IS_SESSION_START, &is_start.to_string());
	}

	pub fn store_last_activity_time(time: u64, store: &dyn KeyValueStore) {
		store.write(storage_keys::SESSION_LAST_ACTIVITY_TIME, &time.to_string());
	}

	/// Removes every persisted session field.
	pub fn clear_stored_state(store: &dyn KeyValueStore) {
		store.remove(storage_keys::SESSION_ID);
		store.remove(storage_keys::IS_MANUAL_SESSION);
		store.remove(storage_keys::IS_SESSION_START);
		store.remove(storage_keys::SESSION_LAST_ACTIVITY_TIME);
	}
}

pub struct UpdateSessionIdAction {
	pub session_id: u64,
}

impl StateAction<SessionInfo> for UpdateSessionIdAction {
	fn reduce(&self, current: SessionInfo) -> SessionInfo {
		SessionInfo {
			id: self.session_id,
			..current
		}
	}
}

pub struct UpdateSessionTypeAction {
	pub session_type: SessionType,
}

impl StateAction<SessionInfo> for UpdateSessionTypeAction {
	fn reduce(&self, current: SessionInfo) -> SessionInfo {
		SessionInfo {
			session_type: self.session_type,
			..current
		}
	}
}

pub struct UpdateIsSessionStartAction {
	pub is_start: bool,
}

impl StateAction<SessionInfo> for UpdateIsSessionStartAction {
	fn reduce(&self, current: SessionInfo) -> SessionInfo {
		SessionInfo {
			is_start: self.is_start,
			..current
		}
	}
}

pub struct UpdateSessionLastActivityAction {
	pub last_activity_time: u64,
}

impl StateAction<SessionInfo> for UpdateSessionLastActivityAction {
	fn reduce(&self, current: SessionInfo) -> SessionInfo {
		SessionInfo {
			last_activity_time: self.last_activity_time,
			..current
		}
	}
}

/// Reverts every field to its default.
pub struct EndSessionAction;

impl StateAction<SessionInfo> for EndSessionAction {
	fn reduce(&self, _current: SessionInfo) -> SessionInfo {
		SessionInfo::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	struct MapStore {
		values: Mutex<HashMap<String, String>>,
	}

	impl KeyValueStore for MapStore {
		fn write(&self, key: &str, value: &str) {
			self.values.lock().unwrap().insert(key.to_string(), value.to_string());
		}
		fn read(&self, key: &str) -> Option<String> {
			self.values.lock().unwrap().get(key).cloned()
		}
		fn remove(&self, key: &str) {
			self.values.lock().unwrap().remove(key);
		}
	}

	#[test]
	fn initialize_defaults_when_store_is_empty() {
		let store = MapStore::default();
		let info = SessionInfo::initialize(&store);
		assert_eq!(info, SessionInfo::default());
	}

	#[test]
	fn stored_fields_round_trip() {
		let store = MapStore::default();
		SessionInfo::store_session_id(1_700_000_000, &store);
		SessionInfo::store_session_type(SessionType::Manual, &store);
		SessionInfo::store_is_session_start(true, &store);
		SessionInfo::store_last_activity_time(42, &store);

		let info = SessionInfo::initialize(&store);
		assert_eq!(info.id, 1_700_000_000);
		assert_eq!(info.session_type, SessionType::Manual);
		assert!(info.is_start);
		assert_eq!(info.last_activity_time, 42);
	}

	#[test]
	fn malformed_values_fall_back_to_defaults() {
		let store = MapStore::default();
		store.write(storage_keys::SESSION_ID, "not-a-number");
		store.write(storage_keys::IS_MANUAL_SESSION, "maybe");

		let info = SessionInfo::initialize(&store);
		assert_eq!(info.id, session::DEFAULT_SESSION_ID);
		assert_eq!(info.session_type, SessionType::Automatic);
	}

	#[test]
	fn end_session_action_restores_defaults() {
		let active = SessionInfo {
			id: 12,
			session_type: SessionType::Manual,
			is_start: true,
			last_activity_time: 99,
		};
		assert_eq!(EndSessionAction.reduce(active), SessionInfo::default());
	}

	#[test]
	fn clear_stored_state_removes_all_keys() {
		let store = MapStore::default();
		SessionInfo::store_session_id(5, &store);
		SessionInfo::store_is_session_start(true, &store);
		SessionInfo::clear_stored_state(&store);
		assert_eq!(SessionInfo::initialize(&store), SessionInfo::default());
	}
}
