// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! User identity state: anonymous id, user id, and traits.
//!
//! The identity is mutated only through reducer actions dispatched into a
//! [`StateContainer`](crate::state::StateContainer); each mutation is
//! persisted by its caller immediately after dispatch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::storage_keys;
use crate::kv::KeyValueStore;
use crate::state::StateAction;

/// Free-form user traits attached to the identity.
pub type Traits = serde_json::Map<String, serde_json::Value>;

/// The identity of the current user: an installation-scoped anonymous id,
/// an optional known user id (empty means anonymous), and traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
	pub anonymous_id: String,
	pub user_id: String,
	pub traits: Traits,
}

impl Default for UserIdentity {
	fn default() -> Self {
		Self {
			anonymous_id: String::new(),
			user_id: String::new(),
			traits: Traits::new(),
		}
	}
}

impl UserIdentity {
	/// Loads the persisted identity, generating a fresh anonymous id when
	/// none is stored. Unparseable traits are treated as absent.
	pub fn initialize(store: &dyn KeyValueStore) -> Self {
		let anonymous_id = store
			.read(storage_keys::ANONYMOUS_ID)
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let user_id = store.read(storage_keys::USER_ID).unwrap_or_default();
		let traits = store
			.read(storage_keys::TRAITS)
			.and_then(|json| serde_json::from_str(&json).ok())
			.unwrap_or_default();

		Self {
			anonymous_id,
			user_id,
			traits,
		}
	}

	pub fn store_anonymous_id(&self, store: &dyn KeyValueStore) {
		store.write(storage_keys::ANONYMOUS_ID, &self.anonymous_id);
	}

	pub fn store_user_id(&self, store: &dyn KeyValueStore) {
		store.write(storage_keys::USER_ID, &self.user_id);
	}

	pub fn store_user_id_and_traits(&self, store: &dyn KeyValueStore) {
		self.store_user_id(store);
		let json = serde_json::to_string(&self.traits).unwrap_or_else(|_| "{}".to_string());
		store.write(storage_keys::TRAITS, &json);
	}

	/// Persists the post-reset identity: the (possibly regenerated)
	/// anonymous id is written back, user id and traits are removed.
	pub fn store_after_reset(&self, store: &dyn KeyValueStore) {
		self.store_anonymous_id(store);
		store.remove(storage_keys::USER_ID);
		store.remove(storage_keys::TRAITS);
	}

	/// Resolves the previous id for an alias event: an explicit previous id
	/// wins, then the known user id, then the anonymous id.
	pub fn resolve_preferred_previous_id(&self, previous_id: &str) -> String {
		if !previous_id.is_empty() {
			previous_id.to_string()
		} else if !self.user_id.is_empty() {
			self.user_id.clone()
		} else {
			self.anonymous_id.clone()
		}
	}
}

/// Replaces the anonymous id.
pub struct SetAnonymousIdAction {
	pub anonymous_id: String,
}

impl StateAction<UserIdentity> for SetAnonymousIdAction {
	fn reduce(&self, current: UserIdentity) -> UserIdentity {
		UserIdentity {
			anonymous_id: self.anonymous_id.clone(),
			..current
		}
	}
}

/// Sets the known user id, keeping traits.
pub struct SetUserIdAction {
	pub user_id: String,
}

impl StateAction<UserIdentity> for SetUserIdAction {
	fn reduce(&self, current: UserIdentity) -> UserIdentity {
		UserIdentity {
			user_id: self.user_id.clone(),
			..current
		}
	}
}

/// Sets the known user id together with its traits.
pub struct SetUserIdAndTraitsAction {
	pub user_id: String,
	pub traits: Traits,
}

impl StateAction<UserIdentity> for SetUserIdAndTraitsAction {
	fn reduce(&self, current: UserIdentity) -> UserIdentity {
		UserIdentity {
			user_id: self.user_id.clone(),
			traits: self.traits.clone(),
			..current
		}
	}
}

/// Selects which identity fields a reset clears. Fields left `false`
/// survive the reset untouched.
#[derive(Debug, Clone, Copy)]
pub struct ResetEntries {
	pub anonymous_id: bool,
	pub user_id: bool,
	pub traits: bool,
	pub session: bool,
}

impl Default for ResetEntries {
	fn default() -> Self {
		Self {
			anonymous_id: true,
			user_id: true,
			traits: true,
			session: true,
		}
	}
}

/// Clears the selected identity fields; a cleared anonymous id is replaced
/// with a freshly generated one.
pub struct ResetUserIdentityAction {
	pub entries: ResetEntries,
}

impl StateAction<UserIdentity> for ResetUserIdentityAction {
	fn reduce(&self, current: UserIdentity) -> UserIdentity {
		UserIdentity {
			anonymous_id: if self.entries.anonymous_id {
				Uuid::new_v4().to_string()
			} else {
				current.anonymous_id
			},
			user_id: if self.entries.user_id {
				String::new()
			} else {
				current.user_id
			},
			traits: if self.entries.traits {
				Traits::new()
			} else {
				current.traits
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn identity() -> UserIdentity {
		let mut traits = Traits::new();
		traits.insert("plan".to_string(), serde_json::json!("pro"));
		UserIdentity {
			anonymous_id: "anon-1".to_string(),
			user_id: "user-1".to_string(),
			traits,
		}
	}

	#[test]
	fn set_user_id_keeps_other_fields() {
		let action = SetUserIdAction {
			user_id: "user-2".to_string(),
		};
		let updated = action.reduce(identity());
		assert_eq!(updated.user_id, "user-2");
		assert_eq!(updated.anonymous_id, "anon-1");
		assert!(updated.traits.contains_key("plan"));
	}

	#[test]
	fn set_user_id_and_traits_replaces_traits() {
		let mut traits = Traits::new();
		traits.insert("tier".to_string(), serde_json::json!("free"));
		let action = SetUserIdAndTraitsAction {
			user_id: "user-2".to_string(),
			traits,
		};
		let updated = action.reduce(identity());
		assert_eq!(updated.user_id, "user-2");
		assert!(updated.traits.contains_key("tier"));
		assert!(!updated.traits.contains_key("plan"));
	}

	#[test]
	fn full_reset_regenerates_anonymous_id() {
		let action = ResetUserIdentityAction {
			entries: ResetEntries::default(),
		};
		let updated = action.reduce(identity());
		assert_ne!(updated.anonymous_id, "anon-1");
		assert!(!updated.anonymous_id.is_empty());
		assert!(updated.user_id.is_empty());
		assert!(updated.traits.is_empty());
	}

	#[test]
	fn reset_preserves_unselected_fields() {
		let action = ResetUserIdentityAction {
			entries: ResetEntries {
				anonymous_id: false,
				user_id: true,
				traits: false,
				session: true,
			},
		};
		let updated = action.reduce(identity());
		assert_eq!(updated.anonymous_id, "anon-1");
		assert!(updated.user_id.is_empty());
		assert!(updated.traits.contains_key("plan"));
	}

	#[test]
	fn resolve_previous_id_prefers_explicit_value() {
		let identity = identity();
		assert_eq!(identity.resolve_preferred_previous_id("prev"), "prev");
		assert_eq!(identity.resolve_preferred_previous_id(""), "user-1");

		let anonymous = UserIdentity {
			anonymous_id: "anon-1".to_string(),
			..Default::default()
		};
		assert_eq!(anonymous.resolve_preferred_previous_id(""), "anon-1");
	}

	#[test]
	fn initialize_generates_anonymous_id_when_absent() {
		struct EmptyStore;
		impl KeyValueStore for EmptyStore {
			fn write(&self, _key: &str, _value: &str) {}
			fn read(&self, _key: &str) -> Option<String> {
				None
			}
			fn remove(&self, _key: &str) {}
		}

		let identity = UserIdentity::initialize(&EmptyStore);
		assert!(!identity.anonymous_id.is_empty());
		assert!(identity.user_id.is_empty());
		assert!(identity.traits.is_empty());
	}
}
