// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The event data model and its wire serialization.
//!
//! An [`Event`] is immutable once created: constructors capture a snapshot
//! of the user identity at creation time and stamp a unique message id and
//! timestamp. Serialization to the wire format happens only at write time,
//! with the sent-at field holding a literal placeholder that the uploader
//! substitutes just before transmission.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SENT_AT_PLACEHOLDER;
use crate::identity::{Traits, UserIdentity};

/// Free-form JSON maps for context, integrations, and properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Channel identifier stamped on every event.
const CHANNEL: &str = "client";

/// The variant-specific portion of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
	#[serde(rename_all = "camelCase")]
	Track {
		event: String,
		#[serde(default, skip_serializing_if = "Properties::is_empty")]
		properties: Properties,
	},
	#[serde(rename_all = "camelCase")]
	Screen {
		name: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		category: Option<String>,
		#[serde(default, skip_serializing_if = "Properties::is_empty")]
		properties: Properties,
	},
	#[serde(rename_all = "camelCase")]
	Group {
		group_id: String,
		#[serde(default, skip_serializing_if = "Traits::is_empty")]
		traits: Traits,
	},
	#[serde(rename_all = "camelCase")]
	Identify {
		#[serde(default, skip_serializing_if = "Traits::is_empty")]
		traits: Traits,
	},
	#[serde(rename_all = "camelCase")]
	Alias {
		previous_id: String,
	},
}

/// One analytics event: a tagged variant plus the shared envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	#[serde(flatten)]
	pub kind: EventKind,
	pub message_id: String,
	pub original_timestamp: String,
	pub anonymous_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	pub channel: String,
	#[serde(default, skip_serializing_if = "Properties::is_empty")]
	pub context: Properties,
	#[serde(default, skip_serializing_if = "Properties::is_empty")]
	pub integrations: Properties,
	pub sent_at: String,
	/// Identity state at creation time; never serialized.
	#[serde(skip)]
	pub identity_snapshot: UserIdentity,
}

impl Event {
	fn envelope(kind: EventKind, identity: &UserIdentity) -> Self {
		Self {
			kind,
			message_id: Uuid::new_v4().to_string(),
			original_timestamp: chrono::Utc::now().to_rfc3339(),
			anonymous_id: identity.anonymous_id.clone(),
			user_id: if identity.user_id.is_empty() {
				None
			} else {
				Some(identity.user_id.clone())
			},
			channel: CHANNEL.to_string(),
			context: Properties::new(),
			integrations: Properties::new(),
			sent_at: SENT_AT_PLACEHOLDER.to_string(),
			identity_snapshot: identity.clone(),
		}
	}

	pub fn track(event: impl Into<String>, properties: Properties, identity: &UserIdentity) -> Self {
		Self::envelope(
			EventKind::Track {
				event: event.into(),
				properties,
			},
			identity,
		)
	}

	pub fn screen(
		name: impl Into<String>,
		category: Option<String>,
		properties: Properties,
		identity: &UserIdentity,
	) -> Self {
		Self::envelope(
			EventKind::Screen {
				name: name.into(),
				category,
				properties,
			},
			identity,
		)
	}

	pub fn group(group_id: impl Into<String>, traits: Traits, identity: &UserIdentity) -> Self {
		Self::envelope(
			EventKind::Group {
				group_id: group_id.into(),
				traits,
			},
			identity,
		)
	}

	pub fn identify(identity: &UserIdentity) -> Self {
		Self::envelope(
			EventKind::Identify {
				traits: identity.traits.clone(),
			},
			identity,
		)
	}

	pub fn alias(previous_id: impl Into<String>, identity: &UserIdentity) -> Self {
		Self::envelope(
			EventKind::Alias {
				previous_id: previous_id.into(),
			},
			identity,
		)
	}

	/// The wire name of this event's variant.
	pub fn event_type(&self) -> &'static str {
		match self.kind {
			EventKind::Track { .. } => "track",
			EventKind::Screen { .. } => "screen",
			EventKind::Group { .. } => "group",
			EventKind::Identify { .. } => "identify",
			EventKind::Alias { .. } => "alias",
		}
	}

	/// Serializes the event to its wire form.
	pub fn to_wire_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn identity() -> UserIdentity {
		UserIdentity {
			anonymous_id: "anon-1".to_string(),
			user_id: "user-1".to_string(),
			traits: Traits::new(),
		}
	}

	#[test]
	fn track_event_serializes_with_type_tag() {
		let mut properties = Properties::new();
		properties.insert("value".to_string(), serde_json::json!(42));
		let event = Event::track("Checkout", properties, &identity());

		let value: serde_json::Value = serde_json::from_str(&event.to_wire_json().unwrap()).unwrap();
		assert_eq!(value["type"], "track");
		assert_eq!(value["event"], "Checkout");
		assert_eq!(value["properties"]["value"], 42);
		assert_eq!(value["anonymousId"], "anon-1");
		assert_eq!(value["userId"], "user-1");
		assert_eq!(value["channel"], "client");
		assert_eq!(value["sentAt"], SENT_AT_PLACEHOLDER);
	}

	#[test]
	fn anonymous_identity_omits_user_id() {
		let identity = UserIdentity {
			anonymous_id: "anon-1".to_string(),
			..Default::default()
		};
		let event = Event::track("Launch", Properties::new(), &identity);
		let value: serde_json::Value = serde_json::from_str(&event.to_wire_json().unwrap()).unwrap();
		assert!(value.get("userId").is_none());
	}

	#[test]
	fn screen_event_carries_name_and_category() {
		let event = Event::screen("Home", Some("main".to_string()), Properties::new(), &identity());
		let value: serde_json::Value = serde_json::from_str(&event.to_wire_json().unwrap()).unwrap();
		assert_eq!(value["type"], "screen");
		assert_eq!(value["name"], "Home");
		assert_eq!(value["category"], "main");
	}

	#[test]
	fn alias_event_serializes_previous_id() {
		let event = Event::alias("old-user", &identity());
		let value: serde_json::Value = serde_json::from_str(&event.to_wire_json().unwrap()).unwrap();
		assert_eq!(value["type"], "alias");
		assert_eq!(value["previousId"], "old-user");
	}

	#[test]
	fn identify_event_carries_identity_traits() {
		let mut identity = identity();
		identity
			.traits
			.insert("plan".to_string(), serde_json::json!("pro"));
		let event = Event::identify(&identity);
		let value: serde_json::Value = serde_json::from_str(&event.to_wire_json().unwrap()).unwrap();
		assert_eq!(value["type"], "identify");
		assert_eq!(value["traits"]["plan"], "pro");
	}

	#[test]
	fn message_ids_are_unique() {
		let first = Event::track("a", Properties::new(), &identity());
		let second = Event::track("a", Properties::new(), &identity());
		assert_ne!(first.message_id, second.message_id);
	}

	#[test]
	fn wire_json_round_trips() {
		let event = Event::group("team-1", Traits::new(), &identity());
		let json = event.to_wire_json().unwrap();
		let parsed: Event = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed.kind, event.kind);
		assert_eq!(parsed.message_id, event.message_id);
	}
}
