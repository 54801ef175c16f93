// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Remote source configuration: the enablement flag and destination list
//! fetched from the control plane, cached locally, and read by the write
//! path to gate flush scheduling.

use serde::{Deserialize, Serialize};

use crate::state::StateAction;

/// One downstream destination declared for the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
	pub id: String,
	pub name: String,
	pub enabled: bool,
}

/// The source as described by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfigSource {
	pub id: String,
	pub name: String,
	pub write_key: String,
	pub enabled: bool,
	pub workspace_id: String,
	#[serde(default)]
	pub updated_at: String,
	#[serde(default)]
	pub destinations: Vec<Destination>,
}

/// Top-level source configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
	pub source: SourceConfigSource,
}

impl SourceConfig {
	/// The state used until a remote or cached config arrives: enabled, so
	/// events keep flowing to storage while the fetch is in flight.
	pub fn initial() -> Self {
		Self {
			source: SourceConfigSource {
				id: String::new(),
				name: String::new(),
				write_key: String::new(),
				enabled: true,
				workspace_id: String::new(),
				updated_at: String::new(),
				destinations: Vec::new(),
			},
		}
	}

	pub fn is_source_enabled(&self) -> bool {
		self.source.enabled
	}
}

/// Replaces the whole config with a freshly fetched or cached one.
pub struct UpdateSourceConfigAction {
	pub config: SourceConfig,
}

impl StateAction<SourceConfig> for UpdateSourceConfigAction {
	fn reduce(&self, _current: SourceConfig) -> SourceConfig {
		self.config.clone()
	}
}

/// Marks the source disabled, e.g. after the collector answers 404.
pub struct DisableSourceConfigAction;

impl StateAction<SourceConfig> for DisableSourceConfigAction {
	fn reduce(&self, current: SourceConfig) -> SourceConfig {
		SourceConfig {
			source: SourceConfigSource {
				enabled: false,
				..current.source
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn initial_config_is_enabled() {
		assert!(SourceConfig::initial().is_source_enabled());
	}

	#[test]
	fn disable_action_clears_enabled_flag_only() {
		let config = SourceConfig {
			source: SourceConfigSource {
				id: "src-1".to_string(),
				name: "app".to_string(),
				write_key: "wk".to_string(),
				enabled: true,
				workspace_id: "ws".to_string(),
				updated_at: String::new(),
				destinations: Vec::new(),
			},
		};
		let disabled = DisableSourceConfigAction.reduce(config);
		assert!(!disabled.is_source_enabled());
		assert_eq!(disabled.source.id, "src-1");
	}

	#[test]
	fn update_action_replaces_config() {
		let incoming = SourceConfig {
			source: SourceConfigSource {
				id: "src-2".to_string(),
				name: "app".to_string(),
				write_key: "wk".to_string(),
				enabled: false,
				workspace_id: "ws".to_string(),
				updated_at: String::new(),
				destinations: Vec::new(),
			},
		};
		let action = UpdateSourceConfigAction {
			config: incoming.clone(),
		};
		assert_eq!(action.reduce(SourceConfig::initial()), incoming);
	}

	#[test]
	fn config_json_round_trips() {
		let json = r#"{"source":{"id":"s","name":"n","writeKey":"wk","enabled":true,"workspaceId":"w","updatedAt":"","destinations":[{"id":"d","name":"dest","enabled":false}]}}"#;
		let parsed: SourceConfig = serde_json::from_str(json).unwrap();
		assert!(parsed.is_source_enabled());
		assert_eq!(parsed.source.destinations.len(), 1);
		let back = serde_json::to_string(&parsed).unwrap();
		let reparsed: SourceConfig = serde_json::from_str(&back).unwrap();
		assert_eq!(parsed, reparsed);
	}
}
