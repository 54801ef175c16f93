// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Serializable record of a batch's retry history. Round-trips through JSON
//! in the key-value store; parse failures are treated as absent metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryMetadata {
	pub batch_id: String,
	pub attempt: u32,
	pub last_attempt_timestamp_ms: u64,
	pub reason: String,
}

impl RetryMetadata {
	pub fn to_json(&self) -> Option<String> {
		serde_json::to_string(self).ok()
	}

	pub fn from_json(json: &str) -> Option<Self> {
		serde_json::from_str(json).ok()
	}
}
