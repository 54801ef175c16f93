// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Retry telemetry headers attached to batch uploads.
//!
//! Failure metadata persists in the key-value store keyed to the batch it
//! describes, so the attempt count survives restarts. Metadata recorded
//! for a different batch is stale and discarded rather than reported.

use std::sync::Arc;

use beacon_analytics_core::constants::storage_keys;
use beacon_analytics_core::{KeyValueStore, RetryMetadata};

const HEADER_RETRY_ATTEMPT: &str = "X-Retry-Attempt";
const HEADER_SINCE_LAST_ATTEMPT: &str = "X-Since-Last-Attempt";
const HEADER_RETRY_REASON: &str = "X-Retry-Reason";

pub struct RetryHeadersProvider {
	store: Arc<dyn KeyValueStore>,
}

impl RetryHeadersProvider {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	fn load(&self) -> Option<RetryMetadata> {
		self.store
			.read(storage_keys::RETRY_METADATA)
			.and_then(|json| RetryMetadata::from_json(&json))
	}

	/// Headers describing prior failed attempts for this batch. Empty on
	/// a first attempt; metadata for another batch is dropped.
	pub fn prepare(&self, batch_id: &str, now_ms: u64) -> Vec<(String, String)> {
		let Some(metadata) = self.load() else {
			return Vec::new();
		};
		if metadata.batch_id != batch_id {
			tracing::debug!(
				stored = %metadata.batch_id,
				current = %batch_id,
				"discarding retry metadata for a different batch"
			);
			self.clear();
			return Vec::new();
		}
		let since_ms = now_ms.saturating_sub(metadata.last_attempt_timestamp_ms);
		vec![
			(HEADER_RETRY_ATTEMPT.to_string(), metadata.attempt.to_string()),
			(HEADER_SINCE_LAST_ATTEMPT.to_string(), since_ms.to_string()),
			(HEADER_RETRY_REASON.to_string(), metadata.reason),
		]
	}

	/// Records a failed attempt. The attempt count continues for the same
	/// batch and restarts at one for a new batch.
	pub fn record_failure(&self, batch_id: &str, reason: &str, now_ms: u64) {
		let attempt = match self.load() {
			Some(existing) if existing.batch_id == batch_id => existing.attempt + 1,
			_ => 1,
		};
		let metadata = RetryMetadata {
			batch_id: batch_id.to_string(),
			attempt,
			last_attempt_timestamp_ms: now_ms,
			reason: reason.to_string(),
		};
		if let Some(json) = metadata.to_json() {
			self.store.write(storage_keys::RETRY_METADATA, &json);
		}
	}

	/// Drops the stored metadata, e.g. after a successful upload.
	pub fn clear(&self) {
		self.store.remove(storage_keys::RETRY_METADATA);
	}
}
