// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Durable staging for events between capture and upload.
//!
//! Written events accumulate in an open batch. A rollover seals the open
//! batch into an immutable upload payload with the sent-at placeholder
//! embedded; sealed batches are read and deleted by the uploader. The
//! key-value side holds small pipeline state: identity, session, cached
//! source config, and retry metadata.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use beacon_analytics_core::constants::SENT_AT_PLACEHOLDER;
use beacon_analytics_core::KeyValueStore;
use uuid::Uuid;

/// Opaque handle identifying one sealed batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchReference(pub String);

/// One sealed batch ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
	pub reference: BatchReference,
	pub payload: String,
}

/// Staging store for serialized events and sealed batches.
#[async_trait]
pub trait EventStore: Send + Sync {
	/// Appends one serialized event to the open batch.
	async fn write_event(&self, event_json: &str);

	/// All sealed batches, oldest first.
	async fn read_batches(&self) -> Vec<BatchItem>;

	/// Deletes a sealed batch. Returns false if the reference is unknown.
	async fn remove_batch(&self, reference: &BatchReference) -> bool;

	/// Seals the open batch into an upload payload. A no-op when the open
	/// batch is empty.
	async fn rollover(&self);
}

/// Full storage surface the pipeline runs against.
pub trait Storage: KeyValueStore + EventStore {}

impl<T: KeyValueStore + EventStore> Storage for T {}

#[derive(Default)]
struct EventBuffer {
	current: Vec<String>,
	sealed: Vec<BatchItem>,
}

/// In-memory storage, the default backend and the one tests run against.
/// Contents do not survive the process.
#[derive(Default)]
pub struct MemoryStorage {
	kv: Mutex<HashMap<String, String>>,
	events: Mutex<EventBuffer>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

fn seal_payload(events: &[String]) -> String {
	format!(
		"{{\"batch\":[{}],\"sentAt\":\"{}\"}}",
		events.join(","),
		SENT_AT_PLACEHOLDER
	)
}

impl KeyValueStore for MemoryStorage {
	fn write(&self, key: &str, value: &str) {
		self.kv.lock().unwrap().insert(key.to_string(), value.to_string());
	}

	fn read(&self, key: &str) -> Option<String> {
		self.kv.lock().unwrap().get(key).cloned()
	}

	fn remove(&self, key: &str) {
		self.kv.lock().unwrap().remove(key);
	}
}

#[async_trait]
impl EventStore for MemoryStorage {
	async fn write_event(&self, event_json: &str) {
		self.events.lock().unwrap().current.push(event_json.to_string());
	}

	async fn read_batches(&self) -> Vec<BatchItem> {
		self.events.lock().unwrap().sealed.clone()
	}

	async fn remove_batch(&self, reference: &BatchReference) -> bool {
		let mut buffer = self.events.lock().unwrap();
		let before = buffer.sealed.len();
		buffer.sealed.retain(|item| item.reference != *reference);
		buffer.sealed.len() != before
	}

	async fn rollover(&self) {
		let mut buffer = self.events.lock().unwrap();
		if buffer.current.is_empty() {
			return;
		}
		let payload = seal_payload(&buffer.current);
		buffer.current.clear();
		buffer.sealed.push(BatchItem {
			reference: BatchReference(Uuid::new_v4().to_string()),
			payload,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn rollover_seals_written_events_into_a_batch() {
		let storage = MemoryStorage::new();
		storage.write_event(r#"{"type":"track","event":"a"}"#).await;
		storage.write_event(r#"{"type":"track","event":"b"}"#).await;
		assert!(storage.read_batches().await.is_empty());

		storage.rollover().await;
		let batches = storage.read_batches().await;
		assert_eq!(batches.len(), 1);

		let value: serde_json::Value = serde_json::from_str(&batches[0].payload).unwrap();
		assert_eq!(value["batch"].as_array().unwrap().len(), 2);
		assert_eq!(value["batch"][0]["event"], "a");
		assert_eq!(value["sentAt"], SENT_AT_PLACEHOLDER);
	}

	#[tokio::test]
	async fn rollover_of_empty_batch_is_a_no_op() {
		let storage = MemoryStorage::new();
		storage.rollover().await;
		storage.rollover().await;
		assert!(storage.read_batches().await.is_empty());
	}

	#[tokio::test]
	async fn sealed_batches_are_read_oldest_first_and_removable() {
		let storage = MemoryStorage::new();
		storage.write_event(r#"{"n":1}"#).await;
		storage.rollover().await;
		storage.write_event(r#"{"n":2}"#).await;
		storage.rollover().await;

		let batches = storage.read_batches().await;
		assert_eq!(batches.len(), 2);
		assert!(batches[0].payload.contains(r#""n":1"#));

		assert!(storage.remove_batch(&batches[0].reference).await);
		assert!(!storage.remove_batch(&batches[0].reference).await);
		assert_eq!(storage.read_batches().await.len(), 1);
	}

	#[tokio::test]
	async fn events_written_after_rollover_go_to_a_new_batch() {
		let storage = MemoryStorage::new();
		storage.write_event(r#"{"n":1}"#).await;
		storage.rollover().await;
		storage.write_event(r#"{"n":2}"#).await;
		let batches = storage.read_batches().await;
		assert_eq!(batches.len(), 1);
		assert!(!batches[0].payload.contains(r#""n":2"#));
	}

	#[test]
	fn key_value_side_round_trips() {
		let storage = MemoryStorage::new();
		KeyValueStore::write(&storage, "k", "v");
		assert_eq!(KeyValueStore::read(&storage, "k"), Some("v".to_string()));
		KeyValueStore::remove(&storage, "k");
		assert_eq!(KeyValueStore::read(&storage, "k"), None);
	}
}
