// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The write path: a single consumer task that serializes captured events
//! into storage and decides when a batch is sealed for upload.
//!
//! Events from producers and explicit flush requests arrive on one
//! channel, so ordering between them is exactly submission order. Batches
//! are fenced by anonymous id: when an event carries a different
//! anonymous id than the previous one, the open batch is sealed first so
//! no batch ever mixes identities.

use std::sync::{Arc, Mutex};

use beacon_analytics_core::constants::{storage_keys, UPLOAD_SIGNAL};
use beacon_analytics_core::{Event, KeyValueStore, SourceConfig, StateContainer};
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::policies::FlushPolicyFacade;
use crate::storage::Storage;

/// Work items consumed by the writer loop.
pub enum ProcessingEvent {
	Message(Box<Event>),
	Flush,
}

pub struct EventWriter {
	channel: Arc<Channel<ProcessingEvent>>,
	storage: Arc<dyn Storage>,
	policies: Arc<FlushPolicyFacade>,
	source_config: Arc<StateContainer<SourceConfig>>,
	upload_channel: Arc<Channel<&'static str>>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl EventWriter {
	pub fn new(
		storage: Arc<dyn Storage>,
		policies: Arc<FlushPolicyFacade>,
		source_config: Arc<StateContainer<SourceConfig>>,
		upload_channel: Arc<Channel<&'static str>>,
	) -> Self {
		Self {
			channel: Arc::new(Channel::unbounded()),
			storage,
			policies,
			source_config,
			upload_channel,
			task: Mutex::new(None),
		}
	}

	/// Spawns the consumer loop. Call once.
	pub fn start(&self) {
		let Some(mut receiver) = self.channel.take_receiver() else {
			tracing::warn!("event writer already started");
			return;
		};
		let storage = Arc::clone(&self.storage);
		let policies = Arc::clone(&self.policies);
		let source_config = Arc::clone(&self.source_config);
		let upload_channel = Arc::clone(&self.upload_channel);

		let task = tokio::spawn(async move {
			while let Some(item) = receiver.recv().await {
				match item {
					ProcessingEvent::Message(event) => {
						Self::write_event(&*event, storage.as_ref()).await;
						policies.update_event_count();
						if policies.should_flush() {
							Self::seal_and_signal(
								&storage,
								&policies,
								&source_config,
								&upload_channel,
							)
							.await;
						}
					}
					ProcessingEvent::Flush => {
						Self::seal_and_signal(&storage, &policies, &source_config, &upload_channel)
							.await;
					}
				}
			}
			tracing::debug!("event writer drained and stopped");
		});
		*self.task.lock().unwrap() = Some(task);
	}

	async fn write_event(event: &Event, storage: &dyn Storage) {
		let last = storage.read(storage_keys::LAST_EVENT_ANONYMOUS_ID);
		if last.as_deref() != Some(event.anonymous_id.as_str()) {
			if last.is_some() {
				tracing::debug!("anonymous id changed, sealing open batch");
				storage.rollover().await;
			}
			storage.write(storage_keys::LAST_EVENT_ANONYMOUS_ID, &event.anonymous_id);
		}

		match event.to_wire_json() {
			Ok(json) => storage.write_event(&json).await,
			Err(err) => {
				tracing::error!(error = %err, event_type = event.event_type(), "dropping unserializable event");
			}
		}
	}

	async fn seal_and_signal(
		storage: &Arc<dyn Storage>,
		policies: &FlushPolicyFacade,
		source_config: &StateContainer<SourceConfig>,
		upload_channel: &Channel<&'static str>,
	) {
		if !source_config.value().is_source_enabled() {
			tracing::debug!("source disabled, keeping events buffered");
			return;
		}
		policies.reset();
		storage.rollover().await;
		if upload_channel.send(UPLOAD_SIGNAL).is_err() {
			tracing::debug!("upload channel closed, batch stays in storage");
		}
	}

	/// Enqueues one event. Non-blocking; fails only after stop.
	pub fn put(&self, event: Event) {
		if let Err(err) = self.channel.send(ProcessingEvent::Message(Box::new(event))) {
			tracing::error!(error = %err.reason(), "dropping event, writer is stopped");
		}
	}

	/// Requests a flush, ordered after everything already enqueued.
	pub fn flush(&self) {
		if let Err(err) = self.channel.send(ProcessingEvent::Flush) {
			tracing::debug!(error = %err.reason(), "ignoring flush, writer is stopped");
		}
	}

	/// Closes the intake and waits for the loop to drain buffered items
	/// into storage. Idempotent.
	pub async fn stop(&self) {
		self.channel.close();
		let task = self.task.lock().unwrap().take();
		if let Some(task) = task {
			if let Err(err) = task.await {
				tracing::error!(error = %err, "event writer task failed");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policies::{CountFlushPolicy, FlushPolicy};
	use crate::storage::{EventStore, MemoryStorage};
	use beacon_analytics_core::{Properties, UserIdentity};

	struct Fixture {
		writer: EventWriter,
		storage: Arc<MemoryStorage>,
		upload_channel: Arc<Channel<&'static str>>,
		source_config: Arc<StateContainer<SourceConfig>>,
	}

	fn fixture(policies: Vec<Arc<dyn FlushPolicy>>) -> Fixture {
		let storage = Arc::new(MemoryStorage::new());
		let upload_channel = Arc::new(Channel::unbounded());
		let source_config = Arc::new(StateContainer::new(SourceConfig::initial()));
		let writer = EventWriter::new(
			Arc::clone(&storage) as Arc<dyn Storage>,
			Arc::new(FlushPolicyFacade::new(policies)),
			Arc::clone(&source_config),
			Arc::clone(&upload_channel),
		);
		writer.start();
		Fixture {
			writer,
			storage,
			upload_channel,
			source_config,
		}
	}

	fn event_for(anonymous_id: &str, name: &str) -> Event {
		let identity = UserIdentity {
			anonymous_id: anonymous_id.to_string(),
			..Default::default()
		};
		Event::track(name, Properties::new(), &identity)
	}

	#[tokio::test]
	async fn count_policy_seals_a_batch_at_threshold() {
		let fixture = fixture(vec![Arc::new(CountFlushPolicy::new(3))]);
		let mut signals = fixture.upload_channel.take_receiver().unwrap();

		for name in ["a", "b", "c"] {
			fixture.writer.put(event_for("anon-1", name));
		}
		assert_eq!(signals.recv().await, Some(UPLOAD_SIGNAL));

		let batches = fixture.storage.read_batches().await;
		assert_eq!(batches.len(), 1);
		let value: serde_json::Value = serde_json::from_str(&batches[0].payload).unwrap();
		assert_eq!(value["batch"].as_array().unwrap().len(), 3);

		// Counting restarts after the flush.
		for name in ["d", "e", "f"] {
			fixture.writer.put(event_for("anon-1", name));
		}
		assert_eq!(signals.recv().await, Some(UPLOAD_SIGNAL));
		assert_eq!(fixture.storage.read_batches().await.len(), 2);
		fixture.writer.stop().await;
	}

	#[tokio::test]
	async fn explicit_flush_seals_whatever_is_buffered() {
		let fixture = fixture(vec![Arc::new(CountFlushPolicy::new(100))]);
		let mut signals = fixture.upload_channel.take_receiver().unwrap();

		fixture.writer.put(event_for("anon-1", "a"));
		fixture.writer.flush();
		assert_eq!(signals.recv().await, Some(UPLOAD_SIGNAL));
		assert_eq!(fixture.storage.read_batches().await.len(), 1);
		fixture.writer.stop().await;
	}

	#[tokio::test]
	async fn anonymous_id_change_fences_the_open_batch() {
		let fixture = fixture(vec![Arc::new(CountFlushPolicy::new(100))]);
		fixture.writer.put(event_for("anon-1", "a"));
		fixture.writer.put(event_for("anon-1", "b"));
		fixture.writer.put(event_for("anon-2", "c"));
		fixture.writer.flush();
		fixture.writer.stop().await;

		let batches = fixture.storage.read_batches().await;
		assert_eq!(batches.len(), 2);
		let first: serde_json::Value = serde_json::from_str(&batches[0].payload).unwrap();
		let second: serde_json::Value = serde_json::from_str(&batches[1].payload).unwrap();
		assert_eq!(first["batch"].as_array().unwrap().len(), 2);
		assert!(first["batch"]
			.as_array()
			.unwrap()
			.iter()
			.all(|event| event["anonymousId"] == "anon-1"));
		assert_eq!(second["batch"][0]["anonymousId"], "anon-2");
	}

	#[tokio::test]
	async fn disabled_source_keeps_events_buffered() {
		let fixture = fixture(vec![Arc::new(CountFlushPolicy::new(1))]);
		fixture
			.source_config
			.dispatch(&beacon_analytics_core::DisableSourceConfigAction);

		fixture.writer.put(event_for("anon-1", "a"));
		fixture.writer.flush();
		fixture.writer.stop().await;

		// Nothing sealed, nothing signalled; the event is still staged.
		assert!(fixture.storage.read_batches().await.is_empty());
		let mut signals = fixture.upload_channel.take_receiver().unwrap();
		fixture.upload_channel.close();
		assert_eq!(signals.recv().await, None);
	}

	#[tokio::test]
	async fn stop_drains_enqueued_events_into_storage() {
		let fixture = fixture(vec![Arc::new(CountFlushPolicy::new(100))]);
		for index in 0..10 {
			fixture.writer.put(event_for("anon-1", &format!("event-{index}")));
		}
		fixture.writer.stop().await;
		fixture.writer.stop().await;

		fixture.storage.rollover().await;
		let batches = fixture.storage.read_batches().await;
		assert_eq!(batches.len(), 1);
		let value: serde_json::Value = serde_json::from_str(&batches[0].payload).unwrap();
		assert_eq!(value["batch"].as_array().unwrap().len(), 10);
	}
}
