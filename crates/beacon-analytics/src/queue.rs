// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Wires the write and upload paths together.
//!
//! The queue owns the writer, the uploader, the channel between them,
//! and the flush schedule. Shutdown stops in order: timers first, then
//! the uploader so nothing sealed from here on leaves the device, then
//! the writer persists whatever producers already submitted. Batches
//! sealed during that final drain stay in storage for the next start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_analytics_core::{Event, KeyValueStore, SourceConfig, StateContainer};

use crate::channel::Channel;
use crate::policies::FlushPolicyFacade;
use crate::retry_headers::RetryHeadersProvider;
use crate::storage::Storage;
use crate::transport::BatchTransport;
use crate::uploader::EventUploader;
use crate::writer::EventWriter;

pub struct EventQueue {
	writer: Arc<EventWriter>,
	uploader: EventUploader,
	policies: Arc<FlushPolicyFacade>,
	stopped: AtomicBool,
}

impl EventQueue {
	pub fn new<S: Storage + 'static>(
		storage: Arc<S>,
		transport: Arc<dyn BatchTransport>,
		policies: Arc<FlushPolicyFacade>,
		source_config: Arc<StateContainer<SourceConfig>>,
	) -> Self {
		let upload_channel = Arc::new(Channel::unbounded());
		let writer = Arc::new(EventWriter::new(
			Arc::clone(&storage) as Arc<dyn Storage>,
			Arc::clone(&policies),
			Arc::clone(&source_config),
			Arc::clone(&upload_channel),
		));
		let retry_headers = Arc::new(RetryHeadersProvider::new(
			Arc::clone(&storage) as Arc<dyn KeyValueStore>,
		));
		let uploader = EventUploader::new(
			upload_channel,
			storage as Arc<dyn Storage>,
			transport,
			retry_headers,
			source_config,
		);
		Self {
			writer,
			uploader,
			policies,
			stopped: AtomicBool::new(false),
		}
	}

	/// Starts both consumer loops and the timed flush schedule.
	pub fn start(&self) {
		self.writer.start();
		self.uploader.start();
		let writer = Arc::clone(&self.writer);
		self.policies.start_schedule(Arc::new(move || writer.flush()));
	}

	/// Registers a callback fired when the collector rejects the write key.
	pub fn set_on_fatal(&self, hook: impl FnOnce() + Send + 'static) {
		self.uploader.set_on_fatal(hook);
	}

	pub fn put(&self, event: Event) {
		self.writer.put(event);
	}

	pub fn flush(&self) {
		self.writer.flush();
	}

	/// True once a fatal collector response has stopped uploads for good.
	pub fn is_stopped(&self) -> bool {
		self.uploader.is_stopped()
	}

	/// Stops the pipeline: the uploader first, so batches sealed while the
	/// writer drains are kept for the next start rather than uploaded.
	/// Idempotent; later calls return immediately.
	pub async fn stop(&self) {
		if self.stopped.swap(true, Ordering::SeqCst) {
			return;
		}
		self.policies.cancel_schedule();
		self.uploader.stop().await;
		self.writer.stop().await;
		tracing::debug!("event queue stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policies::{CountFlushPolicy, FlushPolicy};
	use crate::storage::{EventStore, MemoryStorage};
	use crate::transport::UploadError;
	use async_trait::async_trait;
	use beacon_analytics_core::{Properties, UserIdentity};
	use std::sync::Mutex;

	#[derive(Default)]
	struct CountingTransport {
		payloads: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl BatchTransport for CountingTransport {
		async fn post_batch(
			&self,
			payload: &str,
			_extra_headers: &[(String, String)],
		) -> Result<String, UploadError> {
			self.payloads.lock().unwrap().push(payload.to_string());
			Ok("OK".to_string())
		}
	}

	fn track(name: &str) -> Event {
		let identity = UserIdentity {
			anonymous_id: "anon-1".to_string(),
			..Default::default()
		};
		Event::track(name, Properties::new(), &identity)
	}

	fn queue(policies: Vec<Arc<dyn FlushPolicy>>) -> (EventQueue, Arc<CountingTransport>) {
		let transport = Arc::new(CountingTransport::default());
		let queue = EventQueue::new(
			Arc::new(MemoryStorage::new()),
			Arc::clone(&transport) as Arc<dyn BatchTransport>,
			Arc::new(FlushPolicyFacade::new(policies)),
			Arc::new(StateContainer::new(SourceConfig::initial())),
		);
		queue.start();
		(queue, transport)
	}

	async fn wait_for_payloads(transport: &CountingTransport, count: usize) {
		for _ in 0..400 {
			if transport.payloads.lock().unwrap().len() >= count {
				return;
			}
			tokio::time::sleep(std::time::Duration::from_millis(25)).await;
		}
		panic!("timed out waiting for {count} payload(s)");
	}

	#[tokio::test]
	async fn count_threshold_drives_events_through_to_the_transport() {
		let (queue, transport) = queue(vec![Arc::new(CountFlushPolicy::new(3))]);
		for name in ["a", "b", "c"] {
			queue.put(track(name));
		}
		wait_for_payloads(&transport, 1).await;
		queue.stop().await;

		let payloads = transport.payloads.lock().unwrap();
		assert_eq!(payloads.len(), 1);
		let value: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
		assert_eq!(value["batch"].as_array().unwrap().len(), 3);
	}

	#[tokio::test]
	async fn explicit_flush_uploads_a_partial_batch() {
		let (queue, transport) = queue(vec![Arc::new(CountFlushPolicy::new(100))]);
		queue.put(track("a"));
		queue.flush();
		wait_for_payloads(&transport, 1).await;
		queue.stop().await;

		assert_eq!(transport.payloads.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn batches_sealed_during_shutdown_wait_for_the_next_start() {
		let storage = Arc::new(MemoryStorage::new());
		let transport = Arc::new(CountingTransport::default());
		let queue = EventQueue::new(
			Arc::clone(&storage),
			Arc::clone(&transport) as Arc<dyn BatchTransport>,
			Arc::new(FlushPolicyFacade::new(vec![Arc::new(CountFlushPolicy::new(3))])),
			Arc::new(StateContainer::new(SourceConfig::initial())),
		);
		queue.start();
		for name in ["a", "b", "c"] {
			queue.put(track(name));
		}
		// Stop before the writer runs: the batch it seals while draining
		// must not be uploaded on the way out.
		queue.stop().await;

		assert!(transport.payloads.lock().unwrap().is_empty());
		assert_eq!(storage.read_batches().await.len(), 1);
	}

	struct RejectingTransport;

	#[async_trait]
	impl BatchTransport for RejectingTransport {
		async fn post_batch(
			&self,
			_payload: &str,
			_extra_headers: &[(String, String)],
		) -> Result<String, UploadError> {
			Err(UploadError::InvalidWriteKey)
		}
	}

	#[tokio::test]
	async fn fatal_hook_can_stop_the_queue_from_inside_the_pipeline() {
		let storage = Arc::new(MemoryStorage::new());
		let queue = Arc::new(EventQueue::new(
			Arc::clone(&storage),
			Arc::new(RejectingTransport) as Arc<dyn BatchTransport>,
			Arc::new(FlushPolicyFacade::new(vec![Arc::new(CountFlushPolicy::new(1))])),
			Arc::new(StateContainer::new(SourceConfig::initial())),
		));
		// Same wiring as the client: the hook shuts the whole queue down.
		let hook_queue = Arc::clone(&queue);
		queue.set_on_fatal(move || {
			tokio::spawn(async move {
				hook_queue.stop().await;
			});
		});
		queue.start();
		queue.put(track("a"));

		for _ in 0..400 {
			if queue.is_stopped() {
				break;
			}
			tokio::time::sleep(std::time::Duration::from_millis(25)).await;
		}
		assert!(queue.is_stopped());
		// The rejected batch is retained, and a later explicit stop is a
		// no-op rather than a hang.
		queue.stop().await;
		assert_eq!(storage.read_batches().await.len(), 1);
	}

	#[tokio::test]
	async fn stop_is_idempotent_and_leaves_unflushed_events_staged() {
		let storage = Arc::new(MemoryStorage::new());
		let transport = Arc::new(CountingTransport::default());
		let queue = EventQueue::new(
			Arc::clone(&storage),
			Arc::clone(&transport) as Arc<dyn BatchTransport>,
			Arc::new(FlushPolicyFacade::new(vec![Arc::new(CountFlushPolicy::new(100))])),
			Arc::new(StateContainer::new(SourceConfig::initial())),
		);
		queue.start();
		queue.put(track("a"));
		queue.stop().await;
		queue.stop().await;

		assert!(transport.payloads.lock().unwrap().is_empty());
		storage.rollover().await;
		assert_eq!(storage.read_batches().await.len(), 1);
	}
}
