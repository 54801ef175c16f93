// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The upload path: a single consumer task that ships sealed batches to
//! the collector.
//!
//! Batches upload oldest first, one at a time. Retryable failures retry
//! the same batch indefinitely with exponential backoff so ordering is
//! preserved; terminal rejections either discard the batch (400, 413) or
//! stop uploading altogether (401, 404). Just before each send the
//! sent-at placeholder embedded at seal time is replaced with the
//! current wall-clock time. `stop` interrupts a retry wait in progress;
//! batches not yet uploaded stay in storage for the next start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beacon_analytics_core::constants::SENT_AT_PLACEHOLDER;
use beacon_analytics_core::{DisableSourceConfigAction, SourceConfig, StateContainer};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::policies::BackoffPolicyHandler;
use crate::retry_headers::RetryHeadersProvider;
use crate::storage::{BatchItem, Storage};
use crate::transport::{BatchTransport, UploadError};

const ANONYMOUS_ID_HEADER: &str = "AnonymousId";

pub struct EventUploader {
	channel: Arc<Channel<&'static str>>,
	storage: Arc<dyn Storage>,
	transport: Arc<dyn BatchTransport>,
	retry_headers: Arc<RetryHeadersProvider>,
	source_config: Arc<StateContainer<SourceConfig>>,
	stopped: Arc<AtomicBool>,
	shutdown: Arc<AtomicBool>,
	shutdown_notify: Arc<Notify>,
	on_fatal: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
	task: Mutex<Option<JoinHandle<()>>>,
}

fn now_ms() -> u64 {
	chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// The anonymous id shared by every event in the payload; batches are
/// fenced by the writer, so the first event's id speaks for all of them.
fn batch_anonymous_id(payload: &str) -> Option<String> {
	let value: serde_json::Value = serde_json::from_str(payload).ok()?;
	value["batch"]
		.get(0)?
		.get("anonymousId")?
		.as_str()
		.map(str::to_string)
}

fn is_empty_batch(payload: &str) -> bool {
	match serde_json::from_str::<serde_json::Value>(payload) {
		Ok(value) => value["batch"].as_array().map_or(true, Vec::is_empty),
		Err(_) => true,
	}
}

impl EventUploader {
	pub fn new(
		channel: Arc<Channel<&'static str>>,
		storage: Arc<dyn Storage>,
		transport: Arc<dyn BatchTransport>,
		retry_headers: Arc<RetryHeadersProvider>,
		source_config: Arc<StateContainer<SourceConfig>>,
	) -> Self {
		Self {
			channel,
			storage,
			transport,
			retry_headers,
			source_config,
			stopped: Arc::new(AtomicBool::new(false)),
			shutdown: Arc::new(AtomicBool::new(false)),
			shutdown_notify: Arc::new(Notify::new()),
			on_fatal: Arc::new(Mutex::new(None)),
			task: Mutex::new(None),
		}
	}

	/// Registers a callback fired once when the collector rejects the
	/// write key, so the owning client can shut the pipeline down.
	pub fn set_on_fatal(&self, hook: impl FnOnce() + Send + 'static) {
		*self.on_fatal.lock().unwrap() = Some(Box::new(hook));
	}

	/// Spawns the consumer loop. Call once.
	pub fn start(&self) {
		let Some(mut receiver) = self.channel.take_receiver() else {
			tracing::warn!("event uploader already started");
			return;
		};
		let channel = Arc::clone(&self.channel);
		let storage = Arc::clone(&self.storage);
		let transport = Arc::clone(&self.transport);
		let source_config = Arc::clone(&self.source_config);
		let stopped = Arc::clone(&self.stopped);
		let shutdown = Arc::clone(&self.shutdown);
		let shutdown_notify = Arc::clone(&self.shutdown_notify);
		let on_fatal = Arc::clone(&self.on_fatal);
		let retry_headers = Arc::clone(&self.retry_headers);

		let task = tokio::spawn(async move {
			let mut backoff = BackoffPolicyHandler::new();
			while let Some(_signal) = receiver.recv().await {
				for batch in storage.read_batches().await {
					if shutdown.load(Ordering::SeqCst) {
						tracing::debug!("shutdown requested, remaining batches stay in storage");
						return;
					}
					let outcome = Self::upload_batch(
						&batch,
						storage.as_ref(),
						transport.as_ref(),
						&retry_headers,
						&mut backoff,
						&shutdown,
						&shutdown_notify,
					)
					.await;
					match outcome {
						BatchOutcome::Continue => {}
						BatchOutcome::ShutdownRequested => return,
						BatchOutcome::StopInvalidKey => {
							stopped.store(true, Ordering::SeqCst);
							channel.close();
							if let Some(hook) = on_fatal.lock().unwrap().take() {
								hook();
							}
							return;
						}
						BatchOutcome::StopSourceDisabled => {
							stopped.store(true, Ordering::SeqCst);
							channel.close();
							source_config.dispatch(&DisableSourceConfigAction);
							return;
						}
					}
				}
			}
		});
		*self.task.lock().unwrap() = Some(task);
	}

	#[allow(clippy::too_many_arguments)]
	async fn upload_batch(
		batch: &BatchItem,
		storage: &dyn Storage,
		transport: &dyn BatchTransport,
		retry_headers: &RetryHeadersProvider,
		backoff: &mut BackoffPolicyHandler,
		shutdown: &AtomicBool,
		shutdown_notify: &Notify,
	) -> BatchOutcome {
		if is_empty_batch(&batch.payload) {
			tracing::debug!(reference = %batch.reference.0, "discarding empty batch");
			storage.remove_batch(&batch.reference).await;
			return BatchOutcome::Continue;
		}
		let anonymous_id = batch_anonymous_id(&batch.payload);

		loop {
			let payload = batch
				.payload
				.replace(SENT_AT_PLACEHOLDER, &chrono::Utc::now().to_rfc3339());
			let mut headers = retry_headers.prepare(&batch.reference.0, now_ms());
			if let Some(id) = &anonymous_id {
				headers.push((ANONYMOUS_ID_HEADER.to_string(), id.clone()));
			}

			match transport.post_batch(&payload, &headers).await {
				Ok(_) => {
					tracing::debug!(reference = %batch.reference.0, "batch uploaded");
					backoff.reset();
					retry_headers.clear();
					storage.remove_batch(&batch.reference).await;
					return BatchOutcome::Continue;
				}
				Err(UploadError::Retryable(cause)) => {
					tracing::warn!(
						reference = %batch.reference.0,
						reason = %cause.retry_reason(),
						"batch upload failed, will retry"
					);
					retry_headers.record_failure(&batch.reference.0, &cause.retry_reason(), now_ms());
					tokio::select! {
						_ = backoff.wait_with_backoff() => {}
						_ = shutdown_notify.notified() => {}
					}
					if shutdown.load(Ordering::SeqCst) {
						tracing::debug!(reference = %batch.reference.0, "shutdown requested mid-retry, batch stays in storage");
						return BatchOutcome::ShutdownRequested;
					}
				}
				Err(err @ (UploadError::BadRequest | UploadError::PayloadTooLarge)) => {
					tracing::error!(reference = %batch.reference.0, error = %err, "discarding rejected batch");
					backoff.reset();
					retry_headers.clear();
					storage.remove_batch(&batch.reference).await;
					return BatchOutcome::Continue;
				}
				Err(err @ UploadError::InvalidWriteKey) => {
					tracing::error!(error = %err, "stopping uploads");
					return BatchOutcome::StopInvalidKey;
				}
				Err(err @ UploadError::SourceDisabled) => {
					tracing::error!(error = %err, "stopping uploads");
					return BatchOutcome::StopSourceDisabled;
				}
			}
		}
	}

	/// True once a fatal collector response has stopped uploads for good.
	pub fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}

	/// Closes the intake and waits for the loop to finish. A retry wait in
	/// progress is interrupted; the batch stays in storage. Idempotent.
	pub async fn stop(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		self.shutdown_notify.notify_one();
		self.channel.close();
		let task = self.task.lock().unwrap().take();
		if let Some(task) = task {
			if let Err(err) = task.await {
				tracing::error!(error = %err, "event uploader task failed");
			}
		}
	}
}

enum BatchOutcome {
	Continue,
	ShutdownRequested,
	StopInvalidKey,
	StopSourceDisabled,
}
