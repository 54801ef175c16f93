// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Flush policies deciding when buffered events become an upload batch.
//!
//! Policies are consulted after every write; any one of them voting to
//! flush triggers a batch. The frequency policy works differently: it
//! never votes, it schedules flushes on a timer of its own.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_analytics_core::constants::{flush_event_count, flush_interval};
use tokio::task::JoinHandle;

/// A single flush trigger. Implementations must be cheap to consult; the
/// write path calls [`FlushPolicy::should_flush`] for every event.
pub trait FlushPolicy: Send + Sync {
	fn should_flush(&self) -> bool;

	/// Called after a flush so stateful policies start over.
	fn reset(&self);

	/// Called once per event written.
	fn update_event_count(&self) {}

	/// Gives timer-driven policies a callback to trigger flushes with.
	fn start_schedule(&self, _flush: Arc<dyn Fn() + Send + Sync>) {}

	fn cancel_schedule(&self) {}
}

/// Votes to flush exactly once, so events left over from a previous run
/// go out as soon as the pipeline starts.
pub struct StartupFlushPolicy {
	done: AtomicBool,
}

impl StartupFlushPolicy {
	pub fn new() -> Self {
		Self {
			done: AtomicBool::new(false),
		}
	}
}

impl Default for StartupFlushPolicy {
	fn default() -> Self {
		Self::new()
	}
}

impl FlushPolicy for StartupFlushPolicy {
	fn should_flush(&self) -> bool {
		!self.done.load(Ordering::SeqCst)
	}

	fn reset(&self) {
		self.done.store(true, Ordering::SeqCst);
	}
}

/// Votes to flush once the number of buffered events reaches a threshold.
pub struct CountFlushPolicy {
	threshold: usize,
	count: AtomicUsize,
}

impl CountFlushPolicy {
	/// Thresholds outside the supported range fall back to the default.
	pub fn new(threshold: usize) -> Self {
		let threshold = if (flush_event_count::MIN..=flush_event_count::MAX).contains(&threshold) {
			threshold
		} else {
			tracing::warn!(
				requested = threshold,
				fallback = flush_event_count::DEFAULT,
				"flush event count out of range, using default"
			);
			flush_event_count::DEFAULT
		};
		Self {
			threshold,
			count: AtomicUsize::new(0),
		}
	}

	pub fn threshold(&self) -> usize {
		self.threshold
	}
}

impl Default for CountFlushPolicy {
	fn default() -> Self {
		Self::new(flush_event_count::DEFAULT)
	}
}

impl FlushPolicy for CountFlushPolicy {
	fn should_flush(&self) -> bool {
		self.count.load(Ordering::SeqCst) >= self.threshold
	}

	fn reset(&self) {
		self.count.store(0, Ordering::SeqCst);
	}

	fn update_event_count(&self) {
		self.count.fetch_add(1, Ordering::SeqCst);
	}
}

/// Triggers a flush on a repeating timer, independent of event volume.
pub struct FrequencyFlushPolicy {
	interval: Duration,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl FrequencyFlushPolicy {
	/// Intervals below the minimum fall back to the default.
	pub fn new(interval_ms: u64) -> Self {
		let interval_ms = if interval_ms >= flush_interval::MIN {
			interval_ms
		} else {
			tracing::warn!(
				requested = interval_ms,
				fallback = flush_interval::DEFAULT,
				"flush interval below minimum, using default"
			);
			flush_interval::DEFAULT
		};
		Self {
			interval: Duration::from_millis(interval_ms),
			task: Mutex::new(None),
		}
	}
}

impl Default for FrequencyFlushPolicy {
	fn default() -> Self {
		Self::new(flush_interval::DEFAULT)
	}
}

impl FlushPolicy for FrequencyFlushPolicy {
	fn should_flush(&self) -> bool {
		false
	}

	fn reset(&self) {}

	fn start_schedule(&self, flush: Arc<dyn Fn() + Send + Sync>) {
		let mut task = self.task.lock().unwrap();
		if task.is_some() {
			return;
		}
		let interval = self.interval;
		*task = Some(tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			// The first tick of a tokio interval completes immediately.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				flush();
			}
		}));
	}

	fn cancel_schedule(&self) {
		if let Some(task) = self.task.lock().unwrap().take() {
			task.abort();
		}
	}
}

impl Drop for FrequencyFlushPolicy {
	fn drop(&mut self) {
		self.cancel_schedule();
	}
}

/// Aggregates the configured policies behind a single interface. Any one
/// policy voting to flush flushes the batch.
pub struct FlushPolicyFacade {
	policies: Vec<Arc<dyn FlushPolicy>>,
}

impl FlushPolicyFacade {
	pub fn new(policies: Vec<Arc<dyn FlushPolicy>>) -> Self {
		Self { policies }
	}

	pub fn should_flush(&self) -> bool {
		self.policies.iter().any(|policy| policy.should_flush())
	}

	pub fn update_event_count(&self) {
		for policy in &self.policies {
			policy.update_event_count();
		}
	}

	pub fn reset(&self) {
		for policy in &self.policies {
			policy.reset();
		}
	}

	pub fn start_schedule(&self, flush: Arc<dyn Fn() + Send + Sync>) {
		for policy in &self.policies {
			policy.start_schedule(Arc::clone(&flush));
		}
	}

	pub fn cancel_schedule(&self) {
		for policy in &self.policies {
			policy.cancel_schedule();
		}
	}
}
