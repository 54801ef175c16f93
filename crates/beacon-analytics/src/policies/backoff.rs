// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Exponential backoff with jitter for upload retries.
//!
//! Delays grow as `min_delay * base^attempt` plus a uniform random jitter
//! of up to one full delay. After the attempt cap the handler sleeps for a
//! long cool-off period and starts the progression over.

use std::time::Duration;

use beacon_analytics_core::constants::backoff;

/// Pure delay schedule; each call advances the attempt counter.
#[derive(Debug)]
pub struct ExponentialBackoff {
	min_delay_ms: u64,
	base: f64,
	attempt: u32,
}

impl ExponentialBackoff {
	pub fn new(min_delay_ms: u64, base: f64) -> Self {
		Self {
			min_delay_ms,
			base,
			attempt: 0,
		}
	}

	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	/// The delay for the current attempt, with jitter, advancing the counter.
	pub fn next_delay_ms(&mut self) -> u64 {
		let exponential = self.min_delay_ms as f64 * self.base.powi(self.attempt as i32);
		self.attempt += 1;
		let delay = exponential as u64;
		delay + fastrand::u64(0..=delay)
	}

	pub fn reset(&mut self) {
		self.attempt = 0;
	}
}

impl Default for ExponentialBackoff {
	fn default() -> Self {
		Self::new(backoff::MIN_DELAY_MS, backoff::BASE)
	}
}

/// Drives retry pacing for the uploader: exponential waits up to the
/// attempt cap, then one cool-off sleep before restarting the progression.
pub struct BackoffPolicyHandler {
	backoff: ExponentialBackoff,
	max_attempts: u32,
	cool_off: Duration,
}

impl BackoffPolicyHandler {
	pub fn new() -> Self {
		Self {
			backoff: ExponentialBackoff::default(),
			max_attempts: backoff::MAX_ATTEMPTS,
			cool_off: Duration::from_millis(backoff::COOL_OFF_MS),
		}
	}

	/// Sleeps for the next scheduled delay. Once the attempt cap is
	/// exceeded the progression resets and the sleep is the cool-off
	/// period instead.
	pub async fn wait_with_backoff(&mut self) {
		if self.backoff.attempt() >= self.max_attempts {
			tracing::debug!(
				cool_off_ms = self.cool_off.as_millis() as u64,
				"retry attempts exhausted, entering cool-off"
			);
			self.backoff.reset();
			tokio::time::sleep(self.cool_off).await;
			return;
		}
		let delay_ms = self.backoff.next_delay_ms();
		tracing::debug!(attempt = self.backoff.attempt(), delay_ms, "backing off before retry");
		tokio::time::sleep(Duration::from_millis(delay_ms)).await;
	}

	/// Clears the progression after a successful upload.
	pub fn reset(&mut self) {
		self.backoff.reset();
	}
}

impl Default for BackoffPolicyHandler {
	fn default() -> Self {
		Self::new()
	}
}
