// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Shared constants: persisted storage keys, flush/backoff defaults, and the
//! sent-at sentinel substituted at upload time.

/// Keys under which the SDK persists values in the key-value store.
pub mod storage_keys {
	pub const ANONYMOUS_ID: &str = "anonymous_id";
	pub const USER_ID: &str = "user_id";
	pub const TRAITS: &str = "traits";
	/// Anonymous id of the most recently written event, used to fence
	/// batches so one batch never mixes two anonymous ids.
	pub const LAST_EVENT_ANONYMOUS_ID: &str = "last_event_anonymous_id";
	pub const SESSION_ID: &str = "session_id";
	pub const IS_MANUAL_SESSION: &str = "is_manual_session";
	pub const IS_SESSION_START: &str = "is_session_start";
	pub const SESSION_LAST_ACTIVITY_TIME: &str = "session_last_activity_time";
	pub const SOURCE_CONFIG: &str = "source_config";
	pub const RETRY_METADATA: &str = "retry_metadata";
}

/// Literal placeholder written into every sealed batch in place of its send
/// timestamp; the uploader substitutes the real time immediately before
/// transmission.
pub const SENT_AT_PLACEHOLDER: &str = "{{_BEACON_SENT_AT_}}";

/// Signal value sent over the upload channel when a batch is ready.
pub const UPLOAD_SIGNAL: &str = "#!upload";

/// Count flush policy bounds. Out-of-range thresholds fall back to the
/// default.
pub mod flush_event_count {
	pub const DEFAULT: usize = 30;
	pub const MIN: usize = 1;
	pub const MAX: usize = 100;
}

/// Frequency flush policy bounds, in milliseconds.
pub mod flush_interval {
	pub const DEFAULT: u64 = 10_000;
	pub const MIN: u64 = 1_000;
}

/// Session defaults.
pub mod session {
	/// Sentinel meaning "no session".
	pub const DEFAULT_SESSION_ID: u64 = 0;
	/// Manual session ids must be at least this many digits.
	pub const MIN_SESSION_ID_LENGTH: usize = 10;
	/// Automatic session timeout, in milliseconds.
	pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 300_000;
}

/// Exponential backoff defaults.
pub mod backoff {
	pub const MIN_DELAY_MS: u64 = 3_000;
	pub const BASE: f64 = 2.0;
	pub const MAX_ATTEMPTS: u32 = 5;
	/// Cool-off applied after the attempt cap is reached, in milliseconds.
	pub const COOL_OFF_MS: u64 = 300_000;
}
