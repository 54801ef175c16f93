// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors surfaced by the non-blocking channel send path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
	/// The channel was closed; the item was not enqueued.
	#[error("channel is closed")]
	Closed,
	/// A bounded channel is at capacity; the newest item was dropped.
	#[error("channel is full")]
	Full,
}

/// Top-level errors returned by the client API.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	#[error("invalid configuration: {0}")]
	Config(String),
	#[error("client is shut down")]
	Shutdown,
	#[error("event serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error(transparent)]
	Channel(#[from] ChannelError),
}
