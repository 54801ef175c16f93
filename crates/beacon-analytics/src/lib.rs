// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Client-embedded analytics SDK.
//!
//! Capture calls (`track`, `screen`, `group`, `identify`, `alias`) are
//! buffered locally, sealed into batches by configurable flush policies,
//! and uploaded with ordered retries and exponential backoff. Identity
//! and session state persist across runs through a pluggable key-value
//! store; an in-memory implementation ships by default.
//!
//! ```no_run
//! use beacon_analytics::{AnalyticsClient, AnalyticsConfig};
//!
//! # async fn run() -> Result<(), beacon_analytics::AnalyticsError> {
//! let config = AnalyticsConfig::builder("write-key", "https://collector.example.com").build()?;
//! let client = AnalyticsClient::new(config)?;
//! client.track("Checkout Completed", Default::default());
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod plugin;
pub mod policies;
pub mod queue;
pub mod retry_headers;
pub mod session;
pub mod source_config_provider;
pub mod storage;
pub mod transport;
pub mod uploader;
pub mod writer;

pub use beacon_analytics_core::{
	Event, EventKind, KeyValueStore, Properties, ResetEntries, SessionInfo, SessionType,
	SourceConfig, StateAction, StateContainer, Traits, UserIdentity,
};

pub use client::AnalyticsClient;
pub use config::{AnalyticsConfig, ConfigBuilder};
pub use error::{AnalyticsError, ChannelError};
pub use plugin::{Plugin, PluginChain, PluginId, PluginType};
pub use policies::{
	BackoffPolicyHandler, CountFlushPolicy, FlushPolicy, FlushPolicyFacade, FrequencyFlushPolicy,
	StartupFlushPolicy,
};
pub use session::{MonotonicClock, SessionConfig, SessionHandler, SystemMonotonicClock};
pub use storage::{BatchItem, BatchReference, EventStore, MemoryStorage, Storage};
pub use transport::{BatchTransport, ConfigTransport, HttpTransport, RetryableCause, UploadError};
