// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Fetches the source configuration at startup and keeps a cached copy.
//!
//! A successful fetch is persisted and dispatched into the shared state;
//! on failure the last persisted copy is used, and with no copy at all
//! the pipeline keeps running on the permissive initial state.

use std::sync::Arc;

use beacon_analytics_core::constants::storage_keys;
use beacon_analytics_core::{KeyValueStore, SourceConfig, StateContainer, UpdateSourceConfigAction};

use crate::transport::ConfigTransport;

pub struct SourceConfigProvider {
	transport: Arc<dyn ConfigTransport>,
	store: Arc<dyn KeyValueStore>,
	state: Arc<StateContainer<SourceConfig>>,
}

impl SourceConfigProvider {
	pub fn new(
		transport: Arc<dyn ConfigTransport>,
		store: Arc<dyn KeyValueStore>,
		state: Arc<StateContainer<SourceConfig>>,
	) -> Self {
		Self {
			transport,
			store,
			state,
		}
	}

	/// Fetches, caches, and applies the source configuration, falling back
	/// to the cached copy when the control plane is unreachable.
	pub async fn refresh(&self) {
		match self.fetch().await {
			Some(config) => {
				self.state.dispatch(&UpdateSourceConfigAction { config });
			}
			None => self.apply_cached(),
		}
	}

	async fn fetch(&self) -> Option<SourceConfig> {
		let body = match self.transport.fetch_source_config().await {
			Ok(body) => body,
			Err(err) => {
				tracing::warn!(error = %err, "source config fetch failed");
				return None;
			}
		};
		match serde_json::from_str::<SourceConfig>(&body) {
			Ok(config) => {
				self.store.write(storage_keys::SOURCE_CONFIG, &body);
				tracing::debug!(source_id = %config.source.id, "source config updated");
				Some(config)
			}
			Err(err) => {
				tracing::warn!(error = %err, "source config response is malformed");
				None
			}
		}
	}

	fn apply_cached(&self) {
		let cached = self
			.store
			.read(storage_keys::SOURCE_CONFIG)
			.and_then(|json| serde_json::from_str::<SourceConfig>(&json).ok());
		match cached {
			Some(config) => {
				tracing::debug!("using cached source config");
				self.state.dispatch(&UpdateSourceConfigAction { config });
			}
			None => {
				tracing::debug!("no cached source config, keeping initial state");
			}
		}
	}
}
