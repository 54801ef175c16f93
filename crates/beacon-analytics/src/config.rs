// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Client configuration and its builder.

use std::sync::Arc;

use crate::error::AnalyticsError;
use crate::policies::{CountFlushPolicy, FlushPolicy, FrequencyFlushPolicy, StartupFlushPolicy};
use crate::session::SessionConfig;

/// Immutable configuration for one [`AnalyticsClient`](crate::AnalyticsClient).
pub struct AnalyticsConfig {
	pub write_key: String,
	pub data_plane_url: String,
	pub control_plane_url: String,
	pub flush_policies: Vec<Arc<dyn FlushPolicy>>,
	pub session: SessionConfig,
	/// When true the client starts opted out: events are dropped before
	/// the plugin chain until opted back in.
	pub opt_out: bool,
}

impl AnalyticsConfig {
	pub fn builder(
		write_key: impl Into<String>,
		data_plane_url: impl Into<String>,
	) -> ConfigBuilder {
		ConfigBuilder::new(write_key, data_plane_url)
	}
}

/// The default policy set: leftovers flush at startup, then batches seal
/// by count or on the repeating timer, whichever fires first.
fn default_flush_policies() -> Vec<Arc<dyn FlushPolicy>> {
	vec![
		Arc::new(StartupFlushPolicy::new()),
		Arc::new(CountFlushPolicy::default()),
		Arc::new(FrequencyFlushPolicy::default()),
	]
}

pub struct ConfigBuilder {
	write_key: String,
	data_plane_url: String,
	control_plane_url: Option<String>,
	flush_policies: Option<Vec<Arc<dyn FlushPolicy>>>,
	session: SessionConfig,
	opt_out: bool,
}

impl ConfigBuilder {
	pub fn new(write_key: impl Into<String>, data_plane_url: impl Into<String>) -> Self {
		Self {
			write_key: write_key.into(),
			data_plane_url: data_plane_url.into(),
			control_plane_url: None,
			flush_policies: None,
			session: SessionConfig::default(),
			opt_out: false,
		}
	}

	pub fn control_plane_url(mut self, url: impl Into<String>) -> Self {
		self.control_plane_url = Some(url.into());
		self
	}

	/// Replaces the default policy set. An empty list disables automatic
	/// flushing entirely; only explicit `flush()` calls seal batches.
	pub fn flush_policies(mut self, policies: Vec<Arc<dyn FlushPolicy>>) -> Self {
		self.flush_policies = Some(policies);
		self
	}

	pub fn session(mut self, session: SessionConfig) -> Self {
		self.session = session;
		self
	}

	pub fn opt_out(mut self, opt_out: bool) -> Self {
		self.opt_out = opt_out;
		self
	}

	pub fn build(self) -> Result<AnalyticsConfig, AnalyticsError> {
		if self.write_key.trim().is_empty() {
			return Err(AnalyticsError::Config("write key must not be empty".to_string()));
		}
		if self.data_plane_url.trim().is_empty() {
			return Err(AnalyticsError::Config(
				"data plane URL must not be empty".to_string(),
			));
		}
		let control_plane_url = self
			.control_plane_url
			.unwrap_or_else(|| self.data_plane_url.clone());
		Ok(AnalyticsConfig {
			write_key: self.write_key,
			data_plane_url: self.data_plane_url,
			control_plane_url,
			flush_policies: self.flush_policies.unwrap_or_else(default_flush_policies),
			session: self.session,
			opt_out: self.opt_out,
		})
	}
}
