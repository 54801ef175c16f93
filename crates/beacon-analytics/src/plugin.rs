// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The plugin chain every captured event flows through.
//!
//! Plugins run in registration order within their stage: pre-process
//! first, then on-process, then the terminal stage that hands events to
//! the pipeline. A plugin returning `None` drops the event and halts the
//! chain. Utility plugins register for lifecycle hooks only and never see
//! events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use beacon_analytics_core::Event;

use crate::client::AnalyticsClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginType {
	/// Runs before enrichment, e.g. scrubbing.
	PreProcess,
	/// Runs after pre-process, e.g. session stamping.
	OnProcess,
	/// Final consumers; return values are ignored.
	Terminal,
	/// Lifecycle-only, never invoked with events.
	Utility,
}

/// Handle for removing a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginId(u64);

pub trait Plugin: Send + Sync {
	fn plugin_type(&self) -> PluginType;

	/// Called once when the plugin is registered, with a handle to the
	/// owning client.
	fn setup(&self, _analytics: &AnalyticsClient) {}

	/// Transforms or drops one event. The default passes it through.
	fn intercept(&self, event: Event) -> Option<Event> {
		Some(event)
	}

	/// Called once when the plugin is removed.
	fn teardown(&self) {}
}

struct Registered {
	id: PluginId,
	plugin: Arc<dyn Plugin>,
}

/// Ordered plugin registry with an opt-out gate in front.
pub struct PluginChain {
	plugins: RwLock<Vec<Registered>>,
	next_id: AtomicU64,
	opt_out: Arc<AtomicBool>,
}

impl PluginChain {
	pub fn new(opt_out: Arc<AtomicBool>) -> Self {
		Self {
			plugins: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(1),
			opt_out,
		}
	}

	/// Registers a plugin. Setup is the caller's job: the client runs it
	/// with its own handle before handing the plugin over.
	pub fn add(&self, plugin: Arc<dyn Plugin>) -> PluginId {
		let id = PluginId(self.next_id.fetch_add(1, Ordering::SeqCst));
		self.plugins.write().unwrap().push(Registered { id, plugin });
		id
	}

	pub fn remove(&self, id: PluginId) {
		let mut plugins = self.plugins.write().unwrap();
		if let Some(index) = plugins.iter().position(|entry| entry.id == id) {
			let entry = plugins.remove(index);
			entry.plugin.teardown();
		}
	}

	fn stage(&self, stage: PluginType) -> Vec<Arc<dyn Plugin>> {
		self.plugins
			.read()
			.unwrap()
			.iter()
			.filter(|entry| entry.plugin.plugin_type() == stage)
			.map(|entry| Arc::clone(&entry.plugin))
			.collect()
	}

	/// Runs one event through the chain. Returns the event as it left the
	/// on-process stage, or `None` when opted out or dropped by a plugin.
	pub fn process(&self, event: Event) -> Option<Event> {
		if self.opt_out.load(Ordering::SeqCst) {
			tracing::trace!(event_type = event.event_type(), "dropping event, opted out");
			return None;
		}

		let mut event = event;
		for stage in [PluginType::PreProcess, PluginType::OnProcess] {
			for plugin in self.stage(stage) {
				event = plugin.intercept(event)?;
			}
		}
		for plugin in self.stage(PluginType::Terminal) {
			plugin.intercept(event.clone());
		}
		Some(event)
	}

	/// Visits every registered plugin, utility plugins included.
	pub fn apply(&self, visit: &dyn Fn(&dyn Plugin)) {
		for entry in self.plugins.read().unwrap().iter() {
			visit(entry.plugin.as_ref());
		}
	}

	/// Calls teardown on everything and empties the registry.
	pub fn teardown_all(&self) {
		let drained: Vec<Registered> = self.plugins.write().unwrap().drain(..).collect();
		for entry in drained {
			entry.plugin.teardown();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use beacon_analytics_core::{Properties, UserIdentity};
	use std::sync::Mutex;

	fn event(name: &str) -> Event {
		Event::track(name, Properties::new(), &UserIdentity::default())
	}

	struct Recorder {
		stage: PluginType,
		label: &'static str,
		log: Arc<Mutex<Vec<&'static str>>>,
		drop_events: bool,
	}

	impl Plugin for Recorder {
		fn plugin_type(&self) -> PluginType {
			self.stage
		}

		fn intercept(&self, event: Event) -> Option<Event> {
			self.log.lock().unwrap().push(self.label);
			if self.drop_events {
				None
			} else {
				Some(event)
			}
		}
	}

	fn recorder(
		stage: PluginType,
		label: &'static str,
		log: &Arc<Mutex<Vec<&'static str>>>,
	) -> Arc<Recorder> {
		Arc::new(Recorder {
			stage,
			label,
			log: Arc::clone(log),
			drop_events: false,
		})
	}

	#[test]
	fn stages_run_in_order() {
		let chain = PluginChain::new(Arc::new(AtomicBool::new(false)));
		let log = Arc::new(Mutex::new(Vec::new()));
		chain.add(recorder(PluginType::Terminal, "terminal", &log));
		chain.add(recorder(PluginType::OnProcess, "on", &log));
		chain.add(recorder(PluginType::PreProcess, "pre", &log));

		assert!(chain.process(event("e")).is_some());
		assert_eq!(*log.lock().unwrap(), vec!["pre", "on", "terminal"]);
	}

	#[test]
	fn dropping_plugin_halts_the_chain() {
		let chain = PluginChain::new(Arc::new(AtomicBool::new(false)));
		let log = Arc::new(Mutex::new(Vec::new()));
		chain.add(Arc::new(Recorder {
			stage: PluginType::PreProcess,
			label: "dropper",
			log: Arc::clone(&log),
			drop_events: true,
		}));
		chain.add(recorder(PluginType::OnProcess, "on", &log));
		chain.add(recorder(PluginType::Terminal, "terminal", &log));

		assert!(chain.process(event("e")).is_none());
		assert_eq!(*log.lock().unwrap(), vec!["dropper"]);
	}

	#[test]
	fn utility_plugins_never_see_events() {
		let chain = PluginChain::new(Arc::new(AtomicBool::new(false)));
		let log = Arc::new(Mutex::new(Vec::new()));
		chain.add(recorder(PluginType::Utility, "utility", &log));

		assert!(chain.process(event("e")).is_some());
		assert!(log.lock().unwrap().is_empty());
	}

	#[test]
	fn opt_out_drops_everything_before_plugins_run() {
		let opt_out = Arc::new(AtomicBool::new(true));
		let chain = PluginChain::new(Arc::clone(&opt_out));
		let log = Arc::new(Mutex::new(Vec::new()));
		chain.add(recorder(PluginType::PreProcess, "pre", &log));

		assert!(chain.process(event("e")).is_none());
		assert!(log.lock().unwrap().is_empty());

		opt_out.store(false, Ordering::SeqCst);
		assert!(chain.process(event("e")).is_some());
	}

	#[test]
	fn removed_plugins_stop_running() {
		let chain = PluginChain::new(Arc::new(AtomicBool::new(false)));
		let log = Arc::new(Mutex::new(Vec::new()));
		let id = chain.add(recorder(PluginType::OnProcess, "on", &log));
		chain.remove(id);

		assert!(chain.process(event("e")).is_some());
		assert!(log.lock().unwrap().is_empty());
	}
}
