// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! The public client: capture calls, identity lifecycle, and shutdown.
//!
//! Capture calls snapshot the identity and session synchronously, then
//! hand the event to the plugin chain, whose terminal stage feeds the
//! queue. Until the source config is resolved events wait in a bounded
//! staging channel; once resolved they replay through the chain in
//! arrival order. Every public method is non-blocking except the async
//! `shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_analytics_core::{
	Event, KeyValueStore, Properties, ResetEntries, ResetUserIdentityAction,
	SetUserIdAndTraitsAction, SetUserIdAction, SourceConfig, StateContainer, Traits, UserIdentity,
};
use beacon_analytics_core::constants::storage_keys;

use crate::channel::{Channel, SendError};
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::plugin::{Plugin, PluginChain, PluginId, PluginType};
use crate::policies::FlushPolicyFacade;
use crate::queue::EventQueue;
use crate::session::{SessionHandler, SessionStamp, SystemMonotonicClock};
use crate::source_config_provider::SourceConfigProvider;
use crate::storage::MemoryStorage;
use crate::transport::HttpTransport;

/// Events held while the source config fetch is in flight. Beyond this
/// the newest events are dropped.
const STAGING_CAPACITY: usize = 1_000;

/// Work held back until the source config resolves. Keeping flush
/// requests on the same channel as events preserves submission order
/// through the replay.
enum StagedCall {
	Event(Event),
	Flush,
}

/// Stamps the current session onto events passing through the chain.
struct SessionTrackingPlugin {
	session: Arc<SessionHandler>,
}

impl Plugin for SessionTrackingPlugin {
	fn plugin_type(&self) -> PluginType {
		PluginType::OnProcess
	}

	fn intercept(&self, mut event: Event) -> Option<Event> {
		if let Some(SessionStamp {
			session_id,
			session_start,
		}) = self.session.stamp_for_event()
		{
			event
				.context
				.insert("sessionId".to_string(), serde_json::json!(session_id));
			if session_start {
				event
					.context
					.insert("sessionStart".to_string(), serde_json::json!(true));
			}
		}
		Some(event)
	}
}

/// Terminal stage: hands finished events to the queue.
struct DataPipelinePlugin {
	queue: Arc<EventQueue>,
}

impl Plugin for DataPipelinePlugin {
	fn plugin_type(&self) -> PluginType {
		PluginType::Terminal
	}

	fn intercept(&self, event: Event) -> Option<Event> {
		self.queue.put(event);
		None
	}
}

struct Inner {
	storage: Arc<MemoryStorage>,
	identity: StateContainer<UserIdentity>,
	session: Arc<SessionHandler>,
	queue: Arc<EventQueue>,
	chain: PluginChain,
	staging: Channel<StagedCall>,
	ready: AtomicBool,
	opt_out: Arc<AtomicBool>,
	closed: Arc<AtomicBool>,
}

/// Handle to one analytics pipeline. Cheap to clone; all clones share
/// the same state and queue.
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<Inner>,
}

impl AnalyticsClient {
	/// Builds and starts the pipeline. Must be called within a tokio
	/// runtime; consumer tasks and the config fetch spawn immediately.
	pub fn new(config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
		let storage = Arc::new(MemoryStorage::new());

		let restored = UserIdentity::initialize(storage.as_ref());
		restored.store_anonymous_id(storage.as_ref());
		let identity = StateContainer::new(restored);

		let session = Arc::new(SessionHandler::new(
			Arc::clone(&storage) as Arc<dyn KeyValueStore>,
			config.session,
			Arc::new(SystemMonotonicClock::new()),
		));

		let source_config = Arc::new(StateContainer::new(SourceConfig::initial()));
		let transport = Arc::new(HttpTransport::new(
			config.write_key.clone(),
			config.data_plane_url.clone(),
			config.control_plane_url.clone(),
		));

		let queue = Arc::new(EventQueue::new(
			Arc::clone(&storage),
			Arc::clone(&transport) as _,
			Arc::new(FlushPolicyFacade::new(config.flush_policies)),
			Arc::clone(&source_config),
		));
		queue.start();

		let closed = Arc::new(AtomicBool::new(false));
		let fatal_flag = Arc::clone(&closed);
		let fatal_queue = Arc::clone(&queue);
		queue.set_on_fatal(move || {
			tracing::error!("write key rejected, shutting the pipeline down");
			fatal_flag.store(true, Ordering::SeqCst);
			tokio::spawn(async move {
				fatal_queue.stop().await;
			});
		});

		let opt_out = Arc::new(AtomicBool::new(config.opt_out));
		let chain = PluginChain::new(Arc::clone(&opt_out));

		let client = Self {
			inner: Arc::new(Inner {
				storage,
				identity,
				session: Arc::clone(&session),
				queue: Arc::clone(&queue),
				chain,
				staging: Channel::bounded(STAGING_CAPACITY),
				ready: AtomicBool::new(false),
				opt_out,
				closed,
			}),
		};
		client.add_plugin(Arc::new(SessionTrackingPlugin { session }));
		client.add_plugin(Arc::new(DataPipelinePlugin { queue }));

		let startup = client.clone();
		tokio::spawn(async move {
			let provider = SourceConfigProvider::new(
				transport as _,
				Arc::clone(&startup.inner.storage) as Arc<dyn KeyValueStore>,
				source_config,
			);
			provider.refresh().await;
			startup.release_staged_events().await;
		});

		Ok(client)
	}

	/// Flips to ready and replays everything staged, in arrival order.
	async fn release_staged_events(&self) {
		self.inner.ready.store(true, Ordering::SeqCst);
		self.inner.staging.close();
		let Some(mut receiver) = self.inner.staging.take_receiver() else {
			return;
		};
		while let Some(call) = receiver.recv().await {
			self.deliver(call);
		}
		tracing::debug!("staged events released");
	}

	fn deliver(&self, call: StagedCall) {
		match call {
			StagedCall::Event(event) => {
				self.inner.chain.process(event);
			}
			StagedCall::Flush => self.inner.queue.flush(),
		}
	}

	fn submit(&self, call: StagedCall) {
		if self.inner.ready.load(Ordering::SeqCst) {
			self.deliver(call);
			return;
		}
		match self.inner.staging.send(call) {
			Ok(()) => {}
			Err(SendError::Full(call)) => match call {
				StagedCall::Event(event) => {
					tracing::warn!(event_type = event.event_type(), "staging buffer full, dropping event");
				}
				StagedCall::Flush => {
					tracing::warn!("staging buffer full, dropping flush request");
				}
			},
			// Staging closed between the ready check and the send, which
			// means the config just resolved: go direct.
			Err(SendError::Closed(call)) => self.deliver(call),
		}
	}

	fn capture(&self, event: Event) {
		if self.inner.closed.load(Ordering::SeqCst) {
			tracing::warn!(event_type = event.event_type(), "dropping event, client is shut down");
			return;
		}
		self.submit(StagedCall::Event(event));
	}

	fn identity(&self) -> UserIdentity {
		self.inner.identity.value()
	}

	/// Records a named action with optional structured properties.
	pub fn track(&self, event: impl Into<String>, properties: Properties) {
		let identity = self.identity();
		self.capture(Event::track(event, properties, &identity));
	}

	/// Records a screen or page view.
	pub fn screen(
		&self,
		name: impl Into<String>,
		category: Option<String>,
		properties: Properties,
	) {
		let identity = self.identity();
		self.capture(Event::screen(name, category, properties, &identity));
	}

	/// Associates the user with a group.
	pub fn group(&self, group_id: impl Into<String>, traits: Traits) {
		let identity = self.identity();
		self.capture(Event::group(group_id, traits, &identity));
	}

	/// Sets the known user id and traits, then records an identify event
	/// carrying the updated identity.
	pub fn identify(&self, user_id: impl Into<String>, traits: Traits) {
		self.inner.identity.dispatch(&SetUserIdAndTraitsAction {
			user_id: user_id.into(),
			traits,
		});
		let identity = self.identity();
		identity.store_user_id_and_traits(self.inner.storage.as_ref());
		self.capture(Event::identify(&identity));
	}

	/// Links a new user id to a previous identity. With no explicit
	/// previous id the current user id is used, falling back to the
	/// anonymous id.
	pub fn alias(&self, new_id: impl Into<String>, previous_id: Option<String>) {
		let previous = self
			.identity()
			.resolve_preferred_previous_id(previous_id.as_deref().unwrap_or(""));
		self.inner.identity.dispatch(&SetUserIdAction {
			user_id: new_id.into(),
		});
		let identity = self.identity();
		identity.store_user_id(self.inner.storage.as_ref());
		self.capture(Event::alias(previous, &identity));
	}

	/// Registers a custom plugin. Setup runs immediately with this client,
	/// then events start flowing through the plugin.
	pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> PluginId {
		plugin.setup(self);
		self.inner.chain.add(plugin)
	}

	/// Removes a previously added plugin and runs its teardown.
	pub fn remove_plugin(&self, id: PluginId) {
		self.inner.chain.remove(id);
	}

	/// Requests an upload of whatever is buffered, regardless of policy.
	/// Ordered after every capture call already submitted, including any
	/// still staged behind the source config fetch.
	pub fn flush(&self) {
		if self.inner.closed.load(Ordering::SeqCst) {
			return;
		}
		self.submit(StagedCall::Flush);
	}

	/// Clears the selected identity entries. A cleared anonymous id is
	/// regenerated; a selected session entry starts a fresh session.
	pub fn reset(&self, entries: ResetEntries) {
		self.inner.identity.dispatch(&ResetUserIdentityAction { entries });
		let identity = self.identity();
		let store = self.inner.storage.as_ref();
		if entries.anonymous_id {
			identity.store_anonymous_id(store);
		}
		if entries.user_id {
			KeyValueStore::remove(store, storage_keys::USER_ID);
		}
		if entries.traits {
			KeyValueStore::remove(store, storage_keys::TRAITS);
		}
		if entries.session {
			self.inner.session.refresh_session();
		}
	}

	/// Starts a manual session with the given id. Invalid ids are
	/// ignored with a warning.
	pub fn start_session(&self, session_id: u64) {
		self.inner.session.start_session(session_id);
	}

	/// Starts a manual session with a generated id.
	pub fn start_new_session(&self) {
		self.inner.session.start_generated_session();
	}

	pub fn end_session(&self) {
		self.inner.session.end_session();
	}

	/// Forwarded by the host when the app leaves the foreground.
	pub fn on_background(&self) {
		self.inner.session.on_background();
	}

	/// Forwarded by the host when the app returns to the foreground.
	pub fn on_foreground(&self) {
		self.inner.session.on_foreground();
	}

	/// Toggles opt-out. While opted out, capture calls are dropped before
	/// the plugin chain.
	pub fn set_opt_out(&self, opt_out: bool) {
		self.inner.opt_out.store(opt_out, Ordering::SeqCst);
	}

	pub fn anonymous_id(&self) -> String {
		self.identity().anonymous_id
	}

	pub fn user_id(&self) -> Option<String> {
		let user_id = self.identity().user_id;
		(!user_id.is_empty()).then_some(user_id)
	}

	pub fn traits(&self) -> Traits {
		self.identity().traits
	}

	/// The current session id, if a session is active.
	pub fn session_id(&self) -> Option<u64> {
		let current = self.inner.session.current();
		(current.id != beacon_analytics_core::constants::session::DEFAULT_SESSION_ID)
			.then_some(current.id)
	}

	/// Drains and stops the pipeline. Idempotent; capture calls after
	/// shutdown are dropped.
	pub async fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.staging.close();
		self.inner.queue.stop().await;
		self.inner.chain.teardown_all();
		tracing::info!("analytics client shut down");
	}
}
