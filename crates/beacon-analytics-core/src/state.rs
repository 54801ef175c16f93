// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Reactive state container driven by pure reducer actions.
//!
//! A [`StateContainer`] holds one value and updates it exclusively through
//! [`StateAction::reduce`]. Reducers are pure; persistence and any follow-up
//! signaling happen in the caller after `dispatch` returns. Subscribers are
//! kept in an explicit registry keyed by a [`SubscriptionId`] and must be
//! removed by their owner; new subscribers immediately receive the current
//! value.

use std::sync::{Arc, Mutex};

/// A pure transformation from the current state to a new state.
pub trait StateAction<T>: Send {
	fn reduce(&self, current: T) -> T;
}

/// Identifies one registered subscriber for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
	value: T,
	subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
	next_id: u64,
}

/// Holds a current value and publishes every reduced update to all
/// subscribers in dispatch order.
pub struct StateContainer<T> {
	registry: Mutex<Registry<T>>,
}

impl<T: Clone> StateContainer<T> {
	pub fn new(initial: T) -> Self {
		Self {
			registry: Mutex::new(Registry {
				value: initial,
				subscribers: Vec::new(),
				next_id: 0,
			}),
		}
	}

	/// Returns a clone of the current value.
	pub fn value(&self) -> T {
		self.registry.lock().expect("state lock poisoned").value.clone()
	}

	/// Computes `action.reduce(current)`, stores the result, and publishes it
	/// to every subscriber in registration order.
	pub fn dispatch(&self, action: &dyn StateAction<T>) {
		let (value, subscribers) = {
			let mut registry = self.registry.lock().expect("state lock poisoned");
			let new_value = action.reduce(registry.value.clone());
			registry.value = new_value.clone();
			let subscribers: Vec<Subscriber<T>> = registry
				.subscribers
				.iter()
				.map(|(_, subscriber)| Arc::clone(subscriber))
				.collect();
			(new_value, subscribers)
		};

		// Subscribers run outside the lock so they may dispatch further
		// actions without deadlocking.
		for subscriber in subscribers {
			subscriber(&value);
		}
	}

	/// Registers a subscriber and immediately replays the current value to it.
	pub fn subscribe(&self, subscriber: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
		let subscriber: Subscriber<T> = Arc::new(subscriber);
		let (id, value) = {
			let mut registry = self.registry.lock().expect("state lock poisoned");
			let id = SubscriptionId(registry.next_id);
			registry.next_id += 1;
			registry.subscribers.push((id, Arc::clone(&subscriber)));
			(id, registry.value.clone())
		};
		subscriber(&value);
		id
	}

	/// Removes a subscriber. Unknown ids are ignored.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		let mut registry = self.registry.lock().expect("state lock poisoned");
		registry.subscribers.retain(|(existing, _)| *existing != id);
	}
}
