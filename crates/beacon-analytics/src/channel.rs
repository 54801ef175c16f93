// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Single-consumer channels backing the event pipeline.
//!
//! Producers send synchronously and never block: an unbounded channel
//! accepts every item, a bounded channel rejects the newest item when at
//! capacity. Closing the channel is idempotent; the consumer still drains
//! whatever was buffered before observing the closure, at which point an
//! optional termination callback fires exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::ChannelError;

type TerminationHook = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

/// A failed send, carrying the item back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum SendError<T> {
	Closed(T),
	Full(T),
}

impl<T> SendError<T> {
	pub fn into_inner(self) -> T {
		match self {
			Self::Closed(item) | Self::Full(item) => item,
		}
	}

	pub fn reason(&self) -> ChannelError {
		match self {
			Self::Closed(_) => ChannelError::Closed,
			Self::Full(_) => ChannelError::Full,
		}
	}
}

enum Tx<T> {
	Unbounded(mpsc::UnboundedSender<T>),
	Bounded(mpsc::Sender<T>),
}

enum Rx<T> {
	Unbounded(mpsc::UnboundedReceiver<T>),
	Bounded(mpsc::Receiver<T>),
}

/// Producer handle plus the one-shot receiver slot.
pub struct Channel<T> {
	tx: Mutex<Option<Tx<T>>>,
	rx: Mutex<Option<Rx<T>>>,
	closed: AtomicBool,
	on_terminate: TerminationHook,
}

impl<T> Channel<T> {
	pub fn unbounded() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self::new(Tx::Unbounded(tx), Rx::Unbounded(rx))
	}

	pub fn bounded(capacity: usize) -> Self {
		let (tx, rx) = mpsc::channel(capacity);
		Self::new(Tx::Bounded(tx), Rx::Bounded(rx))
	}

	fn new(tx: Tx<T>, rx: Rx<T>) -> Self {
		Self {
			tx: Mutex::new(Some(tx)),
			rx: Mutex::new(Some(rx)),
			closed: AtomicBool::new(false),
			on_terminate: Arc::new(Mutex::new(None)),
		}
	}

	/// Enqueues an item without blocking. A full bounded channel rejects
	/// the item being sent, never items already buffered; the rejected
	/// item comes back in the error.
	pub fn send(&self, item: T) -> Result<(), SendError<T>> {
		let guard = self.tx.lock().unwrap();
		let Some(tx) = guard.as_ref() else {
			return Err(SendError::Closed(item));
		};
		match tx {
			Tx::Unbounded(tx) => tx.send(item).map_err(|err| SendError::Closed(err.0)),
			Tx::Bounded(tx) => tx.try_send(item).map_err(|err| match err {
				mpsc::error::TrySendError::Full(item) => SendError::Full(item),
				mpsc::error::TrySendError::Closed(item) => SendError::Closed(item),
			}),
		}
	}

	/// Takes the consumer side. Returns `None` after the first call.
	pub fn take_receiver(&self) -> Option<ChannelReceiver<T>> {
		self.rx.lock().unwrap().take().map(|rx| ChannelReceiver {
			rx,
			on_terminate: Arc::clone(&self.on_terminate),
		})
	}

	/// Registers a callback invoked once when the consumer has drained the
	/// channel after closure.
	pub fn set_on_terminate(&self, hook: impl FnOnce() + Send + 'static) {
		*self.on_terminate.lock().unwrap() = Some(Box::new(hook));
	}

	/// Closes the producer side. Buffered items remain receivable. Calling
	/// this more than once is a no-op.
	pub fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.tx.lock().unwrap().take();
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

/// Consumer half returned by [`Channel::take_receiver`].
pub struct ChannelReceiver<T> {
	rx: Rx<T>,
	on_terminate: TerminationHook,
}

impl<T> ChannelReceiver<T> {
	/// Receives the next item, or `None` once the channel is closed and
	/// drained. The termination hook fires on the first `None`.
	pub async fn recv(&mut self) -> Option<T> {
		let item = match &mut self.rx {
			Rx::Unbounded(rx) => rx.recv().await,
			Rx::Bounded(rx) => rx.recv().await,
		};
		if item.is_none() {
			if let Some(hook) = self.on_terminate.lock().unwrap().take() {
				hook();
			}
		}
		item
	}
}
