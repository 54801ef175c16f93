// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Key-value storage contract.
//!
//! The physical engine lives outside this workspace; the SDK only depends on
//! this read/write/remove surface. Values are stored as strings; callers
//! serialize richer types with serde.

pub trait KeyValueStore: Send + Sync {
	/// Stores a value for a key, replacing any previous value.
	fn write(&self, key: &str, value: &str);

	/// Retrieves the value for a key, or `None` if absent.
	fn read(&self, key: &str) -> Option<String>;

	/// Removes the value for a key. Unknown keys are ignored.
	fn remove(&self, key: &str);
}
