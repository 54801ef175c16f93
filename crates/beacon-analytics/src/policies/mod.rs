// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

pub mod backoff;
pub mod flush;

pub use backoff::{BackoffPolicyHandler, ExponentialBackoff};
pub use flush::{
	CountFlushPolicy, FlushPolicy, FlushPolicyFacade, FrequencyFlushPolicy, StartupFlushPolicy,
};
