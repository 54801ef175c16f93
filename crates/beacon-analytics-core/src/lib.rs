// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! Shared data model and state machinery for the Beacon analytics SDK.
//!
//! This crate holds everything that is pure data or pure computation: the
//! event variants and their wire serialization, the user identity and
//! session records with their reducer actions, the remote source config,
//! retry metadata, and the generic reducer-driven [`state::StateContainer`].
//! The async runtime pieces live in the `beacon-analytics` crate.

pub mod constants;
pub mod event;
pub mod identity;
pub mod kv;
pub mod retry;
pub mod session;
pub mod source_config;
pub mod state;

pub use event::{Event, EventKind, Properties};
pub use identity::{
	ResetEntries, ResetUserIdentityAction, SetAnonymousIdAction, SetUserIdAction,
	SetUserIdAndTraitsAction, Traits, UserIdentity,
};
pub use kv::KeyValueStore;
pub use retry::RetryMetadata;
pub use session::{
	EndSessionAction, SessionInfo, SessionType, UpdateIsSessionStartAction, UpdateSessionIdAction,
	UpdateSessionLastActivityAction, UpdateSessionTypeAction,
};
pub use source_config::{DisableSourceConfigAction, SourceConfig, UpdateSourceConfigAction};
pub use state::{StateAction, StateContainer, SubscriptionId};
