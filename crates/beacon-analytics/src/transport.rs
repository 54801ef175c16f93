// Copyright (c) 2026 Beacon Analytics contributors.
// SPDX-License-Identifier: MIT

//! HTTP transport to the data and control planes.
//!
//! Upload failures are classified into retryable and non-retryable
//! variants; the uploader's whole retry policy hangs off that split, so
//! the mapping from status codes lives here and nowhere else.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Why a retryable upload failed; feeds the retry-reason header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableCause {
	/// A 5xx or other unexpected status from the collector.
	Server(u16),
	Timeout,
	Network,
	Unknown,
}

impl RetryableCause {
	/// Wire form of the cause, reported back to the collector on retry.
	pub fn retry_reason(&self) -> String {
		match self {
			Self::Server(code) => format!("server-{code}"),
			Self::Timeout => "client-timeout".to_string(),
			Self::Network => "client-network".to_string(),
			Self::Unknown => "client-unknown".to_string(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadError {
	/// 400: the payload is malformed and will never be accepted.
	#[error("collector rejected the payload as malformed")]
	BadRequest,
	/// 401: the write key is invalid; uploading must stop.
	#[error("collector rejected the write key")]
	InvalidWriteKey,
	/// 404: the source is disabled upstream; uploading must stop.
	#[error("source is disabled upstream")]
	SourceDisabled,
	/// 413: the batch exceeds the collector's size limit.
	#[error("batch exceeds the collector size limit")]
	PayloadTooLarge,
	/// Transient failure; the same batch is retried with backoff.
	#[error("retryable upload failure ({})", .0.retry_reason())]
	Retryable(RetryableCause),
}

impl UploadError {
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Retryable(_))
	}

	fn from_status(status: StatusCode) -> Self {
		match status.as_u16() {
			400 => Self::BadRequest,
			401 => Self::InvalidWriteKey,
			404 => Self::SourceDisabled,
			413 => Self::PayloadTooLarge,
			code => Self::Retryable(RetryableCause::Server(code)),
		}
	}

	fn from_reqwest(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			Self::Retryable(RetryableCause::Timeout)
		} else if err.is_connect() || err.is_request() {
			Self::Retryable(RetryableCause::Network)
		} else {
			Self::Retryable(RetryableCause::Unknown)
		}
	}
}

/// Posts sealed batches to the data plane.
#[async_trait]
pub trait BatchTransport: Send + Sync {
	/// Sends one batch payload. `extra_headers` carries per-batch headers
	/// such as the anonymous id and retry metadata.
	async fn post_batch(
		&self,
		payload: &str,
		extra_headers: &[(String, String)],
	) -> Result<String, UploadError>;
}

/// Fetches the source configuration from the control plane.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
	async fn fetch_source_config(&self) -> Result<String, UploadError>;
}

/// Production transport over reqwest. The write key authenticates as the
/// basic-auth username with an empty password.
pub struct HttpTransport {
	client: reqwest::Client,
	write_key: String,
	data_plane_url: String,
	control_plane_url: String,
}

impl HttpTransport {
	pub fn new(
		write_key: impl Into<String>,
		data_plane_url: impl Into<String>,
		control_plane_url: impl Into<String>,
	) -> Self {
		Self {
			client: reqwest::Client::new(),
			write_key: write_key.into(),
			data_plane_url: trim_trailing_slash(data_plane_url.into()),
			control_plane_url: trim_trailing_slash(control_plane_url.into()),
		}
	}
}

fn trim_trailing_slash(mut url: String) -> String {
	while url.ends_with('/') {
		url.pop();
	}
	url
}

#[async_trait]
impl BatchTransport for HttpTransport {
	async fn post_batch(
		&self,
		payload: &str,
		extra_headers: &[(String, String)],
	) -> Result<String, UploadError> {
		let mut request = self
			.client
			.post(format!("{}/v1/batch", self.data_plane_url))
			.basic_auth(&self.write_key, Some(""))
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.body(payload.to_string());
		for (name, value) in extra_headers {
			request = request.header(name, value);
		}

		let response = request.send().await.map_err(UploadError::from_reqwest)?;
		let status = response.status();
		if status.is_success() {
			response.text().await.map_err(UploadError::from_reqwest)
		} else {
			tracing::debug!(status = status.as_u16(), "batch upload rejected");
			Err(UploadError::from_status(status))
		}
	}
}

#[async_trait]
impl ConfigTransport for HttpTransport {
	async fn fetch_source_config(&self) -> Result<String, UploadError> {
		let response = self
			.client
			.get(format!("{}/sourceConfig", self.control_plane_url))
			.basic_auth(&self.write_key, Some(""))
			.send()
			.await
			.map_err(UploadError::from_reqwest)?;
		let status = response.status();
		if status.is_success() {
			response.text().await.map_err(UploadError::from_reqwest)
		} else {
			Err(UploadError::from_status(status))
		}
	}
}
