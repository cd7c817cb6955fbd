//! Error taxonomy for fetches and mutations.
//!
//! Fetch functions fail with a [`FetchError`]. Once a failure reaches the
//! cache it is flattened into an [`ErrorInfo`], which is what consumers see.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Transport failure (connection refused, DNS, reset...)
  #[error("network error: {0}")]
  Network(String),
  /// The service answered with a non-2xx status
  #[error("request failed with status {status_code}: {message}")]
  Http { status_code: u16, message: String },
  /// The payload did not match the expected shape
  #[error("malformed response: {0}")]
  Parse(String),
  /// The request did not complete in time
  #[error("request timed out")]
  Timeout,
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      FetchError::Timeout
    } else if let Some(status) = e.status() {
      FetchError::Http {
        status_code: status.as_u16(),
        message: e.to_string(),
      }
    } else if e.is_decode() {
      FetchError::Parse(e.to_string())
    } else {
      FetchError::Network(e.to_string())
    }
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(e: serde_json::Error) -> Self {
    FetchError::Parse(e.to_string())
  }
}

/// Classification stored alongside a failed cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
  NetworkError,
  HttpError { status_code: u16 },
  ParseError,
  ValidationError,
  Timeout,
}

impl ErrorKind {
  /// Canonical name of the kind, without any payload.
  pub fn name(&self) -> &'static str {
    match self {
      ErrorKind::NetworkError => "NetworkError",
      ErrorKind::HttpError { .. } => "HttpError",
      ErrorKind::ParseError => "ParseError",
      ErrorKind::ValidationError => "ValidationError",
      ErrorKind::Timeout => "Timeout",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorKind::HttpError { status_code } => write!(f, "HttpError({})", status_code),
      other => f.write_str(other.name()),
    }
  }
}

/// Terminal error recorded for a query or mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
  pub kind: ErrorKind,
  pub message: String,
}

impl ErrorInfo {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }
}

impl fmt::Display for ErrorInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl From<FetchError> for ErrorInfo {
  fn from(e: FetchError) -> Self {
    let message = e.to_string();
    let kind = match e {
      FetchError::Network(_) => ErrorKind::NetworkError,
      FetchError::Http { status_code, .. } => ErrorKind::HttpError { status_code },
      FetchError::Parse(_) => ErrorKind::ParseError,
      FetchError::Timeout => ErrorKind::Timeout,
    };
    Self { kind, message }
  }
}

/// An input value that could not be used as-is.
///
/// Only raised while parsing navigation parameters, where it is always
/// recovered by substituting a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for `{name}`")]
pub struct ValidationError {
  pub name: &'static str,
  pub value: String,
}

impl From<ValidationError> for ErrorInfo {
  fn from(e: ValidationError) -> Self {
    ErrorInfo::new(ErrorKind::ValidationError, e.to_string())
  }
}
