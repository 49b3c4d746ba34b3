//! Error taxonomy for everything that crosses the network boundary.
//!
//! Client-side form failures live in `crate::form` and never reach this type.

use serde_json::Value;

use super::transport::ResponseBody;

/// Errors raised by the transport and the domain services.
///
/// Every variant carries the request method and final URL so a surfaced
/// error can always be traced back to the call that produced it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
  /// No response was received (connection refused, DNS, timeout, reset).
  #[error("{message}")]
  Network {
    message: String,
    method: String,
    url: String,
  },

  /// A response arrived with a status outside [200, 300).
  #[error("HTTP {status}: {status_text}")]
  Http {
    status: u16,
    status_text: String,
    body: ResponseBody,
    method: String,
    url: String,
  },

  /// The response claimed a content type we could not decode, or the payload
  /// did not match the envelope expected for the endpoint.
  #[error("Failed to parse response from {method} {url}: {message}")]
  Parse {
    message: String,
    method: String,
    url: String,
  },

  /// The server answered 2xx but rejected the request at the business level
  /// (`"status": "error"` or a non-success login status).
  #[error("{message}")]
  Application {
    message: String,
    body: Value,
    method: String,
    url: String,
  },

  /// The request could not be built (bad URL, unserializable body).
  #[error("Invalid request {method} {url}: {message}")]
  Request {
    message: String,
    method: String,
    url: String,
  },

  /// The fetch was aborted before it produced a result.
  #[error("Request cancelled: {message}")]
  Cancelled { message: String },

  /// A cache entry held a value of a different type than the caller asked for.
  #[error("Cached value for {key} has an unexpected type")]
  CacheType { key: String },
}

impl ApiError {
  pub fn cancelled(message: impl Into<String>) -> Self {
    ApiError::Cancelled {
      message: message.into(),
    }
  }

  /// HTTP status, when a response was received.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Raw response body, when a response was received.
  pub fn response_body(&self) -> Option<&ResponseBody> {
    match self {
      ApiError::Http { body, .. } => Some(body),
      _ => None,
    }
  }

  pub fn url(&self) -> Option<&str> {
    match self {
      ApiError::Network { url, .. }
      | ApiError::Http { url, .. }
      | ApiError::Parse { url, .. }
      | ApiError::Application { url, .. }
      | ApiError::Request { url, .. } => Some(url),
      ApiError::Cancelled { .. } | ApiError::CacheType { .. } => None,
    }
  }

  pub fn method(&self) -> Option<&str> {
    match self {
      ApiError::Network { method, .. }
      | ApiError::Http { method, .. }
      | ApiError::Parse { method, .. }
      | ApiError::Application { method, .. }
      | ApiError::Request { method, .. } => Some(method),
      ApiError::Cancelled { .. } | ApiError::CacheType { .. } => None,
    }
  }

  /// Client errors (4xx) are final: repeating the request cannot fix it.
  pub fn is_client_error(&self) -> bool {
    matches!(self.status(), Some(status) if (400..500).contains(&status))
  }

  /// Whether the retry policy may try again after this error.
  ///
  /// Network failures and everything outside 4xx are retryable. Parse,
  /// application, request-building and cancellation errors are final.
  pub fn is_retryable(&self) -> bool {
    match self {
      ApiError::Network { .. } => true,
      ApiError::Http { .. } => !self.is_client_error(),
      ApiError::Parse { .. }
      | ApiError::Application { .. }
      | ApiError::Request { .. }
      | ApiError::Cancelled { .. }
      | ApiError::CacheType { .. } => false,
    }
  }

  /// Message provided by the server, if any.
  ///
  /// Looks for a `message` field in a JSON error body, or uses the message of
  /// an application-level rejection.
  pub fn server_message(&self) -> Option<String> {
    match self {
      ApiError::Application { message, .. } => Some(message.clone()),
      ApiError::Http {
        body: ResponseBody::Json(value),
        ..
      } => value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(String::from),
      _ => None,
    }
  }

  /// Message to show the user: the server's when available, else `fallback`.
  pub fn display_message(&self, fallback: &str) -> String {
    self
      .server_message()
      .unwrap_or_else(|| fallback.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn http(status: u16, body: ResponseBody) -> ApiError {
    ApiError::Http {
      status,
      status_text: "status".to_string(),
      body,
      method: "GET".to_string(),
      url: "http://localhost/x".to_string(),
    }
  }

  #[test]
  fn test_client_errors_are_not_retryable() {
    assert!(!http(404, ResponseBody::Empty).is_retryable());
    assert!(!http(400, ResponseBody::Empty).is_retryable());
    assert!(!http(499, ResponseBody::Empty).is_retryable());
  }

  #[test]
  fn test_server_and_network_errors_are_retryable() {
    assert!(http(500, ResponseBody::Empty).is_retryable());
    assert!(http(503, ResponseBody::Empty).is_retryable());
    let network = ApiError::Network {
      message: "connection refused".to_string(),
      method: "GET".to_string(),
      url: "http://localhost/x".to_string(),
    };
    assert!(network.is_retryable());
    assert_eq!(network.status(), None);
  }

  #[test]
  fn test_application_error_is_final() {
    let err = ApiError::Application {
      message: "Ruangan sudah dipesan".to_string(),
      body: json!({"status": "error"}),
      method: "POST".to_string(),
      url: "http://localhost/booking".to_string(),
    };
    assert!(!err.is_retryable());
    assert_eq!(err.display_message("fallback"), "Ruangan sudah dipesan");
  }

  #[test]
  fn test_display_message_prefers_server_message() {
    let err = http(401, ResponseBody::Json(json!({"message": "Token expired"})));
    assert_eq!(err.display_message("Terjadi kesalahan"), "Token expired");

    let err = http(500, ResponseBody::Text("boom".to_string()));
    assert_eq!(err.display_message("Terjadi kesalahan"), "Terjadi kesalahan");
  }

  #[test]
  fn test_request_context_is_kept() {
    let err = http(404, ResponseBody::Empty);
    assert_eq!(err.method(), Some("GET"));
    assert_eq!(err.url(), Some("http://localhost/x"));
    assert_eq!(err.to_string(), "HTTP 404: status");
  }
}
