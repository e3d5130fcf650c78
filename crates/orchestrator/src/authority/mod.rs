//! Transport abstraction over the LG authority.
//!
//! The executor speaks to the authority only through [`Authority::send`],
//! which moves one request and returns the raw status and JSON body.
//! Interpreting that body is the executor's job; a transport only reports
//! whether the exchange happened at all.
//!
//! - [`http::HttpAuthority`] — the real HTTP client
//! - [`scripted::ScriptedAuthority`] — canned replies, records every call

pub mod http;
pub mod multipart;
pub mod scripted;

use std::fmt;

use async_trait::async_trait;
use lgdesk_interchange::{InstructionId, LgId};

pub use multipart::{Attachment, MultipartForm};

// ──────────────────────────────────────────────
// Requests and responses
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// One request to the authority. `path` is relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl RemoteRequest {
    pub fn get(path: String) -> Self {
        RemoteRequest {
            method: Method::Get,
            path,
            body: RequestBody::Empty,
        }
    }

    pub fn post_empty(path: String) -> Self {
        RemoteRequest {
            method: Method::Post,
            path,
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: String, body: serde_json::Value) -> Self {
        RemoteRequest {
            method: Method::Post,
            path,
            body: RequestBody::Json(body),
        }
    }

    pub fn post_multipart(path: String, form: MultipartForm) -> Self {
        RemoteRequest {
            method: Method::Post,
            path,
            body: RequestBody::Multipart(form),
        }
    }
}

/// Raw answer from the authority.
///
/// `body` is the parsed JSON, `Value::Null` for an empty body, or a JSON
/// string holding the raw text when the body is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RemoteResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        RemoteResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange with the authority did not happen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("could not read response from {url}: {message}")]
    ReadFailed { url: String, message: String },

    #[error("transport task failed: {0}")]
    TaskFailed(String),

    #[error("authority configuration error: {0}")]
    Config(String),
}

// ──────────────────────────────────────────────
// Authority trait
// ──────────────────────────────────────────────

/// Moves one request to the authority and back.
///
/// Implementations must not retry: financial mutations are never repeated
/// silently. Timeouts are whatever the transport's defaults are.
#[async_trait]
pub trait Authority: Send + Sync {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError>;
}

// ──────────────────────────────────────────────
// Endpoint paths
// ──────────────────────────────────────────────

/// Endpoint paths of the authority API.
pub mod paths {
    use super::{InstructionId, LgId};

    pub const RECORDS: &str = "/lg-records/";
    pub const BULK_RENEWAL: &str = "/lg-records/bulk-renewal";

    pub fn record(id: LgId) -> String {
        format!("/lg-records/{}", id)
    }

    /// `/lg-records/{id}/{segment}`: record-level actions.
    pub fn record_action(id: LgId, segment: &str) -> String {
        format!("/lg-records/{}/{}", id, segment)
    }

    /// `/lg-records/instructions/{id}/{segment}`: instruction-level calls.
    pub fn instruction_action(id: InstructionId, segment: &str) -> String {
        format!("/lg-records/instructions/{}/{}", id, segment)
    }

    pub fn mark_accessed_for_print(id: InstructionId) -> String {
        instruction_action(id, "mark-as-accessed-for-print")
    }

    pub fn view_letter(id: InstructionId) -> String {
        instruction_action(id, "view-letter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_api_layout() {
        assert_eq!(paths::record_action(LgId(42), "extend"), "/lg-records/42/extend");
        assert_eq!(
            paths::mark_accessed_for_print(InstructionId(901)),
            "/lg-records/instructions/901/mark-as-accessed-for-print"
        );
        assert_eq!(
            paths::view_letter(InstructionId(901)),
            "/lg-records/instructions/901/view-letter"
        );
    }

    #[test]
    fn success_range() {
        assert!(RemoteResponse::new(200, serde_json::Value::Null).is_success());
        assert!(RemoteResponse::new(202, serde_json::Value::Null).is_success());
        assert!(!RemoteResponse::new(302, serde_json::Value::Null).is_success());
        assert!(!RemoteResponse::new(422, serde_json::Value::Null).is_success());
    }
}
