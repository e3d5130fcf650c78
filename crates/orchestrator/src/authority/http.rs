//! HTTP transport to the LG authority.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Error statuses are returned as responses,
//! not transport errors: the executor reads their bodies for messages.

use async_trait::async_trait;

use super::multipart::{random_boundary, MultipartForm};
use super::{Authority, Method, RemoteRequest, RemoteResponse, RequestBody, TransportError};
use crate::settings::AuthoritySettings;

/// Authority reached over HTTP(S).
///
/// - `base_url` is prefixed to every request path
/// - `token`, when present, is sent as `Authorization: Bearer <token>`
pub struct HttpAuthority {
    base_url: String,
    token: Option<String>,
}

impl HttpAuthority {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TransportError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(TransportError::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        Ok(HttpAuthority {
            base_url: trimmed.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn from_settings(settings: &AuthoritySettings) -> Result<Self, TransportError> {
        Self::new(&settings.base_url, settings.token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join the base URL and an endpoint path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Interpret a response body: JSON when it parses, `Null` when empty, the
/// raw text otherwise.
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn exchange(
    url: String,
    token: Option<String>,
    method: Method,
    body: RequestBody,
) -> Result<RemoteResponse, TransportError> {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build();
    let agent = ureq::Agent::new_with_config(config);
    let auth = token.map(|t| format!("Bearer {}", t));

    let unreachable = |e: ureq::Error| TransportError::Unreachable {
        url: url.clone(),
        message: e.to_string(),
    };

    let response = match (method, body) {
        (Method::Get, _) => {
            let mut request = agent.get(&url).header("Accept", "application/json");
            if let Some(ref auth) = auth {
                request = request.header("Authorization", auth);
            }
            request.call().map_err(unreachable)?
        }
        (Method::Post, body) => {
            let mut request = agent.post(&url).header("Accept", "application/json");
            if let Some(ref auth) = auth {
                request = request.header("Authorization", auth);
            }
            match body {
                RequestBody::Empty => request.send_empty().map_err(unreachable)?,
                RequestBody::Json(value) => request.send_json(&value).map_err(unreachable)?,
                RequestBody::Multipart(form) => {
                    let boundary = random_boundary();
                    request
                        .header("Content-Type", &MultipartForm::content_type(&boundary))
                        .send(&form.encode(&boundary)[..])
                        .map_err(unreachable)?
                }
            }
        }
    };

    let status = response.status().as_u16();
    let text = response
        .into_body()
        .read_to_string()
        .map_err(|e| TransportError::ReadFailed {
            url: url.clone(),
            message: e.to_string(),
        })?;

    Ok(RemoteResponse::new(status, parse_body(&text)))
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let url = self.url_for(&request.path);
        let token = self.token.clone();
        let method = request.method;
        tracing::debug!(%method, %url, "authority request");

        tokio::task::spawn_blocking(move || exchange(url, token, method, request.body))
            .await
            .map_err(|e| TransportError::TaskFailed(format!("task join error: {}", e)))?
    }
}
