//! Scripted authority: canned replies, every call recorded.
//!
//! Replies are queued per `(method, path)` and consumed in order; the last
//! queued reply for a key is repeated once the queue is down to one. A
//! request with no script gets a 404 naming the path, so an unexpected call
//! shows up as a failed action rather than a hang.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Authority, Method, RemoteRequest, RemoteResponse, TransportError};

/// One canned reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Answer with this status and body.
    Respond { status: u16, body: Value },
    /// Fail the exchange as if the network were down.
    Unreachable { message: String },
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Respond { status: 200, body }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Reply::Respond { status, body }
    }

    pub fn unreachable(message: &str) -> Self {
        Reply::Unreachable {
            message: message.to_string(),
        }
    }
}

#[derive(Default)]
struct Script {
    replies: HashMap<(Method, String), VecDeque<Reply>>,
    calls: Vec<RemoteRequest>,
}

/// Authority double for tests and offline runs.
#[derive(Default)]
pub struct ScriptedAuthority {
    script: Mutex<Script>,
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method path`. Builder form of [`Self::push`].
    pub fn on(self, method: Method, path: &str, reply: Reply) -> Self {
        self.push(method, path, reply);
        self
    }

    pub fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut script = self.lock();
        script
            .replies
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// `"METHOD path"` for every request received so far.
    pub fn call_log(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panic while holding the lock only happens inside a failing test;
        // the script itself is still consistent.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Authority for ScriptedAuthority {
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let key = (request.method, request.path.clone());
        let reply = {
            let mut script = self.lock();
            script.calls.push(request);
            match script.replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Respond { status, body }) => Ok(RemoteResponse::new(status, body)),
            Some(Reply::Unreachable { message }) => Err(TransportError::Unreachable {
                url: key.1,
                message,
            }),
            None => Ok(RemoteResponse::new(
                404,
                json!({ "detail": format!("no scripted reply for {} {}", key.0, key.1) }),
            )),
        }
    }
}
