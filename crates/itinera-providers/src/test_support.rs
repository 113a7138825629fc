//! Local HTTP stubs standing in for Gemini and SerpApi.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::traits::{GenerateRequest, ProviderResult, TextModel};

/// One request as seen by the stub.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Value,
}

pub(crate) struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve every request with `responder` on an ephemeral port.
pub(crate) async fn stub_server<F>(responder: F) -> StubServer
where
    F: Fn(&Recorded) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let responder = Arc::new(responder);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded_requests = Arc::clone(&requests);

    let app = Router::new().fallback(
        move |uri: Uri,
              Query(query): Query<HashMap<String, String>>,
              headers: HeaderMap,
              body: Bytes| {
            let responder = Arc::clone(&responder);
            let requests = Arc::clone(&recorded_requests);
            async move {
                let recorded = Recorded {
                    path: uri.path().to_string(),
                    query,
                    headers,
                    body: serde_json::from_slice(&body).unwrap_or(Value::Null),
                };
                let (status, value) = responder(&recorded);
                requests.lock().unwrap().push(recorded);
                (status, Json(value))
            }
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

/// A Gemini `generateContent` body whose only candidate says `text`.
pub(crate) fn gemini_reply(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

/// A [`TextModel`] that answers from a fixed script and remembers what it
/// was asked. Replies are consumed in order; the last one repeats.
pub(crate) struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Arc<Self> {
        Self::with_replies(&[reply])
    }

    pub fn with_replies(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop().unwrap_or_default()
        } else {
            replies.last().cloned().unwrap_or_default()
        };
        Ok(reply)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
