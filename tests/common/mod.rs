#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use futures::{FutureExt, StreamExt, future::BoxFuture, stream};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use forvibe_back::{
    config::AppConfig,
    dao::{
        completion::{ChatTurn, CompletionClient, FragmentStream, UpstreamError, UpstreamResult},
        store::memory::MemoryStore,
    },
    routes,
    state::{AppState, SharedState},
};

/// What the fake model does for one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with these fragments, in order.
    Reply(Vec<&'static str>),
    /// Fail before anything is produced.
    Refuse,
    /// Produce these fragments, then fail.
    BreakAfter(Vec<&'static str>),
    /// Produce these fragments, then never finish.
    Hang(Vec<&'static str>),
}

/// Completion client that plays back scripted replies and records what it was sent.
#[derive(Default)]
pub struct ScriptedCompletions {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedCompletions {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Contexts received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, turns: Vec<ChatTurn>) -> Script {
        self.requests.lock().unwrap().push(turns);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Reply(vec!["ok"]))
    }
}

fn refused() -> UpstreamError {
    UpstreamError::Provider {
        message: "model unavailable".into(),
    }
}

fn fragments(parts: Vec<&'static str>) -> impl futures::Stream<Item = UpstreamResult<String>> {
    stream::iter(parts.into_iter().map(|part| Ok(part.to_string())))
}

impl CompletionClient for ScriptedCompletions {
    fn complete(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<String>> {
        let result = match self.next(turns) {
            Script::Reply(parts) => Ok(parts.concat()),
            _ => Err(refused()),
        };
        futures::future::ready(result).boxed()
    }

    fn stream(&self, turns: Vec<ChatTurn>) -> BoxFuture<'static, UpstreamResult<FragmentStream>> {
        let result: UpstreamResult<FragmentStream> = match self.next(turns) {
            Script::Reply(parts) => Ok(fragments(parts).boxed()),
            Script::Refuse => Err(refused()),
            Script::BreakAfter(parts) => Ok(fragments(parts)
                .chain(stream::once(async { Err::<String, _>(refused()) }))
                .boxed()),
            Script::Hang(parts) => Ok(fragments(parts).chain(stream::pending()).boxed()),
        };
        futures::future::ready(result).boxed()
    }
}

/// Router over an in-memory store and the given scripted model.
pub struct TestApp {
    pub state: SharedState,
    pub completions: Arc<ScriptedCompletions>,
    router: Router,
}

impl TestApp {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self::with_config(AppConfig::default(), scripts)
    }

    pub fn buffered(scripts: impl IntoIterator<Item = Script>) -> Self {
        let mut config = AppConfig::default();
        config.chat.streaming = false;
        Self::with_config(config, scripts)
    }

    pub fn with_config(config: AppConfig, scripts: impl IntoIterator<Item = Script>) -> Self {
        let completions = ScriptedCompletions::new(scripts);
        let state = AppState::new(Arc::new(MemoryStore::new()), completions.clone(), config);
        let router = routes::router(state.clone());
        Self {
            state,
            completions,
            router,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Send a request and decode the JSON reply.
    pub async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn create_conversation(&self) -> i64 {
        let (status, body) = self
            .json(Method::POST, "/api/conversations", Some(serde_json::json!({})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    /// Messages of a conversation as `(role, content)` pairs.
    pub async fn transcript(&self, id: i64) -> Vec<(String, String)> {
        let (status, body) = self
            .json(Method::GET, &format!("/api/conversations/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|message| {
                (
                    message["role"].as_str().unwrap().to_string(),
                    message["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    /// Poll the transcript until it has `len` messages.
    pub async fn wait_for_transcript(&self, id: i64, len: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            let transcript = self.transcript(id).await;
            if transcript.len() >= len {
                return transcript;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("transcript of conversation {id} never reached {len} messages");
    }
}

/// `data:` payloads of an event-stream body, keep-alive comments skipped.
pub fn sse_payloads(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
