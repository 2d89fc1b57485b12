// services/api/tests/common/mod.rs
// Shared helpers for the router-level integration tests.

#![allow(dead_code)]

use api_lib::{
    adapters::{CompletionTitleAdapter, InMemoryDb},
    config::Config,
    web::{self, state::AppState},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chat_studio_core::domain::{
    AuthSession, Blog, BlogDraft, Chat, Feedback, Message, Product, ProductDraft, Role, User,
    UserCredentials,
};
use chat_studio_core::ports::{
    CompletionRequest, CompletionService, DatabaseService, PortError, PortResult,
    TitleGenerationService, TokenStream,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

/// A completion backend that replays a fixed script and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    /// Items yielded by a streaming call; `Err` becomes an upstream failure.
    pub deltas: Vec<Result<String, String>>,
    /// Fails the streaming call before any delta.
    pub open_error: Option<String>,
    /// Answer of single-shot calls; `None` reports a missing configuration.
    pub full_text: Option<String>,
    /// Keeps the stream open after the last delta instead of ending it.
    pub stall_after_deltas: bool,
    /// Set once a stream handed out by this backend has been dropped.
    pub released: Arc<AtomicBool>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

/// Flags its owner's drop.
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ScriptedCompletion {
    pub fn streaming<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(|d| Ok(d.into())).collect(),
            ..Self::default()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            open_error: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn answering(text: &str) -> Self {
        Self {
            full_text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Yields `deltas` and then never finishes.
    pub fn stalling<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stall_after_deltas: true,
            ..Self::streaming(deltas)
        }
    }

    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.full_text
            .clone()
            .ok_or_else(|| PortError::Configuration("no backend in tests".to_string()))
    }

    async fn complete_streaming(&self, request: &CompletionRequest) -> PortResult<TokenStream> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(reason) = &self.open_error {
            return Err(PortError::Upstream(reason.clone()));
        }
        let items: Vec<PortResult<String>> = self
            .deltas
            .iter()
            .map(|d| d.clone().map_err(PortError::Upstream))
            .collect();
        let flag = ReleaseFlag(self.released.clone());
        let tail = if self.stall_after_deltas {
            futures::stream::pending().boxed()
        } else {
            futures::stream::empty().boxed()
        };
        Ok(Box::pin(futures::stream::iter(items).chain(tail).map(
            move |item| {
                let _held = &flag;
                item
            },
        )))
    }
}

/// A title backend that answers only after `delay`.
pub struct SlowTitles {
    pub delay: Duration,
}

#[async_trait]
impl TitleGenerationService for SlowTitles {
    async fn generate_title(&self, _first_message: &str) -> PortResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok("Eventually Named".to_string())
    }
}

//=========================================================================================
// Store Faults
//=========================================================================================

/// Which store operations fail with `PortError::Unexpected`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    pub session_checks: bool,
    pub blogs: bool,
    pub products: bool,
    pub assistant_messages: bool,
}

/// An `InMemoryDb` whose chosen operations fail, as during a database outage.
pub struct FaultyDb {
    inner: Arc<InMemoryDb>,
    faults: Faults,
}

fn outage() -> PortError {
    PortError::Unexpected("connection reset by database".to_string())
}

#[async_trait]
impl DatabaseService for FaultyDb {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        self.inner.create_user_with_email(email, hashed_password).await
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner.get_user_by_email(email).await
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .create_auth_session(session_id, user_id, expires_at)
            .await
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        if self.faults.session_checks {
            return Err(outage());
        }
        self.inner.validate_auth_session(session_id).await
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.delete_auth_session(session_id).await
    }

    async fn list_auth_sessions(&self, user_id: &str) -> PortResult<Vec<AuthSession>> {
        self.inner.list_auth_sessions(user_id).await
    }

    async fn delete_user_auth_session(&self, user_id: &str, session_id: &str) -> PortResult<bool> {
        self.inner.delete_user_auth_session(user_id, session_id).await
    }

    async fn delete_auth_sessions_for_user(&self, user_id: &str) -> PortResult<()> {
        self.inner.delete_auth_sessions_for_user(user_id).await
    }

    async fn create_chat(&self, owner_id: &str, title: &str) -> PortResult<Chat> {
        self.inner.create_chat(owner_id, title).await
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        self.inner.get_chat(chat_id).await
    }

    async fn list_chats(&self, owner_id: &str) -> PortResult<Vec<Chat>> {
        self.inner.list_chats(owner_id).await
    }

    async fn set_favorite(&self, chat_id: Uuid, favorite: bool) -> PortResult<()> {
        self.inner.set_favorite(chat_id, favorite).await
    }

    async fn delete_chat(&self, chat_id: Uuid) -> PortResult<()> {
        self.inner.delete_chat(chat_id).await
    }

    async fn append_message(&self, chat_id: Uuid, role: Role, content: &str) -> PortResult<Message> {
        if self.faults.assistant_messages && role == Role::Assistant {
            return Err(outage());
        }
        self.inner.append_message(chat_id, role, content).await
    }

    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<Message>> {
        self.inner.list_messages(chat_id).await
    }

    async fn set_feedback(
        &self,
        message_id: Uuid,
        feedback: Option<Feedback>,
        user_comment: Option<&str>,
    ) -> PortResult<()> {
        self.inner
            .set_feedback(message_id, feedback, user_comment)
            .await
    }

    async fn list_messages_for_owner(&self, owner_id: &str) -> PortResult<Vec<Message>> {
        self.inner.list_messages_for_owner(owner_id).await
    }

    async fn create_blog(&self, owner_id: &str, draft: &BlogDraft, slug: &str) -> PortResult<Blog> {
        if self.faults.blogs {
            return Err(outage());
        }
        self.inner.create_blog(owner_id, draft, slug).await
    }

    async fn list_blogs(&self) -> PortResult<Vec<Blog>> {
        self.inner.list_blogs().await
    }

    async fn find_blog(&self, id_or_slug: &str) -> PortResult<Blog> {
        self.inner.find_blog(id_or_slug).await
    }

    async fn update_blog(&self, blog_id: Uuid, draft: &BlogDraft) -> PortResult<()> {
        self.inner.update_blog(blog_id, draft).await
    }

    async fn delete_blog(&self, blog_id: Uuid) -> PortResult<()> {
        self.inner.delete_blog(blog_id).await
    }

    async fn create_product(&self, owner_id: &str, draft: &ProductDraft) -> PortResult<Product> {
        if self.faults.products {
            return Err(outage());
        }
        self.inner.create_product(owner_id, draft).await
    }

    async fn list_products(&self) -> PortResult<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn update_product(&self, product_id: Uuid, draft: &ProductDraft) -> PortResult<()> {
        self.inner.update_product(product_id, draft).await
    }

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        self.inner.delete_product(product_id).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<InMemoryDb>,
    pub completion: Arc<ScriptedCompletion>,
}

impl TestApp {
    pub fn new(completion: ScriptedCompletion) -> Self {
        Self::assemble(completion, Faults::default(), None, &[])
    }

    /// An app whose store fails the operations named in `faults`.
    pub fn with_faults(completion: ScriptedCompletion, faults: Faults) -> Self {
        Self::assemble(completion, faults, None, &[])
    }

    /// An app that names chats with `titles` under the given settings.
    pub fn with_titles(
        completion: ScriptedCompletion,
        titles: Arc<dyn TitleGenerationService>,
        settings: &[(&str, &str)],
    ) -> Self {
        Self::assemble(completion, Faults::default(), Some(titles), settings)
    }

    fn assemble(
        completion: ScriptedCompletion,
        faults: Faults,
        titles: Option<Arc<dyn TitleGenerationService>>,
        settings: &[(&str, &str)],
    ) -> Self {
        let config = Config::from_lookup(|key| match key {
            "PUBLIC_BASE_URL" => Some("https://studio.test".to_string()),
            _ => settings
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()),
        })
        .unwrap();
        let db = Arc::new(InMemoryDb::new());
        let completion = Arc::new(completion);
        let title_adapter = titles
            .unwrap_or_else(|| Arc::new(CompletionTitleAdapter::new(completion.clone())));
        let app_state = Arc::new(AppState {
            db: Arc::new(FaultyDb {
                inner: db.clone(),
                faults,
            }),
            config: Arc::new(config),
            completion: completion.clone(),
            title_adapter,
        });
        Self {
            router: web::router(app_state),
            db,
            completion,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Signs a new user up and returns `(cookie, user_id)`.
    pub async fn sign_up(&self, email: &str) -> (String, String) {
        let response = self
            .send(json_request(
                "POST",
                "/auth/signup",
                None,
                json!({ "email": email, "password": "correct horse" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookie = session_cookie_of(&response);
        let body = read_json(response).await;
        let user_id = body["userId"].as_str().unwrap().to_string();
        (cookie, user_id)
    }

    /// Logs an existing user in again and returns the new session's cookie.
    pub async fn log_in(&self, email: &str) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": email, "password": "correct horse" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie_of(&response)
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> Response<Body> {
        self.send(json_request("POST", uri, Some(cookie), body)).await
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Runs one streaming turn and returns the decoded events.
    pub async fn stream_turn(&self, cookie: &str, body: Value) -> Vec<Value> {
        let response = self.post("/api/chat/stream", cookie, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        read_events(response).await
    }
}

/// The `session=<id>` pair a response sets.
pub fn session_cookie_of(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Splits an event-stream body into its JSON payloads.
pub async fn read_events(response: Response<Body>) -> Vec<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    text.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let payload = frame.strip_prefix("data: ").unwrap();
            serde_json::from_str(payload).unwrap()
        })
        .collect()
}

pub fn event_types(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}
