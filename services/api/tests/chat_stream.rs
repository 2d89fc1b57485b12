// services/api/tests/chat_stream.rs
// End-to-end tests of POST /api/chat/stream against the in-memory store.

mod common;

use axum::http::StatusCode;
use chat_studio_core::materializer::{BLOG_FORMAT_WARNING, PRODUCT_FORMAT_WARNING};
use common::{event_types, read_json, Faults, ScriptedCompletion, SlowTitles, TestApp};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn messages_of(app: &TestApp, cookie: &str, chat_id: &str) -> Vec<Value> {
    let response = app.get(&format!("/api/chat/{}", chat_id), cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await["messages"]
        .as_array()
        .unwrap()
        .clone()
}

fn chat_id_of(events: &[Value]) -> String {
    assert_eq!(events[0]["type"], "start");
    events[0]["chatId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn blog_request_creates_the_post_and_confirms_it() {
    let app = TestApp::new(ScriptedCompletion::streaming([
        "TITLE: Cats\n",
        "CONTENT: Cats are great",
    ]));
    let (cookie, user_id) = app.sign_up("writer@example.com").await;

    let events = app
        .stream_turn(
            &cookie,
            json!({ "message": "create blog about cats", "userId": user_id }),
        )
        .await;

    assert_eq!(event_types(&events), ["start", "chunk", "chunk", "done"]);
    let chat_id = chat_id_of(&events);

    // The backend was asked for the TITLE:/CONTENT: format.
    let prompts = app.completion.prompts();
    assert!(prompts.last().unwrap().contains("TITLE: [title on a single line]"));

    let blogs = read_json(app.get("/api/blogs", &cookie).await).await;
    let blogs = blogs.as_array().unwrap();
    assert_eq!(blogs.len(), 1);
    assert_eq!(blogs[0]["title"], "Cats");
    assert_eq!(blogs[0]["content"], "Cats are great");
    let slug = blogs[0]["slug"].as_str().unwrap();
    assert!(slug.starts_with("cats-"));

    let done = events.last().unwrap();
    let full_content = done["fullContent"].as_str().unwrap();
    assert!(full_content.contains("**Cats**"));
    assert!(full_content.contains(&format!("https://studio.test/blogs/{}", slug)));

    let messages = messages_of(&app, &cookie, &chat_id).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "create blog about cats");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], full_content);
    assert_eq!(messages[1]["id"], done["messageId"]);
}

#[tokio::test]
async fn chunks_arrive_in_order_and_add_up_to_the_answer() {
    let app = TestApp::new(ScriptedCompletion::streaming(["Hel", "lo", " world"]));
    let (cookie, user_id) = app.sign_up("reader@example.com").await;

    let events = app
        .stream_turn(&cookie, json!({ "message": "say hello", "userId": user_id }))
        .await;

    assert_eq!(
        event_types(&events),
        ["start", "chunk", "chunk", "chunk", "done"]
    );
    let chunks: Vec<&str> = events[1..4]
        .iter()
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(chunks, ["Hel", "lo", " world"]);
    assert_eq!(events[4]["fullContent"], "Hello world");

    // A plain turn sends the message through unchanged.
    assert_eq!(app.completion.prompts().last().unwrap(), "say hello");
}

#[tokio::test]
async fn new_chats_fall_back_to_the_default_title() {
    let app = TestApp::new(ScriptedCompletion::streaming(["Hi"]));
    let (cookie, user_id) = app.sign_up("titles@example.com").await;

    app.stream_turn(&cookie, json!({ "message": "hello there", "userId": user_id }))
        .await;

    let chats = read_json(app.get("/api/chats", &cookie).await).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
    assert_eq!(chats[0]["title"], "New Chat");
    assert_eq!(chats[0]["favorite"], false);
}

#[tokio::test]
async fn slow_title_backends_do_not_hold_up_the_turn() {
    let app = TestApp::with_titles(
        ScriptedCompletion::streaming(["Hi"]),
        Arc::new(SlowTitles {
            delay: Duration::from_secs(30),
        }),
        &[("AI_TITLE_TIMEOUT_MS", "50")],
    );
    let (cookie, user_id) = app.sign_up("patient@example.com").await;

    let started = Instant::now();
    let events = app
        .stream_turn(&cookie, json!({ "message": "hello there", "userId": user_id }))
        .await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(event_types(&events), ["start", "chunk", "done"]);

    let chats = read_json(app.get("/api/chats", &cookie).await).await;
    assert_eq!(chats[0]["title"], "New Chat");
}

#[tokio::test]
async fn gateway_failure_keeps_only_the_user_message() {
    let app = TestApp::new(ScriptedCompletion::failing("connection refused"));
    let (cookie, user_id) = app.sign_up("unlucky@example.com").await;

    let events = app
        .stream_turn(&cookie, json!({ "message": "hello?", "userId": user_id }))
        .await;

    assert_eq!(event_types(&events), ["start", "error"]);
    assert_eq!(events[1]["error"], "AI service request failed");

    let chat_id = chat_id_of(&events);
    let messages = messages_of(&app, &cookie, &chat_id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn failure_after_some_chunks_ends_with_error_and_persists_nothing() {
    let app = TestApp::new(ScriptedCompletion {
        deltas: vec![Ok("partial".to_string()), Err("connection reset".to_string())],
        ..ScriptedCompletion::default()
    });
    let (cookie, user_id) = app.sign_up("midway@example.com").await;

    let events = app
        .stream_turn(
            &cookie,
            json!({ "message": "create blog about rain", "userId": user_id }),
        )
        .await;

    assert_eq!(event_types(&events), ["start", "chunk", "error"]);
    let chat_id = chat_id_of(&events);
    assert_eq!(messages_of(&app, &cookie, &chat_id).await.len(), 1);

    let blogs = read_json(app.get("/api/blogs", &cookie).await).await;
    assert!(blogs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_completion_finishes_without_a_message() {
    let app = TestApp::new(ScriptedCompletion::streaming(Vec::<String>::new()));
    let (cookie, user_id) = app.sign_up("quiet@example.com").await;

    let events = app
        .stream_turn(&cookie, json!({ "message": "anyone?", "userId": user_id }))
        .await;

    assert_eq!(event_types(&events), ["start", "done"]);
    assert!(events[1].get("fullContent").is_none());
    assert!(events[1].get("messageId").is_none());

    let chat_id = chat_id_of(&events);
    assert_eq!(messages_of(&app, &cookie, &chat_id).await.len(), 1);
}

#[tokio::test]
async fn product_request_creates_the_product_from_json() {
    let app = TestApp::new(ScriptedCompletion::streaming([
        "Sure! ",
        r#"{"name":"Red Mug","description":"Ceramic mug","price":12,"stock":"40","image":""}"#,
    ]));
    let (cookie, user_id) = app.sign_up("shop@example.com").await;

    let events = app
        .stream_turn(
            &cookie,
            json!({ "message": "create product: a red mug", "userId": user_id }),
        )
        .await;

    assert_eq!(events.last().unwrap()["type"], "done");
    let full_content = events.last().unwrap()["fullContent"].as_str().unwrap();
    assert!(full_content.starts_with("✅ Product created!"));
    assert!(full_content.contains("Red Mug"));

    let products = read_json(app.get("/api/products", &cookie).await).await;
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Red Mug");
    assert_eq!(products[0]["price"], "12");
    assert_eq!(products[0]["stock"], "40");
}

#[tokio::test]
async fn product_without_json_is_kept_with_a_warning() {
    let app = TestApp::new(ScriptedCompletion::streaming(["A lovely red mug."]));
    let (cookie, user_id) = app.sign_up("nojson@example.com").await;

    let events = app
        .stream_turn(
            &cookie,
            json!({ "message": "create product: a red mug", "userId": user_id }),
        )
        .await;

    let done = events.last().unwrap();
    assert_eq!(done["type"], "done");
    let expected = format!("A lovely red mug.{}", PRODUCT_FORMAT_WARNING);
    assert_eq!(done["fullContent"], expected.as_str());

    let chat_id = chat_id_of(&events);
    let messages = messages_of(&app, &cookie, &chat_id).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], expected.as_str());

    let products = read_json(app.get("/api/products", &cookie).await).await;
    assert!(products.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn store_failures_while_finishing_end_with_error() {
    let cases = [
        (
            "create blog about rain",
            "TITLE: Rain\nCONTENT: It falls.",
            Faults {
                blogs: true,
                ..Faults::default()
            },
        ),
        (
            "create product: an umbrella",
            r#"{"name":"Umbrella","description":"Keeps you dry","price":"9","stock":"3"}"#,
            Faults {
                products: true,
                ..Faults::default()
            },
        ),
        (
            "how wet is rain?",
            "Very.",
            Faults {
                assistant_messages: true,
                ..Faults::default()
            },
        ),
    ];

    for (message, answer, faults) in cases {
        let app = TestApp::with_faults(ScriptedCompletion::streaming([answer]), faults);
        let (cookie, user_id) = app.sign_up("outage@example.com").await;

        let events = app
            .stream_turn(&cookie, json!({ "message": message, "userId": user_id }))
            .await;

        assert_eq!(event_types(&events), ["start", "chunk", "error"], "{}", message);
        assert_eq!(events[2]["error"], "Internal server error");

        let chat_id = chat_id_of(&events);
        let messages = messages_of(&app, &cookie, &chat_id).await;
        assert_eq!(messages.len(), 1, "{}", message);
        assert_eq!(messages[0]["role"], "user");

        let blogs = read_json(app.get("/api/blogs", &cookie).await).await;
        assert!(blogs.as_array().unwrap().is_empty());
        let products = read_json(app.get("/api/products", &cookie).await).await;
        assert!(products.as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn disconnecting_mid_stream_abandons_the_turn() {
    let app = TestApp::new(ScriptedCompletion::stalling(["first words"]));
    let (cookie, user_id) = app.sign_up("leaver@example.com").await;

    let response = app
        .post(
            "/api/chat/stream",
            &cookie,
            json!({ "message": "tell me a long story", "userId": user_id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let mut received = String::new();
    while !received.contains(r#""type":"chunk""#) {
        let frame = body.next().await.unwrap().unwrap();
        received.push_str(std::str::from_utf8(&frame).unwrap());
    }
    let start: Value = serde_json::from_str(
        received
            .split("\n\n")
            .next()
            .and_then(|frame| frame.strip_prefix("data: "))
            .unwrap(),
    )
    .unwrap();
    let chat_id = start["chatId"].as_str().unwrap().to_string();
    assert!(!app.completion.was_released());

    drop(body);

    let deadline = Instant::now() + Duration::from_secs(2);
    while !app.completion.was_released() {
        assert!(Instant::now() < deadline, "completion stream was never dropped");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let messages = messages_of(&app, &cookie, &chat_id).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn explicit_context_overrides_the_wording() {
    let app = TestApp::new(ScriptedCompletion::streaming(["TITLE: Tea\nCONTENT: Brew it."]));
    let (cookie, user_id) = app.sign_up("context@example.com").await;

    app.stream_turn(
        &cookie,
        json!({ "message": "tea", "userId": user_id, "context": "create-blog" }),
    )
    .await;

    let blogs = read_json(app.get("/api/blogs", &cookie).await).await;
    assert_eq!(blogs[0]["title"], "Tea");
}

#[tokio::test]
async fn unparseable_blog_is_kept_with_a_warning() {
    let app = TestApp::new(ScriptedCompletion::streaming(["Dogs are loyal."]));
    let (cookie, user_id) = app.sign_up("dogs@example.com").await;

    let events = app
        .stream_turn(
            &cookie,
            json!({ "message": "write a blog about dogs", "userId": user_id }),
        )
        .await;

    let done = events.last().unwrap();
    assert_eq!(done["type"], "done");
    assert_eq!(
        done["fullContent"],
        format!("Dogs are loyal.{}", BLOG_FORMAT_WARNING)
    );

    let blogs = read_json(app.get("/api/blogs", &cookie).await).await;
    assert!(blogs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn follow_up_turns_reuse_the_chat() {
    let app = TestApp::new(ScriptedCompletion::streaming(["ok"]));
    let (cookie, user_id) = app.sign_up("followup@example.com").await;

    let first = app
        .stream_turn(&cookie, json!({ "message": "one", "userId": user_id }))
        .await;
    let chat_id = chat_id_of(&first);

    let second = app
        .stream_turn(
            &cookie,
            json!({ "message": "two", "userId": user_id, "chatId": chat_id }),
        )
        .await;
    assert_eq!(chat_id_of(&second), chat_id);

    let contents: Vec<String> = messages_of(&app, &cookie, &chat_id)
        .await
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(contents, ["one", "ok", "two", "ok"]);

    let chats = read_json(app.get("/api/chats", &cookie).await).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rejects_invalid_turn_requests() {
    let app = TestApp::new(ScriptedCompletion::streaming(["ok"]));
    let (cookie, user_id) = app.sign_up("owner@example.com").await;
    let (other_cookie, other_user) = app.sign_up("other@example.com").await;

    let missing_user = app
        .post("/api/chat/stream", &cookie, json!({ "message": "hi" }))
        .await;
    assert_eq!(missing_user.status(), StatusCode::BAD_REQUEST);

    let missing_message = app
        .post("/api/chat/stream", &cookie, json!({ "userId": user_id, "message": "  " }))
        .await;
    assert_eq!(missing_message.status(), StatusCode::BAD_REQUEST);

    let impersonating = app
        .post(
            "/api/chat/stream",
            &cookie,
            json!({ "message": "hi", "userId": other_user }),
        )
        .await;
    assert_eq!(impersonating.status(), StatusCode::FORBIDDEN);

    let bad_chat = app
        .post(
            "/api/chat/stream",
            &cookie,
            json!({ "message": "hi", "userId": user_id, "chatId": "not-a-uuid" }),
        )
        .await;
    assert_eq!(bad_chat.status(), StatusCode::BAD_REQUEST);

    let unknown_chat = app
        .post(
            "/api/chat/stream",
            &cookie,
            json!({ "message": "hi", "userId": user_id, "chatId": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(unknown_chat.status(), StatusCode::NOT_FOUND);

    // A chat that belongs to someone else cannot be continued.
    let events = app
        .stream_turn(&other_cookie, json!({ "message": "mine", "userId": other_user }))
        .await;
    let foreign_chat = chat_id_of(&events);
    let hijack = app
        .post(
            "/api/chat/stream",
            &cookie,
            json!({ "message": "hi", "userId": user_id, "chatId": foreign_chat }),
        )
        .await;
    assert_eq!(hijack.status(), StatusCode::FORBIDDEN);
    let body = read_json(hijack).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn requires_a_session() {
    let app = TestApp::new(ScriptedCompletion::streaming(["ok"]));

    let response = app
        .send(common::json_request(
            "POST",
            "/api/chat/stream",
            None,
            json!({ "message": "hi", "userId": "someone" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .post(
            "/api/chat/stream",
            "session=not-a-real-session",
            json!({ "message": "hi", "userId": "someone" }),
        )
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}
