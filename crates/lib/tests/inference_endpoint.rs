//! Integration test: run a fake text-generation endpoint with axum on a free port and drive
//! `HfInferenceClient` and `MessageHandler` against it. Does not require a real endpoint or homeserver.

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use lib::conversation::StoredConversation;
use lib::handler::{HandleOutcome, HandlerSettings, MessageHandler};
use lib::inference::{HfInferenceClient, InferenceError, TextGeneration};
use lib::messaging::{MessagingClient, MessagingError};
use lib::prompt::PromptBuilder;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Requests seen by the fake endpoint: (authorization header, body).
type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn generate_array(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let inputs = body["inputs"].as_str().unwrap_or_default().to_string();
    seen.lock().unwrap().push((authorization(&headers), body));
    Json(json!([{ "generated_text": format!(" Answer to: {}", inputs) }]))
}

async fn generate_object(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().push((None, body));
    Json(json!({ "generated_text": "single" }))
}

async fn generate_empty() -> Json<Value> {
    Json(json!([]))
}

async fn generate_fail() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "model is loading").into_response()
}

async fn start_endpoint() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/array", post(generate_array))
        .route("/object", post(generate_object))
        .route("/empty", post(generate_empty))
        .route("/fail", post(generate_fail))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), seen)
}

fn conversation() -> StoredConversation {
    StoredConversation::new("!room:example.org", "$root")
}

#[tokio::test]
async fn posts_request_with_bearer_token_and_reads_first_generation() {
    let (base, seen) = start_endpoint().await;
    let client = HfInferenceClient::new(format!("{}/array", base), Some("hf_secret".to_string()));
    let builder = PromptBuilder::new("<q>${question}</q>", 128);

    let out = builder
        .send_chat_message(&client, "why is the sky blue?", &conversation())
        .await
        .expect("generation");
    assert_eq!(out.generated_text, " Answer to: <q>why is the sky blue?</q>");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer hf_secret"));
    assert_eq!(
        body,
        &json!({
            "inputs": "<q>why is the sky blue?</q>",
            "parameters": { "return_full_text": false, "max_new_tokens": 128 }
        })
    );
}

#[tokio::test]
async fn accepts_single_object_response() {
    let (base, _seen) = start_endpoint().await;
    let client = HfInferenceClient::new(format!("{}/object", base), None);
    let req = PromptBuilder::new("${question}", 4).build_inference_request("hi", &conversation());
    let out = client.text_generation(&req).await.expect("generation");
    assert_eq!(out.generated_text, "single");
}

#[tokio::test]
async fn api_errors_and_empty_responses_are_reported() {
    let (base, _seen) = start_endpoint().await;
    let req = PromptBuilder::new("${question}", 4).build_inference_request("hi", &conversation());

    let failing = HfInferenceClient::new(format!("{}/fail", base), None);
    match failing.text_generation(&req).await {
        Err(InferenceError::Api(msg)) => {
            assert!(msg.starts_with("503"), "unexpected message: {}", msg);
            assert!(msg.contains("model is loading"));
        }
        other => panic!("expected api error, got {:?}", other),
    }

    let empty = HfInferenceClient::new(format!("{}/empty", base), None);
    assert!(matches!(
        empty.text_generation(&req).await,
        Err(InferenceError::EmptyResponse)
    ));
}

/// Messaging client that keeps sent room events and texts.
#[derive(Default)]
struct MemoryRoom {
    events: Mutex<Vec<(String, String, Value)>>,
    texts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessagingClient for MemoryRoom {
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: Value,
    ) -> Result<String, MessagingError> {
        let mut events = self.events.lock().unwrap();
        events.push((room_id.to_string(), event_type.to_string(), content));
        Ok(format!("$reply{}", events.len()))
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, MessagingError> {
        self.texts
            .lock()
            .unwrap()
            .push((room_id.to_string(), text.to_string()));
        Ok("$notice".to_string())
    }

    async fn set_typing(&self, _room_id: &str, _typing: bool, _timeout_ms: u64) -> Result<(), MessagingError> {
        Ok(())
    }

    async fn send_read_receipt(&self, _room_id: &str, _event_id: &str) -> Result<(), MessagingError> {
        Ok(())
    }
}

fn settings() -> HandlerSettings {
    HandlerSettings {
        bot_user_id: Some("@hfbot:example.org".to_string()),
        prefix: None,
        threads: true,
        rich_text: true,
        typing_timeout_ms: 5_000,
        error_message: "The model is unavailable right now.".to_string(),
    }
}

fn question(event_id: &str, body: &str) -> Value {
    json!({
        "type": "m.room.message",
        "event_id": event_id,
        "sender": "@alice:example.org",
        "origin_server_ts": 1_700_000_000_000u64,
        "content": { "msgtype": "m.text", "body": body }
    })
}

#[tokio::test]
async fn handler_replies_with_rendered_generation() {
    let (base, _seen) = start_endpoint().await;
    let room = Arc::new(MemoryRoom::default());
    let generator = Arc::new(HfInferenceClient::new(format!("{}/array", base), None));
    let handler = MessageHandler::new(
        room.clone(),
        generator,
        PromptBuilder::new("${question}", 64),
        settings(),
    );

    let outcome = handler
        .handle("!room:example.org", &question("$q1", "say *hi*"))
        .await;
    assert_eq!(
        outcome,
        HandleOutcome::Replied {
            root_event_id: "$q1".to_string(),
            reply_event_id: "$reply1".to_string(),
        }
    );

    let events = room.events.lock().unwrap();
    let (room_id, event_type, content) = &events[0];
    assert_eq!(room_id, "!room:example.org");
    assert_eq!(event_type, "m.room.message");
    assert_eq!(content["body"], "Answer to: say *hi*");
    assert_eq!(content["format"], "org.matrix.custom.html");
    assert_eq!(content["formatted_body"], "<p>Answer to: say <em>hi</em></p>\n");
    assert_eq!(content["m.relates_to"]["rel_type"], "m.thread");
    assert_eq!(content["m.relates_to"]["m.in_reply_to"]["event_id"], "$q1");
}

#[tokio::test]
async fn handler_reports_endpoint_failure_into_room() {
    let (base, _seen) = start_endpoint().await;
    let room = Arc::new(MemoryRoom::default());
    let generator: Arc<dyn TextGeneration> =
        Arc::new(HfInferenceClient::new(format!("{}/fail", base), None));
    let handler = MessageHandler::new(
        room.clone(),
        generator,
        PromptBuilder::new("${question}", 64),
        settings(),
    );

    let outcome = handler
        .handle("!room:example.org", &question("$q2", "anyone there?"))
        .await;
    assert_eq!(outcome, HandleOutcome::Failed);

    let mut notified = false;
    for _ in 0..100 {
        if !room.texts.lock().unwrap().is_empty() {
            notified = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(notified, "error notice was not sent");
    assert_eq!(
        room.texts.lock().unwrap()[0],
        (
            "!room:example.org".to_string(),
            "The model is unavailable right now.".to_string()
        )
    );
    assert!(room.events.lock().unwrap().is_empty());
}
