//! End-to-end turns against a scripted transport: composition, folding,
//! streaming, and tool-call passthrough.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use kaiwa::prelude::*;

/// Transport that records every composed request and replays a scripted
/// reply, complete or fragmented.
struct ScriptedTransport {
    reply: String,
    tool_calls: Option<Vec<ToolCall>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            tool_calls: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn tool_calling(calls: Vec<ToolCall>) -> Self {
        Self {
            reply: String::new(),
            tool_calls: Some(calls),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChatResponse {
            content: Some(self.reply.clone()),
            reasoning: None,
            tool_calls: self.tool_calls.clone(),
            usage: Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 34,
                total_tokens: 46,
            }),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut events: Vec<Result<StreamEvent, ChatError>> = self
            .reply
            .split_inclusive(' ')
            .map(|piece| {
                Ok(StreamEvent::Content {
                    delta: piece.to_string(),
                })
            })
            .collect();
        events.push(Ok(StreamEvent::UsageUpdate {
            usage: Usage {
                prompt_tokens: 12,
                completion_tokens: 34,
                total_tokens: 46,
            },
        }));
        Ok(Box::pin(stream::iter(events)))
    }
}

/// Render sink whose output stays observable after the session takes it.
#[derive(Clone, Default)]
struct SharedSink {
    renders: Arc<Mutex<Vec<String>>>,
    finishes: Arc<Mutex<Vec<String>>>,
}

impl RenderSink for SharedSink {
    fn render(&mut self, visible: &str) {
        self.renders.lock().unwrap().push(visible.to_string());
    }

    fn finish(&mut self, display: &str) {
        self.finishes.lock().unwrap().push(display.to_string());
    }
}

fn session_with(transport: Arc<ScriptedTransport>) -> ChatSession {
    ChatSession::builder()
        .transport(transport)
        .build()
        .unwrap()
}

#[tokio::test]
async fn complete_turn_folds_the_reply_and_records_usage() {
    let transport = Arc::new(ScriptedTransport::text("Hi there!"));
    let mut session = session_with(transport.clone());

    let reply = session.submit_turn("Hello").await.unwrap();
    assert_eq!(reply, TurnReply::Text("Hi there!".to_string()));

    let history = session.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, MessageRole::System);
    assert_eq!(history[1].role, MessageRole::User);
    assert_eq!(history[1].content, "Hello");
    assert_eq!(history[2].role, MessageRole::Assistant);
    assert_eq!(history[2].content, "Hi there!");

    assert_eq!(session.last_usage().unwrap().total_tokens, 46);
    assert_eq!(session.session().turn(), 1);

    let requests = transport.recorded();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "deepseek-chat");
    assert!(!requests[0].stream);
    assert_eq!(requests[0].max_tokens, 4_096);
    // Default model supports sampling, so the stored params go out.
    assert_eq!(requests[0].temperature, Some(1.0));
}

#[tokio::test]
async fn streaming_turn_renders_and_folds_the_full_text() {
    let transport = Arc::new(ScriptedTransport::text(
        "Streaming replies arrive in small fragments. They still fold as one message.",
    ));
    let sink = SharedSink::default();
    let mut session = ChatSession::builder()
        .transport(transport.clone())
        .render_sink(Box::new(sink.clone()))
        .build()
        .unwrap();
    session.set_streaming(true).unwrap();

    let reply = session.submit_turn("Tell me").await.unwrap();
    let expected =
        "Streaming replies arrive in small fragments. They still fold as one message.";
    assert_eq!(reply, TurnReply::Text(expected.to_string()));

    // Full text folded as one assistant message.
    let history = session.history();
    assert_eq!(history.last().unwrap().content, expected);
    assert_eq!(session.last_usage().unwrap().completion_tokens, 34);

    // The final render saw the complete (untruncated) short text.
    let finishes = sink.finishes.lock().unwrap();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0], expected);

    // The composed request asked for a streamed response.
    assert!(transport.recorded()[0].stream);
}

#[tokio::test]
async fn tool_call_replies_are_returned_unfolded() {
    let calls = vec![ToolCall {
        id: "call_1".to_string(),
        name: "lookup".to_string(),
        arguments: r#"{"query":"rust"}"#.to_string(),
    }];
    let transport = Arc::new(ScriptedTransport::tool_calling(calls.clone()));
    let mut session = session_with(transport);
    session
        .register_tool(ToolSpec::new("lookup", serde_json::json!({"type": "object"})))
        .unwrap();

    let reply = session.submit_turn("Look this up").await.unwrap();
    assert_eq!(reply, TurnReply::ToolCalls(calls));

    // No assistant message folded until the calls are resolved.
    assert_eq!(session.history().last().unwrap().role, MessageRole::User);
    assert_eq!(session.session().turn(), 0);
}

#[tokio::test]
async fn prefix_mode_rewrites_the_wire_but_not_history() {
    let transport = Arc::new(ScriptedTransport::text(" println!(\"hi\"); }"));
    let mut session = session_with(transport.clone());
    session.set_beta_mode(true);
    session.set_prefix_mode(true).unwrap();

    session.submit_turn("fn main() {").await.unwrap();

    // The wire saw an assistant continuation prefix.
    let sent = &transport.recorded()[0];
    let wire_last = sent.messages.last().unwrap();
    assert_eq!(wire_last.role, MessageRole::Assistant);
    assert!(wire_last.prefix);

    // History kept the user message, followed by the real reply.
    let history = session.history();
    let n = history.len();
    assert_eq!(history[n - 2].role, MessageRole::User);
    assert!(!history[n - 2].prefix);
    assert_eq!(history[n - 1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn switching_to_the_reasoner_strips_sampling_from_the_wire() {
    let transport = Arc::new(ScriptedTransport::text("Deep thought."));
    let mut session = session_with(transport.clone());
    session.configure("temperature", 0.2).unwrap();
    session.switch_model("deepseek-reasoner").unwrap();

    session.submit_turn("Why?").await.unwrap();

    let sent = &transport.recorded()[0];
    assert_eq!(sent.model, "deepseek-reasoner");
    assert!(sent.sampling_omitted());
    assert_eq!(sent.max_tokens, 8_192);

    // Switching back resurrects the stored temperature.
    session.switch_model("deepseek-chat").unwrap();
    session.submit_turn("And now?").await.unwrap();
    let sent = &transport.recorded()[1];
    assert_eq!(sent.temperature, Some(0.2));
}

#[tokio::test]
async fn beta_mode_raises_the_requested_output_ceiling() {
    let transport = Arc::new(ScriptedTransport::text("ok"));
    let mut session = session_with(transport.clone());
    session.switch_model("deepseek-chat").unwrap();
    session.set_beta_mode(true);

    session.submit_turn("hello").await.unwrap();
    assert_eq!(transport.recorded()[0].max_tokens, 8_192);
}
