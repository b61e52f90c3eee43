//! Session facade: one conversation, processed strictly sequentially.
//!
//! [`ChatSession`] wires the session state, capability catalog, transport,
//! retry executor, and streaming flow controller into a single turn loop:
//! append the user message, compose the request, invoke through the retry
//! engine, then fold the reply back into history.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::ModelCatalog;
use crate::compose::{CapabilityWarning, compose_request};
use crate::defaults;
use crate::error::ChatError;
use crate::retry::{RecoveryHooks, RetryExecutor, RetryPolicy};
use crate::session::{ModeFlags, SessionLimits, SessionState};
use crate::stream::{FlowConfig, FlowController, NullSink, RenderSink};
use crate::transport::ChatTransport;
use crate::types::{ChatRequest, Message, ToolSpec, TurnReply, Usage};

/// Builder for [`ChatSession`].
pub struct ChatSessionBuilder {
    catalog: Option<ModelCatalog>,
    model: Option<String>,
    transport: Option<Arc<dyn ChatTransport>>,
    retry_policy: RetryPolicy,
    hooks: Option<Arc<dyn RecoveryHooks>>,
    flow: FlowConfig,
    limits: SessionLimits,
    sink: Option<Box<dyn RenderSink + Send>>,
}

impl ChatSessionBuilder {
    fn new() -> Self {
        Self {
            catalog: None,
            model: None,
            transport: None,
            retry_policy: RetryPolicy::default(),
            hooks: None,
            flow: FlowConfig::default(),
            limits: SessionLimits::default(),
            sink: None,
        }
    }

    /// Capability catalog; defaults to [`ModelCatalog::builtin`].
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Initial model; defaults to [`defaults::DEFAULT_MODEL`].
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Transport performing the actual invocations. Required.
    pub fn transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Interactive recovery hooks; defaults to headless abstain/decline.
    pub fn recovery_hooks(mut self, hooks: Arc<dyn RecoveryHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn flow_config(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    pub fn limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Render sink for streamed output; defaults to a discarding sink.
    pub fn render_sink(mut self, sink: Box<dyn RenderSink + Send>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<ChatSession, ChatError> {
        let transport = self.transport.ok_or_else(|| {
            ChatError::ConfigurationError("a transport is required".to_string())
        })?;
        let catalog = self.catalog.unwrap_or_else(ModelCatalog::builtin);
        let model = self.model.unwrap_or_else(|| defaults::DEFAULT_MODEL.to_string());
        let state = SessionState::new(&catalog, &model, self.limits)?;

        let mut retry = RetryExecutor::new(self.retry_policy);
        if let Some(hooks) = self.hooks {
            retry = retry.with_hooks(hooks);
        }

        Ok(ChatSession {
            state,
            catalog,
            transport,
            retry,
            flow: self.flow,
            sink: self.sink.unwrap_or_else(|| Box::new(NullSink)),
            last_usage: None,
        })
    }
}

/// An interactive conversation against a hosted completion service.
///
/// One request is in flight per turn; nothing here is shared across
/// conversations.
pub struct ChatSession {
    state: SessionState,
    catalog: ModelCatalog,
    transport: Arc<dyn ChatTransport>,
    retry: RetryExecutor,
    flow: FlowConfig,
    sink: Box<dyn RenderSink + Send>,
    last_usage: Option<Usage>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("state", &self.state)
            .field("catalog", &self.catalog)
            .field("flow", &self.flow)
            .field("last_usage", &self.last_usage)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }

    /// Submits one user turn and resolves it to a reply.
    ///
    /// The streaming flag on the session decides whether the transport is
    /// driven through the flow controller or asked for a complete response.
    /// On a mid-stream failure, text received so far is folded into history
    /// before the error is surfaced.
    pub async fn submit_turn(&mut self, text: impl Into<String>) -> Result<TurnReply, ChatError> {
        self.state.append_message(Message::user(text));
        let composed = compose_request(&self.state);
        for warning in &composed.warnings {
            let CapabilityWarning::Unsupported { feature, details } = warning;
            warn!(
                feature = %feature,
                details = details.as_deref().unwrap_or(""),
                "capability downgraded for this request"
            );
        }
        if composed.request.stream {
            self.stream_turn(composed.request).await
        } else {
            self.complete_turn(composed.request).await
        }
    }

    async fn complete_turn(&mut self, request: ChatRequest) -> Result<TurnReply, ChatError> {
        let transport = Arc::clone(&self.transport);
        let response = self
            .retry
            .execute_with_recovery(transport.as_ref(), || transport.complete(&request))
            .await?;

        self.last_usage = response.usage;

        if response.has_tool_calls() {
            // Tool calls go back to the caller unresolved; history is not
            // folded until a real assistant message exists.
            return Ok(TurnReply::ToolCalls(response.tool_calls.unwrap_or_default()));
        }

        let content = response.content.unwrap_or_default();
        let mut reply = Message::assistant(content.clone());
        if let Some(reasoning) = response.reasoning {
            reply = reply.with_reasoning(reasoning);
        }
        self.state.append_message(reply);
        self.state.record_turn();
        Ok(TurnReply::Text(content))
    }

    async fn stream_turn(&mut self, request: ChatRequest) -> Result<TurnReply, ChatError> {
        let transport = Arc::clone(&self.transport);
        let fragments = self
            .retry
            .execute_with_recovery(transport.as_ref(), || transport.stream(&request))
            .await?;

        let controller = FlowController::new(self.flow.clone(), self.sink.as_mut());
        let result = controller.consume(fragments).await;

        match result {
            Ok(outcome) => {
                self.last_usage = outcome.usage;
                self.state
                    .append_message(Message::assistant(outcome.text.clone()));
                self.state.record_turn();
                Ok(TurnReply::Text(outcome.text))
            }
            Err(aborted) => {
                self.last_usage = aborted.usage;
                if !aborted.partial.is_empty() {
                    debug!(
                        chars = aborted.partial.chars().count(),
                        "stream aborted, folding partial text"
                    );
                    self.state.append_message(Message::assistant(aborted.partial));
                }
                Err(aborted.error)
            }
        }
    }

    /// Sets a named sampling parameter.
    ///
    /// Recognized names: `temperature`, `top_p`, `frequency_penalty`,
    /// `presence_penalty`, `max_tokens`. Validation failures leave state
    /// untouched.
    pub fn configure(&mut self, name: &str, value: f64) -> Result<(), ChatError> {
        match name {
            "temperature" => self.state.set_temperature(value),
            "top_p" => self.state.set_top_p(value),
            "frequency_penalty" => self.state.set_frequency_penalty(value),
            "presence_penalty" => self.state.set_presence_penalty(value),
            "max_tokens" => self.state.set_max_tokens(value as u32),
            _ => Err(ChatError::InvalidParameter(format!(
                "unknown parameter '{name}'"
            ))),
        }
    }

    /// Switches the active model via the capability catalog.
    pub fn switch_model(&mut self, id: &str) -> Result<(), ChatError> {
        self.state.switch_model(&self.catalog, id)
    }

    /// Snapshot of the conversation history.
    pub fn history(&self) -> &[Message] {
        self.state.messages()
    }

    /// Token usage of the last completed invocation.
    pub fn last_usage(&self) -> Option<Usage> {
        self.last_usage
    }

    pub fn model(&self) -> &str {
        self.state.model()
    }

    pub fn flags(&self) -> ModeFlags {
        self.state.flags()
    }

    /// Read-only view of the underlying session state.
    pub fn session(&self) -> &SessionState {
        &self.state
    }

    pub fn set_system_message(&mut self, content: impl Into<String>) {
        self.state.set_system_message(content);
    }

    pub fn clear_history(&mut self) {
        self.state.clear_history();
    }

    pub fn set_streaming(&mut self, on: bool) -> Result<(), ChatError> {
        self.state.set_streaming(on)
    }

    /// Toggles JSON output mode, swapping the default system message for a
    /// JSON-directive one while the mode is active.
    pub fn set_json_mode(&mut self, on: bool) -> Result<(), ChatError> {
        self.state.set_json_mode(on)?;
        if on {
            self.state.set_system_message(defaults::JSON_SYSTEM_PROMPT);
        } else {
            self.state.set_system_message(defaults::DEFAULT_SYSTEM_PROMPT);
        }
        Ok(())
    }

    pub fn set_prefix_mode(&mut self, on: bool) -> Result<(), ChatError> {
        self.state.set_prefix_mode(on)
    }

    pub fn set_beta_mode(&mut self, on: bool) {
        self.state.set_beta_mode(on);
    }

    pub fn set_temperature_preset(&mut self, name: &str) -> Result<(), ChatError> {
        self.state.set_temperature_preset(name)
    }

    pub fn register_tool(&mut self, spec: ToolSpec) -> Result<(), ChatError> {
        self.state.register_tool(spec)
    }

    pub fn clear_tools(&mut self) {
        self.state.clear_tools();
    }

    pub fn add_stop_sequence(&mut self, sequence: impl Into<String>) -> Result<(), ChatError> {
        self.state.add_stop_sequence(sequence)
    }

    pub fn clear_stop_sequences(&mut self) {
        self.state.clear_stop_sequences();
    }
}
