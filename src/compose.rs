//! Capability-aware request composition.
//!
//! [`compose_request`] turns the current session state into a provider
//! request descriptor, consulting the active model's profile for every
//! optional field. It never mutates the session: the prefix rewrite is
//! applied to the outgoing copy of the messages only, freshly on every call.

use tracing::debug;

use crate::session::SessionState;
use crate::types::{ChatRequest, Message, MessageRole, ResponseFormat, Tool};

/// Non-fatal downgrade applied during composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityWarning {
    /// A requested feature was dropped because the model does not honor it.
    Unsupported {
        feature: String,
        details: Option<String>,
    },
}

/// A composed request plus any non-fatal capability warnings.
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    pub request: ChatRequest,
    pub warnings: Vec<CapabilityWarning>,
}

/// Builds the provider request for the session's next invocation.
///
/// - Sampling fields are omitted wholesale when the model ignores them; the
///   stored values stay inert in session state.
/// - The JSON directive is attached when the flag is set. The flag can only
///   be set on a JSON-capable model, so no check is repeated here.
/// - Tools are attached when supported, otherwise dropped with a warning.
/// - With prefix mode on, a trailing user message goes out as an assistant
///   continuation prefix; history keeps the original user message until the
///   real assistant reply replaces it.
pub fn compose_request(state: &SessionState) -> ComposedRequest {
    let profile = state.profile();
    let flags = state.flags();
    let mut warnings = Vec::new();

    let mut messages = state.messages().to_vec();
    if flags.prefix_mode
        && let Some(last) = messages.last_mut()
        && last.role == MessageRole::User
    {
        *last = continuation_prefix(last);
    }

    let params = state.params();
    let (temperature, top_p, frequency_penalty, presence_penalty) = if profile.sampling {
        (
            Some(params.temperature),
            Some(params.top_p),
            Some(params.frequency_penalty),
            Some(params.presence_penalty),
        )
    } else {
        (None, None, None, None)
    };

    let response_format = flags.json_mode.then_some(ResponseFormat::JsonObject);

    let tools = if state.tools().is_empty() {
        None
    } else if profile.tools {
        Some(
            state
                .tools()
                .iter()
                .cloned()
                .map(Tool::function)
                .collect::<Vec<_>>(),
        )
    } else {
        debug!(
            model = state.model(),
            count = state.tools().len(),
            "tool definitions dropped, model does not honor tools"
        );
        warnings.push(CapabilityWarning::Unsupported {
            feature: "tools".to_string(),
            details: Some(format!(
                "{} registered tool definition(s) omitted",
                state.tools().len()
            )),
        });
        None
    };

    let stop = if state.stop_sequences().is_empty() {
        None
    } else {
        Some(state.stop_sequences().to_vec())
    };

    let request = ChatRequest {
        model: state.model().to_string(),
        messages,
        stream: flags.streaming,
        max_tokens: state
            .max_tokens()
            .min(profile.effective_max_output(flags.beta_mode)),
        temperature,
        top_p,
        frequency_penalty,
        presence_penalty,
        response_format,
        tools,
        stop,
    };

    ComposedRequest { request, warnings }
}

fn continuation_prefix(message: &Message) -> Message {
    let mut rewritten = Message::assistant(message.content.clone());
    rewritten.prefix = true;
    rewritten
}
