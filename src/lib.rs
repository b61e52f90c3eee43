//! kaiwa
//!
//! Session state, capability-aware request composition, classified retry,
//! and streaming flow control for hosted LLM chat completion services.
//!
//! The crate owns the conversation: an append-only, capped message history,
//! sampling parameters, registered tools, stop sequences, and mode flags.
//! Each turn it composes a provider request that respects the active model's
//! [`ModelProfile`](catalog::ModelProfile), executes it through a
//! classification-driven retry engine, and renders streamed output through a
//! bounded display window before folding the full text back into history.
//!
//! The network itself stays outside: implement
//! [`ChatTransport`](transport::ChatTransport) for your wire protocol and
//! hand it to the session.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kaiwa::prelude::*;
//!
//! # async fn example(transport: Arc<dyn ChatTransport>) -> Result<(), ChatError> {
//! let mut session = ChatSession::builder()
//!     .transport(transport)
//!     .model("deepseek-chat")
//!     .build()?;
//!
//! session.configure("temperature", 0.7)?;
//! match session.submit_turn("Hello!").await? {
//!     TurnReply::Text(text) => println!("{text}"),
//!     TurnReply::ToolCalls(calls) => println!("{} tool call(s)", calls.len()),
//! }
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod compose;
pub mod defaults;
pub mod error;
pub mod retry;
pub mod session;
pub mod stream;
pub mod transport;
pub mod types;

pub use error::{ChatError, ErrorCategory, classify_status};

/// Common imports for embedding applications.
pub mod prelude {
    pub use crate::catalog::{ModelCatalog, ModelProfile};
    pub use crate::client::{ChatSession, ChatSessionBuilder};
    pub use crate::compose::{CapabilityWarning, ComposedRequest, compose_request};
    pub use crate::error::{ChatError, ErrorCategory};
    pub use crate::retry::{NoninteractiveHooks, RecoveryHooks, RetryExecutor, RetryPolicy};
    pub use crate::session::{ModeFlags, SessionLimits, SessionState};
    pub use crate::stream::{
        FlowConfig, FlowController, NullSink, RenderSink, StreamOutcome,
    };
    pub use crate::transport::ChatTransport;
    pub use crate::types::{
        ChatRequest, ChatResponse, FragmentStream, Message, MessageRole, SamplingParams,
        StreamEvent, Tool, ToolCall, ToolSpec, TurnReply, Usage,
    };
}
