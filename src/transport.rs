//! Abstract transport contract.
//!
//! The session core never talks HTTP. A [`ChatTransport`] implementation
//! owns the wire protocol and credential storage; it receives the composed
//! [`ChatRequest`](crate::types::ChatRequest) and yields either a complete
//! response or a fragment stream, raising classified
//! [`ChatError`](crate::error::ChatError)s on failure (see
//! [`classify_status`](crate::error::classify_status)).

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ChatError;
use crate::types::{ChatRequest, ChatResponse, FragmentStream};

/// One network invocation boundary.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Performs a complete (non-streaming) invocation.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;

    /// Opens an incremental invocation, yielding content fragments in order,
    /// at most once each.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, ChatError>;

    /// Installs a replacement credential, as offered by the retry engine's
    /// interactive recovery path.
    ///
    /// Transports without rotating credentials keep the default.
    async fn update_credential(&self, _credential: SecretString) -> Result<(), ChatError> {
        Err(ChatError::UnsupportedOperation(
            "transport does not support credential replacement".to_string(),
        ))
    }
}
