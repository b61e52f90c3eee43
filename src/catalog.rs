//! Capability catalog: per-model feature and limit profiles.
//!
//! Provider differences are data, not code branches: every model is described
//! by the same [`ModelProfile`] shape, and the composer consults the profile
//! rather than matching on model names. A lookup miss is an error — there is
//! no silent default profile.

use std::collections::HashMap;

use crate::error::ChatError;

/// Fixed feature/limit descriptor for one model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Context window in tokens.
    pub context_length: u32,
    /// Output token ceiling.
    pub max_output_tokens: u32,
    /// Raised output ceiling available on beta endpoints, if any.
    pub beta_max_output: Option<u32>,
    /// Whether temperature/top-p/penalty fields are honored.
    pub sampling: bool,
    /// Whether function/tool calling is honored.
    pub tools: bool,
    /// Whether JSON-constrained output is honored.
    pub json_output: bool,
    /// Whether assistant-prefix continuation is honored.
    pub prefix: bool,
    /// Whether incremental responses are honored.
    pub streaming: bool,
}

impl ModelProfile {
    /// A profile with the given limits and every feature disabled.
    pub const fn new(context_length: u32, max_output_tokens: u32) -> Self {
        Self {
            context_length,
            max_output_tokens,
            beta_max_output: None,
            sampling: false,
            tools: false,
            json_output: false,
            prefix: false,
            streaming: false,
        }
    }

    pub const fn with_sampling(mut self) -> Self {
        self.sampling = true;
        self
    }

    pub const fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub const fn with_prefix(mut self) -> Self {
        self.prefix = true;
        self
    }

    pub const fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub const fn with_beta_max_output(mut self, limit: u32) -> Self {
        self.beta_max_output = Some(limit);
        self
    }

    /// Output ceiling in effect for the given beta flag.
    pub fn effective_max_output(&self, beta: bool) -> u32 {
        if beta {
            self.beta_max_output.unwrap_or(self.max_output_tokens)
        } else {
            self.max_output_tokens
        }
    }
}

/// Read-only map from model identifier to [`ModelProfile`].
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, ModelProfile>,
}

impl ModelCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the hosted DeepSeek model family.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            "deepseek-chat",
            ModelProfile::new(64_000, 4_096)
                .with_beta_max_output(8_192)
                .with_sampling()
                .with_tools()
                .with_json_output()
                .with_prefix()
                .with_streaming(),
        );
        catalog.register(
            "deepseek-coder",
            ModelProfile::new(64_000, 4_096)
                .with_beta_max_output(8_192)
                .with_sampling()
                .with_tools()
                .with_json_output()
                .with_prefix()
                .with_streaming(),
        );
        // The reasoning model ignores sampling parameters and does not
        // honor tool calling or JSON-constrained output.
        catalog.register(
            "deepseek-reasoner",
            ModelProfile::new(64_000, 8_192)
                .with_prefix()
                .with_streaming(),
        );
        catalog
    }

    /// Registers or replaces a profile.
    pub fn register(&mut self, id: impl Into<String>, profile: ModelProfile) {
        self.models.insert(id.into(), profile);
    }

    /// Looks up a profile; an unknown identifier is an error.
    pub fn get(&self, id: &str) -> Result<&ModelProfile, ChatError> {
        self.models
            .get(id)
            .ok_or_else(|| ChatError::UnknownModel(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Registered model identifiers, unordered.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
