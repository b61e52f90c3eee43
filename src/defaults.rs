//! Default limits, prompts, and tuning constants.
//!
//! Everything here is a plain constant consumed through the explicit
//! configuration structs (`SessionLimits`, `RetryPolicy`, `FlowConfig`);
//! there is no module-level mutable state.

/// Model selected when a session is created without an explicit choice.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// System message installed when a session starts.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// System message installed while JSON output mode is active.
pub const JSON_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Please provide all responses in valid JSON format.";

/// Session-level output token ceiling before a model switch recalculates it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Messages kept in history before the oldest non-system entries are trimmed.
pub const MAX_HISTORY_LENGTH: usize = 100;

/// Registered tool definitions accepted per session.
pub const MAX_TOOLS: usize = 128;

/// Stop sequences accepted per session.
pub const MAX_STOP_SEQUENCES: usize = 16;

/// Retry attempts per invocation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Backoff delay ceiling in milliseconds.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 16_000;

/// Named temperature presets for common use cases.
///
/// Returns `None` for an unknown preset name.
pub fn temperature_preset(name: &str) -> Option<f64> {
    match name {
        "coding" => Some(0.0),
        "data" => Some(1.0),
        "chat" => Some(1.3),
        "translation" => Some(1.3),
        "creative" => Some(1.5),
        _ => None,
    }
}

/// Names of the available temperature presets, for error messages.
pub const TEMPERATURE_PRESET_NAMES: &[&str] =
    &["coding", "data", "chat", "translation", "creative"];
