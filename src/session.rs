//! Session state: conversation history, sampling parameters, registered
//! tools, stop sequences, and mode flags.
//!
//! All mutation goes through the operations defined here. Setters validate
//! their domain and reject without touching state; history appends trim the
//! oldest non-system messages once the cap is reached, keeping the system
//! message pinned at position 0.

use tracing::{debug, warn};

use crate::catalog::{ModelCatalog, ModelProfile};
use crate::defaults;
use crate::error::ChatError;
use crate::types::{Message, SamplingParams, ToolSpec};

/// Per-session caps, independent per instance so multiple sessions can run
/// with different tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Maximum messages kept in history.
    pub max_history: usize,
    /// Maximum registered tool definitions.
    pub max_tools: usize,
    /// Maximum stop sequences.
    pub max_stop_sequences: usize,
    /// Output token ceiling before the first model switch recalculates it.
    pub default_max_tokens: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_history: defaults::MAX_HISTORY_LENGTH,
            max_tools: defaults::MAX_TOOLS,
            max_stop_sequences: defaults::MAX_STOP_SEQUENCES,
            default_max_tokens: defaults::DEFAULT_MAX_TOKENS,
        }
    }
}

impl SessionLimits {
    pub const fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub const fn with_max_tools(mut self, max_tools: usize) -> Self {
        self.max_tools = max_tools;
        self
    }

    pub const fn with_max_stop_sequences(mut self, max_stop_sequences: usize) -> Self {
        self.max_stop_sequences = max_stop_sequences;
        self
    }

    pub const fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }
}

/// Mode flags toggled by the embedding application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub streaming: bool,
    pub json_mode: bool,
    pub prefix_mode: bool,
    pub beta_mode: bool,
}

/// Conversation state for one session.
///
/// Exclusively owned by the session; the composer and the flow controller
/// only touch it through the operations below.
#[derive(Debug, Clone)]
pub struct SessionState {
    messages: Vec<Message>,
    model: String,
    profile: ModelProfile,
    params: SamplingParams,
    stop_sequences: Vec<String>,
    tools: Vec<ToolSpec>,
    flags: ModeFlags,
    max_tokens: u32,
    turn: u32,
    limits: SessionLimits,
}

impl SessionState {
    /// Creates a session on the given model with the default system message
    /// installed.
    pub fn new(
        catalog: &ModelCatalog,
        model: &str,
        limits: SessionLimits,
    ) -> Result<Self, ChatError> {
        let profile = *catalog.get(model)?;
        Ok(Self {
            messages: vec![Message::system(defaults::DEFAULT_SYSTEM_PROMPT)],
            model: model.to_string(),
            profile,
            params: SamplingParams::default(),
            stop_sequences: Vec::new(),
            tools: Vec::new(),
            flags: ModeFlags::default(),
            max_tokens: limits.default_max_tokens,
            turn: 0,
            limits,
        })
    }

    // Accessors

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    pub fn stop_sequences(&self) -> &[String] {
        &self.stop_sequences
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    /// Session-configured output token ceiling.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Completed turns since creation or the last `clear_history`.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    // History

    /// Inserts or overwrites the singleton system message at position 0.
    pub fn set_system_message(&mut self, content: impl Into<String>) {
        match self.messages.first_mut() {
            Some(first) if first.is_system() => first.content = content.into(),
            _ => self.messages.insert(0, Message::system(content)),
        }
    }

    /// Appends a message, then trims the oldest non-system entries past the
    /// history cap.
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
        self.trim_history();
    }

    /// Resets history to just the system message (if one exists) and zeroes
    /// the turn counter.
    pub fn clear_history(&mut self) {
        self.messages.retain(Message::is_system);
        self.turn = 0;
    }

    /// Marks one turn as completed.
    pub fn record_turn(&mut self) {
        self.turn += 1;
    }

    fn trim_history(&mut self) {
        while self.messages.len() > self.limits.max_history {
            let drop_at = usize::from(self.messages[0].is_system());
            if drop_at >= self.messages.len() {
                break;
            }
            let dropped = self.messages.remove(drop_at);
            debug!(role = ?dropped.role, "history cap reached, dropped oldest message");
        }
    }

    // Model switching

    /// Switches the active model, recalculating the output token ceiling.
    ///
    /// An unknown identifier leaves the session untouched. Sampling
    /// parameters are deliberately left in place even when the new model
    /// ignores them; the composer drops them per-profile. JSON mode cannot
    /// survive a switch to a model without JSON support, so the flag is
    /// cleared with a warning in that case.
    pub fn switch_model(&mut self, catalog: &ModelCatalog, id: &str) -> Result<(), ChatError> {
        let profile = *catalog.get(id)?;
        if self.flags.json_mode && !profile.json_output {
            warn!(model = id, "JSON output not supported, disabling JSON mode");
            self.flags.json_mode = false;
        }
        if self.flags.prefix_mode && !profile.prefix {
            warn!(model = id, "prefix completion not supported, disabling prefix mode");
            self.flags.prefix_mode = false;
        }
        self.model = id.to_string();
        self.profile = profile;
        self.max_tokens = profile.effective_max_output(self.flags.beta_mode);
        Ok(())
    }

    // Sampling parameters

    /// Sets the temperature; valid domain is 0 to 2.
    pub fn set_temperature(&mut self, value: f64) -> Result<(), ChatError> {
        if !(0.0..=2.0).contains(&value) {
            return Err(ChatError::InvalidParameter(format!(
                "temperature must be between 0 and 2, got {value}"
            )));
        }
        self.params.temperature = value;
        Ok(())
    }

    /// Sets the temperature from a named preset.
    pub fn set_temperature_preset(&mut self, name: &str) -> Result<(), ChatError> {
        let value = defaults::temperature_preset(name).ok_or_else(|| {
            ChatError::InvalidParameter(format!(
                "unknown temperature preset '{name}', available: {}",
                defaults::TEMPERATURE_PRESET_NAMES.join(", ")
            ))
        })?;
        self.params.temperature = value;
        Ok(())
    }

    /// Sets top-p; valid domain is 0 to 1.
    pub fn set_top_p(&mut self, value: f64) -> Result<(), ChatError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ChatError::InvalidParameter(format!(
                "top_p must be between 0 and 1, got {value}"
            )));
        }
        self.params.top_p = value;
        Ok(())
    }

    /// Sets the frequency penalty; valid domain is -2 to 2.
    pub fn set_frequency_penalty(&mut self, value: f64) -> Result<(), ChatError> {
        if !(-2.0..=2.0).contains(&value) {
            return Err(ChatError::InvalidParameter(format!(
                "frequency penalty must be between -2 and 2, got {value}"
            )));
        }
        self.params.frequency_penalty = value;
        Ok(())
    }

    /// Sets the presence penalty; valid domain is -2 to 2.
    pub fn set_presence_penalty(&mut self, value: f64) -> Result<(), ChatError> {
        if !(-2.0..=2.0).contains(&value) {
            return Err(ChatError::InvalidParameter(format!(
                "presence penalty must be between -2 and 2, got {value}"
            )));
        }
        self.params.presence_penalty = value;
        Ok(())
    }

    /// Overrides the session output token ceiling.
    pub fn set_max_tokens(&mut self, value: u32) -> Result<(), ChatError> {
        if value == 0 {
            return Err(ChatError::InvalidParameter(
                "max_tokens must be positive".to_string(),
            ));
        }
        self.max_tokens = value;
        Ok(())
    }

    // Tools and stop sequences

    /// Registers a tool definition, up to the session cap.
    pub fn register_tool(&mut self, spec: ToolSpec) -> Result<(), ChatError> {
        if self.tools.len() >= self.limits.max_tools {
            return Err(ChatError::ToolLimitExceeded {
                limit: self.limits.max_tools,
            });
        }
        self.tools.push(spec);
        Ok(())
    }

    pub fn clear_tools(&mut self) {
        self.tools.clear();
    }

    /// Adds a stop sequence, up to the session cap.
    pub fn add_stop_sequence(&mut self, sequence: impl Into<String>) -> Result<(), ChatError> {
        if self.stop_sequences.len() >= self.limits.max_stop_sequences {
            return Err(ChatError::StopSequenceLimitExceeded {
                limit: self.limits.max_stop_sequences,
            });
        }
        self.stop_sequences.push(sequence.into());
        Ok(())
    }

    pub fn clear_stop_sequences(&mut self) {
        self.stop_sequences.clear();
    }

    // Mode flags

    /// Enables or disables streaming; enabling requires model support.
    pub fn set_streaming(&mut self, on: bool) -> Result<(), ChatError> {
        if on && !self.profile.streaming {
            return Err(ChatError::UnsupportedOperation(format!(
                "{} does not support streaming",
                self.model
            )));
        }
        self.flags.streaming = on;
        Ok(())
    }

    /// Enables or disables JSON output mode; enabling requires model support.
    pub fn set_json_mode(&mut self, on: bool) -> Result<(), ChatError> {
        if on && !self.profile.json_output {
            return Err(ChatError::UnsupportedOperation(format!(
                "{} does not support JSON output",
                self.model
            )));
        }
        self.flags.json_mode = on;
        Ok(())
    }

    /// Enables or disables prefix completion; enabling requires beta mode and
    /// model support.
    pub fn set_prefix_mode(&mut self, on: bool) -> Result<(), ChatError> {
        if on && !self.flags.beta_mode {
            return Err(ChatError::UnsupportedOperation(
                "prefix completion requires beta mode".to_string(),
            ));
        }
        if on && !self.profile.prefix {
            return Err(ChatError::UnsupportedOperation(format!(
                "{} does not support prefix completion",
                self.model
            )));
        }
        self.flags.prefix_mode = on;
        Ok(())
    }

    /// Enables or disables beta features, recalculating the output ceiling.
    ///
    /// Prefix mode depends on beta mode and is cleared when beta turns off.
    pub fn set_beta_mode(&mut self, on: bool) {
        self.flags.beta_mode = on;
        if !on && self.flags.prefix_mode {
            warn!("beta mode disabled, prefix mode cleared");
            self.flags.prefix_mode = false;
        }
        self.max_tokens = self.profile.effective_max_output(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(
            &ModelCatalog::builtin(),
            "deepseek-chat",
            SessionLimits::default(),
        )
        .unwrap()
    }

    fn state_with_history_cap(cap: usize) -> SessionState {
        SessionState::new(
            &ModelCatalog::builtin(),
            "deepseek-chat",
            SessionLimits::default().with_max_history(cap),
        )
        .unwrap()
    }

    #[test]
    fn history_never_exceeds_the_cap_and_keeps_system_first() {
        let mut state = state_with_history_cap(5);
        for i in 0..20 {
            state.append_message(Message::user(format!("message {i}")));
        }
        assert_eq!(state.messages().len(), 5);
        assert!(state.messages()[0].is_system());
        // Oldest non-system messages went first.
        assert_eq!(state.messages()[1].content, "message 16");
        assert_eq!(state.messages()[4].content, "message 19");
    }

    #[test]
    fn trim_without_system_message_drops_from_the_front() {
        let mut state = state_with_history_cap(3);
        state.clear_history();
        state.messages.clear(); // no system message at all
        for i in 0..6 {
            state.append_message(Message::user(format!("m{i}")));
        }
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.messages()[0].content, "m3");
    }

    #[test]
    fn set_system_message_upserts_at_position_zero() {
        let mut state = state();
        state.set_system_message("first");
        assert_eq!(state.messages()[0].content, "first");
        state.append_message(Message::user("hi"));
        state.set_system_message("second");
        assert_eq!(state.messages()[0].content, "second");
        assert_eq!(
            state
                .messages()
                .iter()
                .filter(|m| m.is_system())
                .count(),
            1
        );
    }

    #[test]
    fn switch_to_unknown_model_leaves_state_untouched() {
        let catalog = ModelCatalog::builtin();
        let mut state = state();
        state.set_temperature(0.5).unwrap();
        let before = state.clone();

        let err = state.switch_model(&catalog, "deepseek-v9").unwrap_err();
        assert!(matches!(err, ChatError::UnknownModel(_)));
        assert_eq!(state.model(), before.model());
        assert_eq!(state.params(), before.params());
        assert_eq!(state.max_tokens(), before.max_tokens());
    }

    #[test]
    fn switch_recalculates_output_ceiling() {
        let catalog = ModelCatalog::builtin();
        let mut state = state();
        state.switch_model(&catalog, "deepseek-reasoner").unwrap();
        assert_eq!(state.max_tokens(), 8_192);
    }

    #[test]
    fn rejected_setters_do_not_mutate() {
        let mut state = state();
        state.set_temperature(1.5).unwrap();
        let before = *state.params();

        assert!(state.set_temperature(2.5).is_err());
        assert!(state.set_top_p(-0.1).is_err());
        assert!(state.set_frequency_penalty(3.0).is_err());
        assert!(state.set_presence_penalty(-2.1).is_err());
        assert_eq!(*state.params(), before);
    }

    #[test]
    fn sampling_params_survive_switch_to_non_sampling_model() {
        let catalog = ModelCatalog::builtin();
        let mut state = state();
        state.set_temperature(0.2).unwrap();
        state.switch_model(&catalog, "deepseek-reasoner").unwrap();
        // Values stay in state even though the reasoner ignores them...
        assert_eq!(state.params().temperature, 0.2);
        // ...and resurrect when switching back.
        state.switch_model(&catalog, "deepseek-chat").unwrap();
        assert_eq!(state.params().temperature, 0.2);
    }

    #[test]
    fn switching_to_non_json_model_clears_json_mode() {
        let catalog = ModelCatalog::builtin();
        let mut state = state();
        state.set_json_mode(true).unwrap();
        state.switch_model(&catalog, "deepseek-reasoner").unwrap();
        assert!(!state.flags().json_mode);
    }

    #[test]
    fn json_mode_rejected_on_models_without_json_support() {
        let catalog = ModelCatalog::builtin();
        let mut state = state();
        state.switch_model(&catalog, "deepseek-reasoner").unwrap();
        let err = state.set_json_mode(true).unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedOperation(_)));
        assert!(!state.flags().json_mode);
    }

    #[test]
    fn prefix_mode_requires_beta() {
        let mut state = state();
        assert!(state.set_prefix_mode(true).is_err());
        state.set_beta_mode(true);
        state.set_prefix_mode(true).unwrap();
        assert!(state.flags().prefix_mode);
        // Dropping beta clears prefix too.
        state.set_beta_mode(false);
        assert!(!state.flags().prefix_mode);
    }

    #[test]
    fn beta_mode_raises_output_ceiling() {
        let mut state = state();
        let catalog = ModelCatalog::builtin();
        state.switch_model(&catalog, "deepseek-chat").unwrap();
        assert_eq!(state.max_tokens(), 4_096);
        state.set_beta_mode(true);
        assert_eq!(state.max_tokens(), 8_192);
        state.set_beta_mode(false);
        assert_eq!(state.max_tokens(), 4_096);
    }

    #[test]
    fn tool_and_stop_limits_enforced() {
        let mut state = SessionState::new(
            &ModelCatalog::builtin(),
            "deepseek-chat",
            SessionLimits::default()
                .with_max_tools(2)
                .with_max_stop_sequences(2),
        )
        .unwrap();

        let spec = ToolSpec::new("lookup", serde_json::json!({"type": "object"}));
        state.register_tool(spec.clone()).unwrap();
        state.register_tool(spec.clone()).unwrap();
        assert!(matches!(
            state.register_tool(spec),
            Err(ChatError::ToolLimitExceeded { limit: 2 })
        ));

        state.add_stop_sequence("END").unwrap();
        state.add_stop_sequence("STOP").unwrap();
        assert!(matches!(
            state.add_stop_sequence("MORE"),
            Err(ChatError::StopSequenceLimitExceeded { limit: 2 })
        ));

        state.clear_tools();
        state.clear_stop_sequences();
        assert!(state.tools().is_empty());
        assert!(state.stop_sequences().is_empty());
    }

    #[test]
    fn clear_history_keeps_system_and_zeroes_turns() {
        let mut state = state();
        state.append_message(Message::user("hi"));
        state.append_message(Message::assistant("hello"));
        state.record_turn();
        assert_eq!(state.turn(), 1);

        state.clear_history();
        assert_eq!(state.messages().len(), 1);
        assert!(state.messages()[0].is_system());
        assert_eq!(state.turn(), 0);
    }

    #[test]
    fn temperature_presets_apply() {
        let mut state = state();
        state.set_temperature_preset("coding").unwrap();
        assert_eq!(state.params().temperature, 0.0);
        assert!(state.set_temperature_preset("poetry").is_err());
        assert_eq!(state.params().temperature, 0.0);
    }
}
