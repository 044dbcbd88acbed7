//! Session configuration.
//!
//! Deserializable shape handed to [`crate::Session::new`]. Reading it from
//! a file or request body is the caller's job; the facade only validates
//! cross-references (turn order, profile bindings) at startup.

use std::collections::HashMap;

use chronicle_core::actor::Actor;
use chronicle_pipeline::{DEFAULT_MAX_TOOL_ITERATIONS, GeneratorProfile};
use serde::Deserialize;
use serde_json::Value;

fn default_initial_state() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

fn default_max_tool_iterations() -> usize {
    DEFAULT_MAX_TOOL_ITERATIONS
}

/// Everything needed to start one session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Display name.
    pub name: String,
    /// Initial state tree; defaults to an empty object.
    #[serde(default = "default_initial_state")]
    pub initial_state: Value,
    /// The actor roster.
    pub actors: Vec<Actor>,
    /// Turn order by actor id. Must reference roster actors.
    pub turn_order: Vec<String>,
    /// Halt progression when a human actor's turn comes up.
    #[serde(default = "default_true")]
    pub stop_before_human: bool,
    /// Resume progression after a human actor posts a message.
    #[serde(default = "default_true")]
    pub continue_after_human: bool,
    /// Generator profiles available to this session.
    #[serde(default)]
    pub profiles: Vec<GeneratorProfile>,
    /// Initial actor-to-profile bindings.
    #[serde(default)]
    pub bindings: HashMap<String, String>,
    /// Bound on generator tool-call rounds per turn.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: SessionConfig = serde_json::from_value(json!({
            "name": "midnight-express",
            "actors": [
                { "id": "gm", "name": "Keeper", "role": "gm", "control": "generated" }
            ],
            "turn_order": ["gm"]
        }))
        .unwrap();

        assert_eq!(config.initial_state, json!({}));
        assert!(config.stop_before_human);
        assert!(config.continue_after_human);
        assert_eq!(config.max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_full_config_round_trips() {
        let config: SessionConfig = serde_json::from_value(json!({
            "name": "midnight-express",
            "initial_state": { "scene": "platform 9" },
            "actors": [
                { "id": "gm", "name": "Keeper", "role": "gm", "control": "generated" },
                { "id": "ranger", "name": "Rook", "role": "player", "control": "human" }
            ],
            "turn_order": ["gm", "ranger"],
            "stop_before_human": false,
            "profiles": [
                { "id": "narrator", "provider": "local", "model": "large", "temperature": 0.8 }
            ],
            "bindings": { "gm": "narrator" },
            "max_tool_iterations": 4
        }))
        .unwrap();

        assert_eq!(config.turn_order.len(), 2);
        assert!(!config.stop_before_human);
        assert_eq!(config.bindings["gm"], "narrator");
        assert_eq!(config.profiles[0].temperature, Some(0.8));
        assert_eq!(config.max_tool_iterations, 4);
    }
}
