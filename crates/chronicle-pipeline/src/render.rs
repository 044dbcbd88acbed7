//! Context rendering via `minijinja`.
//!
//! Rendering is pure: the same snapshot, actor, history, and tool specs
//! always produce the same [`GeneratorRequest`]. The system prompt comes
//! from a per-role template; operators can replace a role's template
//! without recompiling.

use chronicle_core::actor::{Actor, ActorRole};
use chronicle_core::generator::{ChatMessage, GeneratorRequest, ToolSpec};
use chronicle_engine::Snapshot;
use minijinja::Environment;
use serde_json::json;

use crate::error::TurnError;

const GM_TEMPLATE: &str = "\
You are {{ actor.name }}, the game master of a tabletop session.
{% if actor.description %}{{ actor.description }}
{% endif %}\
Narrate the world, adjudicate declared actions, and keep the story moving.
Use the available tools for dice rolls and state changes; never alter
state by narration alone.

Current turn: {{ turn }}.
Session state:
{{ state_json }}";

const PLAYER_TEMPLATE: &str = "\
You are {{ actor.name }}, a player character in a tabletop session.
{% if actor.persona %}{{ actor.persona }}
{% endif %}\
{% if actor.description %}{{ actor.description }}
{% endif %}\
Act only as your character. Declare actions; the game master adjudicates.

Current turn: {{ turn }}.
Session state:
{{ state_json }}";

const NPC_TEMPLATE: &str = "\
You are {{ actor.name }}, a non-player character in a tabletop session.
{% if actor.persona %}{{ actor.persona }}
{% endif %}\
Stay in character and react to the scene. Keep replies brief.

Current turn: {{ turn }}.
Session state:
{{ state_json }}";

fn role_key(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Gm => "gm",
        ActorRole::Player => "player",
        ActorRole::Npc => "npc",
    }
}

/// Renders an actor's system prompt and assembles the generator request.
pub struct ContextRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for ContextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRenderer").finish_non_exhaustive()
    }
}

impl ContextRenderer {
    /// Creates a renderer with the built-in per-role templates.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Template`] if a built-in template fails to
    /// parse; this indicates a packaging defect.
    pub fn new() -> Result<Self, TurnError> {
        let mut env = Environment::new();
        env.add_template("gm", GM_TEMPLATE)
            .map_err(|e| TurnError::Template(format!("gm template: {e}")))?;
        env.add_template("player", PLAYER_TEMPLATE)
            .map_err(|e| TurnError::Template(format!("player template: {e}")))?;
        env.add_template("npc", NPC_TEMPLATE)
            .map_err(|e| TurnError::Template(format!("npc template: {e}")))?;
        Ok(Self { env })
    }

    /// Replaces the template used for one role.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Template`] if the source fails to parse; the
    /// previous template is kept in that case.
    pub fn set_role_template(&mut self, role: ActorRole, source: String) -> Result<(), TurnError> {
        self.env
            .add_template_owned(role_key(role), source)
            .map_err(|e| TurnError::Template(format!("{} template: {e}", role_key(role))))
    }

    /// Renders the full request for one actor turn.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Template`] if the role template fails to
    /// render against this context.
    pub fn render(
        &self,
        actor: &Actor,
        snapshot: &Snapshot,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<GeneratorRequest, TurnError> {
        let state_json = serde_json::to_string_pretty(&snapshot.tree)
            .map_err(|e| TurnError::Template(format!("state serialization: {e}")))?;
        let context = json!({
            "actor": actor,
            "turn": snapshot.current_turn,
            "state_json": state_json,
        });

        let system_prompt = self
            .env
            .get_template(role_key(actor.role))
            .map_err(|e| TurnError::Template(format!("missing role template: {e}")))?
            .render(&context)
            .map_err(|e| TurnError::Template(format!("render failed: {e}")))?;

        Ok(GeneratorRequest {
            system_prompt,
            messages: history.to_vec(),
            tools: tools.to_vec(),
        })
    }
}
