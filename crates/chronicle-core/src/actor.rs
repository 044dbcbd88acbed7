//! Actor descriptors.
//!
//! Actors are static for the session lifetime. Generator profile bindings
//! are session-scoped overlays keyed by actor id and are not part of the
//! event log.

use serde::{Deserialize, Serialize};

/// The role an actor plays in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Game master: narrates, controls the world.
    Gm,
    /// Player character.
    Player,
    /// Non-player character.
    Npc,
}

/// Who drives the actor's turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorControl {
    /// A human authors this actor's messages out of band.
    Human,
    /// The generation pipeline drives this actor.
    Generated,
}

/// An actor participating in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Unique actor identifier (stable within the session).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role within the session.
    pub role: ActorRole,
    /// Control type.
    pub control: ActorControl,
    /// Free-form description shown to generators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Persona / background notes for generated actors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl Actor {
    /// Returns true when the actor is human-controlled.
    #[must_use]
    pub fn is_human(&self) -> bool {
        self.control == ActorControl::Human
    }
}
