//! Generator profiles and per-actor bindings.
//!
//! A profile names a backend configuration (provider, model, sampling
//! parameters). Actors are bound to profiles by id; bindings are
//! session-scoped overlays and never enter the event log, so changing a
//! binding mid-session does not invalidate history.

use std::collections::HashMap;

use chronicle_core::generator::GeneratorIdentity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named generator backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorProfile {
    /// Unique profile identifier.
    pub id: String,
    /// Provider name (e.g. a vendor or a local runtime).
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature, if the backend supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Response token cap, if the backend supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GeneratorProfile {
    /// The identity reported on turns produced under this profile.
    #[must_use]
    pub fn identity(&self) -> GeneratorIdentity {
        GeneratorIdentity {
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }
}

/// Errors from profile registration and binding.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The named profile is not registered.
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

/// Registry of profiles plus the actor-to-profile binding overlay.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, GeneratorProfile>,
    bindings: HashMap<String, String>,
    default_profile: Option<String>,
}

impl ProfileRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile, replacing any existing profile with the same
    /// id. The first registered profile becomes the default.
    pub fn add(&mut self, profile: GeneratorProfile) {
        if self.default_profile.is_none() {
            self.default_profile = Some(profile.id.clone());
        }
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Marks the named profile as the fallback for unbound actors.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownProfile`] if no such profile exists.
    pub fn set_default(&mut self, profile_id: &str) -> Result<(), ProfileError> {
        if !self.profiles.contains_key(profile_id) {
            return Err(ProfileError::UnknownProfile(profile_id.to_owned()));
        }
        self.default_profile = Some(profile_id.to_owned());
        Ok(())
    }

    /// Binds an actor to a profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::UnknownProfile`] if no such profile exists;
    /// the existing binding, if any, is kept.
    pub fn bind(&mut self, actor_id: &str, profile_id: &str) -> Result<(), ProfileError> {
        if !self.profiles.contains_key(profile_id) {
            return Err(ProfileError::UnknownProfile(profile_id.to_owned()));
        }
        self.bindings.insert(actor_id.to_owned(), profile_id.to_owned());
        Ok(())
    }

    /// Removes an actor's binding, returning it to the default profile.
    pub fn unbind(&mut self, actor_id: &str) {
        self.bindings.remove(actor_id);
    }

    /// The profile id an actor is explicitly bound to, if any.
    #[must_use]
    pub fn binding_for(&self, actor_id: &str) -> Option<&str> {
        self.bindings.get(actor_id).map(String::as_str)
    }

    /// Resolves the profile for an actor: explicit binding first, then the
    /// default profile.
    #[must_use]
    pub fn resolve(&self, actor_id: &str) -> Option<&GeneratorProfile> {
        let profile_id = self
            .bindings
            .get(actor_id)
            .or(self.default_profile.as_ref())?;
        self.profiles.get(profile_id)
    }

    /// Looks up a profile by id.
    #[must_use]
    pub fn get(&self, profile_id: &str) -> Option<&GeneratorProfile> {
        self.profiles.get(profile_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, model: &str) -> GeneratorProfile {
        GeneratorProfile {
            id: id.to_owned(),
            provider: "local".to_owned(),
            model: model.to_owned(),
            temperature: Some(0.7),
            max_tokens: None,
        }
    }

    #[test]
    fn test_resolve_prefers_explicit_binding() {
        let mut registry = ProfileRegistry::new();
        registry.add(profile("narrator", "large"));
        registry.add(profile("sidekick", "small"));
        registry.bind("goblin", "sidekick").unwrap();

        let resolved = registry.resolve("goblin").unwrap();

        assert_eq!(resolved.model, "small");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut registry = ProfileRegistry::new();
        registry.add(profile("narrator", "large"));

        let resolved = registry.resolve("gm").unwrap();

        assert_eq!(resolved.id, "narrator");
    }

    #[test]
    fn test_bind_to_unknown_profile_is_rejected() {
        let mut registry = ProfileRegistry::new();
        registry.add(profile("narrator", "large"));
        registry.bind("gm", "narrator").unwrap();

        let result = registry.bind("gm", "missing");

        assert!(matches!(result.unwrap_err(), ProfileError::UnknownProfile(_)));
        // The prior binding survives.
        assert_eq!(registry.binding_for("gm"), Some("narrator"));
    }

    #[test]
    fn test_unbind_returns_actor_to_default() {
        let mut registry = ProfileRegistry::new();
        registry.add(profile("narrator", "large"));
        registry.add(profile("sidekick", "small"));
        registry.bind("gm", "sidekick").unwrap();

        registry.unbind("gm");

        assert_eq!(registry.resolve("gm").unwrap().id, "narrator");
        assert!(registry.binding_for("gm").is_none());
    }

    #[test]
    fn test_profile_identity_display() {
        let identity = profile("narrator", "large").identity();

        assert_eq!(identity.to_string(), "local/large");
    }
}
