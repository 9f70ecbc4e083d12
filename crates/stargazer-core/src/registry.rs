//! The set of registered levels and their capabilities.

use std::collections::BTreeMap;

use stargazer_types::LevelId;

use crate::config::{LevelDefinition, LevelsConfig};

/// Registered levels, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRegistry {
    levels: BTreeMap<LevelId, LevelDefinition>,
    default_level: LevelId,
}

impl LevelRegistry {
    /// Build a registry from configuration.
    pub fn from_config(config: &LevelsConfig) -> Self {
        Self::new(config.registry.iter().cloned(), config.default_level.clone())
    }

    /// Build a registry from explicit definitions.
    pub fn new(levels: impl IntoIterator<Item = LevelDefinition>, default_level: LevelId) -> Self {
        Self {
            levels: levels
                .into_iter()
                .map(|level| (level.id.clone(), level))
                .collect(),
            default_level,
        }
    }

    /// Whether `level` is registered.
    pub fn is_registered(&self, level: &LevelId) -> bool {
        self.levels.contains_key(level)
    }

    /// Whether stars can be selected while `level` is active.
    /// Unregistered levels never support selection.
    pub fn supports_selection(&self, level: &LevelId) -> bool {
        self.levels
            .get(level)
            .is_some_and(|definition| definition.supports_selection)
    }

    /// Look up a level definition.
    pub fn get(&self, level: &LevelId) -> Option<&LevelDefinition> {
        self.levels.get(level)
    }

    /// The level fresh sessions start on.
    pub const fn default_level(&self) -> &LevelId {
        &self.default_level
    }

    /// Iterate registered level ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &LevelId> {
        self.levels.keys()
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::from_config(&LevelsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_selection_levels() {
        let registry = LevelRegistry::default();
        assert!(registry.is_registered(&LevelId::new("observatory")));
        assert!(registry.supports_selection(&LevelId::new("observatory")));
        assert!(registry.is_registered(&LevelId::new("miranda")));
        assert!(!registry.supports_selection(&LevelId::new("miranda")));
        assert!(!registry.supports_selection(&LevelId::new("atlantis")));
        assert_eq!(registry.default_level(), &LevelId::new("observatory"));
    }

    #[test]
    fn ids_are_sorted() {
        let registry = LevelRegistry::default();
        let ids: Vec<&str> = registry.ids().map(LevelId::as_str).collect();
        assert_eq!(ids, vec!["forest", "miranda", "observatory", "planetarium"]);
    }
}
