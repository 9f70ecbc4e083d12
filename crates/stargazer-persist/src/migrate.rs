//! Ordered schema migrations for save records.
//!
//! Each step upgrades a snapshot value by exactly one version. Loading an
//! old record runs every step from its version up to
//! [`CURRENT_SCHEMA_VERSION`] in order.
//!
//! | From | To | Change |
//! |------|----|--------|
//! | 1 | 2 | `stats.discoveries` renamed to `stats.starsDiscovered` |
//! | 2 | 3 | `collectedItems`, `visitedLevels`, `settings.fieldOfView` added |

use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::MigrationError;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Field-of-view given to records saved before the setting existed.
const DEFAULT_FIELD_OF_VIEW: f64 = 75.0;

type Step = fn(&mut Map<String, Value>) -> Result<(), MigrationError>;

/// `(from_version, step)` in application order.
const STEPS: [(u32, Step); 2] = [(1, rename_discoveries), (2, add_exploration_fields)];

/// A snapshot value brought up to the current schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// The upgraded snapshot value.
    pub snapshot: Value,
    /// Version the record was saved with.
    pub from_version: u32,
    /// Whether any step ran.
    pub migrated: bool,
}

/// Upgrade `snapshot` from `version` to [`CURRENT_SCHEMA_VERSION`].
///
/// # Errors
///
/// [`MigrationError::UnsupportedVersion`] for version 0 or anything newer
/// than this build, [`MigrationError::Malformed`] if a step finds an
/// unexpected shape.
pub fn migrate(version: u32, mut snapshot: Value) -> Result<Migrated, MigrationError> {
    if version == 0 || version > CURRENT_SCHEMA_VERSION {
        return Err(MigrationError::UnsupportedVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    let Some(fields) = snapshot.as_object_mut() else {
        return Err(MigrationError::Malformed {
            from: version,
            reason: "snapshot is not an object".to_owned(),
        });
    };

    let mut migrated = false;
    for (from, step) in STEPS {
        if from >= version {
            step(fields)?;
            migrated = true;
            info!(from, to = from.saturating_add(1), "Save record migrated");
        }
    }
    Ok(Migrated {
        snapshot,
        from_version: version,
        migrated,
    })
}

/// Look up an object-valued field, creating it when absent.
fn object_field<'a>(
    fields: &'a mut Map<String, Value>,
    name: &str,
    from: u32,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    fields
        .entry(name)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| MigrationError::Malformed {
            from,
            reason: format!("{name} is not an object"),
        })
}

fn rename_discoveries(fields: &mut Map<String, Value>) -> Result<(), MigrationError> {
    let stats = object_field(fields, "stats", 1)?;
    if let Some(count) = stats.remove("discoveries") {
        stats.entry("starsDiscovered").or_insert(count);
    }
    Ok(())
}

fn add_exploration_fields(fields: &mut Map<String, Value>) -> Result<(), MigrationError> {
    fields.entry("collectedItems").or_insert_with(|| json!([]));
    fields.entry("visitedLevels").or_insert_with(|| json!([]));
    let settings = object_field(fields, "settings", 2)?;
    settings
        .entry("fieldOfView")
        .or_insert_with(|| json!(DEFAULT_FIELD_OF_VIEW));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn current_version_passes_through() {
        let value = json!({"currentLevel": "observatory"});
        let out = migrate(CURRENT_SCHEMA_VERSION, value.clone()).unwrap();
        assert!(!out.migrated);
        assert_eq!(out.snapshot, value);
    }

    #[test]
    fn version_one_runs_every_step() {
        let value = json!({
            "currentLevel": "observatory",
            "stats": {"discoveries": 7},
            "settings": {"masterVolume": 0.5}
        });
        let out = migrate(1, value).unwrap();
        assert!(out.migrated);
        assert_eq!(out.from_version, 1);
        assert_eq!(out.snapshot["stats"]["starsDiscovered"], 7);
        assert!(out.snapshot["stats"].get("discoveries").is_none());
        assert_eq!(out.snapshot["collectedItems"], json!([]));
        assert_eq!(out.snapshot["visitedLevels"], json!([]));
        assert_eq!(out.snapshot["settings"]["fieldOfView"], 75.0);
        assert_eq!(out.snapshot["settings"]["masterVolume"], 0.5);
    }

    #[test]
    fn existing_values_are_not_overwritten() {
        let value = json!({
            "collectedItems": ["lens"],
            "settings": {"fieldOfView": 90.0}
        });
        let out = migrate(2, value).unwrap();
        assert_eq!(out.snapshot["collectedItems"], json!(["lens"]));
        assert_eq!(out.snapshot["settings"]["fieldOfView"], 90.0);
    }

    #[test]
    fn unsupported_versions_fail() {
        assert!(matches!(
            migrate(0, json!({})),
            Err(MigrationError::UnsupportedVersion { found: 0, .. })
        ));
        assert!(matches!(
            migrate(CURRENT_SCHEMA_VERSION.saturating_add(1), json!({})),
            Err(MigrationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn malformed_shapes_fail() {
        assert!(matches!(
            migrate(1, json!([1, 2])),
            Err(MigrationError::Malformed { from: 1, .. })
        ));
        assert!(matches!(
            migrate(1, json!({"stats": 3})),
            Err(MigrationError::Malformed { from: 1, .. })
        ));
    }
}
