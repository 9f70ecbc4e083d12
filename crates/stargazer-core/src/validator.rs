//! Snapshot invariant checking with optional conservative repair.
//!
//! The validator runs after every reduction. In report-only mode it lists
//! violations without touching the snapshot. In auto-fix mode it returns a
//! corrected copy: it removes or clamps invalid data but never fabricates
//! missing required data. A violation that cannot be repaired safely (an
//! unregistered current level) stays in the result as an error and the
//! field is left as-is.

use serde::Serialize;
use stargazer_types::{IdSet, LevelId, Settings, Snapshot, StatField};

use crate::registry::LevelRegistry;

/// Machine-readable issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// `currentLevel` is not a registered level.
    UnknownCurrentLevel,
    /// `previousLevel` is not a registered level.
    UnknownPreviousLevel,
    /// A star is selected on a level that does not support selection.
    SelectionUnsupported,
    /// An id references nothing (blank).
    OrphanReference,
    /// A level set references an unregistered level.
    UnknownLevelReference,
    /// A counter or duration is negative.
    NegativeValue,
    /// Play time moved backwards.
    TimeRegression,
    /// A setting is out of range or not finite.
    SettingOutOfRange,
}

/// One invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Category.
    pub code: IssueCode,
    /// Snapshot field path, e.g. `stats.interactions`.
    pub field: String,
    /// Human-readable description.
    pub message: String,
    /// Whether auto-fix can repair it.
    pub fixable: bool,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// No errors remain. Warnings do not affect validity.
    pub is_valid: bool,
    /// Critical violations.
    pub errors: Vec<ValidationIssue>,
    /// Advisory violations.
    pub warnings: Vec<ValidationIssue>,
    /// At least one repair was made.
    pub auto_fix_applied: bool,
    /// Description of each repair made.
    pub fixes: Vec<String>,
}

impl ValidationResult {
    /// Whether any errors remain.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Checks snapshots against the level registry.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: LevelRegistry,
}

/// Whether a pass may mutate the snapshot it inspects.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Report,
    Fix,
}

/// Collects issues and repairs during one pass.
struct Pass {
    mode: Mode,
    result: ValidationResult,
}

impl Pass {
    const fn new(mode: Mode) -> Self {
        Self {
            mode,
            result: ValidationResult {
                is_valid: true,
                errors: Vec::new(),
                warnings: Vec::new(),
                auto_fix_applied: false,
                fixes: Vec::new(),
            },
        }
    }

    const fn fixing(&self) -> bool {
        matches!(self.mode, Mode::Fix)
    }

    /// Record an error. When fixing and `fixable`, the issue is recorded as
    /// a repair instead.
    fn error(&mut self, code: IssueCode, field: &str, message: String, fixable: bool) {
        self.push(code, field, message, fixable, true);
    }

    fn warning(&mut self, code: IssueCode, field: &str, message: String) {
        self.push(code, field, message, true, false);
    }

    fn push(&mut self, code: IssueCode, field: &str, message: String, fixable: bool, error: bool) {
        if self.fixing() && fixable {
            self.result.fixes.push(format!("{field}: {message}"));
            self.result.auto_fix_applied = true;
            return;
        }
        let issue = ValidationIssue {
            code,
            field: field.to_owned(),
            message,
            fixable,
        };
        if error {
            self.result.errors.push(issue);
        } else {
            self.result.warnings.push(issue);
        }
    }

    fn finish(mut self) -> ValidationResult {
        self.result.is_valid = self.result.errors.is_empty();
        self.result
    }
}

impl Validator {
    /// Create a validator over `registry`.
    pub const fn new(registry: LevelRegistry) -> Self {
        Self { registry }
    }

    /// The registry the validator checks against.
    pub const fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    /// Report violations without repairing anything.
    ///
    /// `previous` enables the monotonic play-time check; pass `None` when
    /// the snapshot legitimately replaces its predecessor (load, reset).
    pub fn validate(&self, snapshot: &Snapshot, previous: Option<&Snapshot>) -> ValidationResult {
        let mut scratch = snapshot.clone();
        let mut pass = Pass::new(Mode::Report);
        self.check(&mut scratch, previous, &mut pass);
        pass.finish()
    }

    /// Repair every fixable violation and return the corrected snapshot.
    ///
    /// The result's `errors` hold only what could not be repaired.
    pub fn auto_fix(
        &self,
        snapshot: &Snapshot,
        previous: Option<&Snapshot>,
    ) -> (Snapshot, ValidationResult) {
        let mut fixed = snapshot.clone();
        let mut pass = Pass::new(Mode::Fix);
        self.check(&mut fixed, previous, &mut pass);
        (fixed, pass.finish())
    }

    fn check(&self, snapshot: &mut Snapshot, previous: Option<&Snapshot>, pass: &mut Pass) {
        self.check_levels(snapshot, pass);
        self.check_selection(snapshot, pass);
        check_orphans(snapshot, pass);
        check_counters(snapshot, previous, pass);
        check_settings(&mut snapshot.settings, pass);
    }

    fn check_levels(&self, snapshot: &mut Snapshot, pass: &mut Pass) {
        if !self.registry.is_registered(&snapshot.current_level) {
            pass.error(
                IssueCode::UnknownCurrentLevel,
                "currentLevel",
                format!("level '{}' is not registered", snapshot.current_level),
                false,
            );
        }

        if let Some(previous) = &snapshot.previous_level
            && !self.registry.is_registered(previous)
        {
            pass.warning(
                IssueCode::UnknownPreviousLevel,
                "previousLevel",
                format!("cleared unregistered level '{previous}'"),
            );
            if pass.fixing() {
                snapshot.previous_level = None;
            }
        }

        let registry = &self.registry;
        let known = |level: &LevelId| !level.is_blank() && registry.is_registered(level);
        if let Some(kept) = prune(&snapshot.completed_levels, known, |count| {
            pass.warning(
                IssueCode::UnknownLevelReference,
                "completedLevels",
                format!("removed {count} unregistered level(s)"),
            );
        }) && pass.fixing()
        {
            snapshot.completed_levels = kept;
        }
        if let Some(kept) = prune(&snapshot.visited_levels, known, |count| {
            pass.warning(
                IssueCode::UnknownLevelReference,
                "visitedLevels",
                format!("removed {count} unregistered level(s)"),
            );
        }) && pass.fixing()
        {
            snapshot.visited_levels = kept;
        }
    }

    fn check_selection(&self, snapshot: &mut Snapshot, pass: &mut Pass) {
        let Some(star) = &snapshot.selected_star else {
            return;
        };
        if star.id.is_blank() {
            pass.error(
                IssueCode::OrphanReference,
                "selectedStar",
                "cleared selection with a blank star id".to_owned(),
                true,
            );
        } else if !self.registry.supports_selection(&snapshot.current_level) {
            pass.error(
                IssueCode::SelectionUnsupported,
                "selectedStar",
                format!(
                    "cleared '{}' because level '{}' does not support selection",
                    star.id, snapshot.current_level
                ),
                true,
            );
        } else {
            return;
        }
        if pass.fixing() {
            snapshot.selected_star = None;
        }
    }
}

/// Return the subset of `set` accepted by `keep`, calling `report` with the
/// number of rejected members. `None` when nothing was rejected.
fn prune<T: Ord + Clone>(
    set: &IdSet<T>,
    keep: impl Fn(&T) -> bool,
    report: impl FnOnce(usize),
) -> Option<IdSet<T>> {
    let kept = set.retained(|id| keep(id))?;
    report(set.len().saturating_sub(kept.len()));
    Some(kept)
}

fn check_orphans(snapshot: &mut Snapshot, pass: &mut Pass) {
    macro_rules! orphans {
        ($field:ident, $name:literal) => {
            if let Some(kept) = prune(&snapshot.$field, |id| !id.is_blank(), |count| {
                pass.error(
                    IssueCode::OrphanReference,
                    $name,
                    format!("removed {count} blank id(s)"),
                    true,
                );
            }) && pass.fixing()
            {
                snapshot.$field = kept;
            }
        };
    }
    orphans!(discovered_stars, "discoveredStars");
    orphans!(unlocked_content, "unlockedContent");
    orphans!(collected_items, "collectedItems");
}

fn check_counters(snapshot: &mut Snapshot, previous: Option<&Snapshot>, pass: &mut Pass) {
    for field in StatField::ALL {
        let value = snapshot.stats.get(field);
        if value < 0 {
            pass.error(
                IssueCode::NegativeValue,
                &format!("stats.{}", field.as_str()),
                format!("clamped {value} to 0"),
                true,
            );
            if pass.fixing() {
                snapshot.stats = snapshot.stats.with(field, 0);
            }
        }
    }

    let play_time = snapshot.session.play_time_ms;
    if play_time < 0 {
        pass.error(
            IssueCode::NegativeValue,
            "session.playTimeMs",
            format!("clamped {play_time} to 0"),
            true,
        );
        if pass.fixing() {
            snapshot.session.play_time_ms = 0;
        }
    } else if let Some(previous) = previous
        && play_time < previous.session.play_time_ms
    {
        let floor = previous.session.play_time_ms;
        pass.error(
            IssueCode::TimeRegression,
            "session.playTimeMs",
            format!("play time went back from {floor} to {play_time}"),
            true,
        );
        if pass.fixing() {
            snapshot.session.play_time_ms = floor;
        }
    }
}

fn check_settings(settings: &mut Settings, pass: &mut Pass) {
    let defaults = Settings::default();
    let mut range = |field: &str, value: &mut f32, (low, high): (f32, f32), default: f32| {
        if !value.is_finite() {
            pass.error(
                IssueCode::SettingOutOfRange,
                field,
                format!("reset non-finite value to {default}"),
                true,
            );
            if pass.fixing() {
                *value = default;
            }
        } else if *value < low || *value > high {
            let clamped = value.clamp(low, high);
            pass.error(
                IssueCode::SettingOutOfRange,
                field,
                format!("clamped {value} to {clamped}"),
                true,
            );
            if pass.fixing() {
                *value = clamped;
            }
        }
    };
    range(
        "settings.masterVolume",
        &mut settings.master_volume,
        Settings::VOLUME_RANGE,
        defaults.master_volume,
    );
    range(
        "settings.mouseSensitivity",
        &mut settings.mouse_sensitivity,
        Settings::SENSITIVITY_RANGE,
        defaults.mouse_sensitivity,
    );
    range(
        "settings.fieldOfView",
        &mut settings.field_of_view,
        Settings::FOV_RANGE,
        defaults.field_of_view,
    );
}
