//! The reducer: a pure function from `(snapshot, action)` to the next
//! snapshot.
//!
//! Each action type maps to one narrow, total transformation. The reducer
//! never panics and never performs I/O. Timestamps it records come from the
//! action's metadata, so reducing the same inputs twice yields equal
//! results. When an action would change nothing (unknown tag, repeated
//! discovery, zero increment, malformed payload) the input `Arc` is
//! returned as-is, so callers can detect "no change" with
//! [`Arc::ptr_eq`].

use std::sync::Arc;

use stargazer_types::{
    Action, ActionKind, IdSet, PendingTransition, RecoveryRecord, Settings, Snapshot, StatField,
};

/// Compute the snapshot that results from applying `action` to `state`.
pub fn reduce(state: &Arc<Snapshot>, action: &Action) -> Arc<Snapshot> {
    let at = action.meta.timestamp;
    match &action.kind {
        // --- Level lifecycle ---
        ActionKind::LevelTransitionStart { from, to } => modify(state, |next| {
            next.transition = Some(PendingTransition {
                from: from.clone(),
                to: to.clone(),
                started_at: at,
            });
        }),
        ActionKind::LevelTransitionSuccess { to, .. } => {
            if *to == state.current_level {
                return clear_transition(state);
            }
            modify(state, |next| {
                let left = next.current_level.clone();
                if let Some(visited) = next.visited_levels.with(left.clone()) {
                    next.visited_levels = visited;
                }
                next.previous_level = Some(left);
                next.current_level = to.clone();
                next.transition = None;
            })
        }
        ActionKind::LevelTransitionFailure { .. } => clear_transition(state),
        ActionKind::LevelCompleted { level } => {
            if level.is_blank() {
                return Arc::clone(state);
            }
            insert_and_count(
                state,
                &state.completed_levels,
                level.clone(),
                StatField::LevelsCompleted,
                |next, set| next.completed_levels = set,
            )
        }

        // --- Selection ---
        ActionKind::StarSelected { star, .. } => modify(state, |next| {
            next.selected_star = Some(star.clone());
        }),
        ActionKind::StarDeselected => {
            if state.selected_star.is_none() {
                return Arc::clone(state);
            }
            modify(state, |next| next.selected_star = None)
        }
        ActionKind::StarDiscovered { star } => {
            if star.is_blank() {
                return Arc::clone(state);
            }
            insert_and_count(
                state,
                &state.discovered_stars,
                star.clone(),
                StatField::StarsDiscovered,
                |next, set| next.discovered_stars = set,
            )
        }

        // --- Progress ---
        ActionKind::StatsUpdate { updates } => {
            let stats = updates.apply(state.stats);
            if stats == state.stats {
                return Arc::clone(state);
            }
            modify(state, |next| next.stats = stats)
        }
        ActionKind::StatsIncrement { field, amount } => {
            let current = state.stats.get(*field);
            let value = current.saturating_add(*amount).max(0);
            if value == current {
                return Arc::clone(state);
            }
            modify(state, |next| next.stats = next.stats.with(*field, value))
        }
        ActionKind::ContentUnlocked { content } => {
            if content.is_blank() {
                return Arc::clone(state);
            }
            insert_and_count(
                state,
                &state.unlocked_content,
                content.clone(),
                StatField::ContentUnlocked,
                |next, set| next.unlocked_content = set,
            )
        }
        ActionKind::ItemCollected { item } => {
            if item.is_blank() {
                return Arc::clone(state);
            }
            insert_and_count(
                state,
                &state.collected_items,
                item.clone(),
                StatField::ItemsCollected,
                |next, set| next.collected_items = set,
            )
        }
        ActionKind::InteractionRecorded { target } => {
            if target.trim().is_empty() {
                return Arc::clone(state);
            }
            modify(state, |next| {
                next.stats = next.stats.bumped(StatField::Interactions);
            })
        }

        // --- Settings ---
        ActionKind::SettingsUpdate { updates } => {
            let settings = updates.apply(state.settings);
            if updates.is_empty() || settings == state.settings {
                return Arc::clone(state);
            }
            modify(state, |next| next.settings = settings)
        }
        ActionKind::SettingsReset => {
            if state.settings == Settings::default() {
                return Arc::clone(state);
            }
            modify(state, |next| next.settings = Settings::default())
        }

        // --- Session ---
        ActionKind::SessionStart {
            session_id,
            started_at,
        } => modify(state, |next| {
            next.session.session_id = *session_id;
            next.session.started_at = *started_at;
        }),
        ActionKind::TimeUpdate { delta_ms } => {
            if *delta_ms <= 0 || state.lifecycle.paused {
                return Arc::clone(state);
            }
            modify(state, |next| {
                next.session.play_time_ms = next.session.play_time_ms.saturating_add(*delta_ms);
                next.stats.time_explored_ms = next.stats.time_explored_ms.saturating_add(*delta_ms);
            })
        }
        ActionKind::TimelineEventsSet { events } => {
            if *events == state.timeline {
                return Arc::clone(state);
            }
            modify(state, |next| next.timeline.clone_from(events))
        }

        // --- Persistence ---
        ActionKind::SaveGameStart { .. } => {
            if state.persistence.saving {
                return Arc::clone(state);
            }
            modify(state, |next| next.persistence.saving = true)
        }
        ActionKind::SaveGameSuccess { kind, saved_at, .. } => modify(state, |next| {
            next.persistence.saving = false;
            next.persistence.last_saved_at = Some(*saved_at);
            next.persistence.last_save_kind = Some(*kind);
            next.persistence.memory_only = false;
            next.persistence.last_error = None;
        }),
        ActionKind::SaveGameFailure { error, .. } => modify(state, |next| {
            next.persistence.saving = false;
            next.persistence.memory_only = true;
            next.persistence.last_error = Some(error.clone());
        }),
        ActionKind::LoadGameStart => {
            if state.persistence.loading {
                return Arc::clone(state);
            }
            modify(state, |next| next.persistence.loading = true)
        }
        ActionKind::LoadGameSuccess { snapshot, .. } => {
            let mut loaded = Snapshot::clone(snapshot);
            // Session identity and lifecycle belong to the running session,
            // not to the save.
            loaded.session.session_id = state.session.session_id;
            loaded.session.started_at = state.session.started_at;
            loaded.lifecycle = state.lifecycle;
            loaded.transition = None;
            loaded.persistence.saving = false;
            loaded.persistence.loading = false;
            Arc::new(loaded)
        }
        ActionKind::LoadGameFailure { error } => modify(state, |next| {
            next.persistence.loading = false;
            next.persistence.last_error = Some(error.clone());
        }),

        // --- Errors ---
        ActionKind::ErrorOccurred { error } => modify(state, |next| {
            next.errors.last = Some(error.clone());
            next.errors.occurred = next.errors.occurred.saturating_add(1);
        }),
        ActionKind::ErrorRecovered { trigger, fixes } => modify(state, |next| {
            next.errors.recovered = next.errors.recovered.saturating_add(1);
            next.errors.last_recovery = Some(RecoveryRecord {
                trigger: trigger.as_str().to_owned(),
                fixes: fixes.clone(),
                at,
            });
        }),

        // --- Lifecycle ---
        ActionKind::GameInitialized => {
            if state.lifecycle.initialized {
                return Arc::clone(state);
            }
            modify(state, |next| next.lifecycle.initialized = true)
        }
        ActionKind::GamePaused => {
            if state.lifecycle.paused {
                return Arc::clone(state);
            }
            modify(state, |next| next.lifecycle.paused = true)
        }
        ActionKind::GameResumed => {
            if !state.lifecycle.paused {
                return Arc::clone(state);
            }
            modify(state, |next| next.lifecycle.paused = false)
        }
        ActionKind::GameReset {
            preserve_settings, ..
        } => {
            let mut fresh = Snapshot::initial(
                state.session.session_id,
                state.session.home_level.clone(),
                state.session.started_at,
            );
            if *preserve_settings {
                fresh.settings = state.settings;
            }
            fresh.lifecycle.initialized = state.lifecycle.initialized;
            Arc::new(fresh)
        }

        ActionKind::Unrecognized { .. } => Arc::clone(state),
    }
}

/// Clone the snapshot, apply `edit`, and wrap the result.
fn modify(state: &Arc<Snapshot>, edit: impl FnOnce(&mut Snapshot)) -> Arc<Snapshot> {
    let mut next = Snapshot::clone(state);
    edit(&mut next);
    Arc::new(next)
}

fn clear_transition(state: &Arc<Snapshot>) -> Arc<Snapshot> {
    if state.transition.is_none() {
        return Arc::clone(state);
    }
    modify(state, |next| next.transition = None)
}

/// Insert `id` into `set`; on first insertion store the grown set and bump
/// `counter`. Repeats leave the snapshot untouched.
fn insert_and_count<T: Ord + Clone>(
    state: &Arc<Snapshot>,
    set: &IdSet<T>,
    id: T,
    counter: StatField,
    store: impl FnOnce(&mut Snapshot, IdSet<T>),
) -> Arc<Snapshot> {
    match set.with(id) {
        Some(grown) => modify(state, |next| {
            store(next, grown);
            next.stats = next.stats.bumped(counter);
        }),
        None => Arc::clone(state),
    }
}
