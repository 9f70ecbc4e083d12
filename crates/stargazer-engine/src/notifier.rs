//! Subscriber that turns engine errors into player-facing notices.
//!
//! The UI would render these; the headless runner logs them at a level
//! matching their severity and keeps the latest ones for the session
//! summary.

use std::sync::{Arc, Mutex, PoisonError};

use stargazer_core::{Subscriber, SubscriberError};
use stargazer_core::report::{UserMessage, user_message};
use stargazer_types::{Action, ActionKind, ErrorSeverity, Snapshot};
use tracing::{error, info, warn};

/// Number of notices kept for the summary.
const MAX_NOTICES: usize = 16;

/// Collects player-facing notices from `ERROR_OCCURRED` actions.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    notices: Arc<Mutex<Vec<UserMessage>>>,
}

impl Notifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<UserMessage> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Subscriber for Notifier {
    fn notify(
        &self,
        action: &Action,
        _previous: &Arc<Snapshot>,
        next: &Arc<Snapshot>,
    ) -> Result<(), SubscriberError> {
        match &action.kind {
            ActionKind::ErrorOccurred { error: record } => {
                let message = user_message(record);
                match message.severity {
                    ErrorSeverity::Critical | ErrorSeverity::High => {
                        error!(title = %message.title, body = %message.body, "Notice");
                    }
                    ErrorSeverity::Medium => {
                        warn!(title = %message.title, body = %message.body, "Notice");
                    }
                    ErrorSeverity::Low => {
                        info!(title = %message.title, body = %message.body, "Notice");
                    }
                }
                let mut notices = self
                    .notices
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if notices.len() >= MAX_NOTICES {
                    notices.remove(0);
                }
                notices.push(message);
            }
            ActionKind::LevelTransitionSuccess { to, duration_ms, .. } => {
                info!(level = %to, duration_ms, "Entered level");
            }
            ActionKind::ErrorRecovered { trigger, fixes } => {
                info!(trigger = %trigger, fixes = fixes.len(), "State repaired");
            }
            ActionKind::SaveGameSuccess { kind, size_bytes, .. } => {
                info!(kind = ?kind, size_bytes, level = %next.current_level, "Progress saved");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stargazer_types::{ActionSource, ErrorComponent, ErrorRecord, LevelId, creators};

    use super::*;

    #[test]
    fn keeps_a_bounded_list_of_notices() {
        let notifier = Notifier::new();
        let state = Arc::new(Snapshot::fresh(LevelId::new("observatory")));
        for attempt in 0..20 {
            let record =
                ErrorRecord::new(ErrorComponent::Persistence, format!("write {attempt}"), true);
            let action = creators::error_occurred(record, ActionSource::Persistence);
            notifier.notify(&action, &state, &state).unwrap();
        }
        let notices = notifier.notices();
        assert_eq!(notices.len(), MAX_NOTICES);
        assert!(notices.iter().all(|n| n.severity == ErrorSeverity::High));
    }

    #[test]
    fn ignores_ordinary_actions() {
        let notifier = Notifier::new();
        let state = Arc::new(Snapshot::fresh(LevelId::new("observatory")));
        notifier
            .notify(&creators::game_paused(), &state, &state)
            .unwrap();
        assert!(notifier.notices().is_empty());
    }
}
