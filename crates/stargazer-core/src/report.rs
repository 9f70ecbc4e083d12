//! Translation of error records into player-facing messages.
//!
//! Raw error text is for logs. The player sees a severity-banded message
//! chosen by component and severity.

use serde::Serialize;
use stargazer_types::{ActionType, ErrorComponent, ErrorRecord, ErrorSeverity};

/// A message fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    /// Severity band, for styling.
    pub severity: ErrorSeverity,
    /// Short headline.
    pub title: String,
    /// One or two sentences of explanation.
    pub body: String,
}

/// Build the player-facing message for `record`.
pub fn user_message(record: &ErrorRecord) -> UserMessage {
    let title = match record.severity {
        ErrorSeverity::Critical => "Something went badly wrong",
        ErrorSeverity::High => "Progress may not be saved",
        ErrorSeverity::Medium => "Something went wrong",
        ErrorSeverity::Low => "Minor hiccup",
    };
    let body = match record.component {
        ErrorComponent::Persistence if record.operation == Some(ActionType::LoadGameStart) => {
            "Your saved game could not be loaded. A new session was started instead."
        }
        ErrorComponent::Persistence => {
            "Your progress could not be saved. You can keep exploring, but progress will be lost when you quit."
        }
        ErrorComponent::LevelOrchestrator if record.severity == ErrorSeverity::Low => {
            "The view could not be adjusted for this area."
        }
        ErrorComponent::LevelOrchestrator => {
            "That area could not be loaded. You have been returned to where you were."
        }
        ErrorComponent::Validator | ErrorComponent::Engine if record.recoverable => {
            "The session state was corrected automatically."
        }
        ErrorComponent::Validator | ErrorComponent::Engine => {
            "The session state is inconsistent. Restarting the session is recommended."
        }
        ErrorComponent::Middleware | ErrorComponent::Subscriber | ErrorComponent::External => {
            "A background task failed. Your session is unaffected."
        }
    };
    UserMessage {
        severity: record.severity,
        title: title.to_owned(),
        body: body.to_owned(),
    }
}
