//! Error types for the session runner binary.
//!
//! [`SessionError`] is the top-level error type that wraps every failure
//! the runner can propagate out of `main`.

/// Top-level error for the session runner.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: stargazer_core::ConfigError,
    },

    /// A dispatch was rejected.
    #[error("dispatch error: {source}")]
    Dispatch {
        /// The underlying dispatch error.
        #[from]
        source: stargazer_core::DispatchError,
    },

    /// The initial level could not be activated.
    #[error("level error: {source}")]
    Level {
        /// The underlying transition error.
        #[from]
        source: stargazer_levels::TransitionError,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
