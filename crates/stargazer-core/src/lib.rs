//! Session state engine for the Stargazer exploration engine.
//!
//! Every change to session state flows through [`Engine::dispatch`]: the
//! middleware chain, the pure reducer, the validator, publication of the
//! new snapshot, the bounded history, and subscriber notification.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `stargazer-config.yaml` into
//!   strongly-typed structs.
//! - [`registry`] -- The set of known levels and their capabilities.
//! - [`reducer`] -- Pure `(snapshot, action) -> snapshot` transition.
//! - [`validator`] -- Invariant checks with conservative auto-repair.
//! - [`middleware`] -- [`Middleware`] trait, chain, and the built-ins.
//! - [`history`] -- Bounded dispatch history with snapshot digests.
//! - [`engine`] -- The dispatcher, subscribers, and replay.
//! - [`report`] -- Player-facing error messages.
//!
//! [`Engine::dispatch`]: engine::Engine::dispatch
//! [`Middleware`]: middleware::Middleware

pub mod config;
pub mod engine;
pub mod history;
pub mod middleware;
pub mod reducer;
pub mod registry;
pub mod report;
pub mod validator;

pub use config::{ConfigError, EngineConfig};
pub use engine::{
    DispatchError, DispatchOutcome, Engine, EngineBuilder, ReplayError, Subscriber,
    SubscriberError, UnsubscribeHandle,
};
pub use registry::LevelRegistry;
