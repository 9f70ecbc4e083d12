//! Strongly-typed identifiers.
//!
//! Content identifiers (stars, levels, unlockable content, collectible
//! items) are authored strings such as `"observatory"` or `"vega"`; they
//! are wrapped in newtypes so a star id can never be passed where a level
//! id is expected. Sessions are identified by a UUID v7.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an authored string identifier.
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty or whitespace only.
            ///
            /// Blank ids can never have been introduced by a real producer,
            /// so the validator treats them as orphans.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_name_id! {
    /// Identifier of a star or other selectable point of interest.
    StarId
}

define_name_id! {
    /// Identifier of a registered level (e.g. `observatory`, `miranda`).
    LevelId
}

define_name_id! {
    /// Identifier of a piece of unlockable content.
    ContentId
}

define_name_id! {
    /// Identifier of a collectible item.
    ItemId
}

/// Unique identifier for one play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new session identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_detected() {
        assert!(StarId::new("").is_blank());
        assert!(StarId::new("   ").is_blank());
        assert!(!StarId::new("vega").is_blank());
    }

    #[test]
    fn name_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&LevelId::new("observatory")).unwrap_or_default();
        assert_eq!(json, "\"observatory\"");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
