//! Identifiers and the action vocabulary shared by every jobs component.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned player identity (typically a UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Abstract action categories a reward rule can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Break,
    Place,
    Kill,
    Chat,
    Join,
}

impl ActionType {
    #[cfg_attr(not(test), allow(dead_code))]
    pub const ALL: [ActionType; 5] = [
        ActionType::Break,
        ActionType::Place,
        ActionType::Kill,
        ActionType::Chat,
        ActionType::Join,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Place => "place",
            Self::Kill => "kill",
            Self::Chat => "chat",
            Self::Join => "join",
        }
    }

    /// Accepts the canonical label plus the host-style aliases used in job files.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "break" | "block-break" | "block_break" | "mine" => Some(Self::Break),
            "place" | "block-place" | "block_place" | "build" => Some(Self::Place),
            "kill" | "mob-kill" | "mob_kill" => Some(Self::Kill),
            "chat" | "chat-message" | "chat_message" => Some(Self::Chat),
            "join" | "player-join" | "player_join" => Some(Self::Join),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Lower-cases a host identifier and strips the default `minecraft:` namespace.
pub fn normalise_identifier(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    match trimmed.strip_prefix("minecraft:") {
        Some(stripped) => stripped.to_string(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_labels_round_trip_through_parse() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::parse(action.label()), Some(action));
        }
        assert_eq!(ActionType::parse("Block-Break"), Some(ActionType::Break));
        assert_eq!(ActionType::parse("fish"), None);
    }

    #[test]
    fn identifiers_are_normalised() {
        assert_eq!(normalise_identifier(" minecraft:Stone "), "stone");
        assert_eq!(normalise_identifier("modded:copper_ore"), "modded:copper_ore");
        assert_eq!(PlayerId::new("abc").to_string(), "abc");
    }
}
