//! Normalises raw host events into the action vocabulary rewards are keyed on.
use std::time::SystemTime;

use crate::jobs::{
    signs::SignLocation,
    types::{normalise_identifier, ActionType, PlayerId},
};

pub const CHAT_TARGET: &str = "chat";
pub const JOIN_TARGET: &str = "server";

/// Events as the host engine reports them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHostEvent {
    BlockBroken { player: PlayerId, block: String },
    BlockPlaced { player: PlayerId, block: String },
    /// `killer` is `None` for environmental deaths.
    EntityKilled {
        killer: Option<PlayerId>,
        entity: String,
    },
    ChatMessage { player: PlayerId, message: String },
    PlayerJoined { player: PlayerId },
    PlayerQuit { player: PlayerId },
    SignChanged {
        player: PlayerId,
        location: SignLocation,
        lines: Vec<String>,
    },
    SignInteract {
        player: PlayerId,
        location: SignLocation,
    },
    SignBroken { location: SignLocation },
    /// `player` is `None` when issued from the console.
    Command {
        player: Option<PlayerId>,
        line: String,
    },
    Other { kind: String },
}

/// A normalised gameplay action. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub player: PlayerId,
    pub action: ActionType,
    pub target: String,
    pub timestamp: SystemTime,
}

impl ActionEvent {
    pub fn new(player: PlayerId, action: ActionType, target: &str) -> Self {
        Self {
            player,
            action,
            target: normalise_identifier(target),
            timestamp: SystemTime::now(),
        }
    }
}

/// Maps the five reward-bearing categories; everything else is `None`.
pub fn classify(event: &RawHostEvent) -> Option<ActionEvent> {
    let (player, action, target) = match event {
        RawHostEvent::BlockBroken { player, block } => (player, ActionType::Break, block.as_str()),
        RawHostEvent::BlockPlaced { player, block } => (player, ActionType::Place, block.as_str()),
        RawHostEvent::EntityKilled {
            killer: Some(player),
            entity,
        } => (player, ActionType::Kill, entity.as_str()),
        RawHostEvent::ChatMessage { player, .. } => (player, ActionType::Chat, CHAT_TARGET),
        RawHostEvent::PlayerJoined { player } => (player, ActionType::Join, JOIN_TARGET),
        _ => return None,
    };
    Some(ActionEvent::new(player.clone(), action, target))
}
