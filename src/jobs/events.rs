//! Messages exchanged with the host engine.
use bevy::prelude::Message;

use crate::{economy::EconomyError, host::RawHostEvent};

use super::types::PlayerId;

/// A raw event reported by the host, consumed once per frame.
#[derive(Message, Debug, Clone)]
pub struct HostEventMessage {
    pub event: RawHostEvent,
}

impl From<RawHostEvent> for HostEventMessage {
    fn from(event: RawHostEvent) -> Self {
        Self { event }
    }
}

/// Fired after the economy accepted a job reward.
#[derive(Message, Debug, Clone)]
pub struct JobRewardMessage {
    pub player: PlayerId,
    pub job: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_id: String,
}

/// Fired when a reward pushes a membership to a new level.
#[derive(Message, Debug, Clone)]
pub struct JobLevelUpMessage {
    pub player: PlayerId,
    pub job: String,
    pub level: u32,
}

/// Fired when an authorised reward was dropped by the economy.
#[derive(Message, Debug, Clone)]
pub struct JobPaymentFailedMessage {
    pub player: PlayerId,
    pub job: String,
    pub error: EconomyError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatLineKind {
    /// Private line to `player`, or to the console when `player` is `None`.
    Reply,
    /// Public chat line with its job prefix applied.
    Broadcast,
}

/// Text the host should display.
#[derive(Message, Debug, Clone)]
pub struct ChatLineMessage {
    pub player: Option<PlayerId>,
    pub kind: ChatLineKind,
    pub text: String,
}
