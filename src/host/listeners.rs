//! One entry point per host event category, plus `handle` to route a raw
//! event to the right one.
use bevy::log::{debug, warn};

use crate::jobs::{
    commands::{self, display_name, membership_error},
    context::{ActionOutcome, JobsContext},
    signs::{SignBinding, SignLocation},
    types::{ActionType, PlayerId},
};

use super::{
    chat::decorate_chat,
    classifier::{classify, ActionEvent, RawHostEvent},
};

/// Everything the host should do in response to one event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostResponse {
    pub player: Option<PlayerId>,
    pub outcome: Option<ActionOutcome>,
    /// Lines sent privately to `player` (or the console).
    pub replies: Vec<String>,
    /// Replacement text for a chat line.
    pub chat: Option<String>,
}

impl HostResponse {
    fn for_player(player: &PlayerId) -> Self {
        Self {
            player: Some(player.clone()),
            ..Self::default()
        }
    }
}

pub fn on_block_break(context: &JobsContext, player: &PlayerId, block: &str) -> HostResponse {
    reward_action(context, ActionEvent::new(player.clone(), ActionType::Break, block))
}

pub fn on_block_place(context: &JobsContext, player: &PlayerId, block: &str) -> HostResponse {
    reward_action(context, ActionEvent::new(player.clone(), ActionType::Place, block))
}

pub fn on_mob_kill(context: &JobsContext, killer: &PlayerId, entity: &str) -> HostResponse {
    reward_action(context, ActionEvent::new(killer.clone(), ActionType::Kill, entity))
}

/// Chat both earns a reward and gets its job prefix.
pub fn on_chat(context: &JobsContext, player: &PlayerId, message: &str) -> HostResponse {
    let event = classify(&RawHostEvent::ChatMessage {
        player: player.clone(),
        message: message.to_string(),
    });
    let mut response = match event {
        Some(event) => reward_action(context, event),
        None => HostResponse::for_player(player),
    };

    let memberships = context.memberships().get_memberships(player);
    response.chat = Some(decorate_chat(
        &context.settings(),
        &context.catalog(),
        &memberships,
        message,
    ));
    response
}

/// Opens the player's economy account and hydrates their memberships before
/// rewarding the join itself.
pub fn on_player_join(context: &JobsContext, player: &PlayerId) -> HostResponse {
    if context.economy().is_available() {
        // Failures are logged by the bridge.
        let _ = context.economy().open_account(player);
    }
    let memberships = context.memberships().load_player(player);
    debug!(
        target: "jobs",
        "{} joined holding {} job(s)",
        player,
        memberships.len()
    );
    match classify(&RawHostEvent::PlayerJoined {
        player: player.clone(),
    }) {
        Some(event) => reward_action(context, event),
        None => HostResponse::for_player(player),
    }
}

pub fn on_player_quit(context: &JobsContext, player: &PlayerId) -> HostResponse {
    context.memberships().unload_player(player);
    HostResponse::for_player(player)
}

/// Binds the sign when its text starts with the jobs header.
pub fn on_sign_change(
    context: &JobsContext,
    player: &PlayerId,
    location: SignLocation,
    lines: &[String],
) -> HostResponse {
    let mut response = HostResponse::for_player(player);
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    let messages = context.messages();

    match context
        .signs()
        .bind_sign(&context.catalog(), location.clone(), &lines)
    {
        Ok(SignBinding::NotAJobSign) => {}
        Ok(SignBinding::UnknownJob(job)) => {
            response
                .replies
                .push(messages.render("error.unknown-job", &[("job", &job)]));
        }
        Ok(SignBinding::Bound(job)) => {
            debug!(target: "jobs", "Sign at {} bound to '{}'", location, job);
            response
                .replies
                .push(messages.render("sign.bound", &[("job", &display_name(context, &job))]));
        }
        Err(err) => warn!(target: "jobs", "Failed to save sign at {}: {}", location, err),
    }
    response
}

/// Joins the job bound to the sign, if any.
pub fn on_sign_interact(
    context: &JobsContext,
    player: &PlayerId,
    location: &SignLocation,
) -> HostResponse {
    let mut response = HostResponse::for_player(player);
    let Some(job) = context.signs().job_at(location) else {
        return response;
    };

    let reply = match commands::join_job(context, player, &job) {
        Ok(membership) => context.messages().render(
            "job.joined",
            &[("job", &display_name(context, &membership.job))],
        ),
        Err(err) => membership_error(context, &err),
    };
    response.replies.push(reply);
    response
}

pub fn on_sign_broken(context: &JobsContext, location: &SignLocation) -> HostResponse {
    if let Err(err) = context.signs().unbind_sign(location) {
        warn!(target: "jobs", "Failed to remove sign at {}: {}", location, err);
    }
    HostResponse::default()
}

pub fn on_command(context: &JobsContext, player: Option<&PlayerId>, line: &str) -> HostResponse {
    HostResponse {
        player: player.cloned(),
        replies: commands::execute(context, player, line),
        ..HostResponse::default()
    }
}

/// Routes a raw event to its handler. Unrecognised events produce an empty
/// response.
pub fn handle(context: &JobsContext, event: &RawHostEvent) -> HostResponse {
    match event {
        RawHostEvent::BlockBroken { player, block } => on_block_break(context, player, block),
        RawHostEvent::BlockPlaced { player, block } => on_block_place(context, player, block),
        RawHostEvent::EntityKilled {
            killer: Some(killer),
            entity,
        } => on_mob_kill(context, killer, entity),
        RawHostEvent::ChatMessage { player, message } => on_chat(context, player, message),
        RawHostEvent::PlayerJoined { player } => on_player_join(context, player),
        RawHostEvent::PlayerQuit { player } => on_player_quit(context, player),
        RawHostEvent::SignChanged {
            player,
            location,
            lines,
        } => on_sign_change(context, player, location.clone(), lines),
        RawHostEvent::SignInteract { player, location } => {
            on_sign_interact(context, player, location)
        }
        RawHostEvent::SignBroken { location } => on_sign_broken(context, location),
        RawHostEvent::Command { player, line } => on_command(context, player.as_ref(), line),
        RawHostEvent::EntityKilled { killer: None, .. } | RawHostEvent::Other { .. } => {
            HostResponse::default()
        }
    }
}

fn reward_action(context: &JobsContext, event: ActionEvent) -> HostResponse {
    let mut response = HostResponse::for_player(&event.player);
    let outcome = context.process_action(&event);

    if let ActionOutcome::Rewarded {
        reward, progress, ..
    } = &outcome
    {
        let messages = context.messages();
        let display = display_name(context, reward.job());
        response.replies.push(messages.render(
            "reward.paid",
            &[
                ("amount", &format_amount(reward.amount())),
                ("currency", reward.currency()),
                ("job", &display),
            ],
        ));
        if let Some(update) = progress.as_ref().filter(|update| update.leveled_up()) {
            response.replies.push(messages.render(
                "job.levelup",
                &[
                    ("job", &display),
                    ("level", &update.membership.level.to_string()),
                ],
            ));
        }
    }

    response.outcome = Some(outcome);
    response
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
