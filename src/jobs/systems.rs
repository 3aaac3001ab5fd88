use bevy::{ecs::system::SystemParam, prelude::*};

use crate::host::{handle, HostResponse};

use super::{
    context::{ActionOutcome, JobsContext},
    events::{
        ChatLineKind, ChatLineMessage, HostEventMessage, JobLevelUpMessage,
        JobPaymentFailedMessage, JobRewardMessage,
    },
};

#[derive(SystemParam)]
pub struct JobOutputs<'w> {
    rewards: MessageWriter<'w, JobRewardMessage>,
    level_ups: MessageWriter<'w, JobLevelUpMessage>,
    failures: MessageWriter<'w, JobPaymentFailedMessage>,
    chat: MessageWriter<'w, ChatLineMessage>,
}

/// Feeds every pending host event through its handler and publishes the results.
pub fn process_host_events(
    context: Res<JobsContext>,
    mut events: MessageReader<HostEventMessage>,
    mut outputs: JobOutputs,
) {
    for message in events.read() {
        let response = handle(&context, &message.event);
        publish(&mut outputs, response);
    }
}

fn publish(outputs: &mut JobOutputs, response: HostResponse) {
    match response.outcome {
        Some(ActionOutcome::Rewarded {
            reward,
            receipt,
            progress,
        }) => {
            outputs.rewards.write(JobRewardMessage {
                player: receipt.player.clone(),
                job: reward.job().to_string(),
                amount: receipt.amount,
                currency: receipt.currency,
                transaction_id: receipt.transaction_id,
            });
            if let Some(update) = progress.filter(|update| update.leveled_up()) {
                outputs.level_ups.write(JobLevelUpMessage {
                    player: update.membership.player,
                    job: update.membership.job,
                    level: update.membership.level,
                });
            }
        }
        Some(ActionOutcome::PaymentFailed { reward, error }) => {
            if let Some(player) = response.player.clone() {
                outputs.failures.write(JobPaymentFailedMessage {
                    player,
                    job: reward.job().to_string(),
                    error,
                });
            }
        }
        Some(ActionOutcome::NoReward) | Some(ActionOutcome::RewardsDisabled) | None => {}
    }

    for text in response.replies {
        outputs.chat.write(ChatLineMessage {
            player: response.player.clone(),
            kind: ChatLineKind::Reply,
            text,
        });
    }
    if let Some(text) = response.chat {
        outputs.chat.write(ChatLineMessage {
            player: response.player,
            kind: ChatLineKind::Broadcast,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        economy::{EconomyBridge, LocalLedger},
        host::RawHostEvent,
        jobs::{
            commands,
            context::test_support,
            settings::SETTINGS_FILE,
            telemetry::{record_job_activity, JobActivityEvent, JobActivityFile, JobActivityLog},
            types::PlayerId,
        },
        storage::KeyValueStore,
    };

    #[derive(Resource, Default)]
    struct Collected {
        rewards: Vec<JobRewardMessage>,
        level_ups: Vec<JobLevelUpMessage>,
        chat: Vec<ChatLineMessage>,
    }

    fn collect(
        mut collected: ResMut<Collected>,
        mut rewards: MessageReader<JobRewardMessage>,
        mut level_ups: MessageReader<JobLevelUpMessage>,
        mut chat: MessageReader<ChatLineMessage>,
    ) {
        collected.rewards.extend(rewards.read().cloned());
        collected.level_ups.extend(level_ups.read().cloned());
        collected.chat.extend(chat.read().cloned());
    }

    fn app() -> App {
        app_with(test_support::context())
    }

    fn app_with(context: JobsContext) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(context)
            .init_resource::<Collected>()
            .init_resource::<JobActivityLog>()
            .insert_resource(JobActivityFile::default())
            .add_message::<HostEventMessage>()
            .add_message::<JobRewardMessage>()
            .add_message::<JobLevelUpMessage>()
            .add_message::<JobPaymentFailedMessage>()
            .add_message::<ChatLineMessage>()
            .add_systems(
                Update,
                (process_host_events, (collect, record_job_activity)).chain(),
            );
        app
    }

    #[test]
    fn rewards_are_published_and_logged() {
        let mut app = app();
        let steve = PlayerId::new("steve");
        commands::join_job(app.world().resource::<JobsContext>(), &steve, "miner").unwrap();

        for _ in 0..10 {
            app.world_mut().write_message(HostEventMessage::from(RawHostEvent::BlockBroken {
                player: steve.clone(),
                block: "iron_ore".to_string(),
            }));
        }
        app.update();

        let collected = app.world().resource::<Collected>();
        assert_eq!(collected.rewards.len(), 10);
        assert!(collected.rewards.iter().all(|reward| reward.job == "miner"));
        assert!(collected.level_ups.is_empty());
        assert!(collected
            .chat
            .iter()
            .all(|line| line.kind == ChatLineKind::Reply && line.player.as_ref() == Some(&steve)));

        let activity = app.world().resource::<JobActivityLog>();
        assert_eq!(activity.records().count(), 10);
        assert!(matches!(
            activity.records().next().map(|record| &record.event),
            Some(JobActivityEvent::Reward { .. })
        ));
    }

    #[test]
    fn crossing_a_threshold_publishes_a_level_up() {
        let store = test_support::store();
        let leveling: toml::Value = toml::from_str("mode = \"linear\"\nbase = 2.0\nincrement = 0.0")
            .unwrap();
        store.set(SETTINGS_FILE, "leveling", leveling).unwrap();
        let context = test_support::context_with(
            store,
            EconomyBridge::new(Box::new(LocalLedger::new())),
        );
        let mut app = app_with(context);
        let steve = PlayerId::new("steve");
        commands::join_job(app.world().resource::<JobsContext>(), &steve, "miner").unwrap();

        for _ in 0..2 {
            app.world_mut().write_message(HostEventMessage::from(RawHostEvent::BlockBroken {
                player: steve.clone(),
                block: "stone".to_string(),
            }));
        }
        app.update();

        let collected = app.world().resource::<Collected>();
        assert_eq!(collected.level_ups.len(), 1);
        assert_eq!(collected.level_ups[0].level, 1);
        assert!(collected
            .chat
            .iter()
            .any(|line| line.text == "Your Miner level is now 1!"));
    }

    #[test]
    fn chat_lines_are_broadcast_with_prefixes() {
        let mut app = app();
        let steve = PlayerId::new("steve");
        commands::join_job(app.world().resource::<JobsContext>(), &steve, "miner").unwrap();

        app.world_mut().write_message(HostEventMessage::from(RawHostEvent::ChatMessage {
            player: steve.clone(),
            message: "anyone seen diamonds?".to_string(),
        }));
        app.update();

        let collected = app.world().resource::<Collected>();
        let broadcast: Vec<_> = collected
            .chat
            .iter()
            .filter(|line| line.kind == ChatLineKind::Broadcast)
            .collect();
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].text, "[Miner 0] anyone seen diamonds?");
        assert!(collected.rewards.is_empty());
    }
}
