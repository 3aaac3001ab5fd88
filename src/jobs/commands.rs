//! Operator and player commands. Each operation maps onto one catalog or
//! membership call; `execute` parses `/jobs ...` lines and renders replies.
use bevy::log::info;

use super::{
    catalog::{capitalise, normalise_job_name, Job, RewardFormula, RewardRule, TargetPattern},
    context::JobsContext,
    errors::{CatalogEditError, MembershipError},
    membership::Membership,
    types::{ActionType, PlayerId},
};

pub fn create_job(
    context: &JobsContext,
    name: &str,
    display_name: Option<&str>,
) -> Result<Job, CatalogEditError> {
    let name = normalise_job_name(name).ok_or_else(|| CatalogEditError::InvalidName {
        name: name.to_string(),
    })?;
    let display_name = display_name
        .map(str::trim)
        .filter(|display| !display.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| capitalise(&name));

    let job = context.edit_catalog(|catalog| {
        let job = Job::new(name.clone(), display_name);
        let next = catalog
            .with_job(job.clone())
            .ok_or_else(|| CatalogEditError::DuplicateJob { job: name.clone() })?;
        Ok((next, job))
    })?;
    info!(target: "jobs", "Created job '{}'", job.name);
    Ok(job)
}

/// Existing memberships to the job become orphaned and stop earning.
pub fn delete_job(context: &JobsContext, name: &str) -> Result<Job, CatalogEditError> {
    let job = context.edit_catalog(|catalog| {
        catalog
            .without_job(name)
            .ok_or_else(|| CatalogEditError::UnknownJob {
                job: name.trim().to_ascii_lowercase(),
            })
    })?;
    info!(target: "jobs", "Deleted job '{}'", job.name);
    Ok(job)
}

/// Properties: `display-name`, `color`, `reward` (`action:target:amount[:per_level]`)
/// and `clear-rewards`.
pub fn set_job_property(
    context: &JobsContext,
    name: &str,
    property: &str,
    value: &str,
) -> Result<Job, CatalogEditError> {
    context.edit_catalog(|catalog| {
        let unknown = || CatalogEditError::UnknownJob {
            job: name.trim().to_ascii_lowercase(),
        };
        let mut job = catalog.get_job(name).cloned().ok_or_else(unknown)?;
        apply_property(&mut job, property, value)?;
        let next = catalog.with_replaced(job.clone()).ok_or_else(unknown)?;
        Ok((next, job))
    })
}

fn apply_property(job: &mut Job, property: &str, value: &str) -> Result<(), CatalogEditError> {
    let value = value.trim();
    let invalid = |reason: &str| CatalogEditError::InvalidValue {
        property: property.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match property.trim().to_ascii_lowercase().as_str() {
        "display-name" | "displayname" | "display_name" => {
            if value.is_empty() {
                return Err(invalid("display name cannot be empty"));
            }
            job.display_name = value.to_string();
        }
        "color" | "colour" => {
            job.color = match value.to_ascii_lowercase().as_str() {
                "" | "none" => None,
                color => Some(color.to_string()),
            };
        }
        "reward" => {
            let rule = parse_reward_spec(value).map_err(|reason| invalid(&reason))?;
            job.rewards.push(rule);
        }
        "clear-rewards" => job.rewards.clear(),
        other => {
            return Err(CatalogEditError::UnknownProperty {
                property: other.to_string(),
            })
        }
    }
    Ok(())
}

/// `break:stone:5`, `break:minecraft:iron_ore:2:0.5`, `kill:*:1`.
fn parse_reward_spec(spec: &str) -> Result<RewardRule, String> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if parts.len() < 3 {
        return Err("expected action:target:amount[:per_level]".to_string());
    }

    let action =
        ActionType::parse(parts[0]).ok_or_else(|| format!("unknown action '{}'", parts[0]))?;

    let numbers: Vec<Option<f64>> = parts.iter().map(|part| part.parse::<f64>().ok()).collect();
    let last = parts.len() - 1;
    let (target_end, amount, per_level) = match (numbers[last - 1], numbers[last]) {
        (Some(amount), Some(per_level)) if parts.len() >= 4 => (last - 1, amount, per_level),
        (_, Some(amount)) => (last, amount, 0.0),
        _ => return Err(format!("'{}' is not a number", parts[last])),
    };

    let target = TargetPattern::parse(&parts[1..target_end].join(":"))?;
    let formula = RewardFormula::new(amount, per_level)?;
    Ok(RewardRule::new(action, target, formula))
}

pub fn join_job(
    context: &JobsContext,
    player: &PlayerId,
    name: &str,
) -> Result<Membership, MembershipError> {
    context.memberships().join(player, &context.catalog(), name)
}

pub fn leave_job(
    context: &JobsContext,
    player: &PlayerId,
    name: &str,
) -> Result<(), MembershipError> {
    context.memberships().leave(player, name)
}

pub fn list_jobs(context: &JobsContext) -> Vec<Job> {
    context.catalog().list_jobs().cloned().collect()
}

pub fn job_info(context: &JobsContext, name: &str) -> Option<Job> {
    context.catalog().get_job(name).cloned()
}

/// Runs one `/jobs` command line (with or without the leading `/jobs`) and
/// returns the reply lines for the sender. `sender` is `None` for the console.
pub fn execute(context: &JobsContext, sender: Option<&PlayerId>, line: &str) -> Vec<String> {
    let messages = context.messages();
    let mut words = line.split_whitespace().peekable();
    if words
        .peek()
        .is_some_and(|word| word.trim_start_matches('/').eq_ignore_ascii_case("jobs"))
    {
        words.next();
    }
    let subcommand = words.next().map(str::to_ascii_lowercase);
    let args: Vec<&str> = words.collect();

    let usage = || vec![messages.render("command.usage", &[])];
    let catalog_error =
        |err: CatalogEditError| vec![messages.render("error.catalog", &[("reason", &err.to_string())])];

    match (subcommand.as_deref(), args.as_slice()) {
        (None, _) | (Some("list"), _) => {
            let jobs = list_jobs(context);
            if jobs.is_empty() {
                return vec![messages.render("job.list.empty", &[])];
            }
            let mut lines = vec![messages.render("job.list.header", &[])];
            lines.extend(jobs.iter().map(|job| {
                messages.render(
                    "job.list.entry",
                    &[("display", &job.display_name), ("job", &job.name)],
                )
            }));
            lines
        }
        (Some("info"), [name, ..]) => {
            let Some(job) = job_info(context, name) else {
                return vec![messages.render("error.unknown-job", &[("job", *name)])];
            };
            let mut lines = vec![messages.render("job.info.header", &[("job", &job.display_name)])];
            lines.extend(
                job.rewards
                    .iter()
                    .map(|rule| messages.render("job.info.rule", &[("rule", &rule.describe())])),
            );
            let progress = sender.and_then(|player| {
                context
                    .memberships()
                    .get_memberships(player)
                    .into_iter()
                    .find(|membership| membership.job == job.name)
            });
            if let Some(membership) = progress {
                let settings = context.settings();
                let next = membership
                    .level
                    .checked_add(1)
                    .and_then(|level| settings.leveling.experience_for_level(level))
                    .map(|threshold| threshold.to_string())
                    .unwrap_or_else(|| "max".to_string());
                lines.push(messages.render(
                    "job.info.progress",
                    &[
                        ("level", &membership.level.to_string()),
                        ("experience", &membership.experience.to_string()),
                        ("next", &next),
                    ],
                ));
            }
            lines
        }
        (Some("join"), [name, ..]) => {
            let Some(player) = sender else {
                return vec![messages.render("command.player-only", &[])];
            };
            match join_job(context, player, name) {
                Ok(membership) => {
                    let display = display_name(context, &membership.job);
                    let mut lines = vec![messages.render("job.joined", &[("job", &display)])];
                    if !context.economy().is_available() {
                        lines.push(messages.render("error.no-economy", &[]));
                    }
                    lines
                }
                Err(err) => vec![membership_error(context, &err)],
            }
        }
        (Some("leave"), rest) => {
            let Some(player) = sender else {
                return vec![messages.render("command.player-only", &[])];
            };
            let name = match rest.first() {
                Some(name) => name.to_string(),
                None => match context.memberships().get_memberships(player).as_slice() {
                    [only] => only.job.clone(),
                    _ => return usage(),
                },
            };
            match leave_job(context, player, &name) {
                Ok(()) => {
                    let display = display_name(context, &name);
                    vec![messages.render("job.left", &[("job", &display)])]
                }
                Err(err) => vec![membership_error(context, &err)],
            }
        }
        (Some("create"), [name, display @ ..]) => {
            let display = display.join(" ");
            match create_job(context, name, Some(display.as_str())) {
                Ok(job) => vec![messages.render("job.created", &[("job", &job.display_name)])],
                Err(err) => catalog_error(err),
            }
        }
        (Some("delete"), [name, ..]) => match delete_job(context, name) {
            Ok(job) => vec![messages.render("job.deleted", &[("job", &job.display_name)])],
            Err(err) => catalog_error(err),
        },
        (Some("set"), [name, property, value @ ..]) => {
            let value = value.join(" ");
            match set_job_property(context, name, property, &value) {
                Ok(job) => vec![messages.render(
                    "job.updated",
                    &[
                        ("job", &job.display_name),
                        ("property", *property),
                        ("value", &value),
                    ],
                )],
                Err(err) => catalog_error(err),
            }
        }
        (Some("reload"), _) => {
            let reloaded = context
                .reload_catalog()
                .and_then(|count| context.reload_settings().map(|_| count));
            match reloaded {
                Ok(count) => vec![messages.render("command.reloaded", &[("count", &count.to_string())])],
                Err(err) => vec![messages.render("error.reload", &[("reason", &err.to_string())])],
            }
        }
        _ => usage(),
    }
}

pub(crate) fn display_name(context: &JobsContext, job: &str) -> String {
    context
        .catalog()
        .get_job(job)
        .map(|job| job.display_name.clone())
        .unwrap_or_else(|| capitalise(job))
}

pub(crate) fn membership_error(context: &JobsContext, error: &MembershipError) -> String {
    let key = error.message_key();
    match error {
        MembershipError::UnknownJob { job }
        | MembershipError::AlreadyMember { job, .. }
        | MembershipError::NotMember { job, .. } => context
            .messages()
            .render(key, &[("job", &display_name(context, job))]),
        MembershipError::MaxJobsExceeded { max, .. } => context
            .messages()
            .render(key, &[("max", &max.to_string())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        economy::EconomyBridge,
        jobs::{catalog::JOBS_FILE, context::test_support, settings::SETTINGS_FILE},
        storage::KeyValueStore,
    };

    #[test]
    fn create_edit_and_delete_persist_to_the_store() {
        let store = test_support::store();
        let context = test_support::context_with(store.clone(), EconomyBridge::disabled());

        let job = create_job(&context, "Woodcutter", None).unwrap();
        assert_eq!(job.name, "woodcutter");
        assert_eq!(job.display_name, "Woodcutter");
        assert!(matches!(
            create_job(&context, "woodcutter", None),
            Err(CatalogEditError::DuplicateJob { .. })
        ));
        assert!(matches!(
            create_job(&context, "wood cutter", None),
            Err(CatalogEditError::InvalidName { .. })
        ));

        let job = set_job_property(&context, "woodcutter", "reward", "break:*_log:1.5:0.25").unwrap();
        assert_eq!(job.rewards.len(), 1);
        assert_eq!(job.rewards[0].formula.amount(2), 2.0);
        assert!(context
            .evaluate(&PlayerId::new("nobody"), ActionType::Break, "oak_log")
            .is_none());

        let reloaded = crate::jobs::catalog::JobCatalog::load(store.as_ref()).unwrap();
        assert_eq!(reloaded.get_job("woodcutter").unwrap().rewards.len(), 1);

        delete_job(&context, "woodcutter").unwrap();
        assert!(!context.catalog().contains("woodcutter"));
        assert!(store.get(JOBS_FILE, "jobs").unwrap().is_some());
    }

    #[test]
    fn property_errors_leave_the_job_unchanged() {
        let context = test_support::context();

        assert!(matches!(
            set_job_property(&context, "miner", "salary", "5"),
            Err(CatalogEditError::UnknownProperty { .. })
        ));
        assert!(matches!(
            set_job_property(&context, "miner", "reward", "dance:stone:5"),
            Err(CatalogEditError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_job_property(&context, "miner", "reward", "break:stone:-1"),
            Err(CatalogEditError::InvalidValue { .. })
        ));
        assert!(matches!(
            set_job_property(&context, "pilot", "color", "red"),
            Err(CatalogEditError::UnknownJob { .. })
        ));
        assert_eq!(context.catalog().get_job("miner").unwrap().rewards.len(), 2);
    }

    #[test]
    fn reward_specs_accept_namespaced_targets() {
        let rule = parse_reward_spec("break:minecraft:iron_ore:2:0.5").unwrap();
        assert_eq!(rule.target, TargetPattern::Exact("iron_ore".to_string()));
        assert_eq!(rule.formula.per_level(), 0.5);

        let rule = parse_reward_spec("kill:zombie:3").unwrap();
        assert_eq!(rule.action, ActionType::Kill);
        assert_eq!(rule.formula.base(), 3.0);

        assert!(parse_reward_spec("break:stone").is_err());
        assert!(parse_reward_spec("break:stone:lots").is_err());
    }

    #[test]
    fn command_lines_render_replies() {
        let context = test_support::context();
        let steve = PlayerId::new("steve");

        let lines = execute(&context, None, "/jobs list");
        assert_eq!(lines[0], "Available jobs:");
        assert_eq!(lines[1], "- Miner (miner)");

        assert_eq!(
            execute(&context, None, "join miner"),
            vec!["Only players can use this command.".to_string()]
        );
        assert_eq!(
            execute(&context, Some(&steve), "join miner"),
            vec!["You are now working as a Miner.".to_string()]
        );
        assert_eq!(
            execute(&context, Some(&steve), "join farmer"),
            vec!["You cannot hold more than 1 job(s).".to_string()]
        );

        let info = execute(&context, Some(&steve), "info miner");
        assert_eq!(info[0], "Miner pays for:");
        assert_eq!(info.last().unwrap(), "You are level 0 with 0/50 experience.");

        assert_eq!(
            execute(&context, Some(&steve), "leave"),
            vec!["You are no longer working as a Miner.".to_string()]
        );
        assert_eq!(
            execute(&context, Some(&steve), "leave miner"),
            vec!["You do not work as a Miner.".to_string()]
        );
        assert_eq!(
            execute(&context, Some(&steve), "join pilot"),
            vec!["Job pilot does not exist.".to_string()]
        );
        assert_eq!(
            execute(&context, None, "info pilot"),
            vec!["Job pilot does not exist.".to_string()]
        );
        assert_eq!(
            execute(&context, None, "jobs dance"),
            vec![context.messages().render("command.usage", &[])]
        );
    }

    #[test]
    fn info_at_the_highest_level_shows_max() {
        let store = test_support::store();
        let leveling: toml::Value =
            toml::from_str("mode = \"linear\"\nbase = 0.001\nincrement = 0.0").unwrap();
        store.set(SETTINGS_FILE, "leveling", leveling).unwrap();
        let context = test_support::context_with(store, EconomyBridge::disabled());
        let steve = PlayerId::new("steve");
        join_job(&context, &steve, "miner").unwrap();

        let update = context
            .memberships()
            .record_progress(&steve, "miner", 1.0e8)
            .unwrap();
        assert_eq!(update.membership.level, u32::MAX);

        let info = execute(&context, Some(&steve), "info miner");
        assert_eq!(
            info.last().unwrap(),
            &format!("You are level {} with 100000000/max experience.", u32::MAX)
        );
    }

    #[test]
    fn console_can_create_and_configure_jobs() {
        let context = test_support::context();

        assert_eq!(
            execute(&context, None, "create fisher Deep Sea Fisher"),
            vec!["Created job Deep Sea Fisher.".to_string()]
        );
        assert_eq!(
            execute(&context, None, "set fisher color aqua"),
            vec!["Set color of Deep Sea Fisher to aqua.".to_string()]
        );
        assert_eq!(
            context.catalog().get_job("fisher").unwrap().color.as_deref(),
            Some("aqua")
        );
        assert_eq!(
            execute(&context, None, "reload"),
            vec!["Reloaded 3 job(s) and settings.".to_string()]
        );
    }
}
