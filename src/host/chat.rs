//! Cosmetic job prefixes on chat lines.
use crate::jobs::{catalog::JobCatalog, membership::Membership, settings::Settings};

/// `[Miner] hi` or `[Miner 3] hi`, from the first membership whose job still
/// exists. Passes the message through unchanged when prefixes are disabled.
pub fn decorate_chat(
    settings: &Settings,
    catalog: &JobCatalog,
    memberships: &[Membership],
    message: &str,
) -> String {
    if !settings.option_enabled("chatPrefixes") {
        return message.to_string();
    }

    let active = memberships
        .iter()
        .find_map(|membership| catalog.get_job(&membership.job).map(|job| (job, membership)));
    let Some((job, membership)) = active else {
        return message.to_string();
    };

    if settings.option_enabled("displayLevel") {
        format!("[{} {}] {}", job.display_name, membership.level, message)
    } else {
        format!("[{}] {}", job.display_name, message)
    }
}
