//! Matches an action against a player's memberships to decide the payout.
use super::{
    catalog::JobCatalog,
    membership::Membership,
    settings::Settings,
    types::{normalise_identifier, ActionType},
};

/// An authorised reward. Only `evaluate` can construct one, so the economy
/// bridge can never pay out something the evaluator did not approve.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardResult {
    job: String,
    amount: f64,
    experience: f64,
    currency: String,
    level: u32,
}

impl RewardResult {
    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Experience to credit once the payment succeeds.
    pub fn experience(&self) -> f64 {
        self.experience
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Level the amount was computed at.
    pub fn level(&self) -> u32 {
        self.level
    }
}

/// First matching rule across the memberships (creation order) wins. Orphaned
/// memberships, whose job no longer exists, are skipped.
pub fn evaluate(
    catalog: &JobCatalog,
    settings: &Settings,
    memberships: &[Membership],
    action: ActionType,
    target: &str,
) -> Option<RewardResult> {
    let target = normalise_identifier(target);

    memberships.iter().find_map(|membership| {
        let job = catalog.get_job(&membership.job)?;
        let rule = job.find_rule(action, &target, catalog.categories())?;
        Some(RewardResult {
            job: job.name.clone(),
            amount: rule.formula.amount(membership.level),
            experience: rule.experience.unwrap_or(settings.experience_per_action),
            currency: rule
                .currency
                .clone()
                .unwrap_or_else(|| settings.default_currency.clone()),
            level: membership.level,
        })
    })
}
