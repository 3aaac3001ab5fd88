//! Economy service contract and the bridge that pays out authorised rewards.
use std::fmt;

use bevy::log::{debug, warn};

use crate::jobs::{evaluator::RewardResult, types::PlayerId};

/// Failures reported by an economy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum EconomyError {
    AccountNotFound { player: PlayerId },
    ServiceUnavailable { reason: String },
    Rejected { reason: String },
}

impl EconomyError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for EconomyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountNotFound { player } => write!(f, "no economy account for {}", player),
            Self::ServiceUnavailable { reason } => {
                write!(f, "economy service unavailable: {}", reason)
            }
            Self::Rejected { reason } => write!(f, "economy service rejected mutation: {}", reason),
        }
    }
}

impl std::error::Error for EconomyError {}

/// Confirmation of a completed balance mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub transaction_id: String,
    pub player: PlayerId,
    pub amount: f64,
    pub currency: String,
    pub balance: Option<f64>,
}

/// Contract every economy backend must satisfy.
pub trait EconomyService: Send + Sync + 'static {
    fn provider_name(&self) -> &str;

    fn get_or_create_account(&self, player: &PlayerId) -> Result<(), EconomyError>;

    fn deposit(
        &self,
        player: &PlayerId,
        amount: f64,
        currency: &str,
        reason: &str,
    ) -> Result<Receipt, EconomyError>;
}

/// Pass-through to the active economy service. With no service attached,
/// rewards are disabled while everything else keeps working.
pub struct EconomyBridge {
    service: Option<Box<dyn EconomyService>>,
}

impl EconomyBridge {
    pub fn new(service: Box<dyn EconomyService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    pub fn disabled() -> Self {
        Self { service: None }
    }

    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.service.as_deref().map(|service| service.provider_name())
    }

    /// Makes sure the player has an account before rewards arrive.
    pub fn open_account(&self, player: &PlayerId) -> Result<(), EconomyError> {
        let Some(service) = self.service.as_deref() else {
            return Err(EconomyError::unavailable("no economy provider registered"));
        };
        service.get_or_create_account(player).inspect_err(|err| {
            warn!(target: "economy", "Could not open an account for {}: {}", player, err);
        })
    }

    /// Deposits an evaluator-approved reward. Failures are logged here and
    /// returned; callers drop the reward and carry on.
    pub fn apply_reward(
        &self,
        player: &PlayerId,
        reward: &RewardResult,
    ) -> Result<Receipt, EconomyError> {
        let Some(service) = self.service.as_deref() else {
            return Err(EconomyError::unavailable("no economy provider registered"));
        };

        match service.deposit(player, reward.amount(), reward.currency(), reward.job()) {
            Ok(receipt) => {
                debug!(
                    target: "economy",
                    "Paid {} {} to {} for job '{}' ({})",
                    receipt.amount,
                    receipt.currency,
                    player,
                    reward.job(),
                    receipt.transaction_id
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(
                    target: "economy",
                    "Dropping {} {} reward for {} (job '{}'): {}",
                    reward.amount(),
                    reward.currency(),
                    player,
                    reward.job(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl fmt::Debug for EconomyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EconomyBridge")
            .field("provider", &self.provider_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::jobs::{
        catalog::{Job, JobCatalog, RewardFormula, RewardRule, TargetPattern},
        evaluator::evaluate,
        membership::Membership,
        settings::Settings,
        types::ActionType,
    };

    struct CountingService {
        calls: Arc<AtomicUsize>,
        outcome: Result<(), EconomyError>,
    }

    impl CountingService {
        fn boxed(calls: &Arc<AtomicUsize>, outcome: Result<(), EconomyError>) -> Box<Self> {
            Box::new(Self {
                calls: calls.clone(),
                outcome,
            })
        }
    }

    impl EconomyService for CountingService {
        fn provider_name(&self) -> &str {
            "counting"
        }

        fn get_or_create_account(&self, _player: &PlayerId) -> Result<(), EconomyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }

        fn deposit(
            &self,
            player: &PlayerId,
            amount: f64,
            currency: &str,
            _reason: &str,
        ) -> Result<Receipt, EconomyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map(|_| Receipt {
                transaction_id: "TX-1".to_string(),
                player: player.clone(),
                amount,
                currency: currency.to_string(),
                balance: None,
            })
        }
    }

    fn stone_reward() -> RewardResult {
        let mut miner = Job::new("miner", "Miner");
        miner.rewards.push(RewardRule::new(
            ActionType::Break,
            TargetPattern::parse("stone").unwrap(),
            RewardFormula::new(5.0, 0.0).unwrap(),
        ));
        let catalog = JobCatalog::new(vec![miner], Default::default());
        let memberships = [Membership {
            player: PlayerId::new("p1"),
            job: "miner".to_string(),
            level: 0,
            experience: 0.0,
        }];
        evaluate(
            &catalog,
            &Settings::default(),
            &memberships,
            ActionType::Break,
            "stone",
        )
        .expect("rule matches")
    }

    #[test]
    fn bridge_forwards_authorised_rewards() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bridge = EconomyBridge::new(Box::new(CountingService {
            calls: calls.clone(),
            outcome: Ok(()),
        }));

        let receipt = bridge
            .apply_reward(&PlayerId::new("p1"), &stone_reward())
            .expect("deposit succeeds");
        assert_eq!(receipt.amount, 5.0);
        assert_eq!(receipt.currency, "dollars");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.provider_name(), Some("counting"));
    }

    #[test]
    fn accounts_are_opened_through_the_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bridge = EconomyBridge::new(CountingService::boxed(&calls, Ok(())));
        assert!(bridge.open_account(&PlayerId::new("p1")).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let failing = EconomyBridge::new(CountingService::boxed(
            &calls,
            Err(EconomyError::unavailable("offline")),
        ));
        assert!(failing.open_account(&PlayerId::new("p1")).is_err());
        assert!(EconomyBridge::disabled()
            .open_account(&PlayerId::new("p1"))
            .is_err());
    }

    #[test]
    fn failures_are_returned_not_panicked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let bridge = EconomyBridge::new(Box::new(CountingService {
            calls: calls.clone(),
            outcome: Err(EconomyError::unavailable("offline")),
        }));
        let error = bridge
            .apply_reward(&PlayerId::new("p1"), &stone_reward())
            .expect_err("service is offline");
        assert!(matches!(error, EconomyError::ServiceUnavailable { .. }));

        let disabled = EconomyBridge::disabled();
        assert!(!disabled.is_available());
        assert!(disabled
            .apply_reward(&PlayerId::new("p1"), &stone_reward())
            .is_err());
    }
}
