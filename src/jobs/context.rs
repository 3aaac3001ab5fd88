//! The explicit context shared by every jobs component. Built once at startup
//! and inserted as a Bevy resource; nothing in the crate is a global.
use std::sync::{Arc, PoisonError, RwLock};

use bevy::{
    log::{debug, info, warn},
    prelude::Resource,
};

use crate::{
    economy::{EconomyBridge, EconomyError, Receipt},
    host::ActionEvent,
    storage::KeyValueStore,
};

use super::{
    catalog::JobCatalog,
    errors::{CatalogEditError, ConfigError},
    evaluator::{self, RewardResult},
    membership::{MembershipRules, MembershipStore, ProgressUpdate},
    messages::MessageCatalog,
    settings::Settings,
    signs::SignRegistry,
    types::{ActionType, PlayerId},
};

/// What happened to one classified action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// No membership rule matched.
    NoReward,
    /// No economy provider is connected.
    RewardsDisabled,
    Rewarded {
        reward: RewardResult,
        receipt: Receipt,
        /// `None` when the membership vanished between payment and progress.
        progress: Option<ProgressUpdate>,
    },
    /// The economy refused or could not be reached; the reward is dropped.
    PaymentFailed {
        reward: RewardResult,
        error: EconomyError,
    },
}

#[derive(Resource)]
pub struct JobsContext {
    store: Arc<dyn KeyValueStore>,
    catalog: RwLock<Arc<JobCatalog>>,
    settings: RwLock<Arc<Settings>>,
    memberships: MembershipStore,
    economy: EconomyBridge,
    messages: MessageCatalog,
    signs: SignRegistry,
}

impl JobsContext {
    /// Loads every component from `store`. Configuration problems degrade to
    /// defaults with a warning; the context itself is always constructed.
    pub fn new(store: Arc<dyn KeyValueStore>, economy: EconomyBridge) -> Self {
        let settings = Settings::load_or_default(store.as_ref());
        let catalog = JobCatalog::load(store.as_ref()).unwrap_or_else(|err| {
            warn!(target: "jobs", "Job catalog unavailable ({}). Starting with no jobs.", err);
            JobCatalog::default()
        });
        let memberships = MembershipStore::new(store.clone(), MembershipRules::from(&settings));
        let messages = MessageCatalog::load(store.as_ref());
        let signs = SignRegistry::load(store.clone());

        if !economy.is_available() {
            warn!(
                target: "jobs",
                "No economy service found; rewards are disabled, memberships and catalog stay available."
            );
        }

        Self {
            store,
            catalog: RwLock::new(Arc::new(catalog)),
            settings: RwLock::new(Arc::new(settings)),
            memberships,
            economy,
            messages,
            signs,
        }
    }

    /// Current catalog snapshot. Holders keep the snapshot alive across a
    /// concurrent reload.
    pub fn catalog(&self) -> Arc<JobCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn memberships(&self) -> &MembershipStore {
        &self.memberships
    }

    pub fn economy(&self) -> &EconomyBridge {
        &self.economy
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    pub fn signs(&self) -> &SignRegistry {
        &self.signs
    }

    /// Re-reads `jobs.toml` and swaps the catalog in one step. On failure the
    /// previous catalog stays active.
    pub fn reload_catalog(&self) -> Result<usize, ConfigError> {
        let next = JobCatalog::load(self.store.as_ref())?;
        let count = next.len();
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        info!(target: "jobs", "Reloaded job catalog ({} jobs)", count);
        Ok(count)
    }

    /// Re-reads `settings.toml`, swaps the snapshot and re-derives cached
    /// membership levels against the new curve.
    pub fn reload_settings(&self) -> Result<Arc<Settings>, ConfigError> {
        let next = Arc::new(Settings::load(self.store.as_ref())?);
        self.memberships
            .apply_rules(MembershipRules::from(next.as_ref()));
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        info!(target: "jobs", "Reloaded settings");
        Ok(next)
    }

    /// Runs a catalog edit under the write lock. The edited catalog is saved
    /// before it becomes visible; a failed save leaves the old one in place.
    pub fn edit_catalog<T>(
        &self,
        edit: impl FnOnce(&JobCatalog) -> Result<(JobCatalog, T), CatalogEditError>,
    ) -> Result<T, CatalogEditError> {
        let mut guard = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        let (next, output) = edit(guard.as_ref())?;
        next.save(self.store.as_ref())?;
        *guard = Arc::new(next);
        Ok(output)
    }

    pub fn evaluate(
        &self,
        player: &PlayerId,
        action: ActionType,
        target: &str,
    ) -> Option<RewardResult> {
        let catalog = self.catalog();
        let settings = self.settings();
        let memberships = self.memberships.get_memberships(player);
        evaluator::evaluate(&catalog, &settings, &memberships, action, target)
    }

    /// Evaluates, pays and records progress for one action. Progress is only
    /// recorded once the economy has accepted the payment.
    pub fn process_action(&self, event: &ActionEvent) -> ActionOutcome {
        if !self.economy.is_available() {
            return ActionOutcome::RewardsDisabled;
        }

        let Some(reward) = self.evaluate(&event.player, event.action, &event.target) else {
            return ActionOutcome::NoReward;
        };

        let receipt = match self.economy.apply_reward(&event.player, &reward) {
            Ok(receipt) => receipt,
            Err(error) => return ActionOutcome::PaymentFailed { reward, error },
        };

        let progress = match self.memberships.record_progress(
            &event.player,
            reward.job(),
            reward.experience(),
        ) {
            Ok(update) => {
                if update.leveled_up() {
                    info!(
                        target: "jobs",
                        "{} reached level {} as '{}'",
                        event.player,
                        update.membership.level,
                        update.membership.job
                    );
                }
                Some(update)
            }
            Err(err) => {
                debug!(target: "jobs", "Progress not recorded after payment: {}", err);
                None
            }
        };

        ActionOutcome::Rewarded {
            reward,
            receipt,
            progress,
        }
    }
}


#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::SystemTime,
    };

    use super::{test_support::*, *};
    use crate::{
        economy::{EconomyService, LocalLedger},
        jobs::{catalog::JOBS_FILE, errors::MembershipError, settings::SETTINGS_FILE},
        storage::{KeyValueStore, MemoryStore},
    };

    struct CountingService {
        deposits: Arc<AtomicUsize>,
        fail: bool,
    }

    impl EconomyService for CountingService {
        fn provider_name(&self) -> &str {
            "counting"
        }

        fn get_or_create_account(&self, _player: &PlayerId) -> Result<(), EconomyError> {
            Ok(())
        }

        fn deposit(
            &self,
            player: &PlayerId,
            amount: f64,
            currency: &str,
            _reason: &str,
        ) -> Result<Receipt, EconomyError> {
            self.deposits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EconomyError::unavailable("timed out"));
            }
            Ok(Receipt {
                transaction_id: "tx-1".to_string(),
                player: player.clone(),
                amount,
                currency: currency.to_string(),
                balance: None,
            })
        }
    }

    fn counting(fail: bool) -> (Arc<AtomicUsize>, EconomyBridge) {
        let deposits = Arc::new(AtomicUsize::new(0));
        let bridge = EconomyBridge::new(Box::new(CountingService {
            deposits: deposits.clone(),
            fail,
        }));
        (deposits, bridge)
    }

    fn action(player: &PlayerId, action: ActionType, target: &str) -> ActionEvent {
        ActionEvent {
            player: player.clone(),
            action,
            target: target.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn miner_breaking_stone_is_paid_and_gains_experience() {
        let (deposits, bridge) = counting(false);
        let context = context_with(store(), bridge);
        let steve = PlayerId::new("steve");
        context
            .memberships()
            .join(&steve, &context.catalog(), "Miner")
            .unwrap();

        let reward = context
            .evaluate(&steve, ActionType::Break, "stone")
            .unwrap();
        assert_eq!(reward.job(), "miner");
        assert_eq!(reward.amount(), 5.0);

        let outcome = context.process_action(&action(&steve, ActionType::Break, "stone"));
        let ActionOutcome::Rewarded {
            receipt, progress, ..
        } = outcome
        else {
            panic!("expected a reward, got {outcome:?}");
        };
        assert_eq!(receipt.amount, 5.0);
        assert_eq!(deposits.load(Ordering::SeqCst), 1);
        assert_eq!(progress.unwrap().membership.experience, 1.0);
    }

    #[test]
    fn player_without_memberships_never_reaches_the_economy() {
        let (deposits, bridge) = counting(false);
        let context = context_with(store(), bridge);
        let alex = PlayerId::new("alex");

        assert!(context.evaluate(&alex, ActionType::Break, "stone").is_none());
        assert_eq!(
            context.process_action(&action(&alex, ActionType::Break, "stone")),
            ActionOutcome::NoReward
        );
        assert_eq!(deposits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_payment_drops_reward_without_progress() {
        let (deposits, bridge) = counting(true);
        let context = context_with(store(), bridge);
        let steve = PlayerId::new("steve");
        context
            .memberships()
            .join(&steve, &context.catalog(), "miner")
            .unwrap();

        let outcome = context.process_action(&action(&steve, ActionType::Break, "stone"));
        assert!(matches!(
            outcome,
            ActionOutcome::PaymentFailed {
                error: EconomyError::ServiceUnavailable { .. },
                ..
            }
        ));
        assert_eq!(deposits.load(Ordering::SeqCst), 1);
        assert_eq!(context.memberships().get_memberships(&steve)[0].experience, 0.0);
    }

    #[test]
    fn missing_economy_keeps_memberships_working() {
        let context = context_with(store(), EconomyBridge::disabled());
        let steve = PlayerId::new("steve");

        assert!(context
            .memberships()
            .join(&steve, &context.catalog(), "miner")
            .is_ok());
        assert_eq!(context.catalog().len(), 2);
        assert_eq!(
            context.process_action(&action(&steve, ActionType::Break, "stone")),
            ActionOutcome::RewardsDisabled
        );
    }

    #[test]
    fn catalog_reload_orphans_removed_jobs() {
        let store = store();
        let context = context_with(store.clone(), EconomyBridge::new(Box::new(LocalLedger::new())));
        let steve = PlayerId::new("steve");
        context
            .memberships()
            .join(&steve, &context.catalog(), "miner")
            .unwrap();

        let held = context.catalog();
        let replacement = MemoryStore::new()
            .with_document(
                JOBS_FILE,
                "[[jobs]]\nname = \"farmer\"\n[[jobs.rewards]]\naction = \"break\"\ntarget = \"wheat\"\namount = 1.0\n",
            )
            .unwrap();
        let jobs = replacement.table(JOBS_FILE).unwrap();
        store
            .set(JOBS_FILE, "jobs", jobs.get("jobs").cloned().unwrap())
            .unwrap();
        store.remove(JOBS_FILE, "categories").unwrap();

        assert_eq!(context.reload_catalog().unwrap(), 1);
        assert!(held.contains("miner"));
        assert!(context.evaluate(&steve, ActionType::Break, "stone").is_none());
        assert_eq!(
            context.process_action(&action(&steve, ActionType::Break, "stone")),
            ActionOutcome::NoReward
        );
        assert_eq!(context.memberships().get_memberships(&steve).len(), 1);
    }

    #[test]
    fn readers_keep_their_snapshot_across_concurrent_reloads() {
        let store = store();
        let context = context_with(store.clone(), EconomyBridge::disabled());
        let held = context.catalog();
        let single: toml::Table = toml::from_str("jobs = [{ name = \"hunter\" }]").unwrap();
        store
            .set(JOBS_FILE, "jobs", single.get("jobs").cloned().unwrap())
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = context.catalog();
                        let old = snapshot.contains("miner") && snapshot.len() == 2;
                        let new = snapshot.contains("hunter") && snapshot.len() == 1;
                        assert!(old || new, "torn catalog with {} jobs", snapshot.len());
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    assert_eq!(context.reload_catalog().unwrap(), 1);
                }
            });
        });

        assert!(held.contains("miner"));
        assert_eq!(held.len(), 2);
        assert!(context.catalog().contains("hunter"));
    }

    #[test]
    fn settings_reload_reapplies_membership_rules() {
        let store = store();
        let context = context_with(store.clone(), EconomyBridge::disabled());
        let steve = PlayerId::new("steve");
        let catalog = context.catalog();
        context.memberships().join(&steve, &catalog, "miner").unwrap();
        assert!(matches!(
            context.memberships().join(&steve, &catalog, "farmer"),
            Err(MembershipError::MaxJobsExceeded { .. })
        ));

        store
            .set(SETTINGS_FILE, "max_jobs", toml::Value::Integer(2))
            .unwrap();
        let settings = context.reload_settings().unwrap();
        assert_eq!(settings.max_jobs, 2);
        assert!(context.memberships().join(&steve, &catalog, "farmer").is_ok());
    }

    #[test]
    fn failed_catalog_edit_leaves_catalog_untouched() {
        let context = context();
        let result: Result<(), CatalogEditError> = context.edit_catalog(|_| {
            Err(CatalogEditError::UnknownJob {
                job: "pilot".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(context.catalog().len(), 2);
    }
}
