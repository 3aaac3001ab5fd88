//! Player job memberships with progress, cached in memory and persisted to
//! the `playerjobdata` section.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use bevy::log::{debug, warn};
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::storage::{KeyValueStore, StoreError};

use super::{
    catalog::JobCatalog,
    errors::{ConfigError, MembershipError},
    leveling::LevelPolicy,
    settings::Settings,
    types::PlayerId,
};

pub const PLAYER_DATA_FILE: &str = "playerjobdata.toml";

/// A player's enrolment in one job.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub player: PlayerId,
    pub job: String,
    pub level: u32,
    pub experience: f64,
}

/// Result of `record_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub membership: Membership,
    pub previous_level: u32,
}

impl ProgressUpdate {
    pub fn leveled_up(&self) -> bool {
        self.membership.level > self.previous_level
    }
}

/// Validation knobs taken from the settings snapshot.
#[derive(Debug, Clone, Default)]
pub struct MembershipRules {
    pub max_jobs: u32,
    pub leveling: LevelPolicy,
}

impl From<&Settings> for MembershipRules {
    fn from(value: &Settings) -> Self {
        Self {
            max_jobs: value.max_jobs.max(1),
            leveling: value.leveling.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MembershipRecord {
    job: String,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    experience: f64,
}

#[derive(Default)]
struct MembershipState {
    players: HashMap<PlayerId, Vec<Membership>>,
    rules: MembershipRules,
}

/// Validates membership changes and caches per-player records. Every
/// read-modify-write, including the write-back, runs under one lock; file I/O
/// is left to the store.
pub struct MembershipStore {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<MembershipState>,
}

impl MembershipStore {
    pub fn new(store: Arc<dyn KeyValueStore>, rules: MembershipRules) -> Self {
        Self {
            store,
            state: Mutex::new(MembershipState {
                players: HashMap::new(),
                rules,
            }),
        }
    }

    /// Applies new rules. Cached levels are re-derived so they never drift
    /// from the active curve.
    pub fn apply_rules(&self, rules: MembershipRules) {
        let mut state = self.lock();
        for memberships in state.players.values_mut() {
            for membership in memberships.iter_mut() {
                membership.level = rules.leveling.level_for(membership.experience);
            }
        }
        state.rules = rules;
    }

    /// Ensures the player's records are cached and returns them.
    pub fn load_player(&self, player: &PlayerId) -> Vec<Membership> {
        let mut state = self.lock();
        self.hydrate(&mut state, player).clone()
    }

    /// Drops a player's cached records; the next access re-reads the store.
    pub fn unload_player(&self, player: &PlayerId) {
        self.lock().players.remove(player);
    }

    pub fn join(
        &self,
        player: &PlayerId,
        catalog: &JobCatalog,
        job_name: &str,
    ) -> Result<Membership, MembershipError> {
        let job = catalog
            .get_job(job_name)
            .ok_or_else(|| MembershipError::UnknownJob {
                job: job_name.trim().to_ascii_lowercase(),
            })?;

        let mut state = self.lock();
        let max_jobs = state.rules.max_jobs;
        let memberships = self.hydrate(&mut state, player);

        if memberships.iter().any(|membership| membership.job == job.name) {
            return Err(MembershipError::AlreadyMember {
                player: player.clone(),
                job: job.name.clone(),
            });
        }

        let active = memberships
            .iter()
            .filter(|membership| catalog.contains(&membership.job))
            .count();
        if active >= max_jobs as usize {
            return Err(MembershipError::MaxJobsExceeded {
                player: player.clone(),
                max: max_jobs,
            });
        }

        let membership = Membership {
            player: player.clone(),
            job: job.name.clone(),
            level: 0,
            experience: 0.0,
        };
        memberships.push(membership.clone());
        let snapshot = memberships.clone();
        self.persist(player, &snapshot);
        debug!(target: "jobs", "{} joined job '{}'", player, membership.job);
        Ok(membership)
    }

    pub fn leave(&self, player: &PlayerId, job_name: &str) -> Result<(), MembershipError> {
        let job = job_name.trim().to_ascii_lowercase();
        let mut state = self.lock();
        let memberships = self.hydrate(&mut state, player);

        let Some(position) = memberships
            .iter()
            .position(|membership| membership.job == job)
        else {
            return Err(MembershipError::NotMember {
                player: player.clone(),
                job,
            });
        };

        memberships.remove(position);
        let snapshot = memberships.clone();
        self.persist(player, &snapshot);
        debug!(target: "jobs", "{} left job '{}'", player, job);
        Ok(())
    }

    /// Memberships in creation order; empty when the player holds none.
    pub fn get_memberships(&self, player: &PlayerId) -> Vec<Membership> {
        self.load_player(player)
    }

    /// Adds experience and re-derives the level. Negative or non-finite deltas
    /// are treated as zero so experience never decreases.
    pub fn record_progress(
        &self,
        player: &PlayerId,
        job_name: &str,
        experience_delta: f64,
    ) -> Result<ProgressUpdate, MembershipError> {
        let job = job_name.trim().to_ascii_lowercase();
        let delta = if experience_delta.is_finite() {
            experience_delta.max(0.0)
        } else {
            0.0
        };

        let mut state = self.lock();
        let leveling = state.rules.leveling.clone();
        let memberships = self.hydrate(&mut state, player);

        let Some(membership) = memberships
            .iter_mut()
            .find(|membership| membership.job == job)
        else {
            return Err(MembershipError::NotMember {
                player: player.clone(),
                job,
            });
        };

        let previous_level = membership.level;
        membership.experience += delta;
        membership.level = leveling.level_for(membership.experience);
        let update = ProgressUpdate {
            membership: membership.clone(),
            previous_level,
        };
        let snapshot = memberships.clone();
        self.persist(player, &snapshot);
        Ok(update)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MembershipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hydrate<'a>(
        &self,
        state: &'a mut MembershipState,
        player: &PlayerId,
    ) -> &'a mut Vec<Membership> {
        let MembershipState { players, rules } = state;
        players
            .entry(player.clone())
            .or_insert_with(|| self.read_player(player, &rules.leveling))
    }

    fn read_player(&self, player: &PlayerId, leveling: &LevelPolicy) -> Vec<Membership> {
        let value = match self.store.get(PLAYER_DATA_FILE, player.as_str()) {
            Ok(Some(value)) => value,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(
                    target: "jobs",
                    "Failed to read job data for {} ({}). Starting empty.",
                    player, err
                );
                return Vec::new();
            }
        };

        let entries = match value {
            Value::Array(entries) => entries,
            single @ Value::Table(_) => vec![single],
            other => {
                warn_record(player, "record", format!("expected a list, found {}", other.type_str()));
                return Vec::new();
            }
        };

        let mut memberships: Vec<Membership> = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let record = match entry.try_into::<MembershipRecord>() {
                Ok(record) => record,
                Err(err) => {
                    warn_record(player, format!("[{position}]"), err.to_string());
                    continue;
                }
            };

            let job = record.job.trim().to_ascii_lowercase();
            if memberships.iter().any(|membership| membership.job == job) {
                warn_record(player, job, "duplicate membership".to_string());
                continue;
            }

            let experience = if record.experience.is_finite() {
                record.experience.max(0.0)
            } else {
                0.0
            };
            let level = leveling.level_for(experience);
            if level != record.level {
                debug!(
                    target: "jobs",
                    "Stored level {} for {} in '{}' re-derived as {}",
                    record.level, player, job, level
                );
            }
            memberships.push(Membership {
                player: player.clone(),
                job,
                level,
                experience,
            });
        }
        memberships
    }

    fn persist(&self, player: &PlayerId, memberships: &[Membership]) {
        let result = if memberships.is_empty() {
            self.store
                .remove(PLAYER_DATA_FILE, player.as_str())
                .map(|_| ())
        } else {
            memberships
                .iter()
                .map(|membership| {
                    Value::try_from(MembershipRecord {
                        job: membership.job.clone(),
                        level: membership.level,
                        experience: membership.experience,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| StoreError::serialize(PLAYER_DATA_FILE, err))
                .and_then(|records| {
                    self.store
                        .set(PLAYER_DATA_FILE, player.as_str(), Value::Array(records))
                })
        };

        if let Err(err) = result {
            warn!(
                target: "jobs",
                "Failed to persist job data for {} ({}). Keeping in-memory state.",
                player, err
            );
        }
    }
}

fn warn_record(player: &PlayerId, entry: impl Into<String>, reason: String) {
    let error = ConfigError::invalid_entry(
        PLAYER_DATA_FILE,
        format!("{}{}", player, entry.into()),
        reason,
    );
    warn!(target: "jobs", "Skipping player job record: {}", error);
}
