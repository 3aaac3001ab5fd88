//! Rolling record of job payouts, level-ups and dropped rewards.
use std::{
    collections::VecDeque,
    fs::{create_dir_all, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use bevy::{
    log::{trace, warn},
    prelude::*,
};
use serde::Serialize;

use super::events::{JobLevelUpMessage, JobPaymentFailedMessage, JobRewardMessage};

const DEFAULT_ACTIVITY_CAPACITY: usize = 64;

/// Most recent job activity, oldest dropped first.
#[derive(Resource, Debug)]
pub struct JobActivityLog {
    capacity: usize,
    records: VecDeque<JobActivityRecord>,
}

impl JobActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::new(),
        }
    }

    /// Returns the record evicted to make room, if any.
    pub fn push(&mut self, record: JobActivityRecord) -> Option<JobActivityRecord> {
        let evicted = if self.records.len() == self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn records(&self) -> impl Iterator<Item = &JobActivityRecord> {
        self.records.iter()
    }
}

impl Default for JobActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobActivityRecord {
    pub occurred_at_seconds: f64,
    pub player: String,
    pub job: String,
    #[serde(flatten)]
    pub event: JobActivityEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum JobActivityEvent {
    Reward {
        amount: f64,
        currency: String,
        transaction_id: String,
    },
    LevelUp {
        level: u32,
    },
    PaymentFailed {
        reason: String,
    },
}

/// Copies reward, level-up and failure messages into the activity log.
pub fn record_job_activity(
    time: Res<Time>,
    mut activity: ResMut<JobActivityLog>,
    mut file: ResMut<JobActivityFile>,
    mut rewards: MessageReader<JobRewardMessage>,
    mut level_ups: MessageReader<JobLevelUpMessage>,
    mut failures: MessageReader<JobPaymentFailedMessage>,
) {
    let now = time.elapsed_secs_f64();
    let mut record = |player: &dyn ToString, job: &str, event: JobActivityEvent| {
        let record = JobActivityRecord {
            occurred_at_seconds: now,
            player: player.to_string(),
            job: job.to_string(),
            event,
        };
        file.push(&record);
        if let Some(evicted) = activity.push(record) {
            trace!(
                target: "jobs",
                "Activity log full; dropped {} record for {} from {:.1}s",
                evicted.job,
                evicted.player,
                evicted.occurred_at_seconds
            );
        }
    };

    for message in rewards.read() {
        record(
            &message.player,
            &message.job,
            JobActivityEvent::Reward {
                amount: message.amount,
                currency: message.currency.clone(),
                transaction_id: message.transaction_id.clone(),
            },
        );
    }
    for message in level_ups.read() {
        record(
            &message.player,
            &message.job,
            JobActivityEvent::LevelUp {
                level: message.level,
            },
        );
    }
    for message in failures.read() {
        record(
            &message.player,
            &message.job,
            JobActivityEvent::PaymentFailed {
                reason: message.error.to_string(),
            },
        );
    }
}

/// Appends activity records to a JSON-lines file. Off unless a path is
/// configured.
#[derive(Resource, Debug, Default)]
pub struct JobActivityFile {
    output_path: Option<PathBuf>,
    pending: Vec<JobActivityRecord>,
}

impl JobActivityFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: Some(path.into()),
            pending: Vec::new(),
        }
    }

    /// Enabled only when `JOBS_ACTIVITY_LOG` names a file.
    pub fn from_env() -> Self {
        Self::from_setting(std::env::var("JOBS_ACTIVITY_LOG").ok().as_deref())
    }

    fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(path) if !path.is_empty() && !path.eq_ignore_ascii_case("off") => {
                Self::new(path)
            }
            _ => Self::default(),
        }
    }

    pub fn push(&mut self, record: &JobActivityRecord) {
        if self.output_path.is_some() {
            self.pending.push(record.clone());
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        let Some(path) = self.output_path.as_deref() else {
            return Ok(());
        };
        if self.pending.is_empty() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for record in self.pending.drain(..) {
            serde_json::to_writer(&mut file, &record)?;
            file.write_all(b"\n")?;
        }
        file.flush()
    }
}

pub fn flush_job_activity_file(mut file: ResMut<JobActivityFile>) {
    if let Err(err) = file.flush() {
        warn!(
            target: "jobs",
            "Failed to persist job activity to {:?}: {}",
            file.path(),
            err
        );
    }
}
