//! Jobs plugin wiring the context resource, host messages and systems.
use std::{env, path::PathBuf, sync::Arc};

use bevy::prelude::*;

use crate::{economy, storage::TomlFileStore};

use super::{
    context::JobsContext,
    events::{
        ChatLineMessage, HostEventMessage, JobLevelUpMessage, JobPaymentFailedMessage,
        JobRewardMessage,
    },
    systems::process_host_events,
    telemetry::{flush_job_activity_file, record_job_activity, JobActivityFile, JobActivityLog},
};

const DEFAULT_DATA_DIR: &str = "config";

/// Builds a `JobsContext` from `data_dir` unless one was inserted beforehand.
pub struct JobsPlugin {
    pub data_dir: PathBuf,
}

impl Default for JobsPlugin {
    fn default() -> Self {
        let data_dir = env::var("JOBS_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        Self {
            data_dir: PathBuf::from(data_dir),
        }
    }
}

impl Plugin for JobsPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<JobsContext>() {
            let store = Arc::new(TomlFileStore::new(self.data_dir.clone()));
            info!(target: "jobs", "Loading jobs data from {}", store.root().display());
            app.insert_resource(JobsContext::new(store, economy::connect_from_env()));
        }
        if !app.world().contains_resource::<JobActivityFile>() {
            app.insert_resource(JobActivityFile::from_env());
        }

        app.init_resource::<JobActivityLog>()
            .add_message::<HostEventMessage>()
            .add_message::<JobRewardMessage>()
            .add_message::<JobLevelUpMessage>()
            .add_message::<JobPaymentFailedMessage>()
            .add_message::<ChatLineMessage>()
            .add_systems(Startup, log_jobs_startup)
            .add_systems(
                Update,
                (
                    process_host_events,
                    record_job_activity,
                    flush_job_activity_file,
                )
                    .chain(),
            );
    }
}

fn log_jobs_startup(context: Res<JobsContext>) {
    let settings = context.settings();
    info!(
        target: "jobs",
        "JobsPlugin initialised with {} job(s) and {} job sign(s); economy provider: {}; max jobs per player: {}",
        context.catalog().len(),
        context.signs().len(),
        context.economy().provider_name().unwrap_or("none"),
        settings.max_jobs
    );
}
