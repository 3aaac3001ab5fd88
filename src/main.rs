use std::path::Path;

use bevy::{log::LogPlugin, prelude::*};

mod economy;
mod host;
mod jobs;
mod storage;

use crate::jobs::JobsPlugin;

fn main() {
    load_secrets_env();

    App::new()
        .add_plugins((MinimalPlugins, LogPlugin::default(), JobsPlugin::default()))
        .run();
}

fn load_secrets_env() {
    const SECRETS_FILE: &str = "secrets.env";

    let path = Path::new(SECRETS_FILE);
    if !path.exists() {
        return;
    }

    if let Err(err) = dotenvy::from_filename(path) {
        eprintln!("Failed to load {}: {}", SECRETS_FILE, err);
    }
}
