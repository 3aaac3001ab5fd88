//! Job signs: placed signs that enrol whoever uses them in a job.
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use bevy::log::warn;
use toml::Value;

use crate::storage::{KeyValueStore, StoreError};

use super::catalog::JobCatalog;

pub const SIGNS_FILE: &str = "signs.toml";
pub const SIGN_HEADER: &str = "[Jobs]";

/// Block position of a sign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignLocation {
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl SignLocation {
    pub fn new(world: impl Into<String>, x: i64, y: i64, z: i64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl fmt::Display for SignLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.x, self.y, self.z)
    }
}

impl FromStr for SignLocation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.rsplitn(4, ':');
        let mut coordinate = |axis: &str| {
            parts
                .next()
                .and_then(|part| part.parse::<i64>().ok())
                .ok_or_else(|| format!("missing {axis} coordinate in '{value}'"))
        };
        let z = coordinate("z")?;
        let y = coordinate("y")?;
        let x = coordinate("x")?;
        let world = parts
            .next()
            .filter(|world| !world.is_empty())
            .ok_or_else(|| format!("missing world in '{value}'"))?;
        Ok(Self::new(world, x, y, z))
    }
}

/// Outcome of writing text onto a sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignBinding {
    /// First line is not the jobs header; the sign is ordinary.
    NotAJobSign,
    /// Header present but the named job does not exist.
    UnknownJob(String),
    Bound(String),
}

/// Sign locations bound to job names, persisted in `signs.toml`.
pub struct SignRegistry {
    store: Arc<dyn KeyValueStore>,
    signs: Mutex<HashMap<SignLocation, String>>,
}

impl SignRegistry {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut signs = HashMap::new();
        match store.table(SIGNS_FILE) {
            Ok(table) => {
                for (key, value) in table {
                    match (key.parse::<SignLocation>(), value) {
                        (Ok(location), Value::String(job)) => {
                            signs.insert(location, job);
                        }
                        (Err(err), _) => {
                            warn!(target: "jobs", "Skipping sign entry '{}': {}", key, err)
                        }
                        (Ok(_), other) => warn!(
                            target: "jobs",
                            "Skipping sign entry '{}': expected a job name, found {}",
                            key,
                            other.type_str()
                        ),
                    }
                }
            }
            Err(err) => warn!(target: "jobs", "Failed to read {} ({})", SIGNS_FILE, err),
        }

        Self {
            store,
            signs: Mutex::new(signs),
        }
    }

    /// Binds the sign when its first line is the jobs header and its second
    /// line names an existing job.
    pub fn bind_sign(
        &self,
        catalog: &JobCatalog,
        location: SignLocation,
        lines: &[&str],
    ) -> Result<SignBinding, StoreError> {
        let is_job_sign = lines
            .first()
            .is_some_and(|line| line.trim().eq_ignore_ascii_case(SIGN_HEADER));
        if !is_job_sign {
            return Ok(SignBinding::NotAJobSign);
        }

        let requested = lines.get(1).map(|line| line.trim()).unwrap_or_default();
        let Some(job) = catalog.get_job(requested) else {
            return Ok(SignBinding::UnknownJob(requested.to_string()));
        };

        self.store
            .set(SIGNS_FILE, &location.to_string(), Value::from(job.name.as_str()))?;
        self.lock().insert(location, job.name.clone());
        Ok(SignBinding::Bound(job.name.clone()))
    }

    pub fn unbind_sign(&self, location: &SignLocation) -> Result<Option<String>, StoreError> {
        let removed = self.lock().remove(location);
        if removed.is_some() {
            self.store.remove(SIGNS_FILE, &location.to_string())?;
        }
        Ok(removed)
    }

    pub fn job_at(&self, location: &SignLocation) -> Option<String> {
        self.lock().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SignLocation, String>> {
        self.signs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
