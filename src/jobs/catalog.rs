//! Job definitions, reward rules and the catalog loaded from `jobs.toml`.
use std::collections::HashMap;

use bevy::log::{info, warn};
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::storage::{KeyValueStore, StoreError};

use super::{
    errors::ConfigError,
    types::{normalise_identifier, ActionType},
};

pub const JOBS_FILE: &str = "jobs.toml";

/// Target matcher for a reward rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPattern {
    /// `*`
    Any,
    /// `stone`
    Exact(String),
    /// `*_ore`, `oak_*`, `*wool*`
    Glob(String),
    /// `#ores`, resolved through the catalog's named categories.
    Category(String),
}

impl TargetPattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("target cannot be empty".to_string());
        }
        if trimmed == "*" {
            return Ok(Self::Any);
        }
        if let Some(category) = trimmed.strip_prefix('#') {
            let category = category.trim().to_ascii_lowercase();
            if category.is_empty() {
                return Err("category name cannot be empty".to_string());
            }
            return Ok(Self::Category(category));
        }
        let normalised = normalise_identifier(trimmed);
        if normalised.contains('*') {
            Ok(Self::Glob(normalised))
        } else {
            Ok(Self::Exact(normalised))
        }
    }

    /// `target` must already be normalised.
    pub fn matches(&self, target: &str, categories: &HashMap<String, Vec<String>>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == target,
            Self::Glob(pattern) => glob_matches(pattern, target),
            Self::Category(name) => categories
                .get(name)
                .is_some_and(|members| members.iter().any(|member| glob_matches(member, target))),
        }
    }

    pub fn to_config_string(&self) -> String {
        match self {
            Self::Any => "*".to_string(),
            Self::Exact(value) | Self::Glob(value) => value.clone(),
            Self::Category(name) => format!("#{name}"),
        }
    }
}

fn glob_matches(pattern: &str, target: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return target.is_empty();
    };
    let Some(mut rest) = target.strip_prefix(first) else {
        return false;
    };

    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Payout for a matched rule: `base + per_level * level`. Both terms are
/// validated non-negative at load time, so the amount never goes negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardFormula {
    base: f64,
    per_level: f64,
}

impl RewardFormula {
    pub fn new(base: f64, per_level: f64) -> Result<Self, String> {
        if !base.is_finite() || base < 0.0 {
            return Err(format!("base amount must be a non-negative number (got {base})"));
        }
        if !per_level.is_finite() || per_level < 0.0 {
            return Err(format!(
                "per-level scaling must be a non-negative number (got {per_level})"
            ));
        }
        Ok(Self { base, per_level })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn per_level(&self) -> f64 {
        self.per_level
    }

    pub fn amount(&self, level: u32) -> f64 {
        self.base + self.per_level * f64::from(level)
    }
}

/// A single `(action, target) -> formula` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardRule {
    pub action: ActionType,
    pub target: TargetPattern,
    pub formula: RewardFormula,
    pub experience: Option<f64>,
    pub currency: Option<String>,
}

impl RewardRule {
    pub fn new(action: ActionType, target: TargetPattern, formula: RewardFormula) -> Self {
        Self {
            action,
            target,
            formula,
            experience: None,
            currency: None,
        }
    }

    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} {}: {}",
            self.action,
            self.target.to_config_string(),
            self.formula.base()
        );
        if self.formula.per_level() > 0.0 {
            line.push_str(&format!(" (+{} per level)", self.formula.per_level()));
        }
        if let Some(currency) = &self.currency {
            line.push_str(&format!(" {currency}"));
        }
        line
    }
}

/// Immutable job definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub display_name: String,
    pub color: Option<String>,
    pub rewards: Vec<RewardRule>,
}

impl Job {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            color: None,
            rewards: Vec::new(),
        }
    }

    /// First rule, in declaration order, matching the action and target.
    pub fn find_rule(
        &self,
        action: ActionType,
        target: &str,
        categories: &HashMap<String, Vec<String>>,
    ) -> Option<&RewardRule> {
        self.rewards
            .iter()
            .filter(|rule| rule.action == action)
            .find(|rule| rule.target.matches(target, categories))
    }
}

/// Lower-cases and validates a job identifier.
pub fn normalise_job_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_ascii_lowercase();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    valid.then_some(name)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct RawCatalog {
    #[serde(default)]
    categories: HashMap<String, Vec<String>>,
    #[serde(default)]
    jobs: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawJob {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default)]
    rewards: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawReward {
    action: String,
    #[serde(default = "default_target")]
    target: String,
    amount: f64,
    #[serde(default)]
    per_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    experience: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
}

fn default_target() -> String {
    "*".to_string()
}

/// Ordered, read-only set of jobs plus named target categories.
#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
    categories: HashMap<String, Vec<String>>,
}

impl JobCatalog {
    pub fn new(jobs: Vec<Job>, categories: HashMap<String, Vec<String>>) -> Self {
        let mut catalog = Self {
            jobs: Vec::with_capacity(jobs.len()),
            index: HashMap::new(),
            categories: categories
                .into_iter()
                .map(|(name, members)| {
                    (
                        name.trim().to_ascii_lowercase(),
                        members.iter().map(|member| normalise_identifier(member)).collect(),
                    )
                })
                .collect(),
        };
        for job in jobs {
            catalog.push(job);
        }
        catalog
    }

    fn push(&mut self, job: Job) -> bool {
        if self.index.contains_key(&job.name) {
            return false;
        }
        self.index.insert(job.name.clone(), self.jobs.len());
        self.jobs.push(job);
        true
    }

    /// Reads the catalog section from the store. Invalid jobs or rules are
    /// skipped with a warning; only an unreadable or structurally broken
    /// section fails the load.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, ConfigError> {
        let table = store.table(JOBS_FILE)?;
        let raw = Value::Table(table)
            .try_into::<RawCatalog>()
            .map_err(|err| ConfigError::invalid_entry(JOBS_FILE, "jobs", err.to_string()))?;
        let catalog = Self::from_raw(raw);
        info!(target: "jobs", "Loaded {} job(s) from {}", catalog.len(), JOBS_FILE);
        Ok(catalog)
    }

    fn from_raw(raw: RawCatalog) -> Self {
        let mut catalog = Self::new(Vec::new(), raw.categories);

        for (position, entry) in raw.jobs.into_iter().enumerate() {
            match parse_job(entry) {
                Ok(job) => {
                    let name = job.name.clone();
                    if !catalog.push(job) {
                        warn_skipped(&ConfigError::invalid_entry(
                            JOBS_FILE,
                            name,
                            "duplicate job name",
                        ));
                    }
                }
                Err(err) => warn_skipped(&ConfigError::invalid_entry(
                    JOBS_FILE,
                    format!("jobs[{position}]"),
                    err,
                )),
            }
        }
        catalog
    }

    /// Writes the catalog back into the store in the same layout `load` reads.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let categories = Value::try_from(&self.categories)
            .map_err(|err| StoreError::serialize(JOBS_FILE, err))?;
        let jobs = self
            .jobs
            .iter()
            .map(job_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| StoreError::serialize(JOBS_FILE, err))?;
        store.set(JOBS_FILE, "categories", categories)?;
        store.set(JOBS_FILE, "jobs", Value::Array(jobs))
    }

    pub fn get_job(&self, name: &str) -> Option<&Job> {
        let key = name.trim().to_ascii_lowercase();
        self.index.get(&key).map(|position| &self.jobs[*position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_job(name).is_some()
    }

    /// Jobs in insertion order.
    pub fn list_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn categories(&self) -> &HashMap<String, Vec<String>> {
        &self.categories
    }

    /// Copy of the catalog with `job` appended, or `None` if the name is taken.
    pub fn with_job(&self, job: Job) -> Option<Self> {
        let mut next = self.clone();
        next.push(job).then_some(next)
    }

    /// Copy of the catalog with `job` replacing the entry of the same name.
    pub fn with_replaced(&self, job: Job) -> Option<Self> {
        let position = *self.index.get(&job.name)?;
        let mut next = self.clone();
        next.jobs[position] = job;
        Some(next)
    }

    /// Copy of the catalog without `name`, plus the removed job.
    pub fn without_job(&self, name: &str) -> Option<(Self, Job)> {
        let key = name.trim().to_ascii_lowercase();
        let position = *self.index.get(&key)?;
        let mut jobs = self.jobs.clone();
        let removed = jobs.remove(position);
        let mut next = Self::new(Vec::new(), HashMap::new());
        next.categories = self.categories.clone();
        for job in jobs {
            next.push(job);
        }
        Some((next, removed))
    }
}

fn warn_skipped(error: &ConfigError) {
    warn!(target: "jobs", "Skipping catalog entry: {}", error);
}

fn parse_job(entry: Value) -> Result<Job, String> {
    let raw: RawJob = entry.try_into().map_err(|err| err.to_string())?;
    let name = normalise_job_name(&raw.name)
        .ok_or_else(|| format!("'{}' is not a valid job name", raw.name))?;
    let display_name = raw
        .display_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| capitalise(&name));

    let mut rewards = Vec::with_capacity(raw.rewards.len());
    for (position, reward) in raw.rewards.into_iter().enumerate() {
        match parse_reward(reward) {
            Ok(rule) => rewards.push(rule),
            Err(err) => warn_skipped(&ConfigError::invalid_entry(
                JOBS_FILE,
                format!("{name}.rewards[{position}]"),
                err,
            )),
        }
    }

    Ok(Job {
        name,
        display_name,
        color: raw.color,
        rewards,
    })
}

fn parse_reward(entry: Value) -> Result<RewardRule, String> {
    let raw: RawReward = entry.try_into().map_err(|err| err.to_string())?;
    let action = ActionType::parse(&raw.action)
        .ok_or_else(|| format!("unrecognised action type '{}'", raw.action))?;
    let target = TargetPattern::parse(&raw.target)?;
    let formula = RewardFormula::new(raw.amount, raw.per_level)?;
    let experience = match raw.experience {
        Some(value) if !value.is_finite() || value < 0.0 => {
            return Err(format!("experience must be non-negative (got {value})"));
        }
        other => other,
    };
    let currency = raw
        .currency
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(RewardRule {
        action,
        target,
        formula,
        experience,
        currency,
    })
}

fn job_to_value(job: &Job) -> Result<Value, toml::ser::Error> {
    let rewards = job
        .rewards
        .iter()
        .map(|rule| {
            Value::try_from(RawReward {
                action: rule.action.label().to_string(),
                target: rule.target.to_config_string(),
                amount: rule.formula.base(),
                per_level: rule.formula.per_level(),
                experience: rule.experience,
                currency: rule.currency.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Value::try_from(RawJob {
        name: job.name.clone(),
        display_name: Some(job.display_name.clone()),
        color: job.color.clone(),
        rewards,
    })
}

pub(crate) fn capitalise(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
