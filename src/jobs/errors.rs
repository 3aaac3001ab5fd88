//! Error taxonomy for catalog loading, membership validation and catalog edits.
use std::fmt;

use crate::storage::StoreError;

use super::types::PlayerId;

/// Malformed catalog, settings or persistence content.
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidEntry {
        source: String,
        entry: String,
        reason: String,
    },
    Store(StoreError),
}

impl ConfigError {
    pub fn invalid_entry(
        source: impl Into<String>,
        entry: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidEntry {
            source: source.into(),
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEntry {
                source,
                entry,
                reason,
            } => write!(f, "invalid entry '{}' in {}: {}", entry, source, reason),
            Self::Store(err) => write!(f, "storage failure: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<StoreError> for ConfigError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Validation failures surfaced by the membership store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    UnknownJob { job: String },
    AlreadyMember { player: PlayerId, job: String },
    MaxJobsExceeded { player: PlayerId, max: u32 },
    NotMember { player: PlayerId, job: String },
}

impl MembershipError {
    /// Key into the message catalog used when reporting this error to a player.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::UnknownJob { .. } => "error.unknown-job",
            Self::AlreadyMember { .. } => "error.already-member",
            Self::MaxJobsExceeded { .. } => "error.max-jobs",
            Self::NotMember { .. } => "error.not-member",
        }
    }
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownJob { job } => write!(f, "job '{}' does not exist", job),
            Self::AlreadyMember { player, job } => {
                write!(f, "{} already works as '{}'", player, job)
            }
            Self::MaxJobsExceeded { player, max } => {
                write!(f, "{} already holds the maximum of {} job(s)", player, max)
            }
            Self::NotMember { player, job } => write!(f, "{} does not work as '{}'", player, job),
        }
    }
}

impl std::error::Error for MembershipError {}

/// Failures raised by operator edits against the job catalog.
#[derive(Debug, Clone)]
pub enum CatalogEditError {
    InvalidName { name: String },
    DuplicateJob { job: String },
    UnknownJob { job: String },
    UnknownProperty { property: String },
    InvalidValue {
        property: String,
        value: String,
        reason: String,
    },
    Persist(StoreError),
}

impl fmt::Display for CatalogEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => write!(f, "'{}' is not a valid job name", name),
            Self::DuplicateJob { job } => write!(f, "job '{}' already exists", job),
            Self::UnknownJob { job } => write!(f, "job '{}' does not exist", job),
            Self::UnknownProperty { property } => {
                write!(f, "unknown job property '{}'", property)
            }
            Self::InvalidValue {
                property,
                value,
                reason,
            } => write!(f, "invalid value '{}' for {}: {}", value, property, reason),
            Self::Persist(err) => write!(f, "unable to save job catalog: {}", err),
        }
    }
}

impl std::error::Error for CatalogEditError {}

impl From<StoreError> for CatalogEditError {
    fn from(value: StoreError) -> Self {
        Self::Persist(value)
    }
}
