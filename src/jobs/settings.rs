//! Add-on settings resolved once from `settings.toml`.
use serde::{Deserialize, Serialize};
use toml::Value;

use bevy::log::warn;

use crate::storage::KeyValueStore;

use super::{errors::ConfigError, leveling::LevelPolicy, leveling::RawLeveling};

pub const SETTINGS_FILE: &str = "settings.toml";

const DEFAULT_MAX_JOBS: u32 = 1;
const DEFAULT_CURRENCY: &str = "dollars";
const DEFAULT_EXPERIENCE_PER_ACTION: f64 = 1.0;

/// `"enabled"` / `"disabled"` switch. Anything other than `enabled`
/// (case-insensitive) reads as disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Toggle {
    #[default]
    Enabled,
    Disabled,
}

impl Toggle {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl From<String> for Toggle {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("enabled") {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

impl From<Toggle> for String {
    fn from(value: Toggle) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSettings {
    display_level: Toggle,
    chat_prefixes: Toggle,
    max_jobs: u32,
    default_currency: String,
    experience_per_action: f64,
    leveling: RawLeveling,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            display_level: Toggle::Enabled,
            chat_prefixes: Toggle::Enabled,
            max_jobs: DEFAULT_MAX_JOBS,
            default_currency: DEFAULT_CURRENCY.to_string(),
            experience_per_action: DEFAULT_EXPERIENCE_PER_ACTION,
            leveling: RawLeveling::default(),
        }
    }
}

/// Validated runtime settings snapshot.
#[derive(Debug, Clone)]
pub struct Settings {
    pub display_level: Toggle,
    pub chat_prefixes: Toggle,
    pub max_jobs: u32,
    pub default_currency: String,
    pub experience_per_action: f64,
    pub leveling: LevelPolicy,
}

impl Settings {
    /// Seeds the two display toggles when missing, then parses the whole file.
    /// Malformed content falls back to defaults with a warning.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, ConfigError> {
        store.set_default(
            SETTINGS_FILE,
            "display_level",
            Value::from(Toggle::Enabled.as_str()),
        )?;
        store.set_default(
            SETTINGS_FILE,
            "chat_prefixes",
            Value::from(Toggle::Enabled.as_str()),
        )?;

        let table = store.table(SETTINGS_FILE)?;
        let raw = match Value::Table(table).try_into::<RawSettings>() {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target: "jobs",
                    "Failed to parse {} ({}). Falling back to defaults.",
                    SETTINGS_FILE, err
                );
                RawSettings::default()
            }
        };
        Ok(raw.into())
    }

    /// Loads settings, falling back to defaults when the store itself fails.
    pub fn load_or_default(store: &dyn KeyValueStore) -> Self {
        Self::load(store).unwrap_or_else(|err| {
            warn!(
                target: "jobs",
                "Failed to read {} ({}). Falling back to defaults.",
                SETTINGS_FILE, err
            );
            Self::default()
        })
    }

    /// Named lookup mirroring the operator-facing option names.
    pub fn option(&self, name: &str) -> Option<String> {
        match name {
            "displayLevel" | "display_level" => Some(self.display_level.as_str().to_string()),
            "chatPrefixes" | "chat_prefixes" => Some(self.chat_prefixes.as_str().to_string()),
            "maxJobs" | "max_jobs" => Some(self.max_jobs.to_string()),
            "defaultCurrency" | "default_currency" => Some(self.default_currency.clone()),
            _ => None,
        }
    }

    pub fn option_enabled(&self, name: &str) -> bool {
        self.option(name)
            .map(|value| Toggle::from(value).is_enabled())
            .unwrap_or(false)
    }
}

impl Default for Settings {
    fn default() -> Self {
        RawSettings::default().into()
    }
}

impl From<RawSettings> for Settings {
    fn from(value: RawSettings) -> Self {
        let default_currency = value.default_currency.trim();
        let experience_per_action = if value.experience_per_action.is_finite() {
            value.experience_per_action.max(0.0)
        } else {
            DEFAULT_EXPERIENCE_PER_ACTION
        };

        Self {
            display_level: value.display_level,
            chat_prefixes: value.chat_prefixes,
            max_jobs: value.max_jobs.max(1),
            default_currency: if default_currency.is_empty() {
                DEFAULT_CURRENCY.to_string()
            } else {
                default_currency.to_string()
            },
            experience_per_action,
            leveling: value.leveling.into(),
        }
    }
}
