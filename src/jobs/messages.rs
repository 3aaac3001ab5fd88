//! Player-facing message templates with `{placeholder}` substitution.
use std::collections::HashMap;

use bevy::log::warn;
use toml::Value;

use crate::storage::KeyValueStore;

pub const MESSAGES_FILE: &str = "messages.toml";

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("job.joined", "You are now working as a {job}."),
    ("job.left", "You are no longer working as a {job}."),
    ("job.levelup", "Your {job} level is now {level}!"),
    ("job.created", "Created job {job}."),
    ("job.deleted", "Deleted job {job}."),
    ("job.updated", "Set {property} of {job} to {value}."),
    ("job.list.header", "Available jobs:"),
    ("job.list.entry", "- {display} ({job})"),
    ("job.list.empty", "There are no jobs yet."),
    ("job.info.header", "{job} pays for:"),
    ("job.info.rule", "  {rule}"),
    ("job.info.progress", "You are level {level} with {experience}/{next} experience."),
    ("command.usage", "Usage: /jobs [list|info|join|leave|create|delete|set|reload] ..."),
    ("command.player-only", "Only players can use this command."),
    ("command.reloaded", "Reloaded {count} job(s) and settings."),
    ("reward.paid", "+{amount} {currency} ({job})"),
    ("sign.bound", "This sign now hires {job}s."),
    ("error.unknown-job", "Job {job} does not exist."),
    ("error.already-member", "You already work as a {job}."),
    ("error.max-jobs", "You cannot hold more than {max} job(s)."),
    ("error.not-member", "You do not work as a {job}."),
    ("error.no-economy", "Job rewards are disabled: no economy service is available."),
    ("error.catalog", "Could not change the job catalog: {reason}"),
    ("error.reload", "Reload failed: {reason}"),
];

/// Template lookup seeded with built-in defaults and overridden by the file.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl MessageCatalog {
    /// Writes missing defaults back to the store so operators can edit them.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut catalog = Self::default();

        for (key, template) in DEFAULT_MESSAGES {
            if let Err(err) = store.set_default(MESSAGES_FILE, key, Value::from(*template)) {
                warn!(target: "jobs", "Failed to seed message '{}': {}", key, err);
                break;
            }
        }

        match store.table(MESSAGES_FILE) {
            Ok(table) => {
                for (key, value) in table {
                    match value {
                        Value::String(template) => {
                            catalog.templates.insert(key, template);
                        }
                        other => warn!(
                            target: "jobs",
                            "Ignoring message '{}' in {}: expected a string, found {}",
                            key,
                            MESSAGES_FILE,
                            other.type_str()
                        ),
                    }
                }
            }
            Err(err) => warn!(
                target: "jobs",
                "Failed to read {} ({}). Using built-in messages.",
                MESSAGES_FILE, err
            ),
        }
        catalog
    }

    pub fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    /// Renders `key`, falling back to the key itself when it is unknown.
    pub fn render(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut rendered = self.template(key).unwrap_or(key).to_string();
        for (name, value) in args {
            rendered = rendered.replace(&format!("{{{name}}}"), value);
        }
        rendered
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            templates: DEFAULT_MESSAGES
                .iter()
                .map(|(key, template)| (key.to_string(), template.to_string()))
                .collect(),
        }
    }
}
