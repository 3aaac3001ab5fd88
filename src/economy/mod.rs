//! Economy module: the service contract, the reward bridge and its providers.
pub mod bridge;
pub mod config;
pub mod http;
pub mod ledger;

use std::env;

use bevy::log::{error, info, warn};

pub use bridge::{EconomyBridge, EconomyError, EconomyService, Receipt};
pub use config::{HttpEconomyConfig, HttpEconomyConfigError};
pub use http::HttpEconomyService;
pub use ledger::LocalLedger;

/// Which economy provider to connect at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EconomyProviderKind {
    Local,
    Http,
    Disabled,
}

impl EconomyProviderKind {
    /// Unknown values fall back to the local ledger.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("local") => Self::Local,
            Some("http") => Self::Http,
            Some("none") | Some("disabled") | Some("off") => Self::Disabled,
            Some(other) => {
                warn!(
                    target: "economy",
                    "Unknown JOBS_ECONOMY provider '{}'; using the local ledger.",
                    other
                );
                Self::Local
            }
        }
    }
}

/// Locates the economy provider named by `JOBS_ECONOMY`. A provider that
/// cannot be constructed leaves the bridge disabled; membership tracking and
/// catalog browsing keep working without it.
pub fn connect_from_env() -> EconomyBridge {
    let kind = EconomyProviderKind::parse(env::var("JOBS_ECONOMY").ok().as_deref());
    connect(kind, HttpEconomyConfig::from_env)
}

fn connect(
    kind: EconomyProviderKind,
    http_config: impl FnOnce() -> Result<HttpEconomyConfig, HttpEconomyConfigError>,
) -> EconomyBridge {
    match kind {
        EconomyProviderKind::Local => EconomyBridge::new(Box::new(LocalLedger::new())),
        EconomyProviderKind::Disabled => {
            info!(target: "economy", "Economy disabled by configuration; job rewards are off.");
            EconomyBridge::disabled()
        }
        EconomyProviderKind::Http => match http_config().and_then(HttpEconomyService::new) {
            Ok(service) => EconomyBridge::new(Box::new(service)),
            Err(err) => {
                error!(
                    target: "economy",
                    "No economy service available ({}). Job rewards are disabled.",
                    err
                );
                EconomyBridge::disabled()
            }
        },
    }
}
