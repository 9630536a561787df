use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::order::TaxPolicy;

const DEFAULT_DATA_DIR: &str = "./pos-data";

/// Backend credentials. Both must be present for remote mode.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// None runs the session offline
    pub backend: Option<BackendConfig>,
    /// Postgres connection for realtime notifications
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub tax_percent: Decimal,
    pub restaurant_id: Option<i64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Missing or malformed values fall back to
    /// defaults with a log line; nothing here fails.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let backend = match (
            non_empty(&lookup, "POS_BACKEND_URL"),
            non_empty(&lookup, "POS_BACKEND_KEY"),
        ) {
            (Some(url), Some(api_key)) => Some(BackendConfig {
                url: url.trim_end_matches('/').to_string(),
                api_key,
            }),
            (None, None) => {
                warn!("POS_BACKEND_URL and POS_BACKEND_KEY not set, running offline");
                None
            }
            _ => {
                warn!("Backend credentials incomplete, running offline");
                None
            }
        };

        let tax_percent: Decimal = try_load(&lookup, "POS_TAX_RATE", Decimal::TEN);
        let tax_percent = if tax_percent.is_sign_negative() && !tax_percent.is_zero() {
            warn!(%tax_percent, "POS_TAX_RATE cannot be negative, using default");
            Decimal::TEN
        } else {
            tax_percent
        };

        Self {
            backend,
            database_url: non_empty(&lookup, "POS_DATABASE_URL"),
            data_dir: non_empty(&lookup, "POS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    info!("POS_DATA_DIR not set, using default: {DEFAULT_DATA_DIR}");
                    PathBuf::from(DEFAULT_DATA_DIR)
                }),
            tax_percent,
            restaurant_id: non_empty(&lookup, "POS_RESTAURANT_ID").and_then(|raw| {
                raw.parse()
                    .map_err(|e| warn!("Invalid POS_RESTAURANT_ID value: {e}"))
                    .ok()
            }),
        }
    }

    pub fn tax_policy(&self) -> TaxPolicy {
        TaxPolicy::flat_percent(self.tax_percent)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = non_empty(lookup, key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}
