//! Environment-driven application configuration.
//!
//! All options are read once at startup through the [`ConfigEnv`]
//! abstraction so tests can inject values without touching the process
//! environment. Invalid configuration is fatal: the binary exits with
//! status 1 rather than running with half-applied settings.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::ports::{Provider, RegistrantContact};
use crate::domain::{PurchaseLimits, RateLimiterConfig, TldAllowlist};
use crate::outbound::registrar::{NamecheapCredentials, PorkbunCredentials};

/// Environment abstraction for configuration lookups.
pub trait ConfigEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl ConfigEnv for ProcessEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Configuration problems that must stop the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("MAX_DAILY_USD must be at least MAX_PER_TXN_USD")]
    CapsInverted,
    #[error("{provider} selected but its credentials are incomplete")]
    IncompleteCredentials { provider: Provider },
    #[error("registrant contact ({name}) is required when dry run is off")]
    MissingContact { name: &'static str },
}

/// Fully validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub provider: Provider,
    pub porkbun: Option<PorkbunCredentials>,
    pub namecheap: Option<NamecheapCredentials>,
    pub dry_run: bool,
    pub allowlist: TldAllowlist,
    pub limits: PurchaseLimits,
    pub rate_limit: RateLimiterConfig,
    pub max_domains_per_search: usize,
    pub spend_retention_days: i64,
    pub contact: RegistrantContact,
}

impl AppConfig {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&ProcessEnv)
    }

    /// Load and validate configuration from a custom environment source.
    pub fn from_env_with(env: &impl ConfigEnv) -> Result<Self, ConfigError> {
        let port = parse_or("PORT", env, 8080_u16)?;
        let database_url = env
            .string("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing {
                name: "DATABASE_URL",
            })?;

        let provider = match env.string("DEFAULT_PROVIDER") {
            None => Provider::Porkbun,
            Some(raw) => Provider::parse(&raw).ok_or(ConfigError::Invalid {
                name: "DEFAULT_PROVIDER",
                value: raw,
            })?,
        };

        // Safety default: real purchases require the operator to say
        // `DRY_RUN=false` exactly. Any other value keeps simulation on.
        let dry_run = env.string("DRY_RUN").as_deref() != Some("false");

        let porkbun = match (env.string("PORKBUN_API_KEY"), env.string("PORKBUN_SECRET_KEY")) {
            (Some(api_key), Some(secret_key)) => Some(PorkbunCredentials {
                api_key,
                secret_key,
            }),
            _ => None,
        };
        let namecheap = match (
            env.string("NAMECHEAP_API_USER"),
            env.string("NAMECHEAP_API_KEY"),
            env.string("NAMECHEAP_USERNAME"),
            env.string("NAMECHEAP_CLIENT_IP"),
        ) {
            (Some(api_user), Some(api_key), Some(username), Some(client_ip)) => {
                Some(NamecheapCredentials {
                    api_user,
                    api_key,
                    username,
                    client_ip,
                })
            }
            _ => None,
        };
        let credentials_present = match provider {
            Provider::Porkbun => porkbun.is_some(),
            Provider::Namecheap => namecheap.is_some(),
        };
        if !credentials_present && !dry_run {
            return Err(ConfigError::IncompleteCredentials { provider });
        }

        let allowlist = env
            .string("ALLOWLIST_TLDS")
            .map(|raw| TldAllowlist::from_csv(&raw))
            .unwrap_or_default();

        let max_per_txn_usd = parse_or("MAX_PER_TXN_USD", env, Decimal::new(1_000, 0))?;
        let max_daily_usd = parse_or("MAX_DAILY_USD", env, Decimal::new(5_000, 0))?;
        if max_daily_usd < max_per_txn_usd {
            return Err(ConfigError::CapsInverted);
        }

        let rate_limit = RateLimiterConfig {
            requests_per_minute: parse_or("RATE_LIMIT_RPM", env, 60_u32)?,
            burst: parse_or("RATE_LIMIT_BURST", env, 30_u32)?,
        };

        let max_domains_per_search = parse_or("MAX_DOMAINS_PER_SEARCH", env, 20_usize)?;
        let spend_retention_days = parse_or("SPEND_RETENTION_DAYS", env, 90_i64)?;

        let contact = contact_from_env(env, dry_run)?;

        Ok(Self {
            port,
            database_url,
            provider,
            porkbun,
            namecheap,
            dry_run,
            allowlist,
            limits: PurchaseLimits {
                max_per_txn_usd,
                max_daily_usd,
            },
            rate_limit,
            max_domains_per_search,
            spend_retention_days,
            contact,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    env: &impl ConfigEnv,
    default: T,
) -> Result<T, ConfigError> {
    match env.string(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn contact_from_env(env: &impl ConfigEnv, dry_run: bool) -> Result<RegistrantContact, ConfigError> {
    fn field(
        env: &impl ConfigEnv,
        name: &'static str,
        dry_run: bool,
    ) -> Result<String, ConfigError> {
        match env.string(name).filter(|value| !value.trim().is_empty()) {
            Some(value) => Ok(value),
            // Dry-run instances never send the contact upstream, so missing
            // fields are tolerated there.
            None if dry_run => Ok(String::new()),
            None => Err(ConfigError::MissingContact { name }),
        }
    }

    Ok(RegistrantContact {
        first_name: field(env, "WINSTON_CONTACT_FIRST_NAME", dry_run)?,
        last_name: field(env, "WINSTON_CONTACT_LAST_NAME", dry_run)?,
        email: field(env, "WINSTON_CONTACT_EMAIL", dry_run)?,
        phone: field(env, "WINSTON_CONTACT_PHONE", dry_run)?,
        address1: field(env, "WINSTON_CONTACT_ADDRESS1", dry_run)?,
        city: field(env, "WINSTON_CONTACT_CITY", dry_run)?,
        state: field(env, "WINSTON_CONTACT_STATE", dry_run)?,
        zip: field(env, "WINSTON_CONTACT_ZIP", dry_run)?,
        country: field(env, "WINSTON_CONTACT_COUNTRY", dry_run)?,
    })
}
