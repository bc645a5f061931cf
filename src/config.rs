use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use tracing::{info, warn};

/// Default points credited to each party of a referral.
const DEFAULT_POINTS: u32 = 100;
/// Default referral cap per referrer.
const MAX_REFERRALS: u32 = 10_000;
/// Default account-age window: seven days, in milliseconds.
const MAX_ACCOUNT_AGE_MS: i64 = 604_800_000;
/// Default commit attempts before the transaction is abandoned.
const TRANSACTION_ATTEMPTS: u32 = 5;

/// Tunables for the referral application flow.
///
/// Defaults match the production constants; each one can be overridden
/// through the environment at process start.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Points credited to each party when the request carries none
    pub default_points: u32,
    /// Referrals a single user may accumulate before further ones are
    /// declined
    pub max_referrals: u32,
    /// How old an account may be and still accept a referral
    pub max_account_age: Duration,
    /// Commit attempts before the transaction is abandoned
    pub transaction_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_points: DEFAULT_POINTS,
            max_referrals: MAX_REFERRALS,
            max_account_age: Duration::milliseconds(MAX_ACCOUNT_AGE_MS),
            transaction_attempts: TRANSACTION_ATTEMPTS,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to the defaults.
    pub fn load() -> Self {
        Self {
            default_points: try_load("REFERRAL_DEFAULT_POINTS", DEFAULT_POINTS),
            max_referrals: try_load("REFERRAL_MAX_REFERRALS", MAX_REFERRALS),
            max_account_age: Duration::milliseconds(try_load(
                "REFERRAL_MAX_ACCOUNT_AGE_MS",
                MAX_ACCOUNT_AGE_MS,
            )),
            transaction_attempts: try_load("REFERRAL_TRANSACTION_ATTEMPTS", TRANSACTION_ATTEMPTS),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(value) = env::var(key) else {
        return default;
    };

    match value.parse() {
        Ok(parsed) => {
            info!("{key} set to {value}");
            parsed
        }
        Err(e) => {
            warn!("Invalid {key} value ({e}), using default: {default}");
            default
        }
    }
}
