// src/config/mod.rs
//! Process configuration, read from the environment (`.env` is loaded by main).

pub mod thresholds;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;

use crate::decision::Thresholds;
use crate::ingest::Region;
use crate::logging::DEFAULT_LOG_PATH;
use crate::store;

#[derive(Clone)]
pub struct DexcomConfig {
    pub username: String,
    pub password: String,
    pub region: Region,
}

impl fmt::Debug for DexcomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DexcomConfig")
            .field("username", &self.username)
            .field("password_len", &self.password.len())
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub to_number: String,
    pub from_number: String,
    /// Hosted call script; calls are disabled without it.
    pub call_url: Option<String>,
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token_len", &self.auth_token.len())
            .field("to_number", &self.to_number)
            .field("from_number", &self.from_number)
            .field("call_url", &self.call_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dexcom: DexcomConfig,
    pub twilio: TwilioConfig,
    pub tz: Tz,
    pub last_seen_path: PathBuf,
    pub log_path: PathBuf,
    pub thresholds: Thresholds,
    pub dry_run: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| optional(key).ok_or_else(|| anyhow!("Missing {key} env var"));

        let region = match optional("DEXCOM_REGION") {
            Some(r) => Region::parse(&r)
                .ok_or_else(|| anyhow!("DEXCOM_REGION must be 'us' or 'ous', got {r:?}"))?,
            None => Region::default(),
        };

        let tz = match optional("LOCAL_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("LOCAL_TIMEZONE {name:?}: {e}"))?,
            None => chrono_tz::UTC,
        };

        let thresholds = thresholds::load_thresholds(&get).context("loading alert thresholds")?;

        Ok(Self {
            dexcom: DexcomConfig {
                username: required("DEXCOM_USERNAME")?,
                password: required("DEXCOM_PASSWORD")?,
                region,
            },
            twilio: TwilioConfig {
                account_sid: required("TWILIO_ACCOUNT")?,
                auth_token: required("TWILIO_TOKEN")?,
                to_number: required("TWILIO_TO_NUMBER")?,
                from_number: required("TWILIO_FROM_NUMBER")?,
                call_url: optional("TWILIO_CALL_URL"),
            },
            tz,
            last_seen_path: optional("LAST_SEEN_PATH")
                .unwrap_or_else(|| store::DEFAULT_PATH.to_string())
                .into(),
            log_path: optional("ALERT_LOG_PATH")
                .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string())
                .into(),
            thresholds,
            dry_run: optional("ALERT_DRY_RUN").is_some_and(|v| v == "1"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DEXCOM_USERNAME", "parent@example.com"),
            ("DEXCOM_PASSWORD", "s3cret"),
            ("TWILIO_ACCOUNT", "AC0001"),
            ("TWILIO_TOKEN", "tok-xyz"),
            ("TWILIO_TO_NUMBER", "+15550001111"),
            ("TWILIO_FROM_NUMBER", "+15550002222"),
        ])
    }

    fn build(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig> {
        AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let cfg = build(&base()).unwrap();
        assert_eq!(cfg.dexcom.region, Region::Us);
        assert_eq!(cfg.tz, chrono_tz::UTC);
        assert_eq!(cfg.last_seen_path, PathBuf::from(store::DEFAULT_PATH));
        assert_eq!(cfg.log_path, PathBuf::from(DEFAULT_LOG_PATH));
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert!(cfg.twilio.call_url.is_none());
        assert!(!cfg.dry_run);
    }

    #[test]
    fn missing_required_is_named() {
        let mut vars = base();
        vars.remove("TWILIO_TOKEN");
        let err = build(&vars).unwrap_err();
        assert!(err.to_string().contains("TWILIO_TOKEN"), "{err}");

        vars.insert("TWILIO_TOKEN", "   ");
        assert!(build(&vars).is_err());
    }

    #[test]
    fn optional_values_parse() {
        let mut vars = base();
        vars.insert("DEXCOM_REGION", "OUS");
        vars.insert("LOCAL_TIMEZONE", "America/Chicago");
        vars.insert("TWILIO_CALL_URL", "https://handler.example.com/call.xml");
        vars.insert("ALERT_DRY_RUN", "1");
        let cfg = build(&vars).unwrap();
        assert_eq!(cfg.dexcom.region, Region::Ous);
        assert_eq!(cfg.tz, chrono_tz::America::Chicago);
        assert!(cfg.twilio.call_url.is_some());
        assert!(cfg.dry_run);
    }

    #[test]
    fn bad_timezone_and_region_fail() {
        let mut vars = base();
        vars.insert("LOCAL_TIMEZONE", "Mars/Olympus");
        assert!(build(&vars).is_err());

        let mut vars = base();
        vars.insert("DEXCOM_REGION", "eu");
        assert!(build(&vars).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = build(&base()).unwrap();
        let s = format!("{cfg:?}");
        assert!(!s.contains("s3cret"));
        assert!(!s.contains("tok-xyz"));
    }
}
