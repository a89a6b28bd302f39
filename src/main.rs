//! glucose-alert: one polling cycle per invocation.
//! Meant to be run by an external scheduler (cron, systemd timer). Exits
//! non-zero when the cycle fails so the scheduler can notice.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use glucose_alert::{
    logging, AppConfig, DecisionEngine, DexcomClient, DryRunSink, LastSeenStore,
    NotificationSink, Recipients, Runner, TwilioClient,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local setups; real env vars take precedence.
    let _ = dotenvy::dotenv();

    let cfg = match AppConfig::from_env().context("loading configuration") {
        Ok(cfg) => cfg,
        Err(e) => {
            let path = std::env::var_os("ALERT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(logging::DEFAULT_LOG_PATH));
            logging::report_startup_error(&path, &e);
            return Err(e);
        }
    };
    let dispatch = match logging::build_dispatch(&cfg.log_path)
        .with_context(|| format!("opening log file {}", cfg.log_path.display()))
    {
        Ok(d) => d,
        Err(e) => {
            // The file is unusable; this reaches stderr through the fallback subscriber.
            logging::report_startup_error(&cfg.log_path, &e);
            return Err(e);
        }
    };

    let log_failure = |e: &anyhow::Error| {
        let chain = format!("{e:#}");
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(error = %chain, "startup failed");
        });
    };

    let source = DexcomClient::new(
        cfg.dexcom.username.clone(),
        cfg.dexcom.password.clone(),
        cfg.dexcom.region,
    )
    .context("building Dexcom client")
    .inspect_err(log_failure)?;

    let sink: Box<dyn NotificationSink> = if cfg.dry_run {
        Box::new(DryRunSink)
    } else {
        Box::new(
            TwilioClient::new(cfg.twilio.account_sid.clone(), cfg.twilio.auth_token.clone())
                .context("building Twilio client")
                .inspect_err(log_failure)?,
        )
    };

    let runner = Runner::new(
        source,
        sink,
        LastSeenStore::new(&cfg.last_seen_path),
        DecisionEngine::new(cfg.thresholds, cfg.tz),
        Recipients {
            to: cfg.twilio.to_number.clone(),
            from: cfg.twilio.from_number.clone(),
            call_url: cfg.twilio.call_url.clone(),
        },
    )
    .with_dispatch(dispatch);

    runner.run_once(Utc::now()).await?;
    Ok(())
}
