//! Sends one SMS through the configured provider to verify credentials and numbers.
//! Honors `ALERT_DRY_RUN=1` like the main binary.

use anyhow::{Context, Result};
use glucose_alert::{AppConfig, DryRunSink, NotificationSink, Sms, TwilioClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let sink: Box<dyn NotificationSink> = if cfg.dry_run {
        Box::new(DryRunSink)
    } else {
        Box::new(TwilioClient::new(
            cfg.twilio.account_sid.clone(),
            cfg.twilio.auth_token.clone(),
        )?)
    };

    let sms = Sms {
        to: cfg.twilio.to_number.clone(),
        from: cfg.twilio.from_number.clone(),
        body: "glucose-alert test message: alerts will arrive from this number.".into(),
    };
    let receipt = sink.send_message(&sms).await.context("sending test SMS")?;

    println!(
        "test SMS via {}: sid={} status={}",
        sink.name(),
        receipt.sid,
        receipt.status
    );
    Ok(())
}
