pub mod twilio;

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

pub use twilio::TwilioClient;

/// Outgoing text message. Built per decision, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sms {
    pub to: String,
    pub from: String,
    pub body: String,
}

/// Outgoing voice call driven by a hosted call script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCall {
    pub to: String,
    pub from: String,
    pub script_url: String,
}

/// Provider's answer to a message send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub sid: String,
    pub status: String,
}

/// Provider's answer to a call request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReceipt {
    pub sid: String,
    pub status: String,
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_message(&self, sms: &Sms) -> Result<DeliveryReceipt, NotifyError>;
    async fn place_call(&self, call: &VoiceCall) -> Result<CallReceipt, NotifyError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    async fn send_message(&self, sms: &Sms) -> Result<DeliveryReceipt, NotifyError> {
        (**self).send_message(sms).await
    }

    async fn place_call(&self, call: &VoiceCall) -> Result<CallReceipt, NotifyError> {
        (**self).place_call(call).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Logs instead of sending. Selected with `ALERT_DRY_RUN=1`.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink;

#[async_trait::async_trait]
impl NotificationSink for DryRunSink {
    async fn send_message(&self, sms: &Sms) -> Result<DeliveryReceipt, NotifyError> {
        tracing::info!(to = %sms.to, body = %sms.body, "dry run: SMS not sent");
        Ok(DeliveryReceipt {
            sid: "dry-run".into(),
            status: "skipped".into(),
        })
    }

    async fn place_call(&self, call: &VoiceCall) -> Result<CallReceipt, NotifyError> {
        tracing::info!(to = %call.to, url = %call.script_url, "dry run: call not placed");
        Ok(CallReceipt {
            sid: "dry-run".into(),
            status: "skipped".into(),
        })
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
