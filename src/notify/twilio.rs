use std::fmt;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CallReceipt, DeliveryReceipt, NotificationSink, Sms, VoiceCall};
use crate::error::NotifyError;

pub const API_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Default, Deserialize)]
struct TwilioFault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Twilio REST client for messages and calls. One instance serves both.
#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioClient")
            .field("base_url", &self.base_url)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

impl TwilioClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}.json",
            self.base_url, self.account_sid, resource
        )
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        resource: &str,
        form: &[(&str, &str)],
    ) -> Result<T, NotifyError> {
        let rsp = self
            .client
            .post(self.resource_url(resource))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;
        decode(rsp).await
    }
}

async fn decode<T: DeserializeOwned>(rsp: Response) -> Result<T, NotifyError> {
    let status = rsp.status();
    if status.is_success() {
        return Ok(rsp.json::<T>().await?);
    }
    let text = rsp.text().await.unwrap_or_default();
    let fault: TwilioFault = serde_json::from_str(&text).unwrap_or_default();
    Err(NotifyError::Api {
        status: status.as_u16(),
        code: fault.code,
        message: if fault.message.is_empty() { text } else { fault.message },
    })
}

#[async_trait::async_trait]
impl NotificationSink for TwilioClient {
    async fn send_message(&self, sms: &Sms) -> Result<DeliveryReceipt, NotifyError> {
        self.post_form(
            "Messages",
            &[
                ("To", sms.to.as_str()),
                ("From", sms.from.as_str()),
                ("Body", sms.body.as_str()),
            ],
        )
        .await
    }

    async fn place_call(&self, call: &VoiceCall) -> Result<CallReceipt, NotifyError> {
        self.post_form(
            "Calls",
            &[
                ("To", call.to.as_str()),
                ("From", call.from.as_str()),
                ("Url", call.script_url.as_str()),
            ],
        )
        .await
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
