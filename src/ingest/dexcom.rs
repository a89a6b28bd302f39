// src/ingest/dexcom.rs
//! Dexcom Share client: publisher login + latest glucose value.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SourceError;
use crate::ingest::types::{Reading, ReadingSource, Trend};

pub const US_BASE_URL: &str = "https://share2.dexcom.com/ShareWebServices/Services";
pub const OUS_BASE_URL: &str = "https://shareous1.dexcom.com/ShareWebServices/Services";

/// Public application id used by the Share mobile apps.
const APPLICATION_ID: &str = "d89443d2-327c-4a6f-89e5-496bbb0317db";
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Only readings this recent are considered "current".
pub const READING_WINDOW_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Us,
    Ous,
}

impl Region {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Some(Region::Us),
            "ous" => Some(Region::Ous),
            _ => None,
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Region::Us => US_BASE_URL,
            Region::Ous => OUS_BASE_URL,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiFault {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTrend {
    Index(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(rename = "WT")]
    wt: String,
    #[serde(rename = "DT", default)]
    dt: Option<String>,
    #[serde(rename = "Value")]
    value: u16,
    #[serde(rename = "Trend")]
    trend: RawTrend,
}

impl RawReading {
    fn into_reading(self) -> Result<Reading, SourceError> {
        let time = self
            .dt
            .as_deref()
            .and_then(parse_share_date)
            .or_else(|| parse_share_date(&self.wt))
            .ok_or_else(|| SourceError::Parse(format!("bad reading timestamp {:?}", self.wt)))?;

        let trend = match &self.trend {
            RawTrend::Index(i) => Trend::from_index(*i),
            RawTrend::Name(n) => Trend::from_name(n),
        }
        .unwrap_or_else(|| {
            tracing::warn!(trend = ?self.trend, "unknown trend, treating as not computable");
            Trend::NotComputable
        });

        Ok(Reading::new(self.value, trend, time))
    }
}

/// Parse `Date(1691455258000)` or `Date(1691455258000-0400)`.
/// The offset only describes the device's local zone; the millis are UTC.
pub fn parse_share_date(s: &str) -> Option<DateTime<Utc>> {
    static RE_DATE: OnceCell<Regex> = OnceCell::new();
    let re = RE_DATE.get_or_init(|| {
        Regex::new(r"^Date\((-?\d+)(?:[+-]\d{4})?\)$").expect("share date regex")
    });
    let caps = re.captures(s.trim())?;
    let ms: i64 = caps.get(1)?.as_str().parse().ok()?;
    DateTime::from_timestamp_millis(ms)
}

pub struct DexcomClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl fmt::Debug for DexcomClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DexcomClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DexcomClient {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        region: Region,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("glucose-alert/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: region.base_url().to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Point the client at another host (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut req = self.http.post(&url).query(query);
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let fault: ApiFault = serde_json::from_str(&text).unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                code: fault.code,
                message: if fault.message.is_empty() { text } else { fault.message },
            });
        }
        Ok(resp.json::<T>().await?)
    }

    /// Two-step publisher login; returns a session id.
    async fn login(&self) -> Result<String, SourceError> {
        let account_id: String = self
            .post(
                "General/AuthenticatePublisherAccount",
                &[],
                Some(json!({
                    "accountName": self.username,
                    "password": self.password,
                    "applicationId": APPLICATION_ID,
                })),
            )
            .await?;
        if account_id.is_empty() || account_id == NIL_UUID {
            return Err(SourceError::InvalidSession("account"));
        }

        let session_id: String = self
            .post(
                "General/LoginPublisherAccountById",
                &[],
                Some(json!({
                    "accountId": account_id,
                    "password": self.password,
                    "applicationId": APPLICATION_ID,
                })),
            )
            .await?;
        if session_id.is_empty() || session_id == NIL_UUID {
            return Err(SourceError::InvalidSession("session"));
        }
        tracing::debug!(source = self.name(), "logged in");
        Ok(session_id)
    }

    async fn latest(&self, session_id: &str) -> Result<Vec<RawReading>, SourceError> {
        self.post(
            "Publisher/ReadPublisherLatestGlucoseValues",
            &[
                ("sessionId", session_id.to_string()),
                ("minutes", READING_WINDOW_MINUTES.to_string()),
                ("maxCount", "1".to_string()),
            ],
            None,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ReadingSource for DexcomClient {
    async fn current_reading(&self) -> Result<Reading, SourceError> {
        let session = self.login().await?;
        let raw = match self.latest(&session).await {
            Err(e) if e.is_session_error() => {
                tracing::warn!(error = %e, "session rejected, logging in again");
                let session = self.login().await?;
                self.latest(&session).await?
            }
            other => other?,
        };
        raw.into_iter()
            .next()
            .ok_or(SourceError::NoRecentReading(READING_WINDOW_MINUTES))?
            .into_reading()
    }

    fn name(&self) -> &'static str {
        "dexcom"
    }
}
