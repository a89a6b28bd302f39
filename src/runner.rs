//! One end-to-end alerting cycle: fetch → decide → notify → persist marker.
//!
//! The marker is written only after every step succeeded, so a failed cycle
//! re-evaluates the same reading on the next invocation.

use chrono::{DateTime, Utc};
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::decision::{Decision, DecisionEngine};
use crate::error::AlertError;
use crate::ingest::{Reading, ReadingSource};
use crate::logging::DELIVERY_TARGET;
use crate::notify::{CallReceipt, DeliveryReceipt, NotificationSink, Sms, VoiceCall};
use crate::store::LastSeenStore;

/// Who gets alerted, and from which number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients {
    pub to: String,
    pub from: String,
    pub call_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub reading: Reading,
    pub decision: Decision,
    pub sms: Option<DeliveryReceipt>,
    pub call: Option<CallReceipt>,
}

pub struct Runner<S, N> {
    source: S,
    sink: N,
    store: LastSeenStore,
    engine: DecisionEngine,
    recipients: Recipients,
    dispatch: Option<Dispatch>,
}

impl<S: ReadingSource, N: NotificationSink> Runner<S, N> {
    pub fn new(
        source: S,
        sink: N,
        store: LastSeenStore,
        engine: DecisionEngine,
        recipients: Recipients,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            engine,
            recipients,
            dispatch: None,
        }
    }

    /// Log through `dispatch` for the duration of each cycle.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn store(&self) -> &LastSeenStore {
        &self.store
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Run one cycle. Failures are logged with full detail, then returned.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<CycleReport, AlertError> {
        let fut = async {
            let res = self.cycle(now).await;
            if let Err(e) = &res {
                tracing::error!(error = %e, details = ?e, "alert cycle failed");
            }
            res
        };
        match &self.dispatch {
            Some(d) => fut.with_subscriber(d.clone()).await,
            None => fut.await,
        }
    }

    async fn cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, AlertError> {
        let reading = self.source.current_reading().await?;
        tracing::info!(
            source = self.source.name(),
            value = reading.value,
            trend = reading.trend_description(),
            time = %reading.time,
            "reading fetched"
        );

        let last_seen = self.store.read_last_seen().await;
        let decision = self.engine.evaluate(&reading, last_seen, now)?;

        let sms = if decision.notify {
            let sms = Sms {
                to: self.recipients.to.clone(),
                from: self.recipients.from.clone(),
                body: self.engine.build_message_body(&reading),
            };
            let receipt = self.sink.send_message(&sms).await?;
            tracing::info!(
                target: DELIVERY_TARGET,
                sink = self.sink.name(),
                sid = %receipt.sid,
                status = %receipt.status,
                value = reading.value,
                triggers = ?decision.triggers,
                "message sent"
            );
            Some(receipt)
        } else {
            tracing::info!(reason = skip_reason(&decision), "not texting");
            None
        };

        let call = match (decision.call, &self.recipients.call_url) {
            (true, Some(url)) => {
                let call = VoiceCall {
                    to: self.recipients.to.clone(),
                    from: self.recipients.from.clone(),
                    script_url: url.clone(),
                };
                let receipt = self.sink.place_call(&call).await?;
                tracing::info!(
                    target: DELIVERY_TARGET,
                    sink = self.sink.name(),
                    sid = %receipt.sid,
                    status = %receipt.status,
                    value = reading.value,
                    "call placed"
                );
                Some(receipt)
            }
            (true, None) => {
                tracing::warn!("call warranted but no call script URL is configured");
                None
            }
            (false, _) => {
                tracing::info!(reason = skip_reason(&decision), "not calling");
                None
            }
        };

        self.store.write_last_seen(reading.time).await?;
        tracing::debug!(marker = %reading.time, "cycle complete");

        Ok(CycleReport {
            reading,
            decision,
            sms,
            call,
        })
    }
}

fn skip_reason(d: &Decision) -> &'static str {
    if d.fresh {
        "below alert thresholds"
    } else {
        "reading already evaluated"
    }
}
