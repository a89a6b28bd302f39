// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod decision;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod notify;
pub mod runner;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::decision::{build_message_body, Decision, DecisionEngine, Thresholds, Trigger};
pub use crate::error::{AlertError, DecisionError, NotifyError, SourceError, StoreError};
pub use crate::ingest::{DexcomClient, Reading, ReadingSource, Region, Trend};
pub use crate::notify::{
    CallReceipt, DeliveryReceipt, DryRunSink, NotificationSink, Sms, TwilioClient, VoiceCall,
};
pub use crate::runner::{CycleReport, Recipients, Runner};
pub use crate::store::LastSeenStore;
