// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Trend direction as reported by the CGM, in the order of its numeric index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    None,
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    NotComputable,
    RateOutOfRange,
}

impl Trend {
    const ALL: [Trend; 10] = [
        Trend::None,
        Trend::DoubleUp,
        Trend::SingleUp,
        Trend::FortyFiveUp,
        Trend::Flat,
        Trend::FortyFiveDown,
        Trend::SingleDown,
        Trend::DoubleDown,
        Trend::NotComputable,
        Trend::RateOutOfRange,
    ];

    pub fn from_index(i: u8) -> Option<Self> {
        Self::ALL.get(i as usize).copied()
    }

    /// Map the API's direction name ("Flat", "SingleDown", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name {
            "None" => Trend::None,
            "DoubleUp" => Trend::DoubleUp,
            "SingleUp" => Trend::SingleUp,
            "FortyFiveUp" => Trend::FortyFiveUp,
            "Flat" => Trend::Flat,
            "FortyFiveDown" => Trend::FortyFiveDown,
            "SingleDown" => Trend::SingleDown,
            "DoubleDown" => Trend::DoubleDown,
            "NotComputable" => Trend::NotComputable,
            "RateOutOfRange" => Trend::RateOutOfRange,
            _ => return None,
        };
        Some(t)
    }

    /// Human-readable description used in rules and messages.
    pub fn description(self) -> &'static str {
        match self {
            Trend::None => "",
            Trend::DoubleUp => "rising quickly",
            Trend::SingleUp => "rising",
            Trend::FortyFiveUp => "rising slightly",
            Trend::Flat => "steady",
            Trend::FortyFiveDown => "falling slightly",
            Trend::SingleDown => "falling",
            Trend::DoubleDown => "falling quickly",
            Trend::NotComputable => "unable to determine trend",
            Trend::RateOutOfRange => "trend unavailable",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Trend::None => "",
            Trend::DoubleUp => "↑↑",
            Trend::SingleUp => "↑",
            Trend::FortyFiveUp => "↗",
            Trend::Flat => "→",
            Trend::FortyFiveDown => "↘",
            Trend::SingleDown => "↓",
            Trend::DoubleDown => "↓↓",
            Trend::NotComputable => "?",
            Trend::RateOutOfRange => "-",
        }
    }
}

/// One glucose measurement. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// mg/dL
    pub value: u16,
    pub trend: Trend,
    pub time: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: u16, trend: Trend, time: DateTime<Utc>) -> Self {
        Self { value, trend, time }
    }

    pub fn trend_description(&self) -> &'static str {
        self.trend.description()
    }

    pub fn trend_arrow(&self) -> &'static str {
        self.trend.arrow()
    }
}

#[async_trait::async_trait]
pub trait ReadingSource: Send + Sync {
    /// Latest reading, or an error on transport/API failure.
    async fn current_reading(&self) -> Result<Reading, SourceError>;
    fn name(&self) -> &'static str;
}
