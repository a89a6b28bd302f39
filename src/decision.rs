//! # Decision Engine
//! Pure logic mapping `(reading, last_seen, now)` to "text?" and "call?".
//! No I/O; intermediate booleans are logged at debug level only.
//!
//! A reading is considered at most once: both predicates require freshness,
//! i.e. the reading's timestamp differs from the last evaluated one.

use std::fmt;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::DecisionError;
use crate::ingest::Reading;

/// Alert thresholds in mg/dL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Text at or below this value.
    pub notify_low: u16,
    /// Text at or below this value when the trend is "falling".
    pub notify_falling_low: u16,
    /// Text at or above this value.
    pub notify_high: u16,
    /// Call on every fresh reading at or below this value.
    pub call_low: u16,
    /// Call at or above this value, throttled to the call window.
    pub call_high: u16,
    /// Sustained-high calls only go out when minute-of-hour is a multiple of this.
    pub call_high_every_minutes: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            notify_low: 80,
            notify_falling_low: 100,
            notify_high: 300,
            call_low: 55,
            call_high: 300,
            call_high_every_minutes: 15,
        }
    }
}

impl Thresholds {
    /// Replace nonsensical values with defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        if self.call_high_every_minutes == 0 || self.call_high_every_minutes > 60 {
            self.call_high_every_minutes = d.call_high_every_minutes;
        }
        if self.notify_falling_low < self.notify_low {
            std::mem::swap(&mut self.notify_low, &mut self.notify_falling_low);
        }
        if self.notify_falling_low >= self.notify_high || self.call_low >= self.call_high {
            return Self {
                call_high_every_minutes: self.call_high_every_minutes,
                ..d
            };
        }
        self
    }
}

/// Why a reading counts as severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Low,
    FallingNearLow,
    High,
    FallingQuickly,
    RisingQuickly,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Low => "low",
            Trigger::FallingNearLow => "falling near low",
            Trigger::High => "high",
            Trigger::FallingQuickly => "falling quickly",
            Trigger::RisingQuickly => "rising quickly",
        };
        f.write_str(s)
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub fresh: bool,
    pub notify: bool,
    pub call: bool,
    pub triggers: Vec<Trigger>,
}

/// True when a new reading has arrived since `last_seen`.
pub fn is_fresh(reading: &Reading, last_seen: DateTime<Utc>) -> bool {
    reading.time != last_seen
}

fn check_reading(reading: &Reading) -> Result<(), DecisionError> {
    if reading.value == 0 {
        return Err(DecisionError::MalformedReading(format!(
            "zero glucose value at {}",
            reading.time.to_rfc3339()
        )));
    }
    Ok(())
}

/// Four-line SMS body; time rendered in `tz` as `hh:mm AM/PM on Month Day`.
pub fn build_message_body(reading: &Reading, tz: Tz) -> String {
    let local = reading.time.with_timezone(&tz);
    format!(
        "Blood sugar alert\nCurrent: {} mg/dL\nTrend: {} ({})\nTime: {}",
        reading.value,
        reading.trend_description(),
        reading.trend_arrow(),
        local.format("%I:%M %p on %B %d")
    )
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    thresholds: Thresholds,
    tz: Tz,
}

impl DecisionEngine {
    pub fn new(thresholds: Thresholds, tz: Tz) -> Self {
        Self { thresholds, tz }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Severity rules for texting, in evaluation order.
    pub fn notify_triggers(&self, reading: &Reading) -> Vec<Trigger> {
        let t = &self.thresholds;
        let trend = reading.trend_description();
        let mut out = Vec::new();
        if reading.value <= t.notify_low {
            out.push(Trigger::Low);
        }
        if reading.value <= t.notify_falling_low && trend == "falling" {
            out.push(Trigger::FallingNearLow);
        }
        if reading.value >= t.notify_high {
            out.push(Trigger::High);
        }
        if trend == "falling quickly" {
            out.push(Trigger::FallingQuickly);
        }
        if trend == "rising quickly" {
            out.push(Trigger::RisingQuickly);
        }
        out
    }

    pub fn should_notify(
        &self,
        reading: &Reading,
        last_seen: DateTime<Utc>,
    ) -> Result<bool, DecisionError> {
        check_reading(reading)?;
        let fresh = is_fresh(reading, last_seen);
        let severe = !self.notify_triggers(reading).is_empty();
        tracing::debug!(
            value = reading.value,
            trend = reading.trend_description(),
            fresh,
            severe,
            "notify decision"
        );
        Ok(fresh && severe)
    }

    /// Call decision. Any evaluation failure yields `false`.
    pub fn should_call(
        &self,
        reading: &Reading,
        last_seen: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        match self.try_should_call(reading, last_seen, now) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(error = %e, "call decision failed, not calling");
                false
            }
        }
    }

    fn try_should_call(
        &self,
        reading: &Reading,
        last_seen: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, DecisionError> {
        check_reading(reading)?;
        let t = &self.thresholds;
        let fresh = is_fresh(reading, last_seen);

        let urgent_low = reading.value <= t.call_low;
        let high = reading.value >= t.call_high;

        // Urgent lows ignore the clock; only sustained highs are throttled.
        let in_window = if high && !urgent_low {
            self.in_call_window(now)?
        } else {
            false
        };

        let severe = urgent_low || (high && in_window);
        tracing::debug!(
            value = reading.value,
            fresh,
            urgent_low,
            high,
            in_window,
            "call decision"
        );
        Ok(fresh && severe)
    }

    /// Wall-clock minute, not the reading time.
    fn in_call_window(&self, now: DateTime<Utc>) -> Result<bool, DecisionError> {
        let every = self.thresholds.call_high_every_minutes;
        let minute = now.with_timezone(&self.tz).minute();
        let rem = minute
            .checked_rem(every)
            .ok_or_else(|| DecisionError::Clock(format!("call window of {every} minutes")))?;
        Ok(rem == 0)
    }

    /// Both predicates plus the triggers that fired, for logging.
    pub fn evaluate(
        &self,
        reading: &Reading,
        last_seen: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Decision, DecisionError> {
        let notify = self.should_notify(reading, last_seen)?;
        let call = self.should_call(reading, last_seen, now);
        Ok(Decision {
            fresh: is_fresh(reading, last_seen),
            notify,
            call,
            triggers: self.notify_triggers(reading),
        })
    }

    pub fn build_message_body(&self, reading: &Reading) -> String {
        build_message_body(reading, self.tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Trend;
    use chrono::TimeZone;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(Thresholds::default(), chrono_tz::UTC)
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 7, 20, 40, 58).unwrap()
    }

    fn at_minute(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 7, 21, m, 3).unwrap()
    }

    fn reading(value: u16, trend: Trend) -> Reading {
        Reading::new(value, trend, t1())
    }

    #[test]
    fn low_values_always_notify_when_fresh() {
        let e = engine();
        for v in [40, 55, 79, 80] {
            for trend in [Trend::Flat, Trend::DoubleUp, Trend::SingleUp, Trend::None] {
                assert!(e.should_notify(&reading(v, trend), epoch()).unwrap(), "{v} {trend:?}");
            }
        }
    }

    #[test]
    fn near_low_needs_falling_trend() {
        let e = engine();
        for v in [81, 90, 100] {
            assert!(e.should_notify(&reading(v, Trend::SingleDown), epoch()).unwrap());
            assert!(!e.should_notify(&reading(v, Trend::Flat), epoch()).unwrap());
        }
        // "falling slightly" is not "falling"
        assert!(!e.should_notify(&reading(95, Trend::FortyFiveDown), epoch()).unwrap());
        assert!(!e.should_notify(&reading(101, Trend::SingleDown), epoch()).unwrap());
    }

    #[test]
    fn high_notifies_regardless_of_trend() {
        let e = engine();
        for trend in [Trend::Flat, Trend::SingleDown, Trend::FortyFiveUp, Trend::NotComputable] {
            assert!(e.should_notify(&reading(300, trend), epoch()).unwrap());
        }
        assert!(!e.should_notify(&reading(299, Trend::Flat), epoch()).unwrap());
    }

    #[test]
    fn fast_trends_notify_in_range() {
        let e = engine();
        assert!(e.should_notify(&reading(150, Trend::DoubleDown), epoch()).unwrap());
        assert!(e.should_notify(&reading(150, Trend::DoubleUp), epoch()).unwrap());
        assert!(!e.should_notify(&reading(150, Trend::SingleUp), epoch()).unwrap());
    }

    #[test]
    fn stale_reading_never_notifies_or_calls() {
        let e = engine();
        for (v, trend) in [(40, Trend::DoubleDown), (75, Trend::SingleDown), (350, Trend::Flat)] {
            let r = reading(v, trend);
            assert!(!e.should_notify(&r, r.time).unwrap());
            assert!(!e.should_call(&r, r.time, at_minute(15)));
        }
    }

    #[test]
    fn urgent_low_calls_at_any_minute() {
        let e = engine();
        for m in [0, 7, 15, 29, 59] {
            assert!(e.should_call(&reading(55, Trend::Flat), epoch(), at_minute(m)));
            assert!(e.should_call(&reading(41, Trend::DoubleDown), epoch(), at_minute(m)));
        }
        assert!(!e.should_call(&reading(56, Trend::DoubleDown), epoch(), at_minute(0)));
    }

    #[test]
    fn high_calls_only_on_quarter_hours() {
        let e = engine();
        let r = reading(310, Trend::Flat);
        for m in 0..60 {
            assert_eq!(e.should_call(&r, epoch(), at_minute(m)), m % 15 == 0, "minute {m}");
        }
    }

    #[test]
    fn scenario_falling_75() {
        let e = engine();
        let r = reading(75, Trend::SingleDown);
        assert!(e.should_notify(&r, epoch()).unwrap());
        assert!(!e.should_call(&r, epoch(), at_minute(15)));
    }

    #[test]
    fn scenario_falling_quickly_50() {
        let e = engine();
        let r = reading(50, Trend::DoubleDown);
        assert!(e.should_notify(&r, epoch()).unwrap());
        assert!(e.should_call(&r, epoch(), at_minute(7)));
    }

    #[test]
    fn scenario_steady_310_throttled() {
        let e = engine();
        let r = reading(310, Trend::Flat);
        assert!(e.should_notify(&r, epoch()).unwrap());
        assert!(!e.should_call(&r, epoch(), at_minute(7)));
        assert!(e.should_call(&r, epoch(), at_minute(15)));
    }

    #[test]
    fn scenario_second_evaluation_after_marker_update() {
        let e = engine();
        let r = reading(50, Trend::DoubleDown);
        let mut last_seen = epoch();
        assert!(e.should_notify(&r, last_seen).unwrap());
        last_seen = r.time;
        assert!(!e.should_notify(&r, last_seen).unwrap());
        assert!(!e.should_call(&r, last_seen, at_minute(15)));
    }

    #[test]
    fn malformed_reading_fails_notify_but_not_call() {
        let e = engine();
        let r = reading(0, Trend::None);
        assert!(matches!(
            e.should_notify(&r, epoch()),
            Err(DecisionError::MalformedReading(_))
        ));
        assert!(!e.should_call(&r, epoch(), at_minute(0)));
    }

    #[test]
    fn zero_call_window_only_blocks_high_calls() {
        let th = Thresholds {
            call_high_every_minutes: 0,
            ..Thresholds::default()
        };
        let e = DecisionEngine::new(th, chrono_tz::UTC);
        assert!(!e.should_call(&reading(350, Trend::Flat), epoch(), at_minute(0)));
        // the window only gates highs
        for m in [0, 7, 41] {
            assert!(e.should_call(&reading(40, Trend::DoubleDown), epoch(), at_minute(m)));
        }
        assert!(!e.should_call(&reading(40, Trend::DoubleDown), t1(), at_minute(0)));
    }

    #[test]
    fn evaluate_collects_triggers() {
        let e = engine();
        let d = e
            .evaluate(&reading(75, Trend::SingleDown), epoch(), at_minute(1))
            .unwrap();
        assert!(d.fresh && d.notify && !d.call);
        assert_eq!(d.triggers, vec![Trigger::Low, Trigger::FallingNearLow]);
    }

    #[test]
    fn message_body_in_local_zone() {
        let r = reading(75, Trend::SingleDown);
        let body = build_message_body(&r, chrono_tz::America::Chicago);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "Current: 75 mg/dL");
        assert_eq!(lines[2], "Trend: falling (↓)");
        // 20:40 UTC is 15:40 CDT
        assert_eq!(lines[3], "Time: 03:40 PM on August 07");
    }

    #[test]
    fn sanitize_repairs_bad_values() {
        let th = Thresholds {
            notify_low: 100,
            notify_falling_low: 80,
            call_high_every_minutes: 0,
            ..Thresholds::default()
        }
        .sanitized();
        assert_eq!(th.notify_low, 80);
        assert_eq!(th.notify_falling_low, 100);
        assert_eq!(th.call_high_every_minutes, 15);

        let inverted = Thresholds {
            call_low: 400,
            ..Thresholds::default()
        }
        .sanitized();
        assert_eq!(inverted, Thresholds::default());
    }
}
