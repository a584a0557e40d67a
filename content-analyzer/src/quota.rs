//! Per-model request quota bookkeeping over rolling minute and calendar-day
//! windows.

use crate::types::ModelSpec;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Time source for quota windows. Injected so tests can drive window
/// rollover deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Default)]
struct ModelQuotaState {
    requests_this_minute: u32,
    requests_today: u32,
    /// Unix minute the per-minute counter belongs to.
    window_minute: i64,
    window_day: Option<NaiveDate>,
}

/// Lock-guarded quota state for all models. The check and the increment
/// happen under a single lock acquisition: two concurrent batch submissions
/// can never both pass a check that only has room for one of them.
pub struct QuotaLedger {
    states: Mutex<HashMap<String, ModelQuotaState>>,
    clock: Arc<dyn Clock>,
}

impl QuotaLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Reserve one request against `spec`. Returns false, without side
    /// effects, when either ceiling is already met in the current windows;
    /// otherwise both counters are incremented and the reservation stands
    /// even if the call it covers later fails.
    pub fn try_acquire(&self, spec: &ModelSpec) -> bool {
        let now = self.clock.now();
        let minute = now.timestamp() / 60;
        let day = now.date_naive();

        let mut states = self.states.lock().expect("quota ledger poisoned");
        let state = states.entry(spec.name.clone()).or_default();

        if state.window_minute != minute {
            state.window_minute = minute;
            state.requests_this_minute = 0;
        }
        if state.window_day != Some(day) {
            state.window_day = Some(day);
            state.requests_today = 0;
        }

        if state.requests_this_minute >= spec.rpm || state.requests_today >= spec.rpd {
            debug!(
                model = %spec.name,
                minute_used = state.requests_this_minute,
                day_used = state.requests_today,
                "quota ceiling reached"
            );
            return false;
        }

        state.requests_this_minute += 1;
        state.requests_today += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn advance_secs(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now = *now + chrono::Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn spec(name: &str, rpm: u32, rpd: u32) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            rpm,
            rpd,
        }
    }

    #[test]
    fn minute_ceiling_blocks_until_window_rolls() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let ledger = QuotaLedger::new(clock.clone());
        let model = spec("flash", 2, 100);

        assert!(ledger.try_acquire(&model));
        assert!(ledger.try_acquire(&model));
        assert!(!ledger.try_acquire(&model));

        clock.advance_secs(60);
        assert!(ledger.try_acquire(&model), "new minute window");
    }

    #[test]
    fn day_ceiling_survives_minute_rollover() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let ledger = QuotaLedger::new(clock.clone());
        let model = spec("flash", 10, 3);

        for _ in 0..3 {
            assert!(ledger.try_acquire(&model));
        }
        clock.advance_secs(120);
        assert!(
            !ledger.try_acquire(&model),
            "daily ceiling holds across minutes"
        );

        clock.advance_secs(86_400);
        assert!(ledger.try_acquire(&model), "new day resets the counter");
    }

    #[test]
    fn models_are_tracked_independently() {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let ledger = QuotaLedger::new(clock);
        let a = spec("a", 1, 10);
        let b = spec("b", 1, 10);

        assert!(ledger.try_acquire(&a));
        assert!(!ledger.try_acquire(&a));
        assert!(ledger.try_acquire(&b), "model b has its own windows");
    }
}
