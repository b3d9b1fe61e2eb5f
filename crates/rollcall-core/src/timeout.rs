//! Window expiry

use chrono::{DateTime, Local};
use rollcall_api::PeriodStatus;
use rollcall_util::PeriodId;
use tracing::info;

use crate::PeriodRegistry;

/// Moves waiting periods whose window has closed to `TimedOut`
pub struct TimeoutMonitor;

impl TimeoutMonitor {
    /// Expire every `Waiting` period whose window has elapsed and return their ids.
    ///
    /// Periods in any other status are left alone, including `Detecting`.
    pub fn expire_elapsed(registry: &mut PeriodRegistry, now: &DateTime<Local>) -> Vec<PeriodId> {
        let mut expired = Vec::new();

        for period in registry.iter_mut() {
            if period.status == PeriodStatus::Waiting && period.window.has_elapsed(now) {
                period.status = PeriodStatus::TimedOut;
                info!(period = %period.id, window = %period.window, "Period timed out");
                expired.push(period.id);
            }
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::tests::default_specs;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 4, h, m, s).unwrap()
    }

    #[test]
    fn only_waiting_periods_expire() {
        let mut registry = PeriodRegistry::new(&default_specs()).unwrap();
        let p1 = PeriodId::new(1).unwrap();
        let p2 = PeriodId::new(2).unwrap();
        let p3 = PeriodId::new(3).unwrap();

        registry.get_mut(p2).unwrap().status = PeriodStatus::Detecting;
        registry.get_mut(p3).unwrap().status = PeriodStatus::Skipped;

        // After period 3's window closes; period 1 has been waiting all along.
        let expired = TimeoutMonitor::expire_elapsed(&mut registry, &at(11, 50, 0));

        assert_eq!(expired, vec![p1]);
        assert_eq!(registry.get(p1).unwrap().status, PeriodStatus::TimedOut);
        assert_eq!(registry.get(p2).unwrap().status, PeriodStatus::Detecting);
        assert_eq!(registry.get(p3).unwrap().status, PeriodStatus::Skipped);
    }

    #[test]
    fn expiry_happens_at_window_end() {
        let mut registry = PeriodRegistry::new(&default_specs()).unwrap();

        assert!(TimeoutMonitor::expire_elapsed(&mut registry, &at(9, 44, 59)).is_empty());
        assert_eq!(
            TimeoutMonitor::expire_elapsed(&mut registry, &at(9, 45, 0)),
            vec![PeriodId::new(1).unwrap()]
        );
        // Already expired periods are not reported twice.
        assert!(TimeoutMonitor::expire_elapsed(&mut registry, &at(9, 45, 1)).is_empty());
    }
}
