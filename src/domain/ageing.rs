use chrono::{DateTime, Utc};

use super::status::RunningStatus;

/// Whole days a robot has been out of the nominal Auto state, derived from
/// the earliest non-null ageing basis. Always computed on demand; the basis
/// timestamps are the only stored ground truth.
pub fn ageing_days(
    running: RunningStatus,
    manual_at: Option<DateTime<Utc>>,
    not_running_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    if running == RunningStatus::Auto {
        return 0;
    }
    let basis = match (manual_at, not_running_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    match basis {
        Some(t) => (now - t).num_days().max(0),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn auto_is_always_zero() {
        assert_eq!(
            ageing_days(RunningStatus::Auto, Some(ts(1, 0)), Some(ts(2, 0)), ts(20, 0)),
            0
        );
    }

    #[test]
    fn no_basis_is_zero() {
        assert_eq!(ageing_days(RunningStatus::Manual, None, None, ts(20, 0)), 0);
    }

    #[test]
    fn earliest_basis_wins() {
        let age = ageing_days(
            RunningStatus::NotRunning,
            Some(ts(10, 0)),
            Some(ts(4, 0)),
            ts(14, 0),
        );
        assert_eq!(age, 10);
    }

    #[test]
    fn partial_days_floor() {
        // 23 hours elapsed is still day zero.
        assert_eq!(
            ageing_days(RunningStatus::Manual, Some(ts(1, 1)), None, ts(2, 0)),
            0
        );
        assert_eq!(
            ageing_days(RunningStatus::Manual, Some(ts(1, 0)), None, ts(2, 0)),
            1
        );
    }

    #[test]
    fn clock_skew_clamps_to_zero() {
        assert_eq!(
            ageing_days(RunningStatus::Manual, Some(ts(5, 0)), None, ts(4, 0)),
            0
        );
    }

    #[test]
    fn monotone_while_state_unchanged() {
        let basis = Some(ts(1, 0));
        let mut last = 0;
        for day in 2..10 {
            let age = ageing_days(RunningStatus::Manual, basis, None, ts(day, 6));
            assert!(age >= last);
            last = age;
        }
    }
}
