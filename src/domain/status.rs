use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Automatic-operation state of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunningStatus {
    Auto,
    Manual,
    NotRunning,
}

impl RunningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunningStatus::Auto => "Auto",
            RunningStatus::Manual => "Manual",
            RunningStatus::NotRunning => "Not Running",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Auto" => Some(RunningStatus::Auto),
            "Manual" => Some(RunningStatus::Manual),
            "Not Running" => Some(RunningStatus::NotRunning),
            _ => None,
        }
    }
}

/// Fault state of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakdownStatus {
    Na,
    RunningWithIssue,
    Breakdown,
}

impl BreakdownStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakdownStatus::Na => "N/A",
            BreakdownStatus::RunningWithIssue => "Running With Issue",
            BreakdownStatus::Breakdown => "Breakdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "N/A" => Some(BreakdownStatus::Na),
            "Running With Issue" => Some(BreakdownStatus::RunningWithIssue),
            "Breakdown" => Some(BreakdownStatus::Breakdown),
            _ => None,
        }
    }
}

pub const WORK_STATUSES: [&str; 6] = [
    "Part Procurement",
    "Part In-Transit",
    "Part Installation",
    "Part Testing",
    "Trial",
    "Auto Scheduling",
];

pub fn is_work_status(s: &str) -> bool {
    WORK_STATUSES.contains(&s)
}

/// What to do with an ageing-basis timestamp when a plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisAction {
    Keep,
    SetNow,
    Clear,
}

impl BasisAction {
    pub fn apply(
        &self,
        current: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            BasisAction::Keep => current,
            BasisAction::SetNow => Some(now),
            BasisAction::Clear => None,
        }
    }
}

/// Current status fields of a robot, as read from storage.
#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    pub running: RunningStatus,
    pub breakdown: BreakdownStatus,
    pub manual_at: Option<DateTime<Utc>>,
    pub not_running_at: Option<DateTime<Utc>>,
}

/// Full update set for one requested status change. Both statuses are always
/// present so a plan can be applied as a single multi-field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPlan {
    pub running: RunningStatus,
    pub breakdown: BreakdownStatus,
    pub manual_at: BasisAction,
    pub not_running_at: BasisAction,
    pub requires_target_date: bool,
}

/// Plan a requested `running_status` change.
///
/// Auto is the nominal reset: breakdown returns to N/A and both ageing bases
/// clear. Leaving Auto raises breakdown to Running With Issue when it was
/// nominal, stamps the matching basis only if it is not already set, and
/// demands a target date.
pub fn plan_running_change(cur: &StatusSnapshot, next: RunningStatus) -> StatusPlan {
    match next {
        RunningStatus::Auto => StatusPlan {
            running: RunningStatus::Auto,
            breakdown: BreakdownStatus::Na,
            manual_at: BasisAction::Clear,
            not_running_at: BasisAction::Clear,
            requires_target_date: false,
        },
        RunningStatus::Manual => StatusPlan {
            running: RunningStatus::Manual,
            breakdown: raise_if_nominal(cur.breakdown),
            manual_at: set_if_unset(cur.manual_at),
            not_running_at: BasisAction::Keep,
            requires_target_date: true,
        },
        RunningStatus::NotRunning => StatusPlan {
            running: RunningStatus::NotRunning,
            breakdown: raise_if_nominal(cur.breakdown),
            manual_at: BasisAction::Keep,
            not_running_at: set_if_unset(cur.not_running_at),
            requires_target_date: true,
        },
    }
}

/// Plan a requested `breakdown_status` change. N/A forces the symmetric
/// nominal reset; a fault raised while running Auto promotes the robot to
/// Manual.
pub fn plan_breakdown_change(cur: &StatusSnapshot, next: BreakdownStatus) -> StatusPlan {
    match next {
        BreakdownStatus::Na => StatusPlan {
            running: RunningStatus::Auto,
            breakdown: BreakdownStatus::Na,
            manual_at: BasisAction::Clear,
            not_running_at: BasisAction::Clear,
            requires_target_date: false,
        },
        other => {
            let promoted = cur.running == RunningStatus::Auto;
            StatusPlan {
                running: if promoted {
                    RunningStatus::Manual
                } else {
                    cur.running
                },
                breakdown: other,
                manual_at: if promoted {
                    set_if_unset(cur.manual_at)
                } else {
                    BasisAction::Keep
                },
                not_running_at: BasisAction::Keep,
                requires_target_date: true,
            }
        }
    }
}

fn raise_if_nominal(cur: BreakdownStatus) -> BreakdownStatus {
    if cur == BreakdownStatus::Na {
        BreakdownStatus::RunningWithIssue
    } else {
        cur
    }
}

fn set_if_unset(basis: Option<DateTime<Utc>>) -> BasisAction {
    if basis.is_none() {
        BasisAction::SetNow
    } else {
        BasisAction::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nominal() -> StatusSnapshot {
        StatusSnapshot {
            running: RunningStatus::Auto,
            breakdown: BreakdownStatus::Na,
            manual_at: None,
            not_running_at: None,
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn leaving_auto_raises_breakdown_and_stamps_basis() {
        let plan = plan_running_change(&nominal(), RunningStatus::Manual);
        assert_eq!(plan.running, RunningStatus::Manual);
        assert_eq!(plan.breakdown, BreakdownStatus::RunningWithIssue);
        assert_eq!(plan.manual_at, BasisAction::SetNow);
        assert_eq!(plan.not_running_at, BasisAction::Keep);
        assert!(plan.requires_target_date);
    }

    #[test]
    fn basis_is_stamped_only_once() {
        let cur = StatusSnapshot {
            running: RunningStatus::Manual,
            breakdown: BreakdownStatus::RunningWithIssue,
            manual_at: Some(ts(1)),
            not_running_at: None,
        };
        let plan = plan_running_change(&cur, RunningStatus::Manual);
        assert_eq!(plan.manual_at, BasisAction::Keep);

        // Switching to Not Running stamps the other basis but keeps this one.
        let plan = plan_running_change(&cur, RunningStatus::NotRunning);
        assert_eq!(plan.manual_at, BasisAction::Keep);
        assert_eq!(plan.not_running_at, BasisAction::SetNow);
    }

    #[test]
    fn back_to_auto_clears_everything() {
        let cur = StatusSnapshot {
            running: RunningStatus::NotRunning,
            breakdown: BreakdownStatus::Breakdown,
            manual_at: Some(ts(1)),
            not_running_at: Some(ts(3)),
        };
        let plan = plan_running_change(&cur, RunningStatus::Auto);
        assert_eq!(plan.running, RunningStatus::Auto);
        assert_eq!(plan.breakdown, BreakdownStatus::Na);
        assert_eq!(plan.manual_at, BasisAction::Clear);
        assert_eq!(plan.not_running_at, BasisAction::Clear);
        assert!(!plan.requires_target_date);
    }

    #[test]
    fn breakdown_na_forces_auto() {
        let cur = StatusSnapshot {
            running: RunningStatus::Manual,
            breakdown: BreakdownStatus::RunningWithIssue,
            manual_at: Some(ts(2)),
            not_running_at: None,
        };
        let plan = plan_breakdown_change(&cur, BreakdownStatus::Na);
        assert_eq!(plan.running, RunningStatus::Auto);
        assert_eq!(plan.manual_at, BasisAction::Clear);
        assert_eq!(plan.not_running_at, BasisAction::Clear);
    }

    #[test]
    fn fault_while_auto_promotes_to_manual() {
        let plan = plan_breakdown_change(&nominal(), BreakdownStatus::Breakdown);
        assert_eq!(plan.running, RunningStatus::Manual);
        assert_eq!(plan.breakdown, BreakdownStatus::Breakdown);
        assert_eq!(plan.manual_at, BasisAction::SetNow);
        assert!(plan.requires_target_date);
    }

    #[test]
    fn fault_while_manual_keeps_running_status() {
        let cur = StatusSnapshot {
            running: RunningStatus::NotRunning,
            breakdown: BreakdownStatus::RunningWithIssue,
            manual_at: None,
            not_running_at: Some(ts(5)),
        };
        let plan = plan_breakdown_change(&cur, BreakdownStatus::Breakdown);
        assert_eq!(plan.running, RunningStatus::NotRunning);
        assert_eq!(plan.manual_at, BasisAction::Keep);
        assert_eq!(plan.not_running_at, BasisAction::Keep);
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["Auto", "Manual", "Not Running"] {
            assert_eq!(RunningStatus::parse(s).unwrap().as_str(), s);
        }
        for s in ["N/A", "Running With Issue", "Breakdown"] {
            assert_eq!(BreakdownStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(RunningStatus::parse("Broken").is_none());
        assert!(BreakdownStatus::parse("").is_none());
        assert!(is_work_status("Part Testing"));
        assert!(!is_work_status("Repairs"));
    }
}
