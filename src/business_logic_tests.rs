#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use crate::commands::logs::compact_part_value;
    use crate::domain::actor::{can, Action, Actor, Role};
    use crate::domain::ageing::ageing_days;
    use crate::domain::status::{
        plan_breakdown_change, plan_running_change, BasisAction, BreakdownStatus, RunningStatus,
        StatusSnapshot,
    };
    use crate::importer::parse_csv;

    /// Robot RBT3 at site Parola, client Juniper, starts nominal. Setting
    /// running_status = Manual must raise the breakdown status, stamp the
    /// manual basis, and leave ageing at 0 until a full day has passed.
    #[test]
    fn manual_transition_scenario() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let nominal = StatusSnapshot {
            running: RunningStatus::Auto,
            breakdown: BreakdownStatus::Na,
            manual_at: None,
            not_running_at: None,
        };

        let plan = plan_running_change(&nominal, RunningStatus::Manual);
        assert_eq!(plan.running, RunningStatus::Manual);
        assert_eq!(plan.breakdown, BreakdownStatus::RunningWithIssue);
        assert!(plan.requires_target_date);

        let manual_at = plan.manual_at.apply(nominal.manual_at, now);
        let not_running_at = plan.not_running_at.apply(nominal.not_running_at, now);
        assert_eq!(manual_at, Some(now));
        assert_eq!(not_running_at, None);

        // Ageing is 0 immediately after the write, then grows a day at a time.
        assert_eq!(ageing_days(plan.running, manual_at, not_running_at, now), 0);
        for days in 1..4 {
            assert_eq!(
                ageing_days(
                    plan.running,
                    manual_at,
                    not_running_at,
                    now + Duration::days(days)
                ),
                days
            );
        }
    }

    /// The same robot returning to N/A: running goes back to Auto, both
    /// bases clear and ageing resets to exactly 0.
    #[test]
    fn nominal_reset_scenario() {
        let stamped = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let current = StatusSnapshot {
            running: RunningStatus::Manual,
            breakdown: BreakdownStatus::RunningWithIssue,
            manual_at: Some(stamped),
            not_running_at: None,
        };

        let plan = plan_breakdown_change(&current, BreakdownStatus::Na);
        assert_eq!(plan.running, RunningStatus::Auto);
        assert_eq!(plan.breakdown, BreakdownStatus::Na);
        assert_eq!(plan.manual_at, BasisAction::Clear);
        assert_eq!(plan.not_running_at, BasisAction::Clear);

        let later = stamped + Duration::days(12);
        assert_eq!(ageing_days(plan.running, None, None, later), 0);
    }

    /// Export then re-parse of a part-issue value must recover the same
    /// (part, dispatch, delivery) triples for every part with a date.
    #[test]
    fn part_csv_round_trip() {
        let value = json!({
            "BATTERY": {"selected": true, "dispatch_date": "2024-01-05", "delivery_date": "2024-01-09"},
            "STEPPER MOTOR": {"selected": true, "dispatch_date": "2024-02-01", "delivery_date": null},
            "XBEE": {"selected": true, "dispatch_date": null, "delivery_date": null}
        });
        let compact = compact_part_value("part_issues", &value.to_string()).unwrap();

        let mut recovered: Vec<(String, Option<String>, Option<String>)> = compact
            .split("; ")
            .map(|entry| {
                let (part, bits) = entry.split_once(": ").unwrap();
                let mut dispatch = None;
                let mut delivery = None;
                for bit in bits.split(" \u{2022} ") {
                    if let Some(d) = bit.strip_prefix("dispatch=") {
                        dispatch = Some(d.to_string());
                    } else if let Some(d) = bit.strip_prefix("delivery=") {
                        delivery = Some(d.to_string());
                    }
                }
                (part.to_string(), dispatch, delivery)
            })
            .collect();
        recovered.sort();

        assert_eq!(
            recovered,
            vec![
                (
                    "BATTERY".to_string(),
                    Some("2024-01-05".to_string()),
                    Some("2024-01-09".to_string())
                ),
                (
                    "STEPPER MOTOR".to_string(),
                    Some("2024-02-01".to_string()),
                    None
                ),
            ]
        );
    }

    /// The bulk-upload row from the Tembhe fleet: a part with only a
    /// dispatch date is imported with an empty delivery date.
    #[test]
    fn bulk_upload_partial_dates() {
        let csv = "site,rbt_id,part_issue:BATTERY:dispatch_date,part_issue:BATTERY:delivery_date\n\
                   Tembhe,RBT7,2024-01-05,\n";
        let rows = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let battery = &rows[0].parts[0];
        assert_eq!(battery.part, "BATTERY");
        assert_eq!(
            battery.dispatch_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(battery.delivery_date, None);
    }

    /// Deleting a robot is reserved for super admins; a viewer must be
    /// rejected before any delete is attempted.
    #[test]
    fn viewer_cannot_delete_robots() {
        let viewer = Actor {
            uid: "u-viewer".to_string(),
            email: "viewer@example.com".to_string(),
            role: Role::Viewer,
        };
        assert!(!can(&viewer, Action::DeleteRobot));
        assert!(viewer.require(Action::DeleteRobot).is_err());

        let admin = Actor {
            uid: "u-admin".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        };
        assert!(!can(&admin, Action::DeleteRobot));
    }
}
