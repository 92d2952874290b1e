use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::status::{BreakdownStatus, RunningStatus};

/// Closed replacement-part catalog. Membership is validated on every part
/// write; legacy spellings ("BATTTERY", unnumbered wheels) are rejected.
pub const PART_CATALOG: [&str; 31] = [
    "ANTENA CABLE",
    "ANTENA PORT",
    "BATTERY",
    "BATTERY BOX",
    "BRUSH MOTOR",
    "CHARGE CONTROLLER",
    "GUIDE WHEEL 1",
    "GUIDE WHEEL 2",
    "GUIDE WHEEL 3",
    "GUIDE WHEEL 4",
    "HOME SENSOR",
    "LIMIT SWITCH 1",
    "LIMIT SWITCH 2",
    "LOAD WHEEL 1",
    "LOAD WHEEL 2",
    "LOAD WHEEL 3",
    "LOAD WHEEL 4",
    "LT 1",
    "LT 2",
    "PCB BOX",
    "PULSE COUNT",
    "PV MODULE",
    "REPEATER PCB",
    "RTC",
    "SS PIPE",
    "SSC",
    "STEPPER DRIVE",
    "STEPPER MOTOR",
    "TC BELT",
    "TC LOAD WHEEL",
    "XBEE",
];

pub fn is_catalog_part(name: &str) -> bool {
    PART_CATALOG.contains(&name)
}

/// Per-part logistics state. Missing storage rows read as the default
/// (unselected, both dates empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartIssueState {
    pub selected: bool,
    pub dispatch_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
}

impl PartIssueState {
    /// Checkbox-driven selection: toggling off clears both dates, toggling
    /// on starts with both empty.
    pub fn toggled(&self) -> PartIssueState {
        if self.selected {
            PartIssueState::default()
        } else {
            PartIssueState {
                selected: true,
                dispatch_date: self.dispatch_date,
                delivery_date: self.delivery_date,
            }
        }
    }
}

/// Complete map over the catalog with defaults for missing entries.
pub fn default_part_map() -> BTreeMap<String, PartIssueState> {
    PART_CATALOG
        .iter()
        .map(|p| (p.to_string(), PartIssueState::default()))
        .collect()
}

/// Whether the part-issue editor applies to a robot. Conservative union of
/// the observed predicates: anything non-nominal shows it.
pub fn editor_visible(running: RunningStatus, breakdown: BreakdownStatus) -> bool {
    running != RunningStatus::Auto || breakdown != BreakdownStatus::Na
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_sorted_and_closed() {
        let mut sorted = PART_CATALOG.to_vec();
        sorted.sort();
        assert_eq!(sorted, PART_CATALOG.to_vec());
        assert!(is_catalog_part("BATTERY"));
        assert!(!is_catalog_part("BATTTERY"));
        assert!(!is_catalog_part("GUIDE WHEEL"));
        assert!(!is_catalog_part("battery"));
    }

    #[test]
    fn toggle_off_clears_dates() {
        let on = PartIssueState {
            selected: true,
            dispatch_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            delivery_date: NaiveDate::from_ymd_opt(2024, 1, 9),
        };
        let off = on.toggled();
        assert!(!off.selected);
        assert!(off.dispatch_date.is_none());
        assert!(off.delivery_date.is_none());

        // Toggling back on starts empty again.
        let back_on = off.toggled();
        assert!(back_on.selected);
        assert!(back_on.dispatch_date.is_none());
        assert!(back_on.delivery_date.is_none());
    }

    #[test]
    fn default_map_covers_catalog() {
        let map = default_part_map();
        assert_eq!(map.len(), PART_CATALOG.len());
        assert_eq!(map["XBEE"], PartIssueState::default());
    }

    #[test]
    fn editor_shown_when_not_nominal() {
        assert!(!editor_visible(RunningStatus::Auto, BreakdownStatus::Na));
        assert!(editor_visible(RunningStatus::Manual, BreakdownStatus::Na));
        assert!(editor_visible(
            RunningStatus::Auto,
            BreakdownStatus::RunningWithIssue
        ));
        assert!(editor_visible(
            RunningStatus::NotRunning,
            BreakdownStatus::Breakdown
        ));
    }
}
