use std::io::Read;

use chrono::NaiveDate;

use crate::domain::parts::is_catalog_part;
use crate::domain::status::{is_work_status, BreakdownStatus, RunningStatus};
use crate::error::{FleetError, FleetResult};

/// One parsed row of the bulk-upload CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    pub site: String,
    pub rbt_id: String,
    pub cleaner_did: String,
    pub tc_did: String,
    pub cl_pcb_model: String,
    pub tc_pcb_model: String,
    pub running_status: String,
    pub breakdown_status: String,
    pub work: String,
    pub parts: Vec<ImportPart>,
}

/// A part with at least one date is stored selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPart {
    pub part: String,
    pub dispatch_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
}

const PART_PREFIX: &str = "part_issue:";

/// Parse the bulk-upload CSV. Fixed columns `site, rbt_id, cleaner_did,
/// tc_did, cl_pcb_model, tc_pcb_model, running_status, breakdown_status,
/// work` plus any number of `part_issue:<PART>:dispatch_date` /
/// `part_issue:<PART>:delivery_date` columns. Rows with an empty site or
/// rbt_id are skipped; statuses and part names are closed sets and reported
/// with their row number on error.
pub fn parse_csv<R: Read>(reader: R) -> FleetResult<Vec<ImportRow>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    // (column index, part name, is dispatch) for every part_issue column.
    let mut part_columns = Vec::new();
    for (index, name) in headers.iter().enumerate() {
        let Some(rest) = name.strip_prefix(PART_PREFIX) else {
            continue;
        };
        let Some((part, sub)) = rest.rsplit_once(':') else {
            return Err(FleetError::Validation(format!(
                "Malformed part column '{}'",
                name
            )));
        };
        let part = part.trim().to_uppercase();
        if !is_catalog_part(&part) {
            return Err(FleetError::Validation(format!(
                "Unknown part '{}' in column '{}'",
                part, name
            )));
        }
        let is_dispatch = match sub {
            "dispatch_date" => true,
            "delivery_date" => false,
            other => {
                return Err(FleetError::Validation(format!(
                    "Unknown part field '{}' in column '{}'",
                    other, name
                )));
            }
        };
        part_columns.push((index, part, is_dispatch));
    }

    let column = |name: &str| headers.iter().position(|h| h == name);
    let site_col = column("site");
    let rbt_col = column("rbt_id");
    if site_col.is_none() || rbt_col.is_none() {
        return Err(FleetError::Validation(
            "CSV must have 'site' and 'rbt_id' columns".into(),
        ));
    }
    let text_cols = [
        ("cleaner_did", column("cleaner_did")),
        ("tc_did", column("tc_did")),
        ("cl_pcb_model", column("cl_pcb_model")),
        ("tc_pcb_model", column("tc_pcb_model")),
    ];
    let running_col = column("running_status");
    let breakdown_col = column("breakdown_status");
    let work_col = column("work");

    let mut rows = Vec::new();
    for (record_index, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = record_index + 2;
        let cell = |col: Option<usize>| col.and_then(|i| record.get(i)).unwrap_or("").to_string();

        let site = cell(site_col);
        let rbt_id = cell(rbt_col);
        if site.is_empty() || rbt_id.is_empty() {
            continue;
        }

        let mut row = ImportRow {
            site,
            rbt_id,
            running_status: "Auto".to_string(),
            breakdown_status: "N/A".to_string(),
            ..ImportRow::default()
        };
        for (name, col) in text_cols {
            let value = cell(col);
            match name {
                "cleaner_did" => row.cleaner_did = value,
                "tc_did" => row.tc_did = value,
                "cl_pcb_model" => row.cl_pcb_model = value,
                _ => row.tc_pcb_model = value,
            }
        }
        let running = cell(running_col);
        if !running.is_empty() {
            RunningStatus::parse(&running).ok_or_else(|| {
                FleetError::Validation(format!("Row {}: unknown running_status '{}'", line, running))
            })?;
            row.running_status = running;
        }
        let breakdown = cell(breakdown_col);
        if !breakdown.is_empty() {
            BreakdownStatus::parse(&breakdown).ok_or_else(|| {
                FleetError::Validation(format!(
                    "Row {}: unknown breakdown_status '{}'",
                    line, breakdown
                ))
            })?;
            row.breakdown_status = breakdown;
        }
        let work = cell(work_col);
        if !work.is_empty() {
            if !is_work_status(&work) {
                return Err(FleetError::Validation(format!(
                    "Row {}: unknown work '{}'",
                    line, work
                )));
            }
            row.work = work;
        }

        for (index, part, is_dispatch) in &part_columns {
            let raw = record.get(*index).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let date = raw.parse::<NaiveDate>().map_err(|_| {
                FleetError::Validation(format!("Row {}: invalid date '{}' for {}", line, raw, part))
            })?;
            let entry = match row.parts.iter_mut().find(|p| &p.part == part) {
                Some(entry) => entry,
                None => {
                    row.parts.push(ImportPart {
                        part: part.clone(),
                        dispatch_date: None,
                        delivery_date: None,
                    });
                    row.parts.last_mut().unwrap()
                }
            };
            if *is_dispatch {
                entry.dispatch_date = Some(date);
            } else {
                entry.delivery_date = Some(date);
            }
        }

        rows.push(row);
    }
    Ok(rows)
}
