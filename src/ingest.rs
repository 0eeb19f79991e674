use crate::error::{RosterError, RosterResult};
use crate::filenames::{has_cleaned_marker, parse_folder_file_name};
use crate::roster::{self, NewVoter};
use crate::sources::UploadedFile;
use crate::tabular::{RowMap, TabularSource, VoterRow};
use crate::units::{self, NewPollingUnit};
use anyhow::anyhow;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterUploadSummary {
    pub row_count: usize,
    pub registered_count: i64,
}

fn voters_for_unit(unit_id: &str, rows: &[RowMap], first_ref_index: i64) -> Vec<NewVoter> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let v = VoterRow::from_row(row);
            NewVoter {
                polling_unit_id: unit_id.to_string(),
                name: v.name,
                external_id: v.external_id,
                gender: v.gender,
                birth_year: v.birth_year,
                ref_index: first_ref_index + i as i64,
            }
        })
        .collect()
}

pub fn ingest_roster(
    conn: &Connection,
    unit_id: &str,
    file: &UploadedFile,
) -> RosterResult<RosterUploadSummary> {
    units::require(conn, unit_id)?;
    let source = TabularSource::from_file_name(&file.name)?;
    let rows = source.parse(&file.bytes)?;

    let tx = conn.unchecked_transaction()?;
    let first = roster::max_ref_index(&tx, unit_id)? + 1;
    let inserted = roster::bulk_insert(&tx, &voters_for_unit(unit_id, &rows, first))?;
    let registered_count = units::sync_registered_count(&tx, unit_id)?;
    tx.commit()?;

    info!(unit_id, file = %file.name, inserted, registered_count, "uploaded roster");
    Ok(RosterUploadSummary {
        row_count: inserted,
        registered_count,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUnit {
    pub unit_id: String,
    pub code: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
    pub created_units: Vec<CreatedUnit>,
}

/// One transaction per file. Fails outright only when no file carries the
/// `_cleaned` marker.
pub fn ingest_folder(
    conn: &Connection,
    ward_id: &str,
    files: &[UploadedFile],
) -> RosterResult<FolderReport> {
    if !files.iter().any(|f| has_cleaned_marker(&f.name)) {
        return Err(RosterError::NoValidFiles);
    }

    let mut report = FolderReport::default();
    for file in files {
        match ingest_folder_file(conn, ward_id, file) {
            Ok(created) => {
                info!(
                    ward_id,
                    file = %file.name,
                    unit_id = %created.unit_id,
                    rows = created.row_count,
                    "created polling unit from file"
                );
                report.success_count += 1;
                report.created_units.push(created);
            }
            Err(e) => {
                warn!(ward_id, file = %file.name, error = %e, "skipping folder file");
                report.failed_count += 1;
                report.errors.push(format!("{}: {}", file.name, e));
            }
        }
    }

    info!(
        ward_id,
        success = report.success_count,
        failed = report.failed_count,
        "bulk folder upload finished"
    );
    Ok(report)
}

fn ingest_folder_file(
    conn: &Connection,
    ward_id: &str,
    file: &UploadedFile,
) -> RosterResult<CreatedUnit> {
    let unit_name = parse_folder_file_name(&file.name)
        .ok_or_else(|| anyhow!("invalid file name, expected CODE_NAME_cleaned.csv"))?;
    let rows = TabularSource::Delimited.parse(&file.bytes)?;
    let row_count = rows.len();

    let tx = conn.unchecked_transaction()?;
    let unit = units::create(
        &tx,
        &NewPollingUnit {
            ward_id: ward_id.to_string(),
            code: unit_name.code.clone(),
            name: unit_name.name,
            registered_count: row_count as i64,
            accredited_count: row_count as i64,
        },
    )?;
    roster::bulk_insert(&tx, &voters_for_unit(&unit.id, &rows, 1))?;
    tx.commit()?;

    Ok(CreatedUnit {
        unit_id: unit.id,
        code: unit_name.code,
        row_count,
    })
}
