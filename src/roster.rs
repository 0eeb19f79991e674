use crate::error::RosterResult;
use crate::units;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub id: String,
    pub name: String,
    pub external_id: String,
    pub gender: String,
    pub birth_year: String,
    pub image_url: Option<String>,
    pub ref_index: i64,
    pub polling_unit_id: String,
}

#[derive(Debug, Clone)]
pub struct NewVoter {
    pub polling_unit_id: String,
    pub name: String,
    pub external_id: String,
    pub gender: String,
    pub birth_year: String,
    pub ref_index: i64,
}

const VOTER_COLUMNS: &str =
    "id, name, external_id, gender, birth_year, image_url, ref_index, polling_unit_id";
const MISSING_IMAGE: &str = "(image_url IS NULL OR image_url = '')";

fn voter_from_row(row: &Row<'_>) -> rusqlite::Result<VoterRecord> {
    Ok(VoterRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        external_id: row.get(2)?,
        gender: row.get(3)?,
        birth_year: row.get(4)?,
        image_url: row.get(5)?,
        ref_index: row.get(6)?,
        polling_unit_id: row.get(7)?,
    })
}

pub fn list_by_unit(
    conn: &Connection,
    unit_id: &str,
    only_missing_image: bool,
) -> RosterResult<Vec<VoterRecord>> {
    let filter = if only_missing_image {
        format!(" AND {MISSING_IMAGE}")
    } else {
        String::new()
    };
    let sql = format!(
        "SELECT {VOTER_COLUMNS} FROM voters
         WHERE polling_unit_id = ?{filter}
         ORDER BY ref_index, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([unit_id], voter_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_from_ref_index(
    conn: &Connection,
    unit_id: &str,
    start_ref_index: i64,
) -> RosterResult<Vec<VoterRecord>> {
    let sql = format!(
        "SELECT {VOTER_COLUMNS} FROM voters
         WHERE polling_unit_id = ? AND ref_index >= ?
         ORDER BY ref_index, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((unit_id, start_ref_index), voter_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn max_ref_index(conn: &Connection, unit_id: &str) -> RosterResult<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(ref_index), 0) FROM voters WHERE polling_unit_id = ?",
        [unit_id],
        |r| r.get(0),
    )?)
}

pub fn bulk_insert(conn: &Connection, rows: &[NewVoter]) -> RosterResult<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO voters(
           id, polling_unit_id, name, external_id, gender, birth_year, ref_index, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
    )?;
    for row in rows {
        stmt.execute((
            Uuid::new_v4().to_string(),
            &row.polling_unit_id,
            &row.name,
            &row.external_id,
            &row.gender,
            &row.birth_year,
            row.ref_index,
        ))?;
    }
    Ok(rows.len())
}

pub fn bulk_reindex(conn: &Connection, updates: &[(String, i64)]) -> RosterResult<()> {
    let mut stmt = conn.prepare(
        "UPDATE voters
         SET ref_index = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
    )?;
    for (id, ref_index) in updates {
        stmt.execute((ref_index, id))?;
    }
    Ok(())
}

pub fn bulk_transfer(
    conn: &Connection,
    dest_unit_id: &str,
    updates: &[(String, i64)],
) -> RosterResult<()> {
    let mut stmt = conn.prepare(
        "UPDATE voters
         SET polling_unit_id = ?, ref_index = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
    )?;
    for (id, ref_index) in updates {
        stmt.execute((dest_unit_id, ref_index, id))?;
    }
    Ok(())
}

pub fn delete_by_unit(
    conn: &Connection,
    unit_id: &str,
    only_missing_image: bool,
) -> RosterResult<usize> {
    let sql = if only_missing_image {
        format!("DELETE FROM voters WHERE polling_unit_id = ? AND {MISSING_IMAGE}")
    } else {
        "DELETE FROM voters WHERE polling_unit_id = ?".to_string()
    };
    Ok(conn.execute(&sql, [unit_id])?)
}

pub fn existing_ref_indexes(
    conn: &Connection,
    unit_id: &str,
    candidates: &[i64],
) -> RosterResult<HashSet<i64>> {
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }
    let placeholders = vec!["?"; candidates.len()].join(", ");
    let sql = format!(
        "SELECT DISTINCT ref_index FROM voters
         WHERE polling_unit_id = ? AND ref_index IN ({placeholders})"
    );
    let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(candidates.len() + 1);
    params.push(unit_id.to_string().into());
    params.extend(candidates.iter().map(|v| (*v).into()));

    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params_from_iter(params), |r| r.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(found)
}

pub fn bulk_set_image_urls(
    conn: &Connection,
    unit_id: &str,
    updates: &[(i64, String)],
) -> RosterResult<usize> {
    let mut stmt = conn.prepare(
        "UPDATE voters
         SET image_url = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE polling_unit_id = ? AND ref_index = ?",
    )?;
    let mut changed = 0;
    for (ref_index, url) in updates {
        changed += stmt.execute((url, unit_id, ref_index))?;
    }
    Ok(changed)
}

/// Closes gaps and duplicates: reads the roster in order and rewrites
/// positions to `1..N`. Returns how many rows actually changed.
pub fn renumber_unit(conn: &Connection, unit_id: &str) -> RosterResult<usize> {
    let rows = list_by_unit(conn, unit_id, false)?;
    let updates: Vec<(String, i64)> = rows
        .iter()
        .enumerate()
        .filter(|(i, r)| r.ref_index != *i as i64 + 1)
        .map(|(i, r)| (r.id.clone(), i as i64 + 1))
        .collect();
    bulk_reindex(conn, &updates)?;
    Ok(updates.len())
}

#[cfg(test)]
pub(crate) fn is_contiguous(conn: &Connection, unit_id: &str) -> RosterResult<bool> {
    let rows = list_by_unit(conn, unit_id, false)?;
    Ok(rows
        .iter()
        .enumerate()
        .all(|(i, r)| r.ref_index == i as i64 + 1))
}

pub fn clear_roster(
    conn: &Connection,
    unit_id: &str,
    only_missing_image: bool,
) -> RosterResult<usize> {
    units::require(conn, unit_id)?;
    let tx = conn.unchecked_transaction()?;
    let deleted = delete_by_unit(&tx, unit_id, only_missing_image)?;
    let renumbered = renumber_unit(&tx, unit_id)?;
    let registered = units::sync_registered_count(&tx, unit_id)?;
    tx.commit()?;
    info!(
        unit_id,
        deleted, renumbered, registered, only_missing_image, "cleared roster"
    );
    Ok(deleted)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub row_count: i64,
    pub renumbered: usize,
    pub registered_count: i64,
}

pub fn repair_unit(conn: &Connection, unit_id: &str) -> RosterResult<RepairSummary> {
    let before = units::require(conn, unit_id)?;
    let tx = conn.unchecked_transaction()?;
    let renumbered = renumber_unit(&tx, unit_id)?;
    let registered = units::sync_registered_count(&tx, unit_id)?;
    tx.commit()?;
    if renumbered > 0 || registered != before.registered_count {
        warn!(
            unit_id,
            renumbered,
            registered_before = before.registered_count,
            registered_after = registered,
            "repaired roster"
        );
    }
    Ok(RepairSummary {
        row_count: registered,
        renumbered,
        registered_count: registered,
    })
}

#[cfg(test)]
pub(crate) fn seed_voters(conn: &Connection, unit_id: &str, n: usize) {
    let start = max_ref_index(conn, unit_id).expect("max ref");
    let rows: Vec<NewVoter> = (0..n)
        .map(|i| NewVoter {
            polling_unit_id: unit_id.to_string(),
            name: format!("Voter {}", start + i as i64 + 1),
            external_id: format!("{:011}", start + i as i64 + 1),
            gender: "F".into(),
            birth_year: "1990".into(),
            ref_index: start + i as i64 + 1,
        })
        .collect();
    bulk_insert(conn, &rows).expect("seed voters");
    units::sync_registered_count(conn, unit_id).expect("sync count");
}

#[cfg(test)]
pub(crate) fn ref_indexes(conn: &Connection, unit_id: &str) -> Vec<i64> {
    list_by_unit(conn, unit_id, false)
        .expect("list")
        .into_iter()
        .map(|r| r.ref_index)
        .collect()
}
