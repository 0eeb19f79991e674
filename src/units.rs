use crate::error::{RosterError, RosterResult};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingUnit {
    pub id: String,
    pub ward_id: String,
    pub code: String,
    pub name: String,
    pub registered_count: i64,
    pub accredited_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewPollingUnit {
    pub ward_id: String,
    pub code: String,
    pub name: String,
    pub registered_count: i64,
    pub accredited_count: i64,
}

const UNIT_COLUMNS: &str = "id, ward_id, code, name, registered_count, accredited_count";

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<PollingUnit> {
    Ok(PollingUnit {
        id: row.get(0)?,
        ward_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        registered_count: row.get(4)?,
        accredited_count: row.get(5)?,
    })
}

pub fn find(conn: &Connection, unit_id: &str) -> RosterResult<Option<PollingUnit>> {
    let sql = format!("SELECT {UNIT_COLUMNS} FROM polling_units WHERE id = ?");
    Ok(conn.query_row(&sql, [unit_id], unit_from_row).optional()?)
}

pub fn require(conn: &Connection, unit_id: &str) -> RosterResult<PollingUnit> {
    find(conn, unit_id)?.ok_or_else(|| RosterError::PollingUnitNotFound {
        unit_id: unit_id.to_string(),
    })
}

pub fn list_by_ward(conn: &Connection, ward_id: &str) -> RosterResult<Vec<PollingUnit>> {
    let sql = format!("SELECT {UNIT_COLUMNS} FROM polling_units WHERE ward_id = ? ORDER BY code");
    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map([ward_id], unit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(units)
}

pub fn create(conn: &Connection, new_unit: &NewPollingUnit) -> RosterResult<PollingUnit> {
    let unit = PollingUnit {
        id: Uuid::new_v4().to_string(),
        ward_id: new_unit.ward_id.clone(),
        code: new_unit.code.clone(),
        name: new_unit.name.clone(),
        registered_count: new_unit.registered_count,
        accredited_count: new_unit.accredited_count,
    };
    conn.execute(
        "INSERT INTO polling_units(id, ward_id, code, name, registered_count, accredited_count)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &unit.id,
            &unit.ward_id,
            &unit.code,
            &unit.name,
            unit.registered_count,
            unit.accredited_count,
        ),
    )?;
    Ok(unit)
}

pub fn adjust_registered_count(conn: &Connection, unit_id: &str, delta: i64) -> RosterResult<()> {
    conn.execute(
        "UPDATE polling_units SET registered_count = registered_count + ? WHERE id = ?",
        (delta, unit_id),
    )?;
    Ok(())
}

pub fn sync_registered_count(conn: &Connection, unit_id: &str) -> RosterResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM voters WHERE polling_unit_id = ?",
        [unit_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "UPDATE polling_units SET registered_count = ? WHERE id = ?",
        (count, unit_id),
    )?;
    Ok(count)
}

pub fn count_by_units(conn: &Connection, unit_ids: &[String]) -> RosterResult<HashMap<String, i64>> {
    let mut out: HashMap<String, i64> = unit_ids.iter().map(|id| (id.clone(), 0)).collect();
    if unit_ids.is_empty() {
        return Ok(out);
    }
    let placeholders = vec!["?"; unit_ids.len()].join(", ");
    let sql = format!(
        "SELECT polling_unit_id, COUNT(*) FROM voters
         WHERE polling_unit_id IN ({placeholders})
         GROUP BY polling_unit_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(unit_ids.iter()), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, count) in rows {
        out.insert(id, count);
    }
    Ok(out)
}

pub fn count_by_unit(conn: &Connection, unit_id: &str) -> RosterResult<i64> {
    let counts = count_by_units(conn, &[unit_id.to_string()])?;
    Ok(counts.get(unit_id).copied().unwrap_or(0))
}

#[cfg(test)]
pub(crate) fn seed_unit(conn: &Connection, ward_id: &str, code: &str) -> PollingUnit {
    create(
        conn,
        &NewPollingUnit {
            ward_id: ward_id.to_string(),
            code: code.to_string(),
            name: format!("UNIT {code}"),
            registered_count: 0,
            accredited_count: 0,
        },
    )
    .expect("seed unit")
}
