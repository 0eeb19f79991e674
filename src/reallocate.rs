use crate::error::{RosterError, RosterResult};
use crate::{roster, units};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub from_unit_id: String,
    pub to_unit_id: String,
    pub count: Option<usize>,
    pub starting_ref_index: i64,
}

/// Source ends renumbered `1..M`; moved rows append to the destination in their
/// original order. Precondition failures leave both rosters untouched.
pub fn move_voters<R: Rng>(conn: &Connection, req: &MoveRequest, rng: &mut R) -> RosterResult<usize> {
    if req.from_unit_id == req.to_unit_id {
        return Err(RosterError::SameUnit);
    }
    units::require(conn, &req.from_unit_id)?;
    units::require(conn, &req.to_unit_id)?;

    let tx = conn.unchecked_transaction()?;

    let mut candidates = if req.starting_ref_index > 0 {
        roster::list_from_ref_index(&tx, &req.from_unit_id, req.starting_ref_index)?
    } else {
        roster::list_by_unit(&tx, &req.from_unit_id, false)?
    };

    if let Some(count) = req.count {
        if candidates.len() < count {
            return Err(RosterError::InsufficientRecords {
                requested: count,
                available: candidates.len(),
            });
        }
        candidates.shuffle(rng);
        candidates.truncate(count);
        // Keep the moved block in its original relative order.
        candidates.sort_by_key(|r| r.ref_index);
    }

    let moved = candidates.len();
    if moved == 0 {
        return Ok(0);
    }

    let dest_next = roster::max_ref_index(&tx, &req.to_unit_id)? + 1;
    let transfers: Vec<(String, i64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), dest_next + i as i64))
        .collect();
    roster::bulk_transfer(&tx, &req.to_unit_id, &transfers)?;

    let renumbered = roster::renumber_unit(&tx, &req.from_unit_id)?;

    units::adjust_registered_count(&tx, &req.from_unit_id, -(moved as i64))?;
    units::adjust_registered_count(&tx, &req.to_unit_id, moved as i64)?;

    tx.commit()?;

    info!(
        from = %req.from_unit_id,
        to = %req.to_unit_id,
        moved,
        renumbered,
        starting_ref_index = req.starting_ref_index,
        "moved registered voters"
    );
    Ok(moved)
}
