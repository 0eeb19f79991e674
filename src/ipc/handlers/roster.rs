use crate::ingest;
use crate::ipc::error::ok;
use crate::ipc::params::{
    get_file_source, get_flag, get_optional_i64, get_required_str, get_string_list, load_files,
    require_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::reallocate::{self, MoveRequest};
use crate::roster;
use crate::sources;
use crate::units;
use serde_json::json;
use std::path::PathBuf;

fn handle_roster_upload(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let unit_id = get_required_str(&req.params, "unitId")?;
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    let file = sources::read_file(&path).map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })?;
    let summary = ingest::ingest_roster(conn, &unit_id, &file)?;
    Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
}

fn handle_roster_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let unit_id = get_required_str(&req.params, "unitId")?;
    units::require(conn, &unit_id)?;
    let voters = roster::list_by_unit(conn, &unit_id, get_flag(&req.params, "withoutImage"))?;
    Ok(json!({ "voters": voters }))
}

fn handle_roster_clear(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let unit_id = get_required_str(&req.params, "unitId")?;
    let deleted = roster::clear_roster(conn, &unit_id, get_flag(&req.params, "withoutImage"))?;
    Ok(json!({ "deleted": deleted }))
}

fn handle_roster_move(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let from_unit_id = get_required_str(&req.params, "fromUnitId")?;
    let to_unit_id = get_required_str(&req.params, "toUnitId")?;
    let count = get_optional_i64(&req.params, "count", 1)?.map(|n| n as usize);
    let starting_ref_index = get_optional_i64(&req.params, "refIndex", 0)?.unwrap_or(0);

    let moved = reallocate::move_voters(
        conn,
        &MoveRequest {
            from_unit_id,
            to_unit_id,
            count,
            starting_ref_index,
        },
        &mut rand::thread_rng(),
    )?;
    Ok(json!({ "moved": moved }))
}

fn handle_roster_count(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    if req.params.get("unitId").is_some() {
        let unit_id = get_required_str(&req.params, "unitId")?;
        let count = units::count_by_unit(conn, &unit_id)?;
        return Ok(json!({ "count": count }));
    }
    let unit_ids = get_string_list(&req.params, "unitIds")?;
    let counts = units::count_by_units(conn, &unit_ids)?;
    Ok(json!({ "counts": counts }))
}

fn handle_roster_repair(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let unit_id = get_required_str(&req.params, "unitId")?;
    let summary = roster::repair_unit(conn, &unit_id)?;
    Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
}

fn handle_roster_ingest_folder(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let ward_id = get_required_str(&req.params, "wardId")?;
    let files = load_files(&get_file_source(&req.params)?)?;
    let report = ingest::ingest_folder(conn, &ward_id, &files)?;
    Ok(serde_json::to_value(report).unwrap_or_else(|_| json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.upload" => handle_roster_upload(state, req),
        "roster.list" => handle_roster_list(state, req),
        "roster.clear" => handle_roster_clear(state, req),
        "roster.move" => handle_roster_move(state, req),
        "roster.count" => handle_roster_count(state, req),
        "roster.repair" => handle_roster_repair(state, req),
        "roster.ingestFolder" => handle_roster_ingest_folder(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
