use crate::ipc::error::ok;
use crate::ipc::params::{get_optional_i64, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::units::{self, NewPollingUnit};
use serde_json::json;

fn handle_units_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let ward_id = get_required_str(&req.params, "wardId")?;
    let code = get_required_str(&req.params, "code")?;
    let name = get_required_str(&req.params, "name")?;
    let registered_count = get_optional_i64(&req.params, "registeredCount", 0)?.unwrap_or(0);
    let accredited_count = get_optional_i64(&req.params, "accreditedCount", 0)?.unwrap_or(0);

    let unit = units::create(
        conn,
        &NewPollingUnit {
            ward_id,
            code,
            name,
            registered_count,
            accredited_count,
        },
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "polling_units" })),
    })?;
    Ok(json!({ "unit": unit }))
}

fn handle_units_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let unit_id = get_required_str(&req.params, "unitId")?;
    let unit = units::require(conn, &unit_id)?;
    Ok(json!({ "unit": unit }))
}

fn handle_units_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let ward_id = get_required_str(&req.params, "wardId")?;
    let units = units::list_by_ward(conn, &ward_id)?;
    Ok(json!({ "units": units }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "units.create" => handle_units_create(state, req),
        "units.get" => handle_units_get(state, req),
        "units.list" => handle_units_list(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
