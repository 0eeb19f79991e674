use crate::ipc::error::ok;
use crate::ipc::params::{get_file_source, get_required_str, load_files, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::media;
use serde_json::json;

fn handle_media_reconcile(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let Some(blobs) = state.blobs.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".into(),
            details: None,
        });
    };
    let unit_id = get_required_str(&req.params, "unitId")?;
    let files = load_files(&get_file_source(&req.params)?)?;

    let summary = state.runtime.block_on(media::reconcile_images(
        conn,
        blobs,
        &unit_id,
        &files,
        state.config.upload_concurrency,
    ))?;
    Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "media.reconcile" => handle_media_reconcile(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
