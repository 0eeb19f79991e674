use crate::error::RosterError;
use crate::ipc::error::err;
use crate::sources::FileSource;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RosterError> for HandlerErr {
    fn from(e: RosterError) -> Self {
        let details = match &e {
            RosterError::SchemaViolation { column } => Some(json!({ "column": column })),
            RosterError::PollingUnitNotFound { unit_id } => Some(json!({ "unitId": unit_id })),
            RosterError::InsufficientRecords {
                requested,
                available,
            } => Some(json!({ "requested": requested, "available": available })),
            RosterError::UnsupportedFormat { file_name } => Some(json!({ "fileName": file_name })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

pub fn require_db(db: Option<&Connection>) -> Result<&Connection, HandlerErr> {
    db.ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".into(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

/// Query-string style flag: `true`, `"true"`, `"1"`, `"yes"`. Absent is false.
pub fn get_flag(params: &serde_json::Value, key: &str) -> bool {
    match params.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

pub fn get_optional_i64(
    params: &serde_json::Value,
    key: &str,
    min: i64,
) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n >= min => Ok(Some(n)),
            _ => Err(HandlerErr::bad_params(format!(
                "{} must be an integer >= {}",
                key, min
            ))),
        },
    }
}

fn string_list(params: &serde_json::Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    let Some(arr) = v.as_array() else {
        return Err(HandlerErr::bad_params(format!("{} must be an array", key)));
    };
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let Some(s) = item.as_str() else {
            return Err(HandlerErr::bad_params(format!("{} must be strings", key)));
        };
        out.push(s.to_string());
    }
    Ok(Some(out))
}

pub fn get_string_list(params: &serde_json::Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    string_list(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_file_source(params: &serde_json::Value) -> Result<FileSource, HandlerErr> {
    let paths = string_list(params, "paths")?;
    let folder = params.get("folderPath").and_then(|v| v.as_str());
    let archive = params.get("archivePath").and_then(|v| v.as_str());
    match (paths, folder, archive) {
        (Some(paths), None, None) => Ok(FileSource::Paths(
            paths.into_iter().map(PathBuf::from).collect(),
        )),
        (None, Some(folder), None) => Ok(FileSource::Folder(PathBuf::from(folder))),
        (None, None, Some(archive)) => Ok(FileSource::Archive(PathBuf::from(archive))),
        _ => Err(HandlerErr::bad_params(
            "provide exactly one of paths, folderPath, archivePath",
        )),
    }
}

pub fn load_files(source: &FileSource) -> Result<Vec<crate::sources::UploadedFile>, HandlerErr> {
    source.load().map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: None,
    })
}
