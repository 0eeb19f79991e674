#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(
    vars: &[(&str, &str)],
) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("ROSTERD_WORKSPACE")
        .env_remove("ROSTERD_BLOB_DIR")
        .env_remove("ROSTERD_BLOB_BASE_URL");
    for (k, v) in vars {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected error: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

pub fn create_unit(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    ward_id: &str,
    code: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        &format!("create-{}", code),
        "units.create",
        json!({ "wardId": ward_id, "code": code, "name": format!("Unit {}", code) }),
    );
    created
        .get("unit")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("unit.id")
        .to_string()
}

/// A `NAME,ID,GENDER,DOB` roster with `n` fully populated rows.
pub fn roster_csv(n: usize) -> String {
    let mut out = String::from("NAME,ID,GENDER,DOB\n");
    for i in 1..=n {
        out.push_str(&format!("Voter {i},{:011},F,1990\n", i));
    }
    out
}

pub fn upload_roster(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    dir: &Path,
    unit_id: &str,
    n: usize,
) {
    let path = dir.join(format!("roster-{}.csv", unit_id));
    std::fs::write(&path, roster_csv(n)).expect("write roster csv");
    let res = request_ok(
        stdin,
        reader,
        "upload",
        "roster.upload",
        json!({ "unitId": unit_id, "path": path.to_string_lossy() }),
    );
    assert_eq!(res.get("rowCount").and_then(|v| v.as_u64()), Some(n as u64));
}

pub fn list_voters(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    unit_id: &str,
) -> Vec<serde_json::Value> {
    let res = request_ok(
        stdin,
        reader,
        "list",
        "roster.list",
        json!({ "unitId": unit_id }),
    );
    res.get("voters")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("voters")
}

pub fn ref_indexes(voters: &[serde_json::Value]) -> Vec<i64> {
    voters
        .iter()
        .map(|v| v.get("refIndex").and_then(|r| r.as_i64()).expect("refIndex"))
        .collect()
}

pub fn registered_count(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    unit_id: &str,
) -> i64 {
    let res = request_ok(stdin, reader, "get", "units.get", json!({ "unitId": unit_id }));
    res.get("unit")
        .and_then(|u| u.get("registeredCount"))
        .and_then(|v| v.as_i64())
        .expect("registeredCount")
}
