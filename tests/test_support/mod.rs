#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
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
    let exe = env!("CARGO_BIN_EXE_onboardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn onboardd");
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

pub fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
}

/// One national system with two tracks. Stage "kg" belongs to no track and is
/// visible under either selection.
pub fn national_system() -> serde_json::Value {
    json!({
        "id": "nat",
        "name": "National",
        "type": "Private",
        "tracks": [
            { "id": "ar", "name": "Arabic" },
            { "id": "lang", "name": "Languages" }
        ],
        "stages": [
            {
                "id": "kg",
                "name": "Kindergarten",
                "grades": [
                    {
                        "id": "kg1",
                        "name": "KG1",
                        "acceptedAge": "4",
                        "classes": [
                            { "id": "kg1-a", "name": "KG1 A", "subjects": [ { "id": "kg1-ar", "name": "Arabic" } ] }
                        ]
                    }
                ]
            },
            {
                "id": "primary",
                "name": "Primary",
                "trackId": { "_id": "ar" },
                "grades": [
                    {
                        "id": "g1",
                        "name": "Grade 1",
                        "classes": [
                            {
                                "id": "g1-a",
                                "name": "1A",
                                "subjects": [
                                    { "id": "math-1", "name": "Math" },
                                    { "id": "sci-1", "name": "Science" }
                                ]
                            },
                            { "id": "g1-b", "name": "1B", "subjects": [] }
                        ]
                    }
                ],
                "branches": [
                    {
                        "id": "sci-branch",
                        "name": "Science",
                        "grades": [
                            {
                                "id": "g2",
                                "name": "Grade 2",
                                "classes": [
                                    { "id": "g2-a", "name": "2A", "subjects": [ { "id": "phy-2", "name": "Physics" } ] }
                                ]
                            }
                        ]
                    }
                ]
            },
            {
                "id": "lang-primary",
                "name": "Languages Primary",
                "trackId": "lang",
                "grades": []
            }
        ]
    })
}

/// Selects a fresh workspace, registers the national system and opens a draft
/// pointed at it. Returns the draft id.
pub fn draft_with_system(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> String {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "sys",
        "systems.register",
        json!({ "system": national_system() }),
    );
    let created = request_ok(stdin, reader, "create", "drafts.create", json!({ "label": prefix }));
    let draft_id = created["meta"]["id"]
        .as_str()
        .expect("draft id")
        .to_string();
    let _ = request_ok(
        stdin,
        reader,
        "pick-system",
        "drafts.updateSection",
        json!({
            "draftId": draft_id,
            "section": "schoolData",
            "patch": { "educationSystemId": "nat", "educationTrackId": "ar" }
        }),
    );
    draft_id
}
