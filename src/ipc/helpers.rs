use crate::db::{self, DraftRow};
use crate::draft::OnboardingDraft;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::structure::{EducationSystem, Grade, GradeId};
use rusqlite::Connection;
use serde_json::Value;

pub fn require_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn opt_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn get_bool(params: &Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key)))
}

pub fn opt_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

/// Numbers arrive either as JSON numbers or as text from form inputs.
pub fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn get_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(number)
        .filter(|n| n.is_finite())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key)))
}

/// Absent, null and blank text all mean "no value".
pub fn opt_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => number(v)
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn get_index(params: &Value, key: &str) -> Result<usize, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key)))
}

pub fn load_draft(conn: &Connection, params: &Value) -> Result<DraftRow, HandlerErr> {
    let id = get_str(params, "draftId")?;
    db::draft_load(conn, id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::new("not_found", "draft not found"))
}

pub fn save_draft(conn: &Connection, id: &str, draft: &OnboardingDraft) -> Result<(), HandlerErr> {
    db::draft_save(conn, id, draft).map_err(|e| HandlerErr::db("db_update_failed", e))
}

/// The registered tree for the draft's chosen education system.
pub fn draft_system<'a>(
    state: &'a AppState,
    draft: &OnboardingDraft,
) -> Result<&'a EducationSystem, HandlerErr> {
    let id = draft.school_data.education_system_id.as_str();
    if id.is_empty() {
        return Err(HandlerErr::bad_params("draft has no education system selected"));
    }
    state
        .systems
        .get(id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("education system {} is not registered", id)))
}

pub fn find_grade<'a>(system: &'a EducationSystem, grade_id: &str) -> Result<&'a Grade, HandlerErr> {
    system
        .grade(&GradeId::from(grade_id))
        .ok_or_else(|| HandlerErr::new("not_found", "grade not found"))
}
