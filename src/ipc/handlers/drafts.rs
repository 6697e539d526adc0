use crate::db::{self, DraftRow};
use crate::draft::{self, OnboardingDraft, Section};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup::draft_defaults;
use crate::ipc::helpers::{get_str, load_draft, require_conn, save_draft};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

/// Shape every draft-returning method answers with.
pub fn draft_json(row: &DraftRow) -> Value {
    json!({
        "meta": row.meta,
        "draft": row.draft,
    })
}

fn drafts_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let label = req
        .params
        .get("label")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled school");
    let defaults = draft_defaults(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let draft = OnboardingDraft::seeded(&defaults);
    let id = db::draft_insert(conn, label, &draft).map_err(|e| HandlerErr::db("db_insert_failed", e))?;
    tracing::debug!(draft_id = %id, "draft created");
    let row = db::draft_load(conn, &id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::new("not_found", "draft vanished after insert"))?;
    Ok(draft_json(&row))
}

fn drafts_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let drafts = db::draft_list(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "drafts": drafts }))
}

fn drafts_open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    Ok(draft_json(&row))
}

fn drafts_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let id = get_str(&req.params, "draftId")?;
    let deleted = db::draft_delete(conn, id).map_err(|e| HandlerErr::db("db_update_failed", e))?;
    if !deleted {
        return Err(HandlerErr::new("not_found", "draft not found"));
    }
    Ok(json!({ "ok": true }))
}

fn drafts_update_section(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let raw = get_str(&req.params, "section")?;
    let section = Section::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown section: {}", raw)))?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let next = draft::update_section(&row.draft, section, patch, &state.systems)?;
    save_draft(conn, &row.meta.id, &next)?;
    Ok(json!({ "draft": next }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "drafts.create" => drafts_create(state, req),
        "drafts.list" => drafts_list(state, req),
        "drafts.open" => drafts_open(state, req),
        "drafts.delete" => drafts_delete(state, req),
        "drafts.updateSection" => drafts_update_section(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
