use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_bool, load_draft, opt_str, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::review;
use crate::wizard::{self, Advance, Step};
use serde_json::{json, Value};

fn wizard_validate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let number = match req.params.get("step") {
        None | Some(Value::Null) => row.meta.current_step,
        Some(v) => v
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| HandlerErr::bad_params("step must be an integer"))?,
    };
    let step = Step::from_number(number)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown step {}", number)))?;

    let valid = wizard::validate_step(&row.draft, step);
    let conflict = if step == Step::Accounts && valid {
        wizard::check_identities(&row.draft).err()
    } else {
        None
    };
    Ok(json!({
        "step": step.number(),
        "name": step,
        "valid": valid && conflict.is_none(),
        "conflict": conflict,
    }))
}

fn wizard_next(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    match wizard::advance(&row.draft, row.meta.current_step)? {
        Advance::Moved(step) => {
            db::draft_set_step(conn, &row.meta.id, step)
                .map_err(|e| HandlerErr::db("db_update_failed", e))?;
            Ok(json!({ "currentStep": step, "readyToSubmit": false }))
        }
        Advance::ReadyToSubmit => Ok(json!({
            "currentStep": row.meta.current_step,
            "readyToSubmit": true
        })),
    }
}

fn wizard_back(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let step = wizard::back(row.meta.current_step);
    if step != row.meta.current_step {
        db::draft_set_step(conn, &row.meta.id, step)
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    }
    Ok(json!({ "currentStep": step }))
}

fn review_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let summary = review::review_summary(&row.draft);
    Ok(json!({ "summary": summary }))
}

fn submission_build(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let payload = review::build_payload(&row.draft)?;
    tracing::info!(
        draft_id = %row.meta.id,
        school = %row.draft.school_data.name,
        "submission payload built"
    );
    Ok(json!({ "payload": payload }))
}

fn submission_report(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let succeeded = get_bool(&req.params, "ok")?;
    let outcome = if succeeded {
        Ok(())
    } else {
        Err(opt_str(&req.params, "message").unwrap_or("submission failed"))
    };
    db::draft_record_submission(conn, &row.meta.id, outcome)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    if !succeeded {
        tracing::warn!(draft_id = %row.meta.id, "submission rejected by server");
    }
    let meta = db::draft_load(conn, &row.meta.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .map(|r| r.meta);
    Ok(json!({ "meta": meta }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "wizard.validate" => wizard_validate(state, req),
        "wizard.next" => wizard_next(state, req),
        "wizard.back" => wizard_back(state, req),
        "review.summary" => review_summary(state, req),
        "submission.build" => submission_build(state, req),
        "submission.report" => submission_report(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
