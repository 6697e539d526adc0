use crate::draft::{self, NewUser, OnboardingDraft, UploadedImage};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_index, get_str, load_draft, opt_str, require_conn, save_draft};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn mutate<F>(state: &AppState, req: &Request, f: F) -> Result<OnboardingDraft, HandlerErr>
where
    F: FnOnce(&AppState, &OnboardingDraft) -> Result<OnboardingDraft, HandlerErr>,
{
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let next = f(state, &row.draft)?;
    save_draft(conn, &row.meta.id, &next)?;
    Ok(next)
}

fn schedule_toggle_work_day(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let day = get_str(&req.params, "day")?.to_string();
    let next = mutate(state, req, |_, d| Ok(draft::toggle_work_day(d, &day)))?;
    Ok(json!({ "workDays": next.school_data.work_days }))
}

fn schedule_set_hours(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let start = opt_str(&req.params, "start").map(str::to_string);
    let end = opt_str(&req.params, "end").map(str::to_string);
    if start.is_none() && end.is_none() {
        return Err(HandlerErr::bad_params("start or end is required"));
    }
    let next = mutate(state, req, |_, d| {
        Ok(draft::set_work_hours(d, start.as_deref(), end.as_deref()))
    })?;
    Ok(json!({ "workHours": next.school_data.work_hours }))
}

fn facilities_toggle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let facility_id = get_str(&req.params, "facilityId")?.to_string();
    let next = mutate(state, req, |st, d| {
        Ok(draft::toggle_facility(d, &facility_id, &st.facilities))
    })?;
    let selected = next
        .school_data
        .facilities
        .iter()
        .any(|f| f.facility_id == facility_id);
    Ok(json!({ "selected": selected, "facilities": next.school_data.facilities }))
}

fn facilities_add_images(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let facility_id = get_str(&req.params, "facilityId")?.to_string();
    let raw = req
        .params
        .get("images")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing images"))?;
    let images: Vec<UploadedImage> = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid images: {}", e)))?;
    let next = mutate(state, req, |_, d| {
        Ok(draft::add_facility_images(d, &facility_id, images)?)
    })?;
    Ok(json!({ "facilities": next.school_data.facilities }))
}

fn facilities_remove_image(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let facility_id = get_str(&req.params, "facilityId")?.to_string();
    let index = get_index(&req.params, "index")?;
    let next = mutate(state, req, |_, d| {
        Ok(draft::remove_facility_image(d, &facility_id, index))
    })?;
    Ok(json!({ "facilities": next.school_data.facilities }))
}

fn accounts_add_user(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw = req
        .params
        .get("user")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing user"))?;
    let user: NewUser = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid user: {}", e)))?;
    let mut new_id = String::new();
    let next = mutate(state, req, |_, d| {
        let (next, id) = draft::add_custom_user(d, user)?;
        new_id = id;
        Ok(next)
    })?;
    Ok(json!({ "userId": new_id, "customUsers": next.custom_users }))
}

fn accounts_remove_user(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let index = get_index(&req.params, "index")?;
    let next = mutate(state, req, |_, d| Ok(draft::remove_custom_user(d, index)))?;
    Ok(json!({ "customUsers": next.custom_users }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schedule.toggleWorkDay" => schedule_toggle_work_day(state, req),
        "schedule.setHours" => schedule_set_hours(state, req),
        "facilities.toggle" => facilities_toggle(state, req),
        "facilities.addImages" => facilities_add_images(state, req),
        "facilities.removeImage" => facilities_remove_image(state, req),
        "accounts.addUser" => accounts_add_user(state, req),
        "accounts.removeUser" => accounts_remove_user(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
