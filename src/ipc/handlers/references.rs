use crate::draft::Facility;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_str, opt_str};
use crate::ipc::types::{AppState, Request};
use crate::structure::EducationSystem;
use serde_json::{json, Value};

fn system_summary(s: &EducationSystem) -> Value {
    json!({
        "id": s.id,
        "name": s.name,
        "type": s.school_type,
        "tracks": s.tracks,
        "stageCount": s.stages.len(),
    })
}

fn systems_register(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw = req
        .params
        .get("system")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing system"))?;
    let system: EducationSystem = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid system: {}", e)))?;
    if system.id.trim().is_empty() {
        return Err(HandlerErr::bad_params("system.id must not be empty"));
    }
    let summary = system_summary(&system);
    let replaced = state.systems.insert(system.id.clone(), system).is_some();
    Ok(json!({ "system": summary, "replaced": replaced }))
}

fn systems_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let school_type = opt_str(&req.params, "schoolType").filter(|s| !s.trim().is_empty());
    let mut systems: Vec<&EducationSystem> = state
        .systems
        .values()
        .filter(|s| match (school_type, s.school_type.as_deref()) {
            (Some(want), Some(own)) => own == want,
            _ => true,
        })
        .collect();
    systems.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    let list: Vec<Value> = systems.into_iter().map(system_summary).collect();
    Ok(json!({ "systems": list }))
}

fn systems_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = get_str(&req.params, "systemId")?;
    let system = state
        .systems
        .get(id)
        .ok_or_else(|| HandlerErr::new("not_found", "education system not registered"))?;
    Ok(json!({ "system": system }))
}

fn facilities_register(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw = req
        .params
        .get("facilities")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing facilities"))?;
    let catalog: Vec<Facility> = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid facilities: {}", e)))?;
    if catalog.iter().any(|f| f.id.trim().is_empty()) {
        return Err(HandlerErr::bad_params("facility id must not be empty"));
    }
    state.facilities = catalog;
    Ok(json!({ "count": state.facilities.len() }))
}

fn facilities_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    if state.facilities.is_empty() {
        return Err(HandlerErr::new("not_found", "facility catalog not registered"));
    }
    Ok(json!({ "facilities": state.facilities }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "systems.register" => systems_register(state, req),
        "systems.list" => systems_list(state, req),
        "systems.get" => systems_get(state, req),
        "facilities.register" => facilities_register(state, req),
        "facilities.list" => facilities_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
