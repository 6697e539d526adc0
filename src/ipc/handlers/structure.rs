use crate::draft;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    draft_system, find_grade, get_bool, get_str, load_draft, opt_bool, opt_f64, require_conn,
    save_draft,
};
use crate::ipc::types::{AppState, Request};
use crate::structure::{
    self, is_grade_active, Change, ClassId, EducationSystem, GradeId,
    NodeKind, StageId, StructureOverrides, SubjectId,
};
use serde_json::{json, Value};

/// Loads the draft and its system tree, applies `f` to the selected structure
/// and persists the result.
fn mutate<F>(state: &AppState, req: &Request, f: F) -> Result<Value, HandlerErr>
where
    F: FnOnce(&EducationSystem, &StructureOverrides) -> Result<(StructureOverrides, Value), HandlerErr>,
{
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let system = draft_system(state, &row.draft)?;
    let (overrides, mut extra) = f(system, &row.draft.school_data.selected_structure)?;

    let mut next = row.draft.clone();
    next.school_data.selected_structure = overrides;
    save_draft(conn, &row.meta.id, &next)?;

    if let Value::Object(map) = &mut extra {
        map.insert(
            "selectedStructure".into(),
            json!(next.school_data.selected_structure),
        );
        Ok(extra)
    } else {
        Ok(json!({ "selectedStructure": next.school_data.selected_structure }))
    }
}

fn structure_visible_stages(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let system = draft_system(state, &row.draft)?;
    let track = row.draft.school_data.education_track_id.as_str();
    let overrides = &row.draft.school_data.selected_structure;

    let stages: Vec<Value> = structure::visible_stages(system, Some(track))
        .into_iter()
        .map(|s| {
            let grades: Vec<Value> = s
                .all_grades()
                .map(|g| {
                    json!({
                        "id": g.id,
                        "name": g.name,
                        "active": is_grade_active(g, overrides),
                        "classCount": g.classes.len(),
                    })
                })
                .collect();
            json!({
                "id": s.id,
                "name": s.name,
                "trackId": s.track_id,
                "active": overrides.stage(&s.id).active,
                "grades": grades,
            })
        })
        .collect();
    Ok(json!({ "hasTracks": system.has_tracks(), "stages": stages }))
}

fn structure_toggle_stage(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let stage_id = StageId::from(get_str(&req.params, "stageId")?);
    mutate(state, req, |system, overrides| {
        if system.stage(&stage_id).is_none() {
            return Err(HandlerErr::new("not_found", "stage not found"));
        }
        Ok((structure::toggle_stage(overrides, system, &stage_id), json!({})))
    })
}

fn structure_toggle_grade(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let grade_id = get_str(&req.params, "gradeId")?.to_string();
    let requested = opt_bool(&req.params, "active")?;
    mutate(state, req, |system, overrides| {
        let grade = find_grade(system, &grade_id)?;
        let new_active = requested.unwrap_or_else(|| !is_grade_active(grade, overrides));
        Ok((
            structure::toggle_grade_and_descendants(overrides, grade, new_active),
            json!({ "active": new_active }),
        ))
    })
}

fn structure_toggle_class(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let class_id = ClassId::from(get_str(&req.params, "classId")?);
    mutate(state, req, |_system, overrides| {
        Ok((structure::toggle_class(overrides, &class_id), json!({})))
    })
}

fn structure_set_custom_name(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw_kind = get_str(&req.params, "kind")?;
    let kind = NodeKind::parse(raw_kind)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown kind: {}", raw_kind)))?;
    let id = get_str(&req.params, "id")?.to_string();
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("name must be string"))?
        .to_string();
    mutate(state, req, |_system, overrides| {
        Ok((structure::update_custom_name(overrides, kind, &id, &name), json!({})))
    })
}

fn structure_rename_grade(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let grade_id = get_str(&req.params, "gradeId")?.to_string();
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("name must be string"))?
        .to_string();
    mutate(state, req, |system, overrides| {
        let grade = find_grade(system, &grade_id)?;
        Ok((structure::rename_grade(overrides, grade, &name), json!({})))
    })
}

fn structure_bulk_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw = req
        .params
        .get("changes")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing changes"))?;
    let changes: Vec<Change> = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid changes: {}", e)))?;
    mutate(state, req, |_system, overrides| {
        Ok((
            structure::bulk_update(overrides, &changes),
            json!({ "applied": changes.len() }),
        ))
    })
}

fn structure_select_all(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let active = get_bool(&req.params, "active")?;
    mutate(state, req, |system, overrides| {
        Ok((structure::select_all(system, overrides, active), json!({})))
    })
}

fn structure_add_custom_subject(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let grade_id = get_str(&req.params, "gradeId")?.to_string();
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    mutate(state, req, |system, overrides| {
        let grade = find_grade(system, &grade_id)?;
        let (next, subject) = structure::add_custom_subject(overrides, grade, &name)?;
        Ok((next, json!({ "subject": subject })))
    })
}

fn structure_remove_custom_subject(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let grade_id = GradeId::from(get_str(&req.params, "gradeId")?);
    let subject_id = SubjectId::from(get_str(&req.params, "subjectId")?);
    mutate(state, req, |_system, overrides| {
        Ok((
            structure::remove_custom_subject(overrides, &grade_id, &subject_id),
            json!({}),
        ))
    })
}

fn structure_set_age_requirement(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let grade_id = GradeId::from(get_str(&req.params, "gradeId")?);
    let age = opt_f64(&req.params, "age")?;
    if age.is_some_and(|a| a < 0.0) {
        return Err(HandlerErr::bad_params("age must not be negative"));
    }
    let next = draft::set_age_requirement(&row.draft, &grade_id, age);
    save_draft(conn, &row.meta.id, &next)?;
    Ok(json!({ "ageRequirement": next.school_data.age_requirement }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "structure.visibleStages" => structure_visible_stages(state, req),
        "structure.toggleStage" => structure_toggle_stage(state, req),
        "structure.toggleGrade" => structure_toggle_grade(state, req),
        "structure.toggleClass" => structure_toggle_class(state, req),
        "structure.setCustomName" => structure_set_custom_name(state, req),
        "structure.renameGrade" => structure_rename_grade(state, req),
        "structure.bulkUpdate" => structure_bulk_update(state, req),
        "structure.selectAll" => structure_select_all(state, req),
        "structure.addCustomSubject" => structure_add_custom_subject(state, req),
        "structure.removeCustomSubject" => structure_remove_custom_subject(state, req),
        "structure.setAgeRequirement" => structure_set_age_requirement(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
