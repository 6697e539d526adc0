mod test_support;

use serde_json::json;
use test_support::{draft_with_system, error_code, request, request_ok, spawn_sidecar};

#[test]
fn stage_off_cascades_and_stage_on_does_not() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-stage-cascade");

    let on = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "structure.toggleStage",
        json!({ "draftId": draft_id, "stageId": "primary" }),
    );
    assert_eq!(on["selectedStructure"]["stages"]["primary"]["active"], true);
    assert!(on["selectedStructure"]["classes"].as_object().map_or(true, |m| m.is_empty()));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "structure.toggleGrade",
        json!({ "draftId": draft_id, "gradeId": "g1" }),
    );
    let off = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.toggleStage",
        json!({ "draftId": draft_id, "stageId": "primary" }),
    );
    let s = &off["selectedStructure"];
    assert_eq!(s["stages"]["primary"]["active"], false);
    for class_id in ["g1-a", "g1-b", "g2-a"] {
        assert_eq!(s["classes"][class_id]["active"], false, "class {}", class_id);
    }
    for subject_id in ["math-1", "sci-1", "phy-2"] {
        assert_eq!(s["subjects"][subject_id]["active"], false, "subject {}", subject_id);
    }

    // Turning it back on leaves the children switched off.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "structure.toggleStage",
        json!({ "draftId": draft_id, "stageId": "primary" }),
    );
    assert_eq!(again["selectedStructure"]["stages"]["primary"]["active"], true);
    assert_eq!(again["selectedStructure"]["classes"]["g1-a"]["active"], false);

    let missing = request(
        &mut stdin,
        &mut reader,
        "5",
        "structure.toggleStage",
        json!({ "draftId": draft_id, "stageId": "nope" }),
    );
    assert_eq!(error_code(&missing), "not_found");
}

#[test]
fn grade_toggle_reaches_every_class_and_subject() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-grade-cascade");

    let on = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "structure.toggleGrade",
        json!({ "draftId": draft_id, "gradeId": "g1" }),
    );
    assert_eq!(on["active"], true);
    let s = &on["selectedStructure"];
    assert_eq!(s["classes"]["g1-a"]["active"], true);
    assert_eq!(s["classes"]["g1-b"]["active"], true);
    assert_eq!(s["subjects"]["math-1"]["active"], true);
    assert_eq!(s["subjects"]["sci-1"]["active"], true);

    let off = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "structure.toggleGrade",
        json!({ "draftId": draft_id, "gradeId": "g1", "active": false }),
    );
    assert_eq!(off["selectedStructure"]["classes"]["g1-b"]["active"], false);
    assert_eq!(off["selectedStructure"]["subjects"]["sci-1"]["active"], false);

    let stages = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.visibleStages",
        json!({ "draftId": draft_id }),
    );
    let ids: Vec<&str> = stages["stages"]
        .as_array()
        .expect("stages")
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["kg", "primary"]);
    assert_eq!(stages["hasTracks"], true);
}

#[test]
fn custom_names_and_subjects_round_trip_through_the_draft() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-custom-names");

    let named = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "structure.setCustomName",
        json!({ "draftId": draft_id, "kind": "subject", "id": "math-1", "name": "Mathematics" }),
    );
    assert_eq!(
        named["selectedStructure"]["subjects"]["math-1"],
        json!({ "active": false, "customName": "Mathematics" })
    );

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "structure.renameGrade",
        json!({ "draftId": draft_id, "gradeId": "g1", "name": "First" }),
    );
    assert_eq!(renamed["selectedStructure"]["classes"]["g1-a"]["customName"], "First");
    assert_eq!(renamed["selectedStructure"]["classes"]["g1-a"]["active"], true);

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.addCustomSubject",
        json!({ "draftId": draft_id, "gradeId": "g1", "name": "Robotics" }),
    );
    let subject_id = added["subject"]["id"].as_str().expect("subject id").to_string();
    assert!(subject_id.starts_with("custom_"));
    assert_eq!(added["subject"]["custom"], true);

    let dup = request(
        &mut stdin,
        &mut reader,
        "4",
        "structure.addCustomSubject",
        json!({ "draftId": draft_id, "gradeId": "g1", "name": "Math" }),
    );
    assert_eq!(error_code(&dup), "duplicate_name");

    let empty = request(
        &mut stdin,
        &mut reader,
        "5",
        "structure.addCustomSubject",
        json!({ "draftId": draft_id, "gradeId": "g1", "name": "   " }),
    );
    assert_eq!(error_code(&empty), "empty_name");

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "structure.removeCustomSubject",
        json!({ "draftId": draft_id, "gradeId": "g1", "subjectId": subject_id }),
    );
    let left = removed["selectedStructure"]["customSubjects"]["g1"]
        .as_array()
        .map_or(0, |a| a.len());
    assert_eq!(left, 0);
}

#[test]
fn select_all_preserves_names_and_fees() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-select-all");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "structure.bulkUpdate",
        json!({
            "draftId": draft_id,
            "changes": [
                { "type": "class", "id": "g1-a", "changes": { "active": true, "fees": "15000", "customName": "Blue" } },
                { "kind": "class", "id": "ghost", "changes": { "active": true } }
            ]
        }),
    );

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "structure.selectAll",
        json!({ "draftId": draft_id, "active": true }),
    );
    let s = &all["selectedStructure"];
    assert_eq!(s["classes"]["g1-a"]["fees"], 15000.0);
    assert_eq!(s["classes"]["g1-a"]["customName"], "Blue");
    assert_eq!(s["classes"]["g1-b"]["fees"], 0.0);
    assert_eq!(s["stages"]["lang-primary"]["active"], true);
    assert!(s["classes"].get("ghost").is_none());

    let none = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.selectAll",
        json!({ "draftId": draft_id, "active": false }),
    );
    assert_eq!(none["selectedStructure"]["classes"]["g1-a"]["active"], false);
    assert_eq!(none["selectedStructure"]["classes"]["g1-a"]["fees"], 15000.0);
}
