mod test_support;

use serde_json::json;
use test_support::{draft_with_system, error_code, request, request_ok, spawn_sidecar};

fn num(v: &serde_json::Value) -> f64 {
    v.as_f64().unwrap_or(f64::NAN)
}

fn assert_close(actual: &serde_json::Value, expected: f64) {
    let a = num(actual);
    assert!((a - expected).abs() < 1e-6, "expected {}, got {}", expected, actual);
}

fn rates(v: &serde_json::Value) -> Vec<f64> {
    v["rates"]
        .as_array()
        .expect("rates")
        .iter()
        .map(num)
        .collect()
}

#[test]
fn count_and_down_payment_reset_rates_and_edits_spread_the_tail() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-installments");

    let four = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "installments.setCount",
        json!({ "draftId": draft_id, "count": "4" }),
    );
    assert_eq!(rates(&four), vec![25.0, 25.0, 25.0, 25.0]);
    assert_eq!(four["valid"], true);

    let dp = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "installments.setDownPayment",
        json!({ "draftId": draft_id, "downPayment": 20 }),
    );
    assert_eq!(rates(&dp), vec![20.0, 20.0, 20.0, 20.0]);

    let edited = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "installments.setRate",
        json!({ "draftId": draft_id, "index": 0, "value": 35 }),
    );
    assert_eq!(rates(&edited), vec![35.0, 15.0, 15.0, 15.0]);
    assert_eq!(edited["installments"]["dates"]["rate_0"], 35.0);
    assert_close(&edited["totalPercentage"], 100.0);

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "4",
        "installments.setRate",
        json!({ "draftId": draft_id, "index": 4, "value": 10 }),
    );
    assert_eq!(error_code(&out_of_range), "bad_params");

    let big = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "installments.setCount",
        json!({ "draftId": draft_id, "count": 40 }),
    );
    assert_eq!(big["installments"]["installmentsCount"], 24);
    assert_eq!(rates(&big).len(), 24);
    assert_close(&big["rates"][0], 3.33);
}

#[test]
fn over_allocated_down_payment_goes_negative_without_clamping() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-installments-neg");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "installments.setCount",
        json!({ "draftId": draft_id, "count": 2 }),
    );
    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "installments.setDownPayment",
        json!({ "draftId": draft_id, "downPayment": 120 }),
    );
    assert_eq!(rates(&plan), vec![-10.0, -10.0]);
    assert_eq!(plan["valid"], true);

    let tail = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "installments.setRate",
        json!({ "draftId": draft_id, "index": 0, "value": 5 }),
    );
    // The tail share is floored at zero.
    assert_eq!(rates(&tail), vec![5.0, 0.0]);
    assert_eq!(tail["valid"], false);
}

#[test]
fn class_preview_applies_discount_and_months() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let draft_id = draft_with_system(&mut stdin, &mut reader, "onboard-installments-preview");

    let no_class = request(
        &mut stdin,
        &mut reader,
        "1",
        "installments.preview",
        json!({ "draftId": draft_id, "classId": "g1-a" }),
    );
    assert_eq!(error_code(&no_class), "not_found");

    let untouched = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "finance.setClassFees",
        json!({ "draftId": draft_id, "classId": "g1-a", "fees": 20000 }),
    );
    assert_eq!(untouched["updated"], false);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.toggleClass",
        json!({ "draftId": draft_id, "classId": "g1-a" }),
    );
    let fees = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "finance.setClassFees",
        json!({ "draftId": draft_id, "classId": "g1-a", "fees": "20000" }),
    );
    assert_eq!(fees["updated"], true);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "finance.setClassDiscount",
        json!({ "draftId": draft_id, "classId": "g1-a", "discount": 5 }),
    );
    let too_much = request(
        &mut stdin,
        &mut reader,
        "6",
        "finance.setClassDiscount",
        json!({ "draftId": draft_id, "classId": "g1-a", "discount": 150 }),
    );
    assert_eq!(error_code(&too_much), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "installments.setCount",
        json!({ "draftId": draft_id, "count": 2 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "installments.setDownPayment",
        json!({ "draftId": draft_id, "downPayment": 50 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "installments.setMonth",
        json!({ "draftId": draft_id, "slot": "downPayment", "month": 9 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "installments.setMonth",
        json!({ "draftId": draft_id, "slot": 1, "month": "2" }),
    );
    let bad_month = request(
        &mut stdin,
        &mut reader,
        "11",
        "installments.setMonth",
        json!({ "draftId": draft_id, "slot": 0, "month": 13 }),
    );
    assert_eq!(error_code(&bad_month), "bad_params");

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "installments.preview",
        json!({ "draftId": draft_id, "classId": "g1-a" }),
    );
    let p = &preview["preview"];
    assert_close(&p["net"], 19000.0);
    assert_close(&p["discountAmount"], 1000.0);
    assert_close(&p["downPayment"]["amount"], 9500.0);
    assert_eq!(p["downPayment"]["month"], 9);
    assert_close(&p["installments"][1]["amount"], 4750.0);
    assert_eq!(p["installments"][1]["month"], 2);
    assert!(p["installments"][0]["month"].is_null());
    assert_eq!(p["valid"], true);
}
