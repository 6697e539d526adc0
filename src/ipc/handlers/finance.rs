use crate::installments::{
    self, is_valid, recompute, total_percentage, InstallmentPlan, MonthSlot, PlanChange,
    DOWN_PAYMENT_SLOT, EDITABLE_ROWS,
};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_bool, get_f64, get_index, get_str, load_draft, opt_f64, require_conn, save_draft,
};
use crate::ipc::types::{AppState, Request};
use crate::review;
use crate::structure::{self, ClassId};
use serde_json::{json, Value};

fn plan_json(plan: &InstallmentPlan) -> Value {
    json!({
        "installments": plan,
        "rates": plan.rates(),
        "totalPercentage": total_percentage(plan),
        "valid": is_valid(plan),
    })
}

fn mutate_plan<F>(state: &AppState, req: &Request, f: F) -> Result<Value, HandlerErr>
where
    F: FnOnce(&InstallmentPlan) -> Result<InstallmentPlan, HandlerErr>,
{
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let plan = f(&row.draft.school_data.installments)?;
    let mut next = row.draft;
    next.school_data.installments = plan;
    save_draft(conn, &row.meta.id, &next)?;
    Ok(plan_json(&next.school_data.installments))
}

fn installments_set_allowed(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let allowed = get_bool(&req.params, "allowed")?;
    mutate_plan(state, req, |plan| {
        let mut next = plan.clone();
        next.allowed = allowed;
        Ok(next)
    })
}

fn installments_set_down_payment(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    // Blank input counts as zero, like the form field.
    let dp = opt_f64(&req.params, "downPayment")?.unwrap_or(0.0);
    mutate_plan(state, req, |plan| Ok(recompute(plan, PlanChange::DownPayment(dp))))
}

fn installments_set_count(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let count = opt_f64(&req.params, "count")?.unwrap_or(0.0).trunc() as i64;
    mutate_plan(state, req, |plan| Ok(recompute(plan, PlanChange::Count(count))))
}

fn installments_set_rate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let index = get_index(&req.params, "index")?;
    let value = get_f64(&req.params, "value")?;
    mutate_plan(state, req, |plan| {
        let editable = plan.count().min(EDITABLE_ROWS as usize);
        if index >= editable {
            return Err(HandlerErr::bad_params(format!(
                "index must be < {}",
                editable
            ))
            .with_details(json!({ "index": index, "editable": editable })));
        }
        Ok(recompute(plan, PlanChange::Rate { index, value }))
    })
}

fn parse_slot(v: Option<&Value>) -> Result<MonthSlot, HandlerErr> {
    match v {
        Some(Value::String(s)) if s == DOWN_PAYMENT_SLOT => Ok(MonthSlot::DownPayment),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|i| MonthSlot::Installment(i as usize))
            .ok_or_else(|| HandlerErr::bad_params("slot must be a non-negative index")),
        _ => Err(HandlerErr::bad_params(format!(
            "slot must be \"{}\" or an installment index",
            DOWN_PAYMENT_SLOT
        ))),
    }
}

fn installments_set_month(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let slot = parse_slot(req.params.get("slot"))?;
    let month = match opt_f64(&req.params, "month")? {
        None => None,
        Some(m) if m.fract() == 0.0 && (1.0..=12.0).contains(&m) => Some(m as u32),
        Some(_) => return Err(HandlerErr::bad_params("month must be 1..=12")),
    };
    mutate_plan(state, req, |plan| {
        if let MonthSlot::Installment(i) = slot {
            if i >= plan.count() {
                return Err(HandlerErr::bad_params("slot is beyond the installment count"));
            }
        }
        Ok(installments::set_month(plan, slot, month))
    })
}

fn installments_preview(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let class_id = ClassId::from(get_str(&req.params, "classId")?);
    let preview = review::class_installment_preview(&row.draft, &class_id)?;
    Ok(json!({ "preview": preview }))
}

fn finance_set_class_money(
    state: &mut AppState,
    req: &Request,
    field: &str,
) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let row = load_draft(conn, &req.params)?;
    let class_id = ClassId::from(get_str(&req.params, "classId")?);
    let amount = opt_f64(&req.params, field)?.unwrap_or(0.0);
    if amount < 0.0 {
        return Err(HandlerErr::bad_params(format!("{} must not be negative", field)));
    }
    if field == "discount" && amount > 100.0 {
        return Err(HandlerErr::bad_params("discount is a percentage and must be <= 100"));
    }
    let (fees, discount) = match field {
        "fees" => (Some(amount), None),
        _ => (None, Some(amount)),
    };
    let mut next = row.draft.clone();
    next.school_data.selected_structure =
        structure::set_class_money(&row.draft.school_data.selected_structure, &class_id, fees, discount);
    let updated = row.draft.school_data.selected_structure != next.school_data.selected_structure;
    save_draft(conn, &row.meta.id, &next)?;
    Ok(json!({
        "updated": updated,
        "class": next.school_data.selected_structure.classes.get(&class_id),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "installments.setAllowed" => installments_set_allowed(state, req),
        "installments.setDownPayment" => installments_set_down_payment(state, req),
        "installments.setCount" => installments_set_count(state, req),
        "installments.setRate" => installments_set_rate(state, req),
        "installments.setMonth" => installments_set_month(state, req),
        "installments.preview" => installments_preview(state, req),
        "finance.setClassFees" => finance_set_class_money(state, req, "fees"),
        "finance.setClassDiscount" => finance_set_class_money(state, req, "discount"),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
