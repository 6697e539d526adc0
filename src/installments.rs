use crate::lenient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on the schedule length; larger requests are clamped.
pub const MAX_INSTALLMENTS: u32 = 24;
/// The schedule editor only exposes the first twelve rows.
pub const EDITABLE_ROWS: u32 = 12;

pub const DOWN_PAYMENT_SLOT: &str = "downPayment";

pub fn rate_key(index: usize) -> String {
    format!("rate_{}", index)
}

pub fn month_key(index: usize) -> String {
    format!("inst_{}", index)
}

/// `parseFloat(x.toFixed(2))`
pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    #[serde(default)]
    pub allowed: bool,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub down_payment: f64,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub installments_count: u32,
    /// `rate_{i}` percentages, `inst_{i}` months and the `downPayment` month.
    #[serde(default, deserialize_with = "lenient::number_map")]
    pub dates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanChange {
    DownPayment(f64),
    Count(i64),
    Rate { index: usize, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthSlot {
    DownPayment,
    Installment(usize),
}

impl MonthSlot {
    fn key(self) -> String {
        match self {
            Self::DownPayment => DOWN_PAYMENT_SLOT.to_string(),
            Self::Installment(i) => month_key(i),
        }
    }
}

impl InstallmentPlan {
    pub fn rate(&self, index: usize) -> f64 {
        self.dates.get(&rate_key(index)).copied().unwrap_or(0.0)
    }

    pub fn month(&self, slot: MonthSlot) -> Option<u32> {
        self.dates
            .get(&slot.key())
            .map(|m| m.trunc() as u32)
            .filter(|m| (1..=12).contains(m))
    }

    pub fn count(&self) -> usize {
        self.installments_count as usize
    }

    pub fn rates(&self) -> Vec<f64> {
        (0..self.count()).map(|i| self.rate(i)).collect()
    }
}

pub fn clamp_count(requested: i64) -> u32 {
    requested.clamp(0, MAX_INSTALLMENTS as i64) as u32
}

/// Down payment and count changes reset every rate to an equal share of what
/// the down payment leaves; a single rate edit only re-spreads the rates after
/// it. Returns a fresh plan.
pub fn recompute(plan: &InstallmentPlan, change: PlanChange) -> InstallmentPlan {
    let mut next = plan.clone();
    match change {
        PlanChange::DownPayment(dp) => {
            next.down_payment = dp;
            reset_rates(&mut next);
        }
        PlanChange::Count(n) => {
            next.installments_count = clamp_count(n);
            reset_rates(&mut next);
        }
        PlanChange::Rate { index, value } => redistribute_tail(&mut next, index, value),
    }
    next
}

fn reset_rates(plan: &mut InstallmentPlan) {
    let count = plan.count();
    if count == 0 {
        return;
    }
    // Not clamped: a down payment over 100 yields negative shares.
    let share = round_2dp((100.0 - plan.down_payment) / count as f64);
    for i in 0..count {
        plan.dates.insert(rate_key(i), share);
    }
}

fn redistribute_tail(plan: &mut InstallmentPlan, index: usize, value: f64) {
    plan.dates.insert(rate_key(index), value);

    let used = plan.down_payment + (0..index).map(|i| plan.rate(i)).sum::<f64>() + value;
    let remaining = 100.0 - used;
    let count = plan.count();
    let subsequent = count as i64 - (index as i64 + 1);
    if subsequent <= 0 {
        return;
    }
    let share = round_2dp((remaining / subsequent as f64).max(0.0));
    for i in (index + 1)..count {
        plan.dates.insert(rate_key(i), share);
    }
}

pub fn set_month(plan: &InstallmentPlan, slot: MonthSlot, month: Option<u32>) -> InstallmentPlan {
    let mut next = plan.clone();
    match month {
        Some(m) => {
            next.dates.insert(slot.key(), m as f64);
        }
        None => {
            next.dates.remove(&slot.key());
        }
    }
    next
}

pub fn total_percentage(plan: &InstallmentPlan) -> f64 {
    plan.down_payment + plan.rates().iter().sum::<f64>()
}

pub fn is_valid(plan: &InstallmentPlan) -> bool {
    (total_percentage(plan) - 100.0).abs() < 0.1
}

pub fn net_amount(fee: f64, discount_percent: f64) -> f64 {
    fee * (1.0 - discount_percent / 100.0)
}

pub fn installment_amount(net: f64, rate: f64) -> f64 {
    net * (rate / 100.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub label: String,
    pub rate: f64,
    pub amount: f64,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub fee: f64,
    pub discount: f64,
    pub discount_amount: f64,
    pub net: f64,
    pub down_payment: ScheduleRow,
    pub installments: Vec<ScheduleRow>,
    pub total_percentage: f64,
    pub valid: bool,
}

/// What a family pays and when, for one class fee under the plan.
pub fn schedule_preview(plan: &InstallmentPlan, fee: f64, discount_percent: f64) -> SchedulePreview {
    let net = net_amount(fee, discount_percent);
    let installments = (0..plan.count())
        .map(|i| {
            let rate = plan.rate(i);
            ScheduleRow {
                label: format!("Installment {}", i + 1),
                rate,
                amount: installment_amount(net, rate),
                month: plan.month(MonthSlot::Installment(i)),
            }
        })
        .collect();

    SchedulePreview {
        fee,
        discount: discount_percent,
        discount_amount: fee * discount_percent / 100.0,
        net,
        down_payment: ScheduleRow {
            label: "Down payment".to_string(),
            rate: plan.down_payment,
            amount: installment_amount(net, plan.down_payment),
            month: plan.month(MonthSlot::DownPayment),
        },
        installments,
        total_percentage: total_percentage(plan),
        valid: is_valid(plan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(dp: f64, count: i64) -> InstallmentPlan {
        let p = InstallmentPlan {
            allowed: true,
            ..InstallmentPlan::default()
        };
        let p = recompute(&p, PlanChange::Count(count));
        recompute(&p, PlanChange::DownPayment(dp))
    }

    #[test]
    fn full_reset_spreads_remaining_equally() {
        let p = plan(20.0, 4);
        assert_eq!(p.rates(), vec![20.0, 20.0, 20.0, 20.0]);
        assert_eq!(total_percentage(&p), 100.0);
        assert!(is_valid(&p));
    }

    #[test]
    fn rate_edit_only_moves_later_installments() {
        let p = plan(20.0, 4);
        let edited = recompute(&p, PlanChange::Rate { index: 0, value: 35.0 });
        assert_eq!(edited.rates(), vec![35.0, 15.0, 15.0, 15.0]);

        let again = recompute(&edited, PlanChange::Rate { index: 2, value: 5.0 });
        assert_eq!(again.rates(), vec![35.0, 15.0, 5.0, 25.0]);
        assert!(is_valid(&again));
    }

    #[test]
    fn editing_last_installment_redistributes_nothing() {
        let p = plan(20.0, 4);
        let edited = recompute(&p, PlanChange::Rate { index: 3, value: 30.0 });
        assert_eq!(edited.rates(), vec![20.0, 20.0, 20.0, 30.0]);
        assert!((total_percentage(&edited) - 110.0).abs() < 1e-9);
        assert!(!is_valid(&edited));
    }

    #[test]
    fn tail_share_is_clamped_at_zero() {
        let p = plan(20.0, 3);
        let edited = recompute(&p, PlanChange::Rate { index: 0, value: 95.0 });
        assert_eq!(edited.rates(), vec![95.0, 0.0, 0.0]);
    }

    #[test]
    fn reset_path_allows_negative_shares() {
        let p = plan(120.0, 2);
        assert_eq!(p.rates(), vec![-10.0, -10.0]);
    }

    #[test]
    fn count_is_capped_and_zero_leaves_rates_untouched() {
        let p = plan(10.0, 30);
        assert_eq!(p.installments_count, MAX_INSTALLMENTS);
        assert_eq!(p.rates().len(), 24);
        assert_eq!(p.rate(0), 3.75);

        let none = recompute(&InstallmentPlan::default(), PlanChange::Count(0));
        assert!(none.dates.is_empty());
        assert_eq!(total_percentage(&none), 0.0);
    }

    #[test]
    fn shares_round_to_two_decimals() {
        let p = plan(0.0, 3);
        assert_eq!(p.rates(), vec![33.33, 33.33, 33.33]);
        assert!(is_valid(&p));
    }

    #[test]
    fn months_are_kept_beside_rates() {
        let p = plan(20.0, 2);
        let p = set_month(&p, MonthSlot::DownPayment, Some(9));
        let p = set_month(&p, MonthSlot::Installment(1), Some(2));
        assert_eq!(p.month(MonthSlot::DownPayment), Some(9));
        assert_eq!(p.month(MonthSlot::Installment(0)), None);
        assert_eq!(p.month(MonthSlot::Installment(1)), Some(2));
        let p = recompute(&p, PlanChange::DownPayment(40.0));
        assert_eq!(p.month(MonthSlot::DownPayment), Some(9));
        assert_eq!(p.rates(), vec![30.0, 30.0]);
    }

    #[test]
    fn preview_applies_discount_then_rates() {
        let p = plan(20.0, 4);
        let p = set_month(&p, MonthSlot::Installment(0), Some(10));
        let preview = schedule_preview(&p, 10000.0, 10.0);
        assert_eq!(preview.net, 9000.0);
        assert_eq!(preview.discount_amount, 1000.0);
        assert_eq!(preview.down_payment.amount, 1800.0);
        assert_eq!(preview.installments.len(), 4);
        assert_eq!(preview.installments[0].amount, 1800.0);
        assert_eq!(preview.installments[0].month, Some(10));
        assert!(preview.valid);
    }

    #[test]
    fn plan_reads_form_text_values() {
        let p: InstallmentPlan = serde_json::from_value(json!({
            "allowed": true,
            "downPayment": "25",
            "installmentsCount": "3",
            "dates": { "rate_0": "25", "rate_1": 25, "rate_2": "25", "inst_0": "9", "downPayment": "" }
        }))
        .expect("plan");
        assert_eq!(p.down_payment, 25.0);
        assert_eq!(p.installments_count, 3);
        assert!(is_valid(&p));
        assert_eq!(p.month(MonthSlot::Installment(0)), Some(9));
        assert_eq!(p.month(MonthSlot::DownPayment), None);
    }
}
