use crate::draft::{DraftError, OnboardingDraft};
use crate::installments::{is_valid, schedule_preview, total_percentage, SchedulePreview};
use crate::structure::{active_count, ClassId};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentSummary {
    pub allowed: bool,
    pub count: u32,
    pub down_payment: f64,
    pub total_percentage: f64,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub school_name: String,
    pub school_type: String,
    pub education_system_id: String,
    pub education_track_id: String,
    pub location_line: String,
    pub active_stages: usize,
    pub active_classes: usize,
    pub active_subjects: usize,
    pub custom_subjects: usize,
    pub installments: InstallmentSummary,
    pub facility_count: usize,
    pub custom_user_count: usize,
    /// Nothing in the academic structure is switched on.
    pub no_active_stages: bool,
}

pub fn review_summary(draft: &OnboardingDraft) -> ReviewSummary {
    let sd = &draft.school_data;
    let s = &sd.selected_structure;
    let plan = &sd.installments;
    let active_stages = active_count(&s.stages);

    let location_line = [
        sd.location.governorate.as_str(),
        sd.location.educational_administration.as_str(),
        sd.location.address.as_str(),
    ]
    .iter()
    .filter(|p| !p.trim().is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" - ");

    ReviewSummary {
        school_name: sd.name.clone(),
        school_type: sd.school_type.clone(),
        education_system_id: sd.education_system_id.clone(),
        education_track_id: sd.education_track_id.clone(),
        location_line,
        active_stages,
        active_classes: active_count(&s.classes),
        active_subjects: active_count(&s.subjects),
        custom_subjects: s.custom_subjects.values().map(Vec::len).sum(),
        installments: InstallmentSummary {
            allowed: plan.allowed,
            count: plan.installments_count,
            down_payment: plan.down_payment,
            total_percentage: total_percentage(plan),
            valid: is_valid(plan),
        },
        facility_count: sd.facilities.len(),
        custom_user_count: draft.custom_users.len(),
        no_active_stages: active_stages == 0,
    }
}

/// Schedule for one class using its stored fee and discount.
pub fn class_installment_preview(
    draft: &OnboardingDraft,
    class_id: &ClassId,
) -> Result<SchedulePreview, DraftError> {
    let s = &draft.school_data.selected_structure;
    let Some(cls) = s.classes.get(class_id) else {
        return Err(DraftError::new("not_found", "class has no settings yet"));
    };
    let fee = cls.fees.unwrap_or(0.0);
    if fee <= 0.0 {
        return Err(DraftError::new("bad_params", "class has no fee set"));
    }
    Ok(schedule_preview(
        &draft.school_data.installments,
        fee,
        cls.discount.unwrap_or(0.0),
    ))
}

/// The body the host posts to the onboarding endpoint.
pub fn build_payload(draft: &OnboardingDraft) -> Result<Value, DraftError> {
    serde_json::to_value(draft)
        .map_err(|e| DraftError::new("internal", format!("serialize payload: {e}")))
}
