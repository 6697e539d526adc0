use crate::draft::{DraftError, OnboardingDraft};
use crate::structure::active_count;
use serde::Serialize;
use serde_json::json;

pub const FIRST_STEP: u8 = 1;
pub const FINAL_STEP: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SchoolData,
    AcademicSettings,
    FinancialDetails,
    WorkingHours,
    Facilities,
    Accounts,
    SiteSetup,
    Review,
}

impl Step {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::SchoolData),
            2 => Some(Self::AcademicSettings),
            3 => Some(Self::FinancialDetails),
            4 => Some(Self::WorkingHours),
            5 => Some(Self::Facilities),
            6 => Some(Self::Accounts),
            7 => Some(Self::SiteSetup),
            8 => Some(Self::Review),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self as u8 + 1
    }
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Whether the step's required fields are present. Only steps 1, 2 and 6
/// block; the rest are informational.
pub fn validate_step(draft: &OnboardingDraft, step: Step) -> bool {
    let sd = &draft.school_data;
    match step {
        Step::SchoolData => {
            filled(&sd.name)
                && filled(&sd.name_en)
                && filled(&sd.education_system_id)
                && filled(&sd.location.governorate)
                && filled(&sd.location.educational_administration)
        }
        Step::AcademicSettings => active_count(&sd.selected_structure.stages) > 0,
        Step::Accounts => draft.owner_data.is_complete() && draft.moderator_data.is_complete(),
        Step::FinancialDetails
        | Step::WorkingHours
        | Step::Facilities
        | Step::SiteSetup
        | Step::Review => true,
    }
}

/// Owner and moderator must not share an email or a phone number.
pub fn check_identities(draft: &OnboardingDraft) -> Result<(), DraftError> {
    let owner = &draft.owner_data;
    let moderator = &draft.moderator_data;
    if owner.email == moderator.email {
        let mut e = DraftError::new(
            "identity_conflict",
            "owner and moderator cannot use the same email",
        );
        e.details = Some(json!({ "field": "email" }));
        return Err(e);
    }
    if owner.phone == moderator.phone {
        let mut e = DraftError::new(
            "identity_conflict",
            "owner and moderator cannot use the same phone number",
        );
        e.details = Some(json!({ "field": "phone" }));
        return Err(e);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(u8),
    ReadyToSubmit,
}

pub fn advance(draft: &OnboardingDraft, current: u8) -> Result<Advance, DraftError> {
    let Some(step) = Step::from_number(current) else {
        return Err(DraftError::new("bad_params", format!("unknown step {}", current)));
    };
    if !validate_step(draft, step) {
        let mut e = DraftError::new("step_invalid", "required fields are missing");
        e.details = Some(json!({ "step": current }));
        return Err(e);
    }
    if step == Step::Accounts {
        check_identities(draft)?;
    }
    if current >= FINAL_STEP {
        Ok(Advance::ReadyToSubmit)
    } else {
        Ok(Advance::Moved(current + 1))
    }
}

pub fn back(current: u8) -> u8 {
    current.saturating_sub(1).clamp(FIRST_STEP, FINAL_STEP)
}
