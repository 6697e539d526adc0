use crate::installments::InstallmentPlan;
use crate::lenient;
use crate::structure::{EducationSystem, GradeId, StructureOverrides};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DraftError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DraftError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeesRange {
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub min: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub governorate: String,
    pub city: String,
    pub educational_administration: String,
    pub address: String,
    #[serde(deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdmissionDetails {
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub application_start_month: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub application_start_day: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub application_end_month: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub application_end_day: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Financials {
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub registration_fees: f64,
    pub registration_discount_enabled: bool,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub registration_discount: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub uniform_fees: f64,
    pub uniform_discount_enabled: bool,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub uniform_discount: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub bus_fees_min: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub bus_fees_max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkHours {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadedImage {
    pub name: String,
    /// Data URL, already encoded by the host.
    pub data: String,
    #[serde(rename = "type")]
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitySelection {
    pub facility_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub images: Vec<UploadedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Catalog entry from the facilities lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchoolData {
    pub name: String,
    pub name_en: String,
    pub short_name: String,
    #[serde(rename = "type")]
    pub school_type: String,
    pub gender_policy: String,
    pub religion_type: String,
    pub is_religious: bool,
    pub special_needs_type: String,
    pub supports_special_needs: bool,
    pub fees_details: FeesRange,
    pub location: Location,
    pub education_system_id: String,
    pub education_track_id: String,
    pub selected_structure: StructureOverrides,
    pub age_requirement: BTreeMap<GradeId, f64>,
    pub installments: InstallmentPlan,
    pub admission_details: AdmissionDetails,
    pub financials: Financials,
    pub work_days: Vec<String>,
    pub work_hours: WorkHours,
    pub facilities: Vec<FacilitySelection>,
    /// Fields the sidecar does not model travel through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SchoolData {
    fn default() -> Self {
        Self {
            name: String::new(),
            name_en: String::new(),
            short_name: String::new(),
            school_type: "Private".to_string(),
            gender_policy: "Mixed".to_string(),
            religion_type: "None".to_string(),
            is_religious: false,
            special_needs_type: "None".to_string(),
            supports_special_needs: false,
            fees_details: FeesRange::default(),
            location: Location::default(),
            education_system_id: String::new(),
            education_track_id: String::new(),
            selected_structure: StructureOverrides::default(),
            age_requirement: BTreeMap::new(),
            installments: InstallmentPlan::default(),
            admission_details: AdmissionDetails::default(),
            financials: Financials::default(),
            work_days: Vec::new(),
            work_hours: WorkHours::default(),
            facilities: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl AccountData {
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.phone, &self.password]
            .iter()
            .all(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[default]
    Manager,
    Accountant,
    Admin,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#3b82f6".to_string(),
            secondary_color: "#1d4ed8".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigData {
    pub approved: bool,
    pub show_in_search: bool,
    pub theme: Theme,
    pub logo: Option<String>,
    pub buildings: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            approved: true,
            show_in_search: true,
            theme: Theme::default(),
            logo: None,
            buildings: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// The wizard's whole form state; also the submission body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingDraft {
    pub school_data: SchoolData,
    pub owner_data: AccountData,
    pub moderator_data: AccountData,
    pub config_data: ConfigData,
    pub custom_users: Vec<CustomUser>,
}

/// Values new drafts start from; see the `drafts` and `schedule` setup sections.
#[derive(Debug, Clone, Default)]
pub struct DraftDefaults {
    pub school_type: Option<String>,
    pub theme: Option<Theme>,
    pub approved: Option<bool>,
    pub show_in_search: Option<bool>,
    pub work_days: Vec<String>,
    pub work_hours: Option<WorkHours>,
}

impl OnboardingDraft {
    pub fn seeded(defaults: &DraftDefaults) -> Self {
        let mut d = Self::default();
        if let Some(t) = &defaults.school_type {
            d.school_data.school_type = t.clone();
        }
        if let Some(theme) = &defaults.theme {
            d.config_data.theme = theme.clone();
        }
        if let Some(a) = defaults.approved {
            d.config_data.approved = a;
        }
        if let Some(s) = defaults.show_in_search {
            d.config_data.show_in_search = s;
        }
        d.school_data.work_days = defaults.work_days.clone();
        if let Some(h) = &defaults.work_hours {
            d.school_data.work_hours = h.clone();
        }
        d
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    SchoolData,
    OwnerData,
    ModeratorData,
    ConfigData,
}

impl Section {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schoolData" => Some(Self::SchoolData),
            "ownerData" => Some(Self::OwnerData),
            "moderatorData" => Some(Self::ModeratorData),
            "configData" => Some(Self::ConfigData),
            _ => None,
        }
    }
}

fn merge_patch<T>(current: &T, patch: &Map<String, Value>, what: &str) -> Result<T, DraftError>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut value = serde_json::to_value(current)
        .map_err(|e| DraftError::new("internal", format!("serialize {what}: {e}")))?;
    let Some(obj) = value.as_object_mut() else {
        return Err(DraftError::new("internal", format!("{what} is not an object")));
    };
    for (k, v) in patch {
        obj.insert(k.clone(), v.clone());
    }
    serde_json::from_value(value).map_err(|e| {
        let mut err = DraftError::new("bad_params", format!("invalid {what} patch: {e}"));
        err.details = Some(Value::Object(patch.clone()));
        err
    })
}

fn reset_academic(school: &mut SchoolData) {
    school.education_track_id.clear();
    school.selected_structure = StructureOverrides::default();
}

/// Shallow-merges `patch` into one section and applies the cascading resets
/// that follow a school type or education system change.
pub fn update_section(
    draft: &OnboardingDraft,
    section: Section,
    patch: &Map<String, Value>,
    systems: &HashMap<String, EducationSystem>,
) -> Result<OnboardingDraft, DraftError> {
    let mut next = draft.clone();
    match section {
        Section::OwnerData => next.owner_data = merge_patch(&draft.owner_data, patch, "ownerData")?,
        Section::ModeratorData => {
            next.moderator_data = merge_patch(&draft.moderator_data, patch, "moderatorData")?
        }
        Section::ConfigData => next.config_data = merge_patch(&draft.config_data, patch, "configData")?,
        Section::SchoolData => {
            let before = &draft.school_data;
            let mut school: SchoolData = merge_patch(before, patch, "schoolData")?;

            if patch.contains_key("religionType") {
                school.is_religious = school.religion_type != "None";
            }
            if patch.contains_key("specialNeedsType") {
                school.supports_special_needs =
                    !school.special_needs_type.is_empty() && school.special_needs_type != "None";
            }

            if school.education_system_id != before.education_system_id {
                reset_academic(&mut school);
                // An explicit track in the same patch wins.
                if let Some(track) = patch.get("educationTrackId").and_then(|v| v.as_str()) {
                    school.education_track_id = track.to_string();
                }
            } else if school.school_type != before.school_type
                && !school.education_system_id.is_empty()
            {
                let mismatched = systems
                    .get(&school.education_system_id)
                    .and_then(|s| s.school_type.as_deref())
                    .map(|t| t != school.school_type)
                    .unwrap_or(false);
                if mismatched {
                    school.education_system_id.clear();
                    reset_academic(&mut school);
                }
            }

            if school.education_track_id.is_empty() {
                if let Some(system) = systems.get(&school.education_system_id) {
                    if let [only] = system.tracks.as_slice() {
                        school.education_track_id = only.id.clone();
                    }
                }
            }
            next.school_data = school;
        }
    }
    Ok(next)
}

pub fn toggle_work_day(draft: &OnboardingDraft, day: &str) -> OnboardingDraft {
    let mut next = draft.clone();
    let days = &mut next.school_data.work_days;
    if days.iter().any(|d| d == day) {
        days.retain(|d| d != day);
    } else {
        days.push(day.to_string());
    }
    next
}

pub fn set_work_hours(draft: &OnboardingDraft, start: Option<&str>, end: Option<&str>) -> OnboardingDraft {
    let mut next = draft.clone();
    if let Some(s) = start {
        next.school_data.work_hours.start = s.to_string();
    }
    if let Some(e) = end {
        next.school_data.work_hours.end = e.to_string();
    }
    next
}

pub fn set_age_requirement(draft: &OnboardingDraft, grade: &GradeId, age: Option<f64>) -> OnboardingDraft {
    let mut next = draft.clone();
    match age {
        Some(a) => {
            next.school_data.age_requirement.insert(grade.clone(), a);
        }
        None => {
            next.school_data.age_requirement.remove(grade);
        }
    }
    next
}

/// Selects the facility when absent, deselects it when present.
pub fn toggle_facility(draft: &OnboardingDraft, facility_id: &str, catalog: &[Facility]) -> OnboardingDraft {
    let mut next = draft.clone();
    let selected = &mut next.school_data.facilities;
    if selected.iter().any(|f| f.facility_id == facility_id) {
        selected.retain(|f| f.facility_id != facility_id);
    } else {
        let details = catalog.iter().find(|f| f.id == facility_id);
        selected.push(FacilitySelection {
            facility_id: facility_id.to_string(),
            value: "Yes".to_string(),
            images: Vec::new(),
            name: details.map(|f| f.name.clone()),
            icon: details.map(|f| f.icon.clone()),
        });
    }
    next
}

pub fn add_facility_images(
    draft: &OnboardingDraft,
    facility_id: &str,
    images: Vec<UploadedImage>,
) -> Result<OnboardingDraft, DraftError> {
    let mut next = draft.clone();
    let Some(sel) = next
        .school_data
        .facilities
        .iter_mut()
        .find(|f| f.facility_id == facility_id)
    else {
        return Err(DraftError::new("not_found", "facility is not selected"));
    };
    sel.images.extend(images);
    Ok(next)
}

pub fn remove_facility_image(draft: &OnboardingDraft, facility_id: &str, index: usize) -> OnboardingDraft {
    let mut next = draft.clone();
    if let Some(sel) = next
        .school_data
        .facilities
        .iter_mut()
        .find(|f| f.facility_id == facility_id)
    {
        if index < sel.images.len() {
            sel.images.remove(index);
        }
    }
    next
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: UserRole,
}

pub fn add_custom_user(draft: &OnboardingDraft, user: NewUser) -> Result<(OnboardingDraft, String), DraftError> {
    if user.name.trim().is_empty() || user.email.trim().is_empty() || user.password.is_empty() {
        return Err(DraftError::new(
            "bad_params",
            "name, email and password are required",
        ));
    }
    let id = Uuid::new_v4().to_string();
    let mut next = draft.clone();
    next.custom_users.push(CustomUser {
        id: id.clone(),
        name: user.name,
        email: user.email,
        phone: user.phone,
        password: user.password,
        role: user.role,
    });
    Ok((next, id))
}

pub fn remove_custom_user(draft: &OnboardingDraft, index: usize) -> OnboardingDraft {
    let mut next = draft.clone();
    if index < next.custom_users.len() {
        next.custom_users.remove(index);
    }
    next
}
