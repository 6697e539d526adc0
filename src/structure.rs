use crate::lenient;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

node_id!(StageId);
node_id!(BranchId);
node_id!(GradeId);
node_id!(ClassId);
node_id!(SubjectId);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationSystem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// School type this system is offered for; empty means universal.
    #[serde(default, rename = "type", deserialize_with = "lenient::ref_id")]
    pub school_type: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: StageId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::ref_id")]
    pub track_id: Option<String>,
    #[serde(default)]
    pub grades: Vec<Grade>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub grades: Vec<Grade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: GradeId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub accepted_age: Option<f64>,
    #[serde(default)]
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default)]
    pub name: String,
}

impl Stage {
    /// Direct grades first, then every branch's grades.
    pub fn all_grades(&self) -> impl Iterator<Item = &Grade> {
        self.grades
            .iter()
            .chain(self.branches.iter().flat_map(|b| b.grades.iter()))
    }
}

impl Grade {
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.classes.iter().flat_map(|c| c.subjects.iter())
    }
}

impl EducationSystem {
    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| &s.id == id)
    }

    pub fn grades(&self) -> impl Iterator<Item = &Grade> {
        self.stages.iter().flat_map(|s| s.all_grades())
    }

    pub fn grade(&self, id: &GradeId) -> Option<&Grade> {
        self.grades().find(|g| &g.id == id)
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }
}

pub trait NodeOverride {
    fn is_active(&self) -> bool;
    fn merge(&mut self, changes: &NodeChanges);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOverride {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOverride {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fees: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOverride {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl NodeOverride for StageOverride {
    fn is_active(&self) -> bool {
        self.active
    }

    fn merge(&mut self, changes: &NodeChanges) {
        if let Some(a) = changes.active {
            self.active = a;
        }
        if let Some(n) = &changes.custom_name {
            self.custom_name = Some(n.clone());
        }
    }
}

impl NodeOverride for ClassOverride {
    fn is_active(&self) -> bool {
        self.active
    }

    fn merge(&mut self, changes: &NodeChanges) {
        if let Some(a) = changes.active {
            self.active = a;
        }
        if let Some(n) = &changes.custom_name {
            self.custom_name = Some(n.clone());
        }
        if let Some(f) = changes.fees {
            self.fees = Some(f);
        }
        if let Some(d) = changes.discount {
            self.discount = Some(d);
        }
    }
}

impl NodeOverride for SubjectOverride {
    fn is_active(&self) -> bool {
        self.active
    }

    fn merge(&mut self, changes: &NodeChanges) {
        if let Some(a) = changes.active {
            self.active = a;
        }
        if let Some(n) = &changes.custom_name {
            self.custom_name = Some(n.clone());
        }
    }
}

/// Read-side defaults for nodes that have never been touched.
pub const INACTIVE_STAGE: StageOverride = StageOverride {
    active: false,
    custom_name: None,
};
pub const INACTIVE_CLASS: ClassOverride = ClassOverride {
    active: false,
    custom_name: None,
    fees: None,
    discount: None,
};
pub const INACTIVE_SUBJECT: SubjectOverride = SubjectOverride {
    active: false,
    custom_name: None,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSubject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default = "custom_marker")]
    pub custom: bool,
}

fn custom_marker() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureOverrides {
    #[serde(default)]
    pub stages: BTreeMap<StageId, StageOverride>,
    #[serde(default)]
    pub classes: BTreeMap<ClassId, ClassOverride>,
    #[serde(default)]
    pub subjects: BTreeMap<SubjectId, SubjectOverride>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_subjects: BTreeMap<GradeId, Vec<CustomSubject>>,
}

impl StructureOverrides {
    pub fn stage(&self, id: &StageId) -> &StageOverride {
        self.stages.get(id).unwrap_or(&INACTIVE_STAGE)
    }

    pub fn class(&self, id: &ClassId) -> &ClassOverride {
        self.classes.get(id).unwrap_or(&INACTIVE_CLASS)
    }

    pub fn subject(&self, id: &SubjectId) -> &SubjectOverride {
        self.subjects.get(id).unwrap_or(&INACTIVE_SUBJECT)
    }

    pub fn custom_subjects_of(&self, grade: &GradeId) -> &[CustomSubject] {
        self.custom_subjects
            .get(grade)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn is_active(&self, kind: NodeKind, id: &str) -> bool {
        match kind {
            NodeKind::Stage => self.stage(&StageId::from(id)).active,
            NodeKind::Class => self.class(&ClassId::from(id)).active,
            NodeKind::Subject => self.subject(&SubjectId::from(id)).active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Stage,
    Class,
    Subject,
}

impl NodeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stage" => Some(Self::Stage),
            "class" => Some(Self::Class),
            "subject" => Some(Self::Subject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub fees: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(alias = "type")]
    pub kind: NodeKind,
    pub id: String,
    #[serde(default)]
    pub changes: NodeChanges,
}

impl Change {
    pub fn set_active(kind: NodeKind, id: &str, active: bool) -> Self {
        Self {
            kind,
            id: id.to_string(),
            changes: NodeChanges {
                active: Some(active),
                ..NodeChanges::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StructureError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Applies all changes to a copy of `overrides` and returns it.
///
/// A node seen for the first time starts as `{ active: kind == Stage }` before
/// its changes are merged, so a cascade and its parent toggle land together.
/// Ids are not checked against any tree.
pub fn bulk_update(overrides: &StructureOverrides, changes: &[Change]) -> StructureOverrides {
    let mut next = overrides.clone();
    for change in changes {
        match change.kind {
            NodeKind::Stage => next
                .stages
                .entry(StageId::from(change.id.as_str()))
                .or_insert_with(|| StageOverride {
                    active: true,
                    custom_name: None,
                })
                .merge(&change.changes),
            NodeKind::Class => next
                .classes
                .entry(ClassId::from(change.id.as_str()))
                .or_default()
                .merge(&change.changes),
            NodeKind::Subject => next
                .subjects
                .entry(SubjectId::from(change.id.as_str()))
                .or_default()
                .merge(&change.changes),
        }
    }
    next
}

fn grade_changes(grade: &Grade, active: bool, out: &mut Vec<Change>) {
    for cls in &grade.classes {
        out.push(Change::set_active(NodeKind::Class, cls.id.as_str(), active));
        for sub in &cls.subjects {
            out.push(Change::set_active(NodeKind::Subject, sub.id.as_str(), active));
        }
    }
}

/// Flips a stage. Switching it off also switches off every class and subject
/// under its direct and branch grades; switching it on leaves children alone.
pub fn toggle_stage(
    overrides: &StructureOverrides,
    system: &EducationSystem,
    stage_id: &StageId,
) -> StructureOverrides {
    let new_active = !overrides.stage(stage_id).active;
    let mut changes = vec![Change::set_active(
        NodeKind::Stage,
        stage_id.as_str(),
        new_active,
    )];
    if !new_active {
        if let Some(stage) = system.stage(stage_id) {
            for grade in stage.all_grades() {
                grade_changes(grade, false, &mut changes);
            }
        }
    }
    bulk_update(overrides, &changes)
}

pub fn toggle_grade_and_descendants(
    overrides: &StructureOverrides,
    grade: &Grade,
    new_active: bool,
) -> StructureOverrides {
    let mut changes = Vec::new();
    grade_changes(grade, new_active, &mut changes);
    bulk_update(overrides, &changes)
}

pub fn toggle_class(overrides: &StructureOverrides, class_id: &ClassId) -> StructureOverrides {
    let new_active = !overrides.class(class_id).active;
    bulk_update(
        overrides,
        &[Change::set_active(NodeKind::Class, class_id.as_str(), new_active)],
    )
}

/// Sets `customName`; the node keeps whatever activation it reads as now.
pub fn update_custom_name(
    overrides: &StructureOverrides,
    kind: NodeKind,
    id: &str,
    name: &str,
) -> StructureOverrides {
    let change = Change {
        kind,
        id: id.to_string(),
        changes: NodeChanges {
            active: Some(overrides.is_active(kind, id)),
            custom_name: Some(name.to_string()),
            ..NodeChanges::default()
        },
    };
    bulk_update(overrides, &[change])
}

/// Grade labels live on the grade's first class, which is switched on with it.
pub fn rename_grade(overrides: &StructureOverrides, grade: &Grade, name: &str) -> StructureOverrides {
    let Some(primary) = grade.classes.first() else {
        return overrides.clone();
    };
    let change = Change {
        kind: NodeKind::Class,
        id: primary.id.as_str().to_string(),
        changes: NodeChanges {
            active: Some(true),
            custom_name: Some(name.to_string()),
            ..NodeChanges::default()
        },
    };
    bulk_update(overrides, &[change])
}

/// Rebuilds a complete map over the whole tree with every node set to
/// `active`. Stored names, fees and discounts survive; entries for ids outside
/// the tree are dropped. Custom subjects are carried over untouched.
pub fn select_all(
    system: &EducationSystem,
    existing: &StructureOverrides,
    active: bool,
) -> StructureOverrides {
    let mut next = StructureOverrides {
        custom_subjects: existing.custom_subjects.clone(),
        ..StructureOverrides::default()
    };

    for stage in &system.stages {
        let prev = existing.stages.get(&stage.id);
        next.stages.insert(
            stage.id.clone(),
            StageOverride {
                active,
                custom_name: prev
                    .and_then(|p| p.custom_name.clone())
                    .or_else(|| Some(String::new())),
            },
        );

        for grade in stage.all_grades() {
            for cls in &grade.classes {
                let prev = existing.classes.get(&cls.id);
                next.classes.insert(
                    cls.id.clone(),
                    ClassOverride {
                        active,
                        custom_name: prev
                            .and_then(|p| p.custom_name.clone())
                            .or_else(|| Some(String::new())),
                        fees: prev.and_then(|p| p.fees).or(Some(0.0)),
                        discount: prev.and_then(|p| p.discount),
                    },
                );
                for sub in &cls.subjects {
                    let prev = existing.subjects.get(&sub.id);
                    next.subjects.insert(
                        sub.id.clone(),
                        SubjectOverride {
                            active,
                            custom_name: prev
                                .and_then(|p| p.custom_name.clone())
                                .or_else(|| Some(String::new())),
                        },
                    );
                }
            }
        }
    }
    next
}

fn new_custom_subject_id() -> SubjectId {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    SubjectId(format!(
        "custom_{}_{}",
        Utc::now().timestamp_millis(),
        suffix
    ))
}

pub fn add_custom_subject(
    overrides: &StructureOverrides,
    grade: &Grade,
    name: &str,
) -> Result<(StructureOverrides, CustomSubject), StructureError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StructureError::new("empty_name", "subject name must not be empty"));
    }
    let taken = grade.subjects().any(|s| s.name == name)
        || overrides
            .custom_subjects_of(&grade.id)
            .iter()
            .any(|s| s.name == name);
    if taken {
        let mut e = StructureError::new("duplicate_name", "subject already exists in this grade");
        e.details = Some(serde_json::json!({ "gradeId": grade.id, "name": name }));
        return Err(e);
    }

    let subject = CustomSubject {
        id: new_custom_subject_id(),
        name: name.to_string(),
        custom: true,
    };
    let mut next = overrides.clone();
    next.custom_subjects
        .entry(grade.id.clone())
        .or_default()
        .push(subject.clone());
    Ok((next, subject))
}

pub fn remove_custom_subject(
    overrides: &StructureOverrides,
    grade_id: &GradeId,
    subject_id: &SubjectId,
) -> StructureOverrides {
    let mut next = overrides.clone();
    if let Some(list) = next.custom_subjects.get_mut(grade_id) {
        list.retain(|s| &s.id != subject_id);
    }
    next
}

/// Fees and discounts only land on classes that already have an entry.
pub fn set_class_money(
    overrides: &StructureOverrides,
    class_id: &ClassId,
    fees: Option<f64>,
    discount: Option<f64>,
) -> StructureOverrides {
    let mut next = overrides.clone();
    if let Some(entry) = next.classes.get_mut(class_id) {
        if let Some(f) = fees {
            entry.fees = Some(f);
        }
        if let Some(d) = discount {
            entry.discount = Some(d);
        }
    }
    next
}

/// A grade has no flag of its own: it is on when any of its classes is.
pub fn is_grade_active(grade: &Grade, overrides: &StructureOverrides) -> bool {
    grade
        .classes
        .iter()
        .any(|c| overrides.class(&c.id).active)
}

pub fn active_count<K, V: NodeOverride>(map: &BTreeMap<K, V>) -> usize {
    map.values().filter(|v| v.is_active()).count()
}

pub fn is_stage_visible(stage: &Stage, system: &EducationSystem, selected_track: Option<&str>) -> bool {
    let selected = selected_track.filter(|t| !t.trim().is_empty());
    match (selected, stage.track_id.as_deref()) {
        (Some(sel), Some(own)) => own == sel,
        (Some(_), None) => true,
        (None, None) => true,
        // Nothing selected: a system without tracks shows everything.
        (None, Some(_)) => !system.has_tracks(),
    }
}

pub fn visible_stages<'a>(system: &'a EducationSystem, selected_track: Option<&str>) -> Vec<&'a Stage> {
    system
        .stages
        .iter()
        .filter(|s| is_stage_visible(s, system, selected_track))
        .collect()
}
