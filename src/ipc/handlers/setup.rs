use crate::db;
use crate::draft::{DraftDefaults, Theme, WorkHours};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Drafts,
    Schedule,
}

impl SetupSection {
    const ALL: [SetupSection; 2] = [SetupSection::Drafts, SetupSection::Schedule];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "drafts" => Some(Self::Drafts),
            "schedule" => Some(Self::Schedule),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Drafts => "drafts",
            Self::Schedule => "schedule",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Drafts => "setup.drafts",
            Self::Schedule => "setup.schedule",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Drafts => json!({
            "defaultSchoolType": "Private",
            "primaryColor": "#3b82f6",
            "secondaryColor": "#1d4ed8",
            "approvedByDefault": true,
            "showInSearchByDefault": true
        }),
        SetupSection::Schedule => json!({
            "defaultWorkDays": [],
            "defaultStart": "",
            "defaultEnd": ""
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_color(v: &Value, key: &str) -> Result<String, String> {
    let s = parse_string_max(v, key, 7)?;
    let hex = s.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("{} must look like #rrggbb", key));
    }
    Ok(s.to_ascii_lowercase())
}

/// `HH:MM` on a 24h clock, or empty for "not set".
fn parse_clock(v: &Value, key: &str) -> Result<String, String> {
    let s = parse_string_max(v, key, 5)?;
    if s.is_empty() {
        return Ok(s);
    }
    let valid = match s.split_once(':') {
        Some((h, m)) if h.len() == 2 && m.len() == 2 => matches!(
            (h.parse::<u8>(), m.parse::<u8>()),
            (Ok(h), Ok(m)) if h < 24 && m < 60
        ),
        _ => false,
    };
    if !valid {
        return Err(format!("{} must be HH:MM", key));
    }
    Ok(s)
}

fn parse_day_list(v: &Value, key: &str) -> Result<Value, String> {
    let arr = v.as_array().ok_or_else(|| format!("{} must be an array", key))?;
    let mut days: Vec<String> = Vec::with_capacity(arr.len());
    for item in arr {
        let day = parse_string_max(item, key, 32)?;
        if day.is_empty() {
            return Err(format!("{} entries must not be empty", key));
        }
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(json!(days))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Drafts => match k.as_str() {
                "defaultSchoolType" => {
                    let s = parse_string_max(v, k, 32)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), json!(s));
                }
                "primaryColor" | "secondaryColor" => {
                    obj.insert(k.clone(), json!(parse_color(v, k)?));
                }
                "approvedByDefault" | "showInSearchByDefault" => {
                    obj.insert(k.clone(), json!(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown drafts field: {}", k)),
            },
            SetupSection::Schedule => match k.as_str() {
                "defaultWorkDays" => {
                    obj.insert(k.clone(), parse_day_list(v, k)?);
                }
                "defaultStart" | "defaultEnd" => {
                    obj.insert(k.clone(), json!(parse_clock(v, k)?));
                }
                _ => return Err(format!("unknown schedule field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: a malformed stored value falls back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Setup values a freshly created draft starts from.
pub fn draft_defaults(conn: &rusqlite::Connection) -> anyhow::Result<DraftDefaults> {
    let drafts = load_section(conn, SetupSection::Drafts)?;
    let schedule = load_section(conn, SetupSection::Schedule)?;

    let theme = match (
        str_field(&drafts, "primaryColor"),
        str_field(&drafts, "secondaryColor"),
    ) {
        (Some(primary_color), Some(secondary_color)) => Some(Theme {
            primary_color,
            secondary_color,
        }),
        _ => None,
    };
    let work_days = schedule
        .get("defaultWorkDays")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|d| d.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let start = str_field(&schedule, "defaultStart");
    let end = str_field(&schedule, "defaultEnd");
    let work_hours = (start.is_some() || end.is_some()).then(|| WorkHours {
        start: start.unwrap_or_default(),
        end: end.unwrap_or_default(),
    });

    Ok(DraftDefaults {
        school_type: str_field(&drafts, "defaultSchoolType"),
        theme,
        approved: drafts.get("approvedByDefault").and_then(|v| v.as_bool()),
        show_in_search: drafts.get("showInSearchByDefault").and_then(|v| v.as_bool()),
        work_days,
        work_hours,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
