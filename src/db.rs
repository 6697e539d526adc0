use crate::draft::OnboardingDraft;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("onboarding.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS drafts(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            data TEXT NOT NULL,
            current_step INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            submitted_at TEXT,
            last_error TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_drafts_updated ON drafts(updated_at)",
        [],
    )?;

    Ok(conn)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMeta {
    pub id: String,
    pub label: String,
    pub current_step: u8,
    pub created_at: String,
    pub updated_at: String,
    pub submitted_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftRow {
    pub meta: DraftMeta,
    pub draft: OnboardingDraft,
}

const META_COLUMNS: &str =
    "id, label, current_step, created_at, updated_at, submitted_at, last_error";

fn meta_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DraftMeta> {
    let step: i64 = row.get(2)?;
    Ok(DraftMeta {
        id: row.get(0)?,
        label: row.get(1)?,
        current_step: step.clamp(1, 8) as u8,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        submitted_at: row.get(5)?,
        last_error: row.get(6)?,
    })
}

pub fn draft_insert(conn: &Connection, label: &str, draft: &OnboardingDraft) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let ts = now();
    conn.execute(
        "INSERT INTO drafts(id, label, data, current_step, created_at, updated_at)
         VALUES(?, ?, ?, 1, ?, ?)",
        (&id, label, serde_json::to_string(draft)?, &ts, &ts),
    )?;
    Ok(id)
}

pub fn draft_load(conn: &Connection, id: &str) -> anyhow::Result<Option<DraftRow>> {
    let sql = format!("SELECT {}, data FROM drafts WHERE id = ?", META_COLUMNS);
    let row: Option<(DraftMeta, String)> = conn
        .query_row(&sql, [id], |r| Ok((meta_from_row(r)?, r.get(7)?)))
        .optional()?;
    match row {
        Some((meta, data)) => Ok(Some(DraftRow {
            meta,
            draft: serde_json::from_str(&data)?,
        })),
        None => Ok(None),
    }
}

pub fn draft_save(conn: &Connection, id: &str, draft: &OnboardingDraft) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE drafts SET data = ?, updated_at = ? WHERE id = ?",
        (serde_json::to_string(draft)?, now(), id),
    )?;
    Ok(())
}

pub fn draft_set_step(conn: &Connection, id: &str, step: u8) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE drafts SET current_step = ?, updated_at = ? WHERE id = ?",
        (step as i64, now(), id),
    )?;
    Ok(())
}

pub fn draft_list(conn: &Connection) -> anyhow::Result<Vec<DraftMeta>> {
    let sql = format!(
        "SELECT {} FROM drafts ORDER BY updated_at DESC, id",
        META_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], meta_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn draft_delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM drafts WHERE id = ?", [id])?;
    Ok(n > 0)
}

/// Records the outcome of the host's submission POST. A failure keeps the form
/// data as it is so the user can retry.
pub fn draft_record_submission(
    conn: &Connection,
    id: &str,
    outcome: Result<(), &str>,
) -> anyhow::Result<()> {
    let ts = now();
    match outcome {
        Ok(()) => conn.execute(
            "UPDATE drafts SET submitted_at = ?, last_error = NULL, updated_at = ? WHERE id = ?",
            (&ts, &ts, id),
        )?,
        Err(message) => conn.execute(
            "UPDATE drafts SET last_error = ?, updated_at = ? WHERE id = ?",
            (message, &ts, id),
        )?,
    };
    Ok(())
}
