use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::draft::Facility;
use crate::structure::EducationSystem;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Education system trees pushed in by the host, keyed by system id.
    pub systems: HashMap<String, EducationSystem>,
    pub facilities: Vec<Facility>,
}
