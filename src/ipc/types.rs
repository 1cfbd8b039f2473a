use crate::config::Config;
use crate::ipc::screen::Screen;
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Open admin screens keyed by screen id.
    pub screens: BTreeMap<String, Box<dyn Screen>>,
    pub next_screen: u64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            screens: BTreeMap::new(),
            next_screen: 0,
        }
    }
}
