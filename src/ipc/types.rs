use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::media::LocalBlobStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub runtime: tokio::runtime::Runtime,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub blobs: Option<LocalBlobStore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            runtime,
            workspace: None,
            db: None,
            blobs: None,
        })
    }
}
