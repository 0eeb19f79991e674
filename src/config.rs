use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::media::DEFAULT_UPLOAD_CONCURRENCY;

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub upload_concurrency: usize,
    pub blob_dir: Option<PathBuf>,
    pub blob_base_url: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            workspace: optional("ROSTERD_WORKSPACE").map(PathBuf::from),
            upload_concurrency: try_load("ROSTERD_UPLOAD_CONCURRENCY", DEFAULT_UPLOAD_CONCURRENCY)
                .max(1),
            blob_dir: optional("ROSTERD_BLOB_DIR").map(PathBuf::from),
            blob_base_url: optional("ROSTERD_BLOB_BASE_URL"),
        }
    }

    pub fn blob_dir_for(&self, workspace: &std::path::Path) -> PathBuf {
        self.blob_dir
            .clone()
            .unwrap_or_else(|| workspace.join("blobs"))
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            info!("{key} not set");
            None
        }
    }
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}
