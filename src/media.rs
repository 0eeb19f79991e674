use crate::error::RosterResult;
use crate::filenames::parse_media_ref_index;
use crate::sources::UploadedFile;
use crate::{roster, units};
use anyhow::Context;
use futures::future::{join_all, BoxFuture};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub asset_id: String,
}

pub trait BlobStore: Send + Sync {
    fn upload<'a>(&'a self, bytes: &'a [u8]) -> BoxFuture<'a, anyhow::Result<StoredAsset>>;
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, base_url: Option<String>) -> Self {
        Self { root, base_url }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    async fn store(&self, bytes: &[u8]) -> anyhow::Result<StoredAsset> {
        let asset_id = format!("{:x}", Sha256::digest(bytes));
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create blob dir {}", self.root.to_string_lossy()))?;
        let path = self.root.join(&asset_id);
        if tokio::fs::metadata(&path).await.is_err() {
            // Readers only ever see a complete blob: write aside, then rename.
            let tmp = self.root.join(format!(".{}.{}.tmp", asset_id, Uuid::new_v4()));
            tokio::fs::write(&tmp, bytes)
                .await
                .with_context(|| format!("failed to write blob {}", tmp.to_string_lossy()))?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e)
                    .with_context(|| format!("failed to store blob {}", path.to_string_lossy()));
            }
        }
        let url = match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), asset_id),
            None => format!("file://{}", path.to_string_lossy()),
        };
        Ok(StoredAsset { url, asset_id })
    }
}

impl BlobStore for LocalBlobStore {
    fn upload<'a>(&'a self, bytes: &'a [u8]) -> BoxFuture<'a, anyhow::Result<StoredAsset>> {
        Box::pin(self.store(bytes))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub submitted: usize,
    pub matched: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// A failed upload is counted and skipped; all links are written in one transaction.
pub async fn reconcile_images(
    conn: &Connection,
    blobs: &dyn BlobStore,
    unit_id: &str,
    files: &[UploadedFile],
    concurrency: usize,
) -> RosterResult<ReconcileSummary> {
    units::require(conn, unit_id)?;

    let parsed: Vec<(&UploadedFile, Option<i64>)> = files
        .iter()
        .map(|f| (f, parse_media_ref_index(&f.name)))
        .collect();
    let candidates: Vec<i64> = parsed
        .iter()
        .filter_map(|(_, r)| *r)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let valid = roster::existing_ref_indexes(conn, unit_id, &candidates)?;

    let work: Vec<(&UploadedFile, i64)> = parsed
        .into_iter()
        .filter_map(|(f, r)| match r {
            Some(r) if valid.contains(&r) => Some((f, r)),
            _ => {
                debug!(file = %f.name, "skipping image with no matching voter");
                None
            }
        })
        .collect();

    let mut summary = ReconcileSummary {
        submitted: files.len(),
        matched: work.len(),
        ..Default::default()
    };

    let mut linked: Vec<(i64, String)> = Vec::with_capacity(work.len());
    for batch in work.chunks(concurrency.max(1)) {
        let results = join_all(batch.iter().map(|(file, ref_index)| async move {
            (*file, *ref_index, blobs.upload(&file.bytes).await)
        }))
        .await;
        for (file, ref_index, result) in results {
            match result {
                Ok(asset) => {
                    debug!(file = %file.name, ref_index, asset_id = %asset.asset_id, "uploaded image");
                    linked.push((ref_index, asset.url));
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "failed to upload image");
                    summary.failed += 1;
                }
            }
        }
    }

    if !linked.is_empty() {
        let tx = conn.unchecked_transaction()?;
        roster::bulk_set_image_urls(&tx, unit_id, &linked)?;
        tx.commit()?;
    }
    summary.uploaded = linked.len();

    info!(
        unit_id,
        submitted = summary.submitted,
        matched = summary.matched,
        uploaded = summary.uploaded,
        failed = summary.failed,
        "successfully uploaded and updated images"
    );
    Ok(summary)
}
