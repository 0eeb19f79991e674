use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum FileSource {
    Paths(Vec<PathBuf>),
    Folder(PathBuf),
    Archive(PathBuf),
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn read_file(path: &Path) -> anyhow::Result<UploadedFile> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("not a file path: {}", path.to_string_lossy()))?
        .to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    Ok(UploadedFile { name, bytes })
}

impl FileSource {
    pub fn load(&self) -> anyhow::Result<Vec<UploadedFile>> {
        match self {
            FileSource::Paths(paths) => paths.iter().map(|p| read_file(p)).collect(),
            FileSource::Folder(folder) => {
                let mut paths = Vec::new();
                let entries = std::fs::read_dir(folder)
                    .with_context(|| format!("failed to read folder {}", folder.to_string_lossy()))?;
                for ent in entries {
                    let p = ent?.path();
                    if p.is_file() {
                        paths.push(p);
                    }
                }
                paths.sort();
                paths.iter().map(|p| read_file(p)).collect()
            }
            FileSource::Archive(archive) => {
                let f = File::open(archive)
                    .with_context(|| format!("failed to open archive {}", archive.to_string_lossy()))?;
                let mut zip = ZipArchive::new(f).context("failed to read zip archive")?;
                let mut out = Vec::new();
                for i in 0..zip.len() {
                    let mut entry = zip.by_index(i)?;
                    if entry.is_dir() {
                        continue;
                    }
                    let name = base_name(entry.name()).to_string();
                    // macOS resource forks ride along in archives made by Finder.
                    if name.is_empty() || name.starts_with("._") {
                        continue;
                    }
                    let mut bytes = Vec::with_capacity(entry.size() as usize);
                    entry
                        .read_to_end(&mut bytes)
                        .with_context(|| format!("failed to read archive entry {}", name))?;
                    out.push(UploadedFile { name, bytes });
                }
                out.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(out)
            }
        }
    }
}
