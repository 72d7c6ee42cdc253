use crate::error::{RasterError, Result};
use std::path::{Path, PathBuf};

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).map_err(|e| RasterError::io(format!("create_dir_all {}", p.display()), e))
}

/// File stem used for output names: `report.pdf` -> `report`.
pub fn document_basename(document: &Path) -> String {
    document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string())
}

pub fn page_file(dir: &Path, basename: &str, page: u32, format: &str) -> PathBuf {
    dir.join(format!("{basename}_{page}.{format}"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
