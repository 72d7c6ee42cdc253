use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub page_count: PageCount,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub root: String,
    pub density: String,
    pub formats: Vec<String>,
    pub sizes: Vec<String>,
    pub rolling: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            root: ".".into(),
            density: "150".into(),
            formats: vec!["png".into()],
            sizes: Vec::new(),
            rolling: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    /// argv prefix for fresh renders, e.g. ["gm", "convert"].
    pub convert: Vec<String>,
    /// argv prefix for in-place downsampling.
    pub mogrify: Vec<String>,
    pub memory_limit: String,
    pub map_limit: String,
    pub temp_env: String,
    pub thread_env: String,
    pub threads: u32,
    pub timeout_seconds: u64,
    pub unsharp: String,
    pub max_output_lines: usize,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            convert: vec!["convert".into()],
            mogrify: vec!["mogrify".into()],
            memory_limit: "256MiB".into(),
            map_limit: "512MiB".into(),
            temp_env: "MAGICK_TEMPORARY_PATH".into(),
            thread_env: "OMP_NUM_THREADS".into(),
            threads: 2,
            timeout_seconds: 300,
            unsharp: "0x0.5+0.75".into(),
            max_output_lines: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Quality {
    pub jpeg: u32,
    pub png: u32,
}
impl Default for Quality {
    fn default() -> Self {
        Self { jpeg: 85, png: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageCount {
    pub pdfinfo: String,
    pub timeout_seconds: u64,
}
impl Default for PageCount {
    fn default() -> Self {
        Self {
            pdfinfo: "pdfinfo".into(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Parent of the per-job scratch directories. Empty means the system temp dir.
    pub scratch_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
