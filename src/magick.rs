use crate::config::{Engine, Quality};
use crate::error::{RasterError, Result};
use crate::extractor::RenderJob;
use crate::runner::CommandLine;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("static format regex"));

/// Output image format identifier, lowercased (`png`, `jpg`, `gif`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageFormat(String);

impl ImageFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        let f = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        if FORMAT.is_match(&f) {
            Ok(ImageFormat(f))
        } else {
            Err(RasterError::InvalidFormat {
                format: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_jpeg(&self) -> bool {
        matches!(self.0.as_str(), "jpg" | "jpeg" | "jpe" | "jfif")
    }

    fn is_png(&self) -> bool {
        self.0.starts_with("png")
    }
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat("png".into())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

/// Builds `convert`/`mogrify` invocations for an ImageMagick-compatible engine.
#[derive(Debug, Clone)]
pub struct MagickCommands {
    engine: Engine,
    quality: Quality,
}

impl MagickCommands {
    pub fn new(engine: &Engine, quality: &Quality) -> Self {
        Self {
            engine: engine.clone(),
            quality: quality.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.engine.timeout_seconds)
    }

    pub fn quality_for(&self, format: &ImageFormat) -> Option<u32> {
        if format.is_jpeg() {
            Some(self.quality.jpeg)
        } else if format.is_png() {
            Some(self.quality.png)
        } else {
            None
        }
    }

    /// `convert <limits> -density D [-resize S] [-quality Q] doc[idx] out`
    pub fn render_page(
        &self,
        job: &RenderJob,
        page: u32,
        out_file: &Path,
        scratch: &Path,
    ) -> CommandLine {
        let mut cmd = CommandLine::from_prefix(&self.engine.convert);
        self.common_args(&mut cmd, job);
        let mut source = job.document.as_os_str().to_os_string();
        source.push(format!("[{}]", page.saturating_sub(1)));
        cmd.arg(source).arg(out_file);
        self.job_env(&mut cmd, scratch);
        cmd
    }

    /// `mogrify <limits> -density D -resize S [-quality Q] -unsharp U files...`
    pub fn downsample(&self, job: &RenderJob, files: &[PathBuf], scratch: &Path) -> CommandLine {
        let mut cmd = CommandLine::from_prefix(&self.engine.mogrify);
        self.common_args(&mut cmd, job);
        cmd.arg("-unsharp").arg(&self.engine.unsharp);
        cmd.args(files);
        self.job_env(&mut cmd, scratch);
        cmd
    }

    fn common_args(&self, cmd: &mut CommandLine, job: &RenderJob) {
        cmd.args(["-limit", "memory", self.engine.memory_limit.as_str()]);
        cmd.args(["-limit", "map", self.engine.map_limit.as_str()]);
        cmd.arg("-density").arg(&job.density);
        if let Some(g) = job.size.geometry() {
            cmd.arg("-resize").arg(g);
        }
        if let Some(q) = self.quality_for(&job.format) {
            cmd.arg("-quality").arg(q.to_string());
        }
    }

    fn job_env(&self, cmd: &mut CommandLine, scratch: &Path) {
        if !self.engine.temp_env.is_empty() {
            cmd.env(&self.engine.temp_env, scratch);
        }
        if !self.engine.thread_env.is_empty() {
            cmd.env(&self.engine.thread_env, self.engine.threads.to_string());
        }
    }

    pub fn version_check(&self, which: &[String]) -> CommandLine {
        let mut cmd = CommandLine::from_prefix(which);
        cmd.arg("-version");
        cmd
    }
}
