use crate::config::PageCount;
use crate::error::{RasterError, Result};
use crate::runner::{CommandLine, ProcessRunner};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static PAGES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").expect("static pages regex"));

pub trait PageCounter {
    fn page_count(&self, document: &Path) -> Result<u32>;
}

impl<T: PageCounter + ?Sized> PageCounter for &T {
    fn page_count(&self, document: &Path) -> Result<u32> {
        (**self).page_count(document)
    }
}

/// Reads the page count from `pdfinfo` output.
pub struct PdfinfoCounter<R: ProcessRunner> {
    runner: R,
    program: String,
    timeout: Duration,
}

impl<R: ProcessRunner> PdfinfoCounter<R> {
    pub fn new(cfg: &PageCount, runner: R) -> Self {
        Self {
            runner,
            program: cfg.pdfinfo.clone(),
            timeout: Duration::from_secs(cfg.timeout_seconds),
        }
    }
}

impl<R: ProcessRunner> PageCounter for PdfinfoCounter<R> {
    fn page_count(&self, document: &Path) -> Result<u32> {
        let mut cmd = CommandLine::new(&self.program);
        cmd.arg(document);
        let out = self.runner.run(&cmd, self.timeout)?;
        parse_page_count(&out).ok_or_else(|| RasterError::PageCount {
            document: document.to_path_buf(),
            output: out,
        })
    }
}

pub fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    PAGES_LINE
        .captures(pdfinfo_output)
        .and_then(|c| c[1].parse().ok())
}
