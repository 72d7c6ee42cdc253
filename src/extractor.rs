use crate::{
    config::{Config, Output},
    error::{RasterError, Result},
    layout::{OutputLayout, SizeSpec},
    magick::{ImageFormat, MagickCommands},
    pages::{PageSet, PageSpec},
    page_count::PageCounter,
    runner::ProcessRunner,
    util::{document_basename, ensure_dir, page_file},
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// What to rasterize and where. Built once per invocation.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub documents: Vec<PathBuf>,
    pub output_root: PathBuf,
    pub page_spec: Option<String>,
    pub density: String,
    pub formats: Vec<ImageFormat>,
    /// Consumed in order; with `rolling`, each size is downsampled from the one before it.
    pub sizes: Vec<SizeSpec>,
    pub rolling: bool,
}

impl ExtractionRequest {
    pub fn new(documents: Vec<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            documents,
            output_root: output_root.into(),
            page_spec: None,
            density: "150".into(),
            formats: vec![ImageFormat::default()],
            sizes: Vec::new(),
            rolling: false,
        }
    }

    pub fn from_config(cfg: &Output, documents: Vec<PathBuf>) -> Result<Self> {
        let mut req = Self::new(documents, &cfg.root);
        req.density = cfg.density.clone();
        if !cfg.formats.is_empty() {
            req.formats = cfg
                .formats
                .iter()
                .map(|f| ImageFormat::parse(f))
                .collect::<Result<_>>()?;
        }
        req.sizes = cfg
            .sizes
            .iter()
            .map(|s| SizeSpec::parse(s))
            .collect::<Result<_>>()?;
        req.rolling = cfg.rolling;
        Ok(req)
    }

    /// Requested sizes, or the single unlabeled full-size output.
    pub fn effective_sizes(&self) -> Vec<SizeSpec> {
        if self.sizes.is_empty() {
            vec![SizeSpec::Original]
        } else {
            self.sizes.clone()
        }
    }

    /// Requested formats in order, first occurrence wins.
    pub fn effective_formats(&self) -> Vec<ImageFormat> {
        let mut seen = HashSet::new();
        self.formats
            .iter()
            .filter(|f| seen.insert(f.as_str().to_string()))
            .cloned()
            .collect()
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::plan(&self.output_root, &self.effective_sizes())
    }

    pub fn parsed_page_spec(&self) -> Result<Option<PageSpec>> {
        self.page_spec.as_deref().map(PageSpec::parse).transpose()
    }

    pub fn validate(&self) -> Result<()> {
        self.parsed_page_spec()?;

        let mut labels = HashSet::new();
        for size in &self.sizes {
            if !labels.insert(size.label()) {
                return Err(RasterError::DuplicateSize {
                    label: size.label().to_string(),
                });
            }
        }

        if self.rolling {
            for pair in self.sizes.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                match next.key().compare(&prev.key()) {
                    Some(Ordering::Greater) => {
                        return Err(RasterError::RollingOrder {
                            previous: prev.label().to_string(),
                            next: next.label().to_string(),
                        });
                    }
                    None => warn!(
                        "cannot compare sizes {prev} and {next}; rolling assumes {next} is smaller"
                    ),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderSource {
    Document,
    PreviousSize { size: SizeSpec, directory: PathBuf },
}

/// One (document, size, format) step of an extraction pass.
#[derive(Debug, Clone, Serialize)]
pub struct RenderJob {
    pub document: PathBuf,
    pub size: SizeSpec,
    pub format: ImageFormat,
    pub pages: PageSet,
    pub density: String,
    pub output_dir: PathBuf,
    pub source: RenderSource,
}

impl RenderJob {
    pub fn output_files(&self) -> Vec<PathBuf> {
        let basename = document_basename(&self.document);
        self.pages
            .iter()
            .map(|p| page_file(&self.output_dir, &basename, p, self.format.as_str()))
            .collect()
    }
}

/// Expands a document into its ordered render jobs: sizes in request order,
/// formats in request order within each size.
pub fn render_jobs(
    req: &ExtractionRequest,
    layout: &OutputLayout,
    document: &Path,
    pages: &PageSet,
) -> Vec<RenderJob> {
    let mut jobs = Vec::new();
    let mut previous: Option<(SizeSpec, PathBuf)> = None;
    for size in req.effective_sizes() {
        let dir = layout
            .directory_for(&size)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| layout.root().join(size.label()));
        for format in req.effective_formats() {
            let source = match &previous {
                Some((prev, prev_dir)) => RenderSource::PreviousSize {
                    size: prev.clone(),
                    directory: prev_dir.clone(),
                },
                None => RenderSource::Document,
            };
            jobs.push(RenderJob {
                document: document.to_path_buf(),
                size: size.clone(),
                format,
                pages: pages.clone(),
                density: req.density.clone(),
                output_dir: dir.clone(),
                source,
            });
        }
        if req.rolling {
            previous = Some((size, dir));
        }
    }
    jobs
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document: PathBuf,
    pub pages: PageSet,
    pub files: Vec<PathBuf>,
    pub invocations: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionSummary {
    pub documents: Vec<DocumentReport>,
}

impl ExtractionSummary {
    pub fn invocations(&self) -> usize {
        self.documents.iter().map(|d| d.invocations).sum()
    }
}

pub struct Extractor<R: ProcessRunner, P: PageCounter> {
    commands: MagickCommands,
    runner: R,
    counter: P,
    timeout: Duration,
    scratch_root: Option<PathBuf>,
}

impl<R: ProcessRunner, P: PageCounter> Extractor<R, P> {
    pub fn new(cfg: &Config, runner: R, counter: P) -> Self {
        let commands = MagickCommands::new(&cfg.engine, &cfg.quality);
        let scratch_root = if cfg.paths.scratch_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&cfg.paths.scratch_dir))
        };
        Self {
            timeout: commands.timeout(),
            commands,
            runner,
            counter,
            scratch_root,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Processes every document in order, stopping at the first failure.
    pub fn extract(&self, req: &ExtractionRequest) -> Result<ExtractionSummary> {
        req.validate()?;
        let layout = req.layout();
        let mut summary = ExtractionSummary::default();
        for document in &req.documents {
            summary
                .documents
                .push(self.extract_document(req, &layout, document)?);
        }
        Ok(summary)
    }

    pub fn resolve_pages(&self, req: &ExtractionRequest, document: &Path) -> Result<PageSet> {
        match req.parsed_page_spec()? {
            Some(spec) if !spec.is_open_ended() => Ok(spec.resolve(0)),
            Some(spec) => Ok(spec.resolve(self.counter.page_count(document)?)),
            None => Ok(PageSet::all(self.counter.page_count(document)?)),
        }
    }

    /// Resolves pages and lists the jobs for each document without running them.
    pub fn plan(&self, req: &ExtractionRequest) -> Result<Vec<RenderJob>> {
        req.validate()?;
        let layout = req.layout();
        let mut jobs = Vec::new();
        for document in &req.documents {
            let pages = self.resolve_pages(req, document)?;
            jobs.extend(render_jobs(req, &layout, document, &pages));
        }
        Ok(jobs)
    }

    pub fn extract_document(
        &self,
        req: &ExtractionRequest,
        layout: &OutputLayout,
        document: &Path,
    ) -> Result<DocumentReport> {
        let pages = self.resolve_pages(req, document)?;
        info!(
            "document {} pages={} rolling={}",
            document.display(),
            pages.len(),
            req.rolling
        );

        let mut report = DocumentReport {
            document: document.to_path_buf(),
            pages: pages.clone(),
            files: Vec::new(),
            invocations: 0,
        };

        for job in render_jobs(req, layout, document, &pages) {
            ensure_dir(&job.output_dir)?;
            info!(
                "render size={} format={} from={} dir={}",
                job.size,
                job.format,
                match &job.source {
                    RenderSource::Document => "document".to_string(),
                    RenderSource::PreviousSize { size, .. } => size.to_string(),
                },
                job.output_dir.display()
            );
            let (files, invocations) = self.render(&job)?;
            report.files.extend(files);
            report.invocations += invocations;
        }

        Ok(report)
    }

    fn render(&self, job: &RenderJob) -> Result<(Vec<PathBuf>, usize)> {
        let scratch = self.scratch_dir()?;
        let result = match &job.source {
            RenderSource::Document => self.render_pages(job, scratch.path()),
            RenderSource::PreviousSize { size, directory } => {
                self.downsample(job, size, directory, scratch.path())
            }
        };
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("removing scratch dir {}: {e}", scratch_path.display());
        }
        result
    }

    fn render_pages(&self, job: &RenderJob, scratch: &Path) -> Result<(Vec<PathBuf>, usize)> {
        let outputs = job.output_files();
        for (page, out_file) in job.pages.iter().zip(&outputs) {
            let cmd = self.commands.render_page(job, page, out_file, scratch);
            self.runner.run(&cmd, self.timeout)?;
        }
        let n = outputs.len();
        Ok((outputs, n))
    }

    fn downsample(
        &self,
        job: &RenderJob,
        previous: &SizeSpec,
        previous_dir: &Path,
        scratch: &Path,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let basename = document_basename(&job.document);
        let sources: Vec<PathBuf> = job
            .pages
            .iter()
            .map(|p| page_file(previous_dir, &basename, p, job.format.as_str()))
            .collect();

        let missing: Vec<PathBuf> = sources.iter().filter(|p| !p.is_file()).cloned().collect();
        if !missing.is_empty() {
            return Err(RasterError::IncompleteRollingSource {
                size: previous.label().to_string(),
                missing,
            });
        }

        let targets = job.output_files();
        for (src, dst) in sources.iter().zip(&targets) {
            std::fs::copy(src, dst).map_err(|e| {
                RasterError::io(format!("copy {} -> {}", src.display(), dst.display()), e)
            })?;
        }

        if targets.is_empty() {
            debug!("no pages to downsample for size {}", job.size);
            return Ok((targets, 0));
        }

        let cmd = self.commands.downsample(job, &targets, scratch);
        self.runner.run(&cmd, self.timeout)?;
        Ok((targets, 1))
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docraster-");
        match &self.scratch_root {
            Some(root) => {
                ensure_dir(root)?;
                builder
                    .tempdir_in(root)
                    .map_err(|e| RasterError::io(format!("scratch dir in {}", root.display()), e))
            }
            None => builder
                .tempdir()
                .map_err(|e| RasterError::io("scratch dir", e)),
        }
    }
}
