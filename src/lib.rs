pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod layout;
pub mod magick;
pub mod page_count;
pub mod pages;
pub mod runner;
pub mod sanitize;
pub mod util;

pub use error::{RasterError, Result};
pub use extractor::{ExtractionRequest, ExtractionSummary, Extractor, RenderJob, RenderSource};
pub use layout::{OutputLayout, SizeSpec};
pub use magick::ImageFormat;
pub use pages::{resolve, PageSet, PageSpec};
pub use runner::{CommandLine, ProcessRunner, SystemRunner};
