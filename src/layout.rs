use crate::error::{RasterError, Result};
use crate::util::ensure_dir;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static GEOMETRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<pct>\d+(?:\.\d+)?)%|(?P<w>\d+)?(?:x(?P<h>\d+)?)?[!<>^]?)$")
        .expect("static geometry regex")
});

/// A requested output size: `original` (no resize) or a resize geometry.
/// The label doubles as the directory name when several sizes are requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SizeSpec {
    Original,
    Resize(String),
}

/// Comparable resolution key used to check rolling order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeKey {
    Original,
    Width(u32),
    Height(u32),
    Box(u32, u32),
    Percent(f64),
}

impl SizeSpec {
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("original") {
            return Ok(SizeSpec::Original);
        }
        let caps = GEOMETRY.captures(label).ok_or_else(|| RasterError::InvalidSize {
            label: label.to_string(),
        })?;
        if caps.name("pct").is_none() && caps.name("w").is_none() && caps.name("h").is_none() {
            return Err(RasterError::InvalidSize {
                label: label.to_string(),
            });
        }
        Ok(SizeSpec::Resize(label.to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            SizeSpec::Original => "original",
            SizeSpec::Resize(g) => g,
        }
    }

    /// The `-resize` argument, if any.
    pub fn geometry(&self) -> Option<&str> {
        match self {
            SizeSpec::Original => None,
            SizeSpec::Resize(g) => Some(g),
        }
    }

    pub fn key(&self) -> SizeKey {
        let SizeSpec::Resize(g) = self else {
            return SizeKey::Original;
        };
        let Some(caps) = GEOMETRY.captures(g) else {
            return SizeKey::Original;
        };
        let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(p) = caps.name("pct").and_then(|m| m.as_str().parse::<f64>().ok()) {
            return SizeKey::Percent(p);
        }
        match (num("w"), num("h")) {
            (Some(w), Some(h)) => SizeKey::Box(w, h),
            (Some(w), None) => SizeKey::Width(w),
            (None, Some(h)) => SizeKey::Height(h),
            (None, None) => SizeKey::Original,
        }
    }
}

impl SizeKey {
    /// `None` when the two keys measure different things.
    pub fn compare(&self, other: &SizeKey) -> Option<Ordering> {
        use SizeKey::*;
        match (*self, *other) {
            (Original, Original) => Some(Ordering::Equal),
            (Original, _) => Some(Ordering::Greater),
            (_, Original) => Some(Ordering::Less),
            (Width(a), Width(b)) | (Width(a), Box(b, _)) | (Box(a, _), Width(b)) => {
                Some(a.cmp(&b))
            }
            (Height(a), Height(b)) | (Height(a), Box(_, b)) | (Box(_, a), Height(b)) => {
                Some(a.cmp(&b))
            }
            (Box(aw, ah), Box(bw, bh)) => match (aw.cmp(&bw), ah.cmp(&bh)) {
                (x, y) if x == y => Some(x),
                (Ordering::Equal, y) => Some(y),
                (x, Ordering::Equal) => Some(x),
                _ => None,
            },
            (Percent(a), Percent(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for SizeSpec {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

/// Output directory per requested size. One size writes straight into the
/// root; several sizes get one subdirectory each, named after the label.
#[derive(Debug, Clone, Serialize)]
pub struct OutputLayout {
    root: PathBuf,
    dirs: Vec<(SizeSpec, PathBuf)>,
}

impl OutputLayout {
    pub fn plan(root: &Path, sizes: &[SizeSpec]) -> Self {
        let dirs = if sizes.len() <= 1 {
            sizes.iter().map(|s| (s.clone(), root.to_path_buf())).collect()
        } else {
            sizes
                .iter()
                .map(|s| (s.clone(), root.join(s.label())))
                .collect()
        };
        Self {
            root: root.to_path_buf(),
            dirs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn directory_for(&self, size: &SizeSpec) -> Option<&Path> {
        self.dirs
            .iter()
            .find(|(s, _)| s == size)
            .map(|(_, d)| d.as_path())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&SizeSpec, &Path)> {
        self.dirs.iter().map(|(s, d)| (s, d.as_path()))
    }

    /// Creates the directory for `size` if needed and returns it.
    pub fn ensure(&self, size: &SizeSpec) -> Result<PathBuf> {
        let dir = self
            .directory_for(size)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.join(size.label()));
        ensure_dir(&dir)?;
        Ok(dir)
    }
}
