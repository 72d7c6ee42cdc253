use crate::error::{RasterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ascending, deduplicated, 1-based page numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSet(Vec<u32>);

impl PageSet {
    pub fn all(total_pages: u32) -> Self {
        PageSet((1..=total_pages).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl FromIterator<u32> for PageSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let set: BTreeSet<u32> = iter.into_iter().collect();
        PageSet(set.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Single(u32),
    Range(u32, u32),
    From(u32),
}

/// A parsed page specification such as `1-3,5,9-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    raw: String,
    tokens: Vec<Token>,
}

impl PageSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let token = match part.split_once('-') {
                None => Token::Single(page_number(spec, part, part)?),
                Some((start, end)) => {
                    let start = page_number(spec, part, start)?;
                    if end.trim().is_empty() {
                        Token::From(start)
                    } else {
                        Token::Range(start, page_number(spec, part, end)?)
                    }
                }
            };
            tokens.push(token);
        }
        Ok(Self {
            raw: spec.to_string(),
            tokens,
        })
    }

    /// Whether resolving this spec requires the document's page count.
    pub fn is_open_ended(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::From(_)))
    }

    pub fn resolve(&self, total_pages: u32) -> PageSet {
        self.tokens
            .iter()
            .flat_map(|t| match *t {
                Token::Single(p) => p..=p,
                // reversed ranges come out empty
                Token::Range(a, b) => a..=b,
                Token::From(a) => a..=total_pages,
            })
            .collect()
    }
}

impl fmt::Display for PageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Highest page number a spec may name. Bounds what a closed range can expand
/// to before any document is looked at.
pub const MAX_PAGE: u32 = 100_000;

fn page_number(spec: &str, token: &str, raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_PAGE).contains(&n) => Ok(n),
        _ => Err(RasterError::InvalidPageSpec {
            spec: spec.to_string(),
            token: token.to_string(),
        }),
    }
}

/// Expands `spec` into a page set; `None` selects every page of the document.
pub fn resolve(spec: Option<&str>, total_pages: u32) -> Result<PageSet> {
    match spec {
        None => Ok(PageSet::all(total_pages)),
        Some(s) => Ok(PageSpec::parse(s)?.resolve(total_pages)),
    }
}
