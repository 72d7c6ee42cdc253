/// Streaming filter over tool output: drops blank lines and collapses runs of
/// identical consecutive lines. Lines are fed one at a time as they are read,
/// so a tool stuck repeating the same warning costs a single retained line.
#[derive(Debug, Clone)]
pub struct LineCollapser {
    kept: Vec<String>,
    max_lines: usize,
    omitted: u64,
}

impl Default for LineCollapser {
    fn default() -> Self {
        Self::with_limit(usize::MAX)
    }
}

impl LineCollapser {
    pub fn with_limit(max_lines: usize) -> Self {
        Self {
            kept: Vec::new(),
            max_lines: max_lines.max(1),
            omitted: 0,
        }
    }

    pub fn push(&mut self, raw: &str) {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }
        if self.kept.last().is_some_and(|last| last == line) {
            return;
        }
        if self.kept.len() >= self.max_lines {
            self.omitted += 1;
            return;
        }
        self.kept.push(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    pub fn finish(mut self) -> String {
        if self.omitted > 0 {
            self.kept
                .push(format!("... ({} further lines omitted)", self.omitted));
        }
        self.kept.join("\n")
    }
}

/// Applies [`LineCollapser`] to an already captured string.
pub fn sanitize(raw: &str) -> String {
    let mut c = LineCollapser::default();
    for line in raw.lines() {
        c.push(line);
    }
    c.finish()
}
