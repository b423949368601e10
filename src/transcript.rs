use crate::models::LogLine;

/// Append-only, render-agnostic terminal transcript for one session. Lines
/// are never removed except by `reset`, which runs exactly once per session
/// before its first event lands.
#[derive(Debug, Default, Clone)]
pub struct TerminalLog {
    lines: Vec<LogLine>,
    total_bytes: usize,
}

impl TerminalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, line: LogLine) {
        self.total_bytes = self.total_bytes.saturating_add(line.text.len());
        self.lines.push(line);
    }

    pub fn reset(&mut self) {
        self.lines.clear();
        self.total_bytes = 0;
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.clone()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total payload bytes appended since the last reset. Consumers can use
    /// this to warn about runaway output; the log itself never evicts.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
