//! Stdio grouping: folds line events into an ordered, append-only transcript.
//!
//! Consecutive stdout lines merge into one [`StdoutGroup`]; stderr lines and
//! stdin prompts are standalone entries that close any open group. The number
//! of top-level entries therefore tracks interruptions rather than lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioKind {
    Stdout,
    Stderr,
}

/// One line reported by the process host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioEvent {
    pub kind: StdioKind,
    pub text: String,
    pub is_prompt: bool,
}

impl StdioEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            kind: StdioKind::Stdout,
            text: text.into(),
            is_prompt: false,
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            kind: StdioKind::Stderr,
            text: text.into(),
            is_prompt: false,
        }
    }

    pub fn prompt(kind: StdioKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            is_prompt: true,
        }
    }
}

/// A run of consecutive stdout lines with no intervening stderr or prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdoutGroup {
    children: Vec<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl StdoutGroup {
    pub fn open(line: String, now: DateTime<Utc>) -> Self {
        Self {
            children: vec![line],
            start_time: now,
            end_time: now,
        }
    }

    /// Appends a line. `end_time` never moves before `start_time`, even if the
    /// caller's clock steps backward.
    pub fn push(&mut self, line: String, now: DateTime<Utc>) {
        self.children.push(line);
        self.end_time = now.max(self.start_time);
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Arrival rate over the group's lifetime. `None` when every line arrived
    /// at the same instant.
    pub fn lines_per_second(&self) -> Option<f64> {
        let window_ms = (self.end_time - self.start_time).num_milliseconds();
        if window_ms <= 0 {
            return None;
        }
        Some(self.children.len() as f64 * 1000.0 / window_ms as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdinPrompt {
    prompt: String,
    response: Option<String>,
}

impl StdinPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }

    // Only the prompt resolver writes this, after its consistency checks.
    pub(crate) fn set_response(&mut self, response: String) {
        self.response = Some(response);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    StdoutGroup(StdoutGroup),
    Stderr { text: String },
    Stdin(StdinPrompt),
}

impl TranscriptEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptEntry::StdoutGroup(_) => "stdout_group",
            TranscriptEntry::Stderr { .. } => "stderr",
            TranscriptEntry::Stdin(_) => "stdin",
        }
    }

    pub fn as_stdout_group(&self) -> Option<&StdoutGroup> {
        match self {
            TranscriptEntry::StdoutGroup(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_prompt(&self) -> Option<&StdinPrompt> {
        match self {
            TranscriptEntry::Stdin(prompt) => Some(prompt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one logical unit and returns the index of the entry it landed in.
    pub fn ingest(&mut self, event: StdioEvent, now: DateTime<Utc>) -> usize {
        if event.is_prompt {
            self.entries
                .push(TranscriptEntry::Stdin(StdinPrompt::new(event.text)));
            return self.entries.len() - 1;
        }

        match event.kind {
            StdioKind::Stderr => {
                self.entries
                    .push(TranscriptEntry::Stderr { text: event.text });
            }
            StdioKind::Stdout => {
                if let Some(TranscriptEntry::StdoutGroup(group)) = self.entries.last_mut() {
                    group.push(event.text, now);
                } else {
                    self.entries
                        .push(TranscriptEntry::StdoutGroup(StdoutGroup::open(event.text, now)));
                }
            }
        }
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TranscriptEntry> {
        self.entries.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut TranscriptEntry> {
        self.entries.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the most recent prompt entry, resolved or not.
    pub fn last_prompt_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| matches!(entry, TranscriptEntry::Stdin(_)))
    }

    /// Index of the actionable prompt: the most recent prompt, if unresolved.
    pub fn pending_prompt_index(&self) -> Option<usize> {
        let index = self.last_prompt_index()?;
        match &self.entries[index] {
            TranscriptEntry::Stdin(prompt) if !prompt.is_resolved() => Some(index),
            _ => None,
        }
    }

    /// Total stdout lines across all groups.
    pub fn stdout_line_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(TranscriptEntry::as_stdout_group)
            .map(StdoutGroup::len)
            .sum()
    }
}
