//! Indexing progress reporting.
//!
//! Reports what `codemate index` is doing so users can follow long jobs:
//! the repository being loaded, how many documents have been summarised,
//! and which record is being persisted ("processing n of N").
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an indexing job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexProgressEvent {
    /// Listing and fetching the repository. Total unknown.
    Loading { repository: String },
    /// `n` of `total` documents summarised and embedded (or failed).
    Generating { n: u64, total: u64 },
    /// Persisting record `n` of `total`.
    Persisting { n: u64, total: u64 },
}

/// Reports indexing progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index  persisting  12 / 40 files".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = render_human(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

fn render_human(event: &IndexProgressEvent) -> String {
    match event {
        IndexProgressEvent::Loading { repository } => {
            format!("index {}  loading...\n", repository)
        }
        IndexProgressEvent::Generating { n, total } => format!(
            "index  summarising  {} / {} files\n",
            format_number(*n),
            format_number(*total)
        ),
        IndexProgressEvent::Persisting { n, total } => format!(
            "index  persisting  {} / {} files\n",
            format_number(*n),
            format_number(*total)
        ),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Loading { repository } => serde_json::json!({
                "event": "progress",
                "repository": repository,
                "phase": "loading"
            }),
            IndexProgressEvent::Generating { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "summarising",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::Persisting { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "persisting",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
