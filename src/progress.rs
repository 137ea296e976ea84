//! Sync progress reporting.
//!
//! Reports what `harvest sync` is doing (which repository and entity, how
//! many new entities are left to analyse) on **stderr**, so stdout stays
//! parseable for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// Listing remote entities. Total unknown.
    Listing { repository: String, entity: String },
    /// Analysing new entities: n done out of total.
    Analysing {
        repository: String,
        entity: String,
        n: u64,
        total: u64,
    },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress: "sync org/repo PullRequest  analysing  12 / 1,500".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Listing { repository, entity } => {
                format!("sync {} {}  listing...\n", repository, entity)
            }
            SyncProgressEvent::Analysing {
                repository,
                entity,
                n,
                total,
            } => format!(
                "sync {} {}  analysing  {} / {}\n",
                repository,
                entity,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Listing { repository, entity } => serde_json::json!({
                "event": "progress",
                "repository": repository,
                "entity": entity,
                "phase": "listing"
            }),
            SyncProgressEvent::Analysing {
                repository,
                entity,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "repository": repository,
                "entity": entity,
                "phase": "analysing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
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

    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
