//! Persistent usage metrics
//!
//! One JSONL file under the data directory, one `{ts, handle, outcome}`
//! object per line, appended synchronously and flushed so a crash loses
//! at most the in-flight record. The file is read once at startup to
//! compute preload rankings; the router never rotates or trims it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a server's use within a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// One append-only usage event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Epoch milliseconds
    pub ts: i64,
    pub handle: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Clone)]
struct HandleStats {
    successes: u64,
    failures: u64,
    last_success_ts: Option<i64>,
}

struct MetricsInner {
    writer: Option<File>,
    stats: HashMap<String, HandleStats>,
}

/// Append-only usage log with lifetime success rankings
pub struct UsageMetrics {
    path: PathBuf,
    inner: Mutex<MetricsInner>,
}

impl UsageMetrics {
    /// Create a metrics store backed by the given file path. No I/O
    /// happens until `load`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: Mutex::new(MetricsInner {
                writer: None,
                stats: HashMap::new(),
            }),
        }
    }

    /// Read the metrics file and open it for appending.
    ///
    /// Malformed lines (e.g. a truncated final line from a crashed
    /// process) are skipped with a single warning so startup never blocks
    /// on a damaged file. Returns the number of events loaded.
    pub fn load(&self) -> Result<usize> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut inner = self.inner.lock().unwrap();
        let mut loaded = 0usize;
        let mut malformed = 0usize;

        if self.path.exists() {
            let reader = BufReader::new(File::open(&self.path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<UsageRecord>(&line) {
                    Ok(record) => {
                        apply(&mut inner.stats, &record);
                        loaded += 1;
                    }
                    Err(_) => malformed += 1,
                }
            }
        }

        if malformed > 0 {
            warn!(
                "Skipped {} malformed line(s) in metrics file '{}'",
                malformed,
                self.path.display()
            );
        }

        inner.writer = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        );

        info!(
            "Loaded {} usage event(s) from '{}'",
            loaded,
            self.path.display()
        );
        Ok(loaded)
    }

    /// Append one event and flush.
    ///
    /// Write failures are logged and absorbed; the in-memory stats keep
    /// working so the current process still ranks correctly.
    pub fn log(&self, handle: &str, outcome: Outcome) {
        let record = UsageRecord {
            ts: chrono::Utc::now().timestamp_millis(),
            handle: handle.to_string(),
            outcome,
        };

        let mut inner = self.inner.lock().unwrap();
        apply(&mut inner.stats, &record);

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize usage record: {}", e);
                return;
            }
        };

        if let Some(writer) = inner.writer.as_mut() {
            if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                warn!(
                    "Failed to append usage record to '{}': {}",
                    self.path.display(),
                    e
                );
            }
        } else {
            debug!("Metrics file not open; recorded '{}' in memory only", handle);
        }
    }

    /// Top-N handles by lifetime success count, tie-broken by most recent
    /// success timestamp, then by `catalog_order`. Handles with only
    /// failures rank below any handle with at least one success; handles
    /// never observed do not appear.
    pub fn rank_top(&self, n: usize, catalog_order: &[String]) -> Vec<String> {
        let inner = self.inner.lock().unwrap();

        // Iterate catalog order so the stable sort preserves it on full ties.
        let mut ranked: Vec<(&String, &HandleStats)> = catalog_order
            .iter()
            .filter_map(|h| inner.stats.get_key_value(h))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.successes
                .cmp(&a.1.successes)
                .then(b.1.last_success_ts.cmp(&a.1.last_success_ts))
        });

        ranked
            .into_iter()
            .take(n)
            .map(|(handle, _)| handle.clone())
            .collect()
    }

    /// Lifetime success count for a handle
    pub fn success_count(&self, handle: &str) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .stats
            .get(handle)
            .map(|s| s.successes)
            .unwrap_or(0)
    }

    /// Close the append handle, flushing any buffered data
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut writer) = inner.writer.take() {
            let _ = writer.flush();
        }
    }
}

fn apply(stats: &mut HashMap<String, HandleStats>, record: &UsageRecord) {
    let entry = stats.entry(record.handle.clone()).or_default();
    match record.outcome {
        Outcome::Success => {
            entry.successes += 1;
            entry.last_success_ts = Some(record.ts.max(entry.last_success_ts.unwrap_or(i64::MIN)));
        }
        Outcome::Failure => entry.failures += 1,
    }
}
