//! Append-only results file.
//!
//! One `identity,decision,elapsed` line per agent per round, no header.
//! Agents running in the same process share one sink.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swarm_vote_application::ports::results_sink::{ResultsError, ResultsSink, RoundRecord};
use tracing::debug;

/// Results file writer.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushed after every record.
pub struct CsvResultsSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl CsvResultsSink {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ResultsError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the results file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultsSink for CsvResultsSink {
    fn record(&self, record: &RoundRecord) -> Result<(), ResultsError> {
        let line = record.csv_line();
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        debug!(path = %self.path.display(), %line, "Recorded result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use swarm_vote_domain::AgentId;

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    #[test]
    fn test_appends_lines_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");

        let sink = CsvResultsSink::open(&path).unwrap();
        sink.record(&RoundRecord::decided(id("r1"), "x".into(), Duration::from_millis(1500)))
            .unwrap();
        sink.record(&RoundRecord::aborted(id("r2"))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "r1,x,1.5000\nr2,,0.0000\n");
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        for name in ["a", "b"] {
            let sink = CsvResultsSink::open(&path).unwrap();
            sink.record(&RoundRecord::decided(id(name), "y".into(), Duration::ZERO))
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_shared_between_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let sink = std::sync::Arc::new(CsvResultsSink::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    sink.record(&RoundRecord::decided(
                        id(&format!("robot_{i}")),
                        "z".into(),
                        Duration::from_millis(i),
                    ))
                    .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 8);
        assert!(content.lines().all(|l| l.split(',').count() == 3));
    }
}
