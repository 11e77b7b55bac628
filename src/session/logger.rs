//! # JSONL Session Logger
//!
//! Appends every published update to a timestamp-named `.jsonl` file,
//! rotating after a configured number of records and pruning old files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::broker::{Subscription, TelemetryUpdate};
use crate::config::SessionLogConfig;
use crate::error::{GroundLinkError, Result};

const FILE_PREFIX: &str = "session-";
const FILE_SUFFIX: &str = ".jsonl";

/// JSONL session logger; one instance per session directory
pub struct SessionLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    file_seq: u64,
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("dir", &self.dir)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl SessionLogger {
    /// Create a logger writing into the configured directory
    ///
    /// The directory is created if missing. The first file is opened lazily
    /// on the first record, so an idle session leaves no empty files.
    pub fn new(config: &SessionLogConfig) -> Result<Self> {
        fs::create_dir_all(&config.log_dir)?;

        Ok(Self {
            dir: PathBuf::from(&config.log_dir),
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            records_in_file: 0,
            file_seq: 0,
        })
    }

    /// Append one update to the current file, rotating first if it is full
    pub fn log(&mut self, update: &TelemetryUpdate) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let entry = match &update.decoded {
            Ok(record) => json!({
                "received_at": Local::now().to_rfc3339(),
                "record": record,
                "quality": update.quality,
            }),
            Err(failure) => json!({
                "received_at": Local::now().to_rfc3339(),
                "error": failure.to_string(),
                "raw": update.raw,
                "quality": update.quality,
            }),
        };

        let writer = self.writer.as_mut().ok_or_else(|| {
            GroundLinkError::Session("rotation left no open file".to_string())
        })?;
        serde_json::to_writer(&mut *writer, &entry)
            .map_err(|e| GroundLinkError::Session(e.to_string()))?;
        writeln!(writer)?;

        self.records_in_file += 1;
        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Drain a broker subscription until the pipeline closes it
    ///
    /// Log failures are warned about and skipped; a full disk must not take
    /// the consumer down with it.
    pub async fn run(mut self, mut subscription: Subscription) {
        while let Some(update) = subscription.recv().await {
            if let Err(e) = self.log(&update) {
                warn!("session log write failed: {}", e);
            }
        }

        if let Err(e) = self.flush() {
            warn!("session log flush failed: {}", e);
        }
        info!("session log closed");
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}-{:04}{}",
            FILE_PREFIX,
            Local::now().format("%Y%m%d-%H%M%S"),
            self.file_seq,
            FILE_SUFFIX
        );
        self.file_seq += 1;

        let path = self.dir.join(&name);
        debug!("opening session log file {:?}", path);
        self.writer = Some(BufWriter::new(File::create(&path)?));
        self.records_in_file = 0;

        self.prune()?;
        Ok(())
    }

    // Keep only the newest max_files_to_keep session files. Names sort
    // chronologically, so lexicographic order is age order.
    fn prune(&self) -> Result<()> {
        let mut files = session_files(&self.dir)?;
        files.sort();

        while files.len() > self.max_files_to_keep {
            let oldest = files.remove(0);
            debug!("pruning old session log {:?}", oldest);
            fs::remove_file(oldest)?;
        }
        Ok(())
    }
}

fn session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode;
    use crate::quality::PacketQualityTracker;

    const SAMPLE: &str =
        "T1,00:00:01,1,100.0,101325,25.0,3.7,00:00:01,12.34,56.78,101,8,0,0,0,0,0,0,IDLE";

    fn update(raw: &str) -> TelemetryUpdate {
        TelemetryUpdate {
            raw: raw.to_string(),
            decoded: decode(raw),
            quality: PacketQualityTracker::new().observe(raw),
        }
    }

    fn config(dir: &Path, max_records: usize, max_files: usize) -> SessionLogConfig {
        SessionLogConfig {
            enabled: true,
            log_dir: dir.to_string_lossy().into_owned(),
            max_records_per_file: max_records,
            max_files_to_keep: max_files,
        }
    }

    #[test]
    fn test_writes_one_json_object_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(&config(dir.path(), 100, 5)).unwrap();

        logger.log(&update(SAMPLE)).unwrap();
        logger.log(&update("garbage")).unwrap();
        logger.flush().unwrap();

        let files = session_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);

        let contents = fs::read_to_string(&files[0]).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["record"]["team_id"], "T1");
        assert_eq!(first["quality"]["total_packets"], 1);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["raw"], "garbage");
        assert!(second["error"].as_str().unwrap().contains("19"));
    }

    #[test]
    fn test_rotates_after_max_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(&config(dir.path(), 2, 5)).unwrap();

        for _ in 0..5 {
            logger.log(&update(SAMPLE)).unwrap();
        }
        logger.flush().unwrap();

        // 5 records at 2 per file: three files (2 + 2 + 1).
        assert_eq!(session_files(dir.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_prunes_to_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(&config(dir.path(), 1, 2)).unwrap();

        for _ in 0..6 {
            logger.log(&update(SAMPLE)).unwrap();
        }
        logger.flush().unwrap();

        let files = session_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_no_file_until_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let _logger = SessionLogger::new(&config(dir.path(), 10, 2)).unwrap();

        assert!(session_files(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_subscription_until_close() {
        use crate::broker::TelemetryBroker;

        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::new(&config(dir.path(), 100, 2)).unwrap();

        let broker = TelemetryBroker::new(16);
        let sub = broker.subscribe();
        let task = tokio::spawn(logger.run(sub));

        broker.publish(update(SAMPLE));
        broker.publish(update(SAMPLE));
        broker.close();
        task.await.unwrap();

        let files = session_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        let contents = fs::read_to_string(&files[0]).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
