// Append-only feedback log (JSONL)

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::FeedbackRecord;

pub struct FeedbackLog {
    file_path: PathBuf,
}

impl FeedbackLog {
    pub fn new(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        Ok(Self { file_path })
    }

    pub fn log(&self, record: &FeedbackRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .with_context(|| format!("Failed to open feedback log: {}", self.file_path.display()))?;

        let json = serde_json::to_string(record).context("Failed to serialize feedback record")?;

        writeln!(file, "{}", json).context("Failed to write feedback record")?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Load every record; a malformed line is an error
    pub fn load_all(&self) -> Result<Vec<FeedbackRecord>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.file_path).context("Failed to read feedback log")?;

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Failed to parse feedback record"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{FeedbackDetails, FeedbackType};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_log_and_reload() {
        let dir = TempDir::new().unwrap();
        let log = FeedbackLog::new(dir.path().join("nested").join("feedback.jsonl")).unwrap();
        assert!(log.load_all().unwrap().is_empty());

        let record = FeedbackRecord {
            message_id: "m1".to_string(),
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            feedback_type: FeedbackType::Helpful,
            details: FeedbackDetails::default(),
            timestamp: Utc::now(),
        };
        log.log(&record).unwrap();
        log.log(&record).unwrap();

        let records = log.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].feedback_type, FeedbackType::Helpful);
    }
}
