// Audit persistence
//
// The JSONL store never rewrites a line: outcome changes are appended as
// amendment records and folded over the original on read.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::CrisisEvent;

pub trait AuditStore: Send + Sync {
    fn append(&self, event: &CrisisEvent) -> Result<()>;

    /// Persist a new version of an existing event
    fn amend(&self, event: &CrisisEvent) -> Result<()>;

    /// All events, latest version of each, in insertion order
    fn all(&self) -> Result<Vec<CrisisEvent>>;
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    events: Mutex<Vec<CrisisEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, event: &CrisisEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("audit store lock poisoned"))?;
        events.push(event.clone());
        Ok(())
    }

    fn amend(&self, event: &CrisisEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("audit store lock poisoned"))?;
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => anyhow::bail!("audit event not found: {}", event.id),
        }
    }

    fn all(&self) -> Result<Vec<CrisisEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("audit store lock poisoned"))?;
        Ok(events.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum AuditRecord {
    Event { event: CrisisEvent },
    Amendment { event: CrisisEvent },
}

/// Append-only JSONL file store
pub struct JsonlAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &AuditRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("audit file lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;

        let json = serde_json::to_string(record).context("Failed to serialize audit record")?;
        writeln!(file, "{}", json).context("Failed to write audit record")?;
        file.sync_data().context("Failed to sync audit log")?;

        Ok(())
    }
}

impl AuditStore for JsonlAuditStore {
    fn append(&self, event: &CrisisEvent) -> Result<()> {
        self.write_record(&AuditRecord::Event {
            event: event.clone(),
        })
    }

    fn amend(&self, event: &CrisisEvent) -> Result<()> {
        self.write_record(&AuditRecord::Amendment {
            event: event.clone(),
        })
    }

    fn all(&self) -> Result<Vec<CrisisEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;

        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, CrisisEvent> = HashMap::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("Failed to read audit log")?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = line_no + 1, error = %e, "Skipping unreadable audit line");
                    continue;
                }
            };
            match record {
                AuditRecord::Event { event } => {
                    if !latest.contains_key(&event.id) {
                        order.push(event.id.clone());
                    }
                    latest.insert(event.id.clone(), event);
                }
                AuditRecord::Amendment { event } => {
                    if latest.contains_key(&event.id) {
                        latest.insert(event.id.clone(), event);
                    }
                }
            }
        }

        Ok(order.into_iter().filter_map(|id| latest.remove(&id)).collect())
    }
}
