//! File-based audit store implementation (JSON Lines)

use crate::query::AuditQuery;
use crate::record::{now_millis, AuditDraft, AuditRecord, AuditRecordId};
use crate::store::{AuditError, AuditResult, AuditStore};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

struct Writer {
    file: Option<BufWriter<File>>,
    last_id: AuditRecordId,
}

/// Append-only audit store writing one JSON record per line.
///
/// Reopening an existing file continues the id sequence after the highest id
/// found in it. Lines that fail to parse are skipped with a warning.
pub struct FileAuditStore {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl FileAuditStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuditError::IoError(format!("Failed to create directories: {}", e))
                })?;
            }
        }

        let last_id = read_records(&path)?
            .iter()
            .map(|r| r.id)
            .max()
            .unwrap_or(0);
        let file = open_append(&path)?;

        tracing::debug!(path = %path.display(), last_id, "Opened audit log file");

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file: Some(file),
                last_id,
            }),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, Writer>> {
        self.writer
            .lock()
            .map_err(|e| AuditError::WriteError(format!("Failed to acquire lock: {}", e)))
    }

    /// Flush pending writes and read every record back.
    fn read_all(&self) -> AuditResult<Vec<AuditRecord>> {
        let mut writer = self.lock()?;
        if let Some(file) = writer.file.as_mut() {
            file.flush()
                .map_err(|e| AuditError::IoError(format!("Failed to flush: {}", e)))?;
        }
        read_records(&self.path)
    }
}

fn open_append(path: &Path) -> AuditResult<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| AuditError::IoError(format!("Failed to open file: {}", e)))
}

fn read_records(path: &Path) -> AuditResult<Vec<AuditRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AuditError::IoError(format!("Failed to open file for reading: {}", e)))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| AuditError::IoError(format!("Failed to read line: {}", e)))?;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<AuditRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping unreadable audit record");
            }
        }
    }

    Ok(records)
}

impl AuditStore for FileAuditStore {
    fn create(&self, draft: AuditDraft) -> AuditResult<AuditRecord> {
        let mut writer = self.lock()?;

        let record = draft.into_record(writer.last_id + 1, now_millis());
        let json = record
            .to_json()
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;

        let file = writer
            .file
            .as_mut()
            .ok_or_else(|| AuditError::WriteError("File not open".to_string()))?;
        writeln!(file, "{}", json)
            .map_err(|e| AuditError::IoError(format!("Failed to write: {}", e)))?;

        writer.last_id = record.id;
        Ok(record)
    }

    fn get(&self, id: AuditRecordId) -> AuditResult<Option<AuditRecord>> {
        Ok(self.read_all()?.into_iter().find(|r| r.id == id))
    }

    fn execute_query(&self, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        Ok(query.apply(&self.read_all()?))
    }

    fn count(&self, query: &AuditQuery) -> AuditResult<usize> {
        Ok(self.read_all()?.iter().filter(|r| query.matches(r)).count())
    }

    fn total_count(&self) -> AuditResult<usize> {
        Ok(self.read_all()?.len())
    }

    fn clear(&self) -> AuditResult<()> {
        let mut writer = self.lock()?;
        writer.file = None;

        File::create(&self.path)
            .map_err(|e| AuditError::IoError(format!("Failed to clear file: {}", e)))?;

        writer.file = Some(open_append(&self.path)?);
        Ok(())
    }

    fn flush(&self) -> AuditResult<()> {
        let mut writer = self.lock()?;
        if let Some(file) = writer.file.as_mut() {
            file.flush()
                .map_err(|e| AuditError::IoError(format!("Failed to flush: {}", e)))?;
        }
        Ok(())
    }
}
