// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event stream.
//!
//! One stream per run, backed by `events.jsonl`. Appends assign strictly
//! increasing sequence numbers starting at 1 and reach stable storage
//! before returning, so an acknowledged event survives a crash. Readers
//! open their own handle and see a consistent prefix while appends are in
//! flight.

use crate::error::StorageError;
use parking_lot::Mutex;
use rig_core::{utc_now, Event, EventType};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

struct StreamInner {
    file: File,
    seq: u64,
}

/// Thread-safe append-only event log.
pub struct EventStream {
    path: PathBuf,
    inner: Mutex<StreamInner>,
}

impl EventStream {
    /// Open or create the stream at `path`.
    ///
    /// Existing lines are scanned to recover the sequence counter.
    /// Malformed or truncated trailing lines are skipped with a warning;
    /// the next append writes a well-formed line after them.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let seq = Self::scan(&file, &path)?;

        Ok(Self {
            path,
            inner: Mutex::new(StreamInner { file, seq }),
        })
    }

    /// Scan existing content for the highest assigned sequence number.
    fn scan(file: &File, path: &Path) -> Result<u64, StorageError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut seq = 0u64;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                // Truncated/invalid UTF-8 tail: stop counting, stream stays usable
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match Event::from_json_line(trimmed) {
                Ok(event) => seq = seq.max(event.seq),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping malformed event line",
                ),
            }
        }

        Ok(seq)
    }

    /// Append one event, assigning the next sequence number.
    ///
    /// The line is flushed and synced before this returns; a crash
    /// immediately after cannot drop an acknowledged event.
    pub fn append(
        &self,
        event_type: EventType,
        data: serde_json::Value,
    ) -> Result<Event, StorageError> {
        let mut inner = self.inner.lock();

        let event = Event {
            seq: inner.seq + 1,
            timestamp: utc_now(),
            event_type,
            data,
        };

        let mut line = event.to_json_line()?.into_bytes();
        line.push(b'\n');
        inner.file.write_all(&line)?;
        inner.file.sync_all()?;

        inner.seq = event.seq;
        Ok(event)
    }

    /// Events with `seq > after_seq`, in sequence order, as currently on
    /// disk. Malformed lines are skipped.
    pub fn events_after(&self, after_seq: u64) -> Result<Vec<Event>, StorageError> {
        // Fresh read handle so the writer's append offset is untouched
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        let mut reader = BufReader::new(file);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match Event::from_json_line(trimmed) {
                Ok(event) if event.seq > after_seq => events.push(event),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "skipping malformed event line",
                ),
            }
        }

        Ok(events)
    }

    /// All events currently on disk.
    pub fn all_events(&self) -> Result<Vec<Event>, StorageError> {
        self.events_after(0)
    }

    /// The most recent event, optionally restricted to one type.
    pub fn last_event(
        &self,
        event_type: Option<EventType>,
    ) -> Result<Option<Event>, StorageError> {
        let events = self.all_events()?;
        Ok(match event_type {
            Some(wanted) => events.into_iter().rev().find(|e| e.event_type == wanted),
            None => events.into_iter().next_back(),
        })
    }

    /// Highest sequence number assigned so far.
    pub fn current_seq(&self) -> u64 {
        self.inner.lock().seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
