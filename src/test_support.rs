//! In-memory doubles shared by the unit tests.

use crate::error::TrackerError;
use crate::replay::{MatchFile, ReplayReader};
use crate::scoreboard::{Document, DocumentStore};
use crate::status::StatusSink;
use crate::types::*;
use crate::watcher::EventSource;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

// ── Fixtures ───────────────────────────────────────────────────────────

pub fn participant(code: &str, port: u8) -> MatchParticipant {
    MatchParticipant {
        code: code.to_string(),
        display_name: code.to_string(),
        team: None,
        port,
        character: None,
    }
}

pub fn team_participant(code: &str, port: u8, team: u8) -> MatchParticipant {
    MatchParticipant {
        team: Some(team),
        ..participant(code, port)
    }
}

pub fn singles(a: &str, b: &str) -> MatchStartInfo {
    MatchStartInfo {
        participants: vec![participant(a, 1), participant(b, 2)],
    }
}

/// AAA#1 + CCC#3 on team 0, BBB#2 + DDD#4 on team 1.
pub fn doubles() -> MatchStartInfo {
    MatchStartInfo {
        participants: vec![
            team_participant("AAA#1", 1, 0),
            team_participant("BBB#2", 2, 1),
            team_participant("CCC#3", 3, 0),
            team_participant("DDD#4", 4, 1),
        ],
    }
}

pub fn frame(stocks: &[(u8, u8)]) -> FrameSnapshot {
    FrameSnapshot {
        stocks: stocks.iter().copied().collect(),
    }
}

// ── Document store ─────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStoreState {
    documents: HashMap<String, Document>,
    failing_reads: usize,
    failing_writes: usize,
    reads: usize,
    writes: usize,
}

#[derive(Default)]
pub struct MemoryStore(Mutex<MemoryStoreState>);

impl MemoryStore {
    pub fn with_document(path: &str, document: Document) -> Self {
        let store = Self::default();
        store.put(path, document);
        store
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryStoreState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put(&self, path: &str, document: Document) {
        self.state().documents.insert(path.to_string(), document);
    }

    pub fn document(&self, path: &str) -> Option<Document> {
        self.state().documents.get(path).cloned()
    }

    pub fn fail_reads(&self, count: usize) {
        self.state().failing_reads = count;
    }

    pub fn fail_writes(&self, count: usize) {
        self.state().failing_writes = count;
    }

    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<Document>, TrackerError> {
        let mut state = self.state();
        state.reads += 1;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(TrackerError::transport("connection reset"));
        }
        Ok(state.documents.get(path).cloned())
    }

    fn write(&self, path: &str, document: &Document) -> Result<(), TrackerError> {
        let mut state = self.state();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(TrackerError::transport("permission denied"));
        }
        state.writes += 1;
        state.documents.insert(path.to_string(), document.clone());
        Ok(())
    }
}

// ── Status sink ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    statuses: Mutex<Vec<String>>,
    notifications: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn set_status(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn notify(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }
}

// ── Replay reader ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ScriptedMatch {
    pub start: Option<MatchStartInfo>,
    pub end: Option<MatchEndInfo>,
    pub frame: Option<FrameSnapshot>,
    pub panic_on_end: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedReader {
    matches: Arc<Mutex<HashMap<PathBuf, ScriptedMatch>>>,
    opens: Arc<Mutex<usize>>,
}

impl ScriptedReader {
    pub fn insert(&self, path: &str, scripted: ScriptedMatch) {
        self.matches.lock().unwrap().insert(PathBuf::from(path), scripted);
    }

    pub fn finish(&self, path: &str, method: EndMethod, stocks: &[(u8, u8)]) {
        let mut matches = self.matches.lock().unwrap();
        let entry = matches.entry(PathBuf::from(path)).or_default();
        entry.end = Some(MatchEndInfo { method });
        entry.frame = Some(frame(stocks));
    }

    pub fn open_count(&self) -> usize {
        *self.opens.lock().unwrap()
    }
}

struct ScriptedFile(ScriptedMatch);

impl MatchFile for ScriptedFile {
    fn start_info(&self) -> Option<MatchStartInfo> {
        self.0.start.clone()
    }

    fn end_info(&self) -> Option<MatchEndInfo> {
        if self.0.panic_on_end {
            panic!("corrupt end block");
        }
        self.0.end
    }

    fn latest_frame(&self) -> Option<FrameSnapshot> {
        self.0.frame.clone()
    }
}

impl ReplayReader for ScriptedReader {
    fn open(&self, path: &Path) -> Box<dyn MatchFile> {
        *self.opens.lock().unwrap() += 1;
        let scripted = self.matches.lock().unwrap().get(path).cloned().unwrap_or_default();
        Box::new(ScriptedFile(scripted))
    }
}

// ── Event source ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EventSourceState {
    pub watching: Option<PathBuf>,
    pub watch_calls: usize,
    pub unwatch_calls: usize,
    pub fail: bool,
}

#[derive(Clone, Default)]
pub struct RecordingEvents(pub Arc<Mutex<EventSourceState>>);

impl RecordingEvents {
    pub fn watching(&self) -> Option<PathBuf> {
        self.0.lock().unwrap().watching.clone()
    }
}

impl EventSource for RecordingEvents {
    fn watch(&mut self, dir: &Path, _exclude: &[String]) -> Result<(), TrackerError> {
        let mut state = self.0.lock().unwrap();
        state.watch_calls += 1;
        if state.fail {
            let message = format!("watch {}: no such directory", dir.display());
            return Err(TrackerError::internal(message));
        }
        state.watching = Some(dir.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.unwatch_calls += 1;
        state.watching = None;
    }
}
