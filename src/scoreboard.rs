use crate::error::TrackerError;
use crate::status::StatusSink;
use crate::types::*;
use serde_json::{Map, Value};
use std::{sync::Arc, thread::sleep, time::Duration};
use tracing::{debug, error, info, warn};

pub type Document = Map<String, Value>;

/// Remote home of the scoreboard document.
pub trait DocumentStore {
    /// `Ok(None)` when the document does not exist.
    fn read(&self, path: &str) -> Result<Option<Document>, TrackerError>;
    fn write(&self, path: &str, document: &Document) -> Result<(), TrackerError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn read(&self, path: &str) -> Result<Option<Document>, TrackerError> {
        (**self).read(path)
    }

    fn write(&self, path: &str, document: &Document) -> Result<(), TrackerError> {
        (**self).write(path, document)
    }
}

// ── Record view ────────────────────────────────────────────────────────

/// Owned keys of one side that a mutation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Touched {
    identity: bool,
    score: bool,
    flag: bool,
}

/// Typed view of the fields this tool owns. `document` keeps every key
/// exactly as it was read; only keys touched by a mutation are written back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreboardRecord {
    pub side_a: SideFields,
    pub side_b: SideFields,
    pub document: Document,
    touched: [Touched; 2],
}

/// Other writers sometimes store numbers as text.
pub fn coerce_score(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .unwrap_or(0)
        }
        Some(Value::Bool(true)) => 1,
        _ => 0,
    }
}

pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

pub fn coerce_flag(value: Option<&Value>) -> WinLoss {
    match value {
        Some(Value::String(s))
            if s.trim().eq_ignore_ascii_case("loss") || s.trim().eq_ignore_ascii_case("l") =>
        {
            WinLoss::Loss
        }
        _ => WinLoss::Win,
    }
}

struct SideKeys<'a> {
    code: &'a str,
    name: &'a str,
    score: &'a str,
    flag: &'a str,
}

fn side_keys(layout: &ScoreboardLayout, side: Side) -> SideKeys<'_> {
    match side {
        Side::A => SideKeys {
            code: &layout.side_a_code,
            name: &layout.side_a_name,
            score: &layout.side_a_score,
            flag: &layout.side_a_flag,
        },
        Side::B => SideKeys {
            code: &layout.side_b_code,
            name: &layout.side_b_name,
            score: &layout.side_b_score,
            flag: &layout.side_b_flag,
        },
    }
}

fn read_side(document: &Document, keys: &SideKeys<'_>) -> SideFields {
    SideFields {
        code: coerce_text(document.get(keys.code)),
        name: coerce_text(document.get(keys.name)),
        score: coerce_score(document.get(keys.score)),
        flag: coerce_flag(document.get(keys.flag)),
    }
}

fn write_side(document: &mut Document, keys: &SideKeys<'_>, fields: &SideFields, touched: Touched) {
    if touched.identity {
        if let Some(code) = &fields.code {
            document.insert(keys.code.to_string(), Value::String(code.clone()));
        }
        if let Some(name) = &fields.name {
            document.insert(keys.name.to_string(), Value::String(name.clone()));
        }
    }
    if touched.score {
        document.insert(keys.score.to_string(), Value::from(fields.score));
    }
    if touched.flag {
        document.insert(keys.flag.to_string(), Value::String(fields.flag.as_str().to_string()));
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

impl ScoreboardRecord {
    pub fn from_document(document: Document, layout: &ScoreboardLayout) -> Self {
        Self {
            side_a: read_side(&document, &side_keys(layout, Side::A)),
            side_b: read_side(&document, &side_keys(layout, Side::B)),
            document,
            touched: Default::default(),
        }
    }

    /// The fetched document with every touched key overwritten.
    pub fn to_document(&self, layout: &ScoreboardLayout) -> Document {
        let mut document = self.document.clone();
        for side in [Side::A, Side::B] {
            let touched = self.touched[side_index(side)];
            write_side(&mut document, &side_keys(layout, side), self.side(side), touched);
        }
        document
    }

    pub fn side(&self, side: Side) -> &SideFields {
        match side {
            Side::A => &self.side_a,
            Side::B => &self.side_b,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideFields {
        match side {
            Side::A => &mut self.side_a,
            Side::B => &mut self.side_b,
        }
    }

    pub fn reset_scores(&mut self) {
        for side in [Side::A, Side::B] {
            let fields = self.side_mut(side);
            fields.score = 0;
            fields.flag = WinLoss::Win;
            let touched = &mut self.touched[side_index(side)];
            touched.score = true;
            touched.flag = true;
        }
    }

    pub fn set_identity(&mut self, side: Side, identity: &SideIdentity) {
        let fields = self.side_mut(side);
        fields.code = Some(identity.code.clone());
        fields.name = Some(identity.label.clone());
        self.touched[side_index(side)].identity = true;
    }

    pub fn add_point(&mut self, side: Side) {
        let fields = self.side_mut(side);
        fields.score = fields.score.saturating_add(1);
        self.touched[side_index(side)].score = true;
    }
}

pub fn apply(mut record: ScoreboardRecord, mutation: &Mutation) -> ScoreboardRecord {
    match mutation {
        Mutation::Identity(update) => {
            if update.reset {
                record.reset_scores();
            }
            for (side, identity) in [(Side::A, &update.side_a), (Side::B, &update.side_b)] {
                if let Some(identity) = identity {
                    record.set_identity(side, identity);
                }
            }
        }
        Mutation::Score(side) => record.add_point(*side),
    }
    record
}

// ── Synchronizer ───────────────────────────────────────────────────────

pub struct Scoreboard<S> {
    store: S,
    path: String,
    layout: ScoreboardLayout,
    retry_delay: Duration,
    sink: Arc<dyn StatusSink>,
}

impl<S: DocumentStore> Scoreboard<S> {
    pub fn new(
        store: S,
        path: impl Into<String>,
        layout: ScoreboardLayout,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            path: path.into(),
            layout,
            retry_delay: Duration::from_millis(DEFAULT_FETCH_RETRY_DELAY_MS),
            sink,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the record, retrying a failed read once.
    pub fn fetch(&self) -> Option<ScoreboardRecord> {
        let mut last_err = None;
        for attempt in 0..FETCH_ATTEMPTS {
            if attempt > 0 {
                sleep(self.retry_delay);
            }
            match self.store.read(&self.path) {
                Ok(Some(document)) => {
                    debug!("fetched scoreboard {} ({} fields)", self.path, document.len());
                    return Some(ScoreboardRecord::from_document(document, &self.layout));
                }
                Ok(None) => {
                    warn!("scoreboard document {} does not exist", self.path);
                    return None;
                }
                Err(e) => {
                    warn!("scoreboard fetch failed (attempt {}): {e}", attempt + 1);
                    last_err = Some(e);
                }
            }
        }
        if let Some(e) = last_err {
            error!("giving up on scoreboard fetch for {}: {e}", self.path);
        }
        None
    }

    pub fn apply(&self, record: ScoreboardRecord, mutation: &Mutation) -> ScoreboardRecord {
        apply(record, mutation)
    }

    pub fn commit(&self, record: &ScoreboardRecord) -> bool {
        let document = record.to_document(&self.layout);
        match self.store.write(&self.path, &document) {
            Ok(()) => {
                info!(
                    "scoreboard updated: {} {} - {} {}",
                    record.side_a.code.as_deref().unwrap_or("?"),
                    record.side_a.score,
                    record.side_b.score,
                    record.side_b.code.as_deref().unwrap_or("?"),
                );
                true
            }
            Err(e) => {
                error!("scoreboard write failed for {}: {e}", self.path);
                self.sink.notify(&format!("Failed to update scoreboard: {e}"));
                false
            }
        }
    }

    /// Fetch, mutate, write back. `false` when the cycle was skipped or failed.
    pub fn sync(&self, mutation: &Mutation) -> bool {
        let Some(record) = self.fetch() else {
            return false;
        };
        let updated = self.apply(record, mutation);
        self.commit(&updated)
    }
}
