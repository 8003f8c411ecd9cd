use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

// ── Constants ──────────────────────────────────────────────────────────

/// Joins member codes (and labels) of a multi-player side.
pub const TEAM_DELIMITER: &str = "&&";
pub const LABEL_SEGMENT_SEPARATOR: &str = " / ";
pub const DEFAULT_PROJECT_ID: &str = "eightway-io";
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:17895";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FETCH_RETRY_DELAY_MS: u64 = 500;
pub const FETCH_ATTEMPTS: u32 = 2;
pub const MAX_NOTIFICATIONS: usize = 20;
pub const SPECTATE_SUBFOLDER: &str = "Spectate";

pub const STATUS_WAITING: &str = "Waiting for game";
pub const STATUS_TRACKING: &str = "Tracking game";
pub const STATUS_NOT_RUNNING: &str = "Not running";

// ── Replay domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSelection {
    pub character: u8,
    pub costume: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchParticipant {
    pub code: String,
    pub display_name: String,
    /// `None` outside of teams mode.
    pub team: Option<u8>,
    /// 1-based controller port.
    pub port: u8,
    pub character: Option<CharacterSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStartInfo {
    pub participants: Vec<MatchParticipant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMethod {
    TimeOut,
    StocksSingles,
    StocksTeams,
    SuddenQuit,
    Other(u8),
}

impl From<u8> for EndMethod {
    fn from(raw: u8) -> Self {
        match raw {
            1 => EndMethod::TimeOut,
            2 => EndMethod::StocksSingles,
            3 => EndMethod::StocksTeams,
            7 => EndMethod::SuddenQuit,
            other => EndMethod::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEndInfo {
    pub method: EndMethod,
}

/// Remaining stocks keyed by 1-based port, taken from the latest frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub stocks: BTreeMap<u8, u8>,
}

impl FrameSnapshot {
    pub fn stocks_for_port(&self, port: u8) -> u32 {
        self.stocks.get(&port).copied().map(u32::from).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Added,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Added, path: path.into() }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Changed, path: path.into() }
    }
}

// ── Sides & outcomes ───────────────────────────────────────────────────

/// Side A always belongs to the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("side A"),
            Side::B => f.write_str("side B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Side),
    Unknown(&'static str),
}

/// Seat indices (into `MatchStartInfo::participants`) for each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePartition {
    pub local_seat: usize,
    pub mine: Vec<usize>,
    pub other: Vec<usize>,
}

impl SidePartition {
    pub fn seats(&self, side: Side) -> &[usize] {
        match side {
            Side::A => &self.mine,
            Side::B => &self.other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideIdentity {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentityUpdate {
    pub reset: bool,
    pub side_a: Option<SideIdentity>,
    pub side_b: Option<SideIdentity>,
}

impl IdentityUpdate {
    pub fn is_noop(&self) -> bool {
        !self.reset && self.side_a.is_none() && self.side_b.is_none()
    }
}

// ── Scoreboard types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WinLoss {
    #[default]
    Win,
    Loss,
}

impl WinLoss {
    pub fn as_str(self) -> &'static str {
        match self {
            WinLoss::Win => "WIN",
            WinLoss::Loss => "LOSS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SideFields {
    pub code: Option<String>,
    pub name: Option<String>,
    pub score: i64,
    pub flag: WinLoss,
}

#[derive(Debug, Clone)]
pub enum Mutation {
    Identity(IdentityUpdate),
    Score(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerState {
    Idle,
    AwaitingMatch,
    TrackingMatch,
}

impl TrackerState {
    pub fn status_text(self) -> &'static str {
        match self {
            TrackerState::Idle => STATUS_NOT_RUNNING,
            TrackerState::AwaitingMatch => STATUS_WAITING,
            TrackerState::TrackingMatch => STATUS_TRACKING,
        }
    }
}

/// Tracking state for the match file currently being observed.
#[derive(Debug, Clone)]
pub struct ActiveMatchContext {
    pub path: PathBuf,
    pub start: MatchStartInfo,
    pub partition: SidePartition,
    pub listener_attached: bool,
    pub end_processed: bool,
}

#[derive(Debug)]
pub enum TrackerCommand {
    Activate,
    Deactivate,
    File(FileEvent),
    Shutdown,
}

// ── Config types ───────────────────────────────────────────────────────

/// Remote document keys for each scoreboard field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreboardLayout {
    pub side_a_code: String,
    pub side_b_code: String,
    pub side_a_name: String,
    pub side_b_name: String,
    pub side_a_score: String,
    pub side_b_score: String,
    pub side_a_flag: String,
    pub side_b_flag: String,
}

impl Default for ScoreboardLayout {
    fn default() -> Self {
        Self {
            side_a_code: "sideACode".to_string(),
            side_b_code: "sideBCode".to_string(),
            side_a_name: "sideAName".to_string(),
            side_b_name: "sideBName".to_string(),
            side_a_score: "sideAScore".to_string(),
            side_b_score: "sideBScore".to_string(),
            side_a_flag: "sideAWinLossFlag".to_string(),
            side_b_flag: "sideBWinLossFlag".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub replay_directory: String,
    pub spectator_mode: bool,
    pub exclude_patterns: Vec<String>,
    pub connect_code: String,
    pub project_id: String,
    pub package_key: String,
    pub page_key: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub fetch_retry_delay_ms: u64,
    pub status_addr: String,
    pub test_mode: bool,
    pub layout: ScoreboardLayout,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            replay_directory: String::new(),
            spectator_mode: false,
            exclude_patterns: Vec::new(),
            connect_code: String::new(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            package_key: String::new(),
            page_key: String::new(),
            api_key: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            fetch_retry_delay_ms: DEFAULT_FETCH_RETRY_DELAY_MS,
            status_addr: DEFAULT_STATUS_ADDR.to_string(),
            test_mode: false,
            layout: ScoreboardLayout::default(),
        }
    }
}

// ── Status types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub at: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: String,
    pub notifications: Vec<Notification>,
}
