use crate::types::*;
use peppi::{
    game::{Game, Port},
    io::slippi,
};
use std::{
    cell::OnceCell,
    collections::BTreeMap,
    fs,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

/// A single replay file, read lazily.
pub trait MatchFile {
    fn start_info(&self) -> Option<MatchStartInfo>;
    fn end_info(&self) -> Option<MatchEndInfo>;
    fn latest_frame(&self) -> Option<FrameSnapshot>;
}

pub trait ReplayReader {
    fn open(&self, path: &Path) -> Box<dyn MatchFile>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SlpReader;

impl ReplayReader for SlpReader {
    fn open(&self, path: &Path) -> Box<dyn MatchFile> {
        Box::new(SlpMatchFile::new(path))
    }
}

#[derive(Debug, Clone)]
struct ParsedCompletion {
    end: Option<MatchEndInfo>,
    frame: Option<FrameSnapshot>,
}

/// `.slp` file backed by peppi. The start block is readable while the game is
/// still being written; end data and frames need the finished file.
pub struct SlpMatchFile {
    path: PathBuf,
    completion: OnceCell<Option<ParsedCompletion>>,
}

impl SlpMatchFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            completion: OnceCell::new(),
        }
    }

    fn completion(&self) -> Option<&ParsedCompletion> {
        self.completion
            .get_or_init(|| match parse_completion(&self.path) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!("{e}");
                    None
                }
            })
            .as_ref()
    }
}

impl MatchFile for SlpMatchFile {
    fn start_info(&self) -> Option<MatchStartInfo> {
        match parse_game_start(&self.path) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!("{e}");
                None
            }
        }
    }

    fn end_info(&self) -> Option<MatchEndInfo> {
        if !is_finalized(&self.path) {
            return None;
        }
        self.completion().and_then(|parsed| parsed.end)
    }

    fn latest_frame(&self) -> Option<FrameSnapshot> {
        self.completion().and_then(|parsed| parsed.frame.clone())
    }
}

pub fn port_number(port: Port) -> u8 {
    match port {
        Port::P1 => 1,
        Port::P2 => 2,
        Port::P3 => 3,
        Port::P4 => 4,
    }
}

const RAW_HEADER: &[u8; 11] = b"{U\x03raw[$U#l";

/// Length of the raw event block from the UBJSON header. The client writes 0
/// there until the game is over and the file has been closed out.
pub fn raw_length(path: &Path) -> Option<u32> {
    let mut file = fs::File::open(path).ok()?;
    let mut buf = [0u8; 15];
    file.read_exact(&mut buf).ok()?;
    if &buf[..11] != RAW_HEADER {
        return None;
    }
    Some(u32::from_be_bytes([buf[11], buf[12], buf[13], buf[14]]))
}

pub fn is_finalized(path: &Path) -> bool {
    matches!(raw_length(path), Some(len) if len > 0)
}

pub fn parse_game_start(path: &Path) -> Result<MatchStartInfo, String> {
    let file = fs::File::open(path).map_err(|e| format!("open replay {}: {e}", path.display()))?;
    let mut reader = BufReader::new(file);
    slippi::de::parse_header(&mut reader, None)
        .map_err(|e| format!("parse header {}: {e}", path.display()))?;

    let mut opts = slippi::de::Opts::default();
    opts.skip_frames = true;
    let state = slippi::de::parse_start(&mut reader, Some(&opts))
        .map_err(|e| format!("parse start {}: {e}", path.display()))?;
    let start = state.start();
    let mut participants = Vec::new();

    for pl in start.players.iter() {
        let port = port_number(pl.port);
        let netplay = pl.netplay.as_ref().map(|n| (n.name.0.clone(), n.code.0.clone()));
        let name_tag = pl
            .name_tag
            .as_ref()
            .map(|s| s.0.trim().to_string())
            .filter(|s| !s.is_empty());
        let code = netplay
            .as_ref()
            .map(|(_, c)| c.clone())
            .filter(|c| !c.trim().is_empty())
            .or_else(|| name_tag.clone())
            .unwrap_or_else(|| format!("P{port}"));
        let display_name = netplay
            .as_ref()
            .map(|(n, _)| n.clone())
            .filter(|n| !n.trim().is_empty())
            .or(name_tag)
            .unwrap_or_else(|| code.clone());
        let character = map_character(pl.character).map(|_| CharacterSelection {
            character: pl.character,
            costume: pl.costume,
        });
        let team = if start.is_teams {
            pl.team.as_ref().map(|t| t.color)
        } else {
            None
        };

        participants.push(MatchParticipant {
            code,
            display_name,
            team,
            port,
            character,
        });
    }

    if participants.is_empty() {
        return Err(format!("replay {} has no players", path.display()));
    }
    Ok(MatchStartInfo { participants })
}

fn parse_completion(path: &Path) -> Result<ParsedCompletion, String> {
    let file = fs::File::open(path).map_err(|e| format!("open replay {}: {e}", path.display()))?;
    let game = slippi::de::read(BufReader::new(file), None)
        .map_err(|e| format!("parse replay {}: {e}", path.display()))?;

    let end = game.end.as_ref().map(|end| MatchEndInfo {
        method: EndMethod::from(end.method as u8),
    });

    let mut stocks = BTreeMap::new();
    for port_data in game.frames.ports.iter() {
        if let Some(remaining) = port_data.leader.post.stocks.values().last().copied() {
            stocks.insert(port_number(port_data.port), remaining);
        }
    }
    let frame = if stocks.is_empty() {
        None
    } else {
        Some(FrameSnapshot { stocks })
    };

    Ok(ParsedCompletion { end, frame })
}

pub fn is_replay_file_path(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(ext.to_ascii_lowercase().as_str(), "slp" | "slippi"),
        None => false,
    }
}

// ── Character names ────────────────────────────────────────────────────

pub fn map_character(id: u8) -> Option<&'static str> {
    match id {
        0x00 => Some("Captain Falcon"),
        0x01 => Some("Donkey Kong"),
        0x02 => Some("Fox"),
        0x03 => Some("Mr Game & Watch"),
        0x04 => Some("Kirby"),
        0x05 => Some("Bowser"),
        0x06 => Some("Link"),
        0x07 => Some("Luigi"),
        0x08 => Some("Mario"),
        0x09 => Some("Marth"),
        0x0A => Some("Mewtwo"),
        0x0B => Some("Ness"),
        0x0C => Some("Peach"),
        0x0D => Some("Pikachu"),
        0x0E => Some("Ice Climbers"),
        0x0F => Some("Jigglypuff"),
        0x10 => Some("Samus"),
        0x11 => Some("Yoshi"),
        0x12 => Some("Zelda"),
        0x13 => Some("Sheik"),
        0x14 => Some("Falco"),
        0x15 => Some("Young Link"),
        0x16 => Some("Dr Mario"),
        0x17 => Some("Roy"),
        0x18 => Some("Pichu"),
        0x19 => Some("Ganondorf"),
        _ => None,
    }
}

/// Scoreboard-sized character names.
pub fn short_character_name(id: u8) -> Option<&'static str> {
    let short = match id {
        0x00 => "Falcon",
        0x01 => "DK",
        0x03 => "G&W",
        0x0E => "ICs",
        0x0F => "Puff",
        0x15 => "YLink",
        0x16 => "Doc",
        0x19 => "Ganon",
        other => return map_character(other),
    };
    Some(short)
}

#[rustfmt::skip]
pub fn map_color(char_name: &str, costume: u8) -> &'static str {
    match char_name {
        "Fox" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", _ => "Default" },
        "Falco" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", _ => "Default" },
        "Marth" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "White", 5 => "Black", _ => "Default" },
        "Sheik" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Purple", _ => "Default" },
        "Zelda" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Purple", _ => "Default" },
        "Jigglypuff" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Yellow", _ => "Default" },
        "Captain Falcon" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "White", 5 => "Black", _ => "Default" },
        "Peach" => match costume { 1 => "Blue", 2 => "Green", 3 => "White", 4 => "Yellow", _ => "Default" },
        "Luigi" => match costume { 1 => "Blue", 2 => "Pink", 3 => "White", _ => "Default" },
        "Mario" => match costume { 1 => "Blue", 2 => "Brown", 3 => "Green", 4 => "Yellow", _ => "Default" },
        "Dr Mario" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Black", _ => "Default" },
        "Pikachu" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", _ => "Default" },
        "Samus" => match costume { 1 => "Brown", 2 => "Green", 3 => "Pink", 4 => "Purple", _ => "Default" },
        "Ganondorf" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Purple", _ => "Default" },
        "Roy" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Yellow", _ => "Default" },
        "Young Link" => match costume { 1 => "Red", 2 => "Blue", 3 => "White", 4 => "Black", _ => "Default" },
        "Link" => match costume { 1 => "Red", 2 => "Blue", 3 => "White", 4 => "Black", _ => "Default" },
        "Yoshi" => match costume { 1 => "Red", 2 => "Blue", 3 => "Cyan", 4 => "Pink", 5 => "Yellow", _ => "Default" },
        "Ice Climbers" => match costume { 1 => "Red", 2 => "Green", 3 => "Orange", _ => "Default" },
        "Kirby" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "White", 5 => "Yellow", _ => "Default" },
        "Mewtwo" => match costume { 1 => "Blue", 2 => "Green", 3 => "Yellow", _ => "Default" },
        "Ness" => match costume { 1 => "Blue", 2 => "Green", 3 => "Yellow", _ => "Default" },
        "Bowser" => match costume { 1 => "Red", 2 => "Blue", 3 => "Black", _ => "Default" },
        "Pichu" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", _ => "Default" },
        "Mr Game & Watch" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", _ => "Default" },
        "Donkey Kong" => match costume { 1 => "Red", 2 => "Blue", 3 => "Green", 4 => "Purple", _ => "Default" },
        _ => "Default",
    }
}

/// `(short name, color name)` for a character selection.
pub fn character_label_parts(
    selection: &CharacterSelection,
) -> Option<(&'static str, &'static str)> {
    let full = map_character(selection.character)?;
    let short = short_character_name(selection.character)?;
    Some((short, map_color(full, selection.costume)))
}
