use crate::types::*;
use std::{
  env,
  fs,
  path::{Path, PathBuf},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  env_default("SCOREBOARD_CONFIG_PATH")
    .map(PathBuf::from)
    .unwrap_or_else(|| repo_root().join("config.json"))
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn parse_flag(raw: &str) -> bool {
  matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub fn env_flag_true(key: &str) -> bool {
  env::var(key).map(|value| parse_flag(&value)).unwrap_or(false)
}

fn fill_from_env(target: &mut String, key: &str) {
  if target.trim().is_empty() {
    if let Some(value) = env_default(key) {
      *target = value;
    }
  }
}

pub fn apply_env_defaults(mut config: TrackerConfig) -> TrackerConfig {
  fill_from_env(&mut config.replay_directory, "SLIPPI_REPLAY_DIR");
  fill_from_env(&mut config.connect_code, "SLIPPI_CONNECT_CODE");
  if let Some(project) = env_default("SCOREBOARD_PROJECT_ID") {
    config.project_id = project;
  }
  fill_from_env(&mut config.package_key, "SCOREBOARD_PACKAGE_KEY");
  fill_from_env(&mut config.page_key, "SCOREBOARD_PAGE_KEY");
  fill_from_env(&mut config.api_key, "FIRESTORE_API_KEY");
  if env_flag_true("SCOREBOARD_TEST_MODE") {
    config.test_mode = true;
  }
  if env_flag_true("SLIPPI_SPECTATOR_MODE") {
    config.spectator_mode = true;
  }
  if config.exclude_patterns.is_empty() && !config.spectator_mode {
    // Spectated games land in their own folder and are not ours to score.
    config.exclude_patterns.push(format!("**/{SPECTATE_SUBFOLDER}/**"));
  }
  config
}

pub fn parse_config(data: &str) -> Result<TrackerConfig, String> {
  serde_json::from_str::<TrackerConfig>(data).map_err(|e| format!("parse config: {e}"))
}

pub fn load_config_from(path: &Path) -> Result<TrackerConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(TrackerConfig::default()));
  }
  let data =
    fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config = parse_config(&data).map_err(|e| format!("{} ({})", e, path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_config_inner() -> Result<TrackerConfig, String> {
  load_config_from(&config_path())
}

/// Runs before logging is set up, so the caller reports the outcome.
pub fn load_env_file() -> Result<Option<PathBuf>, String> {
  load_env_file_from(&repo_root().join(".env"))
}

/// Loads `env_path`, or the first `.env` found from the working directory up
/// when it does not exist. Returns the file that was loaded.
pub fn load_env_file_from(env_path: &Path) -> Result<Option<PathBuf>, String> {
  if env_path.is_file() {
    dotenvy::from_path(env_path)
      .map(|()| Some(env_path.to_path_buf()))
      .map_err(|e| format!("failed to load {}: {e}", env_path.display()))
  } else {
    Ok(dotenvy::dotenv().ok())
  }
}

/// Directory that the watcher should observe for this configuration.
pub fn watch_directory(config: &TrackerConfig) -> Option<PathBuf> {
  let trimmed = config.replay_directory.trim();
  if trimmed.is_empty() {
    return None;
  }
  let base = resolve_repo_path(trimmed);
  if config.spectator_mode {
    Some(base.join(SPECTATE_SUBFOLDER))
  } else {
    Some(base)
  }
}

/// Firestore path of the scoreboard document, e.g. `scoreboard/<package>/<page>/fields`.
pub fn scoreboard_document_path(config: &TrackerConfig) -> Result<String, String> {
  let package = config.package_key.trim();
  let page = config.page_key.trim();
  if package.is_empty() || page.is_empty() {
    return Err(concat!(
      "Scoreboard package/page keys are not set ",
      "(config or SCOREBOARD_PACKAGE_KEY / SCOREBOARD_PAGE_KEY)."
    )
    .to_string());
  }
  Ok(format!("scoreboard/{package}/{page}/fields"))
}

pub fn normalize_slippi_code(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  Some(trimmed.to_ascii_uppercase())
}

pub fn log_config_warnings(config: &TrackerConfig) {
  let mut warnings = Vec::new();

  if config.replay_directory.trim().is_empty() {
    warnings.push(
      "SLIPPI_REPLAY_DIR not set and no replay directory in config; nothing will be tracked",
    );
  }
  if config.connect_code.trim().is_empty() {
    warnings.push(
      "SLIPPI_CONNECT_CODE not set; the first port will be treated as the local player",
    );
  }
  if config.package_key.trim().is_empty() || config.page_key.trim().is_empty() {
    warnings.push("scoreboard package/page keys not set; scoreboard updates will fail");
  }
  if config.test_mode {
    warnings.push("test mode enabled; finished replays will be scored when discovered");
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}
