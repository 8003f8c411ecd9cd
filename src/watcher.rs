use crate::error::TrackerError;
use crate::replay::is_replay_file_path;
use crate::types::*;
use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

/// Source of replay file events for a directory.
pub trait EventSource {
    fn watch(&mut self, dir: &Path, exclude: &[String]) -> Result<(), TrackerError>;
    fn unwatch(&mut self);
}

pub fn compile_excludes(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("ignoring invalid exclude pattern {raw:?}: {e}");
                None
            }
        })
        .collect()
}

pub fn is_excluded(path: &Path, root: &Path, excludes: &[Pattern]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    excludes
        .iter()
        .any(|pattern| pattern.matches_path(relative) || pattern.matches_path(path))
}

pub fn classify_event(
    kind: &EventKind,
    path: &Path,
    root: &Path,
    excludes: &[Pattern],
) -> Option<FileEvent> {
    if !is_replay_file_path(path) || is_excluded(path, root, excludes) {
        return None;
    }
    match kind {
        EventKind::Create(_) => Some(FileEvent::added(path)),
        EventKind::Modify(_) => Some(FileEvent::changed(path)),
        _ => None,
    }
}

/// Filesystem watcher that forwards replay events into the tracker's command channel.
pub struct NotifySource {
    sender: Sender<TrackerCommand>,
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    pub fn new(sender: Sender<TrackerCommand>) -> Self {
        Self { sender, watcher: None }
    }
}

impl EventSource for NotifySource {
    fn watch(&mut self, dir: &Path, exclude: &[String]) -> Result<(), TrackerError> {
        self.unwatch();
        let root: PathBuf = dir.to_path_buf();
        let excludes = compile_excludes(exclude);
        let sender = self.sender.clone();
        let handler_root = root.clone();

        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                for path in &event.paths {
                    let classified = classify_event(&event.kind, path, &handler_root, &excludes);
                    let Some(file_event) = classified else {
                        continue;
                    };
                    if sender.send(TrackerCommand::File(file_event)).is_err() {
                        tracing::debug!("replay watcher receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!("replay watcher error: {e}"),
        };
        let mut watcher = notify::recommended_watcher(handler)
            .map_err(|e| TrackerError::internal(format!("create watcher: {e}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| TrackerError::internal(format!("watch {}: {e}", root.display())))?;
        tracing::info!("watching {} for replays", root.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unwatch(&mut self) {
        if self.watcher.take().is_some() {
            tracing::info!("stopped watching replays");
        }
    }
}
