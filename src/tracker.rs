use crate::config::watch_directory;
use crate::error::TrackerError;
use crate::replay::ReplayReader;
use crate::resolver::{decide_identity, resolve_sides};
use crate::scoreboard::{DocumentStore, Scoreboard};
use crate::status::StatusSink;
use crate::types::*;
use crate::watcher::EventSource;
use crate::winner::determine_winner_checked;
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
    sync::{mpsc::Receiver, Arc},
};
use tracing::{debug, error, info, warn};

/// Drives one scoreboard from replay file events.
pub struct MatchTracker<S, R, E> {
    config: TrackerConfig,
    reader: R,
    scoreboard: Scoreboard<S>,
    events: E,
    sink: Arc<dyn StatusSink>,
    state: TrackerState,
    active: Option<ActiveMatchContext>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<S: DocumentStore, R: ReplayReader, E: EventSource> MatchTracker<S, R, E> {
    pub fn new(
        config: TrackerConfig,
        reader: R,
        scoreboard: Scoreboard<S>,
        events: E,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            config,
            reader,
            scoreboard,
            events,
            sink,
            state: TrackerState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn active(&self) -> Option<&ActiveMatchContext> {
        self.active.as_ref()
    }

    fn transition(&mut self, next: TrackerState) {
        if self.state != next {
            debug!("tracker {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        self.sink.set_status(next.status_text());
    }

    pub fn activate(&mut self) {
        if self.state != TrackerState::Idle {
            debug!("tracker already active");
            return;
        }
        let Some(dir) = watch_directory(&self.config) else {
            warn!("no replay directory configured; tracking not started");
            self.sink.notify("Replay directory is not configured");
            return;
        };
        if let Err(e) = self.events.watch(&dir, &self.config.exclude_patterns) {
            error!("failed to watch {}: {e}", dir.display());
            self.sink.notify(&format!("Failed to watch replays: {e}"));
            return;
        }
        info!("tracking replays in {}", dir.display());
        self.transition(TrackerState::AwaitingMatch);
    }

    pub fn deactivate(&mut self) {
        self.events.unwatch();
        if let Some(previous) = self.active.take() {
            debug!("dropping match context for {}", previous.path.display());
        }
        self.transition(TrackerState::Idle);
    }

    /// Errors never escape; a failing event leaves the tracker ready for the next one.
    pub fn handle_event(&mut self, event: FileEvent) {
        if self.state == TrackerState::Idle {
            debug!("ignoring {:?} for {} while idle", event.kind, event.path.display());
            return;
        }
        let result = catch_unwind(AssertUnwindSafe(|| match event.kind {
            FileEventKind::Added => self.on_match_added(&event.path),
            FileEventKind::Changed => self.on_match_changed(&event.path),
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(TrackerError::ParseUnavailable(reason))) => {
                debug!("skipping {}: {reason}", event.path.display());
            }
            Ok(Err(e)) => {
                error!("failed to handle {}: {e}", event.path.display());
                self.sink.notify(&format!("Scoreboard tracker error: {e}"));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("panic while handling {}: {message}", event.path.display());
                self.sink.notify(&format!("Scoreboard tracker error: {message}"));
            }
        }
    }

    fn on_match_added(&mut self, path: &Path) -> Result<(), TrackerError> {
        info!("new match file {}", path.display());
        if let Some(previous) = self.active.take() {
            if previous.listener_attached {
                debug!("detached listener from {}", previous.path.display());
            }
            self.transition(TrackerState::AwaitingMatch);
        }

        let file = self.reader.open(path);
        let Some(start) = file.start_info() else {
            let reason = format!("no match start in {}", path.display());
            return Err(TrackerError::ParseUnavailable(reason));
        };
        let already_finished = file.end_info().is_some();
        if already_finished && !self.config.test_mode {
            info!("{} is already finished; skipping", path.display());
            return Ok(());
        }

        let partition = resolve_sides(&start, &self.config.connect_code)?;
        if let Some(record) = self.scoreboard.fetch() {
            let update = decide_identity(&start, &partition, &record)?;
            if update.is_noop() {
                debug!("scoreboard identities unchanged");
            } else {
                if update.reset {
                    info!("new pairing; resetting scores");
                }
                let updated = self.scoreboard.apply(record, &Mutation::Identity(update));
                self.scoreboard.commit(&updated);
            }
        }

        self.active = Some(ActiveMatchContext {
            path: path.to_path_buf(),
            start,
            partition,
            listener_attached: true,
            end_processed: false,
        });
        self.transition(TrackerState::TrackingMatch);

        if already_finished {
            debug!("test mode: scoring finished match immediately");
            self.on_match_changed(path)?;
        }
        Ok(())
    }

    fn on_match_changed(&mut self, path: &Path) -> Result<(), TrackerError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        if active.path != path || !active.listener_attached || active.end_processed {
            return Ok(());
        }

        let file = self.reader.open(path);
        let Some(end) = file.end_info() else {
            return Ok(());
        };
        info!("match ended ({:?})", end.method);
        let frame = file.latest_frame();
        active.end_processed = true;
        active.listener_attached = false;

        let checked =
            determine_winner_checked(&active.start, &end, frame.as_ref(), &active.partition);
        let outcome = match checked {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("winner determination failed: {e}");
                self.sink.notify(&format!("Scoreboard tracker error: {e}"));
                Outcome::Unknown("invalid side partition")
            }
        };
        match outcome {
            Outcome::Winner(side) => {
                info!("{side} won");
                self.scoreboard.sync(&Mutation::Score(side));
            }
            Outcome::Unknown(reason) => info!("Unknown winner: {reason}"),
        }
        self.transition(TrackerState::AwaitingMatch);
        Ok(())
    }
}

/// Consumes commands until `Shutdown` or until every sender is gone.
pub fn run_tracker<S, R, E>(mut tracker: MatchTracker<S, R, E>, commands: Receiver<TrackerCommand>)
where
    S: DocumentStore,
    R: ReplayReader,
    E: EventSource,
{
    let mut pending: Option<TrackerCommand> = None;
    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        match command {
            TrackerCommand::Activate => tracker.activate(),
            TrackerCommand::Deactivate => tracker.deactivate(),
            TrackerCommand::Shutdown => {
                tracker.deactivate();
                break;
            }
            TrackerCommand::File(event) => {
                // Writes to a live replay fire many modify events; collapse a burst into one.
                if event.kind == FileEventKind::Changed {
                    while let Ok(next) = commands.try_recv() {
                        match &next {
                            TrackerCommand::File(other) if *other == event => continue,
                            _ => {
                                pending = Some(next);
                                break;
                            }
                        }
                    }
                }
                tracker.handle_event(event);
            }
        }
    }
    info!("tracker stopped");
}
