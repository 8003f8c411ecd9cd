use crate::types::*;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use chrono::Local;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// One-way channel to whatever hosts the tracker.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: &str);
    fn notify(&self, message: &str);
}

#[derive(Debug)]
pub struct StatusBoard {
    status: String,
    notifications: VecDeque<Notification>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            status: STATUS_NOT_RUNNING.to_string(),
            notifications: VecDeque::new(),
        }
    }
}

impl StatusBoard {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.clone(),
            notifications: self.notifications.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<Mutex<StatusBoard>>);

impl SharedStatus {
    pub fn snapshot(&self) -> StatusSnapshot {
        let guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        guard.snapshot()
    }
}

impl StatusSink for SharedStatus {
    fn set_status(&self, status: &str) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if guard.status != status {
            info!("status: {status}");
            guard.status = status.to_string();
        }
    }

    fn notify(&self, message: &str) {
        warn!("notification: {message}");
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if guard.notifications.len() >= MAX_NOTIFICATIONS {
            guard.notifications.pop_front();
        }
        guard.notifications.push_back(Notification {
            at: Local::now().to_rfc3339(),
            message: message.to_string(),
        });
    }
}

// ── Status server ──────────────────────────────────────────────────────

pub fn status_router(status: SharedStatus) -> Router {
    Router::new()
        .route("/status.json", get(get_status_json))
        .with_state(status)
}

async fn get_status_json(State(status): State<SharedStatus>) -> impl IntoResponse {
    let body = serde_json::to_string(&status.snapshot()).unwrap_or_else(|_| "{}".to_string());
    (
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
        ],
        body,
    )
}

pub async fn start_status_server(status: SharedStatus, addr: String) {
    let app = status_router(status);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("status server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("status server listening at http://{addr}/status.json");
    if let Err(e) = axum::serve(listener, app).await {
        error!("status server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_board_defaults_to_not_running() {
        let status = SharedStatus::default();
        assert_eq!(status.snapshot().status, STATUS_NOT_RUNNING);
        status.set_status(STATUS_WAITING);
        assert_eq!(status.snapshot().status, STATUS_WAITING);
    }

    #[test]
    fn test_notifications_are_capped() {
        let status = SharedStatus::default();
        for i in 0..MAX_NOTIFICATIONS + 5 {
            status.notify(&format!("failure {i}"));
        }
        let snapshot = status.snapshot();
        assert_eq!(snapshot.notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(snapshot.notifications[0].message, "failure 5");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let status = SharedStatus::default();
        status.notify("boom");
        let value = serde_json::to_value(status.snapshot()).unwrap();
        assert_eq!(value["status"], "Not running");
        assert_eq!(value["notifications"][0]["message"], "boom");
        assert!(value["notifications"][0]["at"].is_string());
    }
}
