//! Operational HTTP surface: liveness and synchronization status.
//!
//! Two read-only endpoints. The marketplace's CRUD API is a separate
//! collaborator; this service only reports its own health.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::chain::abi;
use crate::domain::{ConnectionState, ContractTag, StatsSnapshot};
use crate::error::SyncError;
use crate::store::CheckpointStore;

/// `GET /health` response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Fixed `"healthy"` — the process is up if it can answer at all.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Seconds since startup.
    pub uptime_seconds: i64,
    /// Current chain connection state.
    pub connection: ConnectionState,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// One checkpoint row in the `/status` response.
#[derive(Debug, Serialize)]
pub struct CheckpointView {
    /// Contract the subscription belongs to.
    pub tag: ContractTag,
    /// Event name within the contract.
    pub event_name: &'static str,
    /// Last successfully processed block.
    pub last_block: u64,
}

/// `GET /status` response body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Current chain connection state.
    pub connection: ConnectionState,
    /// Per-subscription checkpoints.
    pub checkpoints: Vec<CheckpointView>,
    /// Pipeline counters.
    pub counters: StatsSnapshot,
}

/// Builds the operational router.
pub fn router<S>() -> Router<AppState<S>>
where
    S: CheckpointStore + 'static,
{
    Router::new()
        .route("/health", get(health::<S>))
        .route("/status", get(status::<S>))
}

/// `GET /health` — liveness probe.
async fn health<S>(State(state): State<AppState<S>>) -> Json<HealthResponse>
where
    S: Send + Sync + 'static,
{
    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (now - state.started_at).num_seconds().max(0),
        connection: *state.connection.borrow(),
        timestamp: now,
    })
}

/// `GET /status` — connection state, checkpoints, and counters.
async fn status<S>(State(state): State<AppState<S>>) -> Result<Json<StatusResponse>, SyncError>
where
    S: CheckpointStore + 'static,
{
    let mut checkpoints = Vec::new();
    for tag in ContractTag::ALL {
        for event_name in abi::event_names(tag) {
            if let Some(last_block) = state.store.checkpoint(tag, event_name).await? {
                checkpoints.push(CheckpointView {
                    tag,
                    event_name,
                    last_block,
                });
            }
        }
    }

    Ok(Json(StatusResponse {
        connection: *state.connection.borrow(),
        checkpoints,
        counters: state.stats.snapshot(),
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventBus, SyncStats};
    use crate::store::MemoryMirrorStore;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn make_state() -> (AppState<MemoryMirrorStore>, watch::Sender<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Subscribed);
        let state = AppState {
            store: Arc::new(MemoryMirrorStore::new()),
            bus: EventBus::new(16),
            stats: Arc::new(SyncStats::new()),
            connection: state_rx,
            started_at: Utc::now(),
        };
        (state, state_tx)
    }

    #[tokio::test]
    async fn health_reports_connection_state() {
        let (state, _guard) = make_state();
        let Json(body) = health(State(state)).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.connection, ConnectionState::Subscribed);
        assert!(body.uptime_seconds >= 0);
    }

    #[tokio::test]
    async fn status_lists_recorded_checkpoints() {
        let (state, _guard) = make_state();
        let _ = state
            .store
            .advance_checkpoint(ContractTag::Crowdfunding, "CampaignCreated", 17)
            .await;

        let result = status(State(state)).await;
        let Ok(Json(body)) = result else {
            panic!("status failed");
        };
        assert_eq!(body.checkpoints.len(), 1);
        let Some(view) = body.checkpoints.first() else {
            panic!("missing checkpoint view");
        };
        assert_eq!(view.last_block, 17);
        assert_eq!(view.event_name, "CampaignCreated");
    }
}
