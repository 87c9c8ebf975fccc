//! Route handlers. Each one decodes its request, calls exactly one ledger or
//! catalog operation, and encodes the result.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_catalog::{NewTask, TaskRegistry};
use tally_ledger::{
    BonusCollection, BonusStatus, LedgerConfig, Registration, RegistrationOutcome, RewardLedger,
    TaskCompletion,
};
use tally_store::InMemoryLedgerStore;
use tally_types::{Clock, Profile, Task, UserId};

use crate::error::{ServerError, ServerResult};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RewardLedger<InMemoryLedgerStore>>,
    pub tasks: Arc<TaskRegistry<InMemoryLedgerStore>>,
}

impl AppState {
    pub fn new(store: Arc<InMemoryLedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            ledger: Arc::new(RewardLedger::new(store.clone(), clock.clone(), config)),
            tasks: Arc::new(TaskRegistry::new(store, clock)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub onboarding: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub points: u64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointsResponse {
    pub username: String,
    pub points: u64,
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "tally-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ServerResult<Response> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ServerError::InvalidRequest(
            "username must not be empty".into(),
        ));
    }

    let mut registration = Registration::new(username).with_profile(Profile {
        display_name: request.display_name,
        onboarding: request.onboarding,
    });
    if let Some(code) = request.referral_code {
        registration = registration.with_referral_code(code);
    }

    let response = match state.ledger.register(&registration).await? {
        RegistrationOutcome::Created {
            user_id,
            referral_code,
            ..
        } => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                created: true,
                user_id: Some(user_id),
                referral_code: Some(referral_code),
                message: None,
            }),
        )
            .into_response(),
        RegistrationOutcome::AlreadyExists => (
            StatusCode::OK,
            Json(RegisterResponse {
                created: false,
                user_id: None,
                referral_code: None,
                message: Some(format!("user {username} already exists")),
            }),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn points_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ServerResult<Json<PointsResponse>> {
    let points = state.ledger.balance(&username).await?;
    Ok(Json(PointsResponse { username, points }))
}

pub async fn bonus_status_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ServerResult<Json<BonusStatus>> {
    Ok(Json(state.ledger.check_bonus_status(&username).await?))
}

pub async fn collect_bonus_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ServerResult<Json<BonusCollection>> {
    Ok(Json(state.ledger.collect_daily_bonus(&username).await?))
}

pub async fn list_tasks_handler(State(state): State<AppState>) -> ServerResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list_tasks().await?))
}

pub async fn create_task_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ServerResult<(StatusCode, Json<Task>)> {
    let mut new = NewTask::new(request.title, request.points);
    new.description = request.description;
    let task = state.tasks.create_task(new).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn complete_task_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<CompleteTaskRequest>,
) -> ServerResult<Json<TaskCompletion>> {
    Ok(Json(
        state.ledger.complete_task(&request.username, &slug).await?,
    ))
}
