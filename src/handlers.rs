use crate::auth::{AuthError, AuthUser};
use crate::emissions::round_kg;
use crate::errors::{AppError, LedgerError};
use crate::extract::JsonBody;
use crate::ledger::Ledger;
use crate::models::{
    Category, CommunityStats, CredentialsRequest, Entry, EntryFilter, EntryView, Insight,
    LoginResponse, RegisterResponse, Submission, SubmitEntryRequest, SubmitEntryResponse, UserId,
    UserSummary,
};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Attempts per submission before a streak conflict reaches the client.
pub const MAX_SUBMIT_ATTEMPTS: usize = 3;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if payload.password.is_empty() {
        return Err(LedgerError::validation("password", "must not be empty").into());
    }
    let hash = state.auth.hash_password(&payload.password).await?;
    let user = state.ledger.register_user(&payload.username, hash).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .ledger
        .find_user_by_name(&payload.username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    state
        .auth
        .verify_password(&payload.password, &user.password_hash)
        .await?;

    let token = state.auth.issue_token(&user.id)?;
    info!(user_id = %user.id, "login");
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        streak: user.streak,
    }))
}

pub async fn submit_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<SubmitEntryRequest>,
) -> Result<Json<SubmitEntryResponse>, AppError> {
    let category: Category = payload.category.parse()?;
    let submission = submit_with_retry(&state.ledger, &user_id, category, payload.amount).await?;

    let co2 = round_kg(submission.entry.co2);
    Ok(Json(SubmitEntryResponse {
        entry: to_view(submission.entry),
        co2,
        streak: submission.streak,
    }))
}

/// Resubmits on a streak conflict; every other outcome is returned as is.
pub async fn submit_with_retry(
    ledger: &Ledger,
    user_id: &UserId,
    category: Category,
    amount: f64,
) -> Result<Submission, LedgerError> {
    let mut attempt = 1;
    loop {
        match ledger.submit_entry(user_id, category, amount).await {
            Err(err) if err.is_conflict() && attempt < MAX_SUBMIT_ATTEMPTS => {
                warn!(user_id = %user_id, attempt, "streak update conflicted, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

pub async fn list_entries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(filter): Query<EntryFilter>,
) -> Result<Json<Vec<EntryView>>, AppError> {
    let category = filter
        .category
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(str::parse::<Category>)
        .transpose()?;
    let entries = state
        .ledger
        .entries_for_user(&UserId::from_string(&user_id), category)
        .await?;
    Ok(Json(entries.into_iter().map(to_view).collect()))
}

pub async fn community_stats(
    State(state): State<AppState>,
) -> Result<Json<CommunityStats>, AppError> {
    let mut stats = state.ledger.community_stats().await?;
    stats.average = round_kg(stats.average);
    for row in &mut stats.leaderboard {
        row.total = round_kg(row.total);
    }
    Ok(Json(stats))
}

pub async fn insights(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Insight>, AppError> {
    let mut insight = state
        .ledger
        .insights_for_user(&UserId::from_string(&user_id))
        .await?;
    for category in &mut insight.categories {
        category.total = round_kg(category.total);
        category.average_amount = round_kg(category.average_amount);
    }
    Ok(Json(insight))
}

pub async fn user_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserSummary>, AppError> {
    let mut summary = state
        .ledger
        .user_summary(&UserId::from_string(&user_id))
        .await?;
    summary.total_co2 = round_kg(summary.total_co2);
    Ok(Json(summary))
}

fn to_view(entry: Entry) -> EntryView {
    EntryView {
        id: entry.id,
        category: entry.category,
        amount: entry.amount,
        unit: entry.unit,
        co2: round_kg(entry.co2),
        timestamp: entry.timestamp,
    }
}
