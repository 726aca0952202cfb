use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::db::types::GradingFilter;
use crate::schemas::grading::{
    detail_to_response, listing_to_response, GradeSummaryResponse, GradeUpdateRequest,
    SubmissionDetailResponse, SubmissionListItem,
};
use crate::services::grading;

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    filter: GradingFilter,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/submissions", get(list_submissions))
        .route(
            "/submissions/:submission_id",
            get(submission_detail).delete(delete_submission),
        )
        .route("/submissions/:submission_id/recompute", post(recompute_totals))
        .route("/submissions/:submission_id/rescore", post(rescore))
        .route("/answers/:answer_id", put(set_answer_grade))
}

async fn list_submissions(
    Query(query): Query<ListQuery>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionListItem>>, ApiError> {
    let listings = grading::list_submissions(state.db(), &admin, query.filter).await?;
    Ok(Json(listings.into_iter().map(listing_to_response).collect()))
}

async fn submission_detail(
    Path(submission_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<SubmissionDetailResponse>, ApiError> {
    let detail = grading::load_submission_detail(state.db(), &admin, &submission_id).await?;
    Ok(Json(detail_to_response(detail)))
}

/// Saves a manual grade for one answer. Out-of-range points are rejected,
/// never clamped; the recorded answer content stays untouched.
async fn set_answer_grade(
    Path(answer_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<GradeUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    grading::set_answer_grade(
        state.db(),
        &admin,
        &answer_id,
        payload.points_earned,
        payload.feedback,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "answer_id": answer_id,
        "points_earned": payload.points_earned,
    })))
}

/// Re-sums the totals from the answer rows as persisted right now; called
/// after a batch of manual grades.
async fn recompute_totals(
    Path(submission_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<GradeSummaryResponse>, ApiError> {
    let summary = grading::recompute_submission_totals(state.db(), &admin, &submission_id).await?;

    Ok(Json(GradeSummaryResponse {
        submission_id,
        total_score: summary.total_score,
        max_score: summary.max_score,
        percentage: summary.percentage,
        is_graded: summary.is_graded,
    }))
}

/// Re-runs the objective auto-scoring pass; manual open-ended grades
/// survive.
async fn rescore(
    Path(submission_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<GradeSummaryResponse>, ApiError> {
    let summary = grading::rescore_submission(state.db(), &admin, &submission_id).await?;

    Ok(Json(GradeSummaryResponse {
        submission_id,
        total_score: summary.total_score,
        max_score: summary.max_score,
        percentage: summary.percentage,
        is_graded: summary.is_graded,
    }))
}

async fn delete_submission(
    Path(submission_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    grading::delete_submission(state.db(), &admin, &submission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
