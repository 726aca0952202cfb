use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::exam::question_to_response;
use crate::schemas::grading::{answer_detail_to_response, grade_row_to_response, StudentGradeResponse};
use crate::schemas::session::{
    outcome_to_response, session_to_response, SaveAnswersRequest, SessionResponse,
    SubmissionResultResponse,
};
use crate::services::session;

/// Mounted under `/exams`: entering an attempt lives next to the exam it
/// belongs to.
pub(crate) fn exam_router() -> Router<AppState> {
    Router::new().route("/:exam_id/session", post(start_session))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:submission_id/answers", put(save_answers))
        .route("/:submission_id/submit", post(submit))
}

pub(crate) fn grades_router() -> Router<AppState> {
    Router::new().route("/", get(list_my_grades)).route("/:submission_id", get(my_grade_detail))
}

/// Start-or-resume: the first call creates the attempt, a refresh resumes it
/// with the clock still running from the original `started_at`.
async fn start_session(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = session::open_session(state.db(), &exam_id, &user.id).await?;

    let questions = snapshot
        .questions
        .iter()
        .cloned()
        .map(|entry| question_to_response(entry.question, entry.options, false))
        .collect();

    let autosave_interval = state.settings().exam().autosave_interval_seconds;
    Ok(Json(session_to_response(snapshot, questions, autosave_interval)))
}

/// The autosave flush: a batched keyed upsert of the client's buffered
/// answers. Transient storage errors surface as 500 and the client simply
/// retries on its next tick.
async fn save_answers(
    Path(submission_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswersRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut entries = Vec::with_capacity(payload.answers.len());
    for answer in payload.answers {
        entries.push(answer.into_entry()?);
    }
    let saved = entries.len();

    session::save_answers(state.db(), &submission_id, &user.id, entries).await?;

    Ok(Json(serde_json::json!({
        "submission_id": submission_id,
        "saved_answers": saved,
    })))
}

async fn submit(
    Path(submission_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResultResponse>, ApiError> {
    let outcome =
        session::finalize_submission(state.db(), &submission_id, Some(&user.id), false).await?;

    Ok(Json(outcome_to_response(outcome)))
}

async fn list_my_grades(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentGradeResponse>>, ApiError> {
    let rows = repositories::submissions::list_grades_for_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list grades"))?;

    Ok(Json(rows.into_iter().map(grade_row_to_response).collect()))
}

/// Per-answer review of the student's own graded attempt, gated on the
/// exam's review flag.
async fn my_grade_detail(
    Path(submission_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .ok_or_else(|| ApiError::NotFound("submission not found".to_string()))?;

    if submission.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }
    if !submission.is_submitted {
        return Err(ApiError::BadRequest("Attempt has not been submitted yet".to_string()));
    }

    let exam = repositories::exams::find_by_id(state.db(), &submission.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("exam not found".to_string()))?;

    if !exam.allow_review {
        return Err(ApiError::Forbidden("Review is disabled for this exam"));
    }

    let answers = repositories::answers::list_details(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    Ok(Json(serde_json::json!({
        "id": submission.id,
        "exam_id": submission.exam_id,
        "exam_title": exam.title,
        "submitted_at": submission.submitted_at.map(crate::core::time::format_primitive),
        "time_taken_minutes": submission.time_taken_minutes,
        "total_score": submission.total_score,
        "max_score": submission.max_score,
        "percentage": submission.percentage,
        "is_graded": submission.is_graded,
        "answers": answers
            .into_iter()
            .map(answer_detail_to_response)
            .collect::<Vec<_>>(),
    })))
}
