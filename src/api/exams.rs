use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionType;
use crate::repositories;
use crate::schemas::exam::{
    exam_to_response, question_to_response, AssignmentsUpdate, AttemptState,
    AvailableExamResponse, ExamCreate, ExamResponse, ExamUpdate, QuestionCreate, QuestionResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/available", get(list_available_exams))
        .route("/:exam_id", get(get_exam).patch(update_exam).delete(delete_exam))
        .route("/:exam_id/assignments", put(replace_assignments))
}

async fn create_exam(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    for question in &payload.questions {
        validate_question(question)?;
    }

    let start_date = payload.start_date.map(to_primitive_utc);
    let end_date = payload.end_date.map(to_primitive_utc);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end <= start {
            return Err(ApiError::BadRequest("end_date must be after start_date".to_string()));
        }
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam_id = Uuid::new_v4().to_string();
    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            duration_minutes: payload.duration_minutes,
            start_date,
            end_date,
            is_active: true,
            allow_review: payload.allow_review,
            visible_to_all: payload.visible_to_all,
            created_by: &admin.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for (index, entry) in payload.questions.into_iter().enumerate() {
        let question_id = Uuid::new_v4().to_string();
        let question = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &question_id,
                exam_id: &exam_id,
                question_text: &entry.question_text,
                question_type: entry.question_type,
                points: entry.points,
                order_index: index as i32,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

        let mut options = Vec::with_capacity(entry.options.len());
        for (option_index, option) in entry.options.into_iter().enumerate() {
            let option_id = Uuid::new_v4().to_string();
            repositories::questions::create_option(
                &mut *tx,
                repositories::questions::CreateOption {
                    id: &option_id,
                    question_id: &question_id,
                    option_text: &option.option_text,
                    is_correct: option.is_correct,
                    option_order: option_index as i32,
                    created_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create question option"))?;

            options.push(QuestionOption {
                id: option_id,
                question_id: question_id.clone(),
                option_text: option.option_text,
                is_correct: option.is_correct,
                option_order: option_index as i32,
                created_at: now,
            });
        }

        questions.push(question_to_response(question, options, true));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    if !payload.visible_to_all && !payload.assigned_student_ids.is_empty() {
        repositories::exams::replace_assignments(
            state.db(),
            &exam_id,
            &payload.assigned_student_ids,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to assign students"))?;
    }

    tracing::info!(exam_id, created_by = %admin.id, "Created exam");

    Ok((StatusCode::CREATED, Json(exam_to_response(exam, Some(questions)))))
}

async fn list_exams(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = repositories::exams::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(|exam| exam_to_response(exam, None)).collect()))
}

async fn list_available_exams(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AvailableExamResponse>>, ApiError> {
    let exams = repositories::exams::list_visible_for_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    let mut items = Vec::with_capacity(exams.len());
    for exam in exams {
        let question_count = repositories::questions::count_by_exam(state.db(), &exam.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

        let submission =
            repositories::submissions::find_by_exam_and_student(state.db(), &exam.id, &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?;
        let attempt_state = match submission {
            Some(submission) if submission.is_submitted => AttemptState::Submitted,
            Some(_) => AttemptState::InProgress,
            None => AttemptState::NotStarted,
        };

        items.push(AvailableExamResponse {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            duration_minutes: exam.duration_minutes,
            start_date: exam.start_date.map(crate::core::time::format_primitive),
            end_date: exam.end_date.map(crate::core::time::format_primitive),
            question_count,
            attempt_state,
        });
    }

    Ok(Json(items))
}

async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("exam not found".to_string()))?;

    if !user.is_admin {
        let visible = repositories::exams::is_visible_to(state.db(), &exam, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check exam visibility"))?;
        if !visible {
            return Err(ApiError::NotFound("exam not found".to_string()));
        }
    }

    let questions = load_question_responses(&state, &exam_id, user.is_admin).await?;

    Ok(Json(exam_to_response(exam, Some(questions))))
}

async fn update_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let start_date = payload.start_date.map(to_primitive_utc);
    let end_date = payload.end_date.map(to_primitive_utc);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end <= start {
            return Err(ApiError::BadRequest("end_date must be after start_date".to_string()));
        }
    }

    // Metadata edits never reach back into taken attempts; scores stay
    // denormalized on the submission rows.
    let exam = repositories::exams::update(
        state.db(),
        &exam_id,
        repositories::exams::UpdateExam {
            title: &payload.title,
            description: payload.description.as_deref(),
            duration_minutes: payload.duration_minutes,
            start_date,
            end_date,
            is_active: payload.is_active,
            allow_review: payload.allow_review,
            visible_to_all: payload.visible_to_all,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?
    .ok_or_else(|| ApiError::NotFound("exam not found".to_string()))?;

    Ok(Json(exam_to_response(exam, None)))
}

async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::exams::delete(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    if !deleted {
        return Err(ApiError::NotFound("exam not found".to_string()));
    }

    tracing::info!(exam_id, deleted_by = %admin.id, "Deleted exam");
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_assignments(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AssignmentsUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;
    if exam.is_none() {
        return Err(ApiError::NotFound("exam not found".to_string()));
    }

    repositories::exams::replace_assignments(
        state.db(),
        &exam_id,
        &payload.student_ids,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to replace assignments"))?;

    Ok(Json(serde_json::json!({
        "exam_id": exam_id,
        "assigned_count": payload.student_ids.len(),
    })))
}

async fn load_question_responses(
    state: &AppState,
    exam_id: &str,
    include_correctness: bool,
) -> Result<Vec<QuestionResponse>, ApiError> {
    let questions: Vec<Question> = repositories::questions::list_by_exam(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let options = repositories::questions::list_options_by_exam(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = grouped.remove(&question.id).unwrap_or_default();
            question_to_response(question, options, include_correctness)
        })
        .collect())
}

/// Structural invariants of a new question: objective questions need their
/// options (true/false exactly two, multiple choice at least two) with
/// exactly one flagged correct; open-ended questions have none.
fn validate_question(question: &QuestionCreate) -> Result<(), ApiError> {
    if question.question_text.trim().is_empty() {
        return Err(ApiError::BadRequest("question_text must not be empty".to_string()));
    }
    if question.points < 1 {
        return Err(ApiError::BadRequest("points must be a positive integer".to_string()));
    }

    let correct_count = question.options.iter().filter(|option| option.is_correct).count();

    match question.question_type {
        QuestionType::MultipleChoice => {
            if question.options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "multiple-choice questions need at least two options".to_string(),
                ));
            }
            if correct_count != 1 {
                return Err(ApiError::BadRequest(
                    "multiple-choice questions need exactly one correct option".to_string(),
                ));
            }
        }
        QuestionType::TrueFalse => {
            if question.options.len() != 2 {
                return Err(ApiError::BadRequest(
                    "true/false questions need exactly two options".to_string(),
                ));
            }
            if correct_count != 1 {
                return Err(ApiError::BadRequest(
                    "true/false questions need exactly one correct option".to_string(),
                ));
            }
        }
        QuestionType::OpenEnded => {
            if !question.options.is_empty() {
                return Err(ApiError::BadRequest(
                    "open-ended questions do not take options".to_string(),
                ));
            }
        }
    }

    Ok(())
}
