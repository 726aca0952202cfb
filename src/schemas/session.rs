use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Answer;
use crate::schemas::exam::QuestionResponse;
use crate::services::session::{AnswerValue, FinalizeOutcome, SessionSnapshot};
use crate::services::ExamFlowError;

#[derive(Debug, Deserialize)]
pub(crate) struct SaveAnswersRequest {
    pub(crate) answers: Vec<AnswerPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerPayload {
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) answer_text: Option<String>,
    #[serde(default)]
    pub(crate) selected_option_id: Option<String>,
}

impl AnswerPayload {
    /// An answer carries either free text or a selected option, never both
    /// and never neither.
    pub(crate) fn into_entry(self) -> Result<(String, AnswerValue), ExamFlowError> {
        match (self.answer_text, self.selected_option_id) {
            (Some(text), None) => Ok((self.question_id, AnswerValue::Text(text))),
            (None, Some(option_id)) => Ok((self.question_id, AnswerValue::Selected(option_id))),
            _ => Err(ExamFlowError::Validation(format!(
                "answer for question '{}' must set exactly one of answer_text and selected_option_id",
                self.question_id
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedAnswerResponse {
    pub(crate) question_id: String,
    pub(crate) answer_text: Option<String>,
    pub(crate) selected_option_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) submission_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) started_at: String,
    pub(crate) remaining_seconds: i64,
    pub(crate) autosave_interval_seconds: u64,
    pub(crate) questions: Vec<QuestionResponse>,
    pub(crate) saved_answers: Vec<SavedAnswerResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResultResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
}

pub(crate) fn session_to_response(
    snapshot: SessionSnapshot,
    questions: Vec<QuestionResponse>,
    autosave_interval_seconds: u64,
) -> SessionResponse {
    SessionResponse {
        submission_id: snapshot.submission.id,
        exam_id: snapshot.exam.id,
        exam_title: snapshot.exam.title,
        duration_minutes: snapshot.exam.duration_minutes,
        started_at: format_primitive(snapshot.submission.started_at),
        remaining_seconds: snapshot.remaining_seconds,
        autosave_interval_seconds,
        questions,
        saved_answers: snapshot.saved_answers.into_iter().map(saved_answer_to_response).collect(),
    }
}

fn saved_answer_to_response(answer: Answer) -> SavedAnswerResponse {
    SavedAnswerResponse {
        question_id: answer.question_id,
        answer_text: answer.answer_text,
        selected_option_id: answer.selected_option_id,
    }
}

pub(crate) fn outcome_to_response(outcome: FinalizeOutcome) -> SubmissionResultResponse {
    let submission = outcome.submission;
    SubmissionResultResponse {
        id: submission.id,
        exam_id: submission.exam_id,
        submitted_at: submission.submitted_at.map(format_primitive),
        time_taken_minutes: submission.time_taken_minutes,
        total_score: submission.total_score,
        max_score: submission.max_score,
        percentage: submission.percentage,
        is_graded: submission.is_graded,
    }
}
