use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::types::{GradingProgress, QuestionType};
use crate::repositories::answers::AnswerDetail;
use crate::repositories::submissions::{GradeRow, SubmissionListing};
use crate::services::grading::SubmissionDetail;

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionListItem {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerDetailResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) question_points: i32,
    pub(crate) order_index: i32,
    pub(crate) answer_text: Option<String>,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) selected_option_text: Option<String>,
    pub(crate) correct_option_text: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<i32>,
    pub(crate) feedback: Option<String>,
    pub(crate) is_graded: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionDetailResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
    pub(crate) progress: GradingProgress,
    pub(crate) answers: Vec<AnswerDetailResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeUpdateRequest {
    #[validate(range(min = 0, message = "points_earned must be non-negative"))]
    pub(crate) points_earned: i32,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeSummaryResponse {
    pub(crate) submission_id: String,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
}

/// One row of the student's own grades view.
#[derive(Debug, Serialize)]
pub(crate) struct StudentGradeResponse {
    pub(crate) submission_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
    pub(crate) review_available: bool,
}

pub(crate) fn listing_to_response(listing: SubmissionListing) -> SubmissionListItem {
    SubmissionListItem {
        id: listing.id,
        exam_id: listing.exam_id,
        exam_title: listing.exam_title,
        student_id: listing.student_id,
        student_name: listing.student_name,
        submitted_at: listing.submitted_at.map(format_primitive),
        time_taken_minutes: listing.time_taken_minutes,
        total_score: listing.total_score,
        max_score: listing.max_score,
        percentage: listing.percentage,
        is_graded: listing.is_graded,
    }
}

pub(crate) fn detail_to_response(detail: SubmissionDetail) -> SubmissionDetailResponse {
    let submission = detail.submission;
    SubmissionDetailResponse {
        id: submission.id,
        exam_id: submission.exam_id,
        exam_title: detail.exam_title,
        student_id: submission.student_id,
        student_name: detail.student_name,
        submitted_at: submission.submitted_at.map(format_primitive),
        time_taken_minutes: submission.time_taken_minutes,
        total_score: submission.total_score,
        max_score: submission.max_score,
        percentage: submission.percentage,
        is_graded: submission.is_graded,
        progress: detail.progress,
        answers: detail.answers.into_iter().map(answer_detail_to_response).collect(),
    }
}

pub(crate) fn answer_detail_to_response(detail: AnswerDetail) -> AnswerDetailResponse {
    AnswerDetailResponse {
        id: detail.id,
        question_id: detail.question_id,
        question_text: detail.question_text,
        question_type: detail.question_type,
        question_points: detail.question_points,
        order_index: detail.order_index,
        answer_text: detail.answer_text,
        selected_option_id: detail.selected_option_id,
        selected_option_text: detail.selected_option_text,
        correct_option_text: detail.correct_option_text,
        is_correct: detail.is_correct,
        points_earned: detail.points_earned,
        feedback: detail.feedback,
        is_graded: detail.is_graded,
    }
}

pub(crate) fn grade_row_to_response(row: GradeRow) -> StudentGradeResponse {
    StudentGradeResponse {
        submission_id: row.id,
        exam_id: row.exam_id,
        exam_title: row.exam_title,
        submitted_at: row.submitted_at.map(format_primitive),
        time_taken_minutes: row.time_taken_minutes,
        total_score: row.total_score,
        max_score: row.max_score,
        percentage: row.percentage,
        is_graded: row.is_graded,
        review_available: row.allow_review && row.is_graded,
    }
}
