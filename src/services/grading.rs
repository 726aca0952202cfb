use sqlx::PgPool;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Profile, Submission};
use crate::db::types::{GradingFilter, GradingProgress, QuestionType};
use crate::repositories;
use crate::repositories::answers::AnswerDetail;
use crate::repositories::submissions::SubmissionListing;
use crate::services::scoring::{self, ScoreSummary};
use crate::services::ExamFlowError;

pub(crate) struct SubmissionDetail {
    pub(crate) submission: Submission,
    pub(crate) student_name: String,
    pub(crate) exam_title: String,
    pub(crate) answers: Vec<AnswerDetail>,
    pub(crate) progress: GradingProgress,
}

fn require_admin(actor: &Profile) -> Result<(), ExamFlowError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(ExamFlowError::Unauthorized)
    }
}

/// Grading dimension of a submission, derived from the persisted answer
/// rows: pending rows keep it short of fully graded, and a fresh attempt
/// with no grades at all is ungraded.
pub(crate) fn grading_progress(answers: &[Answer]) -> GradingProgress {
    let total = answers.len();
    let graded = answers.iter().filter(|answer| answer.points_earned.is_some()).count();

    if total == 0 || graded == 0 {
        GradingProgress::Ungraded
    } else if graded == total {
        GradingProgress::FullyGraded
    } else {
        GradingProgress::PartiallyGraded
    }
}

pub(crate) async fn list_submissions(
    pool: &PgPool,
    actor: &Profile,
    filter: GradingFilter,
) -> Result<Vec<SubmissionListing>, ExamFlowError> {
    require_admin(actor)?;
    Ok(repositories::submissions::list_submitted(pool, filter).await?)
}

pub(crate) async fn load_submission_detail(
    pool: &PgPool,
    actor: &Profile,
    submission_id: &str,
) -> Result<SubmissionDetail, ExamFlowError> {
    require_admin(actor)?;

    let submission = repositories::submissions::find_by_id(pool, submission_id)
        .await?
        .ok_or(ExamFlowError::NotFound("submission"))?;

    let student = repositories::profiles::find_by_id(pool, &submission.student_id)
        .await?
        .ok_or(ExamFlowError::NotFound("student"))?;
    let exam = repositories::exams::find_by_id(pool, &submission.exam_id)
        .await?
        .ok_or(ExamFlowError::NotFound("exam"))?;

    let details = repositories::answers::list_details(pool, submission_id).await?;
    let answers = repositories::answers::list_by_submission(pool, submission_id).await?;

    Ok(SubmissionDetail {
        submission,
        student_name: student.full_name,
        exam_title: exam.title,
        answers: details,
        progress: grading_progress(&answers),
    })
}

/// Assigns a manual grade to one answer. Points outside the question's
/// range are rejected, never clamped; feedback is only meaningful on
/// open-ended answers. The recorded answer content is never touched.
pub(crate) async fn set_answer_grade(
    pool: &PgPool,
    actor: &Profile,
    answer_id: &str,
    points_earned: i32,
    feedback: Option<String>,
) -> Result<(), ExamFlowError> {
    require_admin(actor)?;

    let answer = repositories::answers::find_by_id(pool, answer_id)
        .await?
        .ok_or(ExamFlowError::NotFound("answer"))?;

    let submission = repositories::submissions::find_by_id(pool, &answer.submission_id)
        .await?
        .ok_or(ExamFlowError::NotFound("submission"))?;
    if !submission.is_submitted {
        return Err(ExamFlowError::Validation(
            "cannot grade an attempt that has not been submitted".to_string(),
        ));
    }

    let question = repositories::questions::find_by_id(pool, &answer.question_id)
        .await?
        .ok_or(ExamFlowError::NotFound("question"))?;

    if points_earned < 0 || points_earned > question.points {
        return Err(ExamFlowError::Validation(format!(
            "points_earned must be between 0 and {}",
            question.points
        )));
    }

    let feedback = feedback.filter(|text| !text.trim().is_empty());
    if feedback.is_some() && question.question_type != QuestionType::OpenEnded {
        return Err(ExamFlowError::Validation(
            "feedback is only supported on open-ended answers".to_string(),
        ));
    }

    let now = primitive_now_utc();
    repositories::answers::update_grade(pool, answer_id, points_earned, feedback.as_deref(), now)
        .await?;

    tracing::info!(
        answer_id,
        submission_id = %answer.submission_id,
        graded_by = %actor.id,
        points_earned,
        "Saved manual grade"
    );

    Ok(())
}

/// Re-sums the submission aggregate from the answer rows as they are
/// persisted right now, so two graders saving concurrently converge on the
/// last writer's state instead of a stale snapshot.
pub(crate) async fn recompute_submission_totals(
    pool: &PgPool,
    actor: &Profile,
    submission_id: &str,
) -> Result<ScoreSummary, ExamFlowError> {
    require_admin(actor)?;

    let submission = repositories::submissions::find_by_id(pool, submission_id)
        .await?
        .ok_or(ExamFlowError::NotFound("submission"))?;

    let questions = repositories::questions::list_by_exam(pool, &submission.exam_id).await?;
    let answers = repositories::answers::list_by_submission(pool, submission_id).await?;

    let total_score: i64 = answers
        .iter()
        .filter_map(|answer| answer.points_earned)
        .map(|points| points as i64)
        .sum();
    let max_score: i64 = questions.iter().map(|question| question.points as i64).sum();
    let percentage =
        if max_score > 0 { total_score as f64 / max_score as f64 * 100.0 } else { 0.0 };
    let is_graded = answers.iter().all(|answer| answer.points_earned.is_some());

    let summary = ScoreSummary {
        total_score: total_score as i32,
        max_score: max_score as i32,
        percentage,
        is_graded,
    };

    repositories::submissions::update_totals(
        pool,
        submission_id,
        summary.total_score,
        summary.max_score,
        summary.percentage,
        summary.is_graded,
        primitive_now_utc(),
    )
    .await?;

    Ok(summary)
}

/// Re-runs the objective auto-scoring pass on a submitted attempt. Manual
/// open-ended grades survive (the scoring engine never writes to them).
pub(crate) async fn rescore_submission(
    pool: &PgPool,
    actor: &Profile,
    submission_id: &str,
) -> Result<ScoreSummary, ExamFlowError> {
    require_admin(actor)?;

    let submission = repositories::submissions::find_by_id(pool, submission_id)
        .await?
        .ok_or(ExamFlowError::NotFound("submission"))?;
    if !submission.is_submitted {
        return Err(ExamFlowError::Validation(
            "cannot score an attempt that has not been submitted".to_string(),
        ));
    }

    Ok(scoring::auto_grade_submission(pool, submission_id).await?)
}

pub(crate) async fn delete_submission(
    pool: &PgPool,
    actor: &Profile,
    submission_id: &str,
) -> Result<(), ExamFlowError> {
    require_admin(actor)?;

    let deleted = repositories::submissions::delete(pool, submission_id).await?;
    if !deleted {
        return Err(ExamFlowError::NotFound("submission"));
    }

    tracing::info!(submission_id, deleted_by = %actor.id, "Deleted submission");
    Ok(())
}
