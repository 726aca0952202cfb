use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Answer;
use crate::db::types::QuestionType;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, question_id, answer_text, selected_option_id, is_correct, \
    points_earned, feedback, is_graded, created_at, updated_at";

/// Answer content as recorded by the student; grading fields live on the
/// row but are never written through this struct.
#[derive(Debug, Clone)]
pub(crate) struct AnswerContent {
    pub(crate) question_id: String,
    pub(crate) answer_text: Option<String>,
    pub(crate) selected_option_id: Option<String>,
}

/// Answer joined with its question and the option texts a grader needs.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AnswerDetail {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) answer_text: Option<String>,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<i32>,
    pub(crate) feedback: Option<String>,
    pub(crate) is_graded: bool,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) question_points: i32,
    pub(crate) order_index: i32,
    pub(crate) selected_option_text: Option<String>,
    pub(crate) correct_option_text: Option<String>,
}

pub(crate) async fn list_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!("SELECT {COLUMNS} FROM answers WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Keyed upsert on (submission, question): re-saving an answer updates the
/// recorded content in place, never duplicates the row and never touches
/// grading fields.
pub(crate) async fn upsert_content(
    pool: &PgPool,
    submission_id: &str,
    answers: &[AnswerContent],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for answer in answers {
        sqlx::query(
            "INSERT INTO answers (id, submission_id, question_id, answer_text, selected_option_id,
                created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$6)
             ON CONFLICT (submission_id, question_id) DO UPDATE
             SET answer_text = EXCLUDED.answer_text,
                 selected_option_id = EXCLUDED.selected_option_id,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(submission_id)
        .bind(&answer.question_id)
        .bind(&answer.answer_text)
        .bind(&answer.selected_option_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Inserts an empty answer row for a question the student never touched so
/// every question of a finalized attempt has a gradable row. Existing rows
/// win the conflict.
pub(crate) async fn insert_placeholder(
    pool: &PgPool,
    submission_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers (id, submission_id, question_id, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$4)
         ON CONFLICT (submission_id, question_id) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(submission_id)
    .bind(question_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Writes an objective auto-score. Manual grades on open-ended answers go
/// through [`update_grade`] instead.
pub(crate) async fn apply_auto_score(
    pool: &PgPool,
    id: &str,
    is_correct: bool,
    points_earned: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answers
         SET is_correct = $1, points_earned = $2, is_graded = TRUE, updated_at = $3
         WHERE id = $4",
    )
    .bind(is_correct)
    .bind(points_earned)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn update_grade(
    pool: &PgPool,
    id: &str,
    points_earned: i32,
    feedback: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answers
         SET points_earned = $1, feedback = $2, is_graded = TRUE, updated_at = $3
         WHERE id = $4",
    )
    .bind(points_earned)
    .bind(feedback)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_details(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<AnswerDetail>, sqlx::Error> {
    sqlx::query_as::<_, AnswerDetail>(
        "SELECT a.id, a.question_id, a.answer_text, a.selected_option_id, a.is_correct,
                a.points_earned, a.feedback, a.is_graded,
                q.question_text, q.question_type, q.points AS question_points, q.order_index,
                sel.option_text AS selected_option_text,
                cor.option_text AS correct_option_text
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         LEFT JOIN question_options sel ON sel.id = a.selected_option_id
         LEFT JOIN question_options cor
                ON cor.question_id = a.question_id AND cor.is_correct
         WHERE a.submission_id = $1
         ORDER BY q.order_index",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
