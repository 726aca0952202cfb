use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::GradingFilter;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, started_at, submitted_at, is_submitted, time_taken_minutes, \
    total_score, max_score, percentage, is_graded, created_at, updated_at";

/// Submitted attempt joined with the student and exam labels the grading
/// list needs.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmissionListing {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
    pub(crate) student_name: String,
    pub(crate) exam_title: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GradeRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) allow_review: bool,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
    pub(crate) is_graded: bool,
}

/// Open attempt whose deadline has passed; consumed by the reaper.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OpenSubmission {
    pub(crate) id: String,
    pub(crate) exam_id: String,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_exam_and_student(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Keyed upsert on (exam, student): creates the attempt row on first entry
/// and leaves an existing one untouched. Returns true when a row was
/// inserted.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    id: &str,
    exam_id: &str,
    student_id: &str,
    max_score: i32,
    started_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO submissions (id, exam_id, student_id, started_at, is_submitted, max_score,
            created_at, updated_at)
         VALUES ($1,$2,$3,$4,FALSE,$5,$6,$7)
         ON CONFLICT (exam_id, student_id) DO NOTHING",
    )
    .bind(id)
    .bind(exam_id)
    .bind(student_id)
    .bind(started_at)
    .bind(max_score)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Compare-and-set finalization: flips `is_submitted` only if it is still
/// false, so a concurrent finalize (second tab, countdown racing a manual
/// submit, the reaper) loses cleanly. Returns false when the row was
/// already finalized.
pub(crate) async fn finalize_cas(
    pool: &PgPool,
    id: &str,
    submitted_at: PrimitiveDateTime,
    time_taken_minutes: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET is_submitted = TRUE, submitted_at = $1, time_taken_minutes = $2, updated_at = $1
         WHERE id = $3 AND is_submitted = FALSE",
    )
    .bind(submitted_at)
    .bind(time_taken_minutes)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_totals(
    pool: &PgPool,
    id: &str,
    total_score: i32,
    max_score: i32,
    percentage: f64,
    is_graded: bool,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE submissions
         SET total_score = $1, max_score = $2, percentage = $3, is_graded = $4, updated_at = $5
         WHERE id = $6",
    )
    .bind(total_score)
    .bind(max_score)
    .bind(percentage)
    .bind(is_graded)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_submitted(
    pool: &PgPool,
    filter: GradingFilter,
) -> Result<Vec<SubmissionListing>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT s.id, s.exam_id, s.student_id, s.submitted_at, s.time_taken_minutes,
                s.total_score, s.max_score, s.percentage, s.is_graded,
                p.full_name AS student_name, e.title AS exam_title
         FROM submissions s
         JOIN profiles p ON p.id = s.student_id
         JOIN exams e ON e.id = s.exam_id
         WHERE s.is_submitted",
    );

    match filter {
        GradingFilter::All => {}
        GradingFilter::Graded => {
            builder.push(" AND s.is_graded");
        }
        GradingFilter::Ungraded => {
            builder.push(" AND NOT s.is_graded");
        }
    }

    builder.push(" ORDER BY s.submitted_at DESC");

    builder.build_query_as::<SubmissionListing>().fetch_all(pool).await
}

pub(crate) async fn list_grades_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<GradeRow>, sqlx::Error> {
    sqlx::query_as::<_, GradeRow>(
        "SELECT s.id, s.exam_id, e.title AS exam_title, e.allow_review, s.submitted_at,
                s.time_taken_minutes, s.total_score, s.max_score, s.percentage, s.is_graded
         FROM submissions s
         JOIN exams e ON e.id = s.exam_id
         WHERE s.student_id = $1 AND s.is_submitted
         ORDER BY s.submitted_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Open attempts whose server-side deadline has passed `cutoff_grace`
/// seconds ago; consumed by the reaper.
pub(crate) async fn list_overdue(
    pool: &PgPool,
    now: PrimitiveDateTime,
    grace_seconds: i64,
) -> Result<Vec<OpenSubmission>, sqlx::Error> {
    sqlx::query_as::<_, OpenSubmission>(
        "SELECT s.id, s.exam_id
         FROM submissions s
         JOIN exams e ON e.id = s.exam_id
         WHERE NOT s.is_submitted
           AND LEAST(
                 s.started_at + make_interval(mins => e.duration_minutes),
                 COALESCE(e.end_date, 'infinity'::timestamp)
               ) + make_interval(secs => $2::double precision) <= $1",
    )
    .bind(now)
    .bind(grace_seconds as f64)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM submissions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
