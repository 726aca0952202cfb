use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "\
    id, title, description, duration_minutes, start_date, end_date, is_active, \
    allow_review, visible_to_all, created_by, created_at, updated_at";

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) is_active: bool,
    pub(crate) allow_review: bool,
    pub(crate) visible_to_all: bool,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) struct UpdateExam<'a> {
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) is_active: bool,
    pub(crate) allow_review: bool,
    pub(crate) visible_to_all: bool,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    exam: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (id, title, description, duration_minutes, start_date, end_date,
            is_active, allow_review, visible_to_all, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
         RETURNING {COLUMNS}"
    ))
    .bind(exam.id)
    .bind(exam.title)
    .bind(exam.description)
    .bind(exam.duration_minutes)
    .bind(exam.start_date)
    .bind(exam.end_date)
    .bind(exam.is_active)
    .bind(exam.allow_review)
    .bind(exam.visible_to_all)
    .bind(exam.created_by)
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

/// Exams the student is allowed to see: active, and either open to everyone
/// or explicitly assigned to them.
pub(crate) async fn list_visible_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams e
         WHERE e.is_active
           AND (e.visible_to_all
                OR EXISTS (SELECT 1 FROM exam_assignments a
                           WHERE a.exam_id = e.id AND a.student_id = $1))
         ORDER BY e.created_at DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn is_visible_to(
    pool: &PgPool,
    exam: &Exam,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    if !exam.is_active {
        return Ok(false);
    }
    if exam.visible_to_all {
        return Ok(true);
    }

    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM exam_assignments WHERE exam_id = $1 AND student_id = $2",
    )
    .bind(&exam.id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    patch: UpdateExam<'_>,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams
         SET title = $1, description = $2, duration_minutes = $3, start_date = $4,
             end_date = $5, is_active = $6, allow_review = $7, visible_to_all = $8,
             updated_at = $9
         WHERE id = $10
         RETURNING {COLUMNS}"
    ))
    .bind(patch.title)
    .bind(patch.description)
    .bind(patch.duration_minutes)
    .bind(patch.start_date)
    .bind(patch.end_date)
    .bind(patch.is_active)
    .bind(patch.allow_review)
    .bind(patch.visible_to_all)
    .bind(patch.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn replace_assignments(
    pool: &PgPool,
    exam_id: &str,
    student_ids: &[String],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM exam_assignments WHERE exam_id = $1")
        .bind(exam_id)
        .execute(&mut *tx)
        .await?;

    for student_id in student_ids {
        sqlx::query(
            "INSERT INTO exam_assignments (exam_id, student_id, created_at)
             VALUES ($1,$2,$3)
             ON CONFLICT DO NOTHING",
        )
        .bind(exam_id)
        .bind(student_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub(crate) async fn max_score_for_exam(pool: &PgPool, exam_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(points), 0) FROM questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}
