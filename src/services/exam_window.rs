use time::{Duration, PrimitiveDateTime};

use crate::db::models::Exam;
use crate::services::ExamFlowError;

/// Rejects entry outside the exam's availability window.
pub(crate) fn check_availability(exam: &Exam, now: PrimitiveDateTime) -> Result<(), ExamFlowError> {
    if let Some(start) = exam.start_date {
        if now < start {
            return Err(ExamFlowError::NotYetAvailable);
        }
    }
    if let Some(end) = exam.end_date {
        if now > end {
            return Err(ExamFlowError::Expired);
        }
    }
    Ok(())
}

/// The authoritative deadline of one attempt: the running clock started at
/// `started_at`, clamped by the exam's end date when one is set. Resuming a
/// session never restarts the clock.
pub(crate) fn deadline_for(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    end_date: Option<PrimitiveDateTime>,
) -> PrimitiveDateTime {
    let duration_deadline = started_at + Duration::minutes(duration_minutes as i64);
    match end_date {
        Some(end) if end < duration_deadline => end,
        _ => duration_deadline,
    }
}

pub(crate) fn remaining_seconds(deadline: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    let remaining = (deadline - now).whole_seconds();
    remaining.max(0)
}

/// Minutes spent on the attempt, `duration - floor(remaining / 60)`.
pub(crate) fn time_taken_minutes(duration_minutes: i32, remaining_seconds: i64) -> i32 {
    let remaining_minutes = (remaining_seconds / 60) as i32;
    (duration_minutes - remaining_minutes).clamp(0, duration_minutes)
}
