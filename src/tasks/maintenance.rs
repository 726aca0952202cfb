use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::session;
use crate::services::ExamFlowError;

/// Closes open attempts whose server-side deadline has passed. This is the
/// authoritative auto-submit: a client that died before its countdown fired
/// still gets finalized and scored here, through the same compare-and-set
/// path the live countdown uses.
pub(crate) async fn finalize_overdue_submissions(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let grace = state.settings().exam().submit_grace_seconds;

    let overdue = repositories::submissions::list_overdue(state.db(), now, grace)
        .await
        .context("Failed to list overdue submissions")?;

    if overdue.is_empty() {
        return Ok(());
    }

    let mut closed = 0;

    for submission in overdue {
        match session::finalize_submission(state.db(), &submission.id, None, true).await {
            Ok(outcome) => {
                tracing::debug!(
                    submission_id = %submission.id,
                    total_score = outcome.summary.total_score,
                    max_score = outcome.summary.max_score,
                    is_graded = outcome.summary.is_graded,
                    "Auto-submitted overdue attempt"
                );
                closed += 1;
            }
            // Lost the race against a manual submit or a parallel worker.
            Err(ExamFlowError::AlreadySubmitted) => {}
            Err(err) => {
                tracing::error!(
                    submission_id = %submission.id,
                    exam_id = %submission.exam_id,
                    error = %err,
                    "Failed to finalize overdue submission"
                );
            }
        }
    }

    tracing::info!(closed_submissions = closed, "Finalized overdue submissions");
    metrics::counter!("overdue_submissions_finalized_total").increment(closed as u64);

    Ok(())
}
