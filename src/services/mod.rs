pub(crate) mod exam_window;
pub(crate) mod grading;
pub(crate) mod scoring;
pub(crate) mod session;

use thiserror::Error;

/// Error taxonomy of the exam-taking and grading flow. Autosave swallows
/// `Transient` and retries on the next tick; every other variant aborts the
/// operation and reaches the caller.
#[derive(Debug, Error)]
pub(crate) enum ExamFlowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("exam is not yet available")]
    NotYetAvailable,
    #[error("exam has expired")]
    Expired,
    #[error("exam already submitted")]
    AlreadySubmitted,
    #[error("{0}")]
    Validation(String),
    #[error("storage operation failed")]
    Transient(#[from] sqlx::Error),
    #[error("not enough permissions")]
    Unauthorized,
}
